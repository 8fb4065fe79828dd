use super::spec::Schedule;
use crate::pool::job::panic_message;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub(crate) type TaskFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// What to do when a tick fires while the previous invocation is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overlap {
    /// Start another invocation alongside the running one.
    #[default]
    Allow,
    /// Skip the tick.
    Skip,
}

/// A named recurring action.
#[derive(Clone)]
pub struct ScheduledTask {
    name: Arc<str>,
    schedule: Schedule,
    overlap: Overlap,
    run: TaskFn,
    running: Arc<AtomicBool>,
}

impl ScheduledTask {
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, schedule: Schedule, task: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            schedule,
            overlap: Overlap::default(),
            run: Arc::new(move || task().boxed()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_overlap(mut self, overlap: Overlap) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn overlap(&self) -> Overlap {
        self.overlap
    }

    /// Starts one invocation on its own task. Panics, including ones raised
    /// while building the future, are logged and swallowed.
    pub(crate) fn launch(&self) {
        if self.overlap == Overlap::Skip && self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!(task = %self.name, "previous run still in progress; skipping tick");
            return;
        }

        let name = Arc::clone(&self.name);
        let running = Arc::clone(&self.running);
        let overlap = self.overlap;
        let run = Arc::clone(&self.run);

        tokio::spawn(async move {
            let invocation = async move { run().await };
            if let Err(payload) = AssertUnwindSafe(invocation).catch_unwind().await {
                tracing::error!(
                    task = %name,
                    panic = %panic_message(payload.as_ref()),
                    "scheduled task panicked"
                );
            }
            if overlap == Overlap::Skip {
                running.store(false, Ordering::SeqCst);
            }
        });
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.name)
            .field("schedule", &self.schedule)
            .field("overlap", &self.overlap)
            .finish()
    }
}
