use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// A deferred, parameterless unit of work executed by a pool worker.
///
/// Jobs carry no return channel: anything they produce must be published as a
/// side effect (a channel send, an atomic, a shared map).
pub struct Job {
    kind: JobKind,
}

enum JobKind {
    Blocking(Box<dyn FnOnce() + Send + 'static>),
    Async(BoxFuture<'static, ()>),
}

impl Job {
    /// Wraps a synchronous closure. The closure runs on the blocking thread
    /// pool while its worker waits, so CPU-bound or blocking I/O work does not
    /// stall the async runtime.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            kind: JobKind::Blocking(Box::new(f)),
        }
    }

    /// Wraps a future that is polled directly on the worker task.
    pub fn from_future<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            kind: JobKind::Async(future.boxed()),
        }
    }

    /// Runs the job to completion, containing any panic it raises.
    ///
    /// Returns the panic message when the job panicked.
    pub(crate) async fn run(self) -> Result<(), String> {
        match self.kind {
            JobKind::Blocking(f) => match tokio::task::spawn_blocking(f).await {
                Ok(()) => Ok(()),
                Err(err) if err.is_panic() => Err(panic_message(err.into_panic().as_ref())),
                Err(err) => Err(err.to_string()),
            },
            JobKind::Async(future) => AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .map_err(|payload| panic_message(payload.as_ref())),
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            JobKind::Blocking(_) => "blocking",
            JobKind::Async(_) => "async",
        };
        f.debug_struct("Job").field("kind", &kind).finish()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
