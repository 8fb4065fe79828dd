use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Counts outstanding chunk jobs so a batch can wait for all of them.
///
/// Each job holds a [`ChunkGuard`]; the count drops when the guard drops,
/// whether the job finished, panicked, or was discarded without running.
#[derive(Debug, Default)]
pub struct ChunkTracker {
    outstanding: AtomicUsize,
    notify: Notify,
}

impl ChunkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(self: &Arc<Self>) -> ChunkGuard {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        ChunkGuard {
            tracker: Arc::clone(self),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.notify.notified();
            if self.outstanding.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    fn release(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }
}

pub struct ChunkGuard {
    tracker: Arc<ChunkTracker>,
}

impl Drop for ChunkGuard {
    fn drop(&mut self) {
        self.tracker.release();
    }
}
