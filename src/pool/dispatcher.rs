use super::job::Job;
use super::worker::IdleReceiver;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit};
use tokio_util::sync::CancellationToken;

/// A queued job together with the queue slot it occupies.
///
/// The slot is released only once the job has been handed to a worker, so
/// queued and in-hand-off jobs together never exceed the queue capacity.
pub(crate) type Submission = (Job, OwnedSemaphorePermit);

/// Matches submitted jobs to idle workers.
///
/// Each accepted job is handed to a short-lived task that waits for the next
/// idle worker, so a slow hand-off never blocks acceptance of further
/// submissions.
pub(crate) struct Dispatcher {
    submit_rx: mpsc::Receiver<Submission>,
    idle_rx: Arc<Mutex<IdleReceiver>>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub(crate) fn new(
        submit_rx: mpsc::Receiver<Submission>,
        idle_rx: IdleReceiver,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            submit_rx,
            idle_rx: Arc::new(Mutex::new(idle_rx)),
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let (job, slot) = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                submission = self.submit_rx.recv() => match submission {
                    Some(submission) => submission,
                    None => break,
                },
            };

            tokio::spawn(hand_off(
                job,
                Arc::clone(&self.idle_rx),
                self.shutdown.clone(),
                slot,
            ));
        }

        tracing::debug!("dispatcher loop stopped");
    }
}

async fn hand_off(
    job: Job,
    idle_rx: Arc<Mutex<IdleReceiver>>,
    shutdown: CancellationToken,
    _slot: OwnedSemaphorePermit,
) {
    let worker = tokio::select! {
        biased;
        _ = shutdown.cancelled() => None,
        worker = async { idle_rx.lock().await.recv().await } => worker,
    };

    let Some(worker) = worker else {
        tracing::debug!("pool stopping; dropping undispatched job");
        return;
    };

    if worker.send(job).await.is_err() {
        tracing::warn!("worker exited before accepting job; job dropped");
    }
}
