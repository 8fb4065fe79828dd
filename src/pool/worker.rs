use super::job::Job;
use crate::runtime::telemetry::PoolTelemetry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Sending half of a worker's private job channel.
pub(crate) type JobSender = mpsc::Sender<Job>;
/// Registry of idle workers: each idle worker parks its own [`JobSender`] here.
pub(crate) type IdleSender = mpsc::Sender<JobSender>;
pub(crate) type IdleReceiver = mpsc::Receiver<JobSender>;

pub(crate) fn idle_registry(workers: usize) -> (IdleSender, IdleReceiver) {
    mpsc::channel(workers.max(1))
}

/// A persistent execution slot that runs one job at a time.
pub(crate) struct Worker {
    id: usize,
    job_tx: JobSender,
    job_rx: mpsc::Receiver<Job>,
    idle_tx: IdleSender,
    shutdown: CancellationToken,
    telemetry: Arc<PoolTelemetry>,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        idle_tx: IdleSender,
        shutdown: CancellationToken,
        telemetry: Arc<PoolTelemetry>,
    ) -> Self {
        let (job_tx, job_rx) = mpsc::channel(1);
        Self {
            id,
            job_tx,
            job_rx,
            idle_tx,
            shutdown,
            telemetry,
        }
    }

    #[tracing::instrument(name = "worker", skip_all, fields(worker = self.id))]
    pub(crate) async fn run(mut self) {
        tracing::debug!(worker = self.id, "worker task started");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                registered = self.idle_tx.send(self.job_tx.clone()) => {
                    if registered.is_err() {
                        break;
                    }
                }
            }

            let job = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                job = self.job_rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            self.execute(job).await;
        }

        tracing::debug!(worker = self.id, "shutdown requested; exiting worker loop");
    }

    async fn execute(&self, job: Job) {
        self.telemetry.record_job_started();
        let outcome = job.run().await;
        let panicked = outcome.is_err();
        if let Err(panic_msg) = outcome {
            tracing::error!(
                worker = self.id,
                panic = %panic_msg,
                "job panicked; worker returning to idle pool"
            );
        }
        self.telemetry.record_job_finished(panicked);
    }
}
