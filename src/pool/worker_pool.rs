//! Bounded worker pool.
//!
//! The pool owns a fixed set of workers and a dispatcher task. Submissions go
//! through a bounded queue: a job holds one queue slot from `submit` until a
//! worker accepts it, so at most `queue_capacity` jobs wait at any time. Idle
//! workers advertise themselves by parking their
//! private job channel in a registry sized to the worker count, and the
//! dispatcher pairs each job with the next advertised worker.

use super::dispatcher::{Dispatcher, Submission};
use super::job::Job;
use super::worker::{idle_registry, Worker};
use crate::error::PoolError;
use crate::runtime::telemetry::PoolTelemetry;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default capacity of the submission queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Sizing parameters for a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Number of available processor cores, falling back to 1.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

pub struct WorkerPool {
    workers: usize,
    submit_tx: mpsc::Sender<Submission>,
    queue_slots: Arc<Semaphore>,
    shutdown: CancellationToken,
    telemetry: Arc<PoolTelemetry>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Starts a pool with `size` workers and the default queue capacity.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(size: usize) -> Result<Self, PoolError> {
        Self::with_config(
            PoolConfig {
                workers: size,
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
            },
            Arc::new(PoolTelemetry::default()),
        )
    }

    pub fn with_config(
        config: PoolConfig,
        telemetry: Arc<PoolTelemetry>,
    ) -> Result<Self, PoolError> {
        Self::with_cancellation_token(config, telemetry, CancellationToken::new())
    }

    /// Starts a pool whose lifetime is tied to `shutdown`. Cancelling the token
    /// has the same effect as [`WorkerPool::stop`].
    pub fn with_cancellation_token(
        config: PoolConfig,
        telemetry: Arc<PoolTelemetry>,
        shutdown: CancellationToken,
    ) -> Result<Self, PoolError> {
        if config.workers == 0 {
            return Err(PoolError::InvalidSize(config.workers));
        }
        if config.queue_capacity == 0 {
            return Err(PoolError::InvalidQueueCapacity);
        }

        let (submit_tx, submit_rx) = mpsc::channel(config.queue_capacity);
        let (idle_tx, idle_rx) = idle_registry(config.workers);

        let mut handles = Vec::with_capacity(config.workers + 1);
        for worker_id in 0..config.workers {
            let worker = Worker::new(
                worker_id,
                idle_tx.clone(),
                shutdown.clone(),
                telemetry.clone(),
            );
            handles.push(tokio::spawn(worker.run()));
        }

        let dispatcher = Dispatcher::new(submit_rx, idle_rx, shutdown.clone());
        handles.push(tokio::spawn(dispatcher.run()));

        telemetry.record_workers(config.workers);
        tracing::info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "worker pool started"
        );

        Ok(Self {
            workers: config.workers,
            submit_tx,
            queue_slots: Arc::new(Semaphore::new(config.queue_capacity)),
            shutdown,
            telemetry,
            handles: Mutex::new(handles),
        })
    }

    /// Enqueues a job, waiting while the submission queue is full.
    ///
    /// Fails only once the pool has been stopped.
    pub async fn submit(&self, job: Job) -> Result<(), PoolError> {
        if self.shutdown.is_cancelled() {
            return Err(PoolError::Closed);
        }

        let slot = self.acquire_slot().await?;
        self.submit_tx
            .send((job, slot))
            .await
            .map_err(|_| PoolError::Closed)?;

        self.telemetry.record_submitted();
        Ok(())
    }

    /// Synchronous variant of [`WorkerPool::submit`] for threads outside the
    /// async runtime. Panics if called from within an async context.
    pub fn blocking_submit(&self, job: Job) -> Result<(), PoolError> {
        if self.shutdown.is_cancelled() {
            return Err(PoolError::Closed);
        }

        let slot = futures::executor::block_on(self.acquire_slot())?;
        self.submit_tx
            .blocking_send((job, slot))
            .map_err(|_| PoolError::Closed)?;
        self.telemetry.record_submitted();
        Ok(())
    }

    /// Waits for a free queue slot. The slot travels with the job and is
    /// released once a worker accepts it.
    async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit, PoolError> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(PoolError::Closed),
            slot = Arc::clone(&self.queue_slots).acquire_owned() => {
                slot.map_err(|_| PoolError::Closed)
            }
        }
    }

    /// Signals the dispatcher and all workers to exit without waiting.
    ///
    /// Jobs already running finish; queued jobs that were not yet handed to a
    /// worker are dropped.
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!(workers = self.workers, "worker pool stopping");
        }
        self.shutdown.cancel();
    }

    /// Stops the pool and waits until the dispatcher and every worker have
    /// exited, including any job that was running at the time.
    pub async fn shutdown(&self) {
        self.stop();
        let handles = {
            let mut guard = self.handles.lock().unwrap_or_else(|err| err.into_inner());
            std::mem::take(&mut *guard)
        };

        for handle in handles {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "worker pool task panicked");
            }
        }
        tracing::info!("worker pool stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn telemetry(&self) -> Arc<PoolTelemetry> {
        self.telemetry.clone()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
