use crate::batch::coordinator::BatchCoordinator;
use crate::cache::ttl::{spawn_housekeeping, TtlCache};
use crate::error::ScheduleError;
use crate::pool::worker_pool::WorkerPool;
use crate::runtime::config::RuntimeConfig;
use crate::runtime::telemetry::{spawn_metrics_reporter, PoolTelemetry};
use crate::scheduler::maintenance::{refresh_task, Refresh};
use crate::scheduler::periodic::Scheduler;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns the pool, batch coordinator, cache and scheduler of one application and
/// ties their lifetimes to a single root [`CancellationToken`].
pub struct Substrate {
    config: RuntimeConfig,
    pool: Arc<WorkerPool>,
    coordinator: BatchCoordinator,
    cache: Arc<TtlCache>,
    scheduler: Scheduler,
    telemetry: Arc<PoolTelemetry>,
    background: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl Substrate {
    /// Starts every component described by `config`. Must be called from within a tokio runtime.
    ///
    /// The scheduler is already running when this returns, so maintenance tasks registered
    /// afterwards execute immediately.
    pub fn start(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        let shutdown = CancellationToken::new();
        let telemetry = Arc::new(PoolTelemetry::default());

        let pool = WorkerPool::with_cancellation_token(
            config.pool_config(),
            telemetry.clone(),
            shutdown.child_token(),
        )
        .context("failed to start worker pool")?;
        let pool = Arc::new(pool);
        let coordinator = BatchCoordinator::new(pool.clone())
            .with_chunk_size(config.chunk_size())
            .with_aggregate_buffer(config.aggregate_buffer());

        let cache = Arc::new(TtlCache::in_memory());
        let background = vec![
            spawn_housekeeping(
                cache.clone(),
                config.cache_sweep_interval(),
                shutdown.child_token(),
            ),
            spawn_metrics_reporter(
                telemetry.clone(),
                cache.stats(),
                shutdown.child_token(),
                config.metrics_interval(),
            ),
        ];

        let mut scheduler = Scheduler::with_cancellation_token(shutdown.child_token());
        scheduler.start();

        tracing::info!(
            workers = config.workers(),
            chunk_size = config.chunk_size(),
            cache_ttl_secs = config.cache_ttl().as_secs(),
            "substrate started"
        );

        Ok(Self {
            config,
            pool,
            coordinator,
            cache,
            scheduler,
            telemetry,
            background,
            shutdown,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn coordinator(&self) -> &BatchCoordinator {
        &self.coordinator
    }

    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Mutable access for registering custom tasks with [`Scheduler::register`].
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn telemetry(&self) -> &Arc<PoolTelemetry> {
        &self.telemetry
    }

    /// Returns a clone of the root shutdown token so external callers can integrate
    /// with their own signal handlers or cancellation strategies.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Schedules `target.refresh()` under `name`.
    pub fn register_maintenance<R: Refresh>(
        &mut self,
        spec: &str,
        name: &str,
        target: Arc<R>,
    ) -> Result<(), ScheduleError> {
        self.scheduler.register(spec, name, refresh_task(name, target))
    }

    /// Cancels the root token and waits for the scheduler, the pool and the
    /// background loops to wind down.
    pub async fn shutdown(&mut self) {
        self.shutdown.cancel();
        self.scheduler.shutdown().await;
        self.pool.shutdown().await;
        for handle in self.background.drain(..) {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "background task panicked");
            }
        }
        tracing::info!("substrate stopped");
    }

    /// Runs until a Ctrl-C (SIGINT) is received or the shutdown token is cancelled elsewhere.
    pub async fn run_until_ctrl_c(&mut self) -> Result<()> {
        tracing::info!("substrate running; waiting for Ctrl-C (SIGINT) to initiate shutdown");

        tokio::select! {
            res = signal::ctrl_c() => {
                res.context("failed to listen for Ctrl-C")?;
                tracing::info!("Ctrl-C received; shutting down substrate");
            }
            _ = self.shutdown.cancelled() => {
                tracing::info!("substrate shutdown token cancelled");
            }
        }

        self.shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::job::Job;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    #[derive(Default)]
    struct Reference {
        refreshes: AtomicUsize,
    }

    impl Refresh for Reference {
        fn refresh(&self) -> BoxFuture<'_, anyhow::Result<()>> {
            async move {
                self.refreshes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        }
    }

    fn small_config() -> RuntimeConfig {
        RuntimeConfig::builder()
            .workers(2)
            .queue_capacity(8)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn start_wires_components() {
        let mut substrate = Substrate::start(small_config()).unwrap();
        assert_eq!(substrate.pool().workers(), 2);
        assert_eq!(
            substrate.coordinator().chunk_size(),
            substrate.config().chunk_size()
        );
        assert!(substrate.scheduler().is_started());
        assert!(substrate.cache().is_empty());

        let (tx, rx) = tokio::sync::oneshot::channel();
        substrate
            .pool()
            .submit(Job::new(move || {
                let _ = tx.send(());
            }))
            .await
            .unwrap();
        timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();

        substrate.shutdown().await;
        assert!(substrate.pool().is_stopped());
        assert!(substrate.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn maintenance_runs_on_registration() {
        let mut substrate = Substrate::start(small_config()).unwrap();
        let reference = Arc::new(Reference::default());
        substrate
            .register_maintenance("@every 1h", "reference", reference.clone())
            .unwrap();

        timeout(Duration::from_secs(5), async {
            while reference.refreshes.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        substrate.shutdown().await;
    }

    #[tokio::test]
    async fn run_until_ctrl_c_returns_on_cancellation() {
        let mut substrate = Substrate::start(small_config()).unwrap();
        let token = substrate.cancellation_token();
        token.cancel();
        timeout(Duration::from_secs(5), substrate.run_until_ctrl_c())
            .await
            .unwrap()
            .unwrap();
        assert!(substrate.pool().is_stopped());
    }
}
