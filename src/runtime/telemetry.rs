use crate::cache::stats::CacheStats;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Default interval used by the metrics reporter task.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(5);

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Rolling counters describing worker pool activity.
#[derive(Default, Debug)]
pub struct PoolTelemetry {
    submitted: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    workers: AtomicUsize,
}

impl PoolTelemetry {
    pub fn record_workers(&self, workers: usize) {
        self.workers.store(workers, Ordering::Relaxed);
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_started(&self) {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
    }

    pub fn record_job_finished(&self, panicked: bool) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::Relaxed);
        if panicked {
            self.panicked.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            workers: self.workers.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
        }
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }

    /// Highest number of jobs observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub workers: usize,
    pub submitted: u64,
    pub completed: u64,
    pub panicked: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
}

/// Spawns a background task that periodically logs job throughput, pool occupancy and cache
/// effectiveness.
pub fn spawn_metrics_reporter(
    telemetry: Arc<PoolTelemetry>,
    cache_stats: Arc<CacheStats>,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_snapshot = telemetry.snapshot();
        let mut last_tick = Instant::now();

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "fanout_pool::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let current = telemetry.snapshot();
                    let completed_delta = current.completed.saturating_sub(last_snapshot.completed);
                    let elapsed = last_tick.elapsed().as_secs_f64();
                    let throughput = if elapsed <= f64::EPSILON {
                        0.0
                    } else {
                        completed_delta as f64 / elapsed
                    };
                    let cache = cache_stats.snapshot();

                    tracing::info!(
                        target: "fanout_pool::metrics",
                        throughput = format!("{throughput:.2}"),
                        workers = current.workers,
                        in_flight = current.in_flight,
                        submitted = current.submitted,
                        completed = current.completed,
                        panicked = current.panicked,
                        cache_hits = cache.hits,
                        cache_misses = cache.misses,
                        cache_evicted = cache.evicted,
                        "runtime metrics snapshot"
                    );

                    last_snapshot = current;
                    last_tick = Instant::now();
                }
            }
        }
    })
}
