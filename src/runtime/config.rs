use crate::batch::chunk::DEFAULT_CHUNK_SIZE;
use crate::batch::coordinator::DEFAULT_AGGREGATE_BUFFER;
use crate::cache::ttl::{DEFAULT_CACHE_TTL, DEFAULT_SWEEP_INTERVAL};
use crate::pool::worker_pool::{default_worker_count, PoolConfig, DEFAULT_QUEUE_CAPACITY};
use crate::runtime::telemetry;
use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const ENV_PREFIX: &str = "FANOUT_POOL_";

/// Runtime configuration for the background substrate.
///
/// All instances must be constructed via [`RuntimeConfig::builder`] or [`RuntimeConfig::from_env`]
/// so invariants are validated before any consumer observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    workers: usize,
    queue_capacity: usize,
    chunk_size: usize,
    aggregate_buffer: usize,
    cache_ttl: Duration,
    cache_sweep_interval: Duration,
    metrics_interval: Duration,
}

impl RuntimeConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Builds a configuration from `FANOUT_POOL_*` environment variables, falling back to
    /// defaults for unset values.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<L>(lookup: L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();
        if let Some(workers) = parse_var::<usize, _>(&lookup, "WORKERS")? {
            builder = builder.workers(workers);
        }
        if let Some(capacity) = parse_var::<usize, _>(&lookup, "QUEUE_CAPACITY")? {
            builder = builder.queue_capacity(capacity);
        }
        if let Some(chunk_size) = parse_var::<usize, _>(&lookup, "CHUNK_SIZE")? {
            builder = builder.chunk_size(chunk_size);
        }
        if let Some(buffer) = parse_var::<usize, _>(&lookup, "AGGREGATE_BUFFER")? {
            builder = builder.aggregate_buffer(buffer);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "CACHE_TTL_SECS")? {
            builder = builder.cache_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "CACHE_SWEEP_SECS")? {
            builder = builder.cache_sweep_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "METRICS_SECS")? {
            builder = builder.metrics_interval(Duration::from_secs(secs));
        }
        builder.build()
    }

    /// Number of pool workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Capacity of the pool's submission queue.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Items per chunk job used by batch callers.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Capacity of the channel feeding batch results to the aggregator.
    pub fn aggregate_buffer(&self) -> usize {
        self.aggregate_buffer
    }

    /// TTL applied to cached aggregates.
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Interval of the cache housekeeping sweep.
    pub fn cache_sweep_interval(&self) -> Duration {
        self.cache_sweep_interval
    }

    /// Interval used by the telemetry reporter.
    pub fn metrics_interval(&self) -> Duration {
        self.metrics_interval
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
        }
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("workers must be greater than 0");
        }

        if self.queue_capacity == 0 {
            bail!("queue_capacity must be greater than 0");
        }

        if self.chunk_size == 0 {
            bail!("chunk_size must be greater than 0");
        }

        if self.aggregate_buffer == 0 {
            bail!("aggregate_buffer must be greater than 0");
        }

        if self.cache_ttl.is_zero() {
            bail!("cache_ttl must be greater than 0");
        }

        if self.cache_sweep_interval.is_zero() {
            bail!("cache_sweep_interval must be greater than 0");
        }

        if self.metrics_interval.is_zero() {
            bail!("metrics_interval must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct RuntimeConfigBuilder {
    workers: Option<usize>,
    queue_capacity: Option<usize>,
    chunk_size: Option<usize>,
    aggregate_buffer: Option<usize>,
    cache_ttl: Option<Duration>,
    cache_sweep_interval: Option<Duration>,
    metrics_interval: Option<Duration>,
}

impl RuntimeConfigBuilder {
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn aggregate_buffer(mut self, capacity: usize) -> Self {
        self.aggregate_buffer = Some(capacity);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn cache_sweep_interval(mut self, interval: Duration) -> Self {
        self.cache_sweep_interval = Some(interval);
        self
    }

    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<RuntimeConfig> {
        let config = RuntimeConfig {
            workers: self.workers.unwrap_or_else(default_worker_count),
            queue_capacity: self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            chunk_size: self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            aggregate_buffer: self.aggregate_buffer.unwrap_or(DEFAULT_AGGREGATE_BUFFER),
            cache_ttl: self.cache_ttl.unwrap_or(DEFAULT_CACHE_TTL),
            cache_sweep_interval: self.cache_sweep_interval.unwrap_or(DEFAULT_SWEEP_INTERVAL),
            metrics_interval: self
                .metrics_interval
                .unwrap_or(telemetry::DEFAULT_METRICS_INTERVAL),
        };

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T, L>(lookup: &L, suffix: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    L: Fn(&str) -> Option<String>,
{
    let name = format!("{ENV_PREFIX}{suffix}");
    match lookup(&name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{name} must be a valid number, got {raw:?}")),
        _ => Ok(None),
    }
}
