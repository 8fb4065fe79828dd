//! Cache-aside memoization with absolute per-entry expiry.

use super::memory::MemoryStore;
use super::stats::CacheStats;
use super::store::{CacheEntry, CacheStore};
use anyhow::{Context, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// TTL applied by cache-aside callers that do not pick their own.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
/// Interval of the housekeeping sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

type FillGate = Arc<tokio::sync::Mutex<()>>;

pub struct TtlCache<S: CacheStore = MemoryStore> {
    store: S,
    stats: Arc<CacheStats>,
    in_flight: Mutex<HashMap<String, FillGate>>,
}

impl TtlCache<MemoryStore> {
    pub fn in_memory() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl Default for TtlCache<MemoryStore> {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl<S: CacheStore> TtlCache<S> {
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            stats: Arc::new(CacheStats::default()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value if it is still live.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();
        match self.store.load(key) {
            Some(entry) if entry.is_live_at(now) => {
                self.stats.record_hit();
                tracing::trace!(key, "cache hit");
                Some(entry.value().clone())
            }
            _ => {
                self.stats.record_miss();
                tracing::trace!(key, "cache miss");
                None
            }
        }
    }

    /// Stores `value` until `expires_at`. Does nothing if `expires_at` has already passed.
    pub fn put(&self, key: impl Into<String>, value: impl Into<Bytes>, expires_at: Instant) {
        let key = key.into();
        if expires_at <= Instant::now() {
            self.stats.record_skipped();
            tracing::debug!(key = %key, "expiry already passed; not caching");
            return;
        }

        let value = value.into();
        tracing::debug!(key = %key, size_bytes = value.len(), "cache store");
        self.store.store(key, CacheEntry::new(value, expires_at));
        self.stats.record_store();
    }

    /// Stores `value` for `ttl` from now.
    pub fn put_for(&self, key: impl Into<String>, value: impl Into<Bytes>, ttl: Duration) {
        self.put(key, value, Instant::now() + ttl);
    }

    /// Cache-aside lookup that lets only one caller per key run `fill` at a time.
    ///
    /// Concurrent callers for the same key wait for the first fill and then read
    /// its result from the cache. A failed fill caches nothing; the next waiter
    /// runs its own fill.
    pub async fn get_or_fill<F, Fut>(&self, key: &str, ttl: Duration, fill: F) -> Result<Bytes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let gate = FillGateRelease {
            cache: self,
            key,
            gate: self.fill_gate(key),
        };
        let _filling = gate.gate.lock().await;

        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let outcome = fill()
            .await
            .with_context(|| format!("failed to fill cache entry {key}"));
        if let Ok(value) = &outcome {
            self.put_for(key, value.clone(), ttl);
        }
        outcome
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        self.stats.clone()
    }

    /// Evicts every entry that has expired by now.
    pub fn sweep(&self) -> usize {
        let evicted = self.store.sweep(Instant::now());
        self.stats.record_evicted(evicted);
        evicted
    }

    fn fill_gate(&self, key: &str) -> FillGate {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|err| err.into_inner());
        in_flight.entry(key.to_owned()).or_default().clone()
    }

    fn release_fill_gate(&self, key: &str, gate: &FillGate) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|err| err.into_inner());
        if in_flight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, gate))
        {
            in_flight.remove(key);
        }
    }
}

/// Drops the key's fill gate from the in-flight map however the fill ends.
struct FillGateRelease<'a, S: CacheStore> {
    cache: &'a TtlCache<S>,
    key: &'a str,
    gate: FillGate,
}

impl<S: CacheStore> Drop for FillGateRelease<'_, S> {
    fn drop(&mut self) {
        self.cache.release_fill_gate(self.key, &self.gate);
    }
}

/// Spawns the periodic housekeeping sweep for `cache`.
pub fn spawn_housekeeping<S: CacheStore>(
    cache: Arc<TtlCache<S>>,
    sweep_interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = cache.sweep();
                    if evicted > 0 {
                        tracing::debug!(evicted, remaining = cache.len(), "cache housekeeping sweep");
                    }
                }
            }
        }

        tracing::info!("cache housekeeping stopped");
    })
}
