//! Fan-out/fan-in over a [`WorkerPool`].
//!
//! Input items are split into chunks, one pool job per chunk. Every job pushes
//! its successful results into one bounded aggregation channel that a single
//! aggregator task drains into the result map. Items whose computation fails
//! are logged and left out; the caller only observes the missing keys.

use super::chunk::{plan_chunks, Chunk, DEFAULT_CHUNK_SIZE};
use super::tracker::{ChunkGuard, ChunkTracker};
use crate::pool::job::Job;
use crate::pool::worker_pool::WorkerPool;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default capacity of the channel carrying chunk results to the aggregator.
pub const DEFAULT_AGGREGATE_BUFFER: usize = 50;

/// A result that knows the key it is aggregated under.
pub trait Keyed {
    type Key: Eq + Hash + Send + 'static;

    fn key(&self) -> Self::Key;
}

impl<K, V> Keyed for (K, V)
where
    K: Clone + Eq + Hash + Send + 'static,
{
    type Key = K;

    fn key(&self) -> K {
        self.0.clone()
    }
}

#[derive(Clone)]
pub struct BatchCoordinator {
    pool: Arc<WorkerPool>,
    chunk_size: usize,
    aggregate_buffer: usize,
}

impl BatchCoordinator {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            pool,
            chunk_size: DEFAULT_CHUNK_SIZE,
            aggregate_buffer: DEFAULT_AGGREGATE_BUFFER,
        }
    }

    /// Sets the chunk size used by [`BatchCoordinator::process_default`].
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_aggregate_buffer(mut self, capacity: usize) -> Self {
        self.aggregate_buffer = capacity.max(1);
        self
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// [`BatchCoordinator::process`] with the configured chunk size.
    pub async fn process_default<I, R, F>(&self, items: Vec<I>, compute: F) -> HashMap<R::Key, R>
    where
        I: Send + Sync + 'static,
        R: Keyed + Send + 'static,
        F: Fn(&I) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        self.process(items, self.chunk_size, compute).await
    }

    /// Computes `compute` for every item across the pool and returns the
    /// results keyed by [`Keyed::key`].
    ///
    /// Blocks until every chunk job has finished or been discarded. When two
    /// results share a key, whichever reaches the aggregator last wins; chunks
    /// complete in no particular order.
    pub async fn process<I, R, F>(
        &self,
        items: Vec<I>,
        chunk_size: usize,
        compute: F,
    ) -> HashMap<R::Key, R>
    where
        I: Send + Sync + 'static,
        R: Keyed + Send + 'static,
        F: Fn(&I) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        let items: Arc<[I]> = items.into();
        let compute = Arc::new(compute);
        let chunks = plan_chunks(items.len(), chunk_size);
        let total_items = items.len();

        let (result_tx, mut result_rx) = mpsc::channel::<R>(self.aggregate_buffer);
        let aggregator = tokio::spawn(async move {
            let mut results = HashMap::new();
            let mut collapsed = 0usize;
            while let Some(result) = result_rx.recv().await {
                if results.insert(result.key(), result).is_some() {
                    collapsed += 1;
                }
            }
            if collapsed > 0 {
                tracing::debug!(collapsed, "duplicate result keys collapsed");
            }
            results
        });

        let tracker = Arc::new(ChunkTracker::new());
        for chunk in &chunks {
            let job = chunk_job(
                *chunk,
                Arc::clone(&items),
                Arc::clone(&compute),
                result_tx.clone(),
                tracker.enter(),
            );
            if let Err(err) = self.pool.submit(job).await {
                tracing::warn!(
                    chunk = chunk.index,
                    start = chunk.start,
                    len = chunk.len,
                    error = %err,
                    "failed to submit chunk; its items are omitted"
                );
            }
        }

        tracker.wait_until_idle().await;
        drop(result_tx);

        match aggregator.await {
            Ok(results) => {
                tracing::debug!(
                    items = total_items,
                    chunks = chunks.len(),
                    results = results.len(),
                    "batch aggregated"
                );
                results
            }
            Err(err) => {
                tracing::error!(error = %err, "batch aggregator task failed");
                HashMap::new()
            }
        }
    }
}

fn chunk_job<I, R, F>(
    chunk: Chunk,
    items: Arc<[I]>,
    compute: Arc<F>,
    result_tx: mpsc::Sender<R>,
    guard: ChunkGuard,
) -> Job
where
    I: Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(&I) -> anyhow::Result<R> + Send + Sync + 'static,
{
    Job::new(move || {
        let _guard = guard;
        for (offset, item) in items[chunk.range()].iter().enumerate() {
            match compute(item) {
                Ok(result) => {
                    if result_tx.blocking_send(result).is_err() {
                        tracing::warn!(chunk = chunk.index, "aggregator closed; abandoning chunk");
                        return;
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        chunk = chunk.index,
                        item = chunk.start + offset,
                        error = %err,
                        "item computation failed; omitting from aggregate"
                    );
                }
            }
        }
    })
}
