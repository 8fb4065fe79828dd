use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use fanout_pool::Keyed;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tracing_subscriber::EnvFilter;

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

/// One position in an inventory whose value is computed on the pool.
#[derive(Debug, Clone)]
pub struct Holding {
    pub id: u32,
    pub quantity: u32,
}

pub fn holdings(count: u32) -> Vec<Holding> {
    (0..count)
        .map(|id| Holding {
            id,
            quantity: id % 7 + 1,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub id: u32,
    pub value: u64,
}

impl Keyed for Valuation {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

/// Prices a holding, counting each lookup. Ids listed in `unpriced` fail.
#[derive(Clone, Default)]
pub struct PriceSource {
    lookups: Arc<AtomicUsize>,
    unpriced: Arc<Vec<u32>>,
}

impl PriceSource {
    pub fn with_unpriced(unpriced: Vec<u32>) -> Self {
        Self {
            lookups: Arc::default(),
            unpriced: Arc::new(unpriced),
        }
    }

    pub fn value(&self, holding: &Holding) -> Result<Valuation> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.unpriced.contains(&holding.id) {
            bail!("no price for item {}", holding.id);
        }
        Ok(Valuation {
            id: holding.id,
            value: u64::from(holding.quantity) * (u64::from(holding.id) + 10),
        })
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

/// Encodes an aggregate the way a handler would before caching it.
pub fn encode_aggregate<V: Serialize>(aggregate: &BTreeMap<u32, V>) -> Result<Bytes> {
    let raw = serde_json::to_vec(aggregate).context("failed to encode aggregate")?;
    Ok(Bytes::from(raw))
}

pub fn decode_aggregate(raw: &Bytes) -> Result<BTreeMap<u32, Valuation>> {
    serde_json::from_slice(raw).context("failed to decode aggregate")
}

/// Polls `condition` until it holds or `limit` elapses.
pub async fn wait_until<F>(limit: Duration, mut condition: F) -> Result<()>
where
    F: FnMut() -> bool,
{
    timeout(limit, async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .context("condition not reached before timeout")
}
