use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::support::helpers::{encode_aggregate, holdings, init_tracing, wait_until, PriceSource};
use anyhow::{bail, Result};
use fanout_pool::{Job, PoolError, Refresh, RuntimeConfig, Substrate};
use futures::future::BoxFuture;
use futures::FutureExt;

/// Reference table that fails on its first refresh.
#[derive(Default)]
struct Outposts {
    attempts: AtomicUsize,
}

impl Refresh for Outposts {
    fn refresh(&self) -> BoxFuture<'_, Result<()>> {
        async move {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                bail!("reference store unavailable");
            }
            Ok(())
        }
        .boxed()
    }
}

fn config() -> Result<RuntimeConfig> {
    RuntimeConfig::builder()
        .workers(3)
        .queue_capacity(16)
        .cache_sweep_interval(Duration::from_millis(50))
        .build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn substrate_serves_batches_and_maintenance() -> Result<()> {
    init_tracing();
    let mut substrate = Substrate::start(config()?)?;

    let outposts = Arc::new(Outposts::default());
    substrate.register_maintenance("@every 100ms", "outposts", outposts.clone())?;
    wait_until(Duration::from_secs(5), || {
        outposts.attempts.load(Ordering::SeqCst) >= 2
    })
    .await?;

    let prices = PriceSource::default();
    let source = prices.clone();
    let aggregate = substrate
        .coordinator()
        .process_default(holdings(50), move |holding| source.value(holding))
        .await;
    assert_eq!(aggregate.len(), 50);

    let ordered: BTreeMap<_, _> = aggregate.into_iter().collect();
    substrate
        .cache()
        .put_for("inventory:1", encode_aggregate(&ordered)?, substrate.config().cache_ttl());
    assert!(substrate.cache().get("inventory:1").is_some());
    assert_eq!(substrate.telemetry().submitted(), 3);

    substrate.shutdown().await;
    let err = substrate
        .pool()
        .submit(Job::from_future(async {}))
        .await
        .unwrap_err();
    assert_eq!(err, PoolError::Closed);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn housekeeping_evicts_expired_entries() -> Result<()> {
    init_tracing();
    let mut substrate = Substrate::start(config()?)?;
    let cache = substrate.cache().clone();

    cache.put_for("short", &b"soon gone"[..], Duration::from_millis(20));
    cache.put_for("long", &b"still here"[..], Duration::from_secs(60));
    assert_eq!(cache.len(), 2);

    wait_until(Duration::from_secs(5), || cache.len() == 1).await?;
    assert!(cache.get("short").is_none());
    assert!(cache.get("long").is_some());
    assert_eq!(cache.stats().snapshot().evicted, 1);

    substrate.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_maintenance_schedule_is_rejected() -> Result<()> {
    init_tracing();
    let mut substrate = Substrate::start(config()?)?;
    let outposts = Arc::new(Outposts::default());

    assert!(substrate
        .register_maintenance("sometimes", "outposts", outposts)
        .is_err());
    assert!(substrate.scheduler().tasks().is_empty());

    substrate.shutdown().await;
    Ok(())
}
