use std::collections::BTreeMap;
use std::sync::Arc;

use crate::support::helpers::{
    decode_aggregate, encode_aggregate, holdings, init_tracing, PriceSource,
};
use anyhow::Result;
use fanout_pool::{BatchCoordinator, TtlCache, WorkerPool, DEFAULT_CACHE_TTL, DEFAULT_CHUNK_SIZE};

fn coordinator(workers: usize) -> Result<BatchCoordinator> {
    Ok(BatchCoordinator::new(Arc::new(WorkerPool::new(workers)?)))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn miss_computes_then_hit_serves_cached_bytes() -> Result<()> {
    init_tracing();
    let coordinator = coordinator(4)?;
    let cache = TtlCache::in_memory();
    let prices = PriceSource::default();
    let key = "inventory:7";

    assert!(cache.get(key).is_none());

    let source = prices.clone();
    let aggregate = coordinator
        .process(holdings(45), DEFAULT_CHUNK_SIZE, move |holding| {
            source.value(holding)
        })
        .await;
    assert_eq!(aggregate.len(), 45);
    assert_eq!(coordinator.pool().telemetry().submitted(), 3);

    let ordered: BTreeMap<_, _> = aggregate.into_iter().collect();
    let encoded = encode_aggregate(&ordered)?;
    cache.put_for(key, encoded.clone(), DEFAULT_CACHE_TTL);

    let cached = cache.get(key).expect("aggregate should be cached");
    assert_eq!(cached, encoded);
    assert_eq!(decode_aggregate(&cached)?, ordered);
    assert_eq!(prices.lookups(), 45);

    let stats = cache.stats().snapshot();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.stores, 1);

    coordinator.pool().shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unpriced_items_are_missing_from_aggregate() -> Result<()> {
    init_tracing();
    let coordinator = coordinator(3)?;
    let prices = PriceSource::with_unpriced(vec![3, 30]);

    let source = prices.clone();
    let aggregate = coordinator
        .process(holdings(45), 20, move |holding| source.value(holding))
        .await;

    assert_eq!(prices.lookups(), 45);
    assert_eq!(aggregate.len(), 43);
    assert!(!aggregate.contains_key(&3));
    assert!(!aggregate.contains_key(&30));
    assert_eq!(aggregate[&4].value, u64::from(4u32 % 7 + 1) * 14);

    coordinator.pool().shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_fill_once() -> Result<()> {
    init_tracing();
    let coordinator = coordinator(4)?;
    let cache = Arc::new(TtlCache::in_memory());
    let prices = PriceSource::default();

    let mut callers = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let coordinator = coordinator.clone();
        let prices = prices.clone();
        callers.push(tokio::spawn(async move {
            cache
                .get_or_fill("inventory:42", DEFAULT_CACHE_TTL, || async move {
                    let source = prices.clone();
                    let aggregate = coordinator
                        .process(holdings(60), DEFAULT_CHUNK_SIZE, move |holding| {
                            source.value(holding)
                        })
                        .await;
                    let ordered: BTreeMap<_, _> = aggregate.into_iter().collect();
                    encode_aggregate(&ordered)
                })
                .await
        }));
    }

    let mut values = Vec::new();
    for caller in callers {
        values.push(caller.await??);
    }

    assert!(values.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(decode_aggregate(&values[0])?.len(), 60);
    assert_eq!(prices.lookups(), 60);
    assert_eq!(cache.len(), 1);

    coordinator.pool().shutdown().await;
    Ok(())
}
