use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::support::helpers::{init_tracing, wait_until};
use anyhow::{Context, Result};
use fanout_pool::{Job, PoolError, WorkerPool};
use tokio::sync::mpsc;
use tokio::time::timeout;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_submitted_job_runs_once() -> Result<()> {
    init_tracing();
    let pool = WorkerPool::new(4)?;
    let counter = Arc::new(AtomicUsize::new(0));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    for _ in 0..100 {
        let counter = counter.clone();
        let done_tx = done_tx.clone();
        pool.submit(Job::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = done_tx.send(());
        }))
        .await?;
    }
    drop(done_tx);

    let mut finished = 0;
    timeout(Duration::from_secs(10), async {
        while done_rx.recv().await.is_some() {
            finished += 1;
        }
    })
    .await
    .context("jobs did not finish in time")?;

    assert_eq!(finished, 100);
    assert_eq!(counter.load(Ordering::SeqCst), 100);
    assert!(pool.telemetry().peak_in_flight() <= 4);
    pool.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panic_does_not_reduce_concurrency() -> Result<()> {
    init_tracing();
    let size = 3;
    let pool = WorkerPool::new(size)?;
    let telemetry = pool.telemetry();

    pool.submit(Job::new(|| panic!("bad item"))).await?;
    wait_until(Duration::from_secs(5), || telemetry.panicked() == 1).await?;

    let arrived = Arc::new(AtomicUsize::new(0));
    let met = Arc::new(AtomicUsize::new(0));
    for _ in 0..size {
        let arrived = arrived.clone();
        let met = met.clone();
        pool.submit(Job::new(move || {
            arrived.fetch_add(1, Ordering::SeqCst);
            let deadline = Instant::now() + Duration::from_secs(5);
            while arrived.load(Ordering::SeqCst) < size && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(1));
            }
            if arrived.load(Ordering::SeqCst) == size {
                met.fetch_add(1, Ordering::SeqCst);
            }
        }))
        .await?;
    }

    wait_until(Duration::from_secs(10), || telemetry.completed() == 4).await?;
    assert_eq!(met.load(Ordering::SeqCst), size);
    assert_eq!(telemetry.peak_in_flight(), size);
    pool.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_submit_from_plain_thread() -> Result<()> {
    init_tracing();
    let pool = Arc::new(WorkerPool::new(2)?);
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    let submitter = {
        let pool = pool.clone();
        std::thread::spawn(move || {
            for n in 0..10 {
                let done_tx = done_tx.clone();
                pool.blocking_submit(Job::new(move || {
                    let _ = done_tx.send(n);
                }))?;
            }
            Ok::<_, PoolError>(())
        })
    };

    let mut seen = Vec::new();
    timeout(Duration::from_secs(10), async {
        while seen.len() < 10 {
            match done_rx.recv().await {
                Some(n) => seen.push(n),
                None => break,
            }
        }
    })
    .await
    .context("blocking submissions did not finish")?;
    submitter
        .join()
        .map_err(|_| anyhow::anyhow!("submitter thread panicked"))??;

    seen.sort_unstable();
    assert_eq!(seen, (0..10).collect::<Vec<_>>());
    pool.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stopped_pool_rejects_submissions() -> Result<()> {
    init_tracing();
    let pool = WorkerPool::new(2)?;
    pool.shutdown().await;

    let err = pool.submit(Job::from_future(async {})).await.unwrap_err();
    assert_eq!(err, PoolError::Closed);
    Ok(())
}
