//! Benchmarks for queue engine operations using criterion.
//!
//! These benchmarks measure:
//! - Join onto waiting lines of increasing depth
//! - Status lookups deep in a waiting line
//! - Sweeps that expire a full house and promote the next batch
//! - Full lifecycle (join → confirm → delete)

#![allow(missing_docs)]

use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;
use turnstile::ParticipantId;
use turnstile_testkit::{periodic_config, test_config, TestQueue};

/// Creates a tokio runtime for async benchmarks.
fn create_runtime() -> Runtime {
    Runtime::new().expect("Failed to create tokio runtime")
}

/// A periodic-mode queue with one connected participant and `depth` waiters.
fn filled_queue(rt: &Runtime, depth: usize) -> TestQueue {
    rt.block_on(async {
        let q = TestQueue::new(periodic_config(1)).await;
        q.engine.join("holder").await.expect("join");
        q.engine.tick().await.expect("tick");
        q.engine.confirm(&"holder".into()).await.expect("confirm");
        for i in 0..depth {
            q.engine.join(format!("w{i}")).await.expect("join");
        }
        q
    })
}

/// Benchmark: join behind an existing waiting line.
fn bench_join(c: &mut Criterion) {
    let rt = create_runtime();

    let mut group = c.benchmark_group("join");
    group.sample_size(50);

    for depth in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("waiting_depth", depth), &depth, |b, &depth| {
            let q = filled_queue(&rt, depth);
            let counter = AtomicU64::new(0);

            b.to_async(&rt).iter(|| async {
                let n = counter.fetch_add(1, Ordering::Relaxed);
                q.engine
                    .join(format!("bench-{n}"))
                    .await
                    .expect("join should succeed");
            });
        });
    }

    group.finish();
}

/// Benchmark: rank lookup for the last participant in line.
fn bench_status(c: &mut Criterion) {
    let rt = create_runtime();

    let mut group = c.benchmark_group("status");
    group.sample_size(100);

    for depth in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("tail_of_line", depth), &depth, |b, &depth| {
            let q = filled_queue(&rt, depth);
            let tail = ParticipantId::from(format!("w{}", depth - 1));

            b.to_async(&rt).iter(|| async {
                let position = q.engine.status(&tail).await.expect("status should succeed");
                assert_eq!(position.position, depth);
            });
        });
    }

    group.finish();
}

/// Benchmark: one sweep that expires every draft and promotes a new batch.
fn bench_sweep(c: &mut Criterion) {
    let rt = create_runtime();

    let mut group = c.benchmark_group("sweep_turnover");
    group.sample_size(30);

    for capacity in [10, 100, 500] {
        group.throughput(Throughput::Elements(capacity as u64));
        group.bench_with_input(
            BenchmarkId::new("capacity", capacity),
            &capacity,
            |b, &capacity| {
                let q = rt.block_on(TestQueue::new(periodic_config(capacity)));
                let counter = AtomicU64::new(0);

                b.to_async(&rt).iter(|| async {
                    for _ in 0..capacity {
                        let n = counter.fetch_add(1, Ordering::Relaxed);
                        q.engine.join(format!("p{n}")).await.expect("join");
                    }
                    q.advance(101);
                    q.engine.tick().await.expect("sweep should succeed");
                });
            },
        );
    }

    group.finish();
}

/// Benchmark: full participant lifecycle against the eager engine.
fn bench_lifecycle(c: &mut Criterion) {
    let rt = create_runtime();

    c.bench_function("lifecycle_join_confirm_delete", |b| {
        let q = rt.block_on(TestQueue::new(test_config(16)));
        let counter = AtomicU64::new(0);

        b.to_async(&rt).iter(|| async {
            let n = counter.fetch_add(1, Ordering::Relaxed);
            let id = ParticipantId::from(format!("p{n}"));
            q.engine.join(id.clone()).await.expect("join");
            q.engine.confirm(&id).await.expect("confirm");
            q.engine.delete(&id).await.expect("delete");
        });
    });
}

criterion_group!(benches, bench_join, bench_status, bench_sweep, bench_lifecycle);
criterion_main!(benches);
