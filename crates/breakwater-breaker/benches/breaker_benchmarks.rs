// Admission hot-path benchmarks for the circuit breaker
//
// Run with: cargo bench -p breakwater-breaker --bench breaker_benchmarks

use breakwater_breaker::{CircuitBreaker, ManualClock, TripPolicy};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn breaker(policy: TripPolicy) -> CircuitBreaker {
    CircuitBreaker::builder("bench")
        .reset_timeout(Duration::from_secs(60))
        .policy(policy)
        .clock(Arc::new(ManualClock::new()))
        .build()
        .unwrap()
}

fn benchmark_closed_call(c: &mut Criterion) {
    let breaker = breaker(TripPolicy::ConsecutiveFailures { threshold: 5 });

    c.bench_function("closed_call_sync", |b| {
        b.iter(|| {
            let result = breaker.call_sync(|| Ok::<_, ()>(black_box(1u64)));
            black_box(result)
        })
    });
}

fn benchmark_open_rejection(c: &mut Criterion) {
    let breaker = breaker(TripPolicy::ConsecutiveFailures { threshold: 1 });
    breaker.record_failure();

    c.bench_function("open_rejection", |b| {
        b.iter(|| black_box(breaker.try_acquire().is_err()))
    });
}

fn benchmark_async_call(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let breaker = breaker(TripPolicy::FailureRate {
        threshold: 0.5,
        min_requests: 100,
    });

    c.bench_function("closed_call_async", |b| {
        b.to_async(&rt).iter(|| async {
            let result = breaker.call(|| async { Ok::<_, ()>(black_box(1u64)) }).await;
            black_box(result)
        })
    });
}

criterion_group!(
    benches,
    benchmark_closed_call,
    benchmark_open_rejection,
    benchmark_async_call
);
criterion_main!(benches);
