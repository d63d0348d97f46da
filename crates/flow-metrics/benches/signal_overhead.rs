//! Per-subscription overhead of metering a one-shot and a multi-value flow.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flow_metrics::prelude::*;
use flow_test_utils::{MetricsHarness, TestError};
use std::sync::Arc;

/// Consumer that requests everything and discards it.
struct Drain;

impl Subscriber<u64, TestError> for Drain {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        subscription.request(i64::MAX);
    }

    fn on_next(&self, value: u64) {
        black_box(value);
    }

    fn on_error(&self, error: TestError) {
        black_box(error);
    }

    fn on_complete(&self) {}
}

fn bench_mono(c: &mut Criterion) {
    let harness = MetricsHarness::new();
    let consumer: Arc<dyn Subscriber<u64, TestError>> = Arc::new(Drain);

    let plain = sources::just::<u64, TestError>(7);
    let metered = sources::just::<u64, TestError>(7).metrics_with(harness.registry(), None);

    let mut group = c.benchmark_group("mono_just");
    group.bench_function("plain", |b| b.iter(|| plain.subscribe(consumer.clone())));
    group.bench_function("metered", |b| {
        b.iter(|| metered.subscribe(consumer.clone()))
    });
    group.finish();
}

fn bench_flux(c: &mut Criterion) {
    let harness = MetricsHarness::new();
    let consumer: Arc<dyn Subscriber<u64, TestError>> = Arc::new(Drain);

    let mut group = c.benchmark_group("flux_from_iter");
    for len in [1_u64, 16, 256] {
        let metered = sources::from_iter::<u64, TestError>(0..len)
            .named("bench")
            .metrics_with(harness.registry(), None);
        group.bench_with_input(BenchmarkId::new("metered", len), &metered, |b, flow| {
            b.iter(|| flow.subscribe(consumer.clone()))
        });
    }
    group.finish();
}

criterion_group!(signal_overhead, bench_mono, bench_flux);
criterion_main!(signal_overhead);
