//! 迭代器源驱动快/慢路径的吞吐对比：无界请求（快路径）对比分批小额请求（慢路径）。
use criterion::{criterion_group, criterion_main, Criterion};
use spark_flow_core::prelude::*;
use std::sync::Arc;

fn fast_path(c: &mut Criterion) {
    c.bench_function("iterator_source_fast_path_10k", |b| {
        b.iter(|| {
            let publisher = from_values(0..10_000i64);
            let recorder = Arc::new(spark_flow_core::test_stubs::RecordingSubscriber::new());
            publisher.subscribe(recorder.clone());
            let subscription = recorder.subscription().unwrap();
            subscription.request(i64::MAX);
        });
    });
}

fn slow_path(c: &mut Criterion) {
    c.bench_function("iterator_source_slow_path_10k_in_batches_of_64", |b| {
        b.iter(|| {
            let publisher = from_values(0..10_000i64);
            let recorder = Arc::new(spark_flow_core::test_stubs::RecordingSubscriber::new());
            publisher.subscribe(recorder.clone());
            let subscription = recorder.subscription().unwrap();
            while !recorder.completed() {
                subscription.request(64);
            }
        });
    });
}

criterion_group!(benches, fast_path, slow_path);
criterion_main!(benches);
