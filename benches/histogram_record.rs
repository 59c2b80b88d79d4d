//! Histogram recording benchmarks.
//!
//! Measures value recording across precisions and the per-flush merge.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use instrument_core::{MetricsRegistry, Scope};

fn bench_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("histogram_record");
    let registry = MetricsRegistry::new();

    for sigfigs in [1u8, 2, 3] {
        let histogram = registry
            .new_histogram(&format!("latency.{}", sigfigs), 0, 60_000_000, sigfigs)
            .unwrap();
        let mut value = 1i64;

        group.throughput(Throughput::Elements(1));
        group.bench_function(BenchmarkId::from_parameter(sigfigs), |b| {
            b.iter(|| {
                value = (value * 7919) % 60_000_000;
                histogram.record_value(black_box(value)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_collect(c: &mut Criterion) {
    let registry = MetricsRegistry::new();
    let histogram = registry.new_histogram("latency", 0, 60_000, 3).unwrap();
    for v in 0..10_000 {
        histogram.record_value(v % 60_000).unwrap();
    }
    for i in 0..32 {
        registry.counter_add(&format!("counter.{}", i), i);
    }

    c.bench_function("metrics_collect", |b| {
        b.iter(|| black_box(registry.collect(&Scope::root())))
    });
}

fn bench_counter(c: &mut Criterion) {
    let registry = MetricsRegistry::new();
    registry.counter_add("hits", 0);

    c.bench_function("counter_add", |b| b.iter(|| registry.counter_add("hits", 1)));
}

criterion_group!(benches, bench_record, bench_collect, bench_counter);
criterion_main!(benches);
