//! Benchmark for the LRU+TTL cache primitive
//!
//! Target: get/set stay O(1) regardless of cache size

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use tiered_cache::cache::{FixedMemoryProbe, LruCache, LruConfig};

fn cache(max_size: usize) -> LruCache<Bytes> {
    let config = LruConfig::new(max_size, Duration::from_secs(300));
    LruCache::with_probe("bench", config, Arc::new(FixedMemoryProbe(0.1))).unwrap()
}

fn bench_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_cache");
    group.throughput(Throughput::Elements(1));

    for size in [1_000usize, 100_000] {
        let cache = cache(size);
        for i in 0..size {
            cache.set(&format!("key-{}", i), Bytes::from_static(b"value"), None).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("get_hit", size), &size, |b, &size| {
            let mut counter = 0usize;
            b.iter(|| {
                counter += 1;
                let key = format!("key-{}", counter % size);
                black_box(cache.get(black_box(&key)));
            });
        });
    }

    group.finish();
}

fn bench_set_with_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_cache");
    group.throughput(Throughput::Elements(1));

    for size in [1_000usize, 100_000] {
        let cache = cache(size);

        group.bench_with_input(BenchmarkId::new("set_evicting", size), &size, |b, _| {
            let mut counter = 0u64;
            b.iter(|| {
                counter += 1;
                let key = format!("key-{}", counter);
                let _ = cache.set(black_box(&key), Bytes::from_static(b"value"), None);
            });
        });
    }

    group.finish();
}

fn bench_mixed_workload(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_cache");
    group.throughput(Throughput::Elements(10));

    let cache = cache(10_000);
    for i in 0..10_000 {
        cache.set(&format!("key-{}", i), Bytes::from_static(b"value"), None).unwrap();
    }

    group.bench_function("mixed_9_reads_1_write", |b| {
        let mut counter = 0u64;
        b.iter(|| {
            for _ in 0..9 {
                counter += 1;
                black_box(cache.get(&format!("key-{}", counter % 20_000)));
            }
            counter += 1;
            let _ = cache.set(&format!("key-{}", counter % 20_000), Bytes::from_static(b"v"), None);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_get_hit, bench_set_with_eviction, bench_mixed_workload);
criterion_main!(benches);
