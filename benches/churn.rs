// Allocator churn benchmarks: single-thread acquire/release turnover at a
// handful of size classes, plus the oversize passthrough path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use slabcache::AllocatorConfig;
use slabcache::Allocator;

fn bench_single_class_churn(c: &mut Criterion) {
    let allocator = Allocator::new(AllocatorConfig::default()).unwrap();
    let mut group = c.benchmark_group("single_class_churn");

    for &size in &[8usize, 64, 192, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let p = allocator.acquire(size);
                black_box(p);
                allocator.release(p, size);
            });
        });
    }

    group.finish();
}

fn bench_typed_roundtrip(c: &mut Criterion) {
    let allocator = Allocator::new(AllocatorConfig::default()).unwrap();

    c.bench_function("typed_roundtrip_u64", |b| {
        b.iter(|| {
            let p = allocator.typed_acquire(0u64);
            black_box(p);
            unsafe { allocator.typed_release(p) };
        });
    });
}

fn bench_oversize_passthrough(c: &mut Criterion) {
    let allocator = Allocator::new(AllocatorConfig::default()).unwrap();

    c.bench_function("oversize_passthrough_4096", |b| {
        b.iter(|| {
            let p = allocator.acquire(4096);
            black_box(p);
            allocator.release(p, 4096);
        });
    });
}

criterion_group!(
    benches,
    bench_single_class_churn,
    bench_typed_roundtrip,
    bench_oversize_passthrough
);
criterion_main!(benches);
