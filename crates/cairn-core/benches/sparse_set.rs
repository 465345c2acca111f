//! Benchmarks for the generation-checked slot pool.

use cairn_core::alloc::{
    HashMap,
    sparse_set::{IndexSlot, SparseSet},
};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

#[derive(Clone, Debug, Default)]
struct TextureRecord {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

fn bench_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparse_set_push");

    for size in [10, 100, 1000, 10000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut set = SparseSet::new();
                for _ in 0..size {
                    set.push(black_box(TextureRecord::default()));
                }
                set
            });
        });
    }

    group.finish();
}

fn bench_lookup_vs_hashmap(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparse_set_lookup");

    for size in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(size as u64));

        let mut set = SparseSet::new();
        let mut map = HashMap::new();
        let slots: Vec<IndexSlot> = (0..size)
            .map(|i| {
                let record = TextureRecord {
                    width: i,
                    height: i,
                    pixels: Vec::new(),
                };
                map.insert(i, record.clone());
                set.push(record)
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("sparse_set", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0u64;
                for &slot in &slots {
                    sum += set.get(black_box(slot)).width as u64;
                }
                black_box(sum)
            });
        });

        group.bench_with_input(BenchmarkId::new("hashmap", size), &size, |b, &size| {
            b.iter(|| {
                let mut sum = 0u64;
                for key in 0..size {
                    sum += map[&black_box(key)].height as u64;
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

fn bench_reuse_slots(c: &mut Criterion) {
    c.bench_function("sparse_set_reuse_slots", |b| {
        b.iter_batched(
            || {
                let mut set = SparseSet::new();
                let slots: Vec<_> = (0..1000).map(|_| set.push(TextureRecord::default())).collect();
                (set, slots)
            },
            |(mut set, slots)| {
                for slot in slots {
                    set.remove(slot);
                    set.push(TextureRecord::default());
                }
                set
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_push, bench_lookup_vs_hashmap, bench_reuse_slots);
criterion_main!(benches);
