//! Criterion micro-benchmarks for neighbourhood and partition operations.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use enclave_core::{Coord, Group};
use enclave_space::{NeighborTopology, PartitionLayout};
use enclave_test_utils::grid_partition;

/// Benchmark: build every preset offset table.
fn bench_topology_presets(c: &mut Criterion) {
    c.bench_function("topology_presets", |b| {
        b.iter(|| {
            for name in ["4", "8", "12", "24", "48", "80"] {
                black_box(NeighborTopology::from_name(name).unwrap());
            }
        });
    });
}

/// Benchmark: census on all cells of a 100x100 striped partition.
fn bench_census_10k(c: &mut Criterion) {
    let rows: Vec<String> = (0..100)
        .map(|y| {
            (0..100)
                .map(|x| match (x + y) % 5 {
                    0 => '.',
                    1 | 2 => 'A',
                    _ => 'B',
                })
                .collect()
        })
        .collect();
    let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
    let partition = grid_partition(&rows, 0.5);

    for name in ["8", "24"] {
        let topology = NeighborTopology::from_name(name).unwrap();
        c.bench_function(&format!("census_10k_n{name}"), |b| {
            b.iter(|| {
                let mut similar = 0;
                for y in 0..100 {
                    for x in 0..100 {
                        similar += partition.census(Coord::new(x, y), Group::A, &topology).0;
                    }
                }
                black_box(similar);
            });
        });
    }
}

/// Benchmark: owner lookup for every cell of a 316x316 world over 8 workers.
fn bench_owner_of_100k(c: &mut Criterion) {
    let layout = PartitionLayout::new(316, 316, 8, 1).unwrap();
    c.bench_function("owner_of_100k", |b| {
        b.iter(|| {
            let mut n = 0u64;
            for y in 0..316 {
                for x in 0..316 {
                    if let Some(w) = layout.owner_of(Coord::new(x, y)) {
                        n += u64::from(w.0);
                    }
                }
            }
            black_box(n);
        });
    });
}

criterion_group!(
    benches,
    bench_topology_presets,
    bench_census_10k,
    bench_owner_of_100k
);
criterion_main!(benches);
