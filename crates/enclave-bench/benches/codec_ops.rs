//! Criterion micro-benchmarks for agent records and the global metric.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use enclave_core::{Agent, AgentId, Coord, Group, TickId, WorkerId};
use enclave_metric::{morans_i, GlobalSnapshot};
use enclave_migrate::{AgentCache, AgentRecord};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Benchmark: encode and decode 10K records.
fn bench_record_10k(c: &mut Criterion) {
    let agents: Vec<Agent> = (0..10_000u64)
        .map(|i| {
            let group = if i % 2 == 0 { Group::A } else { Group::B };
            Agent::new(AgentId::new(WorkerId((i % 8) as u32), i), group, 0.5, i % 7 == 0)
        })
        .collect();

    c.bench_function("record_encode_10k", |b| {
        b.iter(|| {
            for a in &agents {
                black_box(AgentRecord::serialize(a));
            }
        });
    });

    let records: Vec<AgentRecord> = agents.iter().map(AgentRecord::serialize).collect();
    c.bench_function("record_decode_10k", |b| {
        b.iter(|| {
            for r in &records {
                black_box(r.decode().unwrap());
            }
        });
    });

    c.bench_function("cache_reconstruct_10k", |b| {
        let mut cache = AgentCache::new();
        let mut tick = 0u64;
        b.iter(|| {
            tick += 1;
            for r in &records {
                black_box(cache.reconstruct(r, TickId(tick)).unwrap());
            }
        });
    });
}

/// Benchmark: Moran's I on a random 316x316 grid at 80% occupancy.
fn bench_morans_i_100k(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut snapshot = GlobalSnapshot::new(316, 316);
    for y in 0..316 {
        for x in 0..316 {
            let roll: f64 = rng.gen();
            if roll < 0.4 {
                snapshot.set(Coord::new(x, y), Group::A).unwrap();
            } else if roll < 0.8 {
                snapshot.set(Coord::new(x, y), Group::B).unwrap();
            }
        }
    }
    c.bench_function("morans_i_100k", |b| {
        b.iter(|| black_box(morans_i(&snapshot)));
    });
}

criterion_group!(benches, bench_record_10k, bench_morans_i_100k);
criterion_main!(benches);
