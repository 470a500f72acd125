//! Criterion benchmarks for whole runs.

use criterion::{criterion_group, criterion_main, Criterion};
use enclave_bench::{reference_profile, stress_profile};
use enclave_engine::{NullSink, RunState, Simulation};

/// Benchmark: launch plus 20 ticks of the reference profile.
fn bench_reference_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("run");
    group.sample_size(10);
    group.bench_function("reference_100x100_w4", |b| {
        b.iter(|| Simulation::run(reference_profile(42), NullSink).unwrap());
    });
    group.finish();
}

/// Benchmark: per-tick cost on the stress profile, excluding launch.
fn bench_stress_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    group.sample_size(10);
    group.bench_function("stress_316x316_w8", |b| {
        let mut config = stress_profile(7);
        config.max_ticks = u64::MAX;
        let mut sim = Simulation::launch(config, NullSink).unwrap();
        b.iter(|| {
            if sim.state() == RunState::Running {
                sim.tick().unwrap();
            }
        });
        let _ = sim.finish();
    });
    group.finish();
}

criterion_group!(benches, bench_reference_run, bench_stress_tick);
criterion_main!(benches);
