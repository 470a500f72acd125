//! Same seed and worker count, same run.

use enclave_engine::{MemorySink, RelocationScope, RunConfig, Simulation, TickMetrics};
use enclave_test_utils::quick_config;

fn run_twice(config: RunConfig) -> (MemorySink, MemorySink) {
    let mut first = MemorySink::new();
    let mut second = MemorySink::new();
    Simulation::run(config.clone(), &mut first).unwrap();
    Simulation::run(config, &mut second).unwrap();
    (first, second)
}

#[test]
fn single_worker_runs_are_identical() {
    let (a, b) = run_twice(quick_config(12, 12, 1));
    assert_eq!(a.aggregates, b.aggregates);
    assert_eq!(a.agents, b.agents);
    assert_eq!(a.summary, b.summary);
}

#[test]
fn four_worker_runs_are_identical() {
    let config = RunConfig {
        threshold: 0.6,
        ..quick_config(20, 20, 4)
    };
    let (a, b) = run_twice(config);
    let (sa, sb) = (a.summary.unwrap(), b.summary.unwrap());
    assert_eq!(sa.state_hash, sb.state_hash);
    assert_eq!(sa.snapshot, sb.snapshot);
    assert_eq!(a.aggregates, b.aggregates);
    assert_eq!(a.agents, b.agents);
}

#[test]
fn cross_boundary_runs_are_identical() {
    let config = RunConfig {
        threshold: 0.6,
        relocation_scope: RelocationScope::Reach,
        ..quick_config(20, 20, 4)
    };
    let (a, b) = run_twice(config);
    assert_eq!(a.summary, b.summary);
    assert_eq!(a.agents, b.agents);
}

#[test]
fn seed_changes_the_run() {
    let base = quick_config(16, 16, 2);
    let other = RunConfig {
        seed: base.seed + 1,
        ..base.clone()
    };
    let a = Simulation::run(base, MemorySink::new()).unwrap();
    let b = Simulation::run(other, MemorySink::new()).unwrap();
    assert_ne!(a.state_hash, b.state_hash);
}

#[test]
fn tick_metrics_repeat_except_timings() {
    let config = RunConfig {
        relocation_scope: RelocationScope::Reach,
        ..quick_config(20, 20, 4)
    };
    let counts = |config: RunConfig| {
        let mut sim = Simulation::launch(config, MemorySink::new()).unwrap();
        let mut out: Vec<TickMetrics> = Vec::new();
        while sim.state() == enclave_engine::RunState::Running {
            let mut m = sim.tick().unwrap().metrics;
            m.step_us = 0;
            m.exchange_us = 0;
            out.push(m);
        }
        out
    };
    assert_eq!(counts(config.clone()), counts(config));
}
