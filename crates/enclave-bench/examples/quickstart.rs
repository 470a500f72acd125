//! Run one simulation and print the per-tick tallies.
//!
//! `RUST_LOG=enclave_engine=debug cargo run --example quickstart` shows the
//! per-tick reductions as well.

use enclave_bench::reference_profile;
use enclave_engine::{RunState, Simulation, TracingSink};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Enclave quickstart ===\n");

    let config = reference_profile(42);
    let mut sim = match Simulation::launch(config, TracingSink) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("launch failed: {e}");
            std::process::exit(1);
        }
    };
    println!(
        "tick 0: {:.1}% satisfied",
        sim.last_tally().percent_satisfied() * 100.0
    );

    while sim.state() == RunState::Running {
        match sim.tick() {
            Ok(out) => println!(
                "tick {}: {:.1}% satisfied, {} moves, {} stuck",
                out.tick,
                out.tally.percent_satisfied() * 100.0,
                out.metrics.local_moves,
                out.metrics.stuck,
            ),
            Err(e) => {
                eprintln!("tick failed: {e}");
                std::process::exit(1);
            }
        }
    }

    match sim.finish() {
        Ok(summary) => {
            println!("\nstopped after {} ticks: {:?}", summary.ticks, summary.reason);
            println!("Moran's I: {}", summary.metric);
            println!("state hash: {:#018x}", summary.state_hash);
        }
        Err(e) => {
            eprintln!("finish failed: {e}");
            std::process::exit(1);
        }
    }
}
