//! Benchmark profiles for the Enclave segregation engine.
//!
//! - [`reference_profile`]: 100x100 grid (10K cells), four workers
//! - [`stress_profile`]: 316x316 grid (~100K cells), eight workers,
//!   cross-boundary relocation

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::time::Duration;

use enclave_engine::{RelocationScope, RunConfig};

/// Reference profile: 100x100, Moore r1, threshold 0.5, 20% vacancy.
pub fn reference_profile(seed: u64) -> RunConfig {
    RunConfig {
        width: 100,
        height: 100,
        workers: 4,
        max_ticks: 20,
        seed,
        log_agents: false,
        peer_timeout: Duration::from_secs(60),
        ..RunConfig::default()
    }
}

/// Stress profile: 316x316 over eight workers with `Reach` relocation, so
/// every tick exercises the migrant exchange.
pub fn stress_profile(seed: u64) -> RunConfig {
    RunConfig {
        width: 316,
        height: 316,
        workers: 8,
        threshold: 0.6,
        relocation_scope: RelocationScope::Reach,
        ..reference_profile(seed)
    }
}
