//! Enclave: a distributed Schelling segregation engine.
//!
//! This is the facade crate that re-exports the public API from all Enclave
//! sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use enclave::prelude::*;
//!
//! let mut config = RunConfig {
//!     width: 20,
//!     height: 20,
//!     workers: 4,
//!     max_ticks: 20,
//!     ..RunConfig::default()
//! };
//! config.set_neighborhood_preset("8").unwrap();
//!
//! let mut sink = MemorySink::new();
//! let summary = Simulation::run(config, &mut sink).unwrap();
//! assert_eq!(sink.aggregates.len() as u64, summary.ticks + 1);
//! if let Some(i) = summary.metric.as_f64() {
//!     assert!((-1.0..=1.0).contains(&i));
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `enclave-core` | IDs, coordinates, groups, agent state |
//! | [`space`] | `enclave-space` | Neighbourhoods, layouts, partitions |
//! | [`migrate`] | `enclave-migrate` | Agent records, cache, exchange steps |
//! | [`metric`] | `enclave-metric` | Global snapshot and Moran's I |
//! | [`engine`] | `enclave-engine` | Configuration, scheduler, sinks |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Identifiers, coordinates and agent state (`enclave-core`).
pub use enclave_core as types;

/// Spatial structures (`enclave-space`).
///
/// [`space::NeighborTopology`] offset tables, [`space::PartitionLayout`]
/// tiling and the per-worker [`space::SpatialPartition`].
pub use enclave_space as space;

/// Cross-partition migration (`enclave-migrate`).
pub use enclave_migrate as migrate;

/// End-of-run segregation metric (`enclave-metric`).
///
/// Also usable on its own: build a [`metric::GlobalSnapshot`] from any
/// grid and pass it to [`metric::morans_i`].
pub use enclave_metric as metric;

/// The scheduler (`enclave-engine`).
pub use enclave_engine as engine;

/// Common imports for typical Enclave usage.
///
/// ```rust
/// use enclave::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use enclave_core::{Agent, AgentId, Coord, Group, TickId, WorkerId};

    // Space
    pub use enclave_space::{NeighborTopology, NeighborhoodKind, PartitionLayout};

    // Metric
    pub use enclave_metric::{mean_defined, morans_i, GlobalSnapshot, MoranI};

    // Engine
    pub use enclave_engine::{
        AgentRow, AggregateRow, ConfigError, EngineError, MemorySink, NullSink, RelocationScope,
        RunConfig, RunSink, RunState, RunSummary, Simulation, TerminationReason, TickMetrics,
        TickOutcome, TracingSink,
    };
}
