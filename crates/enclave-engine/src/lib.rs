//! Multi-worker scheduler for the Enclave segregation engine.
//!
//! A run splits the grid across worker threads, one
//! [`SpatialPartition`](enclave_space::SpatialPartition) each, and advances
//! them in lockstep under a [`Simulation`] coordinator. Each tick, every
//! worker evaluates and relocates its own agents, hands boundary crossers to
//! their new owner and refreshes its ghost margin; the coordinator then
//! reduces the tallies and decides whether to stop. At the end, worker 0
//! gathers the whole grid and computes global Moran's I.
//!
//! Runs are deterministic for a fixed `(seed, workers)` pair.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
mod ledger;
pub mod metrics;
pub mod policy;
pub mod scheduler;
pub mod sink;
mod transport;
mod worker;

pub use config::{ConfigError, RelocationScope, RunConfig};
pub use error::EngineError;
pub use metrics::TickMetrics;
pub use scheduler::{RunState, RunSummary, Simulation, TerminationReason, TickOutcome};
pub use sink::{AgentRow, AggregateRow, MemorySink, NullSink, RunSink, TracingSink};
