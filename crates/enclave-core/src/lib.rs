//! Core types for the Enclave segregation engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the identifiers, coordinates and agent state shared by the spatial,
//! migration and engine crates.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod agent;
pub mod id;

pub use agent::{Agent, Group};
pub use id::{AgentId, Coord, TickId, WorkerId};
