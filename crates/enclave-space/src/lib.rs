//! Spatial structures for Enclave.
//!
//! - [`NeighborTopology`]: precomputed neighbourhood offset tables.
//! - [`BoundingBox`] and [`PartitionLayout`]: how the global grid is tiled
//!   across workers, and which workers border each other.
//! - [`SpatialPartition`]: one worker's owned region plus its read-only
//!   ghost margin, with single-occupancy bookkeeping.
//!
//! Borders are sticky everywhere: neighbour coordinates that fall off the
//! global grid are dropped, never wrapped.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bounds;
pub mod error;
pub mod layout;
pub mod partition;
pub mod topology;

pub use bounds::BoundingBox;
pub use error::{LayoutError, PartitionError, TopologyError};
pub use layout::PartitionLayout;
pub use partition::{Departure, MoveKind, Occupant, Role, SpatialPartition};
pub use topology::{NeighborTopology, NeighborhoodKind};
