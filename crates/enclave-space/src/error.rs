//! Error types for topology construction, grid layout and partition updates.

use enclave_core::{AgentId, Coord};
use std::fmt;

/// Errors from building a [`NeighborTopology`](crate::NeighborTopology).
///
/// Both variants are configuration errors and are fatal at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TopologyError {
    /// The neighbourhood kind or preset name is not recognised.
    InvalidTopology {
        /// The rejected name.
        name: String,
    },
    /// The radius is not positive, or is larger than
    /// [`NeighborTopology::MAX_RADIUS`](crate::NeighborTopology::MAX_RADIUS).
    InvalidRadius {
        /// The rejected radius.
        radius: i64,
    },
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTopology { name } => write!(f, "unknown neighbourhood '{name}'"),
            Self::InvalidRadius { radius } => {
                write!(f, "neighbourhood radius must be in 1..=32, got {radius}")
            }
        }
    }
}

impl std::error::Error for TopologyError {}

/// Errors from tiling the world across workers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// The world has zero cells.
    EmptyWorld,
    /// Zero workers were requested.
    NoWorkers,
    /// No factorisation of the worker count gives every worker at least
    /// one row and one column.
    TooManyWorkers {
        /// Requested worker count.
        workers: u32,
        /// World width.
        width: u32,
        /// World height.
        height: u32,
    },
    /// A world dimension does not fit the `i32` coordinate space.
    DimensionTooLarge {
        /// Which dimension.
        name: &'static str,
        /// The rejected value.
        value: u32,
    },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyWorld => write!(f, "world must have at least one cell"),
            Self::NoWorkers => write!(f, "at least one worker is required"),
            Self::TooManyWorkers {
                workers,
                width,
                height,
            } => write!(
                f,
                "{workers} workers cannot tile a {width}x{height} world without empty partitions"
            ),
            Self::DimensionTooLarge { name, value } => {
                write!(f, "{name} = {value} exceeds i32::MAX")
            }
        }
    }
}

impl std::error::Error for LayoutError {}

/// Errors from mutating a [`SpatialPartition`](crate::SpatialPartition).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartitionError {
    /// The destination already holds a visible agent (owned or ghost).
    ///
    /// Recoverable: callers check vacancy first and treat a failed move
    /// as "stay put this tick".
    OccupiedCell {
        /// The contested cell.
        coord: Coord,
        /// The agent already there.
        occupant: AgentId,
    },
    /// The coordinate lies outside this partition's view (box plus margin).
    OutOfView {
        /// The rejected coordinate.
        coord: Coord,
    },
    /// The coordinate lies outside the partition's own box, where only
    /// owned placements are allowed.
    OutOfBounds {
        /// The rejected coordinate.
        coord: Coord,
    },
    /// The agent is visible here only as a ghost copy.
    NotOwned {
        /// The agent.
        id: AgentId,
    },
    /// The agent is not known to this partition at all.
    UnknownAgent {
        /// The agent.
        id: AgentId,
    },
    /// The agent already has a pending cross-partition move this tick.
    InTransit {
        /// The agent.
        id: AgentId,
    },
    /// The agent has no pending cross-partition move to resolve.
    NotDeparting {
        /// The agent.
        id: AgentId,
    },
    /// The identity is already owned here.
    DuplicateAgent {
        /// The agent.
        id: AgentId,
    },
}

impl fmt::Display for PartitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OccupiedCell { coord, occupant } => {
                write!(f, "cell {coord} is occupied by agent {occupant}")
            }
            Self::OutOfView { coord } => write!(f, "cell {coord} is outside the partition view"),
            Self::OutOfBounds { coord } => {
                write!(f, "cell {coord} is outside the partition bounds")
            }
            Self::NotOwned { id } => write!(f, "agent {id} is a ghost on this partition"),
            Self::UnknownAgent { id } => write!(f, "agent {id} is not on this partition"),
            Self::InTransit { id } => write!(f, "agent {id} already has a pending migration"),
            Self::NotDeparting { id } => write!(f, "agent {id} has no pending migration"),
            Self::DuplicateAgent { id } => write!(f, "agent {id} is already owned here"),
        }
    }
}

impl std::error::Error for PartitionError {}
