//! End-of-run segregation metric for Enclave.
//!
//! The designated worker gathers every partition's owned agents into a
//! [`GlobalSnapshot`] and computes global Moran's I on it with [`morans_i`].
//! The statistic is only meaningful over the whole grid: computing it per
//! partition would undercount pairs that straddle a boundary.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod moran;
pub mod snapshot;

pub use moran::{mean_defined, morans_i, MoranI, UndefinedReason};
pub use snapshot::{GlobalSnapshot, SnapshotError};
