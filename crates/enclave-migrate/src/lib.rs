//! Cross-partition migration for Enclave.
//!
//! Agents cross worker boundaries as fixed-width [`AgentRecord`]s. The
//! receiving side rebuilds them through a per-partition [`AgentCache`], so a
//! ghost refreshed every tick maps onto the same cache entry. The
//! [`exchange`] module holds the partition-side half of each exchange
//! phase; moving the bytes between workers is the engine's job.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod error;
pub mod exchange;
pub mod record;

pub use cache::AgentCache;
pub use error::MigrationError;
pub use exchange::{
    admit_migrants, ghost_parcels, pack_migrants, refresh_ghosts, settle_departures, Admission,
    GhostRefresh, Parcel, Settlement,
};
pub use record::{AgentRecord, RECORD_LEN, RECORD_VERSION};
