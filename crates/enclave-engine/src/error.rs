//! Errors surfaced by the scheduler.

use std::error::Error;
use std::fmt;

use enclave_core::{AgentId, WorkerId};
use enclave_metric::SnapshotError;
use enclave_space::PartitionError;

use crate::config::ConfigError;
use crate::scheduler::RunState;

/// Errors from launching or driving a [`Simulation`](crate::Simulation).
#[derive(Clone, Debug, PartialEq)]
pub enum EngineError {
    /// The configuration failed validation. Nothing was spawned.
    Config(ConfigError),
    /// A worker broke a partition invariant.
    Partition(PartitionError),
    /// The end-of-run gather found two agents on one cell.
    Snapshot(SnapshotError),
    /// The identity→owner ledger found an agent owned by several workers
    /// (`owners.len() > 1`) or by none (`owners` empty).
    OwnershipConflict {
        /// The agent.
        agent: AgentId,
        /// Every worker that reported owning it.
        owners: Vec<WorkerId>,
    },
    /// A worker stopped responding or exited early.
    WorkerLost {
        /// The worker, if known.
        worker: Option<WorkerId>,
        /// What was observed.
        detail: String,
    },
    /// A worker thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of the failure.
        reason: String,
    },
    /// The simulation is not in the `Running` state.
    NotRunning {
        /// The state it is in.
        state: RunState,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Partition(e) => write!(f, "partition: {e}"),
            Self::Snapshot(e) => write!(f, "snapshot: {e}"),
            Self::OwnershipConflict { agent, owners } if owners.is_empty() => {
                write!(f, "agent {agent} is owned by no worker")
            }
            Self::OwnershipConflict { agent, owners } => {
                write!(f, "agent {agent} is owned by workers {owners:?}")
            }
            Self::WorkerLost {
                worker: Some(w),
                detail,
            } => write!(f, "worker {w} lost: {detail}"),
            Self::WorkerLost {
                worker: None,
                detail,
            } => write!(f, "worker lost: {detail}"),
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
            Self::NotRunning { state } => write!(f, "simulation is {state:?}, not running"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Partition(e) => Some(e),
            Self::Snapshot(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<PartitionError> for EngineError {
    fn from(e: PartitionError) -> Self {
        Self::Partition(e)
    }
}

impl From<SnapshotError> for EngineError {
    fn from(e: SnapshotError) -> Self {
        Self::Snapshot(e)
    }
}
