//! Run configuration, validation, and error types.
//!
//! [`RunConfig`] is the input for [`Simulation::launch`](crate::Simulation::launch).
//! [`validate()`](RunConfig::validate) checks every structural invariant at
//! startup so that a bad configuration aborts before any worker is spawned.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use enclave_core::WorkerId;
use enclave_space::layout::split_even;
use enclave_space::{
    LayoutError, NeighborTopology, NeighborhoodKind, PartitionLayout, TopologyError,
};

// ── RelocationScope ────────────────────────────────────────────────

/// Where an unsatisfied agent may look for a new cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RelocationScope {
    /// Only inside the owning partition's box.
    #[default]
    Local,
    /// The box plus its ghost margin. Destinations in the margin are handed
    /// to the neighbour that owns them.
    Reach,
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`RunConfig::validate()`].
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// The neighbourhood kind or radius is invalid.
    Topology(TopologyError),
    /// The world cannot be tiled across the requested workers.
    Layout(LayoutError),
    /// A ratio is NaN or outside `[0, 1]`.
    InvalidRatio {
        /// Field name.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// `max_relocation_attempts` is zero.
    ZeroRelocationAttempts,
    /// `peer_timeout` is zero.
    ZeroTimeout,
    /// More agents than cells.
    TooManyAgents {
        /// Requested agents.
        agents: u64,
        /// Cells in the world.
        cells: u64,
    },
    /// A worker's agent share does not fit in its box.
    PartitionOverfull {
        /// The worker.
        worker: WorkerId,
        /// Agents assigned to it.
        agents: u64,
        /// Cells in its box.
        cells: u64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topology(e) => write!(f, "topology: {e}"),
            Self::Layout(e) => write!(f, "layout: {e}"),
            Self::InvalidRatio { name, value } => {
                write!(f, "{name} must be in [0, 1], got {value}")
            }
            Self::ZeroRelocationAttempts => {
                write!(f, "max_relocation_attempts must be at least 1")
            }
            Self::ZeroTimeout => write!(f, "peer_timeout must be non-zero"),
            Self::TooManyAgents { agents, cells } => {
                write!(f, "{agents} agents do not fit in {cells} cells")
            }
            Self::PartitionOverfull {
                worker,
                agents,
                cells,
            } => write!(
                f,
                "worker {worker} is assigned {agents} agents but owns only {cells} cells"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Topology(e) => Some(e),
            Self::Layout(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TopologyError> for ConfigError {
    fn from(e: TopologyError) -> Self {
        Self::Topology(e)
    }
}

impl From<LayoutError> for ConfigError {
    fn from(e: LayoutError) -> Self {
        Self::Layout(e)
    }
}

// ── RunConfig ──────────────────────────────────────────────────────

/// Parameters of one simulation run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    /// Grid columns. Default: 50.
    pub width: u32,
    /// Grid rows. Default: 50.
    pub height: u32,
    /// Number of worker threads (and partitions). Default: 1.
    pub workers: u32,
    /// Fraction of cells left empty. Default: 0.2.
    pub vacancy_ratio: f64,
    /// Exact agent count; overrides `vacancy_ratio` when set. Default: `None`.
    pub agent_count: Option<u64>,
    /// Minimum same-group neighbour fraction for satisfaction. Default: 0.5.
    pub threshold: f64,
    /// Fraction of agents that are satisfied unconditionally. Default: 0.0.
    pub always_satisfied_ratio: f64,
    /// Probability that a new agent belongs to group B. Default: 0.5.
    pub group_b_fraction: f64,
    /// Neighbourhood metric. Default: Moore.
    pub neighborhood: NeighborhoodKind,
    /// Neighbourhood radius. Default: 1.
    pub radius: i64,
    /// Tick budget; 0 stops right after initialisation. Default: 100.
    pub max_ticks: u64,
    /// Master seed. Default: 42.
    pub seed: u64,
    /// Random draws per unsatisfied agent per tick. Default: 100.
    pub max_relocation_attempts: u32,
    /// Where relocations may land. Default: [`RelocationScope::Local`].
    pub relocation_scope: RelocationScope,
    /// Emit one [`AgentRow`](crate::AgentRow) per agent per tick. Default: true.
    pub log_agents: bool,
    /// How long a worker may wait on its peers without receiving anything
    /// before declaring one lost. The clock restarts on every message, so
    /// this bounds silence, not the length of a phase. The coordinator
    /// allows twice this between worker reports. A worker whose own
    /// computation for one tick outlasts that is reported as lost, so
    /// raise it for very large partitions or loaded hosts. Default: 30 s.
    pub peer_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            width: 50,
            height: 50,
            workers: 1,
            vacancy_ratio: 0.2,
            agent_count: None,
            threshold: 0.5,
            always_satisfied_ratio: 0.0,
            group_b_fraction: 0.5,
            neighborhood: NeighborhoodKind::Moore,
            radius: 1,
            max_ticks: 100,
            seed: 42,
            max_relocation_attempts: 100,
            relocation_scope: RelocationScope::Local,
            log_agents: true,
            peer_timeout: Duration::from_secs(30),
        }
    }
}

impl RunConfig {
    /// Select the neighbourhood by preset name (`"4"`, `"8"`, `"12"`, `"24"`,
    /// `"48"`, `"80"`).
    pub fn set_neighborhood_preset(&mut self, name: &str) -> Result<(), ConfigError> {
        let t = NeighborTopology::from_name(name)?;
        self.neighborhood = t.kind();
        self.radius = i64::from(t.radius());
        Ok(())
    }

    /// Total cells in the world.
    pub fn cell_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Number of agents the run creates: `agent_count` if set, otherwise
    /// `cells * (1 - vacancy_ratio)` truncated toward zero.
    pub fn resolved_agent_count(&self) -> u64 {
        match self.agent_count {
            Some(n) => n,
            None => {
                let cells = self.cell_count() as f64;
                (cells * (1.0 - self.vacancy_ratio)).floor().max(0.0) as u64
            }
        }
    }

    /// Check every structural invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.plan().map(|_| ())
    }

    /// Validate and derive everything the workers share.
    pub(crate) fn plan(&self) -> Result<RunPlan, ConfigError> {
        for (name, value) in [
            ("threshold", self.threshold),
            ("vacancy_ratio", self.vacancy_ratio),
            ("always_satisfied_ratio", self.always_satisfied_ratio),
            ("group_b_fraction", self.group_b_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidRatio { name, value });
            }
        }
        if self.max_relocation_attempts == 0 {
            return Err(ConfigError::ZeroRelocationAttempts);
        }
        if self.peer_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        let topology = NeighborTopology::new(self.neighborhood, self.radius)?;
        let layout = PartitionLayout::new(self.width, self.height, self.workers, topology.reach())?;

        let agents = self.resolved_agent_count();
        let cells = self.cell_count();
        if agents > cells {
            return Err(ConfigError::TooManyAgents { agents, cells });
        }
        let shares = split_even(agents, self.workers);
        for (worker, &share) in layout.workers().zip(&shares) {
            let cells = layout.box_of(worker).cell_count() as u64;
            if share > cells {
                return Err(ConfigError::PartitionOverfull {
                    worker,
                    agents: share,
                    cells,
                });
            }
        }

        Ok(RunPlan {
            config: self.clone(),
            topology,
            layout,
            shares,
        })
    }
}

/// A validated configuration plus the derived topology, layout and agent
/// shares. Shared read-only by every worker.
#[derive(Debug)]
pub(crate) struct RunPlan {
    pub config: RunConfig,
    pub topology: NeighborTopology,
    pub layout: PartitionLayout,
    pub shares: Vec<u64>,
}

impl RunPlan {
    pub fn total_agents(&self) -> u64 {
        self.shares.iter().sum()
    }
}
