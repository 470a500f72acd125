//! Log records produced for external collaborators, and where they go.
//!
//! The engine hands records to a [`RunSink`] on the coordinator thread. File
//! I/O, CSV layout and cross-run consolidation belong to the sink, not the
//! engine.

use enclave_core::{AgentId, Group, TickId, WorkerId};
use tracing::info;

use crate::scheduler::RunSummary;

/// One agent's state at the end of a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgentRow {
    /// The tick.
    pub tick: TickId,
    /// The agent.
    pub agent_id: AgentId,
    /// Worker that owned the agent after the exchange.
    pub owning_worker: WorkerId,
    /// The agent's group.
    pub group: Group,
    /// Outcome of this tick's evaluation.
    pub satisfied: bool,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

/// Whole-world tallies for a tick, summed across workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregateRow {
    /// The tick.
    pub tick: TickId,
    /// Satisfied agents.
    pub total_satisfied: u64,
    /// All agents.
    pub total_agents: u64,
}

impl AggregateRow {
    /// Agents not satisfied this tick.
    pub fn unsatisfied(&self) -> u64 {
        self.total_agents - self.total_satisfied
    }

    /// `total_satisfied / total_agents`, computed from the reduced sums.
    /// An empty world counts as fully satisfied.
    pub fn percent_satisfied(&self) -> f64 {
        if self.total_agents == 0 {
            1.0
        } else {
            self.total_satisfied as f64 / self.total_agents as f64
        }
    }
}

/// Receiver for a run's log records.
///
/// Agent rows arrive in worker order, then identity order, once per tick
/// (including tick 0, the initial layout) unless
/// [`RunConfig::log_agents`](crate::RunConfig::log_agents) is off. Every
/// method defaults to doing nothing.
pub trait RunSink: Send {
    /// One worker's agent rows for a tick.
    fn agent_rows(&mut self, rows: &[AgentRow]) {
        let _ = rows;
    }

    /// The reduced tally for a tick.
    fn aggregate(&mut self, row: &AggregateRow) {
        let _ = row;
    }

    /// The run has finished.
    fn finished(&mut self, summary: &RunSummary) {
        let _ = summary;
    }
}

impl<S: RunSink + ?Sized> RunSink for &mut S {
    fn agent_rows(&mut self, rows: &[AgentRow]) {
        (**self).agent_rows(rows)
    }

    fn aggregate(&mut self, row: &AggregateRow) {
        (**self).aggregate(row)
    }

    fn finished(&mut self, summary: &RunSummary) {
        (**self).finished(summary)
    }
}

impl<S: RunSink + ?Sized> RunSink for Box<S> {
    fn agent_rows(&mut self, rows: &[AgentRow]) {
        (**self).agent_rows(rows)
    }

    fn aggregate(&mut self, row: &AggregateRow) {
        (**self).aggregate(row)
    }

    fn finished(&mut self, summary: &RunSummary) {
        (**self).finished(summary)
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl RunSink for NullSink {}

/// Keeps every record in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    /// Agent rows in delivery order.
    pub agents: Vec<AgentRow>,
    /// Aggregate rows, one per tick.
    pub aggregates: Vec<AggregateRow>,
    /// The summary, once the run has finished.
    pub summary: Option<RunSummary>,
}

impl MemorySink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Agent rows for one tick.
    pub fn agents_at(&self, tick: TickId) -> impl Iterator<Item = &AgentRow> + '_ {
        self.agents.iter().filter(move |r| r.tick == tick)
    }
}

impl RunSink for MemorySink {
    fn agent_rows(&mut self, rows: &[AgentRow]) {
        self.agents.extend_from_slice(rows);
    }

    fn aggregate(&mut self, row: &AggregateRow) {
        self.aggregates.push(*row);
    }

    fn finished(&mut self, summary: &RunSummary) {
        self.summary = Some(summary.clone());
    }
}

/// Reports aggregate rows and the final summary through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl RunSink for TracingSink {
    fn aggregate(&mut self, row: &AggregateRow) {
        info!(
            tick = %row.tick,
            satisfied = row.total_satisfied,
            agents = row.total_agents,
            percent = row.percent_satisfied(),
            "tick tally"
        );
    }

    fn finished(&mut self, summary: &RunSummary) {
        info!(
            ticks = summary.ticks,
            reason = ?summary.reason,
            morans_i = %summary.metric,
            state_hash = format_args!("{:#018x}", summary.state_hash),
            "run finished"
        );
    }
}
