//! Test fixtures for Enclave development.
//!
//! - [`grid_partition`]: a single-worker partition laid out from an ASCII
//!   map, for policy and census tests.
//! - [`quick_config`]: a small [`RunConfig`] with a short peer timeout.
//! - [`SharedSink`]: a [`RunSink`] whose records stay readable while a
//!   [`Simulation`](enclave_engine::Simulation) owns it.
//! - [`recount_satisfaction`]: brute-force satisfaction from logged rows.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use enclave_core::{Agent, AgentId, Coord, Group, WorkerId};
use enclave_engine::{AgentRow, AggregateRow, MemorySink, RunConfig, RunSink, RunSummary};
use enclave_space::{NeighborTopology, PartitionLayout, SpatialPartition};

/// Build a one-worker partition from rows of `A`, `B` and `.`.
///
/// Agents get identities `(0, n)` in row-major order of appearance.
///
/// # Panics
///
/// On ragged rows or any other character.
pub fn grid_partition(rows: &[&str], threshold: f64) -> SpatialPartition {
    let height = rows.len() as u32;
    let width = rows.first().map_or(0, |r| r.len()) as u32;
    let layout = PartitionLayout::new(width, height, 1, 1).expect("valid grid");
    let mut partition = SpatialPartition::from_layout(&layout, WorkerId(0));

    let mut next = 0u64;
    for (y, row) in rows.iter().enumerate() {
        assert_eq!(row.len() as u32, width, "ragged row {y}");
        for (x, ch) in row.chars().enumerate() {
            let group = match ch {
                'A' => Group::A,
                'B' => Group::B,
                '.' => continue,
                other => panic!("unexpected cell {other:?}"),
            };
            let agent = Agent::new(AgentId::new(WorkerId(0), next), group, threshold, false);
            partition
                .insert_owned(agent, Coord::new(x as i32, y as i32))
                .expect("distinct cells");
            next += 1;
        }
    }
    partition
}

/// A small, fast configuration: `width × height` over `workers`, ten ticks,
/// five-second peer timeout.
pub fn quick_config(width: u32, height: u32, workers: u32) -> RunConfig {
    RunConfig {
        width,
        height,
        workers,
        max_ticks: 10,
        peer_timeout: Duration::from_secs(5),
        ..RunConfig::default()
    }
}

/// A [`MemorySink`] behind an `Arc<Mutex<_>>`; clones share the records.
#[derive(Clone, Debug, Default)]
pub struct SharedSink {
    inner: Arc<Mutex<MemorySink>>,
}

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock and read the records so far.
    pub fn records(&self) -> MutexGuard<'_, MemorySink> {
        self.inner.lock().expect("sink lock poisoned")
    }
}

impl RunSink for SharedSink {
    fn agent_rows(&mut self, rows: &[AgentRow]) {
        self.records().agent_rows(rows);
    }

    fn aggregate(&mut self, row: &AggregateRow) {
        self.records().aggregate(row);
    }

    fn finished(&mut self, summary: &RunSummary) {
        self.records().finished(summary);
    }
}

/// Recompute each agent's satisfaction from one tick's rows, independently
/// of the engine's partitions. Borders are sticky; an agent with no
/// neighbours is satisfied.
pub fn recount_satisfaction(
    rows: &[AgentRow],
    width: u32,
    height: u32,
    topology: &NeighborTopology,
    threshold: f64,
) -> HashMap<AgentId, bool> {
    let mut grid: HashMap<(i32, i32), Group> = HashMap::new();
    for r in rows {
        let prev = grid.insert((r.x, r.y), r.group);
        assert!(prev.is_none(), "two agents at ({}, {})", r.x, r.y);
    }

    rows.iter()
        .map(|r| {
            let mut similar = 0usize;
            let mut total = 0usize;
            for &(dx, dy) in topology.offsets() {
                let (x, y) = (r.x + dx, r.y + dy);
                if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
                    continue;
                }
                if let Some(g) = grid.get(&(x, y)) {
                    total += 1;
                    if *g == r.group {
                        similar += 1;
                    }
                }
            }
            let satisfied = total == 0 || similar as f64 / total as f64 >= threshold;
            (r.agent_id, satisfied)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_partition_places_agents_in_reading_order() {
        let p = grid_partition(&["A.B", "..A"], 0.5);
        assert_eq!(p.owned_len(), 3);
        assert_eq!(p.locate(AgentId::new(WorkerId(0), 1)), Some(Coord::new(2, 0)));
        assert_eq!(p.agent(AgentId::new(WorkerId(0), 2)).unwrap().group, Group::A);
    }

    #[test]
    fn recount_matches_a_hand_count() {
        let row = |local, group, x, y| AgentRow {
            tick: Default::default(),
            agent_id: AgentId::new(WorkerId(0), local),
            owning_worker: WorkerId(0),
            group,
            satisfied: false,
            x,
            y,
        };
        let rows = [row(0, Group::A, 0, 0), row(1, Group::B, 1, 0), row(2, Group::A, 0, 1)];
        let topo = NeighborTopology::from_name("8").unwrap();
        let got = recount_satisfaction(&rows, 3, 3, &topo, 0.5);
        assert!(got[&AgentId::new(WorkerId(0), 0)]);
        assert!(!got[&AgentId::new(WorkerId(0), 1)]);
    }
}
