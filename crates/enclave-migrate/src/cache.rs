//! Per-partition reconstruction cache.

use crate::error::MigrationError;
use crate::record::AgentRecord;
use enclave_core::{Agent, AgentId, TickId};
use indexmap::IndexMap;

#[derive(Clone, Copy, Debug)]
struct Entry {
    agent: Agent,
    seen: TickId,
}

/// Agents reconstructed from records, keyed by identity.
///
/// Reconstructing the same identity again updates the existing entry in
/// place instead of creating a second one, so refreshing a ghost every tick
/// costs no allocation. One cache belongs to one partition and lives as
/// long as it does.
#[derive(Debug, Default)]
pub struct AgentCache {
    entries: IndexMap<AgentId, Entry>,
}

impl AgentCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `record` and store it as seen at `tick`.
    ///
    /// Idempotent: the same record always yields the same agent.
    pub fn reconstruct(
        &mut self,
        record: &AgentRecord,
        tick: TickId,
    ) -> Result<Agent, MigrationError> {
        let decoded = record.decode()?;
        let entry = self.entries.entry(decoded.id).or_insert(Entry {
            agent: decoded,
            seen: tick,
        });
        entry.agent = decoded;
        entry.seen = tick;
        Ok(entry.agent)
    }

    /// Cached state for `id`.
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.entries.get(&id).map(|e| &e.agent)
    }

    /// Drop every entry not reconstructed at or after `tick`. Returns the
    /// number evicted.
    pub fn evict_older_than(&mut self, tick: TickId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.seen >= tick);
        before - self.entries.len()
    }

    /// Number of cached identities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
