//! One worker's slice of the grid: owned agents plus a ghost margin.

use crate::bounds::BoundingBox;
use crate::error::PartitionError;
use crate::layout::PartitionLayout;
use crate::topology::NeighborTopology;
use enclave_core::{Agent, AgentId, Coord, Group, WorkerId};
use indexmap::IndexMap;
use rand::Rng;
use smallvec::SmallVec;

/// How an entry in the occupancy index relates to this partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// An agent owned here, sitting at its canonical position.
    Owned,
    /// A read-only copy of an agent owned by a neighbouring partition.
    Ghost,
    /// The origin cell of an owned agent that is migrating out. Held until
    /// the receiver answers so a rejected agent can always return.
    Reserved,
    /// A margin cell targeted by an outbound agent this tick.
    Claimed,
}

/// An entry in the occupancy index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Occupant {
    /// The agent holding the cell.
    pub id: AgentId,
    /// Why it is there.
    pub role: Role,
}

/// Outcome of a successful [`SpatialPartition::move_agent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveKind {
    /// The destination is inside this partition's box; the move is final.
    Local,
    /// The destination is in the ghost margin. The agent is now a pending
    /// departure until [`SpatialPartition::complete_departure`] or
    /// [`SpatialPartition::cancel_departure`].
    Outbound,
}

/// An owned agent waiting for a cross-partition hand-off.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Departure {
    /// Agent state at the time of departure.
    pub agent: Agent,
    /// Reserved origin cell.
    pub from: Coord,
    /// Claimed destination in the margin.
    pub to: Coord,
}

#[derive(Clone, Copy, Debug)]
struct Resident {
    agent: Agent,
    at: Coord,
    pending: Option<Coord>,
}

/// A worker's rectangular region of the grid plus its ghost margin.
///
/// The partition keeps a dense single-occupancy index over its *view* (the
/// box expanded by the margin and clipped to the world). Owned agents may
/// only sit inside the box; ghosts only in the margin. Ghosts are never
/// patched: [`replace_ghosts`](Self::replace_ghosts) swaps the whole mirror.
#[derive(Debug)]
pub struct SpatialPartition {
    worker: WorkerId,
    world: BoundingBox,
    bounds: BoundingBox,
    view: BoundingBox,
    cells: Vec<Option<Occupant>>,
    owned: IndexMap<AgentId, Resident>,
    ghosts: IndexMap<AgentId, (Agent, Coord)>,
}

impl SpatialPartition {
    /// An empty partition owning `bounds` with a ghost margin of `margin`
    /// cells, inside a world described by `world`.
    pub fn new(worker: WorkerId, bounds: BoundingBox, margin: u32, world: BoundingBox) -> Self {
        let view = bounds.expand(margin, &world);
        Self {
            worker,
            world,
            bounds,
            view,
            cells: vec![None; view.cell_count()],
            owned: IndexMap::new(),
            ghosts: IndexMap::new(),
        }
    }

    /// The partition `layout` assigns to `worker`.
    pub fn from_layout(layout: &PartitionLayout, worker: WorkerId) -> Self {
        Self::new(
            worker,
            layout.box_of(worker),
            layout.margin(),
            layout.world(),
        )
    }

    // ── Accessors ──────────────────────────────────────────────

    /// Owning worker.
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// The owned region.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// The owned region plus margin, clipped to the world.
    pub fn view(&self) -> BoundingBox {
        self.view
    }

    /// The whole world.
    pub fn world(&self) -> BoundingBox {
        self.world
    }

    /// Number of owned agents, including pending departures.
    pub fn owned_len(&self) -> usize {
        self.owned.len()
    }

    /// Number of ghost copies.
    pub fn ghost_len(&self) -> usize {
        self.ghosts.len()
    }

    // ── Queries ────────────────────────────────────────────────

    /// Current position of an owned or ghost agent.
    ///
    /// A pending departure still reports its origin.
    pub fn locate(&self, id: AgentId) -> Option<Coord> {
        self.owned
            .get(&id)
            .map(|r| r.at)
            .or_else(|| self.ghosts.get(&id).map(|g| g.1))
    }

    /// State of an owned or ghost agent.
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.owned
            .get(&id)
            .map(|r| &r.agent)
            .or_else(|| self.ghosts.get(&id).map(|g| &g.0))
    }

    /// Mutable state of an owned agent.
    pub fn agent_mut(&mut self, id: AgentId) -> Result<&mut Agent, PartitionError> {
        if self.ghosts.contains_key(&id) {
            return Err(PartitionError::NotOwned { id });
        }
        self.owned
            .get_mut(&id)
            .map(|r| &mut r.agent)
            .ok_or(PartitionError::UnknownAgent { id })
    }

    /// True if `id` is owned here.
    pub fn owns(&self, id: AgentId) -> bool {
        self.owned.contains_key(&id)
    }

    /// The index entry at `c`, if any. `None` also for cells outside the view.
    pub fn occupant(&self, c: Coord) -> Option<Occupant> {
        self.view.index_of(c).and_then(|i| self.cells[i])
    }

    /// Agents visible at `c`: owned, ghost, reserved or claimed. At most one
    /// entry; an empty list means vacant.
    pub fn occupants_at(&self, c: Coord) -> SmallVec<[Occupant; 1]> {
        self.occupant(c).into_iter().collect()
    }

    /// True if `c` is inside the view and nothing holds it.
    pub fn is_vacant(&self, c: Coord) -> bool {
        matches!(self.view.index_of(c), Some(i) if self.cells[i].is_none())
    }

    /// Agents in the neighbourhood of `c`, in offset order.
    ///
    /// Offsets that leave the world are dropped (sticky border). Offsets that
    /// leave the view are dropped too; a margin of at least `topology.reach()`
    /// makes that impossible for cells inside the box.
    pub fn neighbour_occupants(
        &self,
        c: Coord,
        topology: &NeighborTopology,
    ) -> SmallVec<[Occupant; 8]> {
        topology
            .offsets()
            .iter()
            .map(|&(dx, dy)| c.offset(dx, dy))
            .filter(|n| self.world.contains(*n))
            .filter_map(|n| self.occupant(n))
            .filter(|o| o.role != Role::Claimed)
            .collect()
    }

    /// `(same-group, total)` neighbour counts around `c` for `group`.
    pub fn census(&self, c: Coord, group: Group, topology: &NeighborTopology) -> (usize, usize) {
        let mut similar = 0;
        let mut total = 0;
        for o in self.neighbour_occupants(c, topology) {
            if let Some(a) = self.agent(o.id) {
                total += 1;
                if a.group == group {
                    similar += 1;
                }
            }
        }
        (similar, total)
    }

    /// Owned identities in ascending order.
    pub fn owned_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.owned.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Owned agents (and their positions) inside `region`, ascending by id.
    pub fn owned_in(&self, region: &BoundingBox) -> Vec<(Agent, Coord)> {
        let mut out: Vec<(Agent, Coord)> = self
            .owned
            .values()
            .filter(|r| region.contains(r.at))
            .map(|r| (r.agent, r.at))
            .collect();
        out.sort_unstable_by_key(|(a, _)| a.id);
        out
    }

    /// Every owned agent and position, ascending by id.
    pub fn owned_agents(&self) -> Vec<(Agent, Coord)> {
        self.owned_in(&self.bounds)
    }

    /// Ghost identities in ascending order.
    pub fn ghost_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.ghosts.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Vacant cells of the owned box, row-major.
    pub fn vacant_local_cells(&self) -> Vec<Coord> {
        self.bounds.iter().filter(|c| self.is_vacant(*c)).collect()
    }

    /// Uniformly random coordinate inside the owned box (never the margin).
    pub fn random_local_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Coord {
        Self::random_point_in(&self.bounds, rng)
    }

    /// Uniformly random coordinate inside `region`.
    pub fn random_point_in<R: Rng + ?Sized>(region: &BoundingBox, rng: &mut R) -> Coord {
        let x = rng.gen_range(region.x0..region.x1());
        let y = rng.gen_range(region.y0..region.y1());
        Coord::new(x, y)
    }

    // ── Owned mutations ────────────────────────────────────────

    /// Place a new or arriving agent at `at`, which must be a vacant cell in
    /// the owned box.
    pub fn insert_owned(&mut self, agent: Agent, at: Coord) -> Result<(), PartitionError> {
        if self.owned.contains_key(&agent.id) {
            return Err(PartitionError::DuplicateAgent { id: agent.id });
        }
        if !self.bounds.contains(at) {
            return Err(PartitionError::OutOfBounds { coord: at });
        }
        let idx = self.slot(at)?;
        self.cells[idx] = Some(Occupant {
            id: agent.id,
            role: Role::Owned,
        });
        self.owned.insert(
            agent.id,
            Resident {
                agent,
                at,
                pending: None,
            },
        );
        Ok(())
    }

    /// Take an owned agent off the grid entirely.
    pub fn remove_owned(&mut self, id: AgentId) -> Result<(Agent, Coord), PartitionError> {
        let resident = self.resident(id)?;
        if resident.pending.is_some() {
            return Err(PartitionError::InTransit { id });
        }
        self.owned.shift_remove(&id);
        self.clear(resident.at);
        Ok((resident.agent, resident.at))
    }

    /// Relocate an owned agent to `dest`.
    ///
    /// Fails with [`PartitionError::OccupiedCell`] if anything holds `dest`
    /// (including the agent itself). A destination inside the box completes
    /// immediately; one in the margin becomes a pending departure.
    pub fn move_agent(&mut self, id: AgentId, dest: Coord) -> Result<MoveKind, PartitionError> {
        let resident = self.resident(id)?;
        if resident.pending.is_some() {
            return Err(PartitionError::InTransit { id });
        }
        let dest_idx = self.slot(dest)?;
        let from_idx = self.slot_of(resident.at)?;

        if self.bounds.contains(dest) {
            self.cells[from_idx] = None;
            self.cells[dest_idx] = Some(Occupant {
                id,
                role: Role::Owned,
            });
            if let Some(r) = self.owned.get_mut(&id) {
                r.at = dest;
            }
            Ok(MoveKind::Local)
        } else {
            self.cells[from_idx] = Some(Occupant {
                id,
                role: Role::Reserved,
            });
            self.cells[dest_idx] = Some(Occupant {
                id,
                role: Role::Claimed,
            });
            if let Some(r) = self.owned.get_mut(&id) {
                r.pending = Some(dest);
            }
            Ok(MoveKind::Outbound)
        }
    }

    /// Pending departures, ascending by id.
    pub fn departures(&self) -> Vec<Departure> {
        let mut out: Vec<Departure> = self
            .owned
            .values()
            .filter_map(|r| {
                r.pending.map(|to| Departure {
                    agent: r.agent,
                    from: r.at,
                    to,
                })
            })
            .collect();
        out.sort_unstable_by_key(|d| d.agent.id);
        out
    }

    /// The receiver accepted `id`: release it and both of its cells.
    pub fn complete_departure(&mut self, id: AgentId) -> Result<Agent, PartitionError> {
        let resident = self.resident(id)?;
        let Some(to) = resident.pending else {
            return Err(PartitionError::NotDeparting { id });
        };
        self.owned.shift_remove(&id);
        self.clear(resident.at);
        self.clear(to);
        Ok(resident.agent)
    }

    /// The receiver refused `id`: put it back on its reserved origin.
    pub fn cancel_departure(&mut self, id: AgentId) -> Result<Coord, PartitionError> {
        let resident = self.resident(id)?;
        let Some(to) = resident.pending else {
            return Ok(resident.at);
        };
        self.clear(to);
        let idx = self.slot_of(resident.at)?;
        self.cells[idx] = Some(Occupant {
            id,
            role: Role::Owned,
        });
        if let Some(r) = self.owned.get_mut(&id) {
            r.pending = None;
        }
        Ok(resident.at)
    }

    // ── Ghost mirror ───────────────────────────────────────────

    /// Replace the ghost mirror wholesale.
    ///
    /// Entries outside the margin, or on a cell that is not free, are
    /// skipped; the count of skipped entries is returned.
    pub fn replace_ghosts<I>(&mut self, ghosts: I) -> usize
    where
        I: IntoIterator<Item = (Agent, Coord)>,
    {
        for (_, at) in std::mem::take(&mut self.ghosts).into_values() {
            self.clear(at);
        }
        let mut skipped = 0;
        for (agent, at) in ghosts {
            let free = !self.bounds.contains(at)
                && !self.owned.contains_key(&agent.id)
                && !self.ghosts.contains_key(&agent.id)
                && self.is_vacant(at);
            match self.view.index_of(at) {
                Some(idx) if free => {
                    self.cells[idx] = Some(Occupant {
                        id: agent.id,
                        role: Role::Ghost,
                    });
                    self.ghosts.insert(agent.id, (agent, at));
                }
                _ => skipped += 1,
            }
        }
        skipped
    }

    /// True if the occupancy index and the agent maps agree cell for cell.
    ///
    /// Intended for tests and debug assertions.
    pub fn is_consistent(&self) -> bool {
        let mut expected = 0usize;
        for (id, r) in &self.owned {
            let origin_role = if r.pending.is_some() {
                Role::Reserved
            } else {
                Role::Owned
            };
            let holds = |c: Coord, role: Role| {
                self.occupant(c) == Some(Occupant { id: *id, role })
            };
            if !holds(r.at, origin_role) {
                return false;
            }
            expected += 1;
            if let Some(to) = r.pending {
                if !holds(to, Role::Claimed) {
                    return false;
                }
                expected += 1;
            }
        }
        for (id, (_, at)) in &self.ghosts {
            let ghost = Occupant {
                id: *id,
                role: Role::Ghost,
            };
            if self.occupant(*at) != Some(ghost) {
                return false;
            }
            expected += 1;
        }
        self.cells.iter().filter(|c| c.is_some()).count() == expected
    }

    // ── Internals ──────────────────────────────────────────────

    fn resident(&self, id: AgentId) -> Result<Resident, PartitionError> {
        if let Some(r) = self.owned.get(&id) {
            return Ok(*r);
        }
        if self.ghosts.contains_key(&id) {
            return Err(PartitionError::NotOwned { id });
        }
        Err(PartitionError::UnknownAgent { id })
    }

    /// Index of a vacant cell in the view.
    fn slot(&self, c: Coord) -> Result<usize, PartitionError> {
        let idx = self.slot_of(c)?;
        match self.cells[idx] {
            Some(o) => Err(PartitionError::OccupiedCell {
                coord: c,
                occupant: o.id,
            }),
            None => Ok(idx),
        }
    }

    fn slot_of(&self, c: Coord) -> Result<usize, PartitionError> {
        self.view
            .index_of(c)
            .ok_or(PartitionError::OutOfView { coord: c })
    }

    fn clear(&mut self, c: Coord) {
        if let Some(i) = self.view.index_of(c) {
            self.cells[i] = None;
        }
    }
}
