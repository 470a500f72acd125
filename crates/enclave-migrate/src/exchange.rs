//! Partition-side steps of the three-phase exchange.
//!
//! A tick's exchange is, per worker:
//!
//! 1. [`pack_migrants`] and send each batch to the destination owner;
//!    receivers run [`admit_migrants`].
//! 2. Receivers return the accepted identities; senders run
//!    [`settle_departures`].
//! 3. Every worker sends [`ghost_parcels`] to each neighbour; neighbours run
//!    [`refresh_ghosts`].
//!
//! The transport and the barriers between phases belong to the caller.

use crate::cache::AgentCache;
use crate::record::AgentRecord;
use enclave_core::{Agent, AgentId, Coord, TickId, WorkerId};
use enclave_space::{BoundingBox, PartitionError, PartitionLayout, SpatialPartition};
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::{debug, warn};

/// An encoded agent and the cell it occupies (ghosts) or targets (migrants).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parcel {
    /// Encoded agent.
    pub record: AgentRecord,
    /// Position.
    pub at: Coord,
}

impl Parcel {
    /// Encode `agent` at `at`.
    pub fn new(agent: &Agent, at: Coord) -> Self {
        Self {
            record: AgentRecord::serialize(agent),
            at,
        }
    }
}

/// Pending departures grouped by the worker owning each destination.
///
/// A departure whose destination has no other owner is cancelled on the
/// spot.
pub fn pack_migrants(
    partition: &mut SpatialPartition,
    layout: &PartitionLayout,
) -> Result<IndexMap<WorkerId, Vec<Parcel>>, PartitionError> {
    let me = partition.worker();
    let mut out: IndexMap<WorkerId, Vec<Parcel>> = IndexMap::new();
    for dep in partition.departures() {
        match layout.owner_of(dep.to) {
            Some(owner) if owner != me => {
                out.entry(owner)
                    .or_default()
                    .push(Parcel::new(&dep.agent, dep.to));
            }
            _ => {
                partition.cancel_departure(dep.agent.id)?;
            }
        }
    }
    Ok(out)
}

/// Result of [`admit_migrants`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Admission {
    /// Accepted identities per sending worker.
    pub accepted: IndexMap<WorkerId, Vec<AgentId>>,
    /// Well-formed migrants refused (cell taken or not ours).
    pub rejected: usize,
    /// Records dropped as corrupt.
    pub corrupt: usize,
}

/// Take ownership of incoming migrants.
///
/// Migrants are considered in ascending identity order regardless of which
/// worker sent them. Each is accepted only if its destination is a vacant
/// cell of this partition's box. Corrupt records are dropped with a
/// warning; their sender restores them because they are never acknowledged.
pub fn admit_migrants(
    partition: &mut SpatialPartition,
    cache: &mut AgentCache,
    tick: TickId,
    mut inbox: Vec<(WorkerId, Vec<Parcel>)>,
) -> Admission {
    inbox.sort_by_key(|(from, _)| *from);
    let me = partition.worker();
    let mut admission = Admission::default();

    let mut arrivals: Vec<(Agent, Coord, WorkerId)> = Vec::new();
    for (from, parcels) in inbox {
        for parcel in parcels {
            match cache.reconstruct(&parcel.record, tick) {
                Ok(agent) => arrivals.push((agent, parcel.at, from)),
                Err(e) => {
                    warn!(worker = %me, from = %from, tick = %tick, error = %e, "dropping migrant");
                    admission.corrupt += 1;
                }
            }
        }
    }
    arrivals.sort_by_key(|(agent, _, _)| agent.id);

    for (agent, at, from) in arrivals {
        match partition.insert_owned(agent, at) {
            Ok(()) => admission.accepted.entry(from).or_default().push(agent.id),
            Err(e) => {
                debug!(worker = %me, agent = %agent.id, error = %e, "migrant rejected");
                admission.rejected += 1;
            }
        }
    }
    admission
}

/// Result of [`settle_departures`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Settlement {
    /// Agents handed off to another worker.
    pub departed: usize,
    /// Agents returned to their reserved origin.
    pub restored: usize,
}

/// Resolve every pending departure against the acknowledgements received.
pub fn settle_departures(
    partition: &mut SpatialPartition,
    accepted: &HashSet<AgentId>,
) -> Result<Settlement, PartitionError> {
    let mut settlement = Settlement::default();
    let pending = partition.departures();
    for dep in &pending {
        if accepted.contains(&dep.agent.id) {
            partition.complete_departure(dep.agent.id)?;
            settlement.departed += 1;
        } else {
            partition.cancel_departure(dep.agent.id)?;
            settlement.restored += 1;
        }
    }
    if accepted.len() > settlement.departed {
        let known: HashSet<AgentId> = pending.iter().map(|d| d.agent.id).collect();
        for id in accepted.iter().filter(|id| !known.contains(id)) {
            warn!(
                worker = %partition.worker(),
                agent = %id,
                "acknowledgement for unknown departure"
            );
        }
    }
    Ok(settlement)
}

/// Records of this partition's owned agents inside a neighbour's `view`.
pub fn ghost_parcels(partition: &SpatialPartition, view: &BoundingBox) -> Vec<Parcel> {
    partition
        .owned_in(view)
        .iter()
        .map(|(agent, at)| Parcel::new(agent, *at))
        .collect()
}

/// Result of [`refresh_ghosts`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GhostRefresh {
    /// Ghosts now installed.
    pub installed: usize,
    /// Well-formed records that could not be placed.
    pub skipped: usize,
    /// Records dropped as corrupt.
    pub corrupt: usize,
    /// Cache entries evicted because no neighbour sent them this tick.
    pub evicted: usize,
}

/// Rebuild the ghost mirror from every neighbour's parcels.
pub fn refresh_ghosts(
    partition: &mut SpatialPartition,
    cache: &mut AgentCache,
    tick: TickId,
    mut inbox: Vec<(WorkerId, Vec<Parcel>)>,
) -> GhostRefresh {
    inbox.sort_by_key(|(from, _)| *from);
    let me = partition.worker();
    let mut refresh = GhostRefresh::default();

    let mut ghosts = Vec::new();
    for (from, parcels) in inbox {
        for parcel in parcels {
            match cache.reconstruct(&parcel.record, tick) {
                Ok(agent) => ghosts.push((agent, parcel.at)),
                Err(e) => {
                    warn!(worker = %me, from = %from, tick = %tick, error = %e, "dropping ghost");
                    refresh.corrupt += 1;
                }
            }
        }
    }
    let offered = ghosts.len();
    refresh.skipped = partition.replace_ghosts(ghosts);
    refresh.installed = offered - refresh.skipped;
    refresh.evicted = cache.evict_older_than(tick);
    if refresh.skipped > 0 {
        debug!(worker = %me, skipped = refresh.skipped, "ghost records not placed");
    }
    refresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_core::Group;

    fn layout() -> PartitionLayout {
        PartitionLayout::new(8, 4, 2, 1).unwrap()
    }

    fn agent(origin: u32, local: u64) -> Agent {
        Agent::new(AgentId::new(WorkerId(origin), local), Group::A, 0.5, false)
    }

    #[test]
    fn packs_by_destination_owner() {
        let l = layout();
        let mut p = SpatialPartition::from_layout(&l, WorkerId(0));
        p.insert_owned(agent(0, 0), Coord::new(3, 0)).unwrap();
        p.move_agent(agent(0, 0).id, Coord::new(4, 0)).unwrap();
        let packed = pack_migrants(&mut p, &l).unwrap();
        assert_eq!(packed.len(), 1);
        assert_eq!(packed[&WorkerId(1)][0].at, Coord::new(4, 0));
    }

    #[test]
    fn lowest_identity_wins_a_contested_cell() {
        let l = layout();
        let mut right = SpatialPartition::from_layout(&l, WorkerId(1));
        let mut cache = AgentCache::new();
        let target = Coord::new(4, 2);
        let inbox = vec![
            (WorkerId(0), vec![Parcel::new(&agent(0, 5), target)]),
            (WorkerId(0), vec![Parcel::new(&agent(0, 2), target)]),
        ];
        let adm = admit_migrants(&mut right, &mut cache, TickId(1), inbox);
        assert_eq!(adm.accepted[&WorkerId(0)], vec![agent(0, 2).id]);
        assert_eq!(adm.rejected, 1);
        assert!(right.owns(agent(0, 2).id));
    }

    #[test]
    fn corrupt_migrant_is_dropped_and_counted() {
        let l = layout();
        let mut right = SpatialPartition::from_layout(&l, WorkerId(1));
        let mut cache = AgentCache::new();
        let mut bytes = AgentRecord::serialize(&agent(0, 1)).as_bytes().to_vec();
        bytes[13] = 9;
        let bad = Parcel {
            record: AgentRecord::from_bytes(&bytes).unwrap(),
            at: Coord::new(4, 0),
        };
        let good = Parcel::new(&agent(0, 2), Coord::new(4, 1));
        let adm = admit_migrants(
            &mut right,
            &mut cache,
            TickId(1),
            vec![(WorkerId(0), vec![bad, good])],
        );
        assert_eq!(adm.corrupt, 1);
        assert_eq!(adm.accepted[&WorkerId(0)].len(), 1);
    }

    #[test]
    fn settlement_restores_unacknowledged() {
        let l = layout();
        let mut p = SpatialPartition::from_layout(&l, WorkerId(0));
        p.insert_owned(agent(0, 0), Coord::new(3, 0)).unwrap();
        p.insert_owned(agent(0, 1), Coord::new(3, 1)).unwrap();
        p.move_agent(agent(0, 0).id, Coord::new(4, 0)).unwrap();
        p.move_agent(agent(0, 1).id, Coord::new(4, 1)).unwrap();
        let accepted: HashSet<AgentId> = [agent(0, 1).id].into_iter().collect();
        let s = settle_departures(&mut p, &accepted).unwrap();
        assert_eq!(
            s,
            Settlement {
                departed: 1,
                restored: 1
            }
        );
        assert_eq!(p.locate(agent(0, 0).id), Some(Coord::new(3, 0)));
        assert!(!p.owns(agent(0, 1).id));
        assert!(p.is_consistent());
    }

    #[test]
    fn ghost_refresh_evicts_departed_neighbours() {
        let l = layout();
        let mut left = SpatialPartition::from_layout(&l, WorkerId(0));
        let mut right = SpatialPartition::from_layout(&l, WorkerId(1));
        let mut cache = AgentCache::new();
        right.insert_owned(agent(1, 0), Coord::new(4, 0)).unwrap();
        right.insert_owned(agent(1, 1), Coord::new(7, 0)).unwrap();

        let parcels = ghost_parcels(&right, &left.view());
        assert_eq!(parcels.len(), 1);
        let r = refresh_ghosts(&mut left, &mut cache, TickId(1), vec![(WorkerId(1), parcels)]);
        assert_eq!(r.installed, 1);
        assert_eq!(left.locate(agent(1, 0).id), Some(Coord::new(4, 0)));

        right.move_agent(agent(1, 0).id, Coord::new(6, 3)).unwrap();
        let parcels = ghost_parcels(&right, &left.view());
        let r = refresh_ghosts(&mut left, &mut cache, TickId(2), vec![(WorkerId(1), parcels)]);
        assert_eq!(r.installed, 0);
        assert_eq!(r.evicted, 1);
        assert!(left.locate(agent(1, 0).id).is_none());
        assert!(cache.is_empty());
    }
}
