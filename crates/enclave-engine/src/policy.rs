//! Per-agent rules: initial placement, satisfaction and relocation.

use enclave_core::{Agent, AgentId, Group, WorkerId};
use enclave_space::{MoveKind, NeighborTopology, PartitionError, SpatialPartition};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{RelocationScope, RunConfig};

/// Satisfied and total owned agents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    /// Satisfied agents.
    pub satisfied: u64,
    /// All agents.
    pub total: u64,
}

/// Create `share` agents for `partition`'s worker and place them on
/// distinct random vacant cells of its box.
///
/// Identities are `(worker, 0..share)`. Per agent, the group is drawn
/// first, then the always-satisfied flag.
pub fn populate<R: Rng + ?Sized>(
    partition: &mut SpatialPartition,
    share: u64,
    config: &RunConfig,
    rng: &mut R,
) -> Result<(), PartitionError> {
    let worker: WorkerId = partition.worker();
    let mut cells = partition.vacant_local_cells();
    cells.shuffle(rng);

    for (local, at) in (0..share).zip(cells) {
        let group = if rng.gen::<f64>() < config.group_b_fraction {
            Group::B
        } else {
            Group::A
        };
        let always = rng.gen::<f64>() < config.always_satisfied_ratio;
        let agent = Agent::new(AgentId::new(worker, local), group, config.threshold, always);
        partition.insert_owned(agent, at)?;
    }
    Ok(())
}

/// Evaluate every owned agent against the current (tick-start) view.
///
/// All censuses are taken before any flag is written, and evaluation never
/// moves anyone, so no agent's decision sees another's outcome this tick.
pub fn evaluate_owned(
    partition: &mut SpatialPartition,
    topology: &NeighborTopology,
) -> Result<Tally, PartitionError> {
    let mut census = Vec::with_capacity(partition.owned_len());
    for id in partition.owned_ids() {
        let (Some(agent), Some(at)) = (partition.agent(id), partition.locate(id)) else {
            return Err(PartitionError::UnknownAgent { id });
        };
        let counts = if agent.always_satisfied {
            (0, 0)
        } else {
            partition.census(at, agent.group, topology)
        };
        census.push((id, counts));
    }

    let mut tally = Tally::default();
    for (id, (similar, total)) in census {
        if partition.agent_mut(id)?.evaluate(similar, total) {
            tally.satisfied += 1;
        }
        tally.total += 1;
    }
    Ok(tally)
}

/// What [`relocate_unsatisfied`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Relocations {
    /// Unsatisfied agents that searched for a cell.
    pub attempted: u64,
    /// Moves completed inside the box.
    pub local: u64,
    /// Moves into the margin, now pending departures.
    pub outbound: u64,
    /// Agents that found nothing within the attempt bound.
    pub stuck: u64,
}

/// Move every unsatisfied owned agent, in ascending identity order, to a
/// random vacant cell of `scope`.
///
/// Each agent draws up to `max_attempts` uniform cells and takes the first
/// vacant one. Occupancy is live: a cell taken or freed earlier in the pass
/// is seen by later agents. An agent that finds nothing stays put.
pub fn relocate_unsatisfied<R: Rng + ?Sized>(
    partition: &mut SpatialPartition,
    scope: RelocationScope,
    max_attempts: u32,
    rng: &mut R,
) -> Result<Relocations, PartitionError> {
    let region = match scope {
        RelocationScope::Local => partition.bounds(),
        RelocationScope::Reach => partition.view(),
    };
    let mut out = Relocations::default();

    for id in partition.owned_ids() {
        let satisfied = partition.agent(id).map_or(true, |a| a.satisfied);
        if satisfied {
            continue;
        }
        out.attempted += 1;

        let mut moved = false;
        for _ in 0..max_attempts {
            let dest = SpatialPartition::random_point_in(&region, rng);
            if !partition.is_vacant(dest) {
                continue;
            }
            match partition.move_agent(id, dest)? {
                MoveKind::Local => out.local += 1,
                MoveKind::Outbound => out.outbound += 1,
            }
            moved = true;
            break;
        }
        if !moved {
            out.stuck += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_core::Coord;
    use enclave_space::{BoundingBox, PartitionLayout};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn partition(w: u32, h: u32) -> SpatialPartition {
        let layout = PartitionLayout::new(w, h, 1, 1).unwrap();
        SpatialPartition::from_layout(&layout, WorkerId(0))
    }

    fn moore() -> NeighborTopology {
        NeighborTopology::from_name("8").unwrap()
    }

    #[test]
    fn populate_places_distinct_agents() {
        let mut p = partition(5, 5);
        let cfg = RunConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        populate(&mut p, 20, &cfg, &mut rng).unwrap();
        assert_eq!(p.owned_len(), 20);
        assert_eq!(p.vacant_local_cells().len(), 5);
        assert_eq!(p.owned_ids()[19], AgentId::new(WorkerId(0), 19));
        assert!(p.is_consistent());
    }

    #[test]
    fn populate_is_seed_deterministic() {
        let cfg = RunConfig::default();
        let place = |seed| {
            let mut p = partition(6, 6);
            populate(&mut p, 12, &cfg, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
            p.owned_agents()
        };
        assert_eq!(place(9), place(9));
        assert_ne!(place(9), place(10));
    }

    #[test]
    fn evaluation_uses_start_of_tick_layout() {
        // A B . / . . . / . . . with threshold 0.5: both unsatisfied.
        let mut p = partition(3, 3);
        let a = Agent::new(AgentId::new(WorkerId(0), 0), Group::A, 0.5, false);
        let b = Agent::new(AgentId::new(WorkerId(0), 1), Group::B, 0.5, false);
        p.insert_owned(a, Coord::new(0, 0)).unwrap();
        p.insert_owned(b, Coord::new(1, 0)).unwrap();
        let tally = evaluate_owned(&mut p, &moore()).unwrap();
        assert_eq!(
            tally,
            Tally {
                satisfied: 0,
                total: 2
            }
        );
        assert!(!p.agent(a.id).unwrap().satisfied);
    }

    #[test]
    fn always_satisfied_skip_census() {
        let mut p = partition(3, 3);
        let a = Agent::new(AgentId::new(WorkerId(0), 0), Group::A, 1.0, true);
        let b = Agent::new(AgentId::new(WorkerId(0), 1), Group::B, 1.0, false);
        p.insert_owned(a, Coord::new(0, 0)).unwrap();
        p.insert_owned(b, Coord::new(1, 0)).unwrap();
        let tally = evaluate_owned(&mut p, &moore()).unwrap();
        assert_eq!(tally.satisfied, 1);
        assert!(p.agent(a.id).unwrap().satisfied);
    }

    #[test]
    fn unsatisfied_agents_move_and_satisfied_stay() {
        let mut p = partition(4, 4);
        let a = Agent::new(AgentId::new(WorkerId(0), 0), Group::A, 1.0, false);
        let b = Agent::new(AgentId::new(WorkerId(0), 1), Group::B, 1.0, true);
        p.insert_owned(a, Coord::new(0, 0)).unwrap();
        p.insert_owned(b, Coord::new(1, 1)).unwrap();
        evaluate_owned(&mut p, &moore()).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let r = relocate_unsatisfied(&mut p, RelocationScope::Local, 100, &mut rng).unwrap();
        assert_eq!(r.attempted, 1);
        assert_eq!(r.local, 1);
        assert_ne!(p.locate(a.id), Some(Coord::new(0, 0)));
        assert_eq!(p.locate(b.id), Some(Coord::new(1, 1)));
        assert!(p.is_consistent());
    }

    #[test]
    fn full_box_leaves_agent_stuck() {
        let mut p = partition(2, 1);
        let a = Agent::new(AgentId::new(WorkerId(0), 0), Group::A, 1.0, false);
        let b = Agent::new(AgentId::new(WorkerId(0), 1), Group::B, 1.0, false);
        p.insert_owned(a, Coord::new(0, 0)).unwrap();
        p.insert_owned(b, Coord::new(1, 0)).unwrap();
        evaluate_owned(&mut p, &moore()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let r = relocate_unsatisfied(&mut p, RelocationScope::Local, 100, &mut rng).unwrap();
        assert_eq!(
            r,
            Relocations {
                attempted: 2,
                local: 0,
                outbound: 0,
                stuck: 2
            }
        );
    }

    #[test]
    fn reach_scope_can_target_the_margin() {
        let layout = PartitionLayout::new(2, 1, 2, 1).unwrap();
        let mut p = SpatialPartition::from_layout(&layout, WorkerId(0));
        assert_eq!(p.view(), BoundingBox::new(0, 0, 2, 1));
        let a = Agent::new(AgentId::new(WorkerId(0), 0), Group::A, 1.0, false);
        p.insert_owned(a, Coord::new(0, 0)).unwrap();
        p.agent_mut(a.id).unwrap().satisfied = false;
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let r = relocate_unsatisfied(&mut p, RelocationScope::Reach, 100, &mut rng).unwrap();
        assert_eq!(r.outbound, 1);
        assert_eq!(p.departures()[0].to, Coord::new(1, 0));
    }
}
