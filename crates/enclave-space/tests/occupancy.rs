//! Single-occupancy holds under arbitrary sequences of moves.

use enclave_core::{Agent, AgentId, Coord, Group, WorkerId};
use enclave_space::{MoveKind, PartitionLayout, SpatialPartition};
use proptest::prelude::*;
use std::collections::HashSet;

fn populated(seed_cells: &[(i32, i32)]) -> (SpatialPartition, Vec<AgentId>) {
    let layout = PartitionLayout::new(12, 6, 2, 2).unwrap();
    let mut p = SpatialPartition::from_layout(&layout, WorkerId(0));
    let mut ids = Vec::new();
    for (n, &(x, y)) in seed_cells.iter().enumerate() {
        let id = AgentId::new(WorkerId(0), n as u64);
        let group = if n % 2 == 0 { Group::A } else { Group::B };
        if p.insert_owned(Agent::new(id, group, 0.5, false), Coord::new(x, y)).is_ok() {
            ids.push(id);
        }
    }
    (p, ids)
}

proptest! {
    #[test]
    fn moves_never_double_book_a_cell(
        seeds in prop::collection::vec((0i32..6, 0i32..6), 1..30),
        moves in prop::collection::vec((0usize..30, -1i32..9, -1i32..7, any::<bool>()), 0..80),
    ) {
        let (mut p, ids) = populated(&seeds);
        for (pick, x, y, accept) in moves {
            let id = ids[pick % ids.len()];
            if !p.owns(id) {
                continue;
            }
            if let Ok(MoveKind::Outbound) = p.move_agent(id, Coord::new(x, y)) {
                if accept {
                    p.complete_departure(id).unwrap();
                } else {
                    p.cancel_departure(id).unwrap();
                }
            }
            prop_assert!(p.is_consistent());

            let mut seen = HashSet::new();
            for c in p.view().iter() {
                let occ = p.occupants_at(c);
                prop_assert!(occ.len() <= 1);
                for o in occ {
                    prop_assert!(seen.insert(o.id) || !p.owns(o.id));
                }
            }
        }
    }
}

#[test]
fn layout_partitions_share_a_border_through_ghosts() {
    let layout = PartitionLayout::new(12, 6, 2, 1).unwrap();
    let mut left = SpatialPartition::from_layout(&layout, WorkerId(0));
    let mut right = SpatialPartition::from_layout(&layout, WorkerId(1));

    let a = Agent::new(AgentId::new(WorkerId(0), 0), Group::A, 0.5, false);
    let b = Agent::new(AgentId::new(WorkerId(1), 0), Group::B, 0.5, false);
    left.insert_owned(a, Coord::new(5, 2)).unwrap();
    right.insert_owned(b, Coord::new(6, 2)).unwrap();

    right.replace_ghosts(left.owned_in(&right.view()));
    left.replace_ghosts(right.owned_in(&left.view()));

    assert_eq!(left.locate(b.id), Some(Coord::new(6, 2)));
    assert_eq!(right.locate(a.id), Some(Coord::new(5, 2)));
    assert!(left.agent_mut(b.id).is_err());
}
