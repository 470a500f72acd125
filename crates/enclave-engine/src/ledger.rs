//! Identity → owner ledger, rebuilt from every reduction.

use enclave_core::{AgentId, WorkerId};
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::EngineError;

/// Which worker owns each agent after a tick's exchange.
#[derive(Clone, Debug, Default)]
pub(crate) struct OwnershipLedger {
    owners: IndexMap<AgentId, SmallVec<[WorkerId; 1]>>,
}

impl OwnershipLedger {
    /// Build from `(worker, owned identities)` pairs.
    pub fn build<'a, I>(claims: I) -> Self
    where
        I: IntoIterator<Item = (WorkerId, &'a [AgentId])>,
    {
        let mut owners: IndexMap<AgentId, SmallVec<[WorkerId; 1]>> = IndexMap::new();
        for (worker, ids) in claims {
            for id in ids {
                owners.entry(*id).or_default().push(worker);
            }
        }
        owners.sort_unstable_keys();
        Self { owners }
    }

    /// Every identity issued at startup (`(w, 0..shares[w])`) must have
    /// exactly one owner.
    pub fn verify(&self, shares: &[u64]) -> Result<(), EngineError> {
        if let Some((id, owners)) = self.owners.iter().find(|(_, o)| o.len() > 1) {
            return Err(EngineError::OwnershipConflict {
                agent: *id,
                owners: owners.to_vec(),
            });
        }
        for (origin, &share) in shares.iter().enumerate() {
            for local in 0..share {
                let id = AgentId::new(WorkerId(origin as u32), local);
                if !self.owners.contains_key(&id) {
                    return Err(EngineError::OwnershipConflict {
                        agent: id,
                        owners: Vec::new(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn owner(&self, id: AgentId) -> Option<WorkerId> {
        self.owners.get(&id).and_then(|o| o.first().copied())
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(origin: u32, local: u64) -> AgentId {
        AgentId::new(WorkerId(origin), local)
    }

    #[test]
    fn clean_ledger_verifies() {
        let w0 = [id(0, 0), id(1, 0)];
        let w1 = [id(0, 1)];
        let ledger = OwnershipLedger::build([(WorkerId(0), &w0[..]), (WorkerId(1), &w1[..])]);
        ledger.verify(&[2, 1]).unwrap();
        assert_eq!(ledger.owner(id(1, 0)), Some(WorkerId(0)));
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn duplicate_owner_is_a_conflict() {
        let w0 = [id(0, 0)];
        let w1 = [id(0, 0)];
        let ledger = OwnershipLedger::build([(WorkerId(0), &w0[..]), (WorkerId(1), &w1[..])]);
        assert_eq!(
            ledger.verify(&[1, 0]),
            Err(EngineError::OwnershipConflict {
                agent: id(0, 0),
                owners: vec![WorkerId(0), WorkerId(1)],
            })
        );
    }

    #[test]
    fn missing_agent_is_a_conflict() {
        let w0 = [id(0, 0)];
        let ledger = OwnershipLedger::build([(WorkerId(0), &w0[..])]);
        assert_eq!(
            ledger.verify(&[2]),
            Err(EngineError::OwnershipConflict {
                agent: id(0, 1),
                owners: Vec::new(),
            })
        );
    }

    proptest! {
        #[test]
        fn any_disjoint_assignment_verifies(
            shares in prop::collection::vec(0u64..20, 1..5),
            salt in any::<u64>(),
        ) {
            let workers = shares.len() as u64;
            let mut claims: Vec<Vec<AgentId>> = vec![Vec::new(); shares.len()];
            for (origin, &share) in shares.iter().enumerate() {
                for local in 0..share {
                    let holder = (salt ^ (origin as u64 * 31 + local)) % workers;
                    claims[holder as usize].push(id(origin as u32, local));
                }
            }
            let ledger = OwnershipLedger::build(
                claims.iter().enumerate().map(|(w, ids)| (WorkerId(w as u32), ids.as_slice())),
            );
            prop_assert_eq!(ledger.len() as u64, shares.iter().sum::<u64>());
            prop_assert!(ledger.verify(&shares).is_ok());
            for (w, ids) in claims.iter().enumerate() {
                for a in ids {
                    prop_assert_eq!(ledger.owner(*a), Some(WorkerId(w as u32)));
                }
            }
        }
    }
}
