//! Agent state and the satisfaction rule.

use crate::id::AgentId;
use std::fmt;

/// One of the two categorical agent populations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Group {
    /// First population. Encoded as `-1` in the global snapshot.
    A = 0,
    /// Second population. Encoded as `+1` in the global snapshot.
    B = 1,
}

impl Group {
    /// Wire tag (`0` or `1`).
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Inverse of [`tag`](Self::tag). `None` for any other byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Group::A),
            1 => Some(Group::B),
            _ => None,
        }
    }

    /// Snapshot value: `-1.0` for A, `+1.0` for B.
    pub fn sign(self) -> f64 {
        match self {
            Group::A => -1.0,
            Group::B => 1.0,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::A => write!(f, "A"),
            Group::B => write!(f, "B"),
        }
    }
}

/// A resident of the segregation grid.
///
/// Only the owning partition mutates an agent, and only during its local
/// step. Copies held as ghosts elsewhere are read-only projections.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Agent {
    /// Stable identity.
    pub id: AgentId,
    /// Population the agent belongs to.
    pub group: Group,
    /// Minimum fraction of same-group neighbours needed to be satisfied.
    pub threshold: f64,
    /// Immune agents are satisfied every tick and never move.
    pub always_satisfied: bool,
    /// Outcome of the most recent evaluation.
    pub satisfied: bool,
}

impl Agent {
    /// Create an agent that has not been evaluated yet.
    pub fn new(id: AgentId, group: Group, threshold: f64, always_satisfied: bool) -> Self {
        Self {
            id,
            group,
            threshold,
            always_satisfied,
            satisfied: always_satisfied,
        }
    }

    /// Re-evaluate satisfaction from a neighbour census and store the result.
    ///
    /// An agent with no neighbours is vacuously satisfied.
    pub fn evaluate(&mut self, similar: usize, total: usize) -> bool {
        self.satisfied = if self.always_satisfied || total == 0 {
            true
        } else {
            similar as f64 / total as f64 >= self.threshold
        };
        self.satisfied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::WorkerId;

    fn agent(threshold: f64) -> Agent {
        Agent::new(AgentId::new(WorkerId(0), 0), Group::A, threshold, false)
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut a = agent(0.5);
        assert!(a.evaluate(4, 8));
        assert!(!a.evaluate(3, 8));
    }

    #[test]
    fn no_neighbours_is_satisfied() {
        let mut a = agent(1.0);
        assert!(a.evaluate(0, 0));
    }

    #[test]
    fn always_satisfied_ignores_census() {
        let mut a = agent(1.0);
        a.always_satisfied = true;
        assert!(a.evaluate(0, 8));
    }

    #[test]
    fn group_tags_round_trip() {
        for g in [Group::A, Group::B] {
            assert_eq!(Group::from_tag(g.tag()), Some(g));
        }
        assert_eq!(Group::from_tag(2), None);
        assert_eq!(Group::A.sign(), -1.0);
        assert_eq!(Group::B.sign(), 1.0);
    }
}
