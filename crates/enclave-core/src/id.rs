//! Strongly-typed identifiers and the [`Coord`] type.

use std::cmp::Ordering;
use std::fmt;

/// Identifies a worker (and the partition it owns).
///
/// Workers are numbered `0..worker_count`. Worker 0 is the designated
/// worker that gathers the global snapshot at the end of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u32);

impl WorkerId {
    /// The worker that gathers the end-of-run snapshot.
    pub const ROOT: WorkerId = WorkerId(0);

    /// Index form for slice lookups.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for WorkerId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Globally unique, migration-stable agent identity.
///
/// An agent is named after the worker that created it (`origin`) and its
/// creation index on that worker (`local`). Neither part changes when the
/// agent moves to another partition, so `origin` is *not* the current
/// owner.
///
/// Ordering is `(origin, local)`, which gives every partition the same
/// tick-stable stepping order for any set of agents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId {
    /// Worker that created the agent.
    pub origin: WorkerId,
    /// Creation index on the origin worker.
    pub local: u64,
}

impl AgentId {
    /// Build an identity from its parts.
    pub fn new(origin: WorkerId, local: u64) -> Self {
        Self { origin, local }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.origin)
    }
}

/// Monotonically increasing tick counter.
///
/// Tick 0 is the initial layout; the first simulated step is tick 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickId(pub u64);

impl TickId {
    /// The tick after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TickId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// An integer cell coordinate on the global grid.
///
/// `x` is the column (`0..width`), `y` the row (`0..height`).
/// Ordering is row-major: by `y`, then `x`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Coord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Coord {
    /// Build a coordinate.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Apply an offset. No bounds check.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Coord {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}
