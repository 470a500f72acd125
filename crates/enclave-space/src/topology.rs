//! Neighbourhood kinds and their precomputed offset tables.

use crate::error::TopologyError;
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// Distance metric family of a neighbourhood.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborhoodKind {
    /// Manhattan distance `|dx| + |dy| <= r`.
    VonNeumann,
    /// Chebyshev distance `max(|dx|, |dy|) <= r`.
    Moore,
    /// Moore neighbourhood of radius at least 2 (a radius of 1 is
    /// promoted to 2).
    Extended,
}

impl NeighborhoodKind {
    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::VonNeumann => "von_neumann",
            Self::Moore => "moore",
            Self::Extended => "extended",
        }
    }
}

impl fmt::Display for NeighborhoodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NeighborhoodKind {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "von_neumann" | "vonneumann" | "von-neumann" => Ok(Self::VonNeumann),
            "moore" => Ok(Self::Moore),
            "extended" => Ok(Self::Extended),
            _ => Err(TopologyError::InvalidTopology {
                name: s.to_string(),
            }),
        }
    }
}

/// A deterministic neighbourhood offset table.
///
/// Built once per run and shared by every worker. The table never contains
/// `(0, 0)`, is closed under negation, and is sorted by metric distance,
/// then `dx`, then `dy`, so every worker enumerates neighbours in the same
/// order. No floating point is involved.
///
/// # Examples
///
/// ```
/// use enclave_space::NeighborTopology;
///
/// let t = NeighborTopology::from_name("24").unwrap();
/// assert_eq!(t.len(), 24);
/// assert_eq!(t.reach(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NeighborTopology {
    kind: NeighborhoodKind,
    radius: u32,
    offsets: SmallVec<[(i32, i32); 8]>,
    reach: u32,
}

impl NeighborTopology {
    /// Largest accepted radius.
    pub const MAX_RADIUS: i64 = 32;

    /// Named presets accepted by [`from_name`](Self::from_name).
    pub const PRESETS: [&'static str; 6] = ["4", "8", "12", "24", "48", "80"];

    /// Build the offset table for `kind` at `radius`.
    ///
    /// Fails with [`TopologyError::InvalidRadius`] for `radius <= 0` or
    /// `radius > MAX_RADIUS`.
    pub fn new(kind: NeighborhoodKind, radius: i64) -> Result<Self, TopologyError> {
        if radius <= 0 || radius > Self::MAX_RADIUS {
            return Err(TopologyError::InvalidRadius { radius });
        }
        let r = match kind {
            NeighborhoodKind::Extended => radius.max(2),
            _ => radius,
        } as i32;

        let distance = |dx: i32, dy: i32| match kind {
            NeighborhoodKind::VonNeumann => dx.abs() + dy.abs(),
            NeighborhoodKind::Moore | NeighborhoodKind::Extended => dx.abs().max(dy.abs()),
        };

        let mut offsets: SmallVec<[(i32, i32); 8]> = SmallVec::new();
        for dx in -r..=r {
            for dy in -r..=r {
                let d = distance(dx, dy);
                if d > 0 && d <= r {
                    offsets.push((dx, dy));
                }
            }
        }
        offsets.sort_by_key(|&(dx, dy)| (distance(dx, dy), dx, dy));

        let reach = offsets
            .iter()
            .map(|&(dx, dy)| dx.unsigned_abs().max(dy.unsigned_abs()))
            .max()
            .unwrap_or(0);

        Ok(Self {
            kind,
            radius: r as u32,
            offsets,
            reach,
        })
    }

    /// Parse a neighbourhood preset by its size: `"4"`, `"8"`, `"12"`,
    /// `"24"`, `"48"` or `"80"`.
    pub fn from_name(name: &str) -> Result<Self, TopologyError> {
        let (kind, radius) = match name.trim() {
            "4" => (NeighborhoodKind::VonNeumann, 1),
            "8" => (NeighborhoodKind::Moore, 1),
            "12" => (NeighborhoodKind::VonNeumann, 2),
            "24" => (NeighborhoodKind::Moore, 2),
            "48" => (NeighborhoodKind::Moore, 3),
            "80" => (NeighborhoodKind::Moore, 4),
            _ => {
                return Err(TopologyError::InvalidTopology {
                    name: name.to_string(),
                })
            }
        };
        Self::new(kind, radius)
    }

    /// The metric family.
    pub fn kind(&self) -> NeighborhoodKind {
        self.kind
    }

    /// Effective radius (after `Extended` promotion).
    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Offsets as `(dx, dy)` pairs in canonical order.
    pub fn offsets(&self) -> &[(i32, i32)] {
        &self.offsets
    }

    /// Largest absolute offset component; the ghost margin width a
    /// partition needs to answer neighbour queries locally.
    pub fn reach(&self) -> u32 {
        self.reach
    }

    /// Neighbourhood size.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Always `false`: a valid radius yields at least four offsets.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
