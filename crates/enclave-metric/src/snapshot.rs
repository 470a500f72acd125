//! Dense whole-world snapshot gathered at the end of a run.

use enclave_core::{Coord, Group};
use std::fmt;

/// FNV-1a offset basis for 64-bit.
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x00000100000001B3;

#[inline]
fn fnv1a_byte(hash: u64, byte: u8) -> u64 {
    (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
}

#[inline]
fn fnv1a_u32(mut hash: u64, v: u32) -> u64 {
    for &b in &v.to_le_bytes() {
        hash = fnv1a_byte(hash, b);
    }
    hash
}

/// Errors from filling a [`GlobalSnapshot`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotError {
    /// The coordinate is off the grid.
    OutOfBounds {
        /// The rejected coordinate.
        coord: Coord,
    },
    /// Two agents were reported at the same cell.
    Occupied {
        /// The contested coordinate.
        coord: Coord,
    },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds { coord } => write!(f, "snapshot cell {coord} is off the grid"),
            Self::Occupied { coord } => write!(f, "snapshot cell {coord} reported twice"),
        }
    }
}

impl std::error::Error for SnapshotError {}

/// A `height × width` grid of group markers, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalSnapshot {
    width: u32,
    height: u32,
    cells: Vec<Option<Group>>,
}

impl GlobalSnapshot {
    /// An empty grid.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![None; width as usize * height as usize],
        }
    }

    /// Build a grid from `(coord, group)` pairs.
    pub fn from_cells<I>(width: u32, height: u32, cells: I) -> Result<Self, SnapshotError>
    where
        I: IntoIterator<Item = (Coord, Group)>,
    {
        let mut snap = Self::new(width, height);
        for (c, g) in cells {
            snap.set(c, g)?;
        }
        Ok(snap)
    }

    /// Grid width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height.
    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, c: Coord) -> Option<usize> {
        if c.x < 0 || c.y < 0 || c.x as u32 >= self.width || c.y as u32 >= self.height {
            return None;
        }
        Some(c.y as usize * self.width as usize + c.x as usize)
    }

    /// Record `group` at `c`. Each cell may be set once.
    pub fn set(&mut self, c: Coord, group: Group) -> Result<(), SnapshotError> {
        let i = self.index(c).ok_or(SnapshotError::OutOfBounds { coord: c })?;
        if self.cells[i].is_some() {
            return Err(SnapshotError::Occupied { coord: c });
        }
        self.cells[i] = Some(group);
        Ok(())
    }

    /// Group at `c`, `None` for empty or off-grid cells.
    pub fn get(&self, c: Coord) -> Option<Group> {
        self.index(c).and_then(|i| self.cells[i])
    }

    /// Number of non-empty cells.
    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Rows of `-1.0` (A), `+1.0` (B) and `NaN` (empty).
    pub fn values(&self) -> Vec<Vec<f64>> {
        self.cells
            .chunks(self.width.max(1) as usize)
            .map(|row| {
                row.iter()
                    .map(|c| c.map_or(f64::NAN, Group::sign))
                    .collect()
            })
            .collect()
    }

    /// FNV-1a over the dimensions and every cell.
    pub fn state_hash(&self) -> u64 {
        let mut hash = fnv1a_u32(FNV_OFFSET, self.width);
        hash = fnv1a_u32(hash, self.height);
        for c in &self.cells {
            let b = match c {
                None => 0,
                Some(g) => g.tag() + 1,
            };
            hash = fnv1a_byte(hash, b);
        }
        hash
    }

    pub(crate) fn cell(&self, x: i64, y: i64) -> Option<f64> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        self.cells[y as usize * self.width as usize + x as usize].map(Group::sign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_and_values() {
        let mut s = GlobalSnapshot::new(3, 2);
        s.set(Coord::new(0, 0), Group::A).unwrap();
        s.set(Coord::new(2, 1), Group::B).unwrap();
        assert_eq!(s.get(Coord::new(2, 1)), Some(Group::B));
        assert_eq!(s.get(Coord::new(1, 1)), None);
        assert_eq!(s.occupied(), 2);

        let v = s.values();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0][0], -1.0);
        assert!(v[0][1].is_nan());
        assert_eq!(v[1][2], 1.0);
    }

    #[test]
    fn double_set_and_off_grid_rejected() {
        let mut s = GlobalSnapshot::new(2, 2);
        s.set(Coord::new(1, 1), Group::A).unwrap();
        assert_eq!(
            s.set(Coord::new(1, 1), Group::B),
            Err(SnapshotError::Occupied {
                coord: Coord::new(1, 1)
            })
        );
        assert_eq!(
            s.set(Coord::new(2, 0), Group::B),
            Err(SnapshotError::OutOfBounds {
                coord: Coord::new(2, 0)
            })
        );
    }

    #[test]
    fn hash_tracks_content() {
        let a = GlobalSnapshot::from_cells(4, 4, [(Coord::new(1, 1), Group::A)]).unwrap();
        let b = GlobalSnapshot::from_cells(4, 4, [(Coord::new(1, 1), Group::B)]).unwrap();
        let c = GlobalSnapshot::from_cells(4, 4, [(Coord::new(1, 1), Group::A)]).unwrap();
        assert_ne!(a.state_hash(), b.state_hash());
        assert_eq!(a.state_hash(), c.state_hash());
        assert_ne!(
            GlobalSnapshot::new(2, 8).state_hash(),
            GlobalSnapshot::new(8, 2).state_hash()
        );
    }
}
