//! Half-open axis-aligned rectangles on the global grid.

use enclave_core::Coord;
use std::fmt;

/// A half-open rectangle `[x0, x0 + width) × [y0, y0 + height)`.
///
/// Used both for a worker's ownership region and for its view (the region
/// expanded by the ghost margin).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    /// Leftmost column.
    pub x0: i32,
    /// Topmost row.
    pub y0: i32,
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
}

impl BoundingBox {
    /// Build a box from its origin and extent.
    pub const fn new(x0: i32, y0: i32, width: u32, height: u32) -> Self {
        Self {
            x0,
            y0,
            width,
            height,
        }
    }

    /// The whole world `[0, width) × [0, height)`.
    pub const fn world(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// One past the rightmost column.
    pub fn x1(&self) -> i32 {
        self.x0 + self.width as i32
    }

    /// One past the bottom row.
    pub fn y1(&self) -> i32 {
        self.y0 + self.height as i32
    }

    /// Number of cells covered.
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// True if `c` lies inside the box.
    pub fn contains(&self, c: Coord) -> bool {
        c.x >= self.x0 && c.x < self.x1() && c.y >= self.y0 && c.y < self.y1()
    }

    /// Grow by `margin` on every side, then clip to `world`.
    pub fn expand(&self, margin: u32, world: &BoundingBox) -> BoundingBox {
        let m = margin as i32;
        let x0 = (self.x0 - m).max(world.x0);
        let y0 = (self.y0 - m).max(world.y0);
        let x1 = (self.x1() + m).min(world.x1());
        let y1 = (self.y1() + m).min(world.y1());
        BoundingBox::new(x0, y0, (x1 - x0).max(0) as u32, (y1 - y0).max(0) as u32)
    }

    /// True if the two boxes share at least one cell.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x0 < other.x1() && other.x0 < self.x1() && self.y0 < other.y1() && other.y0 < self.y1()
    }

    /// Row-major dense index of `c` within the box, or `None` outside.
    pub fn index_of(&self, c: Coord) -> Option<usize> {
        if !self.contains(c) {
            return None;
        }
        let col = (c.x - self.x0) as usize;
        let row = (c.y - self.y0) as usize;
        Some(row * self.width as usize + col)
    }

    /// Inverse of [`index_of`](Self::index_of).
    pub fn coord_at(&self, index: usize) -> Coord {
        let w = self.width.max(1) as usize;
        Coord::new(self.x0 + (index % w) as i32, self.y0 + (index / w) as i32)
    }

    /// Every cell in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = Coord> + '_ {
        (self.y0..self.y1()).flat_map(move |y| (self.x0..self.x1()).map(move |x| Coord::new(x, y)))
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}..{}) x [{}..{})",
            self.x0,
            self.x1(),
            self.y0,
            self.y1()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_half_open() {
        let b = BoundingBox::new(2, 3, 4, 2);
        assert!(b.contains(Coord::new(2, 3)));
        assert!(b.contains(Coord::new(5, 4)));
        assert!(!b.contains(Coord::new(6, 4)));
        assert!(!b.contains(Coord::new(5, 5)));
        assert!(!b.contains(Coord::new(1, 3)));
    }

    #[test]
    fn expand_clips_to_world() {
        let world = BoundingBox::world(10, 10);
        let b = BoundingBox::new(0, 5, 5, 5);
        let v = b.expand(2, &world);
        assert_eq!(v, BoundingBox::new(0, 3, 7, 7));
    }

    #[test]
    fn index_round_trip() {
        let b = BoundingBox::new(3, 1, 4, 3);
        for (i, c) in b.iter().enumerate() {
            assert_eq!(b.index_of(c), Some(i));
            assert_eq!(b.coord_at(i), c);
        }
        assert_eq!(b.index_of(Coord::new(0, 0)), None);
        assert_eq!(b.iter().count(), b.cell_count());
    }

    #[test]
    fn intersection() {
        let a = BoundingBox::new(0, 0, 5, 5);
        let touching = BoundingBox::new(5, 0, 5, 5);
        let overlapping = BoundingBox::new(4, 4, 2, 2);
        assert!(!a.intersects(&touching));
        assert!(a.intersects(&overlapping));
        assert!(a.expand(1, &BoundingBox::world(10, 5)).intersects(&touching));
    }
}
