//! Cartesian decomposition of the world into per-worker boxes.

use crate::bounds::BoundingBox;
use crate::error::LayoutError;
use enclave_core::{Coord, WorkerId};
use smallvec::SmallVec;

/// Split `total` into `parts` near-even shares, remainder going to the
/// lowest-numbered shares first.
///
/// ```
/// assert_eq!(enclave_space::layout::split_even(10, 4), vec![3, 3, 2, 2]);
/// ```
pub fn split_even(total: u64, parts: u32) -> Vec<u64> {
    if parts == 0 {
        return Vec::new();
    }
    let base = total / parts as u64;
    let rem = total % parts as u64;
    (0..parts as u64)
        .map(|i| base + u64::from(i < rem))
        .collect()
}

/// One axis split into contiguous strips.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Strips {
    len: u32,
    parts: u32,
}

impl Strips {
    fn base(&self) -> u32 {
        self.len / self.parts
    }

    fn rem(&self) -> u32 {
        self.len % self.parts
    }

    /// `(start, extent)` of strip `i`.
    fn span(&self, i: u32) -> (i32, u32) {
        let (base, rem) = (self.base(), self.rem());
        let start = i * base + i.min(rem);
        let extent = base + u32::from(i < rem);
        (start as i32, extent)
    }

    fn strip_of(&self, v: i32) -> u32 {
        let (base, rem) = (self.base(), self.rem());
        let v = v as u32;
        let wide = rem * (base + 1);
        if v < wide {
            v / (base + 1)
        } else {
            rem + (v - wide) / base
        }
    }
}

/// How the global grid is tiled across workers.
///
/// The world is cut into `px` column strips and `py` row strips with
/// `px * py == workers`. Worker `j * px + i` owns column strip `i`, row
/// strip `j`. The boxes tile the world exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionLayout {
    world: BoundingBox,
    margin: u32,
    cols: Strips,
    rows: Strips,
}

impl PartitionLayout {
    /// Tile a `width × height` world across `workers` with the given
    /// ghost margin.
    ///
    /// Picks the factor pair closest to square. Between a pair and its
    /// transpose, more strips go along the longer axis.
    pub fn new(width: u32, height: u32, workers: u32, margin: u32) -> Result<Self, LayoutError> {
        if width == 0 || height == 0 {
            return Err(LayoutError::EmptyWorld);
        }
        if workers == 0 {
            return Err(LayoutError::NoWorkers);
        }
        for (name, value) in [("width", width), ("height", height)] {
            if value > i32::MAX as u32 {
                return Err(LayoutError::DimensionTooLarge { name, value });
            }
        }

        let wide = width >= height;
        let (px, py) = (1..=workers)
            .filter(|d| workers % d == 0)
            .map(|d| (d, workers / d))
            .filter(|&(px, py)| px <= width && py <= height)
            .min_by_key(|&(px, py)| (px.abs_diff(py), u8::from((px >= py) != wide)))
            .ok_or(LayoutError::TooManyWorkers {
                workers,
                width,
                height,
            })?;

        Ok(Self {
            world: BoundingBox::world(width, height),
            margin,
            cols: Strips {
                len: width,
                parts: px,
            },
            rows: Strips {
                len: height,
                parts: py,
            },
        })
    }

    /// The whole world.
    pub fn world(&self) -> BoundingBox {
        self.world
    }

    /// Ghost margin width.
    pub fn margin(&self) -> u32 {
        self.margin
    }

    /// Number of workers.
    pub fn worker_count(&self) -> u32 {
        self.cols.parts * self.rows.parts
    }

    /// Strip counts `(px, py)`.
    pub fn dims(&self) -> (u32, u32) {
        (self.cols.parts, self.rows.parts)
    }

    /// The box owned by `worker`.
    ///
    /// # Panics
    ///
    /// Panics if `worker` is out of range.
    pub fn box_of(&self, worker: WorkerId) -> BoundingBox {
        assert!(
            worker.0 < self.worker_count(),
            "worker {worker} out of range"
        );
        let i = worker.0 % self.cols.parts;
        let j = worker.0 / self.cols.parts;
        let (x0, w) = self.cols.span(i);
        let (y0, h) = self.rows.span(j);
        BoundingBox::new(x0, y0, w, h)
    }

    /// The box owned by `worker` expanded by the margin, clipped to the world.
    pub fn view_of(&self, worker: WorkerId) -> BoundingBox {
        self.box_of(worker).expand(self.margin, &self.world)
    }

    /// The worker owning `c`, or `None` if `c` is off the grid.
    pub fn owner_of(&self, c: Coord) -> Option<WorkerId> {
        if !self.world.contains(c) {
            return None;
        }
        let i = self.cols.strip_of(c.x);
        let j = self.rows.strip_of(c.y);
        Some(WorkerId(j * self.cols.parts + i))
    }

    /// Workers whose boxes lie within `margin` of `worker`'s box, in
    /// ascending order. The relation is symmetric.
    pub fn neighbours_of(&self, worker: WorkerId) -> SmallVec<[WorkerId; 8]> {
        let view = self.view_of(worker);
        self.workers()
            .filter(|&w| w != worker && view.intersects(&self.box_of(w)))
            .collect()
    }

    /// All worker ids in ascending order.
    pub fn workers(&self) -> impl Iterator<Item = WorkerId> {
        (0..self.worker_count()).map(WorkerId)
    }
}
