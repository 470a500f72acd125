//! Global Moran's I over a gathered snapshot.

use crate::snapshot::GlobalSnapshot;
use std::fmt;

/// Fixed 8-cell weight kernel, `(dy, dx)` in row-major order. Independent of
/// the neighbourhood the simulation ran with.
const KERNEL: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Why Moran's I could not be computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UndefinedReason {
    /// Fewer than two occupied cells.
    TooFewCells,
    /// Every occupied cell holds the same group.
    ZeroVariance,
    /// No occupied cell has an occupied neighbour.
    NoNeighbourPairs,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewCells => write!(f, "fewer than two occupied cells"),
            Self::ZeroVariance => write!(f, "zero variance"),
            Self::NoNeighbourPairs => write!(f, "no adjacent occupied pairs"),
        }
    }
}

/// Result of [`morans_i`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MoranI {
    /// A finite value, in `[-1, 1]` for any grid this engine produces.
    Value(f64),
    /// Not computable for the given grid.
    Undefined(UndefinedReason),
}

impl MoranI {
    /// The value, or `None` if undefined.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Undefined(_) => None,
        }
    }

    /// True for [`MoranI::Value`].
    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl fmt::Display for MoranI {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Undefined(reason) => write!(f, "undefined ({reason})"),
        }
    }
}

/// Global Moran's I with binary 8-neighbour weights and sticky edges.
///
/// With `N` occupied cells, `z_i = v_i - mean`, `W` the number of ordered
/// occupied-neighbour pairs:
///
/// ```text
/// I = (N / W) * sum_ij(w_ij * z_i * z_j) / sum_i(z_i^2)
/// ```
///
/// Cells are visited row-major and the kernel in a fixed order, so the
/// floating-point result is reproducible bit for bit.
pub fn morans_i(snapshot: &GlobalSnapshot) -> MoranI {
    let (w, h) = (snapshot.width() as i64, snapshot.height() as i64);

    let mut n = 0usize;
    let mut sum = 0.0;
    for y in 0..h {
        for x in 0..w {
            if let Some(v) = snapshot.cell(x, y) {
                n += 1;
                sum += v;
            }
        }
    }
    if n < 2 {
        return MoranI::Undefined(UndefinedReason::TooFewCells);
    }
    let mean = sum / n as f64;

    let mut denom = 0.0;
    for y in 0..h {
        for x in 0..w {
            if let Some(v) = snapshot.cell(x, y) {
                denom += (v - mean) * (v - mean);
            }
        }
    }
    if denom == 0.0 {
        return MoranI::Undefined(UndefinedReason::ZeroVariance);
    }

    let mut num = 0.0;
    let mut weight = 0.0;
    for y in 0..h {
        for x in 0..w {
            let Some(vi) = snapshot.cell(x, y) else {
                continue;
            };
            for (dy, dx) in KERNEL {
                if let Some(vj) = snapshot.cell(x + dx, y + dy) {
                    num += (vi - mean) * (vj - mean);
                    weight += 1.0;
                }
            }
        }
    }
    if weight == 0.0 {
        return MoranI::Undefined(UndefinedReason::NoNeighbourPairs);
    }

    MoranI::Value((n as f64 / weight) * (num / denom))
}

/// Mean of the defined values among several runs' results, or `None` if
/// none is defined.
pub fn mean_defined<'a, I>(results: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a MoranI>,
{
    let (sum, count) = results
        .into_iter()
        .filter_map(MoranI::as_f64)
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
