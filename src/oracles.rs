//! Black-box spatial oracles consumed by the transfer engine.
//!
//! - [`NearestPositions`]: index of the closest registered reference point.
//! - [`MeshDivision`]: integer region id of a point, `None` when outside.
//! - [`SpatialFunction`]: scalar function of position provided by a problem.

use crate::geometry::{BoundingBox, Point, distance_squared};

/// A registered list of reference positions.
pub trait NearestPositions: Send + Sync {
    fn positions(&self) -> &[Point];

    /// Index of the position closest to `p`; the lowest index wins ties.
    /// `None` only when no positions are registered.
    fn nearest_index(&self, p: &Point) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, q) in self.positions().iter().enumerate() {
            let d = distance_squared(p, q);
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// Plain list of positions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PositionList(pub Vec<Point>);

impl NearestPositions for PositionList {
    fn positions(&self) -> &[Point] {
        &self.0
    }
}

/// Spatial subdivision into numbered regions.
pub trait MeshDivision: Send + Sync {
    fn n_divisions(&self) -> usize;

    /// Region containing `p`, `None` outside every region.
    fn division_index(&self, p: &Point) -> Option<u32>;
}

/// Uniform Cartesian grid of regions over a box, numbered x fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct CartesianGridDivision {
    bbox: BoundingBox,
    counts: [usize; 3],
}

impl CartesianGridDivision {
    /// Zero counts are treated as one region on that axis.
    pub fn new(bbox: BoundingBox, counts: [usize; 3]) -> Self {
        Self {
            bbox,
            counts: counts.map(|n| n.max(1)),
        }
    }
}

impl MeshDivision for CartesianGridDivision {
    fn n_divisions(&self) -> usize {
        self.counts.iter().product()
    }

    fn division_index(&self, p: &Point) -> Option<u32> {
        if !self.bbox.contains(p) {
            return None;
        }
        let widths = self.bbox.widths();
        let mut idx = [0usize; 3];
        for a in 0..3 {
            if widths[a] > 0.0 {
                let t = (p[a] - self.bbox.min[a]) / widths[a];
                idx[a] = ((t * self.counts[a] as f64).floor().max(0.0) as usize)
                    .min(self.counts[a] - 1);
            }
        }
        let flat = idx[0] + self.counts[0] * (idx[1] + self.counts[1] * idx[2]);
        Some(flat as u32)
    }
}

/// Scalar function of position, evaluated in the providing problem's frame.
pub trait SpatialFunction: Send + Sync {
    fn value(&self, p: &Point) -> f64;
}

impl<F> SpatialFunction for F
where
    F: Fn(&Point) -> f64 + Send + Sync,
{
    fn value(&self, p: &Point) -> f64 {
        self(p)
    }
}
