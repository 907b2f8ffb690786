//! Axis-aligned bounding boxes used to cull candidate sources.
//!
//! The corner-distance queries are exact over all eight corners. A
//! centre-distance shortcut under- or over-estimates asymmetric boxes, which
//! would make the router drop sources that hold the nearest sample.

use super::{FUZZY_TOLERANCE, Point, distance};
use serde::{Deserialize, Serialize};

/// Min/max corner pair. A box built from no points is *invalid*: its min is
/// `+MAX` and its max is `-MAX`, so it contains nothing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::invalid()
    }
}

impl BoundingBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// The empty box that every `extend` call grows from.
    pub fn invalid() -> Self {
        Self {
            min: [f64::MAX; 3],
            max: [f64::MIN; 3],
        }
    }

    /// Smallest box holding every point, invalid if the iterator is empty.
    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Self {
        let mut bbox = Self::invalid();
        for p in points {
            bbox.extend(&p);
        }
        bbox
    }

    pub fn is_valid(&self) -> bool {
        (0..3).all(|i| self.min[i] <= self.max[i])
    }

    pub fn extend(&mut self, p: &Point) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    pub fn center(&self) -> Point {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        ]
    }

    pub fn widths(&self) -> Point {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Inclusive containment with the engine's fuzzy tolerance.
    pub fn contains(&self, p: &Point) -> bool {
        self.is_valid()
            && (0..3).all(|i| {
                p[i] >= self.min[i] - FUZZY_TOLERANCE && p[i] <= self.max[i] + FUZZY_TOLERANCE
            })
    }

    /// Translate by `offset`. Invalid boxes stay invalid.
    pub fn translated(&self, offset: &Point) -> Self {
        if !self.is_valid() {
            return *self;
        }
        let mut out = *self;
        for i in 0..3 {
            out.min[i] += offset[i];
            out.max[i] += offset[i];
        }
        out
    }

    /// Scale the half-widths about the centre by `factor`.
    pub fn inflated(&self, factor: f64) -> Self {
        if !self.is_valid() {
            return *self;
        }
        let c = self.center();
        let w = self.widths();
        let mut out = *self;
        for i in 0..3 {
            out.min[i] = c[i] - 0.5 * w[i] * factor;
            out.max[i] = c[i] + 0.5 * w[i] * factor;
        }
        out
    }

    /// Replace the full width on every axis whose `sizes` entry is positive,
    /// keeping the centre.
    pub fn with_fixed_size(&self, sizes: &Point) -> Self {
        if !self.is_valid() {
            return *self;
        }
        let c = self.center();
        let mut out = *self;
        for i in 0..3 {
            if sizes[i] > 0.0 {
                out.min[i] = c[i] - 0.5 * sizes[i];
                out.max[i] = c[i] + 0.5 * sizes[i];
            }
        }
        out
    }

    /// Mirror the box about the origin on the given axes: each becomes
    /// `[-m, m]` where `m` is the largest absolute extent among `radial`.
    pub fn mirrored(&self, radial: &[usize]) -> Self {
        if !self.is_valid() || radial.is_empty() {
            return *self;
        }
        let rmax = radial
            .iter()
            .map(|&i| self.min[i].abs().max(self.max[i].abs()))
            .fold(0.0, f64::max);
        let mut out = *self;
        for &i in radial {
            out.min[i] = -rmax;
            out.max[i] = rmax;
        }
        out
    }

    /// All eight corners, `x` varying fastest.
    pub fn corners(&self) -> [Point; 8] {
        let lo_hi = [self.min, self.max];
        let mut out = [[0.0; 3]; 8];
        for z in 0..2 {
            for y in 0..2 {
                for x in 0..2 {
                    out[x + 2 * y + 4 * z] = [lo_hi[x][0], lo_hi[y][1], lo_hi[z][2]];
                }
            }
        }
        out
    }

    /// Largest distance from `p` to any corner. `f64::MAX` for invalid boxes.
    pub fn distance_to_farthest_corner(&self, p: &Point) -> f64 {
        if !self.is_valid() {
            return f64::MAX;
        }
        self.corners()
            .iter()
            .map(|c| distance(p, c))
            .fold(0.0, f64::max)
    }

    /// Smallest distance from `p` to any corner. `f64::MAX` for invalid boxes.
    pub fn distance_to_nearest_corner(&self, p: &Point) -> f64 {
        if !self.is_valid() {
            return f64::MAX;
        }
        self.corners()
            .iter()
            .map(|c| distance(p, c))
            .fold(f64::MAX, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> BoundingBox {
        BoundingBox::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])
    }

    #[test]
    fn empty_box_is_invalid_and_contains_nothing() {
        let b = BoundingBox::from_points(std::iter::empty());
        assert!(!b.is_valid());
        assert!(!b.contains(&[0.0, 0.0, 0.0]));
        assert_eq!(b.distance_to_nearest_corner(&[0.0; 3]), f64::MAX);
    }

    #[test]
    fn corner_distances_are_exact_for_asymmetric_boxes() {
        let b = BoundingBox::new([0.0, 0.0, 0.0], [4.0, 1.0, 0.0]);
        let p = [-1.0, 0.0, 0.0];
        assert!((b.distance_to_nearest_corner(&p) - 1.0).abs() < 1e-14);
        assert!((b.distance_to_farthest_corner(&p) - 26f64.sqrt()).abs() < 1e-14);
    }

    #[test]
    fn inflation_keeps_center() {
        let b = unit().inflated(3.0);
        assert_eq!(b.center(), [0.5, 0.5, 0.5]);
        assert_eq!(b.min, [-1.0, -1.0, -1.0]);
        assert_eq!(b.max, [2.0, 2.0, 2.0]);
    }

    #[test]
    fn fixed_size_only_touches_positive_axes() {
        let b = unit().with_fixed_size(&[4.0, 0.0, 0.0]);
        assert_eq!(b.min, [-1.5, 0.0, 0.0]);
        assert_eq!(b.max, [2.5, 1.0, 1.0]);
    }

    #[test]
    fn mirroring_covers_missing_quadrants() {
        let rz = BoundingBox::new([0.5, -1.0, 0.0], [2.0, 3.0, 0.0]);
        let m = rz.mirrored(&[0, 2]);
        assert_eq!(m.min, [-2.0, -1.0, -2.0]);
        assert_eq!(m.max, [2.0, 3.0, 2.0]);
        assert!(m.contains(&[-1.5, 0.0, 1.0]));
    }
}
