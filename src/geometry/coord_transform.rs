//! Mapping between a problem's local frame and the shared reference frame.
//!
//! Every spatial comparison in a transfer happens in the reference frame.
//! A problem's local coordinates reach it through a rigid translation; for
//! axisymmetric and spherically symmetric problems the reverse mapping also
//! collapses a 3D reference point onto the problem's `(r, z)` or `r` axes.

use super::{BoundingBox, Point, add, sub};
use serde::{Deserialize, Serialize};

/// Cartesian axis.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Coordinate system of a problem's mesh.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum CoordSystem {
    #[default]
    Cartesian,
    /// Axisymmetric about `axial`; the radial coordinate lives on `X`
    /// (or on `Y` when the axial axis is `X`).
    Rz { axial: Axis },
    /// Spherically symmetric, radius on `X`.
    RSpherical,
}

impl CoordSystem {
    fn radial_axis(self) -> usize {
        match self {
            CoordSystem::Rz { axial: Axis::X } => 1,
            _ => 0,
        }
    }

    /// Axes a bounding box must be mirrored across to stay conservative.
    pub fn mirrored_axes(self) -> Vec<usize> {
        match self {
            CoordSystem::Cartesian => Vec::new(),
            CoordSystem::Rz { axial } => (0..3).filter(|&i| i != axial.index()).collect(),
            CoordSystem::RSpherical => vec![0, 1, 2],
        }
    }

    pub fn is_cartesian(self) -> bool {
        matches!(self, CoordSystem::Cartesian)
    }
}

/// Position offset plus coordinate system of one problem.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AppTransform {
    pub translation: Point,
    pub coord_system: CoordSystem,
}

impl AppTransform {
    pub fn new(translation: Point, coord_system: CoordSystem) -> Self {
        Self {
            translation,
            coord_system,
        }
    }

    pub fn translation(translation: Point) -> Self {
        Self::new(translation, CoordSystem::Cartesian)
    }

    /// Local mesh coordinates to the reference frame.
    pub fn to_reference(&self, local: &Point) -> Point {
        add(*local, self.translation)
    }

    /// Reference-frame point to local coordinates, collapsing symmetric
    /// coordinate systems.
    pub fn to_local(&self, reference: &Point) -> Point {
        let p = sub(*reference, self.translation);
        match self.coord_system {
            CoordSystem::Cartesian => p,
            CoordSystem::Rz { axial } => {
                let a = axial.index();
                let r2: f64 = (0..3).filter(|&i| i != a).map(|i| p[i] * p[i]).sum();
                let mut out = [0.0; 3];
                out[self.coord_system.radial_axis()] = r2.sqrt();
                out[a] = p[a];
                out
            }
            CoordSystem::RSpherical => {
                let mut out = [0.0; 3];
                out[0] = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
                out
            }
        }
    }

    /// Local bounding box to a conservative reference-frame box.
    pub fn box_to_reference(&self, local: &BoundingBox) -> BoundingBox {
        local
            .mirrored(&self.coord_system.mirrored_axes())
            .translated(&self.translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartesian_round_trip() {
        let t = AppTransform::translation([1.0, 2.0, 3.0]);
        let p = [0.5, 0.5, 0.5];
        assert_eq!(t.to_local(&t.to_reference(&p)), p);
    }

    #[test]
    fn rz_collapses_onto_radius_and_axis() {
        let t = AppTransform::new([0.0; 3], CoordSystem::Rz { axial: Axis::Y });
        let local = t.to_local(&[3.0, 7.0, 4.0]);
        assert_eq!(local, [5.0, 7.0, 0.0]);
    }

    #[test]
    fn spherical_box_is_mirrored_everywhere() {
        let t = AppTransform::new([1.0, 0.0, 0.0], CoordSystem::RSpherical);
        let b = t.box_to_reference(&BoundingBox::new([0.0; 3], [2.0, 0.0, 0.0]));
        assert_eq!(b.min, [-1.0, -2.0, -2.0]);
        assert_eq!(b.max, [3.0, 2.0, 2.0]);
    }
}
