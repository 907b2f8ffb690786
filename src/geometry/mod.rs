//! Geometric primitives shared by the transfer engine.
//!
//! Points are plain `[f64; 3]` triples; 1D and 2D meshes leave the unused
//! coordinates at zero.

pub mod bounding_box;
pub mod cell;
pub mod coord_transform;
pub mod kdtree;
pub mod position_hash;

pub use bounding_box::BoundingBox;
pub use cell::ElemType;
pub use coord_transform::{AppTransform, Axis, CoordSystem};
pub use kdtree::KdTree;
pub use position_hash::{PositionHasher, PositionKey, PositionMap};

/// A point or vector in 3D space.
pub type Point = [f64; 3];

/// Absolute tolerance used for every fuzzy floating-point comparison.
pub const FUZZY_TOLERANCE: f64 = 1e-12;

/// `|a - b| <= FUZZY_TOLERANCE`.
#[inline]
pub fn fuzzy_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= FUZZY_TOLERANCE
}

/// Component-wise fuzzy equality of two points.
#[inline]
pub fn fuzzy_equal_points(a: &Point, b: &Point) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| fuzzy_equal(*x, *y))
}

#[inline]
pub fn add(a: Point, b: Point) -> Point {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub(a: Point, b: Point) -> Point {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn dot(a: Point, b: Point) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn norm(a: Point) -> f64 {
    dot(a, a).sqrt()
}

/// Squared Euclidean distance.
#[inline]
pub fn distance_squared(a: &Point, b: &Point) -> f64 {
    let d = sub(*a, *b);
    dot(d, d)
}

/// Euclidean distance.
#[inline]
pub fn distance(a: &Point, b: &Point) -> f64 {
    distance_squared(a, b).sqrt()
}

/// Arithmetic mean of a non-empty set of points, `None` when empty.
pub fn average(points: impl IntoIterator<Item = Point>) -> Option<Point> {
    let mut sum = [0.0; 3];
    let mut count = 0usize;
    for p in points {
        sum = add(sum, p);
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let inv = 1.0 / count as f64;
    Some([sum[0] * inv, sum[1] * inv, sum[2] * inv])
}
