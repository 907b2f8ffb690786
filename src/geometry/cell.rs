//! Reference-element mappings and first-order shape functions.
//!
//! The reference elements use the following vertex ordering:
//! - Segment: `[v0, v1]` with `xi in [0, 1]`.
//! - Triangle: `[v0, v1, v2]` with `(r, s)` in the unit right triangle.
//! - Quadrilateral: `[v0, v1, v2, v3]` with `(r, s)` in `[0, 1]^2`.
//! - Tetrahedron: `[v0, v1, v2, v3]` with `(r, s, t)` in the unit tetrahedron.
//! - Hexahedron: `[v0, ..., v7]` with `(r, s, t)` in `[0, 1]^3`.

use super::{Point, dot, norm, sub};
use crate::transfer_error::TransferError;
use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-12;
/// Slack on the reference-domain bounds when deciding containment.
const CONTAINS_TOL: f64 = 1e-10;
/// Relative residual above which a point is off a lower-dimensional element.
const RESIDUAL_TOL: f64 = 1e-9;

/// Supported element shapes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ElemType {
    Segment,
    Triangle,
    Quadrilateral,
    Tetrahedron,
    Hexahedron,
}

impl ElemType {
    /// Topological dimension.
    pub fn dimension(self) -> usize {
        match self {
            ElemType::Segment => 1,
            ElemType::Triangle | ElemType::Quadrilateral => 2,
            ElemType::Tetrahedron | ElemType::Hexahedron => 3,
        }
    }

    pub fn n_vertices(self) -> usize {
        match self {
            ElemType::Segment => 2,
            ElemType::Triangle => 3,
            ElemType::Quadrilateral | ElemType::Tetrahedron => 4,
            ElemType::Hexahedron => 8,
        }
    }
}

/// Shape-function weights and reference gradients at `reference_point`.
pub fn shape_functions(
    elem_type: ElemType,
    reference_point: &[f64],
) -> Result<(Vec<f64>, Vec<Vec<f64>>), TransferError> {
    if reference_point.len() != elem_type.dimension() {
        return Err(TransferError::InvalidGeometry(format!(
            "{elem_type:?} reference point must have {} components, got {}",
            elem_type.dimension(),
            reference_point.len()
        )));
    }
    let out = match elem_type {
        ElemType::Segment => {
            let r = reference_point[0];
            (vec![1.0 - r, r], vec![vec![-1.0], vec![1.0]])
        }
        ElemType::Triangle => {
            let (r, s) = (reference_point[0], reference_point[1]);
            (
                vec![1.0 - r - s, r, s],
                vec![vec![-1.0, -1.0], vec![1.0, 0.0], vec![0.0, 1.0]],
            )
        }
        ElemType::Quadrilateral => {
            let (r, s) = (reference_point[0], reference_point[1]);
            (
                vec![(1.0 - r) * (1.0 - s), r * (1.0 - s), r * s, (1.0 - r) * s],
                vec![
                    vec![-(1.0 - s), -(1.0 - r)],
                    vec![1.0 - s, -r],
                    vec![s, r],
                    vec![-s, 1.0 - r],
                ],
            )
        }
        ElemType::Tetrahedron => {
            let (r, s, t) = (reference_point[0], reference_point[1], reference_point[2]);
            (
                vec![1.0 - r - s - t, r, s, t],
                vec![
                    vec![-1.0, -1.0, -1.0],
                    vec![1.0, 0.0, 0.0],
                    vec![0.0, 1.0, 0.0],
                    vec![0.0, 0.0, 1.0],
                ],
            )
        }
        ElemType::Hexahedron => {
            let (r, s, t) = (reference_point[0], reference_point[1], reference_point[2]);
            let (rm, sm, tm) = (1.0 - r, 1.0 - s, 1.0 - t);
            (
                vec![
                    rm * sm * tm,
                    r * sm * tm,
                    r * s * tm,
                    rm * s * tm,
                    rm * sm * t,
                    r * sm * t,
                    r * s * t,
                    rm * s * t,
                ],
                vec![
                    vec![-sm * tm, -rm * tm, -rm * sm],
                    vec![sm * tm, -r * tm, -r * sm],
                    vec![s * tm, r * tm, -r * s],
                    vec![-s * tm, rm * tm, -rm * s],
                    vec![-sm * t, -rm * t, rm * sm],
                    vec![sm * t, -r * t, r * sm],
                    vec![s * t, r * t, r * s],
                    vec![-s * t, rm * t, rm * s],
                ],
            )
        }
    };
    Ok(out)
}

/// Map a point in reference coordinates to physical coordinates.
pub fn reference_to_physical(
    elem_type: ElemType,
    vertices: &[Point],
    reference_point: &[f64],
) -> Result<Point, TransferError> {
    let (weights, _) = shape_functions(elem_type, reference_point)?;
    check_vertex_count(elem_type, vertices)?;
    let mut out = [0.0; 3];
    for (weight, vertex) in weights.iter().zip(vertices.iter()) {
        out[0] += weight * vertex[0];
        out[1] += weight * vertex[1];
        out[2] += weight * vertex[2];
    }
    Ok(out)
}

/// Jacobian columns `dx/dxi_k` at a reference point.
fn jacobian_columns(
    elem_type: ElemType,
    vertices: &[Point],
    reference_point: &[f64],
) -> Result<Vec<Point>, TransferError> {
    let (_, grads) = shape_functions(elem_type, reference_point)?;
    check_vertex_count(elem_type, vertices)?;
    let dim = elem_type.dimension();
    let mut cols = vec![[0.0; 3]; dim];
    for (vertex, grad) in vertices.iter().zip(grads.iter()) {
        for (k, col) in cols.iter_mut().enumerate() {
            col[0] += vertex[0] * grad[k];
            col[1] += vertex[1] * grad[k];
            col[2] += vertex[2] * grad[k];
        }
    }
    Ok(cols)
}

/// Least-squares pull-back of a physical vector into reference space.
fn pull_back_vector(cols: &[Point], physical_vector: Point) -> Result<Vec<f64>, TransferError> {
    let degenerate = || TransferError::InvalidGeometry("degenerate jacobian".into());
    match cols.len() {
        1 => {
            let denom = dot(cols[0], cols[0]);
            if denom.abs() <= EPS {
                return Err(degenerate());
            }
            Ok(vec![dot(cols[0], physical_vector) / denom])
        }
        2 => {
            let a = dot(cols[0], cols[0]);
            let b = dot(cols[0], cols[1]);
            let c = dot(cols[1], cols[1]);
            let det = a * c - b * b;
            if det.abs() <= EPS {
                return Err(degenerate());
            }
            let rhs0 = dot(cols[0], physical_vector);
            let rhs1 = dot(cols[1], physical_vector);
            let inv_det = 1.0 / det;
            Ok(vec![
                (c * rhs0 - b * rhs1) * inv_det,
                (-b * rhs0 + a * rhs1) * inv_det,
            ])
        }
        3 => {
            let mut mat = [0.0; 9];
            for i in 0..3 {
                for j in 0..3 {
                    mat[i * 3 + j] = dot(cols[i], cols[j]);
                }
            }
            let rhs = [
                dot(cols[0], physical_vector),
                dot(cols[1], physical_vector),
                dot(cols[2], physical_vector),
            ];
            let inv = invert_3x3(mat).ok_or_else(degenerate)?;
            Ok(vec![
                inv[0] * rhs[0] + inv[1] * rhs[1] + inv[2] * rhs[2],
                inv[3] * rhs[0] + inv[4] * rhs[1] + inv[5] * rhs[2],
                inv[6] * rhs[0] + inv[7] * rhs[1] + inv[8] * rhs[2],
            ])
        }
        dim => Err(TransferError::InvalidGeometry(format!(
            "unsupported reference dimension: {dim}"
        ))),
    }
}

/// Map a physical point back to reference coordinates using Newton iteration.
///
/// Exact in one step for affine elements; bilinear/trilinear elements converge
/// in a handful of iterations for reasonably shaped cells.
pub fn physical_to_reference(
    elem_type: ElemType,
    vertices: &[Point],
    physical_point: &Point,
) -> Result<Vec<f64>, TransferError> {
    let mut ref_point = vec![0.5; elem_type.dimension()];
    for _ in 0..20 {
        let mapped = reference_to_physical(elem_type, vertices, &ref_point)?;
        let residual = sub(mapped, *physical_point);
        let cols = jacobian_columns(elem_type, vertices, &ref_point)?;
        let correction = pull_back_vector(&cols, residual)?;
        let step: f64 = correction.iter().map(|c| c * c).sum::<f64>().sqrt();
        for (r, c) in ref_point.iter_mut().zip(correction.iter()) {
            *r -= c;
        }
        if step <= 1e-13 {
            break;
        }
    }
    Ok(ref_point)
}

/// Whether a reference point lies in the reference element (with slack).
pub fn reference_contains(elem_type: ElemType, xi: &[f64]) -> bool {
    let tol = CONTAINS_TOL;
    let in_unit = |v: f64| v >= -tol && v <= 1.0 + tol;
    match elem_type {
        ElemType::Segment | ElemType::Quadrilateral | ElemType::Hexahedron => {
            xi.iter().all(|&v| in_unit(v))
        }
        ElemType::Triangle | ElemType::Tetrahedron => {
            xi.iter().all(|&v| v >= -tol) && xi.iter().sum::<f64>() <= 1.0 + tol
        }
    }
}

/// Reference coordinates of `p` if it lies inside the element.
///
/// For elements of lower dimension than the ambient space, `p` must also lie
/// on the element (relative residual below tolerance).
pub fn locate_in_element(
    elem_type: ElemType,
    vertices: &[Point],
    p: &Point,
) -> Result<Option<Vec<f64>>, TransferError> {
    let xi = physical_to_reference(elem_type, vertices, p)?;
    if !reference_contains(elem_type, &xi) {
        return Ok(None);
    }
    let mapped = reference_to_physical(elem_type, vertices, &xi)?;
    let h = element_diameter(vertices).max(EPS);
    if norm(sub(mapped, *p)) > RESIDUAL_TOL * h {
        return Ok(None);
    }
    Ok(Some(xi))
}

/// Largest vertex-to-vertex distance.
pub fn element_diameter(vertices: &[Point]) -> f64 {
    let mut h: f64 = 0.0;
    for (i, a) in vertices.iter().enumerate() {
        for b in &vertices[i + 1..] {
            h = h.max(norm(sub(*a, *b)));
        }
    }
    h
}

fn check_vertex_count(elem_type: ElemType, vertices: &[Point]) -> Result<(), TransferError> {
    if vertices.len() != elem_type.n_vertices() {
        return Err(TransferError::InvalidGeometry(format!(
            "vertex count mismatch for {elem_type:?}: expected {}, got {}",
            elem_type.n_vertices(),
            vertices.len()
        )));
    }
    Ok(())
}

fn invert_3x3(mat: [f64; 9]) -> Option<[f64; 9]> {
    let det = mat[0] * (mat[4] * mat[8] - mat[5] * mat[7])
        - mat[1] * (mat[3] * mat[8] - mat[5] * mat[6])
        + mat[2] * (mat[3] * mat[7] - mat[4] * mat[6]);
    if det.abs() <= EPS {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        (mat[4] * mat[8] - mat[5] * mat[7]) * inv_det,
        (mat[2] * mat[7] - mat[1] * mat[8]) * inv_det,
        (mat[1] * mat[5] - mat[2] * mat[4]) * inv_det,
        (mat[5] * mat[6] - mat[3] * mat[8]) * inv_det,
        (mat[0] * mat[8] - mat[2] * mat[6]) * inv_det,
        (mat[2] * mat[3] - mat[0] * mat[5]) * inv_det,
        (mat[3] * mat[7] - mat[4] * mat[6]) * inv_det,
        (mat[1] * mat[6] - mat[0] * mat[7]) * inv_det,
        (mat[0] * mat[4] - mat[1] * mat[3]) * inv_det,
    ])
}
