//! Structured generators for lines, rectangles and boxes.
//!
//! Generated meshes carry the boundary node sets `left`/`right` (x),
//! `bottom`/`top` (y) and `back`/`front` (z) for the axes they span. All
//! elements are placed in block 0.

use super::{Element, Mesh, NodeId};
use crate::geometry::{ElemType, FUZZY_TOLERANCE, Point};
use crate::transfer_error::TransferError;

/// Cell-type choices for structured meshes.
#[derive(Clone, Copy, Debug)]
pub enum StructuredCellType {
    Triangle,
    Quadrilateral,
    Hexahedron,
}

fn invalid_geometry(message: impl Into<String>) -> TransferError {
    TransferError::InvalidGeometry(message.into())
}

fn tag_sides(mesh: &mut Mesh, min: Point, max: Point, dim: usize) -> Result<(), TransferError> {
    const SIDES: [(&str, &str); 3] = [("left", "right"), ("bottom", "top"), ("back", "front")];
    for (axis, (lo, hi)) in SIDES.iter().enumerate().take(dim) {
        let on = |target: f64| -> Vec<NodeId> {
            mesh.nodes()
                .filter(|(_, p)| (p[axis] - target).abs() <= FUZZY_TOLERANCE)
                .map(|(n, _)| n)
                .collect()
        };
        let (lo_nodes, hi_nodes) = (on(min[axis]), on(max[axis]));
        mesh.add_boundary(*lo, lo_nodes)?;
        mesh.add_boundary(*hi, hi_nodes)?;
    }
    Ok(())
}

/// `nx` segments over `[min, max]` on the x axis.
pub fn structured_line(nx: usize, min: f64, max: f64) -> Result<Mesh, TransferError> {
    if nx == 0 {
        return Err(invalid_geometry("nx must be positive"));
    }
    let dx = (max - min) / nx as f64;
    let nodes = (0..=nx).map(|i| [min + dx * i as f64, 0.0, 0.0]).collect();
    let elements = (0..nx)
        .map(|i| Element::new(ElemType::Segment, vec![NodeId(i), NodeId(i + 1)]))
        .collect();
    let mut mesh = Mesh::new(nodes, elements)?;
    tag_sides(&mut mesh, [min, 0.0, 0.0], [max, 0.0, 0.0], 1)?;
    Ok(mesh)
}

/// Structured 2D mesh over `[min, max]` with `nx`×`ny` cells in the z = 0 plane.
pub fn structured_box_2d(
    nx: usize,
    ny: usize,
    min: [f64; 2],
    max: [f64; 2],
    cell_type: StructuredCellType,
) -> Result<Mesh, TransferError> {
    if nx == 0 || ny == 0 {
        return Err(invalid_geometry("nx and ny must be positive"));
    }
    if matches!(cell_type, StructuredCellType::Hexahedron) {
        return Err(invalid_geometry("hex elements are not valid for 2D meshes"));
    }

    let dx = (max[0] - min[0]) / nx as f64;
    let dy = (max[1] - min[1]) / ny as f64;
    let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        let y = min[1] + dy * j as f64;
        for i in 0..=nx {
            nodes.push([min[0] + dx * i as f64, y, 0.0]);
        }
    }

    let mut elements = Vec::new();
    let row_stride = nx + 1;
    for j in 0..ny {
        for i in 0..nx {
            let v0 = j * row_stride + i;
            let v1 = v0 + 1;
            let v3 = v0 + row_stride;
            let v2 = v3 + 1;
            let ids = |vs: &[usize]| vs.iter().map(|&v| NodeId(v)).collect::<Vec<_>>();
            match cell_type {
                StructuredCellType::Triangle => {
                    elements.push(Element::new(ElemType::Triangle, ids(&[v0, v1, v2])));
                    elements.push(Element::new(ElemType::Triangle, ids(&[v0, v2, v3])));
                }
                _ => {
                    elements.push(Element::new(ElemType::Quadrilateral, ids(&[v0, v1, v2, v3])));
                }
            }
        }
    }

    let mut mesh = Mesh::new(nodes, elements)?;
    tag_sides(&mut mesh, [min[0], min[1], 0.0], [max[0], max[1], 0.0], 2)?;
    Ok(mesh)
}

/// Structured hexahedral mesh over `[min, max]` with `nx`×`ny`×`nz` cells.
pub fn structured_box_3d(
    nx: usize,
    ny: usize,
    nz: usize,
    min: Point,
    max: Point,
) -> Result<Mesh, TransferError> {
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(invalid_geometry("nx, ny, and nz must be positive"));
    }

    let dx = (max[0] - min[0]) / nx as f64;
    let dy = (max[1] - min[1]) / ny as f64;
    let dz = (max[2] - min[2]) / nz as f64;
    let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        let z = min[2] + dz * k as f64;
        for j in 0..=ny {
            let y = min[1] + dy * j as f64;
            for i in 0..=nx {
                nodes.push([min[0] + dx * i as f64, y, z]);
            }
        }
    }

    let mut elements = Vec::with_capacity(nx * ny * nz);
    let row_stride = nx + 1;
    let slab_stride = row_stride * (ny + 1);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let v0 = k * slab_stride + j * row_stride + i;
                let v3 = v0 + row_stride;
                let v4 = v0 + slab_stride;
                let v7 = v4 + row_stride;
                let conn = [v0, v0 + 1, v3 + 1, v3, v4, v4 + 1, v7 + 1, v7];
                elements.push(Element::new(
                    ElemType::Hexahedron,
                    conn.iter().map(|&v| NodeId(v)).collect(),
                ));
            }
        }
    }

    let mut mesh = Mesh::new(nodes, elements)?;
    tag_sides(&mut mesh, min, max, 3)?;
    Ok(mesh)
}

/// Element-free mesh of isolated nodes, usable as a nearest-location source.
pub fn point_cloud(points: Vec<Point>) -> Result<Mesh, TransferError> {
    Mesh::new(points, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_2d_counts_and_sides() {
        let mesh =
            structured_box_2d(3, 2, [0.0, 0.0], [3.0, 2.0], StructuredCellType::Triangle).unwrap();
        assert_eq!(mesh.n_nodes(), 12);
        assert_eq!(mesh.n_elements(), 12);
        assert_eq!(mesh.boundary("top").map(|s| s.len()), Some(4));
        assert_eq!(mesh.boundary("left").map(|s| s.len()), Some(3));
    }

    #[test]
    fn box_3d_elements_are_locatable() {
        let mesh = structured_box_3d(2, 2, 2, [0.0; 3], [1.0; 3]).unwrap();
        assert_eq!(mesh.n_elements(), 8);
        let (_, xi) = mesh
            .locate_element(&[0.75, 0.25, 0.75], &[])
            .unwrap()
            .unwrap();
        for (x, want) in xi.iter().zip([0.5, 0.5, 0.5]) {
            assert!((x - want).abs() < 1e-12);
        }
        assert_eq!(mesh.boundary("front").map(|s| s.len()), Some(9));
    }

    #[test]
    fn zero_cells_is_an_error() {
        assert!(structured_line(0, 0.0, 1.0).is_err());
    }
}
