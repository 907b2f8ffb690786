//! Enumerate the query points of the local target problems.
//!
//! One point per target degree of freedom: nodes for nodal fields, element
//! vertex-averages for constant fields, and the field's projection points
//! for discontinuous fields (deduplicated by position, so coincident DOFs
//! of neighbouring elements are asked for once).

use crate::config::{TransferConfig, VariableMapping};
use crate::field::FieldFamily;
use crate::geometry::{Point, PositionHasher, PositionMap};
use crate::mesh::{ElemId, NodeId};
use crate::oracles::MeshDivision;
use crate::problem::Problem;
use crate::transfer::QueryPoint;
use crate::transfer_error::TransferError;

/// What a query point will be written back into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DofTarget {
    Node(NodeId),
    Element(ElemId),
    /// A projection point, keyed by its local position.
    Projection,
}

/// A query point and where its answer goes.
#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingPoint {
    /// Index into the local target slice.
    pub target: usize,
    pub dof: DofTarget,
    /// Position in the target problem's frame.
    pub local: Point,
    pub query: QueryPoint,
}

/// Outgoing points of every local target, in (target, DOF) order.
pub fn extract_outgoing(
    targets: &[Problem],
    mapping: &VariableMapping,
    config: &TransferConfig,
    to_division: Option<&dyn MeshDivision>,
) -> Result<Vec<OutgoingPoint>, TransferError> {
    let mut out = Vec::new();
    for (t, problem) in targets.iter().enumerate() {
        let mesh = problem.mesh();
        let field = problem.field(&mapping.target)?;
        field.check_component(mapping.target_component)?;

        let mut candidates: Vec<(DofTarget, Point)> = Vec::new();
        match field.family() {
            FieldFamily::NodalLagrange => {
                for (n, p) in mesh.nodes() {
                    if mesh.node_in_blocks(n, &config.to_blocks)
                        && mesh.node_on_boundaries(n, &config.to_boundaries)
                    {
                        candidates.push((DofTarget::Node(n), *p));
                    }
                }
            }
            FieldFamily::ConstantMonomial => {
                for (e, _) in mesh.elements() {
                    if mesh.element_in_blocks(e, &config.to_blocks)
                        && mesh.element_on_boundaries(e, &config.to_boundaries)
                    {
                        candidates.push((DofTarget::Element(e), mesh.vertex_average(e)));
                    }
                }
            }
            FieldFamily::DiscontinuousLagrange => {
                if !config.to_boundaries.is_empty() {
                    return Err(TransferError::InvalidConfig {
                        option: "to_boundaries",
                        reason: format!(
                            "boundary restriction is not supported for the discontinuous \
                             target variable `{}`",
                            mapping.target
                        ),
                    });
                }
                let mut seen = PositionMap::new(PositionHasher::for_box(&mesh.bounding_box()));
                for p in field.projection_points(mesh, &config.to_blocks) {
                    if seen.insert(p, ()) {
                        candidates.push((DofTarget::Projection, p));
                    }
                }
            }
        }

        for (dof, local) in candidates {
            let division = match to_division {
                Some(div) => match div.division_index(&local) {
                    Some(d) => Some(d),
                    None => continue,
                },
                None => None,
            };
            out.push(OutgoingPoint {
                target: t,
                dof,
                local,
                query: QueryPoint {
                    point: problem.transform().to_reference(&local),
                    target_problem: problem.id(),
                    division,
                },
            });
        }
    }
    Ok(out)
}
