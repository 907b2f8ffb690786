//! Discrete fields stored on a [`Mesh`].
//!
//! A field owns a flat value array laid out slot-major: slot `s`, component
//! `c` lives at `s * n_components + c`. What a slot is depends on the family:
//!
//! | family | slot |
//! |---|---|
//! | [`FieldFamily::NodalLagrange`] | one per node |
//! | [`FieldFamily::ConstantMonomial`] | one per element |
//! | [`FieldFamily::DiscontinuousLagrange`] | one per (element, local vertex) |

pub mod mesh_function;

pub use mesh_function::MeshFunction;

use crate::geometry::Point;
use crate::geometry::cell::shape_functions;
use crate::mesh::{BlockId, ElemId, Mesh, NodeId};
use crate::transfer_error::TransferError;
use serde::{Deserialize, Serialize};

/// Finite-element family of a field.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum FieldFamily {
    /// Continuous first-order Lagrange, values at nodes.
    NodalLagrange,
    /// Piecewise constant, one value per element.
    ConstantMonomial,
    /// Discontinuous first-order Lagrange, element-local values at vertices.
    DiscontinuousLagrange,
}

impl FieldFamily {
    /// Families whose values cannot be set point-by-point from node or
    /// element queries and go through projection instead.
    pub fn is_higher_order(self) -> bool {
        matches!(self, FieldFamily::DiscontinuousLagrange)
    }

    pub fn is_nodal(self) -> bool {
        matches!(self, FieldFamily::NodalLagrange)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    name: String,
    family: FieldFamily,
    n_components: usize,
    values: Vec<f64>,
    /// First slot of each element; discontinuous families only.
    elem_offsets: Vec<usize>,
}

impl Field {
    /// Zero-initialised field sized for `mesh`.
    pub fn new(
        name: impl Into<String>,
        family: FieldFamily,
        n_components: usize,
        mesh: &Mesh,
    ) -> Self {
        let mut elem_offsets = Vec::new();
        let n_slots = match family {
            FieldFamily::NodalLagrange => mesh.n_nodes(),
            FieldFamily::ConstantMonomial => mesh.n_elements(),
            FieldFamily::DiscontinuousLagrange => {
                let mut next = 0;
                for (_, el) in mesh.elements() {
                    elem_offsets.push(next);
                    next += el.nodes.len();
                }
                next
            }
        };
        Self {
            name: name.into(),
            family,
            n_components: n_components.max(1),
            values: vec![0.0; n_slots * n_components.max(1)],
            elem_offsets,
        }
    }

    /// Scalar field whose slots are set to `f` at their natural positions.
    pub fn from_fn(
        name: impl Into<String>,
        family: FieldFamily,
        mesh: &Mesh,
        f: impl Fn(&Point) -> f64,
    ) -> Self {
        let mut field = Self::new(name, family, 1, mesh);
        field.fill_component(mesh, 0, f);
        field
    }

    /// Set component `comp` of every slot from `f`.
    pub fn fill_component(&mut self, mesh: &Mesh, comp: usize, f: impl Fn(&Point) -> f64) {
        for (slot, p) in self.slot_points(mesh).into_iter().enumerate() {
            self.values[slot * self.n_components + comp] = f(&p);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> FieldFamily {
        self.family
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn n_slots(&self) -> usize {
        self.values.len() / self.n_components
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value(&self, slot: usize, comp: usize) -> f64 {
        self.values[slot * self.n_components + comp]
    }

    pub fn set_value(&mut self, slot: usize, comp: usize, v: f64) {
        self.values[slot * self.n_components + comp] = v;
    }

    pub fn node_value(&self, n: NodeId, comp: usize) -> f64 {
        self.value(n.index(), comp)
    }

    pub fn elem_value(&self, e: ElemId, comp: usize) -> f64 {
        self.value(e.index(), comp)
    }

    pub fn check_component(&self, comp: usize) -> Result<(), TransferError> {
        if comp >= self.n_components {
            return Err(TransferError::ComponentOutOfRange {
                variable: self.name.clone(),
                component: comp,
                n_components: self.n_components,
            });
        }
        Ok(())
    }

    /// Storage must match the mesh the field is used with.
    pub fn check_mesh(&self, mesh: &Mesh) -> Result<(), TransferError> {
        let expected = match self.family {
            FieldFamily::NodalLagrange => mesh.n_nodes(),
            FieldFamily::ConstantMonomial => mesh.n_elements(),
            FieldFamily::DiscontinuousLagrange => {
                mesh.elements().map(|(_, el)| el.nodes.len()).sum()
            }
        };
        if expected != self.n_slots() {
            return Err(TransferError::FieldSizeMismatch {
                variable: self.name.clone(),
                expected,
                found: self.n_slots(),
            });
        }
        Ok(())
    }

    /// Position of every slot in the mesh frame, in slot order.
    pub fn slot_points(&self, mesh: &Mesh) -> Vec<Point> {
        match self.family {
            FieldFamily::NodalLagrange => mesh.nodes().map(|(_, p)| *p).collect(),
            FieldFamily::ConstantMonomial => mesh
                .elements()
                .map(|(e, _)| mesh.vertex_average(e))
                .collect(),
            FieldFamily::DiscontinuousLagrange => mesh
                .elements()
                .flat_map(|(e, _)| mesh.element_vertices(e))
                .collect(),
        }
    }

    /// Values of component `comp` attached to element `e`, in the order
    /// its shape functions expect.
    fn element_values(&self, mesh: &Mesh, e: ElemId, comp: usize) -> Vec<f64> {
        match self.family {
            FieldFamily::NodalLagrange => mesh
                .element(e)
                .nodes
                .iter()
                .map(|&n| self.node_value(n, comp))
                .collect(),
            FieldFamily::ConstantMonomial => vec![self.elem_value(e, comp)],
            FieldFamily::DiscontinuousLagrange => {
                let start = self.elem_offsets[e.index()];
                (0..mesh.element(e).nodes.len())
                    .map(|i| self.value(start + i, comp))
                    .collect()
            }
        }
    }

    /// Evaluate component `comp` inside element `e` at reference point `xi`
    /// through the family's own basis.
    pub fn evaluate_in_element(
        &self,
        mesh: &Mesh,
        e: ElemId,
        xi: &[f64],
        comp: usize,
    ) -> Result<f64, TransferError> {
        let local = self.element_values(mesh, e, comp);
        if self.family == FieldFamily::ConstantMonomial {
            return Ok(local[0]);
        }
        let (weights, _) = shape_functions(mesh.element(e).elem_type, xi)?;
        Ok(weights.iter().zip(local.iter()).map(|(w, v)| w * v).sum())
    }

    /// Value of component `comp` at node `n`. Nodal families read the node
    /// directly; element families average the touching elements in
    /// `blocks`. `None` when no such element exists.
    pub fn node_sample(
        &self,
        mesh: &Mesh,
        n: NodeId,
        comp: usize,
        blocks: &[BlockId],
    ) -> Option<f64> {
        if self.family.is_nodal() {
            return Some(self.node_value(n, comp));
        }
        let mut sum = 0.0;
        let mut count = 0usize;
        for &e in mesh.elements_of_node(n) {
            if !mesh.element_in_blocks(e, blocks) {
                continue;
            }
            sum += match self.family {
                FieldFamily::DiscontinuousLagrange => {
                    let local = mesh.element(e).nodes.iter().position(|&m| m == n)?;
                    self.value(self.elem_offsets[e.index()] + local, comp)
                }
                _ => self.elem_value(e, comp),
            };
            count += 1;
        }
        (count > 0).then(|| sum / count as f64)
    }

    /// Value of component `comp` at the vertex average of element `e`.
    /// Exact for every supported first-order element.
    pub fn element_sample(&self, mesh: &Mesh, e: ElemId, comp: usize) -> f64 {
        let local = self.element_values(mesh, e, comp);
        local.iter().sum::<f64>() / local.len() as f64
    }

    /// Points at which a projection onto this field must be evaluated, for
    /// the elements in `blocks`. Neighbouring elements share points, so the
    /// list holds duplicates.
    pub fn projection_points(&self, mesh: &Mesh, blocks: &[BlockId]) -> Vec<Point> {
        match self.family {
            FieldFamily::NodalLagrange => mesh
                .nodes()
                .filter(|(n, _)| mesh.node_in_blocks(*n, blocks))
                .map(|(_, p)| *p)
                .collect(),
            _ => {
                let points = self.slot_points(mesh);
                self.slots_in_blocks(mesh, blocks)
                    .map(|slot| points[slot])
                    .collect()
            }
        }
    }

    fn slots_in_blocks<'a>(
        &'a self,
        mesh: &'a Mesh,
        blocks: &'a [BlockId],
    ) -> impl Iterator<Item = usize> + 'a {
        mesh.elements()
            .filter(move |(e, _)| mesh.element_in_blocks(*e, blocks))
            .flat_map(move |(e, el)| match self.family {
                FieldFamily::DiscontinuousLagrange => {
                    let start = self.elem_offsets[e.index()];
                    start..start + el.nodes.len()
                }
                _ => e.index()..e.index() + 1,
            })
    }

    /// Interpolatory projection: every slot in `blocks` whose point `f`
    /// answers takes that value; the rest keep their prior value. Returns
    /// the number of slots assigned.
    ///
    /// For first-order families this is the exact projection of any
    /// function the basis represents.
    pub fn project_and_assign(
        &mut self,
        mesh: &Mesh,
        comp: usize,
        blocks: &[BlockId],
        mut f: impl FnMut(&Point) -> Option<f64>,
    ) -> Result<usize, TransferError> {
        self.check_component(comp)?;
        self.check_mesh(mesh)?;
        let points = self.slot_points(mesh);
        let slots: Vec<usize> = match self.family {
            FieldFamily::NodalLagrange => mesh
                .nodes()
                .filter(|(n, _)| mesh.node_in_blocks(*n, blocks))
                .map(|(n, _)| n.index())
                .collect(),
            _ => self.slots_in_blocks(mesh, blocks).collect(),
        };
        let mut assigned = 0;
        for slot in slots {
            if let Some(v) = f(&points[slot]) {
                self.set_value(slot, comp, v);
                assigned += 1;
            }
        }
        Ok(assigned)
    }
}
