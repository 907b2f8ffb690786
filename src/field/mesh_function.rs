//! Continuous point-evaluation wrapper around a [`Field`].

use super::Field;
use crate::geometry::Point;
use crate::mesh::{BlockId, Mesh};
use crate::transfer_error::TransferError;

/// Evaluates one component of a field anywhere inside its mesh.
///
/// On faces shared by several elements the lowest-numbered containing element
/// answers. A problem split across ranks in element order therefore reads the
/// same value on every rank count. Points outside the (block-restricted) mesh
/// evaluate to `None`.
#[derive(Clone, Copy, Debug)]
pub struct MeshFunction<'a> {
    mesh: &'a Mesh,
    field: &'a Field,
    component: usize,
    blocks: &'a [BlockId],
}

impl<'a> MeshFunction<'a> {
    pub fn new(
        mesh: &'a Mesh,
        field: &'a Field,
        component: usize,
        blocks: &'a [BlockId],
    ) -> Result<Self, TransferError> {
        field.check_component(component)?;
        field.check_mesh(mesh)?;
        Ok(Self {
            mesh,
            field,
            component,
            blocks,
        })
    }

    pub fn value(&self, p: &Point) -> Result<Option<f64>, TransferError> {
        match self.mesh.locate_element(p, self.blocks)? {
            Some((e, xi)) => Ok(Some(self.field.evaluate_in_element(
                self.mesh,
                e,
                &xi,
                self.component,
            )?)),
            None => Ok(None),
        }
    }
}
