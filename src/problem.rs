//! A problem: one rank's piece of a mesh, its fields, its spatial functions
//! and its placement in the shared reference frame.

use crate::field::Field;
use crate::geometry::{AppTransform, Point};
use crate::mesh::Mesh;
use crate::oracles::SpatialFunction;
use crate::transfer_error::TransferError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Global identifier of a problem, shared by every rank holding a piece of it.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct ProblemId(pub u32);

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone)]
pub struct Problem {
    id: ProblemId,
    mesh: Mesh,
    transform: AppTransform,
    fields: BTreeMap<String, Field>,
    functions: BTreeMap<String, Arc<dyn SpatialFunction>>,
}

impl fmt::Debug for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Problem")
            .field("id", &self.id)
            .field("transform", &self.transform)
            .field("n_nodes", &self.mesh.n_nodes())
            .field("n_elements", &self.mesh.n_elements())
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Problem {
    pub fn new(id: ProblemId, mesh: Mesh) -> Self {
        Self {
            id,
            mesh,
            transform: AppTransform::default(),
            fields: BTreeMap::new(),
            functions: BTreeMap::new(),
        }
    }

    pub fn with_transform(mut self, transform: AppTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Shorthand for a Cartesian problem offset by `position`.
    pub fn at_position(self, position: Point) -> Self {
        self.with_transform(AppTransform::translation(position))
    }

    pub fn with_field(mut self, field: Field) -> Result<Self, TransferError> {
        self.add_field(field)?;
        Ok(self)
    }

    pub fn with_function(
        mut self,
        name: impl Into<String>,
        function: impl SpatialFunction + 'static,
    ) -> Self {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    /// Add or replace a field; its storage must match the mesh.
    pub fn add_field(&mut self, field: Field) -> Result<(), TransferError> {
        field.check_mesh(&self.mesh)?;
        self.fields.insert(field.name().to_string(), field);
        Ok(())
    }

    pub fn id(&self) -> ProblemId {
        self.id
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn transform(&self) -> &AppTransform {
        &self.transform
    }

    /// Position offset in the reference frame.
    pub fn position(&self) -> Point {
        self.transform.translation
    }

    pub fn field(&self, name: &str) -> Result<&Field, TransferError> {
        self.fields
            .get(name)
            .ok_or_else(|| TransferError::MissingVariable {
                problem: self.id,
                variable: name.to_string(),
            })
    }

    /// Mutable field together with the mesh it lives on.
    pub fn field_mut(&mut self, name: &str) -> Result<(&Mesh, &mut Field), TransferError> {
        let id = self.id;
        let field = self
            .fields
            .get_mut(name)
            .ok_or_else(|| TransferError::MissingVariable {
                problem: id,
                variable: name.to_string(),
            })?;
        Ok((&self.mesh, field))
    }

    pub fn function(&self, name: &str) -> Result<&Arc<dyn SpatialFunction>, TransferError> {
        self.functions
            .get(name)
            .ok_or_else(|| TransferError::MissingFunction {
                problem: self.id,
                name: name.to_string(),
            })
    }
}
