//! Evaluation through point location and the field's native shape functions.
//!
//! On shared faces the lowest-numbered containing element answers. The field
//! is read per call instead of through a prepared mesh function.

use super::EvalContext;
use crate::field::Field;
use crate::problem::Problem;
use crate::transfer::{QueryPoint, Response};
use crate::transfer_error::TransferError;

pub struct ShapeSampler<'a> {
    sources: &'a [Problem],
    fields: Vec<&'a Field>,
    component: usize,
    order: Vec<usize>,
}

impl<'a> ShapeSampler<'a> {
    pub fn prepare(ctx: &EvalContext<'a>) -> Result<Self, TransferError> {
        let sources = ctx.sources;
        let fields = sources
            .iter()
            .map(|p| {
                let field = p.field(&ctx.mapping.source)?;
                field.check_component(ctx.mapping.source_component)?;
                field.check_mesh(p.mesh())?;
                Ok(field)
            })
            .collect::<Result<Vec<_>, TransferError>>()?;
        Ok(Self {
            sources,
            fields,
            component: ctx.mapping.source_component,
            order: ctx.source_order(),
        })
    }

    pub fn evaluate(
        &self,
        ctx: &EvalContext<'a>,
        q: &QueryPoint,
    ) -> Result<(Response, bool), TransferError> {
        ctx.scan_sources(&self.order, q, |i, local| {
            let mesh = self.sources[i].mesh();
            match mesh.locate_element(local, &ctx.config.from_blocks)? {
                Some((e, xi)) => Ok(Some(
                    self.fields[i].evaluate_in_element(mesh, e, &xi, self.component)?,
                )),
                None => Ok(None),
            }
        })
    }
}
