//! Evaluation through a continuous mesh function per source problem.

use super::EvalContext;
use crate::field::mesh_function::MeshFunction;
use crate::transfer::{QueryPoint, Response};
use crate::transfer_error::TransferError;

pub struct MeshFunctionSampler<'a> {
    /// Indexed like `EvalContext::sources`.
    functions: Vec<MeshFunction<'a>>,
    order: Vec<usize>,
}

impl<'a> MeshFunctionSampler<'a> {
    pub fn prepare(ctx: &EvalContext<'a>) -> Result<Self, TransferError> {
        let sources = ctx.sources;
        let config = ctx.config;
        let functions = sources
            .iter()
            .map(|p| {
                MeshFunction::new(
                    p.mesh(),
                    p.field(&ctx.mapping.source)?,
                    ctx.mapping.source_component,
                    &config.from_blocks,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            functions,
            order: ctx.source_order(),
        })
    }

    pub fn evaluate(
        &self,
        ctx: &EvalContext<'a>,
        q: &QueryPoint,
    ) -> Result<(Response, bool), TransferError> {
        ctx.scan_sources(&self.order, q, |i, local| self.functions[i].value(local))
    }
}
