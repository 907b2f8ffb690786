//! Evaluation of a spatial function supplied by each source problem.
//!
//! The callback is defined everywhere, so a source only answers for points
//! inside its own (inflated) bounding box on this rank.

use super::EvalContext;
use crate::oracles::SpatialFunction;
use crate::transfer::{QueryPoint, Response};
use crate::transfer_error::TransferError;
use std::sync::Arc;

pub struct CallbackSampler<'a> {
    functions: Vec<&'a Arc<dyn SpatialFunction>>,
    order: Vec<usize>,
}

impl<'a> CallbackSampler<'a> {
    pub fn prepare(ctx: &EvalContext<'a>) -> Result<Self, TransferError> {
        let sources = ctx.sources;
        let functions = sources
            .iter()
            .map(|p| p.function(&ctx.mapping.source))
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
        ctx.scan_sources(&self.order, q, |i, local| {
            let id = ctx.sources[i].id();
            let inside = ctx
                .boxes
                .get(ctx.rank, id)
                .is_some_and(|b| b.bbox.is_valid() && b.bbox.contains(&q.point));
            Ok(inside.then(|| self.functions[i].value(local)))
        })
    }
}
