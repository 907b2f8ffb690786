//! Source-side evaluation of received query points.
//!
//! The four strategies form a closed set behind [`SourceEvaluator`]:
//! `prepare` builds the per-variable state once, `evaluate` answers one
//! received batch. Every strategy applies the same gates before a source
//! problem may answer:
//!
//! - `use_nearest_app`: only the problem positioned closest to the point;
//! - nearest positions: only sources in the point's region;
//! - source division: restriction or index matching;
//! - target division matched against problem ids;
//! - `from_app_must_contain_point`: the source mesh must contain the point.

pub mod mesh_function;
pub mod nearest_location;
pub mod shape_projection;
pub mod user_callback;

use crate::config::{DivisionUse, Strategy, TransferConfig, VariableMapping};
use crate::field::FieldFamily;
use crate::geometry::{Point, distance};
use crate::oracles::{MeshDivision, NearestPositions};
use crate::problem::{Problem, ProblemId};
use crate::transfer::bounding_boxes::SourceBoxes;
use crate::transfer::resolver::closest;
use crate::transfer::{Conflict, ConflictSide, QueryPoint, Response, Sample};
use crate::transfer_error::TransferError;

pub use mesh_function::MeshFunctionSampler;
pub use nearest_location::NearestLocationIndex;
pub use shape_projection::ShapeSampler;
pub use user_callback::CallbackSampler;

/// Everything a strategy may read while evaluating.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub config: &'a TransferConfig,
    pub mapping: &'a VariableMapping,
    /// Local source pieces.
    pub sources: &'a [Problem],
    pub boxes: &'a SourceBoxes,
    pub rank: usize,
    pub nearest_positions: Option<&'a dyn NearestPositions>,
    pub from_division: Option<&'a dyn MeshDivision>,
    /// Family of the local target variable; `None` without local targets.
    pub target_family: Option<FieldFamily>,
}

impl<'a> EvalContext<'a> {
    /// Local source indices in increasing problem-id order.
    pub fn source_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.sources.len()).collect();
        order.sort_by_key(|&i| self.sources[i].id());
        order
    }

    /// Nearest-app and target-division gates, which only need the problem id.
    pub fn admits_problem(&self, q: &QueryPoint, problem: ProblemId) -> bool {
        if self.config.use_nearest_app && self.boxes.nearest_problem(&q.point) != Some(problem) {
            return false;
        }
        if self.config.to_division_use == Some(DivisionUse::MatchSubappIndex)
            && q.division != Some(problem.0)
        {
            return false;
        }
        true
    }

    /// Source-division gate for a source location in division `division`.
    pub fn admits_division(&self, q: &QueryPoint, division: Option<u32>) -> bool {
        match self.config.from_division_use {
            None => true,
            Some(DivisionUse::SpatialRestriction) => division.is_some(),
            Some(DivisionUse::MatchDivisionIndex) => division.is_some() && division == q.division,
            Some(DivisionUse::MatchSubappIndex) => division == Some(q.target_problem.0),
        }
    }

    pub fn nearest_region(&self, p: &Point) -> Option<usize> {
        self.nearest_positions.and_then(|np| np.nearest_index(p))
    }

    /// `from_app_must_contain_point` gate, `local` in the problem's frame.
    pub fn admits_containment(
        &self,
        problem: &Problem,
        local: &Point,
    ) -> Result<bool, TransferError> {
        if !self.config.from_app_must_contain_point {
            return Ok(true);
        }
        problem.mesh().contains_point(local, &self.config.from_blocks)
    }

    /// Shared loop of the function-style strategies: visit admitted sources
    /// in id order, sample each at the point mapped into its frame and keep
    /// the closest. Distance is measured to the source problem's position.
    pub fn scan_sources(
        &self,
        order: &[usize],
        q: &QueryPoint,
        mut sample: impl FnMut(usize, &Point) -> Result<Option<f64>, TransferError>,
    ) -> Result<(Response, bool), TransferError> {
        let mut candidates = Vec::new();
        let query_region = self.nearest_region(&q.point);
        for &i in order {
            let problem = &self.sources[i];
            if !self.admits_problem(q, problem.id()) {
                continue;
            }
            if self.nearest_positions.is_some()
                && self.nearest_region(&problem.position()) != query_region
            {
                continue;
            }
            let local = problem.transform().to_local(&q.point);
            if let Some(div) = self.from_division {
                if !self.admits_division(q, div.division_index(&local)) {
                    continue;
                }
            }
            if !self.admits_containment(problem, &local)? {
                continue;
            }
            if let Some(value) = sample(i, &local)? {
                candidates.push(Sample {
                    value,
                    distance: distance(&q.point, &problem.position()),
                    source: problem.id(),
                });
            }
        }
        Ok(closest(&candidates))
    }
}

/// The active strategy with its prepared state.
pub enum SourceEvaluator<'a> {
    MeshFunction(MeshFunctionSampler<'a>),
    NearestLocation(NearestLocationIndex),
    ShapeProjection(ShapeSampler<'a>),
    UserCallback(CallbackSampler<'a>),
}

impl<'a> SourceEvaluator<'a> {
    /// Build the per-variable state of the configured strategy.
    pub fn prepare(ctx: &EvalContext<'a>) -> Result<Self, TransferError> {
        Ok(match ctx.config.strategy {
            Strategy::MeshFunction => Self::MeshFunction(MeshFunctionSampler::prepare(ctx)?),
            Strategy::NearestLocation => {
                Self::NearestLocation(NearestLocationIndex::prepare(ctx)?)
            }
            Strategy::ShapeProjection => Self::ShapeProjection(ShapeSampler::prepare(ctx)?),
            Strategy::UserCallback => Self::UserCallback(CallbackSampler::prepare(ctx)?),
        })
    }

    /// Sample sets that ended up empty (nearest location only).
    pub fn empty_units(&self) -> usize {
        match self {
            Self::NearestLocation(index) => index.empty_units(),
            _ => 0,
        }
    }

    fn evaluate_point(
        &self,
        ctx: &EvalContext<'a>,
        q: &QueryPoint,
    ) -> Result<(Response, bool), TransferError> {
        match self {
            Self::MeshFunction(s) => s.evaluate(ctx, q),
            Self::NearestLocation(s) => s.evaluate(ctx, q),
            Self::ShapeProjection(s) => s.evaluate(ctx, q),
            Self::UserCallback(s) => s.evaluate(ctx, q),
        }
    }

    /// Answer a batch; source-side ties are returned as conflicts when
    /// `search_value_conflicts` is set. Answers keep the batch order.
    pub fn evaluate(
        &self,
        ctx: &EvalContext<'a>,
        points: &[QueryPoint],
    ) -> Result<(Vec<Response>, Vec<Conflict>), TransferError> {
        #[cfg(feature = "rayon")]
        let results: Vec<_> = {
            use rayon::prelude::*;
            points
                .par_iter()
                .map(|q| self.evaluate_point(ctx, q))
                .collect()
        };
        #[cfg(not(feature = "rayon"))]
        let results: Vec<_> = points.iter().map(|q| self.evaluate_point(ctx, q)).collect();

        let mut responses = Vec::with_capacity(points.len());
        let mut conflicts = Vec::new();
        for (q, result) in points.iter().zip(results) {
            let (response, tied) = result?;
            if tied && ctx.config.search_value_conflicts {
                if let Some(s) = response {
                    conflicts.push(Conflict {
                        problem: s.source,
                        dof: None,
                        point: q.point,
                        distance: s.distance,
                        side: ConflictSide::Source,
                    });
                }
            }
            responses.push(response);
        }
        Ok((responses, conflicts))
    }
}
