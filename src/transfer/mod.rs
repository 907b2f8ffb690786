//! General field transfer between distributed source and target problems.
//!
//! Every rank calls [`GeneralFieldTransfer::execute`] with its local source
//! and target pieces. Per variable the pipeline is:
//!
//! ```text
//! prepare evaluator -> gather source boxes -> extract outgoing points
//!   -> route -> exchange (remote evaluation) -> resolve -> write
//! ```
//!
//! The box gather and the point exchange are collective. Errors found on
//! one rank before or during them are held until the exchange completes,
//! so no peer is left waiting; a closing flag exchange makes every rank
//! fail together.

pub mod bounding_boxes;
pub mod evaluator;
pub mod exchange;
pub mod extract;
pub mod resolver;
pub mod router;
pub mod writer;

use crate::algs::collective::all_gather;
use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::WireCount;
use crate::config::{AttachedOracles, TransferConfig, VariableMapping};
use crate::geometry::Point;
use crate::oracles::{MeshDivision, NearestPositions};
use crate::problem::{Problem, ProblemId};
use crate::transfer_error::TransferError;
use bounding_boxes::gather_source_boxes;
use evaluator::{EvalContext, SourceEvaluator};
use exchange::exchange_points;
use extract::extract_outgoing;
use itertools::Itertools;
use resolver::resolve_all;
use router::route;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use writer::write_values;

/// A usable source answer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub value: f64,
    /// Distance used for tie-breaking between sources.
    pub distance: f64,
    pub source: ProblemId,
}

/// `None` marks a point no source could answer.
pub type Response = Option<Sample>;

/// A target point in the reference frame, as sent to source ranks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueryPoint {
    pub point: Point,
    pub target_problem: ProblemId,
    /// Target division of the point, when a target division is attached.
    pub division: Option<u32>,
}

/// Which side of the exchange observed a conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSide {
    /// Between sources evaluated on one rank.
    Source,
    /// Between answers of different ranks.
    Target,
}

/// Equidistant, disagreeing answers for one point.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Conflict {
    /// Winning source problem (source side) or target problem (target side).
    pub problem: ProblemId,
    /// Node or element index on the target side, when the point is one.
    pub dof: Option<usize>,
    pub point: Point,
    pub distance: f64,
    pub side: ConflictSide,
}

/// What one variable transfer did on this rank.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VariableReport {
    pub source_variable: String,
    pub target_variable: String,
    /// Source boxes in the gathered list.
    pub boxes: usize,
    /// Gathered boxes built from no node at all.
    pub invalid_boxes: usize,
    pub outgoing: usize,
    pub sent: usize,
    pub received: usize,
    pub local: usize,
    pub located: usize,
    pub extrapolated: usize,
    pub unset: usize,
    /// Nearest-location sample sets that stayed empty.
    pub empty_units: usize,
    pub conflicts: Vec<Conflict>,
}

/// Per-variable reports of one [`GeneralFieldTransfer::execute`] call.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TransferReport {
    pub variables: Vec<VariableReport>,
}

impl TransferReport {
    pub fn conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.variables.iter().flat_map(|v| v.conflicts.iter())
    }
}

/// Base tag of the first variable; each variable uses `TAGS_PER_VARIABLE`.
const DEFAULT_TAG: CommTag = CommTag::new(0x7100);
const TAGS_PER_VARIABLE: u16 = 8;

/// Attaches oracles to a configuration and validates the combination.
pub struct TransferBuilder<C: Communicator> {
    comm: C,
    config: TransferConfig,
    nearest_positions: Option<Arc<dyn NearestPositions>>,
    from_division: Option<Arc<dyn MeshDivision>>,
    to_division: Option<Arc<dyn MeshDivision>>,
    tag: CommTag,
}

impl<C: Communicator> TransferBuilder<C> {
    /// Group sources by the region of the closest registered position.
    pub fn nearest_positions(mut self, positions: Arc<dyn NearestPositions>) -> Self {
        self.nearest_positions = Some(positions);
        self
    }

    pub fn source_division(mut self, division: Arc<dyn MeshDivision>) -> Self {
        self.from_division = Some(division);
        self
    }

    pub fn target_division(mut self, division: Arc<dyn MeshDivision>) -> Self {
        self.to_division = Some(division);
        self
    }

    /// Base message tag; transfers running concurrently on one
    /// communicator need disjoint tags.
    pub fn tag(mut self, tag: CommTag) -> Self {
        self.tag = tag;
        self
    }

    pub fn build(self) -> Result<GeneralFieldTransfer<C>, TransferError> {
        self.config.validate(AttachedOracles {
            nearest_positions: self.nearest_positions.is_some(),
            from_division: self.from_division.is_some(),
            to_division: self.to_division.is_some(),
        })?;
        Ok(GeneralFieldTransfer {
            comm: self.comm,
            mappings: self.config.variable_mappings(),
            config: self.config,
            nearest_positions: self.nearest_positions,
            from_division: self.from_division,
            to_division: self.to_division,
            tag: self.tag,
        })
    }
}

/// The transfer engine of one rank.
pub struct GeneralFieldTransfer<C: Communicator> {
    comm: C,
    config: TransferConfig,
    mappings: Vec<VariableMapping>,
    nearest_positions: Option<Arc<dyn NearestPositions>>,
    from_division: Option<Arc<dyn MeshDivision>>,
    to_division: Option<Arc<dyn MeshDivision>>,
    tag: CommTag,
}

impl<C: Communicator> GeneralFieldTransfer<C> {
    pub fn builder(comm: C, config: TransferConfig) -> TransferBuilder<C> {
        TransferBuilder {
            comm,
            config,
            nearest_positions: None,
            from_division: None,
            to_division: None,
            tag: DEFAULT_TAG,
        }
    }

    /// Engine without oracles.
    pub fn new(comm: C, config: TransferConfig) -> Result<Self, TransferError> {
        Self::builder(comm, config).build()
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn communicator(&self) -> &C {
        &self.comm
    }

    /// Transfer every configured variable. Collective: every rank must
    /// call this with its local pieces, even when it holds none.
    pub fn execute(
        &self,
        sources: &[Problem],
        targets: &mut [Problem],
    ) -> Result<TransferReport, TransferError> {
        log::info!(
            "[rank {}] general field transfer: {} variable(s), {:?}, {} source / {} target pieces",
            self.comm.rank(),
            self.mappings.len(),
            self.config.strategy,
            sources.len(),
            targets.len()
        );
        let mut report = TransferReport::default();
        for (i, mapping) in self.mappings.iter().enumerate() {
            let tag = self.tag.offset(TAGS_PER_VARIABLE.wrapping_mul(i as u16));
            report
                .variables
                .push(self.transfer_variable(tag, mapping, sources, targets)?);
        }
        log::info!(
            "[rank {}] general field transfer done, {} conflict(s)",
            self.comm.rank(),
            report.conflicts().count()
        );
        Ok(report)
    }

    /// Run one variable, then agree on success so that a failure on any
    /// rank fails the transfer everywhere instead of stalling the next
    /// variable's collectives.
    fn transfer_variable(
        &self,
        tag: CommTag,
        mapping: &VariableMapping,
        sources: &[Problem],
        targets: &mut [Problem],
    ) -> Result<VariableReport, TransferError> {
        let outcome = self.run_variable(tag, mapping, sources, targets);
        let flags = all_gather(
            &self.comm,
            tag.offset(6),
            &[WireCount::new(usize::from(outcome.is_err()))],
        )?;
        let report = outcome?;
        match flags
            .iter()
            .position(|f| f.first().is_some_and(|c| c.get() != 0))
        {
            Some(peer) => Err(TransferError::CommError {
                neighbor: peer,
                message: format!("transfer of `{}` failed on that rank", mapping.source),
            }),
            None => Ok(report),
        }
    }

    fn run_variable(
        &self,
        tag: CommTag,
        mapping: &VariableMapping,
        sources: &[Problem],
        targets: &mut [Problem],
    ) -> Result<VariableReport, TransferError> {
        let config = &self.config;
        let me = self.comm.rank();
        let mut deferred: Option<TransferError> = None;

        let boxes = gather_source_boxes(&self.comm, tag, sources, config)?;
        let target_family = targets
            .iter()
            .find_map(|t| t.field(&mapping.target).ok())
            .map(|f| f.family());
        let ctx = EvalContext {
            config,
            mapping,
            sources,
            boxes: &boxes,
            rank: me,
            nearest_positions: self.nearest_positions.as_deref(),
            from_division: self.from_division.as_deref(),
            target_family,
        };
        let evaluator = match SourceEvaluator::prepare(&ctx) {
            Ok(e) => Some(e),
            Err(e) => {
                deferred.get_or_insert(e);
                None
            }
        };

        let outgoing = match extract_outgoing(targets, mapping, config, self.to_division.as_deref())
        {
            Ok(points) => points,
            Err(e) => {
                deferred.get_or_insert(e);
                Vec::new()
            }
        };
        let routes: Vec<BTreeSet<usize>> = outgoing
            .iter()
            .map(|o| route(&o.query.point, &boxes, config))
            .collect();
        if config.error_on_miss {
            if let Some((o, _)) = outgoing.iter().zip(&routes).find(|(_, r)| r.is_empty()) {
                deferred.get_or_insert(TransferError::PointNotLocated {
                    point: o.query.point,
                });
            }
        }

        let queries: Vec<QueryPoint> = outgoing.iter().map(|o| o.query).collect();
        let mut source_conflicts = Vec::new();
        let exchanged = exchange_points(&self.comm, tag.offset(2), &queries, &routes, |batch| {
            match &evaluator {
                Some(ev) => {
                    let (responses, conflicts) = ev.evaluate(&ctx, batch)?;
                    source_conflicts.extend(conflicts);
                    Ok(responses)
                }
                None => Ok(vec![None; batch.len()]),
            }
        });
        if let Some(err) = deferred {
            return Err(err);
        }
        let (answers, stats) = exchanged?;
        let empty_units = evaluator.as_ref().map_or(0, SourceEvaluator::empty_units);

        let (resolved, target_conflicts) =
            resolve_all(&outgoing, &answers, targets, config.search_value_conflicts);
        let written = write_values(targets, mapping, config, &outgoing, &resolved)?;

        let mut conflicts = source_conflicts;
        conflicts.extend(target_conflicts);
        if !conflicts.is_empty() {
            log::warn!(
                "[rank {me}] `{}` -> `{}`: {} equidistant source(s) with differing values: {}",
                mapping.source,
                mapping.target,
                conflicts.len(),
                conflicts
                    .iter()
                    .map(|c| format!("problem {} at {:?}", c.problem, c.point))
                    .join(", ")
            );
        }
        if boxes.n_invalid() > 0 || empty_units > 0 {
            log::warn!(
                "[rank {me}] `{}`: {} empty source box(es), {} empty sample set(s)",
                mapping.source,
                boxes.n_invalid(),
                empty_units
            );
        }
        log::debug!(
            "[rank {me}] `{}` -> `{}`: {} boxes, {} outgoing, sent {} received {} local {}, \
             located {} extrapolated {} unset {}",
            mapping.source,
            mapping.target,
            boxes.len(),
            outgoing.len(),
            stats.sent,
            stats.received,
            stats.local,
            written.located,
            written.extrapolated,
            written.unset
        );

        Ok(VariableReport {
            source_variable: mapping.source.clone(),
            target_variable: mapping.target.clone(),
            boxes: boxes.len(),
            invalid_boxes: boxes.n_invalid(),
            outgoing: outgoing.len(),
            sent: stats.sent,
            received: stats.received,
            local: stats.local,
            located: written.located,
            extrapolated: written.extrapolated,
            unset: written.unset,
            empty_units,
            conflicts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::config::Strategy;
    use crate::field::{Field, FieldFamily};
    use crate::mesh::generation::{StructuredCellType, structured_box_2d};

    fn problem(id: u32, n: usize, f: impl Fn(&Point) -> f64) -> Problem {
        let mesh =
            structured_box_2d(n, n, [0.0, 0.0], [1.0, 1.0], StructuredCellType::Quadrilateral)
                .unwrap();
        let field = Field::from_fn("u", FieldFamily::NodalLagrange, &mesh, f);
        Problem::new(ProblemId(id), mesh).with_field(field).unwrap()
    }

    #[test]
    fn identity_transfer_copies_values() {
        let transfer = GeneralFieldTransfer::new(
            NoComm,
            TransferConfig::for_variable("u", Strategy::MeshFunction),
        )
        .unwrap();
        let sources = vec![problem(0, 4, |p| 3.0 * p[0] - p[1])];
        let mut targets = vec![problem(1, 4, |_| 0.0)];
        let report = transfer.execute(&sources, &mut targets).unwrap();
        let got = targets[0].field("u").unwrap().values();
        let want = sources[0].field("u").unwrap().values();
        for (g, w) in got.iter().zip(want) {
            assert!((g - w).abs() < 1e-10, "{g} vs {w}");
        }
        let v = &report.variables[0];
        assert_eq!((v.outgoing, v.located, v.local, v.sent), (25, 25, 25, 0));
    }

    #[test]
    fn invalid_options_fail_at_build() {
        let config = TransferConfig {
            num_nearest_points: 0,
            ..TransferConfig::for_variable("u", Strategy::NearestLocation)
        };
        assert!(matches!(
            GeneralFieldTransfer::new(NoComm, config),
            Err(TransferError::InvalidConfig { option: "num_nearest_points", .. })
        ));
    }

    #[test]
    fn missing_source_variable_surfaces_after_the_round() {
        let transfer = GeneralFieldTransfer::new(
            NoComm,
            TransferConfig::for_variable("u", Strategy::NearestLocation),
        )
        .unwrap();
        let mesh =
            structured_box_2d(1, 1, [0.0, 0.0], [1.0, 1.0], StructuredCellType::Quadrilateral)
                .unwrap();
        let sources = vec![Problem::new(ProblemId(0), mesh)];
        let mut targets = vec![problem(1, 1, |_| 0.0)];
        assert!(matches!(
            transfer.execute(&sources, &mut targets),
            Err(TransferError::MissingVariable { problem: ProblemId(0), .. })
        ));
    }
}
