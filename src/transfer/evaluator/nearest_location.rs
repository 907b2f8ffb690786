//! k-nearest-neighbour evaluation over sampled source locations.
//!
//! Source samples (nodes or element vertex-averages) are split into units,
//! one kd-tree each:
//!
//! | configuration            | unit key                         |
//! |--------------------------|----------------------------------|
//! | default                  | problem                          |
//! | nearest positions        | problem × nearest-position region|
//! | source division          | problem × division               |
//! | `group_subapps`          | region or division, all problems |
//!
//! A query averages the `k` nearest samples of every admitted unit and the
//! closest unit wins. Single-problem units live in the problem's own frame,
//! grouped units in the reference frame.

use super::EvalContext;
use crate::config::SourceType;
use crate::field::{Field, FieldFamily};
use crate::geometry::{KdTree, Point, fuzzy_equal};
use crate::mesh::Mesh;
use crate::problem::{Problem, ProblemId};
use crate::transfer::resolver::closest;
use crate::transfer::{QueryPoint, Response, Sample};
use crate::transfer_error::TransferError;
use itertools::iproduct;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct UnitKey {
    /// `None` for units grouping every problem.
    problem: Option<ProblemId>,
    region: Option<usize>,
    division: Option<u32>,
}

#[derive(Debug)]
struct SourceUnit {
    tree: KdTree,
    values: Vec<f64>,
    /// Owning problem of each sample.
    owners: Vec<ProblemId>,
    /// Local source index for single-problem units.
    local: Option<usize>,
}

/// Prepared k-NN state for one variable.
#[derive(Debug)]
pub struct NearestLocationIndex {
    units: BTreeMap<UnitKey, SourceUnit>,
    empty: usize,
    k: usize,
}

/// Resolve `VariableDefault` against the source family. Discontinuous
/// fields have no single value per node and refuse node sampling.
fn sample_kind(
    requested: SourceType,
    field: &Field,
    problem: ProblemId,
) -> Result<SourceType, TransferError> {
    let kind = match requested {
        SourceType::VariableDefault if field.family().is_nodal() => SourceType::Nodes,
        SourceType::VariableDefault => SourceType::Centroids,
        explicit => explicit,
    };
    if kind == SourceType::Nodes && field.family() == FieldFamily::DiscontinuousLagrange {
        return Err(TransferError::InvalidConfig {
            option: "source_type",
            reason: format!(
                "`{}` of problem {problem} is discontinuous and cannot be sampled at nodes",
                field.name()
            ),
        });
    }
    Ok(kind)
}

/// Whether samples of `kind` poorly match how the target stores values.
fn mismatches_target(kind: SourceType, target: FieldFamily) -> bool {
    matches!(
        (kind, target),
        (SourceType::Nodes, FieldFamily::ConstantMonomial)
            | (SourceType::Centroids, FieldFamily::NodalLagrange)
    )
}

/// Local-frame samples of component `comp` passing the source restrictions.
fn collect_samples(
    ctx: &EvalContext<'_>,
    mesh: &Mesh,
    field: &Field,
    kind: SourceType,
) -> Vec<(Point, f64)> {
    let config = ctx.config;
    let comp = ctx.mapping.source_component;
    match kind {
        SourceType::Centroids => mesh
            .elements()
            .filter(|(e, _)| {
                mesh.element_in_blocks(*e, &config.from_blocks)
                    && mesh.element_on_boundaries(*e, &config.from_boundaries)
            })
            .map(|(e, _)| (mesh.vertex_average(e), field.element_sample(mesh, e, comp)))
            .collect(),
        _ => mesh
            .nodes()
            .filter(|(n, _)| {
                mesh.node_in_blocks(*n, &config.from_blocks)
                    && mesh.node_on_boundaries(*n, &config.from_boundaries)
            })
            .filter_map(|(n, p)| {
                field
                    .node_sample(mesh, n, comp, &config.from_blocks)
                    .map(|v| (*p, v))
            })
            .collect(),
    }
}

#[derive(Default)]
struct UnitBuilder {
    points: Vec<Point>,
    values: Vec<f64>,
    owners: Vec<ProblemId>,
    local: Option<usize>,
}

impl NearestLocationIndex {
    pub fn prepare(ctx: &EvalContext<'_>) -> Result<Self, TransferError> {
        let config = ctx.config;
        let grouped = config.group_subapps;
        if grouped {
            if let Some(p) = ctx
                .sources
                .iter()
                .find(|p| !p.transform().coord_system.is_cartesian())
            {
                return Err(TransferError::InvalidConfig {
                    option: "group_subapps",
                    reason: format!(
                        "source problem {} is not Cartesian and cannot share a sample set",
                        p.id()
                    ),
                });
            }
        }

        let mut builders: BTreeMap<UnitKey, UnitBuilder> = BTreeMap::new();
        let mut warned = false;
        for i in ctx.source_order() {
            let problem: &Problem = &ctx.sources[i];
            let field = problem.field(&ctx.mapping.source)?;
            field.check_component(ctx.mapping.source_component)?;
            field.check_mesh(problem.mesh())?;
            let kind = sample_kind(ctx.mapping.source_type, field, problem.id())?;
            let mismatch = ctx
                .target_family
                .filter(|t| !warned && mismatches_target(kind, *t));
            if let Some(target) = mismatch {
                log::warn!(
                    "sampling `{}` at {:?} for {:?} target `{}`",
                    field.name(),
                    kind,
                    target,
                    ctx.mapping.target
                );
                warned = true;
            }

            for (local, value) in collect_samples(ctx, problem.mesh(), field, kind) {
                let reference = problem.transform().to_reference(&local);
                let region = match ctx.nearest_positions {
                    Some(np) => match np.nearest_index(&reference) {
                        Some(r) => Some(r),
                        None => continue,
                    },
                    None => None,
                };
                let division = match ctx.from_division {
                    Some(div) => match div.division_index(&local) {
                        Some(d) => Some(d),
                        None => continue,
                    },
                    None => None,
                };
                let key = UnitKey {
                    problem: (!grouped).then(|| problem.id()),
                    region,
                    division,
                };
                let unit = builders.entry(key).or_default();
                if grouped {
                    unit.points.push(reference);
                } else {
                    unit.points.push(local);
                    unit.local = Some(i);
                }
                unit.values.push(value);
                unit.owners.push(problem.id());
            }
        }

        let expected = Self::expected_units(ctx);
        let empty = expected
            .iter()
            .filter(|key| !builders.contains_key(key))
            .count();

        let units = builders
            .into_iter()
            .map(|(key, b)| {
                (
                    key,
                    SourceUnit {
                        tree: KdTree::new(b.points),
                        values: b.values,
                        owners: b.owners,
                        local: b.local,
                    },
                )
            })
            .collect();
        Ok(Self {
            units,
            empty,
            k: config.num_nearest_points.max(1),
        })
    }

    /// Every unit the configuration calls for, filled or not.
    fn expected_units(ctx: &EvalContext<'_>) -> Vec<UnitKey> {
        let problems: Vec<Option<ProblemId>> = if ctx.config.group_subapps {
            vec![None]
        } else {
            ctx.sources.iter().map(|p| Some(p.id())).collect()
        };
        let regions: Vec<Option<usize>> = match ctx.nearest_positions {
            Some(np) => (0..np.positions().len()).map(Some).collect(),
            None => vec![None],
        };
        let divisions: Vec<Option<u32>> = match ctx.from_division {
            Some(div) => (0..div.n_divisions() as u32).map(Some).collect(),
            None => vec![None],
        };
        iproduct!(problems, regions, divisions)
            .map(|(problem, region, division)| UnitKey {
                problem,
                region,
                division,
            })
            .collect()
    }

    /// Units that received no sample.
    pub fn empty_units(&self) -> usize {
        self.empty
    }

    fn admits(
        &self,
        ctx: &EvalContext<'_>,
        q: &QueryPoint,
        key: &UnitKey,
        unit: &SourceUnit,
        query_region: Option<usize>,
    ) -> Result<bool, TransferError> {
        if let Some(id) = key.problem {
            if !ctx.admits_problem(q, id) {
                return Ok(false);
            }
        }
        if ctx.nearest_positions.is_some() && key.region != query_region {
            return Ok(false);
        }
        if ctx.from_division.is_some() && !ctx.admits_division(q, key.division) {
            return Ok(false);
        }
        if !ctx.config.from_app_must_contain_point {
            return Ok(true);
        }
        match unit.local {
            Some(i) => {
                let problem = &ctx.sources[i];
                ctx.admits_containment(problem, &problem.transform().to_local(&q.point))
            }
            None => {
                for problem in ctx.sources {
                    let local = problem.transform().to_local(&q.point);
                    if ctx.admits_containment(problem, &local)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    pub fn evaluate(
        &self,
        ctx: &EvalContext<'_>,
        q: &QueryPoint,
    ) -> Result<(Response, bool), TransferError> {
        let search = ctx.config.search_value_conflicts;
        let query_region = ctx.nearest_region(&q.point);
        let mut candidates = Vec::new();
        let mut unit_ties = Vec::new();

        for (key, unit) in &self.units {
            if !self.admits(ctx, q, key, unit, query_region)? {
                continue;
            }
            let at = match unit.local {
                Some(i) => ctx.sources[i].transform().to_local(&q.point),
                None => q.point,
            };
            let wanted = if search { self.k + 1 } else { self.k };
            let hits = unit.tree.nearest(&at, wanted);
            let used = hits.len().min(self.k);
            if used == 0 {
                continue;
            }
            let value =
                hits[..used].iter().map(|h| unit.values[h.index]).sum::<f64>() / used as f64;
            let dist = hits[..used]
                .iter()
                .map(|h| h.distance_squared.sqrt())
                .sum::<f64>()
                / used as f64;
            let tie = search
                && hits.len() > self.k
                && fuzzy_equal(
                    hits[self.k - 1].distance_squared.sqrt(),
                    hits[self.k].distance_squared.sqrt(),
                )
                && !fuzzy_equal(
                    unit.values[hits[self.k - 1].index],
                    unit.values[hits[self.k].index],
                );
            candidates.push(Sample {
                value,
                distance: dist,
                source: unit.owners[hits[0].index],
            });
            unit_ties.push(tie);
        }

        let (best, cross_tie) = closest(&candidates);
        let winner_tie = best.is_some_and(|b| {
            candidates
                .iter()
                .zip(&unit_ties)
                .any(|(c, &tie)| tie && c == &b)
        });
        Ok((best, cross_tie || winner_tie))
    }
}

#[cfg(test)]
mod tests {
    use super::super::SourceEvaluator;
    use super::*;
    use crate::config::{DivisionUse, Strategy, TransferConfig};
    use crate::geometry::BoundingBox;
    use crate::mesh::generation::{StructuredCellType, point_cloud, structured_box_2d};
    use crate::oracles::{CartesianGridDivision, MeshDivision, NearestPositions, PositionList};
    use crate::transfer::bounding_boxes::SourceBoxes;
    use crate::transfer::{Conflict, ConflictSide};

    fn corners(id: u32) -> Problem {
        let mesh = point_cloud(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ])
        .unwrap();
        let mut field = Field::new("u", FieldFamily::NodalLagrange, 1, &mesh);
        for (slot, v) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            field.set_value(slot, 0, v);
        }
        Problem::new(ProblemId(id), mesh).with_field(field).unwrap()
    }

    fn q(x: f64, y: f64) -> QueryPoint {
        QueryPoint {
            point: [x, y, 0.0],
            target_problem: ProblemId(0),
            division: None,
        }
    }

    fn run(
        config: &TransferConfig,
        sources: &[Problem],
        positions: Option<&dyn NearestPositions>,
        division: Option<&dyn MeshDivision>,
        points: &[QueryPoint],
    ) -> (Vec<Response>, Vec<Conflict>, usize) {
        let mapping = config.variable_mappings().remove(0);
        let boxes = SourceBoxes::default();
        let ctx = EvalContext {
            config,
            mapping: &mapping,
            sources,
            boxes: &boxes,
            rank: 0,
            nearest_positions: positions,
            from_division: division,
            target_family: None,
        };
        let eval = SourceEvaluator::prepare(&ctx).unwrap();
        let (answers, conflicts) = eval.evaluate(&ctx, points).unwrap();
        (answers, conflicts, eval.empty_units())
    }

    #[test]
    fn four_node_scenario() {
        let config = TransferConfig::for_variable("u", Strategy::NearestLocation);
        let (answers, conflicts, _) = run(&config, &[corners(0)], None, None, &[q(0.1, 0.1)]);
        let s = answers[0].unwrap();
        assert_eq!(s.value, 1.0);
        assert!((s.distance - 0.02f64.sqrt()).abs() < 1e-12);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn k_nearest_values_are_averaged() {
        let config = TransferConfig {
            num_nearest_points: 2,
            ..TransferConfig::for_variable("u", Strategy::NearestLocation)
        };
        let (answers, _, _) = run(&config, &[corners(0)], None, None, &[q(0.1, 0.0)]);
        let s = answers[0].unwrap();
        assert!((s.value - 1.5).abs() < 1e-12);
        assert!((s.distance - 0.5).abs() < 1e-12);
    }

    #[test]
    fn equidistant_samples_with_different_values_conflict() {
        let config = TransferConfig {
            search_value_conflicts: true,
            ..TransferConfig::for_variable("u", Strategy::NearestLocation)
        };
        let (answers, conflicts, _) =
            run(&config, &[corners(0)], None, None, &[q(0.5, 0.0), q(0.1, 0.1)]);
        // The lower sample index wins the tie.
        assert_eq!(answers[0].unwrap().value, 1.0);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].point, [0.5, 0.0, 0.0]);
        assert_eq!(conflicts[0].side, ConflictSide::Source);
    }

    #[test]
    fn closest_problem_wins_across_units() {
        let config = TransferConfig::for_variable("u", Strategy::NearestLocation);
        let far = corners(1).with_transform(crate::geometry::AppTransform::translation([
            5.0, 0.0, 0.0,
        ]));
        let (answers, _, _) = run(&config, &[far, corners(0)], None, None, &[q(5.9, 0.9)]);
        let s = answers[0].unwrap();
        assert_eq!(s.source, ProblemId(1));
        assert_eq!(s.value, 4.0);
    }

    #[test]
    fn centroid_sampling_uses_vertex_averages() {
        let mesh =
            structured_box_2d(2, 1, [0.0, 0.0], [2.0, 1.0], StructuredCellType::Quadrilateral)
                .unwrap();
        let field = Field::from_fn("u", FieldFamily::ConstantMonomial, &mesh, |p| p[0]);
        let source = Problem::new(ProblemId(0), mesh).with_field(field).unwrap();
        let config = TransferConfig::for_variable("u", Strategy::NearestLocation);
        let (answers, _, _) = run(&config, &[source], None, None, &[q(1.4, 0.5)]);
        let s = answers[0].unwrap();
        assert_eq!(s.value, 1.5);
        assert!((s.distance - 0.1).abs() < 1e-12);
    }

    #[test]
    fn discontinuous_sources_refuse_node_sampling() {
        let mesh =
            structured_box_2d(2, 1, [0.0, 0.0], [2.0, 1.0], StructuredCellType::Quadrilateral)
                .unwrap();
        let field = Field::from_fn("u", FieldFamily::DiscontinuousLagrange, &mesh, |p| p[0]);
        let source = Problem::new(ProblemId(3), mesh).with_field(field).unwrap();
        let config = TransferConfig {
            source_type: vec![SourceType::Nodes],
            ..TransferConfig::for_variable("u", Strategy::NearestLocation)
        };
        let mapping = config.variable_mappings().remove(0);
        let boxes = SourceBoxes::default();
        let sources = [source];
        let ctx = EvalContext {
            config: &config,
            mapping: &mapping,
            sources: &sources,
            boxes: &boxes,
            rank: 0,
            nearest_positions: None,
            from_division: None,
            target_family: None,
        };
        match NearestLocationIndex::prepare(&ctx) {
            Err(TransferError::InvalidConfig { option, reason }) => {
                assert_eq!(option, "source_type");
                assert!(reason.contains("problem 3"), "{reason}");
            }
            other => panic!("expected a source_type error, got {other:?}"),
        }

        // The default samples discontinuous fields at centroids.
        let config = TransferConfig::for_variable("u", Strategy::NearestLocation);
        let (answers, _, _) = run(&config, &sources, None, None, &[q(1.4, 0.5)]);
        assert_eq!(answers[0].unwrap().value, 1.5);
    }

    #[test]
    fn sample_kinds_are_checked_against_the_target_family() {
        assert!(mismatches_target(SourceType::Nodes, FieldFamily::ConstantMonomial));
        assert!(mismatches_target(SourceType::Centroids, FieldFamily::NodalLagrange));
        assert!(!mismatches_target(SourceType::Nodes, FieldFamily::NodalLagrange));
        assert!(!mismatches_target(SourceType::Centroids, FieldFamily::ConstantMonomial));
        assert!(!mismatches_target(SourceType::Centroids, FieldFamily::DiscontinuousLagrange));
    }

    #[test]
    fn regions_split_units_and_count_empty_ones() {
        let config = TransferConfig::for_variable("u", Strategy::NearestLocation);
        let positions = PositionList(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [50.0, 0.0, 0.0]]);
        // The query sits in region 1; only corner samples at x = 1 belong there.
        let (answers, _, empty) =
            run(&config, &[corners(0)], Some(&positions), None, &[q(0.6, 0.0)]);
        assert_eq!(answers[0].unwrap().value, 2.0);
        assert_eq!(empty, 1);
    }

    #[test]
    fn grouped_divisions_pool_problems() {
        let config = TransferConfig {
            group_subapps: true,
            from_division_use: Some(DivisionUse::SpatialRestriction),
            ..TransferConfig::for_variable("u", Strategy::NearestLocation)
        };
        let division =
            CartesianGridDivision::new(BoundingBox::new([0.0; 3], [1.0, 1.0, 0.0]), [1, 1, 1]);
        let shifted = corners(1).with_transform(crate::geometry::AppTransform::translation([
            0.5, 0.0, 0.0,
        ]));
        let (answers, _, empty) = run(
            &config,
            &[corners(0), shifted],
            None,
            Some(&division),
            &[q(1.45, 0.0)],
        );
        // Problem 1's first corner sits at x = 0.5, its second at x = 1.5.
        let s = answers[0].unwrap();
        assert_eq!(s.source, ProblemId(1));
        assert_eq!(s.value, 2.0);
        assert_eq!(empty, 0);
    }
}
