//! Commit resolved values into the target fields.
//!
//! Out-of-domain points fail with `error_on_miss` before any target is
//! touched, otherwise take the
//! extrapolation constant when one is configured and keep their prior value
//! when not. Discontinuous targets go through the field's projection with a
//! position-keyed cache of the resolved values.

use super::Response;
use super::extract::{DofTarget, OutgoingPoint};
use crate::config::{TransferConfig, VariableMapping};
use crate::geometry::{PositionHasher, PositionMap};
use crate::problem::Problem;
use crate::transfer_error::TransferError;

/// Outcome counts of one commit on this rank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Points set from a source sample.
    pub located: usize,
    /// Points set to the extrapolation constant.
    pub extrapolated: usize,
    /// Points left at their prior value.
    pub unset: usize,
}

fn not_located(problem: &Problem, o: &OutgoingPoint) -> TransferError {
    let what = match o.dof {
        DofTarget::Node(n) => format!("Node {n} at {:?}", o.local),
        DofTarget::Element(e) => format!("Element {e} centroid {:?}", o.local),
        DofTarget::Projection => format!("Projection point {:?}", o.local),
    };
    TransferError::DofNotLocated {
        problem: problem.id(),
        what,
    }
}

/// Write `resolved[i]` for `outgoing[i]` into variable `mapping.target`.
pub fn write_values(
    targets: &mut [Problem],
    mapping: &VariableMapping,
    config: &TransferConfig,
    outgoing: &[OutgoingPoint],
    resolved: &[Response],
) -> Result<WriteStats, TransferError> {
    if config.error_on_miss {
        for (t, problem) in targets.iter().enumerate() {
            let miss = outgoing
                .iter()
                .zip(resolved)
                .find(|(o, r)| o.target == t && r.is_none());
            if let Some((o, _)) = miss {
                return Err(not_located(problem, o));
            }
        }
    }

    let mut stats = WriteStats::default();
    let comp = mapping.target_component;
    for (t, problem) in targets.iter_mut().enumerate() {
        let mine: Vec<(&OutgoingPoint, &Response)> = outgoing
            .iter()
            .zip(resolved)
            .filter(|(o, _)| o.target == t)
            .collect();
        for (_, r) in &mine {
            match (r, config.extrapolation_constant) {
                (Some(_), _) => stats.located += 1,
                (None, Some(_)) => stats.extrapolated += 1,
                (None, None) => stats.unset += 1,
            }
        }

        let (mesh, field) = problem.field_mut(&mapping.target)?;
        field.check_component(comp)?;
        let projected = mine.iter().any(|(o, _)| o.dof == DofTarget::Projection);
        if projected {
            let mut cache = PositionMap::new(PositionHasher::for_box(&mesh.bounding_box()));
            for (o, r) in &mine {
                cache.insert(o.local, **r);
            }
            field.project_and_assign(mesh, comp, &config.to_blocks, |p| match cache.get(p) {
                Some(Some(s)) => Some(s.value),
                Some(None) => config.extrapolation_constant,
                None => None,
            })?;
            continue;
        }

        for (o, r) in mine {
            let value = match r {
                Some(s) => s.value,
                None => match config.extrapolation_constant {
                    Some(c) => c,
                    None => continue,
                },
            };
            match o.dof {
                DofTarget::Node(n) => field.set_value(n.index(), comp, value),
                DofTarget::Element(e) => field.set_value(e.index(), comp, value),
                DofTarget::Projection => {}
            }
        }
    }
    Ok(stats)
}
