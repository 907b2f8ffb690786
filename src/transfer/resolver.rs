//! Merge the responses gathered for each outgoing point.
//!
//! Responses arrive in ascending rank order and are folded in that order:
//! a valid sample beats an out-of-domain one, a strictly smaller distance
//! (beyond the fuzzy tolerance) beats a larger one, and among equidistant
//! samples the earliest stays. With lowest-id-first rank assignment of the
//! sources this makes the result independent of the rank count.

use super::exchange::Answers;
use super::extract::{DofTarget, OutgoingPoint};
use super::{Conflict, ConflictSide, Response, Sample};
use crate::geometry::fuzzy_equal;
use crate::problem::Problem;

/// Fold candidates in order and flag a fuzzy-equidistant candidate whose
/// value differs from the winner's.
pub fn closest(candidates: &[Sample]) -> (Response, bool) {
    let mut best: Option<Sample> = None;
    for c in candidates {
        match best {
            Some(b) if !(c.distance < b.distance && !fuzzy_equal(c.distance, b.distance)) => {}
            _ => best = Some(*c),
        }
    }
    let tied = best.is_some_and(|b| {
        candidates
            .iter()
            .any(|c| fuzzy_equal(c.distance, b.distance) && !fuzzy_equal(c.value, b.value))
    });
    (best, tied)
}

/// Winner among the answers of one point.
pub fn resolve(answers: &Answers) -> (Response, bool) {
    let valid: Vec<Sample> = answers.iter().filter_map(|(_, r)| *r).collect();
    closest(&valid)
}

/// Resolve every outgoing point. Target-side ties become conflicts when
/// `search_value_conflicts` is set, at most one per point.
pub fn resolve_all(
    outgoing: &[OutgoingPoint],
    answers: &[Answers],
    targets: &[Problem],
    search_value_conflicts: bool,
) -> (Vec<Response>, Vec<Conflict>) {
    let mut resolved = Vec::with_capacity(outgoing.len());
    let mut conflicts = Vec::new();
    for (o, a) in outgoing.iter().zip(answers) {
        let (winner, tied) = resolve(a);
        if let (true, true, Some(w)) = (search_value_conflicts, tied, winner) {
            conflicts.push(Conflict {
                problem: targets[o.target].id(),
                dof: match o.dof {
                    DofTarget::Node(n) => Some(n.index()),
                    DofTarget::Element(e) => Some(e.index()),
                    DofTarget::Projection => None,
                },
                point: o.query.point,
                distance: w.distance,
                side: ConflictSide::Target,
            });
        }
        resolved.push(winner);
    }
    (resolved, conflicts)
}
