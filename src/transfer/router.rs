//! Decide which ranks must evaluate a query point.
//!
//! A box can only hold the closest source sample if its nearest corner is
//! no farther than the farthest corner of the best box, so:
//!
//! ```text
//! threshold = min over valid boxes of distance_to_farthest_corner(p)
//! select b  if greedy || b.contains(p) || b.distance_to_nearest_corner(p) <= threshold
//! ```
//!
//! With `use_nearest_app` only the boxes of the source problem positioned
//! closest to the point take part.

use super::bounding_boxes::{SourceBox, SourceBoxes};
use crate::config::TransferConfig;
use crate::geometry::Point;
use std::collections::BTreeSet;

/// Ranks to query for `p`, ascending. Empty when no valid box qualifies.
pub fn route(p: &Point, boxes: &SourceBoxes, config: &TransferConfig) -> BTreeSet<usize> {
    let nearest_app = if config.use_nearest_app {
        boxes.nearest_problem(p)
    } else {
        None
    };
    let eligible = |b: &&SourceBox| {
        b.bbox.is_valid() && nearest_app.is_none_or(|id| b.problem == id)
    };

    let threshold = boxes
        .iter()
        .filter(eligible)
        .map(|b| b.bbox.distance_to_farthest_corner(p))
        .fold(f64::MAX, f64::min);

    boxes
        .iter()
        .filter(eligible)
        .filter(|b| {
            config.greedy_search
                || b.bbox.contains(p)
                || b.bbox.distance_to_nearest_corner(p) <= threshold
        })
        .map(|b| b.rank)
        .collect()
}
