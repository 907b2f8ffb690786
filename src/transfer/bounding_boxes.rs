//! Replicated list of source bounding boxes.
//!
//! Each rank measures its local source pieces (restricted to the source
//! blocks and boundaries), maps the boxes into the reference frame and
//! all-gathers them. Inflation and fixed sizing are applied after the
//! gather so every rank holds the same list, ordered by (rank, local index).

use crate::algs::collective::all_gather;
use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::WireBox;
use crate::config::TransferConfig;
use crate::geometry::{BoundingBox, Point, distance_squared};
use crate::problem::{Problem, ProblemId};
use crate::transfer_error::TransferError;

/// One source piece as seen by every rank.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceBox {
    pub rank: usize,
    pub problem: ProblemId,
    /// Inflated reference-frame box; invalid when the piece had no nodes.
    pub bbox: BoundingBox,
    /// Position offset of the problem.
    pub position: Point,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceBoxes {
    boxes: Vec<SourceBox>,
}

/// Reference-frame box of the nodes of `problem` passing the source
/// block and boundary restrictions.
pub fn local_source_box(problem: &Problem, config: &TransferConfig) -> BoundingBox {
    let mesh = problem.mesh();
    let local = BoundingBox::from_points(
        mesh.nodes()
            .filter(|(n, _)| {
                mesh.node_in_blocks(*n, &config.from_blocks)
                    && mesh.node_on_boundaries(*n, &config.from_boundaries)
            })
            .map(|(_, p)| *p),
    );
    problem.transform().box_to_reference(&local)
}

/// Apply `bbox_factor`, then `fixed_bounding_box_size`.
pub fn inflate(bbox: &BoundingBox, config: &TransferConfig) -> BoundingBox {
    let inflated = bbox.inflated(config.bbox_factor);
    match &config.fixed_bounding_box_size {
        Some(size) => inflated.with_fixed_size(size),
        None => inflated,
    }
}

/// Gather every rank's source boxes. Collective.
pub fn gather_source_boxes<C: Communicator>(
    comm: &C,
    tag: CommTag,
    sources: &[Problem],
    config: &TransferConfig,
) -> Result<SourceBoxes, TransferError> {
    let local: Vec<WireBox> = sources
        .iter()
        .map(|p| WireBox::new(&local_source_box(p, config), &p.position(), p.id()))
        .collect();
    let gathered = all_gather(comm, tag, &local)?;
    let boxes = gathered
        .iter()
        .enumerate()
        .flat_map(|(rank, boxes)| {
            boxes.iter().map(move |w| SourceBox {
                rank,
                problem: w.problem(),
                bbox: inflate(&w.bbox(), config),
                position: w.position(),
            })
        })
        .collect();
    Ok(SourceBoxes { boxes })
}

impl SourceBoxes {
    pub fn new(boxes: Vec<SourceBox>) -> Self {
        Self { boxes }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceBox> {
        self.boxes.iter()
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn n_invalid(&self) -> usize {
        self.boxes.iter().filter(|b| !b.bbox.is_valid()).count()
    }

    /// Box of the piece of `problem` held by `rank`.
    pub fn get(&self, rank: usize, problem: ProblemId) -> Option<&SourceBox> {
        self.boxes
            .iter()
            .find(|b| b.rank == rank && b.problem == problem)
    }

    /// Source problem whose position is closest to `p`; the lowest id wins ties.
    pub fn nearest_problem(&self, p: &Point) -> Option<ProblemId> {
        let mut best: Option<(ProblemId, f64)> = None;
        for b in &self.boxes {
            let d = distance_squared(p, &b.position);
            let better = match best {
                None => true,
                Some((id, bd)) => d < bd || (d == bd && b.problem < id),
            };
            if better {
                best = Some((b.problem, d));
            }
        }
        best.map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::geometry::{AppTransform, Axis, CoordSystem};
    use crate::mesh::generation::{StructuredCellType, structured_box_2d};

    fn square(id: u32) -> Problem {
        let mesh =
            structured_box_2d(2, 2, [0.0, 0.0], [1.0, 1.0], StructuredCellType::Quadrilateral)
                .unwrap();
        Problem::new(ProblemId(id), mesh)
    }

    #[test]
    fn boxes_are_translated_then_inflated() {
        let config = TransferConfig {
            bbox_factor: 2.0,
            ..TransferConfig::default()
        };
        let sources = vec![square(0).at_position([10.0, 0.0, 0.0])];
        let boxes = gather_source_boxes(&NoComm, CommTag::new(1), &sources, &config).unwrap();
        let b = boxes.get(0, ProblemId(0)).unwrap();
        assert_eq!(b.bbox.min, [9.5, -0.5, 0.0]);
        assert_eq!(b.bbox.max, [11.5, 1.5, 0.0]);
        assert_eq!(b.position, [10.0, 0.0, 0.0]);
    }

    #[test]
    fn boundary_restriction_shrinks_the_box() {
        let config = TransferConfig {
            from_boundaries: vec!["left".into()],
            ..TransferConfig::default()
        };
        let b = local_source_box(&square(0), &config);
        assert_eq!(b.min, [0.0, 0.0, 0.0]);
        assert_eq!(b.max, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn rz_sources_are_mirrored() {
        let p = square(0).with_transform(AppTransform::new(
            [0.0; 3],
            CoordSystem::Rz { axial: Axis::Y },
        ));
        let b = local_source_box(&p, &TransferConfig::default());
        assert_eq!(b.min, [-1.0, 0.0, -1.0]);
        assert_eq!(b.max, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn nearest_problem_breaks_ties_by_id() {
        let mk = |problem, x| SourceBox {
            rank: 0,
            problem: ProblemId(problem),
            bbox: BoundingBox::invalid(),
            position: [x, 0.0, 0.0],
        };
        let boxes = SourceBoxes::new(vec![mk(3, 1.0), mk(1, -1.0), mk(2, 5.0)]);
        assert_eq!(boxes.nearest_problem(&[0.0; 3]), Some(ProblemId(1)));
        assert_eq!(boxes.nearest_problem(&[4.0, 0.0, 0.0]), Some(ProblemId(2)));
    }
}
