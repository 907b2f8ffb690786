//! Behaviour specific to each strategy and to the grouping options.
mod util;

use mesh_transfer::prelude::*;
use std::sync::Arc;
use util::*;

fn values(p: &Problem) -> Vec<f64> {
    p.field("u").unwrap().values().to_vec()
}

#[test]
fn user_callback_is_evaluated_in_the_source_frame() {
    let mesh =
        structured_box_2d(1, 1, [0.0, 0.0], [1.0, 1.0], StructuredCellType::Quadrilateral).unwrap();
    let source = Problem::new(ProblemId(0), mesh)
        .at_position([2.0, 0.0, 0.0])
        .with_function("u", |p: &Point| 10.0 * p[0] + p[1]);
    let transfer = GeneralFieldTransfer::new(
        NoComm,
        TransferConfig::for_variable("u", Strategy::UserCallback),
    )
    .unwrap();
    let mut targets = vec![query_cloud(1, vec![[2.5, 0.5, 0.0], [0.5, 0.5, 0.0]])];
    transfer.execute(&[source], &mut targets).unwrap();
    // The second point is outside the source box and keeps its value.
    assert_eq!(values(&targets[0]), vec![5.5, 0.0]);
}

#[test]
fn shared_faces_read_the_lowest_element() {
    // Piecewise constant 1 | 3 across the face x = 1.
    let mesh =
        structured_box_2d(2, 1, [0.0, 0.0], [2.0, 1.0], StructuredCellType::Quadrilateral).unwrap();
    let mut field = Field::new("u", FieldFamily::ConstantMonomial, 1, &mesh);
    field.set_value(0, 0, 1.0);
    field.set_value(1, 0, 3.0);
    let source = Problem::new(ProblemId(0), mesh).with_field(field).unwrap();

    let run = |strategy| {
        let transfer =
            GeneralFieldTransfer::new(NoComm, TransferConfig::for_variable("u", strategy)).unwrap();
        let mut targets = vec![query_cloud(1, vec![[1.0, 0.5, 0.0], [1.5, 0.5, 0.0]])];
        transfer.execute(std::slice::from_ref(&source), &mut targets).unwrap();
        values(&targets[0])
    };
    assert_eq!(run(Strategy::MeshFunction), vec![1.0, 3.0]);
    assert_eq!(run(Strategy::ShapeProjection), vec![1.0, 3.0]);
}

#[test]
fn must_contain_point_drops_outside_answers() {
    let source = square(0, 2, [0.0; 3], FieldFamily::NodalLagrange, |p| p[0]);
    let config = TransferConfig {
        from_app_must_contain_point: true,
        ..TransferConfig::for_variable("u", Strategy::NearestLocation)
    };
    let transfer = GeneralFieldTransfer::new(NoComm, config).unwrap();
    let mut targets = vec![query_cloud(1, vec![[0.4, 0.4, 0.0], [1.4, 0.4, 0.0]])];
    transfer.execute(&[source], &mut targets).unwrap();
    assert_eq!(values(&targets[0]), vec![0.5, 0.0]);
}

#[test]
fn nearest_app_picks_the_closest_positioned_source() {
    // Two overlapping sources; problem 1 is positioned closer to x = 0.9.
    let a = square(0, 2, [0.0; 3], FieldFamily::NodalLagrange, |_| 1.0);
    let b = square(1, 2, [0.5, 0.0, 0.0], FieldFamily::NodalLagrange, |_| 2.0);
    let config = TransferConfig {
        use_nearest_app: true,
        ..TransferConfig::for_variable("u", Strategy::MeshFunction)
    };
    let transfer = GeneralFieldTransfer::new(NoComm, config).unwrap();
    let mut targets = vec![query_cloud(7, vec![[0.9, 0.5, 0.0], [0.1, 0.5, 0.0]])];
    transfer.execute(&[a, b], &mut targets).unwrap();
    assert_eq!(values(&targets[0]), vec![2.0, 1.0]);
}

#[test]
fn division_indices_must_match() {
    // Two source strips with different values; the target strip tags
    // are swapped, so each target half reads the opposite source half.
    let source = square(0, 4, [0.0; 3], FieldFamily::NodalLagrange, |p| {
        if p[0] < 0.5 { 1.0 } else { 2.0 }
    });
    let from_division = Arc::new(CartesianGridDivision::new(
        BoundingBox::new([0.0; 3], [1.0, 1.0, 0.0]),
        [2, 1, 1],
    ));
    // Target local frame: x in [0, 1]; division 1 covers x < 0.5.
    struct Swapped;
    impl MeshDivision for Swapped {
        fn n_divisions(&self) -> usize {
            2
        }
        fn division_index(&self, p: &Point) -> Option<u32> {
            Some(if p[0] < 0.5 { 1 } else { 0 })
        }
    }
    let config = TransferConfig {
        from_division_use: Some(DivisionUse::MatchDivisionIndex),
        to_division_use: Some(DivisionUse::MatchDivisionIndex),
        ..TransferConfig::for_variable("u", Strategy::NearestLocation)
    };
    let transfer = GeneralFieldTransfer::builder(NoComm, config)
        .source_division(from_division)
        .target_division(Arc::new(Swapped))
        .build()
        .unwrap();
    let mut targets = vec![query_cloud(1, vec![[0.1, 0.5, 0.0], [0.9, 0.5, 0.0]])];
    transfer.execute(&[source], &mut targets).unwrap();
    assert_eq!(values(&targets[0]), vec![2.0, 1.0]);
}

#[test]
fn target_division_can_select_the_source_problem() {
    let a = square(0, 2, [0.0; 3], FieldFamily::NodalLagrange, |_| 10.0);
    let b = square(1, 2, [0.0; 3], FieldFamily::NodalLagrange, |_| 20.0);
    // Every target point carries division 1, so only problem 1 may answer.
    let everywhere_one = Arc::new(CartesianGridDivision::new(
        BoundingBox::new([-1.0, -1.0, 0.0], [2.0, 2.0, 0.0]),
        [1, 1, 1],
    ));
    struct Shifted(Arc<CartesianGridDivision>);
    impl MeshDivision for Shifted {
        fn n_divisions(&self) -> usize {
            2
        }
        fn division_index(&self, p: &Point) -> Option<u32> {
            self.0.division_index(p).map(|d| d + 1)
        }
    }
    let config = TransferConfig {
        to_division_use: Some(DivisionUse::MatchSubappIndex),
        ..TransferConfig::for_variable("u", Strategy::ShapeProjection)
    };
    let transfer = GeneralFieldTransfer::builder(NoComm, config)
        .target_division(Arc::new(Shifted(everywhere_one)))
        .build()
        .unwrap();
    let mut targets = vec![query_cloud(5, vec![[0.5, 0.5, 0.0]])];
    transfer.execute(&[a, b], &mut targets).unwrap();
    assert_eq!(values(&targets[0]), vec![20.0]);
}

#[test]
fn axisymmetric_sources_answer_off_plane_points() {
    // RZ source with the axial direction along y: radius on x.
    let mesh =
        structured_box_2d(4, 4, [0.0, 0.0], [1.0, 1.0], StructuredCellType::Quadrilateral).unwrap();
    let field = Field::from_fn("u", FieldFamily::NodalLagrange, &mesh, |p| p[0] + p[1]);
    let source = Problem::new(ProblemId(0), mesh)
        .with_transform(AppTransform::new([0.0; 3], CoordSystem::Rz { axial: Axis::Y }))
        .with_field(field)
        .unwrap();
    let transfer = GeneralFieldTransfer::new(
        NoComm,
        TransferConfig::for_variable("u", Strategy::MeshFunction),
    )
    .unwrap();
    // (0, 0.25, -0.5) has radius 0.5.
    let mut targets = vec![query_cloud(1, vec![[0.0, 0.25, -0.5]])];
    transfer.execute(&[source], &mut targets).unwrap();
    assert!((values(&targets[0])[0] - 0.75).abs() < 1e-10);
}
