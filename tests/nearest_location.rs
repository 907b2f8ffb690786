mod util;

use mesh_transfer::prelude::*;
use std::sync::Arc;
use util::*;

fn corners() -> Problem {
    scaled_corners(0, 1.0, [0.0; 3])
}

/// Unit-square corner cloud at `position` holding `scale * (1, 2, 3, 4)`.
fn scaled_corners(id: u32, scale: f64, position: Point) -> Problem {
    let mesh = point_cloud(vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
    ])
    .unwrap();
    let mut field = Field::new("u", FieldFamily::NodalLagrange, 1, &mesh);
    for (slot, v) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
        field.set_value(slot, 0, scale * v);
    }
    Problem::new(ProblemId(id), mesh)
        .at_position(position)
        .with_field(field)
        .unwrap()
}

fn query_cloud(points: Vec<Point>) -> Problem {
    let mesh = point_cloud(points).unwrap();
    let field = Field::new("u", FieldFamily::NodalLagrange, 1, &mesh);
    Problem::new(ProblemId(1), mesh).with_field(field).unwrap()
}

#[test]
fn four_node_scenario_through_the_engine() {
    let transfer = GeneralFieldTransfer::new(
        NoComm,
        TransferConfig::for_variable("u", Strategy::NearestLocation),
    )
    .unwrap();
    let mut targets = vec![query_cloud(vec![[0.1, 0.1, 0.0]])];
    let report = transfer.execute(&[corners()], &mut targets).unwrap();
    assert_eq!(targets[0].field("u").unwrap().values(), &[1.0]);
    assert_eq!(report.variables[0].located, 1);
    assert!(report.conflicts().next().is_none());
}

#[test]
fn averages_the_k_nearest() {
    let config = TransferConfig {
        num_nearest_points: 4,
        ..TransferConfig::for_variable("u", Strategy::NearestLocation)
    };
    let transfer = GeneralFieldTransfer::new(NoComm, config).unwrap();
    let mut targets = vec![query_cloud(vec![[0.1, 0.1, 0.0], [5.0, 5.0, 0.0]])];
    transfer.execute(&[corners()], &mut targets).unwrap();
    assert_close(targets[0].field("u").unwrap().values(), &[2.5, 2.5], 1e-12);
}

#[test]
fn nearest_location_reaches_outside_the_source() {
    let transfer = GeneralFieldTransfer::new(
        NoComm,
        TransferConfig::for_variable("u", Strategy::NearestLocation),
    )
    .unwrap();
    let mut targets = vec![query_cloud(vec![[-3.0, 0.2, 0.0], [2.0, 2.0, 0.0]])];
    transfer.execute(&[corners()], &mut targets).unwrap();
    assert_eq!(targets[0].field("u").unwrap().values(), &[1.0, 4.0]);
}

#[test]
fn nearest_positions_keep_regions_apart() {
    let far = scaled_corners(5, 10.0, [10.0, 0.0, 0.0]);
    let positions = Arc::new(PositionList(vec![[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]]));
    let transfer = GeneralFieldTransfer::builder(
        NoComm,
        TransferConfig::for_variable("u", Strategy::NearestLocation),
    )
    .nearest_positions(positions)
    .build()
    .unwrap();
    // x = 5.1 lies in region 1, so the shifted cloud answers although the
    // origin cloud's (1, 0) sample is nearer than its (10, 0) sample.
    let mut targets = vec![query_cloud(vec![[4.9, 0.0, 0.0], [5.1, 0.0, 0.0]])];
    transfer.execute(&[corners(), far], &mut targets).unwrap();
    assert_eq!(targets[0].field("u").unwrap().values(), &[2.0, 10.0]);
}

#[test]
fn source_blocks_restrict_samples() {
    let mut mesh =
        structured_box_2d(2, 1, [0.0, 0.0], [2.0, 1.0], StructuredCellType::Quadrilateral).unwrap();
    mesh.assign_blocks(|c| if c[0] < 1.0 { 1 } else { 2 });
    let field = Field::from_fn("u", FieldFamily::ConstantMonomial, &mesh, |p| p[0]);
    let source = Problem::new(ProblemId(0), mesh).with_field(field).unwrap();
    let config = TransferConfig {
        from_blocks: vec![2],
        ..TransferConfig::for_variable("u", Strategy::NearestLocation)
    };
    let transfer = GeneralFieldTransfer::new(NoComm, config).unwrap();
    let mut targets = vec![query_cloud(vec![[0.5, 0.5, 0.0]])];
    transfer.execute(&[source], &mut targets).unwrap();
    // Only the block-2 centroid (1.5, 0.5) is a sample.
    assert_eq!(targets[0].field("u").unwrap().values(), &[1.5]);
}
