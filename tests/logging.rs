//! The engine reports through the `log` facade; capture it and check what
//! a user would see.
use log::{Level, LevelFilter, Log, Metadata, Record};
use mesh_transfer::prelude::*;
use parking_lot::Mutex;
use serial_test::serial;
use std::sync::OnceLock;

struct Capture(Mutex<Vec<(Level, String)>>);

impl Log for Capture {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.0.lock().push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

fn capture() -> &'static Capture {
    static LOGGER: OnceLock<&'static Capture> = OnceLock::new();
    LOGGER.get_or_init(|| {
        let logger: &'static Capture = Box::leak(Box::new(Capture(Mutex::new(Vec::new()))));
        log::set_logger(logger).unwrap();
        log::set_max_level(LevelFilter::Debug);
        logger
    })
}

fn take_lines(level: Level) -> Vec<String> {
    capture()
        .0
        .lock()
        .drain(..)
        .filter(|(l, _)| *l == level)
        .map(|(_, m)| m)
        .collect()
}

fn cloud(id: u32, value: f64) -> Problem {
    let mesh = point_cloud(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]).unwrap();
    let mut field = Field::new("u", FieldFamily::NodalLagrange, 1, &mesh);
    field.set_value(0, 0, value);
    field.set_value(1, 0, value);
    Problem::new(ProblemId(id), mesh).with_field(field).unwrap()
}

fn query_cloud() -> Vec<Problem> {
    let mesh = point_cloud(vec![[0.25, 0.5, 0.0]]).unwrap();
    let field = Field::new("u", FieldFamily::NodalLagrange, 1, &mesh);
    vec![Problem::new(ProblemId(5), mesh).with_field(field).unwrap()]
}

#[test]
#[serial]
fn conflicts_are_logged_as_warnings() {
    capture();
    take_lines(Level::Warn);
    let config = TransferConfig {
        search_value_conflicts: true,
        ..TransferConfig::for_variable("u", Strategy::NearestLocation)
    };
    let transfer = GeneralFieldTransfer::new(NoComm, config).unwrap();
    let mut targets = query_cloud();
    transfer
        .execute(&[cloud(0, 1.0), cloud(1, 2.0)], &mut targets)
        .unwrap();
    let warnings = take_lines(Level::Warn);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("1 equidistant source(s)"));
    assert!(warnings[0].contains("problem 0"));
}

#[test]
#[serial]
fn each_execute_opens_and_closes_with_info() {
    capture();
    take_lines(Level::Info);
    let transfer = GeneralFieldTransfer::new(
        NoComm,
        TransferConfig::for_variable("u", Strategy::NearestLocation),
    )
    .unwrap();
    let mut targets = query_cloud();
    transfer.execute(&[cloud(0, 1.0)], &mut targets).unwrap();
    let info = take_lines(Level::Info);
    assert_eq!(info.len(), 2, "{info:?}");
    assert!(info[0].contains("1 variable(s)"));
    assert!(info[1].contains("0 conflict(s)"));
}

#[test]
#[serial]
fn node_samples_for_an_elemental_target_warn_once() {
    capture();
    take_lines(Level::Warn);
    let mesh =
        structured_box_2d(1, 1, [0.0, 0.0], [1.0, 1.0], StructuredCellType::Quadrilateral).unwrap();
    let field = Field::new("u", FieldFamily::ConstantMonomial, 1, &mesh);
    let mut targets = vec![Problem::new(ProblemId(5), mesh).with_field(field).unwrap()];
    let transfer = GeneralFieldTransfer::new(
        NoComm,
        TransferConfig::for_variable("u", Strategy::NearestLocation),
    )
    .unwrap();
    transfer
        .execute(&[cloud(0, 1.0), cloud(1, 1.0)], &mut targets)
        .unwrap();
    let warnings = take_lines(Level::Warn);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("Nodes"), "{}", warnings[0]);
    assert!(warnings[0].contains("ConstantMonomial"), "{}", warnings[0]);
}

#[test]
#[serial]
fn centroid_samples_for_a_nodal_target_warn() {
    capture();
    take_lines(Level::Warn);
    let config = TransferConfig {
        source_type: vec![SourceType::Centroids],
        ..TransferConfig::for_variable("u", Strategy::NearestLocation)
    };
    let source = {
        let mesh =
            structured_box_2d(1, 1, [0.0, 0.0], [1.0, 1.0], StructuredCellType::Quadrilateral)
                .unwrap();
        let field = Field::from_fn("u", FieldFamily::NodalLagrange, &mesh, |p| p[0]);
        Problem::new(ProblemId(0), mesh).with_field(field).unwrap()
    };
    let transfer = GeneralFieldTransfer::new(NoComm, config).unwrap();
    let mut targets = query_cloud();
    transfer.execute(&[source], &mut targets).unwrap();
    let warnings = take_lines(Level::Warn);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("Centroids"), "{}", warnings[0]);
    assert_eq!(targets[0].field("u").unwrap().values(), &[0.5]);
}
