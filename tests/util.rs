#![allow(dead_code)]
use mesh_transfer::prelude::*;

/// Run `f` on every rank of a fresh in-process world; results in rank order.
pub fn run_world<T: Send>(size: usize, f: impl Fn(&LocalComm) -> T + Sync) -> Vec<T> {
    let world = LocalComm::world(size);
    std::thread::scope(|s| {
        let handles: Vec<_> = world
            .iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || f(comm))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Rank holding piece `i` of `n` when pieces are dealt out in id order.
pub fn owner(i: usize, n: usize, size: usize) -> usize {
    i * size / n
}

/// The pieces of `all` owned by `rank`.
pub fn local_pieces(all: &[Problem], rank: usize, size: usize) -> Vec<Problem> {
    all.iter()
        .enumerate()
        .filter(|(i, _)| owner(*i, all.len(), size) == rank)
        .map(|(_, p)| p.clone())
        .collect()
}

/// Quadrilateral `n`×`n` unit square at `position` carrying `u = f(reference point)`.
pub fn square(
    id: u32,
    n: usize,
    position: Point,
    family: FieldFamily,
    f: impl Fn(&Point) -> f64,
) -> Problem {
    let mesh = structured_box_2d(n, n, [0.0, 0.0], [1.0, 1.0], StructuredCellType::Quadrilateral)
        .unwrap();
    let field = Field::from_fn("u", family, &mesh, |p| {
        f(&[p[0] + position[0], p[1] + position[1], p[2] + position[2]])
    });
    Problem::new(ProblemId(id), mesh)
        .at_position(position)
        .with_field(field)
        .unwrap()
}

/// Rank `rank`'s piece of problem `id` on `mesh` when the elements are dealt
/// out in id order, carrying `u = f`. `None` when the rank gets no element.
pub fn element_piece(
    id: u32,
    mesh: &Mesh,
    family: FieldFamily,
    f: &dyn Fn(&Point) -> f64,
    rank: usize,
    size: usize,
) -> Option<Problem> {
    let n = mesh.n_elements();
    let piece = mesh
        .extract_elements(|e, _| owner(e.index(), n, size) == rank)
        .unwrap();
    if piece.n_elements() == 0 {
        return None;
    }
    let field = Field::from_fn("u", family, &piece, f);
    Some(Problem::new(ProblemId(id), piece).with_field(field).unwrap())
}

/// Single-problem target holding one node per point.
pub fn query_cloud(id: u32, points: Vec<Point>) -> Problem {
    let mesh = point_cloud(points).unwrap();
    let field = Field::new("u", FieldFamily::NodalLagrange, 1, &mesh);
    Problem::new(ProblemId(id), mesh).with_field(field).unwrap()
}

/// Same layout as [`square`] with a zeroed field, for targets.
pub fn blank_square(id: u32, n: usize, position: Point, family: FieldFamily) -> Problem {
    square(id, n, position, family, |_| 0.0)
}

/// Field values of every target, keyed by problem id.
pub fn values_by_id(targets: &[Problem]) -> Vec<(ProblemId, Vec<f64>)> {
    targets
        .iter()
        .map(|t| (t.id(), t.field("u").unwrap().values().to_vec()))
        .collect()
}

pub fn assert_close(got: &[f64], want: &[f64], tol: f64) {
    assert_eq!(got.len(), want.len());
    for (i, (g, w)) in got.iter().zip(want).enumerate() {
        assert!((g - w).abs() <= tol, "slot {i}: got {g}, want {w}");
    }
}
