#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-transfer
//!
//! mesh-transfer moves scalar field values from one set of independently
//! discretized, possibly overlapping and possibly distributed meshes
//! ("source problems") onto the degrees of freedom of other meshes
//! ("target problems"). Every target degree of freedom receives exactly one
//! value, chosen deterministically even when sources overlap, are missing or
//! tie in distance.
//!
//! ## Features
//! - Replicated source bounding boxes with inflation, fixed sizing and
//!   axisymmetric mirroring, used to route query points to the ranks that
//!   can answer them
//! - Four interchangeable evaluation strategies: continuous mesh function,
//!   k-nearest source locations, native shape functions and user callbacks
//! - Nearest-position and spatial-division grouping of sources and targets
//! - Rank-ordered conflict resolution with optional detection of
//!   equidistant, disagreeing sources
//! - Projection onto discontinuous targets through a position-keyed cache
//! - Pluggable communication backends: serial, in-process threads and MPI
//!
//! ## Determinism
//!
//! Answers are folded in ascending rank order and sources are visited in
//! increasing problem id, so the result does not depend on message arrival
//! order. When source problems are assigned to ranks in increasing id order
//! it does not depend on the rank count either.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-transfer = "0.3"
//! # Optional features:
//! # features = ["rayon", "mpi-support"]
//! ```
//!
//! ```
//! use mesh_transfer::prelude::*;
//!
//! let mesh = structured_box_2d(4, 4, [0.0, 0.0], [1.0, 1.0], StructuredCellType::Quadrilateral)?;
//! let source = Problem::new(ProblemId(0), mesh.clone())
//!     .with_field(Field::from_fn("u", FieldFamily::NodalLagrange, &mesh, |p| p[0]))?;
//! let target = Problem::new(ProblemId(1), mesh.clone())
//!     .with_field(Field::new("u", FieldFamily::NodalLagrange, 1, &mesh))?;
//!
//! let transfer = GeneralFieldTransfer::new(
//!     NoComm,
//!     TransferConfig::for_variable("u", Strategy::NearestLocation),
//! )?;
//! let mut targets = vec![target];
//! let report = transfer.execute(&[source], &mut targets)?;
//! assert_eq!(report.variables[0].located, 25);
//! # Ok::<(), TransferError>(())
//! ```

pub mod algs;
pub mod config;
pub mod field;
pub mod geometry;
pub mod mesh;
pub mod oracles;
pub mod problem;
pub mod transfer;
pub mod transfer_error;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{CommTag, Communicator, LocalComm, NoComm};
    pub use crate::config::{DivisionUse, SourceType, Strategy, TransferConfig};
    pub use crate::field::mesh_function::MeshFunction;
    pub use crate::field::{Field, FieldFamily};
    pub use crate::geometry::{AppTransform, Axis, BoundingBox, CoordSystem, Point};
    pub use crate::mesh::generation::{
        StructuredCellType, point_cloud, structured_box_2d, structured_box_3d, structured_line,
    };
    pub use crate::mesh::{BlockId, ElemId, Element, Mesh, NodeId};
    pub use crate::oracles::{
        CartesianGridDivision, MeshDivision, NearestPositions, PositionList, SpatialFunction,
    };
    pub use crate::problem::{Problem, ProblemId};
    pub use crate::transfer::{
        Conflict, ConflictSide, GeneralFieldTransfer, TransferBuilder, TransferReport,
        VariableReport,
    };
    pub use crate::transfer_error::TransferError;
}
