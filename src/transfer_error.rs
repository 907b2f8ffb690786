//! TransferError: unified error type for mesh-transfer public APIs
//!
//! Every fallible operation of the transfer engine and of the collaborator
//! models returns this type. Library code never panics on bad input.

use crate::geometry::Point;
use crate::problem::ProblemId;
use thiserror::Error;

/// Unified error type for field transfer operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransferError {
    /// Incompatible or out-of-range configuration, detected at setup.
    #[error("Invalid transfer configuration for `{option}`: {reason}")]
    InvalidConfig {
        option: &'static str,
        reason: String,
    },
    /// A problem does not carry the requested field variable.
    #[error("Problem {problem} has no variable `{variable}`")]
    MissingVariable { problem: ProblemId, variable: String },
    /// A problem does not provide the requested spatial function.
    #[error("Problem {problem} has no spatial function `{name}`")]
    MissingFunction { problem: ProblemId, name: String },
    /// A component selector is out of range for the variable.
    #[error("Component {component} out of range for `{variable}` ({n_components} components)")]
    ComponentOutOfRange {
        variable: String,
        component: usize,
        n_components: usize,
    },
    /// Mesh or field geometry is malformed.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    /// A field's storage does not match its mesh.
    #[error("Field `{variable}` expects {expected} values, got {found}")]
    FieldSizeMismatch {
        variable: String,
        expected: usize,
        found: usize,
    },
    /// No source bounding box could take the point and `error_on_miss` is set.
    #[error("Cannot locate point {point:?} in any source domain (mismatched meshes?)")]
    PointNotLocated { point: Point },
    /// A target degree of freedom resolved to out-of-domain and `error_on_miss` is set.
    #[error("{what} of problem {problem} could not be located in any source domain")]
    DofNotLocated { problem: ProblemId, what: String },
    /// A peer failed to deliver or delivered a malformed message.
    #[error("Communication error with rank {neighbor}: {message}")]
    CommError { neighbor: usize, message: String },
    /// A received buffer does not hold a whole number of wire records.
    #[error("Wire length mismatch: expected {expected} bytes, got {found}")]
    WireLength { expected: usize, found: usize },
}
