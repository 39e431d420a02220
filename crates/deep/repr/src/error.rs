//! Shape errors for deep-representation records.
//!
//! Raised when a record is constructed or loaded with a shape the closed
//! DR vocabulary does not allow.

use thiserror::Error;

use crate::types::{DrNodeId, DrNodeKind};

/// Errors raised while building, validating or loading a DR document.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShapeError {
    /// Confidence must lie in [0.0, 1.0].
    #[error("confidence {0} outside [0.0, 1.0]")]
    ConfidenceOutOfRange(f64),

    /// Uncertainty bounds must be finite and non-negative.
    #[error("uncertainty bound {0} must be finite and non-negative")]
    InvalidUncertainty(f64),

    /// A node id was inserted twice.
    #[error("duplicate DR node {0}")]
    DuplicateNode(DrNodeId),

    /// The document root is absent or not a structured-knowledge record.
    #[error("document root {0} missing or not structured knowledge")]
    MissingRoot(DrNodeId),

    /// A reference points at a node that does not exist.
    #[error("node {from} references missing node {to}")]
    DanglingReference { from: DrNodeId, to: DrNodeId },

    /// A reference points at a node of the wrong kind.
    #[error("reference to {reference} expected {expected}, found {found}")]
    WrongKind {
        reference: DrNodeId,
        expected: DrNodeKind,
        found: DrNodeKind,
    },

    /// A node is referenced from more than one place.
    #[error("node {0} is referenced more than once")]
    SharedReference(DrNodeId),

    /// A node is never referenced from the root.
    #[error("node {0} is unreachable from the document root")]
    Orphan(DrNodeId),

    /// A statement appears where the DR grammar does not allow it.
    #[error("misplaced statement in {node}: {reason}")]
    Misplaced { node: DrNodeId, reason: String },

    /// A record that requires a name has an empty one.
    #[error("{node} has an empty {field}")]
    EmptyName { node: DrNodeId, field: String },

    /// The serialized form could not be read or written.
    #[error("json: {0}")]
    Json(String),
}

/// Result type for DR shape operations.
pub type ShapeResult<T> = Result<T, ShapeError>;

impl From<serde_json::Error> for ShapeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
