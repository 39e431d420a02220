//! Error types for the surface AST crate.

use thiserror::Error;

use crate::types::NodeId;

/// Structural problems detected in a surface program.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AstError {
    /// Two nodes in the same program share an id.
    #[error("duplicate node id {0}")]
    DuplicateNodeId(NodeId),

    /// A node has a shape the surface grammar cannot produce.
    #[error("malformed node {node}: {reason}")]
    MalformedNode { node: NodeId, reason: String },

    /// The program has no surface version tag.
    #[error("program surface version is empty")]
    MissingVersion,
}

/// Result type for surface AST operations.
pub type AstResult<T> = Result<T, AstError>;
