//! Error types for the layer bridge.

use deep_repr::{DrNodeId, ShapeError};
use surface_ast::{AstError, NodeId};
use thiserror::Error;

use crate::verifier::MismatchReport;

/// Errors that can occur while translating, verifying or admitting artifacts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BridgeError {
    /// A construct has no translation rule.
    #[error("translation defect at {node}: {reason}")]
    TranslationDefect { node: String, reason: String },

    /// Source and target digests disagree.
    #[error("verification mismatch: {0}")]
    VerificationMismatch(MismatchReport),

    /// The version pair is not registered as compatible.
    #[error("version pair ({surface}, {dr}) is not compatible")]
    VersionIncompatible { surface: String, dr: String },

    /// A proof token does not match what its artifacts recompute to.
    #[error("proof tampered: {0}")]
    ProofTampered(String),

    /// A second direct mapping was recorded for an already-mapped id.
    #[error("position index conflict: {surface:?} -> {deep} already mapped ({existing})")]
    IndexConflict {
        surface: Option<NodeId>,
        deep: DrNodeId,
        existing: String,
    },

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A version string is empty or malformed.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// The surface program violates parser guarantees.
    #[error("malformed program: {0}")]
    Ast(#[from] AstError),

    /// The DR document violates the closed record vocabulary.
    #[error("malformed document: {0}")]
    Shape(#[from] ShapeError),

    /// Import or export of persisted state failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The audit chain is broken at `seq`.
    #[error("audit integrity violation at seq {seq}: {reason}")]
    AuditIntegrity { seq: u64, reason: String },

    /// The pass was abandoned through its cancellation token.
    #[error("translation cancelled")]
    Cancelled,
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

impl BridgeError {
    pub(crate) fn defect(node: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::TranslationDefect {
            node: node.to_string(),
            reason: reason.into(),
        }
    }
}
