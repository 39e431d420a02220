//! # deep-repr
//!
//! The deep representation (DR): a closed vocabulary of records carrying
//! confidence, uncertainty and provenance alongside executable bodies.
//!
//! - [`DrNode`] / [`DrNodeBody`]: function definitions, beliefs, reasoning
//!   contexts, intents, shared state and the structured-knowledge root
//! - [`DrStmt`] / [`DrExpr`]: the body language that links records together
//! - [`DrDocument`]: owns a translation's nodes, validates reference shape
//!   and persists to JSON
//!
//! Out-of-range confidence, unknown record shapes and dangling or
//! mistyped references are rejected with [`ShapeError`].

#![deny(unsafe_code)]

pub mod body;
pub mod document;
pub mod error;
pub mod node;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────────

pub use body::{DrExpr, DrStmt};
pub use document::DrDocument;
pub use error::{ShapeError, ShapeResult};
pub use node::{DrNode, DrNodeBody, ParameterSpec};
pub use types::{Attribution, Confidence, DocumentId, DrNodeId, DrNodeKind, Uncertainty};
