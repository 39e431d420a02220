//! # surface-ast
//!
//! The human-authored layer of the bridge: a conventional expression and
//! statement language. The external parser produces a [`Program`] whose
//! nodes carry stable ids and source spans; this crate owns that data model
//! plus the helpers translation needs around it.
//!
//! - [`AstBuilder`]: synthesizes trees with fresh ids and spans
//! - [`SurfaceNode::structurally_eq`]: comparison that ignores ids and spans
//! - [`render_program`]: prints a tree back to source text

#![deny(unsafe_code)]

pub mod builder;
pub mod error;
pub mod node;
pub mod render;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────────

pub use builder::AstBuilder;
pub use error::{AstError, AstResult};
pub use node::{NodeKind, Program, SurfaceNode};
pub use render::{render_expression, render_program};
pub use types::{BinaryOp, Literal, NodeId, Param, Span, UnaryOp};
