//! DR node records.
//!
//! Every node shares a common header (id, confidence, uncertainty,
//! attribution, creation time, origin span) and carries one of six
//! kind-specific bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surface_ast::Span;

use crate::body::{DrExpr, DrStmt};
use crate::types::{Attribution, Confidence, DrNodeId, DrNodeKind, Uncertainty};

// ── Bodies ─────────────────────────────────────────────────────────────

/// Declared parameter of a function definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterSpec {
    pub name: String,
    pub type_name: Option<String>,
    /// 1.0 for declared types, lower when the type is inferred.
    pub confidence: Confidence,
}

/// Kind-specific payload of a DR node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum DrNodeBody {
    FunctionDefinition {
        name: String,
        parameters: Vec<ParameterSpec>,
        return_type: Option<String>,
        body: Vec<DrStmt>,
    },
    /// Value observed through an external read.
    Belief {
        fact: String,
        target: String,
        args: Vec<DrExpr>,
    },
    /// Decision point gating side effects.
    ReasoningContext {
        condition: DrExpr,
        condition_text: String,
        confidence_threshold: Confidence,
        then_branch: Vec<DrStmt>,
        else_branch: Option<Vec<DrStmt>>,
    },
    /// Planned external action with resolved arguments.
    Intent {
        action: String,
        arguments: Vec<DrExpr>,
    },
    SharedState {
        name: String,
        mutable: bool,
        declared_type: Option<String>,
        initial: DrExpr,
    },
    /// Synthetic program root.
    StructuredKnowledge {
        subject: String,
        surface_version: String,
        translator_version: String,
        entry: Vec<DrStmt>,
    },
}

impl DrNodeBody {
    pub fn kind(&self) -> DrNodeKind {
        match self {
            Self::FunctionDefinition { .. } => DrNodeKind::FunctionDefinition,
            Self::Belief { .. } => DrNodeKind::Belief,
            Self::ReasoningContext { .. } => DrNodeKind::ReasoningContext,
            Self::Intent { .. } => DrNodeKind::Intent,
            Self::SharedState { .. } => DrNodeKind::SharedState,
            Self::StructuredKnowledge { .. } => DrNodeKind::StructuredKnowledge,
        }
    }

    /// Statement lists owned by this body, in source order.
    pub fn statement_lists(&self) -> Vec<&[DrStmt]> {
        match self {
            Self::FunctionDefinition { body, .. } => vec![body.as_slice()],
            Self::ReasoningContext {
                then_branch,
                else_branch,
                ..
            } => {
                let mut out = vec![then_branch.as_slice()];
                if let Some(e) = else_branch {
                    out.push(e.as_slice());
                }
                out
            }
            Self::StructuredKnowledge { entry, .. } => vec![entry.as_slice()],
            Self::Belief { .. } | Self::Intent { .. } | Self::SharedState { .. } => vec![],
        }
    }

    /// Visit every node this body references.
    pub fn for_each_ref(&self, visit: &mut impl FnMut(&DrNodeId, DrNodeKind)) {
        match self {
            Self::Belief { args, .. }
            | Self::Intent {
                arguments: args, ..
            } => {
                for arg in args {
                    arg.for_each_ref(visit);
                }
            }
            Self::SharedState { initial, .. } => initial.for_each_ref(visit),
            Self::ReasoningContext { condition, .. } => condition.for_each_ref(visit),
            Self::FunctionDefinition { .. } | Self::StructuredKnowledge { .. } => {}
        }
        for stmts in self.statement_lists() {
            for stmt in stmts {
                stmt.for_each_ref(visit);
            }
        }
    }

    /// The name a validator requires to be non-empty, if this kind has one.
    pub(crate) fn required_name(&self) -> Option<(&'static str, &str)> {
        match self {
            Self::FunctionDefinition { name, .. } => Some(("name", name)),
            Self::Belief { target, .. } => Some(("target", target)),
            Self::Intent { action, .. } => Some(("action", action)),
            Self::SharedState { name, .. } => Some(("name", name)),
            Self::ReasoningContext { .. } | Self::StructuredKnowledge { .. } => None,
        }
    }
}

// ── Node ───────────────────────────────────────────────────────────────

/// A DR record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DrNode {
    pub id: DrNodeId,
    pub confidence: Option<Confidence>,
    pub uncertainty: Option<Uncertainty>,
    pub attribution: Attribution,
    pub created_at: DateTime<Utc>,
    /// Span of the surface construct this node was derived from.
    pub origin: Option<Span>,
    pub body: DrNodeBody,
}

impl DrNode {
    pub fn new(id: DrNodeId, attribution: Attribution, body: DrNodeBody) -> Self {
        Self {
            id,
            confidence: None,
            uncertainty: None,
            attribution,
            created_at: Utc::now(),
            origin: None,
            body,
        }
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_uncertainty(mut self, uncertainty: Uncertainty) -> Self {
        self.uncertainty = Some(uncertainty);
        self
    }

    pub fn with_origin(mut self, span: Span) -> Self {
        self.origin = Some(span);
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    pub fn kind(&self) -> DrNodeKind {
        self.body.kind()
    }
}
