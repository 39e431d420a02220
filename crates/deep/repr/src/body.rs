//! Executable bodies of DR records.
//!
//! Function definitions, reasoning contexts and the program root carry a
//! statement list. Statements either stay inline (pure computation) or
//! reference another DR node by id (`Guard`, `Act`, `Observe`, ...), which
//! is how beliefs, intents and reasoning contexts are woven into the
//! control flow they came from.

use serde::{Deserialize, Serialize};
use surface_ast::{BinaryOp, Literal, UnaryOp};

use crate::types::{DrNodeId, DrNodeKind};

// ── Expressions ────────────────────────────────────────────────────────

/// A DR expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case", deny_unknown_fields)]
pub enum DrExpr {
    Literal {
        value: Literal,
    },
    Var {
        name: String,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<DrExpr>,
        rhs: Box<DrExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<DrExpr>,
    },
    /// Call to a function defined in the same document.
    Call {
        target: String,
        args: Vec<DrExpr>,
    },
    /// Value of an external read, held by a belief node.
    Observe {
        belief: DrNodeId,
    },
}

impl DrExpr {
    /// Visit every node reference in this expression, depth first.
    pub fn for_each_ref(&self, visit: &mut impl FnMut(&DrNodeId, DrNodeKind)) {
        match self {
            Self::Literal { .. } | Self::Var { .. } => {}
            Self::Binary { lhs, rhs, .. } => {
                lhs.for_each_ref(visit);
                rhs.for_each_ref(visit);
            }
            Self::Unary { operand, .. } => operand.for_each_ref(visit),
            Self::Call { args, .. } => {
                for arg in args {
                    arg.for_each_ref(visit);
                }
            }
            Self::Observe { belief } => visit(belief, DrNodeKind::Belief),
        }
    }
}

// ── Statements ─────────────────────────────────────────────────────────

/// A DR statement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case", deny_unknown_fields)]
pub enum DrStmt {
    /// Program root only: declares a function definition.
    Declare {
        function: DrNodeId,
    },
    /// Program root only: declares a shared-state record.
    Share {
        state: DrNodeId,
    },
    Bind {
        mutable: bool,
        name: String,
        declared_type: Option<String>,
        value: DrExpr,
    },
    Assign {
        name: String,
        value: DrExpr,
    },
    /// Conditional that gates side effects; details live in the context node.
    Guard {
        context: DrNodeId,
    },
    /// Conditional with no side effects in either branch.
    Branch {
        condition: DrExpr,
        then_branch: Vec<DrStmt>,
        else_branch: Option<Vec<DrStmt>>,
    },
    Loop {
        condition: DrExpr,
        body: Vec<DrStmt>,
    },
    /// External action, captured by an intent node.
    Act {
        intent: DrNodeId,
    },
    Eval {
        expr: DrExpr,
    },
    Return {
        value: Option<DrExpr>,
    },
    Block {
        body: Vec<DrStmt>,
    },
}

impl DrStmt {
    /// Visit every node reference in this statement, depth first.
    ///
    /// References inside other nodes (a guard's branches) are not followed.
    pub fn for_each_ref(&self, visit: &mut impl FnMut(&DrNodeId, DrNodeKind)) {
        match self {
            Self::Declare { function } => visit(function, DrNodeKind::FunctionDefinition),
            Self::Share { state } => visit(state, DrNodeKind::SharedState),
            Self::Bind { value, .. } | Self::Assign { value, .. } => value.for_each_ref(visit),
            Self::Guard { context } => visit(context, DrNodeKind::ReasoningContext),
            Self::Branch {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.for_each_ref(visit);
                for s in then_branch {
                    s.for_each_ref(visit);
                }
                for s in else_branch.iter().flatten() {
                    s.for_each_ref(visit);
                }
            }
            Self::Loop { condition, body } => {
                condition.for_each_ref(visit);
                for s in body {
                    s.for_each_ref(visit);
                }
            }
            Self::Act { intent } => visit(intent, DrNodeKind::Intent),
            Self::Eval { expr } => expr.for_each_ref(visit),
            Self::Return { value } => {
                if let Some(v) = value {
                    v.for_each_ref(visit);
                }
            }
            Self::Block { body } => {
                for s in body {
                    s.for_each_ref(visit);
                }
            }
        }
    }

    /// Whether this is a root-only declaration statement.
    pub fn is_declaration(&self) -> bool {
        matches!(self, Self::Declare { .. } | Self::Share { .. })
    }

    /// Whether a declaration statement appears anywhere below this one.
    pub fn contains_declaration(&self) -> bool {
        let nested = |stmts: &[DrStmt]| stmts.iter().any(|s| s.contains_declaration());
        match self {
            Self::Declare { .. } | Self::Share { .. } => true,
            Self::Branch {
                then_branch,
                else_branch,
                ..
            } => nested(then_branch) || else_branch.as_deref().is_some_and(nested),
            Self::Loop { body, .. } | Self::Block { body } => nested(body),
            _ => false,
        }
    }
}
