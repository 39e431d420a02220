//! Surface node model.
//!
//! A `Program` owns a sequence of top-level `SurfaceNode`s. Every node
//! carries the id and span assigned by the parser and is never edited
//! after construction; translation produces new trees instead.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{AstError, AstResult};
use crate::types::{BinaryOp, Literal, NodeId, Param, Span, UnaryOp};

// ── Node Kind ──────────────────────────────────────────────────────────

/// The construct a surface node represents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", content = "data", rename_all = "snake_case")]
pub enum NodeKind {
    FunctionDecl {
        name: String,
        params: Vec<Param>,
        return_type: Option<String>,
        /// Always a `Block`.
        body: Box<SurfaceNode>,
    },
    Binding {
        mutable: bool,
        name: String,
        declared_type: Option<String>,
        value: Box<SurfaceNode>,
    },
    Assign {
        name: String,
        value: Box<SurfaceNode>,
    },
    IfExpr {
        condition: Box<SurfaceNode>,
        then_branch: Box<SurfaceNode>,
        else_branch: Option<Box<SurfaceNode>>,
    },
    WhileLoop {
        condition: Box<SurfaceNode>,
        body: Box<SurfaceNode>,
    },
    Call {
        callee: String,
        args: Vec<SurfaceNode>,
    },
    BinaryOp {
        op: BinaryOp,
        lhs: Box<SurfaceNode>,
        rhs: Box<SurfaceNode>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<SurfaceNode>,
    },
    Literal(Literal),
    Identifier(String),
    Return(Option<Box<SurfaceNode>>),
    Block(Vec<SurfaceNode>),
}

impl NodeKind {
    /// Short label used in diagnostics and digests.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FunctionDecl { .. } => "function",
            Self::Binding { .. } => "binding",
            Self::Assign { .. } => "assign",
            Self::IfExpr { .. } => "if",
            Self::WhileLoop { .. } => "while",
            Self::Call { .. } => "call",
            Self::BinaryOp { .. } => "binary",
            Self::Unary { .. } => "unary",
            Self::Literal(_) => "literal",
            Self::Identifier(_) => "identifier",
            Self::Return(_) => "return",
            Self::Block(_) => "block",
        }
    }
}

// ── Surface Node ───────────────────────────────────────────────────────

/// A node of the surface AST.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurfaceNode {
    pub id: NodeId,
    pub span: Span,
    pub kind: NodeKind,
}

impl SurfaceNode {
    pub fn new(id: NodeId, span: Span, kind: NodeKind) -> Self {
        Self { id, span, kind }
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<&SurfaceNode> {
        match &self.kind {
            NodeKind::FunctionDecl { body, .. } => vec![body.as_ref()],
            NodeKind::Binding { value, .. } | NodeKind::Assign { value, .. } => {
                vec![value.as_ref()]
            }
            NodeKind::IfExpr {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut out = vec![condition.as_ref(), then_branch.as_ref()];
                if let Some(e) = else_branch {
                    out.push(e.as_ref());
                }
                out
            }
            NodeKind::WhileLoop { condition, body } => vec![condition.as_ref(), body.as_ref()],
            NodeKind::Call { args, .. } => args.iter().collect(),
            NodeKind::BinaryOp { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            NodeKind::Unary { operand, .. } => vec![operand.as_ref()],
            NodeKind::Return(Some(value)) => vec![value.as_ref()],
            NodeKind::Block(stmts) => stmts.iter().collect(),
            NodeKind::Literal(_) | NodeKind::Identifier(_) | NodeKind::Return(None) => vec![],
        }
    }

    /// Pre-order traversal.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a SurfaceNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Function name, if this node declares one.
    pub fn function_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::FunctionDecl { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Compare two trees ignoring node ids and spans.
    pub fn structurally_eq(&self, other: &SurfaceNode) -> bool {
        use NodeKind as K;
        match (&self.kind, &other.kind) {
            (
                K::FunctionDecl {
                    name: n1,
                    params: p1,
                    return_type: r1,
                    body: b1,
                },
                K::FunctionDecl {
                    name: n2,
                    params: p2,
                    return_type: r2,
                    body: b2,
                },
            ) => n1 == n2 && p1 == p2 && r1 == r2 && b1.structurally_eq(b2),
            (
                K::Binding {
                    mutable: m1,
                    name: n1,
                    declared_type: t1,
                    value: v1,
                },
                K::Binding {
                    mutable: m2,
                    name: n2,
                    declared_type: t2,
                    value: v2,
                },
            ) => m1 == m2 && n1 == n2 && t1 == t2 && v1.structurally_eq(v2),
            (K::Assign { name: n1, value: v1 }, K::Assign { name: n2, value: v2 }) => {
                n1 == n2 && v1.structurally_eq(v2)
            }
            (
                K::IfExpr {
                    condition: c1,
                    then_branch: t1,
                    else_branch: e1,
                },
                K::IfExpr {
                    condition: c2,
                    then_branch: t2,
                    else_branch: e2,
                },
            ) => {
                c1.structurally_eq(c2)
                    && t1.structurally_eq(t2)
                    && match (e1, e2) {
                        (Some(a), Some(b)) => a.structurally_eq(b),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (
                K::WhileLoop {
                    condition: c1,
                    body: b1,
                },
                K::WhileLoop {
                    condition: c2,
                    body: b2,
                },
            ) => c1.structurally_eq(c2) && b1.structurally_eq(b2),
            (K::Call { callee: c1, args: a1 }, K::Call { callee: c2, args: a2 }) => {
                c1 == c2 && all_structurally_eq(a1, a2)
            }
            (
                K::BinaryOp {
                    op: o1,
                    lhs: l1,
                    rhs: r1,
                },
                K::BinaryOp {
                    op: o2,
                    lhs: l2,
                    rhs: r2,
                },
            ) => o1 == o2 && l1.structurally_eq(l2) && r1.structurally_eq(r2),
            (K::Unary { op: o1, operand: x1 }, K::Unary { op: o2, operand: x2 }) => {
                o1 == o2 && x1.structurally_eq(x2)
            }
            (K::Literal(a), K::Literal(b)) => a == b,
            (K::Identifier(a), K::Identifier(b)) => a == b,
            (K::Return(a), K::Return(b)) => match (a, b) {
                (Some(x), Some(y)) => x.structurally_eq(y),
                (None, None) => true,
                _ => false,
            },
            (K::Block(a), K::Block(b)) => all_structurally_eq(a, b),
            _ => false,
        }
    }
}

fn all_structurally_eq(a: &[SurfaceNode], b: &[SurfaceNode]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structurally_eq(y))
}

// ── Program ────────────────────────────────────────────────────────────

/// Root of a surface AST.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Surface language version the program was written against.
    pub surface_version: String,
    /// Top-level declarations and statements in source order.
    pub items: Vec<SurfaceNode>,
}

impl Program {
    pub fn new(surface_version: impl Into<String>, items: Vec<SurfaceNode>) -> Self {
        Self {
            surface_version: surface_version.into(),
            items,
        }
    }

    /// Pre-order traversal over every node.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a SurfaceNode)) {
        for item in &self.items {
            item.walk(visit);
        }
    }

    /// Top-level function declarations.
    pub fn functions(&self) -> impl Iterator<Item = &SurfaceNode> {
        self.items
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::FunctionDecl { .. }))
    }

    /// Names of all top-level functions.
    pub fn function_names(&self) -> HashSet<&str> {
        self.functions().filter_map(|n| n.function_name()).collect()
    }

    /// Locate a node by id.
    pub fn find(&self, id: NodeId) -> Option<&SurfaceNode> {
        let mut found = None;
        self.walk(&mut |n| {
            if found.is_none() && n.id == id {
                found = Some(n);
            }
        });
        found
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }

    /// Compare two programs ignoring node ids and spans.
    pub fn structurally_eq(&self, other: &Program) -> bool {
        self.surface_version == other.surface_version
            && all_structurally_eq(&self.items, &other.items)
    }

    /// Check parser guarantees: unique ids, block-shaped bodies.
    pub fn validate(&self) -> AstResult<()> {
        if self.surface_version.trim().is_empty() {
            return Err(AstError::MissingVersion);
        }

        let mut seen = HashSet::new();
        let mut problem: Option<AstError> = None;
        self.walk(&mut |n| {
            if problem.is_some() {
                return;
            }
            if !seen.insert(n.id) {
                problem = Some(AstError::DuplicateNodeId(n.id));
                return;
            }
            let bad_block = |child: &SurfaceNode, what: &str| {
                if matches!(child.kind, NodeKind::Block(_)) {
                    None
                } else {
                    Some(AstError::MalformedNode {
                        node: n.id,
                        reason: format!("{} is not a block", what),
                    })
                }
            };
            problem = match &n.kind {
                NodeKind::FunctionDecl { name, body, .. } => {
                    if name.is_empty() {
                        Some(AstError::MalformedNode {
                            node: n.id,
                            reason: "function name is empty".into(),
                        })
                    } else {
                        bad_block(&**body, "function body")
                    }
                }
                NodeKind::IfExpr {
                    then_branch,
                    else_branch,
                    ..
                } => bad_block(&**then_branch, "then branch").or_else(|| {
                    else_branch
                        .as_ref()
                        .and_then(|e| bad_block(&**e, "else branch"))
                }),
                NodeKind::WhileLoop { body, .. } => bad_block(&**body, "loop body"),
                NodeKind::Call { callee, .. } if callee.is_empty() => {
                    Some(AstError::MalformedNode {
                        node: n.id,
                        reason: "call target is empty".into(),
                    })
                }
                _ => None,
            };
        });

        match problem {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
