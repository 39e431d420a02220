//! Programmatic AST construction.
//!
//! `AstBuilder` hands out sequential node ids and monotonically advancing
//! spans, standing in for the parser when trees are synthesized (tests,
//! reverse translation). Children are built before their parents, so a
//! parent always carries a larger id than its children.

use crate::node::{NodeKind, Program, SurfaceNode};
use crate::types::{BinaryOp, Literal, NodeId, Param, Span, UnaryOp};

/// Builder for surface nodes.
#[derive(Debug)]
pub struct AstBuilder {
    next_id: u32,
    offset: u32,
    line: u32,
    column: u32,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            offset: 0,
            line: 1,
            column: 0,
        }
    }

    /// Start id allocation at `first`.
    pub fn starting_at(first: u32) -> Self {
        Self {
            next_id: first,
            ..Self::new()
        }
    }

    /// Move the span cursor to the start of `line`.
    pub fn line(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self.column = 0;
        self
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next_id.saturating_sub(1)
    }

    /// Allocate the next id without creating a node.
    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Create a node with an explicit span.
    pub fn node_at(&mut self, span: Span, kind: NodeKind) -> SurfaceNode {
        let id = self.next_id();
        SurfaceNode::new(id, span, kind)
    }

    /// Create a node at the cursor, advancing it.
    pub fn node(&mut self, kind: NodeKind) -> SurfaceNode {
        let width = 1 + kind.label().len() as u32;
        let span = Span::new(self.offset, self.offset + width, self.line, self.column);
        self.offset += width;
        self.column += width;
        self.node_at(span, kind)
    }

    // ── Declarations ───────────────────────────────────────────────────

    pub fn function(
        &mut self,
        name: impl Into<String>,
        params: Vec<Param>,
        return_type: Option<&str>,
        body: Vec<SurfaceNode>,
    ) -> SurfaceNode {
        let body = self.block(body);
        self.node(NodeKind::FunctionDecl {
            name: name.into(),
            params,
            return_type: return_type.map(str::to_string),
            body: Box::new(body),
        })
    }

    pub fn binding(
        &mut self,
        mutable: bool,
        name: impl Into<String>,
        declared_type: Option<&str>,
        value: SurfaceNode,
    ) -> SurfaceNode {
        self.node(NodeKind::Binding {
            mutable,
            name: name.into(),
            declared_type: declared_type.map(str::to_string),
            value: Box::new(value),
        })
    }

    /// Immutable `let` binding without a declared type.
    pub fn let_(&mut self, name: impl Into<String>, value: SurfaceNode) -> SurfaceNode {
        self.binding(false, name, None, value)
    }

    /// Mutable `var` binding without a declared type.
    pub fn var(&mut self, name: impl Into<String>, value: SurfaceNode) -> SurfaceNode {
        self.binding(true, name, None, value)
    }

    // ── Statements ─────────────────────────────────────────────────────

    pub fn assign(&mut self, name: impl Into<String>, value: SurfaceNode) -> SurfaceNode {
        self.node(NodeKind::Assign {
            name: name.into(),
            value: Box::new(value),
        })
    }

    pub fn if_(
        &mut self,
        condition: SurfaceNode,
        then_branch: Vec<SurfaceNode>,
        else_branch: Option<Vec<SurfaceNode>>,
    ) -> SurfaceNode {
        let then_block = self.block(then_branch);
        let else_block = else_branch.map(|stmts| Box::new(self.block(stmts)));
        self.node(NodeKind::IfExpr {
            condition: Box::new(condition),
            then_branch: Box::new(then_block),
            else_branch: else_block,
        })
    }

    pub fn while_(&mut self, condition: SurfaceNode, body: Vec<SurfaceNode>) -> SurfaceNode {
        let body = self.block(body);
        self.node(NodeKind::WhileLoop {
            condition: Box::new(condition),
            body: Box::new(body),
        })
    }

    pub fn ret(&mut self, value: Option<SurfaceNode>) -> SurfaceNode {
        self.node(NodeKind::Return(value.map(Box::new)))
    }

    pub fn block(&mut self, stmts: Vec<SurfaceNode>) -> SurfaceNode {
        self.node(NodeKind::Block(stmts))
    }

    // ── Expressions ────────────────────────────────────────────────────

    pub fn call(&mut self, callee: impl Into<String>, args: Vec<SurfaceNode>) -> SurfaceNode {
        self.node(NodeKind::Call {
            callee: callee.into(),
            args,
        })
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: SurfaceNode, rhs: SurfaceNode) -> SurfaceNode {
        self.node(NodeKind::BinaryOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn unary(&mut self, op: UnaryOp, operand: SurfaceNode) -> SurfaceNode {
        self.node(NodeKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn literal(&mut self, value: Literal) -> SurfaceNode {
        self.node(NodeKind::Literal(value))
    }

    pub fn int(&mut self, value: i64) -> SurfaceNode {
        self.literal(Literal::Int(value))
    }

    pub fn float(&mut self, value: f64) -> SurfaceNode {
        self.literal(Literal::Float(value))
    }

    pub fn str_(&mut self, value: impl Into<String>) -> SurfaceNode {
        self.literal(Literal::Str(value.into()))
    }

    pub fn bool_(&mut self, value: bool) -> SurfaceNode {
        self.literal(Literal::Bool(value))
    }

    pub fn ident(&mut self, name: impl Into<String>) -> SurfaceNode {
        self.node(NodeKind::Identifier(name.into()))
    }

    // ── Program ────────────────────────────────────────────────────────

    pub fn program(&self, surface_version: impl Into<String>, items: Vec<SurfaceNode>) -> Program {
        Program::new(surface_version, items)
    }
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}
