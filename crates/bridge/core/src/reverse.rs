//! DR → surface translation pass.
//!
//! The structural inverse of the forward pass. Metadata with no surface
//! equivalent is dropped and reported per node in [`DroppedMetadata`].

use std::collections::BTreeSet;

use deep_repr::{DrDocument, DrExpr, DrNode, DrNodeBody, DrNodeId, DrStmt};
use serde::{Deserialize, Serialize};
use surface_ast::{render_expression, AstBuilder, NodeKind, Param, Program, Span, SurfaceNode};

use crate::engine::CancellationToken;
use crate::error::{BridgeError, BridgeResult};
use crate::position::{Direction, PositionIndex};

// ── Dropped metadata ───────────────────────────────────────────────────

/// A DR-only field discarded by reverse translation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    Confidence,
    Uncertainty,
    Attribution,
    CreatedAt,
    ConfidenceThreshold,
    ParameterConfidence,
    BeliefFact,
    TranslatorVersion,
}

impl MetadataField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confidence => "confidence",
            Self::Uncertainty => "uncertainty",
            Self::Attribution => "attribution",
            Self::CreatedAt => "created_at",
            Self::ConfidenceThreshold => "confidence_threshold",
            Self::ParameterConfidence => "parameter_confidence",
            Self::BeliefFact => "belief_fact",
            Self::TranslatorVersion => "translator_version",
        }
    }
}

impl std::fmt::Display for MetadataField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fields dropped from one DR node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedMetadata {
    pub node: DrNodeId,
    pub fields: Vec<MetadataField>,
}

impl std::fmt::Display for DroppedMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.fields.iter().map(MetadataField::as_str).collect();
        write!(f, "{}: {}", self.node, fields.join(", "))
    }
}

/// Distinct fields across a dropped-metadata report.
pub fn dropped_fields(report: &[DroppedMetadata]) -> BTreeSet<MetadataField> {
    report
        .iter()
        .flat_map(|d| d.fields.iter().copied())
        .collect()
}

// ── Pass ───────────────────────────────────────────────────────────────

pub(crate) struct ReversePass<'a> {
    doc: &'a DrDocument,
    cancel: &'a CancellationToken,
    builder: AstBuilder,
    index: PositionIndex,
    dropped: Vec<DroppedMetadata>,
}

impl<'a> ReversePass<'a> {
    pub(crate) fn new(doc: &'a DrDocument, cancel: &'a CancellationToken) -> Self {
        Self {
            doc,
            cancel,
            builder: AstBuilder::new(),
            index: PositionIndex::new(),
            dropped: Vec::new(),
        }
    }

    pub(crate) fn run(mut self) -> BridgeResult<(Program, PositionIndex, Vec<DroppedMetadata>)> {
        let doc = self.doc;
        doc.validate()?;
        let root = doc.root_node()?;
        let DrNodeBody::StructuredKnowledge {
            surface_version,
            entry,
            ..
        } = &root.body
        else {
            return Err(BridgeError::defect(&root.id, "root is not structured knowledge"));
        };
        self.index
            .record_synthetic(root.id.clone(), Direction::Reverse)?;
        self.drop_metadata(root);

        let mut items = Vec::with_capacity(entry.len());
        for stmt in entry {
            self.cancel.check()?;
            items.push(self.top_level(stmt)?);
        }
        let program = Program::new(surface_version.clone(), items);
        program.validate()?;
        Ok((program, self.index, self.dropped))
    }

    // ── Bookkeeping ────────────────────────────────────────────────────

    fn node(&self, id: &DrNodeId) -> BridgeResult<&'a DrNode> {
        let doc: &'a DrDocument = self.doc;
        doc.get(id)
            .ok_or_else(|| BridgeError::defect(id, "referenced node is missing"))
    }

    /// Build a surface node standing in for DR node `origin`.
    fn mapped(&mut self, origin: &DrNode, kind: NodeKind) -> BridgeResult<SurfaceNode> {
        let span = origin.origin.unwrap_or_else(Span::synthetic);
        let node = self.builder.node_at(span, kind);
        self.index
            .record_mapping(node.id, origin.id.clone(), Direction::Reverse)?;
        if !span.is_synthetic() {
            self.index.record_span(node.id, span);
        }
        self.drop_metadata(origin);
        Ok(node)
    }

    fn inline(&mut self, kind: NodeKind) -> SurfaceNode {
        self.builder.node_at(Span::synthetic(), kind)
    }

    fn drop_metadata(&mut self, node: &DrNode) {
        let mut fields = Vec::new();
        if node.confidence.is_some() {
            fields.push(MetadataField::Confidence);
        }
        if node.uncertainty.is_some() {
            fields.push(MetadataField::Uncertainty);
        }
        fields.push(MetadataField::Attribution);
        fields.push(MetadataField::CreatedAt);
        match &node.body {
            DrNodeBody::ReasoningContext { .. } => fields.push(MetadataField::ConfidenceThreshold),
            DrNodeBody::FunctionDefinition { parameters, .. } if !parameters.is_empty() => {
                fields.push(MetadataField::ParameterConfidence)
            }
            DrNodeBody::Belief { .. } => fields.push(MetadataField::BeliefFact),
            DrNodeBody::StructuredKnowledge { .. } => fields.push(MetadataField::TranslatorVersion),
            _ => {}
        }
        self.dropped.push(DroppedMetadata {
            node: node.id.clone(),
            fields,
        });
    }

    // ── Top level ──────────────────────────────────────────────────────

    fn top_level(&mut self, stmt: &DrStmt) -> BridgeResult<SurfaceNode> {
        match stmt {
            DrStmt::Declare { function } => {
                let node = self.node(function)?;
                let DrNodeBody::FunctionDefinition {
                    name,
                    parameters,
                    return_type,
                    body,
                } = &node.body
                else {
                    return Err(BridgeError::defect(function, "declaration of a non-function"));
                };
                let params = parameters
                    .iter()
                    .map(|p| Param {
                        name: p.name.clone(),
                        type_name: p.type_name.clone(),
                    })
                    .collect();
                let body = self.block(body)?;
                self.mapped(
                    node,
                    NodeKind::FunctionDecl {
                        name: name.clone(),
                        params,
                        return_type: return_type.clone(),
                        body: Box::new(body),
                    },
                )
            }
            DrStmt::Share { state } => {
                let node = self.node(state)?;
                let DrNodeBody::SharedState {
                    name,
                    mutable,
                    declared_type,
                    initial,
                } = &node.body
                else {
                    return Err(BridgeError::defect(state, "share of a non-state node"));
                };
                let value = self.expr(initial)?;
                self.mapped(
                    node,
                    NodeKind::Binding {
                        mutable: *mutable,
                        name: name.clone(),
                        declared_type: declared_type.clone(),
                        value: Box::new(value),
                    },
                )
            }
            other => self.stmt(other),
        }
    }

    // ── Statements ─────────────────────────────────────────────────────

    fn block(&mut self, stmts: &[DrStmt]) -> BridgeResult<SurfaceNode> {
        let stmts = self.stmts(stmts)?;
        Ok(self.inline(NodeKind::Block(stmts)))
    }

    fn stmts(&mut self, stmts: &[DrStmt]) -> BridgeResult<Vec<SurfaceNode>> {
        stmts.iter().map(|s| self.stmt(s)).collect()
    }

    fn stmt(&mut self, stmt: &DrStmt) -> BridgeResult<SurfaceNode> {
        match stmt {
            DrStmt::Declare { function } => Err(BridgeError::defect(
                function,
                "declaration outside the program root",
            )),
            DrStmt::Share { state } => Err(BridgeError::defect(
                state,
                "shared state outside the program root",
            )),
            DrStmt::Bind {
                mutable,
                name,
                declared_type,
                value,
            } => {
                let value = self.expr(value)?;
                Ok(self.inline(NodeKind::Binding {
                    mutable: *mutable,
                    name: name.clone(),
                    declared_type: declared_type.clone(),
                    value: Box::new(value),
                }))
            }
            DrStmt::Assign { name, value } => {
                let value = self.expr(value)?;
                Ok(self.inline(NodeKind::Assign {
                    name: name.clone(),
                    value: Box::new(value),
                }))
            }
            DrStmt::Guard { context } => self.guard(context),
            DrStmt::Branch {
                condition,
                then_branch,
                else_branch,
            } => {
                let kind = self.conditional(condition, then_branch, else_branch.as_deref())?;
                Ok(self.inline(kind))
            }
            DrStmt::Loop { condition, body } => {
                let condition = self.expr(condition)?;
                let body = self.block(body)?;
                Ok(self.inline(NodeKind::WhileLoop {
                    condition: Box::new(condition),
                    body: Box::new(body),
                }))
            }
            DrStmt::Act { intent } => {
                let node = self.node(intent)?;
                let DrNodeBody::Intent { action, arguments } = &node.body else {
                    return Err(BridgeError::defect(intent, "act on a non-intent node"));
                };
                let args = self.exprs(arguments)?;
                self.mapped(
                    node,
                    NodeKind::Call {
                        callee: action.clone(),
                        args,
                    },
                )
            }
            DrStmt::Eval { expr } => self.expr(expr),
            DrStmt::Return { value } => {
                let value = value.as_ref().map(|v| self.expr(v)).transpose()?;
                Ok(self.inline(NodeKind::Return(value.map(Box::new))))
            }
            DrStmt::Block { body } => {
                let stmts = self.stmts(body)?;
                Ok(self.inline(NodeKind::Block(stmts)))
            }
        }
    }

    fn guard(&mut self, context: &DrNodeId) -> BridgeResult<SurfaceNode> {
        let node = self.node(context)?;
        let DrNodeBody::ReasoningContext {
            condition,
            condition_text,
            then_branch,
            else_branch,
            ..
        } = &node.body
        else {
            return Err(BridgeError::defect(context, "guard on a non-reasoning node"));
        };
        let kind = self.conditional(condition, then_branch, else_branch.as_deref())?;
        if let NodeKind::IfExpr { condition, .. } = &kind {
            let rebuilt = render_expression(condition);
            if &rebuilt != condition_text {
                return Err(BridgeError::defect(
                    context,
                    format!(
                        "condition text {:?} does not match its expression {:?}",
                        condition_text, rebuilt
                    ),
                ));
            }
        }
        self.mapped(node, kind)
    }

    fn conditional(
        &mut self,
        condition: &DrExpr,
        then_branch: &[DrStmt],
        else_branch: Option<&[DrStmt]>,
    ) -> BridgeResult<NodeKind> {
        let condition = self.expr(condition)?;
        let then_block = self.block(then_branch)?;
        let else_block = else_branch.map(|e| self.block(e)).transpose()?;
        Ok(NodeKind::IfExpr {
            condition: Box::new(condition),
            then_branch: Box::new(then_block),
            else_branch: else_block.map(Box::new),
        })
    }

    // ── Expressions ────────────────────────────────────────────────────

    fn exprs(&mut self, exprs: &[DrExpr]) -> BridgeResult<Vec<SurfaceNode>> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn expr(&mut self, expr: &DrExpr) -> BridgeResult<SurfaceNode> {
        match expr {
            DrExpr::Literal { value } => Ok(self.inline(NodeKind::Literal(value.clone()))),
            DrExpr::Var { name } => Ok(self.inline(NodeKind::Identifier(name.clone()))),
            DrExpr::Binary { op, lhs, rhs } => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                Ok(self.inline(NodeKind::BinaryOp {
                    op: *op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }))
            }
            DrExpr::Unary { op, operand } => {
                let operand = self.expr(operand)?;
                Ok(self.inline(NodeKind::Unary {
                    op: *op,
                    operand: Box::new(operand),
                }))
            }
            DrExpr::Call { target, args } => {
                let args = self.exprs(args)?;
                Ok(self.inline(NodeKind::Call {
                    callee: target.clone(),
                    args,
                }))
            }
            DrExpr::Observe { belief } => {
                let node = self.node(belief)?;
                let DrNodeBody::Belief { target, args, .. } = &node.body else {
                    return Err(BridgeError::defect(belief, "observe of a non-belief node"));
                };
                let args = self.exprs(args)?;
                self.mapped(
                    node,
                    NodeKind::Call {
                        callee: target.clone(),
                        args,
                    },
                )
            }
        }
    }
}
