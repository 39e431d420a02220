//! Surface → DR translation pass.
//!
//! Walks the AST once, emitting DR nodes and position mappings:
//!
//! - `FunctionDecl` → `FunctionDefinition`
//! - top-level binding → `SharedState`
//! - external call, result consumed → `Belief` (read through `Observe`)
//! - external call, result discarded → `Intent` (performed through `Act`)
//! - `if` whose branches reach a side effect → `ReasoningContext` (`Guard`)
//! - everything else stays inline in the statement bodies
//!
//! Ids are allocated parent first, so a node always has a smaller sequence
//! number than the nodes it references.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use deep_repr::{
    Attribution, Confidence, DrDocument, DrExpr, DrNode, DrNodeBody, DrNodeId, DrNodeKind,
    DrStmt, ParameterSpec, Uncertainty,
};
use surface_ast::{render_expression, NodeKind, Param, Program, SurfaceNode};

use crate::config::{BeliefOverride, BridgeConfig};
use crate::digest::surface_function_effects;
use crate::engine::CancellationToken;
use crate::error::{BridgeError, BridgeResult};
use crate::position::{Direction, PositionIndex};

/// Subject recorded on every structured-knowledge root.
pub const PROGRAM_SUBJECT: &str = "program";

pub(crate) struct ForwardPass<'a> {
    config: &'a BridgeConfig,
    overrides: &'a HashMap<String, BeliefOverride>,
    cancel: &'a CancellationToken,
    defined: HashSet<String>,
    effects: BTreeMap<String, BTreeSet<String>>,
    created_at: DateTime<Utc>,
    next_seq: u32,
    nodes: Vec<DrNode>,
    index: PositionIndex,
}

impl<'a> ForwardPass<'a> {
    pub(crate) fn new(
        program: &Program,
        config: &'a BridgeConfig,
        overrides: &'a HashMap<String, BeliefOverride>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            config,
            overrides,
            cancel,
            defined: program
                .function_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            effects: surface_function_effects(program),
            created_at: Utc::now(),
            next_seq: 1,
            nodes: Vec::new(),
            index: PositionIndex::new(),
        }
    }

    pub(crate) fn run(mut self, program: &Program) -> BridgeResult<(DrDocument, PositionIndex)> {
        program.validate()?;

        let root = DrNodeId::sequential(DrNodeKind::StructuredKnowledge, 0);
        self.index.record_synthetic(root.clone(), Direction::Forward)?;

        let mut entry = Vec::with_capacity(program.items.len());
        for item in &program.items {
            self.cancel.check()?;
            entry.push(self.top_level(item)?);
        }

        let root_node = DrNode::new(
            root.clone(),
            Attribution::HumanContributed,
            DrNodeBody::StructuredKnowledge {
                subject: PROGRAM_SUBJECT.to_string(),
                surface_version: program.surface_version.clone(),
                translator_version: self.config.translator_version.clone(),
                entry,
            },
        )
        .with_created_at(self.created_at);

        let mut doc = DrDocument::new(self.config.dr_version.clone(), root);
        doc.insert(root_node)?;
        for node in self.nodes {
            doc.insert(node)?;
        }
        doc.validate()?;
        Ok((doc, self.index))
    }

    // ── Allocation ─────────────────────────────────────────────────────

    fn allocate(&mut self, kind: DrNodeKind, origin: &SurfaceNode) -> BridgeResult<DrNodeId> {
        let id = DrNodeId::sequential(kind, self.next_seq);
        self.next_seq += 1;
        self.index
            .record_mapping(origin.id, id.clone(), Direction::Forward)?;
        self.index.record_span(origin.id, origin.span);
        Ok(id)
    }

    fn emit(
        &self,
        id: DrNodeId,
        origin: &SurfaceNode,
        attribution: Attribution,
        body: DrNodeBody,
    ) -> DrNode {
        let mut node = DrNode::new(id, attribution, body).with_created_at(self.created_at);
        if !origin.span.is_synthetic() {
            node = node.with_origin(origin.span);
        }
        node
    }

    fn is_external(&self, target: &str) -> bool {
        !self.defined.contains(target)
    }

    // ── Top level ──────────────────────────────────────────────────────

    fn top_level(&mut self, item: &SurfaceNode) -> BridgeResult<DrStmt> {
        match &item.kind {
            NodeKind::FunctionDecl {
                name,
                params,
                return_type,
                body,
            } => {
                let id = self.allocate(DrNodeKind::FunctionDefinition, item)?;
                let parameters = params
                    .iter()
                    .map(|p| self.parameter(p))
                    .collect::<BridgeResult<Vec<_>>>()?;
                let body = self.block(body)?;
                let node = self
                    .emit(
                        id.clone(),
                        item,
                        Attribution::HumanContributed,
                        DrNodeBody::FunctionDefinition {
                            name: name.clone(),
                            parameters,
                            return_type: return_type.clone(),
                            body,
                        },
                    )
                    .with_confidence(Confidence::CERTAIN);
                self.nodes.push(node);
                Ok(DrStmt::Declare { function: id })
            }
            NodeKind::Binding {
                mutable,
                name,
                declared_type,
                value,
            } => {
                let id = self.allocate(DrNodeKind::SharedState, item)?;
                let initial = self.expr(value)?;
                let node = self.emit(
                    id.clone(),
                    item,
                    Attribution::HumanContributed,
                    DrNodeBody::SharedState {
                        name: name.clone(),
                        mutable: *mutable,
                        declared_type: declared_type.clone(),
                        initial,
                    },
                );
                self.nodes.push(node);
                Ok(DrStmt::Share { state: id })
            }
            _ => self.stmt(item),
        }
    }

    fn parameter(&self, param: &Param) -> BridgeResult<ParameterSpec> {
        let confidence = if param.is_typed() {
            Confidence::CERTAIN
        } else {
            Confidence::new(self.config.untyped_parameter_confidence)?
        };
        Ok(ParameterSpec {
            name: param.name.clone(),
            type_name: param.type_name.clone(),
            confidence,
        })
    }

    // ── Statements ─────────────────────────────────────────────────────

    fn block(&mut self, node: &SurfaceNode) -> BridgeResult<Vec<DrStmt>> {
        match &node.kind {
            NodeKind::Block(stmts) => stmts.iter().map(|s| self.stmt(s)).collect(),
            other => Err(BridgeError::defect(
                node.id,
                format!("expected a block, found {}", other.label()),
            )),
        }
    }

    fn stmt(&mut self, node: &SurfaceNode) -> BridgeResult<DrStmt> {
        match &node.kind {
            NodeKind::FunctionDecl { name, .. } => Err(BridgeError::defect(
                node.id,
                format!("function `{}` declared inside a body", name),
            )),
            NodeKind::Binding {
                mutable,
                name,
                declared_type,
                value,
            } => Ok(DrStmt::Bind {
                mutable: *mutable,
                name: name.clone(),
                declared_type: declared_type.clone(),
                value: self.expr(value)?,
            }),
            NodeKind::Assign { name, value } => Ok(DrStmt::Assign {
                name: name.clone(),
                value: self.expr(value)?,
            }),
            NodeKind::IfExpr {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.gates_effects(then_branch, else_branch.as_deref()) {
                    self.reasoning_context(node, condition, then_branch, else_branch.as_deref())
                } else {
                    Ok(DrStmt::Branch {
                        condition: self.expr(condition)?,
                        then_branch: self.block(then_branch)?,
                        else_branch: else_branch.as_deref().map(|e| self.block(e)).transpose()?,
                    })
                }
            }
            NodeKind::WhileLoop { condition, body } => Ok(DrStmt::Loop {
                condition: self.expr(condition)?,
                body: self.block(body)?,
            }),
            NodeKind::Call { callee, args } if self.is_external(callee) => {
                let id = self.allocate(DrNodeKind::Intent, node)?;
                let arguments = self.exprs(args)?;
                let intent = self.emit(
                    id.clone(),
                    node,
                    Attribution::HumanContributed,
                    DrNodeBody::Intent {
                        action: callee.clone(),
                        arguments,
                    },
                );
                self.nodes.push(intent);
                Ok(DrStmt::Act { intent: id })
            }
            NodeKind::Return(value) => Ok(DrStmt::Return {
                value: value.as_deref().map(|v| self.expr(v)).transpose()?,
            }),
            NodeKind::Block(stmts) => Ok(DrStmt::Block {
                body: stmts
                    .iter()
                    .map(|s| self.stmt(s))
                    .collect::<BridgeResult<Vec<_>>>()?,
            }),
            NodeKind::Call { .. }
            | NodeKind::BinaryOp { .. }
            | NodeKind::Unary { .. }
            | NodeKind::Literal(_)
            | NodeKind::Identifier(_) => Ok(DrStmt::Eval {
                expr: self.expr(node)?,
            }),
        }
    }

    fn reasoning_context(
        &mut self,
        node: &SurfaceNode,
        condition: &SurfaceNode,
        then_branch: &SurfaceNode,
        else_branch: Option<&SurfaceNode>,
    ) -> BridgeResult<DrStmt> {
        let id = self.allocate(DrNodeKind::ReasoningContext, node)?;
        let threshold = Confidence::new(self.config.reasoning_confidence_threshold)?;
        let body = DrNodeBody::ReasoningContext {
            condition: self.expr(condition)?,
            condition_text: render_expression(condition),
            confidence_threshold: threshold,
            then_branch: self.block(then_branch)?,
            else_branch: else_branch.map(|e| self.block(e)).transpose()?,
        };
        let context = self.emit(id.clone(), node, Attribution::HumanContributed, body);
        self.nodes.push(context);
        Ok(DrStmt::Guard { context: id })
    }

    /// Whether either branch reaches an external call, directly or through
    /// a program-defined function.
    fn gates_effects(&self, then_branch: &SurfaceNode, else_branch: Option<&SurfaceNode>) -> bool {
        let mut gated = false;
        let mut visit = |n: &SurfaceNode| {
            if let NodeKind::Call { callee, .. } = &n.kind {
                let effectful = match self.effects.get(callee) {
                    Some(effects) => !effects.is_empty(),
                    None => true,
                };
                gated |= effectful;
            }
        };
        then_branch.walk(&mut visit);
        if let Some(e) = else_branch {
            e.walk(&mut visit);
        }
        gated
    }

    // ── Expressions ────────────────────────────────────────────────────

    fn exprs(&mut self, nodes: &[SurfaceNode]) -> BridgeResult<Vec<DrExpr>> {
        nodes.iter().map(|n| self.expr(n)).collect()
    }

    fn expr(&mut self, node: &SurfaceNode) -> BridgeResult<DrExpr> {
        match &node.kind {
            NodeKind::Literal(value) => Ok(DrExpr::Literal {
                value: value.clone(),
            }),
            NodeKind::Identifier(name) => Ok(DrExpr::Var { name: name.clone() }),
            NodeKind::BinaryOp { op, lhs, rhs } => Ok(DrExpr::Binary {
                op: *op,
                lhs: Box::new(self.expr(lhs)?),
                rhs: Box::new(self.expr(rhs)?),
            }),
            NodeKind::Unary { op, operand } => Ok(DrExpr::Unary {
                op: *op,
                operand: Box::new(self.expr(operand)?),
            }),
            NodeKind::Call { callee, args } if self.is_external(callee) => {
                let id = self.allocate(DrNodeKind::Belief, node)?;
                let args = self.exprs(args)?;
                let belief = self.belief(id.clone(), node, callee, args)?;
                self.nodes.push(belief);
                Ok(DrExpr::Observe { belief: id })
            }
            NodeKind::Call { callee, args } => Ok(DrExpr::Call {
                target: callee.clone(),
                args: self.exprs(args)?,
            }),
            other => Err(BridgeError::defect(
                node.id,
                format!("{} in expression position", other.label()),
            )),
        }
    }

    fn belief(
        &self,
        id: DrNodeId,
        node: &SurfaceNode,
        target: &str,
        args: Vec<DrExpr>,
    ) -> BridgeResult<DrNode> {
        let attribution = if self.config.is_sensor(target) {
            Attribution::SensorDerived
        } else {
            Attribution::AgentDerived
        };
        let (confidence, uncertainty) = match self.overrides.get(target) {
            Some(o) => (
                o.confidence,
                o.uncertainty.unwrap_or(self.config.default_belief_uncertainty),
            ),
            None => (
                self.config.default_belief_confidence,
                self.config.default_belief_uncertainty,
            ),
        };
        let body = DrNodeBody::Belief {
            fact: render_expression(node),
            target: target.to_string(),
            args,
        };
        Ok(self
            .emit(id, node, attribution, body)
            .with_confidence(Confidence::new(confidence)?)
            .with_uncertainty(Uncertainty::new(uncertainty)?))
    }
}
