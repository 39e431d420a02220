//! DR document container.
//!
//! A `DrDocument` owns every node produced by one translation pass. Nodes
//! reference each other by id; the root is a structured-knowledge record
//! whose entry list reaches every other node exactly once.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::body::DrStmt;
use crate::error::{ShapeError, ShapeResult};
use crate::node::{DrNode, DrNodeBody};
use crate::types::{DocumentId, DrNodeId, DrNodeKind};

/// A complete deep-representation document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DrDocument {
    pub id: DocumentId,
    pub dr_version: String,
    pub root: DrNodeId,
    nodes: BTreeMap<DrNodeId, DrNode>,
}

impl DrDocument {
    pub fn new(dr_version: impl Into<String>, root: DrNodeId) -> Self {
        Self {
            id: DocumentId::new(),
            dr_version: dr_version.into(),
            root,
            nodes: BTreeMap::new(),
        }
    }

    /// Insert a node; ids must be unique within the document.
    pub fn insert(&mut self, node: DrNode) -> ShapeResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(ShapeError::DuplicateNode(node.id));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn get(&self, id: &DrNodeId) -> Option<&DrNode> {
        self.nodes.get(id)
    }

    /// Mutable access, for tooling that patches loaded documents.
    pub fn get_mut(&mut self, id: &DrNodeId) -> Option<&mut DrNode> {
        self.nodes.get_mut(id)
    }

    pub fn root_node(&self) -> ShapeResult<&DrNode> {
        match self.nodes.get(&self.root) {
            Some(n) if n.kind() == DrNodeKind::StructuredKnowledge => Ok(n),
            _ => Err(ShapeError::MissingRoot(self.root.clone())),
        }
    }

    /// Entry statements of the root, in source order.
    pub fn entry(&self) -> ShapeResult<&[DrStmt]> {
        match &self.root_node()?.body {
            DrNodeBody::StructuredKnowledge { entry, .. } => Ok(entry),
            _ => Err(ShapeError::MissingRoot(self.root.clone())),
        }
    }

    /// Surface version recorded on the root.
    pub fn surface_version(&self) -> ShapeResult<&str> {
        match &self.root_node()?.body {
            DrNodeBody::StructuredKnowledge {
                surface_version, ..
            } => Ok(surface_version),
            _ => Err(ShapeError::MissingRoot(self.root.clone())),
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DrNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn count_by_kind(&self, kind: DrNodeKind) -> usize {
        self.nodes.values().filter(|n| n.kind() == kind).count()
    }

    /// Find a function definition by name.
    pub fn function(&self, name: &str) -> Option<&DrNode> {
        self.nodes.values().find(|n| {
            matches!(&n.body, DrNodeBody::FunctionDefinition { name: fname, .. } if fname == name)
        })
    }

    // ── Validation ─────────────────────────────────────────────────────

    /// Check the document is well formed.
    ///
    /// The root must be structured knowledge; every reference must resolve
    /// to a node of the expected kind; every non-root node must be
    /// referenced exactly once; declarations may only appear directly in
    /// the root entry list.
    pub fn validate(&self) -> ShapeResult<()> {
        let root = self.root_node()?;

        for (key, node) in &self.nodes {
            if *key != node.id {
                return Err(ShapeError::Misplaced {
                    node: node.id.clone(),
                    reason: format!("stored under key {}", key),
                });
            }
            if let Some((field, value)) = node.body.required_name() {
                if value.trim().is_empty() {
                    return Err(ShapeError::EmptyName {
                        node: node.id.clone(),
                        field: field.to_string(),
                    });
                }
            }
            if node.id != root.id {
                for stmts in node.body.statement_lists() {
                    if stmts.iter().any(DrStmt::contains_declaration) {
                        return Err(ShapeError::Misplaced {
                            node: node.id.clone(),
                            reason: "declarations are only allowed in the root entry".into(),
                        });
                    }
                }
            }
        }
        if let DrNodeBody::StructuredKnowledge { entry, .. } = &root.body {
            for stmt in entry {
                if !stmt.is_declaration() && stmt.contains_declaration() {
                    return Err(ShapeError::Misplaced {
                        node: root.id.clone(),
                        reason: "nested declaration in entry".into(),
                    });
                }
            }
        }

        let mut referenced: BTreeSet<DrNodeId> = BTreeSet::new();
        for node in self.nodes.values() {
            let mut problem: Option<ShapeError> = None;
            node.body.for_each_ref(&mut |target, expected| {
                if problem.is_some() {
                    return;
                }
                problem = match self.nodes.get(target) {
                    None => Some(ShapeError::DanglingReference {
                        from: node.id.clone(),
                        to: target.clone(),
                    }),
                    Some(t) if t.kind() != expected => Some(ShapeError::WrongKind {
                        reference: target.clone(),
                        expected,
                        found: t.kind(),
                    }),
                    Some(_) if !referenced.insert(target.clone()) => {
                        Some(ShapeError::SharedReference(target.clone()))
                    }
                    Some(_) => None,
                };
            });
            if let Some(err) = problem {
                return Err(err);
            }
        }
        if referenced.contains(&root.id) {
            return Err(ShapeError::SharedReference(root.id.clone()));
        }

        // Single references plus no root reference still allow detached
        // cycles; require reachability from the root.
        let reachable = self.reachable_from_root();
        if let Some(orphan) = self.nodes.keys().find(|id| !reachable.contains(*id)) {
            return Err(ShapeError::Orphan(orphan.clone()));
        }
        Ok(())
    }

    fn reachable_from_root(&self) -> BTreeSet<DrNodeId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![self.root.clone()];
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                node.body.for_each_ref(&mut |target, _| stack.push(target.clone()));
            }
        }
        seen
    }

    // ── Persistence ────────────────────────────────────────────────────

    pub fn to_json(&self) -> ShapeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load and validate a document.
    pub fn from_json(json: &str) -> ShapeResult<Self> {
        let doc: Self = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }
}
