//! Invariant extraction.
//!
//! Reduces a surface program or a DR document to the behavior-relevant facts
//! both must agree on: function signatures, side-effect sets and control
//! shape. Facts are canonicalized (sorted by kind and name) and folded into
//! a BLAKE3 fingerprint, so formatting, ids, field order and top-level order
//! never influence the result.
//!
//! The fingerprint is a consistency digest for equality testing. It detects
//! divergence and corruption; it is not a signature.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use deep_repr::{DrDocument, DrExpr, DrNodeBody, DrStmt};
use serde::{Deserialize, Serialize};
use surface_ast::{NodeKind, Program, SurfaceNode};

use crate::error::{BridgeError, BridgeResult};

const FACT_TAG: &[u8] = b"layer-bridge-fact-v1:";
const DIGEST_TAG: &[u8] = b"layer-bridge-digest-v1:";

/// Name of the fact describing top-level executable code.
pub const ENTRY_FACT: &str = "<entry>";

// ── Fingerprint ────────────────────────────────────────────────────────

/// A 32-byte BLAKE3 fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn from_hex(hex: &str) -> Result<Self, FingerprintError> {
        if hex.len() != 64 || !hex.is_ascii() {
            return Err(FingerprintError::InvalidLength(hex.len()));
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| FingerprintError::InvalidHex)?;
        }
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Fingerprint::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    #[error("invalid hex length: {0} (expected 64)")]
    InvalidLength(usize),
    #[error("invalid hex character")]
    InvalidHex,
}

// ── Facts ──────────────────────────────────────────────────────────────

/// Fact categories, in canonical sort order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Binding,
    Entry,
    Function,
}

impl std::fmt::Display for FactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binding => write!(f, "binding"),
            Self::Entry => write!(f, "entry"),
            Self::Function => write!(f, "function"),
        }
    }
}

/// Distinct external call targets reachable from a body.
///
/// `analyzed` separates "no effects observed" (pure) from "not analyzed".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectSet {
    pub analyzed: bool,
    pub targets: BTreeSet<String>,
}

impl EffectSet {
    pub fn analyzed(targets: BTreeSet<String>) -> Self {
        Self {
            analyzed: true,
            targets,
        }
    }

    pub fn is_pure(&self) -> bool {
        self.analyzed && self.targets.is_empty()
    }
}

impl std::fmt::Display for EffectSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.analyzed {
            return write!(f, "<unanalyzed>");
        }
        let names: Vec<&str> = self.targets.iter().map(String::as_str).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// Control skeleton: construct counts plus maximum nesting of if/while.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlShape {
    pub ifs: u32,
    pub loops: u32,
    pub calls: u32,
    pub max_depth: u32,
}

impl ControlShape {
    fn enter(&mut self, depth: u32) -> u32 {
        let inner = depth + 1;
        self.max_depth = self.max_depth.max(inner);
        inner
    }
}

impl std::fmt::Display for ControlShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "if={} while={} call={} depth={}",
            self.ifs, self.loops, self.calls, self.max_depth
        )
    }
}

/// One canonical fact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub kind: FactKind,
    pub name: String,
    /// Canonical signature text, e.g. `fn(x: Int) -> Int` or `var: Int`.
    pub signature: String,
    pub side_effects: EffectSet,
    pub control: ControlShape,
}

impl Fact {
    /// Domain-separated hash of this fact.
    pub fn leaf_hash(&self) -> BridgeResult<Fingerprint> {
        let encoded = serde_json::to_vec(self)
            .map_err(|e| BridgeError::Persistence(e.to_string()))?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(FACT_TAG);
        hasher.update(&encoded);
        Ok(Fingerprint(*hasher.finalize().as_bytes()))
    }

    pub fn key(&self) -> (FactKind, &str) {
        (self.kind, &self.name)
    }
}

// ── Digest ─────────────────────────────────────────────────────────────

/// Canonical fact list and its fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantDigest {
    pub facts: Vec<Fact>,
    pub fingerprint: Fingerprint,
}

impl InvariantDigest {
    /// Canonicalize `facts` and fingerprint them.
    pub fn from_facts(facts: Vec<Fact>) -> BridgeResult<Self> {
        let mut leaves = Vec::with_capacity(facts.len());
        for fact in facts {
            let leaf = fact.leaf_hash()?;
            leaves.push((fact, leaf));
        }
        leaves.sort_by(|(a, la), (b, lb)| a.key().cmp(&b.key()).then(la.cmp(lb)));

        let mut hasher = blake3::Hasher::new();
        hasher.update(DIGEST_TAG);
        hasher.update(&(leaves.len() as u64).to_le_bytes());
        for (_, leaf) in &leaves {
            hasher.update(leaf.as_bytes());
        }
        Ok(Self {
            facts: leaves.into_iter().map(|(f, _)| f).collect(),
            fingerprint: Fingerprint(*hasher.finalize().as_bytes()),
        })
    }

    /// Recompute the fingerprint from the stored facts.
    pub fn verify_fingerprint(&self) -> BridgeResult<bool> {
        Ok(Self::from_facts(self.facts.clone())?.fingerprint == self.fingerprint)
    }

    pub fn fact(&self, kind: FactKind, name: &str) -> Option<&Fact> {
        self.facts.iter().find(|f| f.kind == kind && f.name == name)
    }

    pub fn function(&self, name: &str) -> Option<&Fact> {
        self.fact(FactKind::Function, name)
    }

    pub fn entry(&self) -> Option<&Fact> {
        self.fact(FactKind::Entry, ENTRY_FACT)
    }

    /// Union of every fact's side effects.
    pub fn all_side_effects(&self) -> BTreeSet<String> {
        self.facts
            .iter()
            .flat_map(|f| f.side_effects.targets.iter().cloned())
            .collect()
    }
}

// ── Effect closure ─────────────────────────────────────────────────────

/// Direct effects and internal callees of one body.
#[derive(Debug, Default)]
struct BodyScan {
    external: BTreeSet<String>,
    callees: BTreeSet<String>,
    control: ControlShape,
}

impl BodyScan {
    fn call(&mut self, target: &str, defined: &HashSet<String>) {
        self.control.calls += 1;
        if defined.contains(target) {
            self.callees.insert(target.to_string());
        } else {
            self.external.insert(target.to_string());
        }
    }
}

/// Transitive external effects of every defined function.
///
/// Bodies sharing a name merge, so duplicate declarations stay total.
fn close_effects<'a>(
    bodies: impl IntoIterator<Item = (&'a String, &'a BodyScan)>,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut merged: BTreeMap<&str, (BTreeSet<&str>, BTreeSet<&str>)> = BTreeMap::new();
    for (name, scan) in bodies {
        let slot = merged.entry(name.as_str()).or_default();
        slot.0.extend(scan.external.iter().map(String::as_str));
        slot.1.extend(scan.callees.iter().map(String::as_str));
    }
    merged
        .keys()
        .map(|&name| {
            let mut effects = BTreeSet::new();
            let mut seen = HashSet::new();
            let mut stack = vec![name];
            while let Some(f) = stack.pop() {
                if !seen.insert(f) {
                    continue;
                }
                if let Some((external, callees)) = merged.get(f) {
                    effects.extend(external.iter().map(|t| t.to_string()));
                    stack.extend(callees.iter().copied());
                }
            }
            (name.to_string(), effects)
        })
        .collect()
}

fn effects_of(scan: &BodyScan, closed: &BTreeMap<String, BTreeSet<String>>) -> EffectSet {
    let mut targets = scan.external.clone();
    for callee in &scan.callees {
        if let Some(effects) = closed.get(callee) {
            targets.extend(effects.iter().cloned());
        }
    }
    EffectSet::analyzed(targets)
}

fn function_signature<'a>(
    params: impl Iterator<Item = (&'a str, Option<&'a str>)>,
    return_type: Option<&str>,
) -> String {
    let params: Vec<String> = params
        .map(|(name, ty)| match ty {
            Some(t) => format!("{}: {}", name, t),
            None => name.to_string(),
        })
        .collect();
    match return_type {
        Some(rt) => format!("fn({}) -> {}", params.join(", "), rt),
        None => format!("fn({})", params.join(", ")),
    }
}

fn binding_signature(mutable: bool, declared_type: Option<&str>) -> String {
    let head = if mutable { "var" } else { "let" };
    match declared_type {
        Some(t) => format!("{}: {}", head, t),
        None => head.to_string(),
    }
}

// ── Surface extraction ─────────────────────────────────────────────────

struct SurfaceScanner<'a> {
    defined: &'a HashSet<String>,
}

impl SurfaceScanner<'_> {
    fn block(&self, node: &SurfaceNode, depth: u32, scan: &mut BodyScan) {
        match &node.kind {
            NodeKind::Block(stmts) => {
                for s in stmts {
                    self.stmt(s, depth, scan);
                }
            }
            _ => self.stmt(node, depth, scan),
        }
    }

    fn stmt(&self, node: &SurfaceNode, depth: u32, scan: &mut BodyScan) {
        match &node.kind {
            NodeKind::IfExpr {
                condition,
                then_branch,
                else_branch,
            } => {
                scan.control.ifs += 1;
                let inner = scan.control.enter(depth);
                self.expr(condition, scan);
                self.block(then_branch, inner, scan);
                if let Some(e) = else_branch {
                    self.block(e, inner, scan);
                }
            }
            NodeKind::WhileLoop { condition, body } => {
                scan.control.loops += 1;
                let inner = scan.control.enter(depth);
                self.expr(condition, scan);
                self.block(body, inner, scan);
            }
            NodeKind::Block(_) => self.block(node, depth, scan),
            NodeKind::Binding { value, .. } | NodeKind::Assign { value, .. } => {
                self.expr(value, scan)
            }
            NodeKind::Return(value) => {
                if let Some(v) = value {
                    self.expr(v, scan);
                }
            }
            // Nested declarations have no translation; the engine rejects them.
            NodeKind::FunctionDecl { .. } => {}
            _ => self.expr(node, scan),
        }
    }

    fn expr(&self, node: &SurfaceNode, scan: &mut BodyScan) {
        match &node.kind {
            NodeKind::Call { callee, args } => {
                scan.call(callee, self.defined);
                for a in args {
                    self.expr(a, scan);
                }
            }
            NodeKind::BinaryOp { lhs, rhs, .. } => {
                self.expr(lhs, scan);
                self.expr(rhs, scan);
            }
            NodeKind::Unary { operand, .. } => self.expr(operand, scan),
            NodeKind::Literal(_) | NodeKind::Identifier(_) => {}
            // Statement forms in expression position; the engine rejects them.
            _ => self.stmt(node, 0, scan),
        }
    }
}

/// Transitive external effects of each function defined in `program`.
pub fn surface_function_effects(program: &Program) -> BTreeMap<String, BTreeSet<String>> {
    let defined: HashSet<String> = program
        .function_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let scanner = SurfaceScanner { defined: &defined };
    let mut scans = Vec::new();
    for f in program.functions() {
        if let NodeKind::FunctionDecl { name, body, .. } = &f.kind {
            let mut scan = BodyScan::default();
            scanner.block(body, 0, &mut scan);
            scans.push((name.clone(), scan));
        }
    }
    close_effects(scans.iter().map(|(n, s)| (n, s)))
}

fn function_facts(
    functions: Vec<(String, String, BodyScan)>,
    entry: &BodyScan,
    facts: &mut Vec<Fact>,
) {
    let closed = close_effects(functions.iter().map(|(n, _, s)| (n, s)));
    for (name, signature, scan) in functions {
        facts.push(Fact {
            kind: FactKind::Function,
            name,
            signature,
            side_effects: effects_of(&scan, &closed),
            control: scan.control,
        });
    }
    facts.push(Fact {
        kind: FactKind::Entry,
        name: ENTRY_FACT.to_string(),
        signature: String::new(),
        side_effects: effects_of(entry, &closed),
        control: entry.control,
    });
}

/// Extract the invariant digest of a surface program.
pub fn extract_surface(program: &Program) -> BridgeResult<InvariantDigest> {
    let defined: HashSet<String> = program
        .function_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let scanner = SurfaceScanner { defined: &defined };

    let mut functions = Vec::new();
    let mut facts = Vec::new();
    let mut entry = BodyScan::default();

    for item in &program.items {
        match &item.kind {
            NodeKind::FunctionDecl {
                name,
                params,
                return_type,
                body,
            } => {
                let mut scan = BodyScan::default();
                scanner.block(body, 0, &mut scan);
                let signature = function_signature(
                    params.iter().map(|p| (p.name.as_str(), p.type_name.as_deref())),
                    return_type.as_deref(),
                );
                functions.push((name.clone(), signature, scan));
            }
            NodeKind::Binding {
                mutable,
                name,
                declared_type,
                value,
            } => {
                facts.push(Fact {
                    kind: FactKind::Binding,
                    name: name.clone(),
                    signature: binding_signature(*mutable, declared_type.as_deref()),
                    side_effects: EffectSet::analyzed(BTreeSet::new()),
                    control: ControlShape::default(),
                });
                scanner.expr(value, &mut entry);
            }
            _ => scanner.stmt(item, 0, &mut entry),
        }
    }

    function_facts(functions, &entry, &mut facts);
    InvariantDigest::from_facts(facts)
}

// ── DR extraction ──────────────────────────────────────────────────────

struct DeepScanner<'a> {
    doc: &'a DrDocument,
    defined: &'a HashSet<String>,
}

impl DeepScanner<'_> {
    fn stmts(&self, stmts: &[DrStmt], depth: u32, scan: &mut BodyScan) {
        for s in stmts {
            self.stmt(s, depth, scan);
        }
    }

    fn stmt(&self, stmt: &DrStmt, depth: u32, scan: &mut BodyScan) {
        match stmt {
            DrStmt::Guard { context } => {
                if let Some(DrNodeBody::ReasoningContext {
                    condition,
                    then_branch,
                    else_branch,
                    ..
                }) = self.doc.get(context).map(|n| &n.body)
                {
                    self.conditional(condition, then_branch, else_branch.as_deref(), depth, scan);
                }
            }
            DrStmt::Branch {
                condition,
                then_branch,
                else_branch,
            } => self.conditional(condition, then_branch, else_branch.as_deref(), depth, scan),
            DrStmt::Loop { condition, body } => {
                scan.control.loops += 1;
                let inner = scan.control.enter(depth);
                self.expr(condition, scan);
                self.stmts(body, inner, scan);
            }
            DrStmt::Act { intent } => {
                if let Some(DrNodeBody::Intent { action, arguments }) =
                    self.doc.get(intent).map(|n| &n.body)
                {
                    scan.call(action, &HashSet::new());
                    for a in arguments {
                        self.expr(a, scan);
                    }
                }
            }
            DrStmt::Bind { value, .. } | DrStmt::Assign { value, .. } => self.expr(value, scan),
            DrStmt::Eval { expr } => self.expr(expr, scan),
            DrStmt::Return { value } => {
                if let Some(v) = value {
                    self.expr(v, scan);
                }
            }
            DrStmt::Block { body } => self.stmts(body, depth, scan),
            DrStmt::Share { state } => {
                if let Some(DrNodeBody::SharedState { initial, .. }) =
                    self.doc.get(state).map(|n| &n.body)
                {
                    self.expr(initial, scan);
                }
            }
            DrStmt::Declare { .. } => {}
        }
    }

    fn conditional(
        &self,
        condition: &DrExpr,
        then_branch: &[DrStmt],
        else_branch: Option<&[DrStmt]>,
        depth: u32,
        scan: &mut BodyScan,
    ) {
        scan.control.ifs += 1;
        let inner = scan.control.enter(depth);
        self.expr(condition, scan);
        self.stmts(then_branch, inner, scan);
        if let Some(e) = else_branch {
            self.stmts(e, inner, scan);
        }
    }

    fn expr(&self, expr: &DrExpr, scan: &mut BodyScan) {
        match expr {
            DrExpr::Call { target, args } => {
                scan.call(target, self.defined);
                for a in args {
                    self.expr(a, scan);
                }
            }
            DrExpr::Observe { belief } => {
                if let Some(DrNodeBody::Belief { target, args, .. }) =
                    self.doc.get(belief).map(|n| &n.body)
                {
                    scan.call(target, &HashSet::new());
                    for a in args {
                        self.expr(a, scan);
                    }
                }
            }
            DrExpr::Binary { lhs, rhs, .. } => {
                self.expr(lhs, scan);
                self.expr(rhs, scan);
            }
            DrExpr::Unary { operand, .. } => self.expr(operand, scan),
            DrExpr::Literal { .. } | DrExpr::Var { .. } => {}
        }
    }
}

/// Extract the invariant digest of a DR document.
pub fn extract_deep(doc: &DrDocument) -> BridgeResult<InvariantDigest> {
    let entry_stmts = doc.entry()?;
    let defined: HashSet<String> = doc
        .nodes()
        .filter_map(|n| match &n.body {
            DrNodeBody::FunctionDefinition { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect();
    let scanner = DeepScanner {
        doc,
        defined: &defined,
    };

    let mut functions = Vec::new();
    let mut facts = Vec::new();
    let mut entry = BodyScan::default();

    for stmt in entry_stmts {
        match stmt {
            DrStmt::Declare { function } => {
                if let Some(DrNodeBody::FunctionDefinition {
                    name,
                    parameters,
                    return_type,
                    body,
                }) = doc.get(function).map(|n| &n.body)
                {
                    let mut scan = BodyScan::default();
                    scanner.stmts(body, 0, &mut scan);
                    let signature = function_signature(
                        parameters
                            .iter()
                            .map(|p| (p.name.as_str(), p.type_name.as_deref())),
                        return_type.as_deref(),
                    );
                    functions.push((name.clone(), signature, scan));
                }
            }
            DrStmt::Share { state } => {
                if let Some(DrNodeBody::SharedState {
                    name,
                    mutable,
                    declared_type,
                    ..
                }) = doc.get(state).map(|n| &n.body)
                {
                    facts.push(Fact {
                        kind: FactKind::Binding,
                        name: name.clone(),
                        signature: binding_signature(*mutable, declared_type.as_deref()),
                        side_effects: EffectSet::analyzed(BTreeSet::new()),
                        control: ControlShape::default(),
                    });
                }
                scanner.stmt(stmt, 0, &mut entry);
            }
            other => scanner.stmt(other, 0, &mut entry),
        }
    }

    function_facts(functions, &entry, &mut facts);
    InvariantDigest::from_facts(facts)
}
