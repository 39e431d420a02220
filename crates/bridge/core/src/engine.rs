//! Translation engine with bounded translation history.
//!
//! `TranslationEngine` drives both passes, extracts the invariant digests of
//! source and target, verifies them and appends the proof token to the audit
//! log. A pass appends only once it has completed; an abandoned or failed
//! pass leaves the log untouched. `LayerBridge` chains a forward translation
//! into the trust boundary.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use deep_repr::{DocumentId, DrDocument};
use serde::{Deserialize, Serialize};
use surface_ast::Program;
use tracing::{info, warn};

use crate::audit::{AuditEvent, AuditLog, InMemoryAuditLog};
use crate::config::{BeliefOverride, BridgeConfig};
use crate::digest::{extract_deep, extract_surface, Fingerprint};
use crate::error::{BridgeError, BridgeResult};
use crate::forward::ForwardPass;
use crate::position::{Direction, PositionIndex};
use crate::registry::CompatibilityRegistry;
use crate::reverse::{DroppedMetadata, ReversePass};
use crate::trust::{AdmissionDecision, TrustBoundary};
use crate::verifier::{EquivalenceVerifier, MismatchReport, ProofToken, Verification};

// ── Cancellation ───────────────────────────────────────────────────────

/// Shared flag a caller flips to abandon an in-flight pass.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> BridgeResult<()> {
        if self.is_cancelled() {
            Err(BridgeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// ── Results ────────────────────────────────────────────────────────────

/// Whether a translated artifact passed equivalence verification.
///
/// Unverified artifacts remain available for inspection but are never
/// admitted for execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationStatus {
    Verified,
    Unverified,
}

impl TranslationStatus {
    fn from_verdict(verdict: bool) -> Self {
        if verdict {
            Self::Verified
        } else {
            Self::Unverified
        }
    }
}

impl std::fmt::Display for TranslationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Verified => write!(f, "verified"),
            Self::Unverified => write!(f, "unverified"),
        }
    }
}

/// Output of a surface → DR pass.
#[derive(Clone, Debug)]
pub struct ForwardTranslation {
    pub document: DrDocument,
    pub index: PositionIndex,
    pub proof: ProofToken,
    pub status: TranslationStatus,
    /// Present exactly when the status is `Unverified`.
    pub mismatch: Option<MismatchReport>,
}

impl ForwardTranslation {
    pub fn is_verified(&self) -> bool {
        self.status == TranslationStatus::Verified
    }
}

/// Output of a DR → surface pass.
#[derive(Clone, Debug)]
pub struct ReverseTranslation {
    pub program: Program,
    pub index: PositionIndex,
    pub proof: ProofToken,
    pub status: TranslationStatus,
    pub mismatch: Option<MismatchReport>,
    /// DR-only metadata discarded on the way back, per node.
    pub dropped_metadata: Vec<DroppedMetadata>,
}

impl ReverseTranslation {
    pub fn is_verified(&self) -> bool {
        self.status == TranslationStatus::Verified
    }
}

// ── History ────────────────────────────────────────────────────────────

/// Record of a single translation pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranslationRecord {
    pub direction: Direction,
    /// The emitted document (forward) or the input document (reverse).
    pub document: Option<DocumentId>,
    pub status: Option<TranslationStatus>,
    pub combined_fingerprint: Option<Fingerprint>,
    pub error_message: Option<String>,
    pub cancelled: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregate view of the tracked history.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationSummary {
    pub total_translations: usize,
    pub forward_translations: usize,
    pub reverse_translations: usize,
    pub verified: usize,
    pub unverified: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl std::fmt::Display for TranslationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Translations(total={}, forward={}, reverse={}, verified={}, unverified={}, failed={}, cancelled={})",
            self.total_translations,
            self.forward_translations,
            self.reverse_translations,
            self.verified,
            self.unverified,
            self.failed,
            self.cancelled,
        )
    }
}

// ── Engine ─────────────────────────────────────────────────────────────

/// Forward and reverse translation with verification and audit.
pub struct TranslationEngine {
    config: BridgeConfig,
    audit: Arc<dyn AuditLog>,
    verifier: EquivalenceVerifier,
    overrides: RwLock<HashMap<String, BeliefOverride>>,
    history: RwLock<VecDeque<TranslationRecord>>,
}

impl TranslationEngine {
    /// Create an engine, validating `config`.
    pub fn new(config: BridgeConfig, audit: Arc<dyn AuditLog>) -> BridgeResult<Self> {
        config.validate()?;
        Ok(Self::build(config, audit))
    }

    /// Default configuration with a fresh in-memory audit log.
    pub fn with_defaults() -> Self {
        Self::build(BridgeConfig::default(), Arc::new(InMemoryAuditLog::new()))
    }

    fn build(config: BridgeConfig, audit: Arc<dyn AuditLog>) -> Self {
        Self {
            config,
            audit,
            verifier: EquivalenceVerifier::new(),
            overrides: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn audit(&self) -> &Arc<dyn AuditLog> {
        &self.audit
    }

    /// Supply caller confidence for reads of one external target.
    pub fn register_override(&self, belief: BeliefOverride) -> BridgeResult<()> {
        belief.validate()?;
        let mut overrides = self
            .overrides
            .write()
            .map_err(|_| BridgeError::Persistence("override lock poisoned".into()))?;
        overrides.insert(belief.target.clone(), belief);
        Ok(())
    }

    // ── Forward ────────────────────────────────────────────────────────

    pub fn translate_forward(&self, program: &Program) -> BridgeResult<ForwardTranslation> {
        self.translate_forward_cancellable(program, &CancellationToken::new())
    }

    pub fn translate_forward_cancellable(
        &self,
        program: &Program,
        cancel: &CancellationToken,
    ) -> BridgeResult<ForwardTranslation> {
        let result = self.run_forward(program, cancel);
        self.record(
            Direction::Forward,
            result.as_ref().map(|t| (&t.document.id, t.status, &t.proof)),
        );
        result
    }

    fn run_forward(
        &self,
        program: &Program,
        cancel: &CancellationToken,
    ) -> BridgeResult<ForwardTranslation> {
        let overrides = self
            .overrides
            .read()
            .map_err(|_| BridgeError::Persistence("override lock poisoned".into()))?
            .clone();
        let (document, index) =
            ForwardPass::new(program, &self.config, &overrides, cancel).run(program)?;

        let source = extract_surface(program)?;
        let target = extract_deep(&document)?;
        cancel.check()?;
        let Verification { token, mismatch } = self.verifier.verify(&source, &target);
        let status = TranslationStatus::from_verdict(token.verdict);

        cancel.check()?;
        self.audit.append(AuditEvent::Verification {
            direction: Direction::Forward,
            document: document.id.clone(),
            token: token.clone(),
        })?;

        match &mismatch {
            None => info!(
                document = %document.id,
                nodes = document.len(),
                mappings = index.len(),
                proof = %token.combined_fingerprint,
                "forward translation verified"
            ),
            Some(report) => warn!(document = %document.id, %report, "forward translation unverified"),
        }

        Ok(ForwardTranslation {
            document,
            index,
            proof: token,
            status,
            mismatch,
        })
    }

    // ── Reverse ────────────────────────────────────────────────────────

    pub fn translate_reverse(&self, document: &DrDocument) -> BridgeResult<ReverseTranslation> {
        self.translate_reverse_cancellable(document, &CancellationToken::new())
    }

    pub fn translate_reverse_cancellable(
        &self,
        document: &DrDocument,
        cancel: &CancellationToken,
    ) -> BridgeResult<ReverseTranslation> {
        let result = self.run_reverse(document, cancel);
        self.record(
            Direction::Reverse,
            result.as_ref().map(|t| (&document.id, t.status, &t.proof)),
        );
        result
    }

    fn run_reverse(
        &self,
        document: &DrDocument,
        cancel: &CancellationToken,
    ) -> BridgeResult<ReverseTranslation> {
        let (program, index, dropped_metadata) = ReversePass::new(document, cancel).run()?;

        let source = extract_deep(document)?;
        let target = extract_surface(&program)?;
        cancel.check()?;
        let Verification { token, mismatch } = self.verifier.verify(&source, &target);
        let status = TranslationStatus::from_verdict(token.verdict);

        cancel.check()?;
        self.audit.append(AuditEvent::Verification {
            direction: Direction::Reverse,
            document: document.id.clone(),
            token: token.clone(),
        })?;

        match &mismatch {
            None => info!(
                document = %document.id,
                items = program.items.len(),
                dropped = dropped_metadata.len(),
                "reverse translation verified"
            ),
            Some(report) => warn!(document = %document.id, %report, "reverse translation unverified"),
        }

        Ok(ReverseTranslation {
            program,
            index,
            proof: token,
            status,
            mismatch,
            dropped_metadata,
        })
    }

    // ── History ────────────────────────────────────────────────────────

    fn record(
        &self,
        direction: Direction,
        outcome: Result<(&DocumentId, TranslationStatus, &ProofToken), &BridgeError>,
    ) {
        let record = match outcome {
            Ok((document, status, proof)) => TranslationRecord {
                direction,
                document: Some(document.clone()),
                status: Some(status),
                combined_fingerprint: Some(proof.combined_fingerprint),
                error_message: None,
                cancelled: false,
                recorded_at: Utc::now(),
            },
            Err(e) => {
                warn!(%direction, error = %e, "translation failed");
                TranslationRecord {
                    direction,
                    document: None,
                    status: None,
                    combined_fingerprint: None,
                    error_message: Some(e.to_string()),
                    cancelled: *e == BridgeError::Cancelled,
                    recorded_at: Utc::now(),
                }
            }
        };

        let Ok(mut history) = self.history.write() else {
            return;
        };
        // Bounded FIFO: evict oldest if at capacity
        if history.len() >= self.config.max_tracked_records {
            history.pop_front();
        }
        history.push_back(record);
    }

    /// Tracked records, oldest first.
    pub fn history(&self) -> Vec<TranslationRecord> {
        self.history
            .read()
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> TranslationSummary {
        let history = self.history();
        let mut summary = TranslationSummary {
            total_translations: history.len(),
            ..TranslationSummary::default()
        };
        for r in &history {
            match r.direction {
                Direction::Forward => summary.forward_translations += 1,
                Direction::Reverse => summary.reverse_translations += 1,
            }
            match r.status {
                Some(TranslationStatus::Verified) => summary.verified += 1,
                Some(TranslationStatus::Unverified) => summary.unverified += 1,
                None if r.cancelled => summary.cancelled += 1,
                None => summary.failed += 1,
            }
        }
        summary
    }
}

impl std::fmt::Debug for TranslationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationEngine")
            .field("config", &self.config)
            .field("audit_entries", &self.audit.len())
            .finish()
    }
}

// ── Layer Bridge ───────────────────────────────────────────────────────

/// Engine, registry and trust boundary sharing one audit log.
pub struct LayerBridge {
    engine: TranslationEngine,
    trust: TrustBoundary,
}

impl LayerBridge {
    pub fn new(config: BridgeConfig, registry: Arc<CompatibilityRegistry>) -> BridgeResult<Self> {
        let audit: Arc<dyn AuditLog> = Arc::new(InMemoryAuditLog::new());
        Self::with_audit(config, registry, audit)
    }

    pub fn with_audit(
        config: BridgeConfig,
        registry: Arc<CompatibilityRegistry>,
        audit: Arc<dyn AuditLog>,
    ) -> BridgeResult<Self> {
        Ok(Self {
            engine: TranslationEngine::new(config, Arc::clone(&audit))?,
            trust: TrustBoundary::new(registry, audit),
        })
    }

    pub fn engine(&self) -> &TranslationEngine {
        &self.engine
    }

    pub fn trust(&self) -> &TrustBoundary {
        &self.trust
    }

    /// Translate forward and submit the result to the trust boundary for
    /// the program's surface version and the engine's DR version.
    pub fn translate_and_admit(
        &self,
        program: &Program,
    ) -> BridgeResult<(ForwardTranslation, AdmissionDecision)> {
        let translation = self.engine.translate_forward(program)?;
        let decision = self.trust.admit_for_execution(
            &translation.document,
            &translation.proof,
            &program.surface_version,
            &self.engine.config().dr_version,
        )?;
        Ok((translation, decision))
    }
}
