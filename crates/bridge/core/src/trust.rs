//! Trust boundary validator.
//!
//! The gate past which only proof-carrying, version-compatible DR documents
//! may execute. Each document moves `Pending -> Accepted | Rejected` once
//! and a rejected artifact has to be re-translated rather than patched.
//!
//! A decision is bound to the content it was made for, not only to the
//! document id. Resubmitting an id returns the recorded decision only when
//! the recomputed DR digest, the token's combined fingerprint and the
//! version pair all match the record. Any other resubmission is rejected
//! and audited, and the original record stands.
//!
//! Checks run in this order, the first failure deciding:
//! 1. the document is well formed (`malformed-document`)
//! 2. the token recomputes from the document and its own fields (`proof-tampered`)
//! 3. the verdict is true (`semantic-mismatch`)
//! 4. the version pair is registered compatible and matches the document
//!    (`version-incompatible`)

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use deep_repr::{DocumentId, DrDocument};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::{AuditEvent, AuditLog};
use crate::digest::{extract_deep, Fingerprint};
use crate::error::{BridgeError, BridgeResult};
use crate::registry::{CompatibilityRegistry, LayerVersion};
use crate::verifier::{recompute_combined, ProofToken};

// ── Decisions ──────────────────────────────────────────────────────────

/// Machine-readable rejection reason.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionReason {
    SemanticMismatch,
    VersionIncompatible,
    ProofTampered,
    MalformedDocument,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SemanticMismatch => "semantic-mismatch",
            Self::VersionIncompatible => "version-incompatible",
            Self::ProofTampered => "proof-tampered",
            Self::MalformedDocument => "malformed-document",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal outcome of an admission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum AdmissionDecision {
    Accepted,
    Rejected(RejectionReason),
}

impl AdmissionDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn reason(&self) -> Option<RejectionReason> {
        match self {
            Self::Accepted => None,
            Self::Rejected(r) => Some(*r),
        }
    }
}

impl std::fmt::Display for AdmissionDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::Rejected(r) => write!(f, "rejected ({})", r),
        }
    }
}

/// Where a document stands at the boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionState {
    Pending,
    Decided(AdmissionDecision),
}

/// A recorded decision with the context it was made in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionRecord {
    pub document: DocumentId,
    pub decision: AdmissionDecision,
    pub surface_version: String,
    pub dr_version: String,
    /// Digest recomputed from the document; `None` if extraction failed.
    pub target_fingerprint: Option<Fingerprint>,
    /// Combined fingerprint of the token the decision was made for.
    pub combined_fingerprint: Fingerprint,
    /// Why the check failed; empty on acceptance.
    pub detail: String,
    pub decided_at: DateTime<Utc>,
}

impl AdmissionRecord {
    /// Why a resubmission of the same id is not the decided artifact, if it isn't.
    fn conflict(
        &self,
        target: Option<Fingerprint>,
        token: &ProofToken,
        surface_version: &str,
        dr_version: &str,
    ) -> Option<(RejectionReason, String)> {
        if self.target_fingerprint != target || self.combined_fingerprint != token.combined_fingerprint {
            return Some((
                RejectionReason::ProofTampered,
                format!("document {} resubmitted with different content or token", self.document),
            ));
        }
        if self.surface_version != surface_version || self.dr_version != dr_version {
            return Some((
                RejectionReason::VersionIncompatible,
                format!(
                    "document {} was decided for ({}, {}), resubmitted for ({}, {})",
                    self.document, self.surface_version, self.dr_version, surface_version, dr_version
                ),
            ));
        }
        None
    }
}

/// Canonical label, or the raw text when it does not parse.
fn normalize(raw: &str) -> String {
    LayerVersion::parse(raw)
        .map(String::from)
        .unwrap_or_else(|_| raw.to_string())
}

// ── Validator ──────────────────────────────────────────────────────────

/// Accept/reject gate in front of DR execution.
///
/// Decision records are kept for the life of the boundary, one per decided
/// document id, alongside the audit log they mirror.
pub struct TrustBoundary {
    registry: Arc<CompatibilityRegistry>,
    audit: Arc<dyn AuditLog>,
    decisions: RwLock<HashMap<DocumentId, AdmissionRecord>>,
}

impl TrustBoundary {
    pub fn new(registry: Arc<CompatibilityRegistry>, audit: Arc<dyn AuditLog>) -> Self {
        Self {
            registry,
            audit,
            decisions: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &CompatibilityRegistry {
        &self.registry
    }

    /// Decide whether `doc` may execute.
    ///
    /// Returns `Err` only for infrastructure faults (poisoned locks, audit
    /// append failure); every policy outcome is an [`AdmissionDecision`].
    pub fn admit_for_execution(
        &self,
        doc: &DrDocument,
        token: &ProofToken,
        surface_version: &str,
        dr_version: &str,
    ) -> BridgeResult<AdmissionDecision> {
        let surface_version = normalize(surface_version);
        let dr_version = normalize(dr_version);
        let target = extract_deep(doc).ok().map(|d| d.fingerprint);

        let mut decisions = self
            .decisions
            .write()
            .map_err(|_| BridgeError::Persistence("admission lock poisoned".into()))?;
        if let Some(previous) = decisions.get(&doc.id) {
            let Some((reason, detail)) =
                previous.conflict(target, token, &surface_version, &dr_version)
            else {
                info!(document = %doc.id, decision = %previous.decision, "document already decided");
                return Ok(previous.decision);
            };
            let decision = AdmissionDecision::Rejected(reason);
            self.audit.append(AuditEvent::Admission {
                document: doc.id.clone(),
                decision,
                surface_version,
                dr_version,
                combined_fingerprint: token.combined_fingerprint,
            })?;
            warn!(document = %doc.id, %reason, %detail, "resubmission rejected");
            return Ok(decision);
        }

        let (decision, detail) = match self.evaluate(doc, token, &surface_version, &dr_version)? {
            Ok(()) => (AdmissionDecision::Accepted, String::new()),
            Err((reason, detail)) => (AdmissionDecision::Rejected(reason), detail),
        };

        self.audit.append(AuditEvent::Admission {
            document: doc.id.clone(),
            decision,
            surface_version: surface_version.clone(),
            dr_version: dr_version.clone(),
            combined_fingerprint: token.combined_fingerprint,
        })?;

        match decision {
            AdmissionDecision::Accepted => {
                info!(document = %doc.id, surface = %surface_version, dr = %dr_version, "document admitted")
            }
            AdmissionDecision::Rejected(reason) => {
                warn!(document = %doc.id, %reason, %detail, "document rejected")
            }
        }

        decisions.insert(
            doc.id.clone(),
            AdmissionRecord {
                document: doc.id.clone(),
                decision,
                surface_version,
                dr_version,
                target_fingerprint: target,
                combined_fingerprint: token.combined_fingerprint,
                detail,
                decided_at: Utc::now(),
            },
        );
        Ok(decision)
    }

    /// Run the checks. The inner `Err` is a policy rejection.
    fn evaluate(
        &self,
        doc: &DrDocument,
        token: &ProofToken,
        surface_version: &str,
        dr_version: &str,
    ) -> BridgeResult<Result<(), (RejectionReason, String)>> {
        if let Err(e) = doc.validate() {
            return Ok(Err((RejectionReason::MalformedDocument, e.to_string())));
        }

        let recomputed = match extract_deep(doc) {
            Ok(d) => d.fingerprint,
            Err(e) => return Ok(Err((RejectionReason::MalformedDocument, e.to_string()))),
        };
        if recomputed != token.target_fingerprint {
            return Ok(Err((
                RejectionReason::ProofTampered,
                format!(
                    "document digest {} does not match token target {}",
                    recomputed, token.target_fingerprint
                ),
            )));
        }
        let combined = recompute_combined(
            &token.source_fingerprint,
            &token.target_fingerprint,
            token.verdict,
        );
        if combined != token.combined_fingerprint {
            return Ok(Err((
                RejectionReason::ProofTampered,
                format!(
                    "combined fingerprint {} does not recompute (expected {})",
                    token.combined_fingerprint, combined
                ),
            )));
        }
        if token.verdict != (token.source_fingerprint == token.target_fingerprint) {
            return Ok(Err((
                RejectionReason::ProofTampered,
                "verdict disagrees with fingerprints".into(),
            )));
        }

        if !token.verdict {
            return Ok(Err((
                RejectionReason::SemanticMismatch,
                "source and target digests differ".into(),
            )));
        }

        let recorded_surface = normalize(doc.surface_version()?);
        let recorded_dr = normalize(&doc.dr_version);
        if recorded_surface != surface_version || recorded_dr != dr_version {
            return Ok(Err((
                RejectionReason::VersionIncompatible,
                format!(
                    "document records ({}, {}), admission requested for ({}, {})",
                    recorded_surface, recorded_dr, surface_version, dr_version
                ),
            )));
        }
        let snapshot = self.registry.snapshot()?;
        if !snapshot.is_compatible(surface_version, dr_version) {
            return Ok(Err((
                RejectionReason::VersionIncompatible,
                format!("({}, {}) is not registered compatible", surface_version, dr_version),
            )));
        }
        Ok(Ok(()))
    }

    pub fn state(&self, document: &DocumentId) -> AdmissionState {
        match self.decisions.read() {
            Ok(d) => d
                .get(document)
                .map(|r| AdmissionState::Decided(r.decision))
                .unwrap_or(AdmissionState::Pending),
            Err(_) => AdmissionState::Pending,
        }
    }

    pub fn record(&self, document: &DocumentId) -> Option<AdmissionRecord> {
        self.decisions.read().ok()?.get(document).cloned()
    }
}

impl std::fmt::Debug for TrustBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustBoundary")
            .field("registry_entries", &self.registry.len())
            .field("audit_entries", &self.audit.len())
            .finish()
    }
}
