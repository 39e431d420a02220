//! # bridge-core
//!
//! Translation core between the surface language and the deep
//! representation (DR).
//!
//! - [`TranslationEngine`]: forward (surface → DR) and reverse (DR → surface)
//!   passes, each verified and audited
//! - [`digest`]: invariant extraction into canonical, fingerprinted fact sets
//! - [`EquivalenceVerifier`]: verdicts and proof tokens with mismatch reports
//! - [`PositionIndex`]: bidirectional surface ↔ DR node mapping
//! - [`CompatibilityRegistry`]: fail-closed (surface, DR) version matrix
//! - [`TrustBoundary`]: accept/reject gate in front of DR execution
//! - [`AuditLog`]: hash-chained, append-only record of tokens and decisions
//!
//! The proof mechanism is a consistency digest. It detects divergence and
//! corruption between artifacts; it does not provide unforgeable attestation.

#![deny(unsafe_code)]

pub mod audit;
pub mod config;
pub mod digest;
pub mod engine;
pub mod error;
pub mod forward;
pub mod position;
pub mod registry;
pub mod reverse;
pub mod trust;
pub mod verifier;

// ── Re-exports ───────────────────────────────────────────────────────

pub use audit::{AuditEntry, AuditEvent, AuditLog, InMemoryAuditLog};
pub use config::{BeliefOverride, BridgeConfig};
pub use digest::{
    extract_deep, extract_surface, ControlShape, EffectSet, Fact, FactKind, Fingerprint,
    InvariantDigest,
};
pub use engine::{
    CancellationToken, ForwardTranslation, LayerBridge, ReverseTranslation, TranslationEngine,
    TranslationRecord, TranslationStatus, TranslationSummary,
};
pub use error::{BridgeError, BridgeResult};
pub use position::{Direction, MappingOrigin, PositionIndex, PositionMapping};
pub use registry::{
    CompatibilityEntry, CompatibilityRegistry, LayerVersion, RegistrySnapshot, Revocation,
};
pub use reverse::{dropped_fields, DroppedMetadata, MetadataField};
pub use trust::{AdmissionDecision, AdmissionRecord, AdmissionState, RejectionReason, TrustBoundary};
pub use verifier::{
    recompute_combined, EquivalenceVerifier, FactDiff, MismatchCategory, MismatchReport,
    ProofToken, Verification,
};
