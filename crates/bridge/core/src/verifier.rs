//! Equivalence verification and proof tokens.
//!
//! The verdict is fingerprint equality. The combined fingerprint binds the
//! verdict to both input fingerprints under a fixed domain tag, so a token
//! cannot be replayed for an unrelated (source, target) pair. The issue
//! time is carried on the token but excluded from the combined fingerprint.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::{Fact, FactKind, Fingerprint, InvariantDigest};

const PROOF_TAG: &[u8] = b"layer-bridge-proof-v1:";

// ── Proof Token ────────────────────────────────────────────────────────

/// Outcome of one verification, immutable once issued.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofToken {
    pub source_fingerprint: Fingerprint,
    pub target_fingerprint: Fingerprint,
    pub combined_fingerprint: Fingerprint,
    pub verdict: bool,
    pub issued_at: DateTime<Utc>,
}

impl ProofToken {
    /// Whether the combined fingerprint recomputes from the token's own fields.
    pub fn is_consistent(&self) -> bool {
        recompute_combined(&self.source_fingerprint, &self.target_fingerprint, self.verdict)
            == self.combined_fingerprint
            && self.verdict == (self.source_fingerprint == self.target_fingerprint)
    }
}

impl std::fmt::Display for ProofToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "proof[{}] {} -> {} verdict={}",
            self.combined_fingerprint, self.source_fingerprint, self.target_fingerprint, self.verdict
        )
    }
}

/// `BLAKE3(tag ‖ source ‖ target ‖ verdict)`.
pub fn recompute_combined(source: &Fingerprint, target: &Fingerprint, verdict: bool) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(PROOF_TAG);
    hasher.update(source.as_bytes());
    hasher.update(target.as_bytes());
    hasher.update(&[verdict as u8]);
    Fingerprint(*hasher.finalize().as_bytes())
}

// ── Mismatch Report ────────────────────────────────────────────────────

/// Category of disagreement between two digests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MismatchCategory {
    /// Present in the source, absent from the target.
    MissingFact,
    /// Present in the target, absent from the source.
    ExtraFact,
    SignatureMismatch,
    SideEffectMismatch,
    ControlShapeMismatch,
}

impl MismatchCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingFact => "missing-fact",
            Self::ExtraFact => "extra-fact",
            Self::SignatureMismatch => "signature-mismatch",
            Self::SideEffectMismatch => "side-effect-mismatch",
            Self::ControlShapeMismatch => "control-shape-mismatch",
        }
    }
}

impl std::fmt::Display for MismatchCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One disagreeing fact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactDiff {
    pub category: MismatchCategory,
    pub kind: FactKind,
    pub name: String,
    pub source: Option<String>,
    pub target: Option<String>,
}

impl std::fmt::Display for FactDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}:{}", self.category, self.kind, self.name)?;
        if let (Some(s), Some(t)) = (&self.source, &self.target) {
            write!(f, " ({} vs {})", s, t)?;
        }
        Ok(())
    }
}

/// Every fact-level disagreement between a source and target digest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchReport {
    pub diffs: Vec<FactDiff>,
}

impl MismatchReport {
    /// Compare two digests fact by fact.
    pub fn between(source: &InvariantDigest, target: &InvariantDigest) -> Self {
        let group = |d: &InvariantDigest| {
            let mut map: BTreeMap<(FactKind, String), Vec<Fact>> = BTreeMap::new();
            for fact in &d.facts {
                map.entry((fact.kind, fact.name.clone()))
                    .or_default()
                    .push(fact.clone());
            }
            map
        };
        let src = group(source);
        let tgt = group(target);

        let mut diffs = Vec::new();
        for ((kind, name), s_facts) in &src {
            let Some(t_facts) = tgt.get(&(*kind, name.clone())) else {
                diffs.push(FactDiff {
                    category: MismatchCategory::MissingFact,
                    kind: *kind,
                    name: name.clone(),
                    source: None,
                    target: None,
                });
                continue;
            };
            if s_facts.len() != t_facts.len() {
                let category = if s_facts.len() > t_facts.len() {
                    MismatchCategory::MissingFact
                } else {
                    MismatchCategory::ExtraFact
                };
                diffs.push(FactDiff {
                    category,
                    kind: *kind,
                    name: name.clone(),
                    source: Some(format!("{} declarations", s_facts.len())),
                    target: Some(format!("{} declarations", t_facts.len())),
                });
                continue;
            }
            for (s, t) in s_facts.iter().zip(t_facts) {
                compare_fact(s, t, &mut diffs);
            }
        }
        for (kind, name) in tgt.keys() {
            if !src.contains_key(&(*kind, name.clone())) {
                diffs.push(FactDiff {
                    category: MismatchCategory::ExtraFact,
                    kind: *kind,
                    name: name.clone(),
                    source: None,
                    target: None,
                });
            }
        }
        Self { diffs }
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    /// Distinct categories, sorted.
    pub fn categories(&self) -> Vec<MismatchCategory> {
        let mut cats: Vec<_> = self.diffs.iter().map(|d| d.category).collect();
        cats.sort();
        cats.dedup();
        cats
    }

    pub fn has(&self, category: MismatchCategory) -> bool {
        self.diffs.iter().any(|d| d.category == category)
    }
}

fn compare_fact(s: &Fact, t: &Fact, diffs: &mut Vec<FactDiff>) {
    let mut push = |category, source: String, target: String| {
        diffs.push(FactDiff {
            category,
            kind: s.kind,
            name: s.name.clone(),
            source: Some(source),
            target: Some(target),
        })
    };
    if s.signature != t.signature {
        push(
            MismatchCategory::SignatureMismatch,
            s.signature.clone(),
            t.signature.clone(),
        );
    }
    if s.side_effects != t.side_effects {
        push(
            MismatchCategory::SideEffectMismatch,
            s.side_effects.to_string(),
            t.side_effects.to_string(),
        );
    }
    if s.control != t.control {
        push(
            MismatchCategory::ControlShapeMismatch,
            s.control.to_string(),
            t.control.to_string(),
        );
    }
}

impl std::fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.diffs.iter().map(|d| d.to_string()).collect();
        write!(f, "{} difference(s): {}", self.diffs.len(), parts.join("; "))
    }
}

// ── Verifier ───────────────────────────────────────────────────────────

/// Result of comparing two digests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verification {
    pub token: ProofToken,
    /// Present exactly when the verdict is false.
    pub mismatch: Option<MismatchReport>,
}

/// Compares invariant digests and issues proof tokens.
#[derive(Clone, Copy, Debug, Default)]
pub struct EquivalenceVerifier;

impl EquivalenceVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Verify, stamping the token with the current time.
    pub fn verify(&self, source: &InvariantDigest, target: &InvariantDigest) -> Verification {
        self.verify_at(source, target, Utc::now())
    }

    /// Verify with an explicit issue time. Fully deterministic.
    pub fn verify_at(
        &self,
        source: &InvariantDigest,
        target: &InvariantDigest,
        issued_at: DateTime<Utc>,
    ) -> Verification {
        let verdict = source.fingerprint == target.fingerprint;
        let token = ProofToken {
            source_fingerprint: source.fingerprint,
            target_fingerprint: target.fingerprint,
            combined_fingerprint: recompute_combined(&source.fingerprint, &target.fingerprint, verdict),
            verdict,
            issued_at,
        };
        let mismatch = if verdict {
            None
        } else {
            Some(MismatchReport::between(source, target))
        };
        Verification { token, mismatch }
    }
}
