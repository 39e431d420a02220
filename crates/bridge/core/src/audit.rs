//! Append-only audit log.
//!
//! Retains every proof token and every admission decision. Entries carry a
//! sequence number and are hash-chained, so any edit or reordering of the
//! persisted log is detected by [`AuditLog::validate_chain`].

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use deep_repr::DocumentId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::digest::Fingerprint;
use crate::error::{BridgeError, BridgeResult};
use crate::position::Direction;
use crate::trust::AdmissionDecision;
use crate::verifier::ProofToken;

const ENTRY_TAG: &[u8] = b"layer-bridge-audit-v1:";

// ── Events ─────────────────────────────────────────────────────────────

/// What an audit entry records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A completed translation pass and its proof token.
    Verification {
        direction: Direction,
        document: DocumentId,
        token: ProofToken,
    },
    /// A trust-boundary decision and the version pair it was made for.
    Admission {
        document: DocumentId,
        decision: AdmissionDecision,
        surface_version: String,
        dr_version: String,
        combined_fingerprint: Fingerprint,
    },
}

/// One chained log entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: u64,
    pub prev_hash: Fingerprint,
    pub entry_hash: Fingerprint,
    pub recorded_at: DateTime<Utc>,
    pub event: AuditEvent,
}

impl AuditEntry {
    /// Hash over everything except `entry_hash` itself.
    pub fn compute_hash(&self) -> BridgeResult<Fingerprint> {
        let mut canonical = self.clone();
        canonical.entry_hash = Fingerprint::zero();
        let encoded =
            serde_json::to_vec(&canonical).map_err(|e| BridgeError::Persistence(e.to_string()))?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(ENTRY_TAG);
        hasher.update(&encoded);
        Ok(Fingerprint(*hasher.finalize().as_bytes()))
    }
}

/// Check sequence numbers, links and hashes of a run of entries.
pub fn validate_entries(entries: &[AuditEntry]) -> BridgeResult<()> {
    let mut prev = Fingerprint::zero();
    for (index, entry) in entries.iter().enumerate() {
        let expected_seq = (index + 1) as u64;
        if entry.seq != expected_seq {
            return Err(BridgeError::AuditIntegrity {
                seq: entry.seq,
                reason: format!("expected seq {}, found {}", expected_seq, entry.seq),
            });
        }
        if entry.prev_hash != prev {
            return Err(BridgeError::AuditIntegrity {
                seq: entry.seq,
                reason: "previous hash link mismatch".into(),
            });
        }
        if entry.compute_hash()? != entry.entry_hash {
            return Err(BridgeError::AuditIntegrity {
                seq: entry.seq,
                reason: "entry hash mismatch".into(),
            });
        }
        prev = entry.entry_hash;
    }
    Ok(())
}

// ── Trait ──────────────────────────────────────────────────────────────

/// Append-only store for proof tokens and admission decisions.
pub trait AuditLog: Send + Sync {
    /// Append an event, returning the chained entry.
    fn append(&self, event: AuditEvent) -> BridgeResult<AuditEntry>;

    /// All entries in append order.
    fn entries(&self) -> BridgeResult<Vec<AuditEntry>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recompute the hash chain over every entry.
    fn validate_chain(&self) -> BridgeResult<()> {
        validate_entries(&self.entries()?)
    }

    /// Tokens in the order their verifications completed.
    fn tokens(&self) -> BridgeResult<Vec<ProofToken>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter_map(|e| match e.event {
                AuditEvent::Verification { token, .. } => Some(token),
                AuditEvent::Admission { .. } => None,
            })
            .collect())
    }
}

// ── In-memory implementation ───────────────────────────────────────────

/// In-memory audit log with JSON-lines export.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// One JSON object per line, in append order.
    pub fn export_jsonl(&self) -> BridgeResult<String> {
        let mut out = String::new();
        for entry in self.entries()? {
            let line =
                serde_json::to_string(&entry).map_err(|e| BridgeError::Persistence(e.to_string()))?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    /// Load an exported log, rejecting it if the chain does not validate.
    pub fn import_jsonl(text: &str) -> BridgeResult<Self> {
        let mut entries = Vec::new();
        for (n, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(line).map_err(|e| {
                BridgeError::Persistence(format!("line {}: {}", n + 1, e))
            })?;
            entries.push(entry);
        }
        validate_entries(&entries)?;
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }
}

impl AuditLog for InMemoryAuditLog {
    fn append(&self, event: AuditEvent) -> BridgeResult<AuditEntry> {
        let mut entries = self.entries.write().map_err(|_| BridgeError::AuditIntegrity {
            seq: 0,
            reason: "audit write lock poisoned".into(),
        })?;

        let mut entry = AuditEntry {
            seq: entries.len() as u64 + 1,
            prev_hash: entries.last().map(|e| e.entry_hash).unwrap_or_else(Fingerprint::zero),
            entry_hash: Fingerprint::zero(),
            recorded_at: Utc::now(),
            event,
        };
        entry.entry_hash = entry.compute_hash()?;
        debug!(seq = entry.seq, hash = %entry.entry_hash, "audit entry appended");
        entries.push(entry.clone());
        Ok(entry)
    }

    fn entries(&self) -> BridgeResult<Vec<AuditEntry>> {
        self.entries
            .read()
            .map(|e| e.clone())
            .map_err(|_| BridgeError::AuditIntegrity {
                seq: 0,
                reason: "audit read lock poisoned".into(),
            })
    }

    fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}
