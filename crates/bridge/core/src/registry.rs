//! Version compatibility registry.
//!
//! Records which (surface version, DR version) pairs are certified
//! interoperable. Lookups fail closed: a pair never registered is
//! incompatible. Entries are revoked, never removed.
//!
//! Registration is administrative. A successful translation does not
//! certify its version pair.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{BridgeError, BridgeResult};

// ── Layer Version ──────────────────────────────────────────────────────

/// A validated version label such as `1.0` or `0.9-beta`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LayerVersion(String);

impl LayerVersion {
    pub fn parse(raw: &str) -> BridgeResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BridgeError::InvalidVersion("version is empty".into()));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+')))
        {
            return Err(BridgeError::InvalidVersion(format!(
                "unexpected character {:?} in {:?}",
                bad, raw
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LayerVersion {
    type Error = BridgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LayerVersion> for String {
    fn from(v: LayerVersion) -> String {
        v.0
    }
}

impl std::fmt::Display for LayerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Entries ────────────────────────────────────────────────────────────

/// One withdrawal of a pair's certification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    pub revoked_at: DateTime<Utc>,
    pub rationale: String,
}

/// Compatibility statement for one version pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityEntry {
    pub compatible: bool,
    pub rationale: String,
    pub registered_at: DateTime<Utc>,
    /// Most recent revocation. Re-registering the pair does not clear it.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Every revocation of the pair, oldest first.
    #[serde(default)]
    pub revocations: Vec<Revocation>,
}

/// Serialized form of one registry row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct RegistryRecord {
    surface: LayerVersion,
    dr: LayerVersion,
    #[serde(flatten)]
    entry: CompatibilityEntry,
}

type PairKey = (LayerVersion, LayerVersion);

// ── Snapshot ───────────────────────────────────────────────────────────

/// Read-only view of the registry at a point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    entries: BTreeMap<PairKey, CompatibilityEntry>,
}

impl RegistrySnapshot {
    /// Fail-closed lookup. Malformed versions are incompatible.
    pub fn is_compatible(&self, surface: &str, dr: &str) -> bool {
        let (Ok(s), Ok(d)) = (LayerVersion::parse(surface), LayerVersion::parse(dr)) else {
            return false;
        };
        self.entries
            .get(&(s, d))
            .is_some_and(|e| e.compatible)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Registry ───────────────────────────────────────────────────────────

/// Single-writer compatibility registry.
#[derive(Debug, Default)]
pub struct CompatibilityRegistry {
    entries: RwLock<BTreeMap<PairKey, CompatibilityEntry>>,
}

impl CompatibilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> BridgeResult<std::sync::RwLockReadGuard<'_, BTreeMap<PairKey, CompatibilityEntry>>> {
        self.entries
            .read()
            .map_err(|_| BridgeError::Persistence("registry lock poisoned".into()))
    }

    fn write(&self) -> BridgeResult<std::sync::RwLockWriteGuard<'_, BTreeMap<PairKey, CompatibilityEntry>>> {
        self.entries
            .write()
            .map_err(|_| BridgeError::Persistence("registry lock poisoned".into()))
    }

    /// Record a compatibility statement, replacing any earlier one for the
    /// pair. Revocation history carries over.
    pub fn register(
        &self,
        surface: &str,
        dr: &str,
        compatible: bool,
        rationale: impl Into<String>,
    ) -> BridgeResult<()> {
        let key = (LayerVersion::parse(surface)?, LayerVersion::parse(dr)?);
        let rationale = rationale.into();
        info!(surface = %key.0, dr = %key.1, compatible, %rationale, "compatibility registered");
        let mut entries = self.write()?;
        let (revoked_at, revocations) = entries
            .remove(&key)
            .map(|previous| (previous.revoked_at, previous.revocations))
            .unwrap_or_default();
        entries.insert(
            key,
            CompatibilityEntry {
                compatible,
                rationale,
                registered_at: Utc::now(),
                revoked_at,
                revocations,
            },
        );
        Ok(())
    }

    /// Mark a pair incompatible. The entry is kept for audit.
    pub fn revoke(&self, surface: &str, dr: &str, rationale: impl Into<String>) -> BridgeResult<()> {
        let key = (LayerVersion::parse(surface)?, LayerVersion::parse(dr)?);
        let rationale = rationale.into();
        let mut entries = self.write()?;
        let now = Utc::now();
        let entry = entries.entry(key.clone()).or_insert_with(|| CompatibilityEntry {
            compatible: false,
            rationale: String::new(),
            registered_at: now,
            revoked_at: None,
            revocations: Vec::new(),
        });
        entry.compatible = false;
        entry.rationale = rationale.clone();
        entry.revoked_at = Some(now);
        entry.revocations.push(Revocation {
            revoked_at: now,
            rationale,
        });
        warn!(surface = %key.0, dr = %key.1, "compatibility revoked");
        Ok(())
    }

    /// Fail-closed lookup.
    pub fn is_compatible(&self, surface: &str, dr: &str) -> bool {
        let (Ok(s), Ok(d)) = (LayerVersion::parse(surface), LayerVersion::parse(dr)) else {
            return false;
        };
        match self.read() {
            Ok(entries) => entries.get(&(s, d)).is_some_and(|e| e.compatible),
            Err(_) => false,
        }
    }

    pub fn entry(&self, surface: &str, dr: &str) -> BridgeResult<Option<CompatibilityEntry>> {
        let key = (LayerVersion::parse(surface)?, LayerVersion::parse(dr)?);
        Ok(self.read()?.get(&key).cloned())
    }

    /// DR versions certified for `surface`.
    pub fn compatible_targets(&self, surface: &str) -> BridgeResult<BTreeSet<LayerVersion>> {
        let s = LayerVersion::parse(surface)?;
        Ok(self
            .read()?
            .iter()
            .filter(|((sv, _), e)| *sv == s && e.compatible)
            .map(|((_, dv), _)| dv.clone())
            .collect())
    }

    pub fn snapshot(&self) -> BridgeResult<RegistrySnapshot> {
        let entries = self.read()?.clone();
        debug!(entries = entries.len(), "registry snapshot taken");
        Ok(RegistrySnapshot { entries })
    }

    pub fn len(&self) -> usize {
        self.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Persistence ────────────────────────────────────────────────────

    pub fn export_json(&self) -> BridgeResult<String> {
        let records: Vec<RegistryRecord> = self
            .read()?
            .iter()
            .map(|((surface, dr), entry)| RegistryRecord {
                surface: surface.clone(),
                dr: dr.clone(),
                entry: entry.clone(),
            })
            .collect();
        serde_json::to_string_pretty(&records).map_err(|e| BridgeError::Persistence(e.to_string()))
    }

    /// Load a registry exported with [`export_json`](Self::export_json).
    pub fn import_json(json: &str) -> BridgeResult<Self> {
        let records: Vec<RegistryRecord> =
            serde_json::from_str(json).map_err(|e| BridgeError::Persistence(e.to_string()))?;
        let mut entries = BTreeMap::new();
        for r in records {
            let key = (r.surface, r.dr);
            if entries.insert(key.clone(), r.entry).is_some() {
                return Err(BridgeError::Persistence(format!(
                    "duplicate registry entry ({}, {})",
                    key.0, key.1
                )));
            }
        }
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }
}
