//! Core types for the deep representation.
//!
//! Identifiers, node kinds, validated confidence and uncertainty values,
//! and source attribution tags.

use serde::{Deserialize, Serialize};

use crate::error::ShapeError;

// ── Identifiers ────────────────────────────────────────────────────────

/// Identifier of a DR node, unique within its document.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DrNodeId(pub String);

impl DrNodeId {
    /// `<kind>-<seq>`, the form generated during translation.
    pub fn sequential(kind: DrNodeKind, seq: u32) -> Self {
        Self(format!("{}-{}", kind.label(), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DrNodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for DrNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a DR document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dr-doc:{}", self.0)
    }
}

// ── Node Kind ──────────────────────────────────────────────────────────

/// The closed set of DR record kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrNodeKind {
    FunctionDefinition,
    Belief,
    ReasoningContext,
    Intent,
    SharedState,
    StructuredKnowledge,
}

impl DrNodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FunctionDefinition => "function",
            Self::Belief => "belief",
            Self::ReasoningContext => "reasoning",
            Self::Intent => "intent",
            Self::SharedState => "shared",
            Self::StructuredKnowledge => "knowledge",
        }
    }
}

impl std::fmt::Display for DrNodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ── Confidence ─────────────────────────────────────────────────────────

/// A confidence value in [0.0, 1.0].
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub const CERTAIN: Confidence = Confidence(1.0);

    pub fn new(value: f64) -> Result<Self, ShapeError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ShapeError::ConfidenceOutOfRange(value))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Whether this confidence meets `threshold`.
    pub fn meets(&self, threshold: Confidence) -> bool {
        self.0 >= threshold.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = ShapeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> f64 {
        c.0
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

// ── Uncertainty ────────────────────────────────────────────────────────

/// Symmetric uncertainty bound (± value) around an observed quantity.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Uncertainty(f64);

impl Uncertainty {
    pub fn new(bound: f64) -> Result<Self, ShapeError> {
        if bound.is_finite() && bound >= 0.0 {
            Ok(Self(bound))
        } else {
            Err(ShapeError::InvalidUncertainty(bound))
        }
    }

    pub fn bound(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Uncertainty {
    type Error = ShapeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Uncertainty> for f64 {
    fn from(u: Uncertainty) -> f64 {
        u.0
    }
}

impl std::fmt::Display for Uncertainty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "±{}", self.0)
    }
}

// ── Attribution ────────────────────────────────────────────────────────

/// Where the knowledge in a DR node came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribution {
    HumanContributed,
    AgentDerived,
    SensorDerived,
}

impl std::fmt::Display for Attribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HumanContributed => write!(f, "human_contributed"),
            Self::AgentDerived => write!(f, "agent_derived"),
            Self::SensorDerived => write!(f, "sensor_derived"),
        }
    }
}
