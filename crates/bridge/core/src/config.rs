use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Translation engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Recorded on every structured-knowledge root.
    pub translator_version: String,
    /// DR version stamped on emitted documents.
    pub dr_version: String,
    /// Confidence for beliefs without an override.
    pub default_belief_confidence: f64,
    /// Uncertainty bound for beliefs without an override.
    pub default_belief_uncertainty: f64,
    /// Threshold recorded on every reasoning context.
    pub reasoning_confidence_threshold: f64,
    /// Confidence for parameters without a declared type.
    pub untyped_parameter_confidence: f64,
    /// Substrings marking a call target as a sensor read.
    pub sensor_markers: Vec<String>,
    /// Translation records kept for `history()`.
    pub max_tracked_records: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            translator_version: env!("CARGO_PKG_VERSION").to_string(),
            dr_version: "0.9".to_string(),
            default_belief_confidence: 0.95,
            default_belief_uncertainty: 0.05,
            reasoning_confidence_threshold: 0.5,
            untyped_parameter_confidence: 0.8,
            sensor_markers: vec!["sensor".into(), "read_".into(), "sense_".into()],
            max_tracked_records: 256,
        }
    }
}

impl BridgeConfig {
    /// Strict configuration: higher thresholds, lower trust in inferred types.
    pub fn strict() -> Self {
        Self {
            default_belief_confidence: 0.9,
            default_belief_uncertainty: 0.1,
            reasoning_confidence_threshold: 0.8,
            untyped_parameter_confidence: 0.5,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> BridgeResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BridgeError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BridgeResult<()> {
        for (field, value) in [
            ("default_belief_confidence", self.default_belief_confidence),
            ("reasoning_confidence_threshold", self.reasoning_confidence_threshold),
            ("untyped_parameter_confidence", self.untyped_parameter_confidence),
        ] {
            if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
                return Err(BridgeError::InvalidConfig(format!(
                    "{} must be in [0, 1], got {}",
                    field, value
                )));
            }
        }
        if !(self.default_belief_uncertainty.is_finite() && self.default_belief_uncertainty >= 0.0)
        {
            return Err(BridgeError::InvalidConfig(format!(
                "default_belief_uncertainty must be a non-negative bound, got {}",
                self.default_belief_uncertainty
            )));
        }
        if self.translator_version.trim().is_empty() {
            return Err(BridgeError::InvalidConfig("translator_version is empty".into()));
        }
        crate::registry::LayerVersion::parse(&self.dr_version)?;
        if self.sensor_markers.iter().any(|m| m.is_empty()) {
            return Err(BridgeError::InvalidConfig(
                "sensor markers must be non-empty".into(),
            ));
        }
        if self.max_tracked_records == 0 {
            return Err(BridgeError::InvalidConfig(
                "max_tracked_records must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Whether `target` names a sensor read.
    pub fn is_sensor(&self, target: &str) -> bool {
        self.sensor_markers.iter().any(|m| target.contains(m.as_str()))
    }
}

/// Caller-supplied confidence for reads of one external target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeliefOverride {
    pub target: String,
    pub confidence: f64,
    pub uncertainty: Option<f64>,
}

impl BeliefOverride {
    pub fn new(target: impl Into<String>, confidence: f64) -> Self {
        Self {
            target: target.into(),
            confidence,
            uncertainty: None,
        }
    }

    pub fn with_uncertainty(mut self, bound: f64) -> Self {
        self.uncertainty = Some(bound);
        self
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.target.is_empty() {
            return Err(BridgeError::InvalidConfig("override target is empty".into()));
        }
        deep_repr::Confidence::new(self.confidence)?;
        if let Some(u) = self.uncertainty {
            deep_repr::Uncertainty::new(u)?;
        }
        Ok(())
    }
}
