//! Top-level configuration bundling the planner and decision settings.
//!
//! Every field has a default, so a JSON file only needs the keys it wants
//! to override:
//!
//! ```rust
//! use ruvector_cognition::config::CognitionConfig;
//!
//! let cfg = CognitionConfig::from_json_str(r#"{ "planner": { "max_depth": 4 } }"#).unwrap();
//! assert_eq!(cfg.planner.max_depth, 4);
//! assert_eq!(cfg.planner.max_iterations, 1000);
//! ```

use crate::cognitive::decision_engine::DecisionConfig;
use crate::planning::PlannerConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Aggregated configuration for [`CognitiveCore`](crate::cognitive::CognitiveCore).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitionConfig {
    pub planner: PlannerConfig,
    pub decision: DecisionConfig,
}

impl CognitionConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject out-of-range planner and decision settings.
    pub fn validate(&self) -> Result<()> {
        if self.planner.max_iterations == 0 {
            return Err(invalid("planner.max_iterations must be positive"));
        }

        let d = &self.decision;
        if !(0.0..=1.0).contains(&d.risk_tolerance) {
            return Err(invalid(format!(
                "decision.risk_tolerance must be in [0, 1], got {}",
                d.risk_tolerance
            )));
        }
        if !(d.loss_aversion.is_finite() && d.loss_aversion > 0.0) {
            return Err(invalid("decision.loss_aversion must be positive"));
        }
        for (name, exp) in [("gain_exponent", d.gain_exponent), ("loss_exponent", d.loss_exponent)] {
            if !(exp > 0.0 && exp <= 1.0) {
                return Err(invalid(format!("decision.{name} must be in (0, 1], got {exp}")));
            }
        }
        if let Some((name, w)) = d.weights.iter().find(|(_, w)| !(w.is_finite() && **w >= 0.0)) {
            return Err(invalid(format!("decision.weights.{name} must be non-negative, got {w}")));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
