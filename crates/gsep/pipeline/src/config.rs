use std::time::Duration;

use gsep_types::ConfigError;
use serde::{Deserialize, Serialize};

use crate::finality::Margin;

/// Pipeline settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum margin of certified over baseline utility.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Deadline for stages that do not declare their own.
    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: u64,
    /// Name written to every ledger entry.
    #[serde(default = "default_certifying_module")]
    pub certifying_module: String,
    /// Highest risk score the stability gate admits.
    #[serde(default = "default_max_risk")]
    pub max_risk: f64,
    /// Highest anomaly score the behavior gate admits.
    #[serde(default = "default_max_anomaly")]
    pub max_anomaly: f64,
}

fn default_epsilon() -> f64 {
    0.05
}

fn default_stage_timeout_ms() -> u64 {
    5_000
}

fn default_certifying_module() -> String {
    "gsep-finality".to_string()
}

fn default_max_risk() -> f64 {
    0.7
}

fn default_max_anomaly() -> f64 {
    0.5
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            stage_timeout_ms: default_stage_timeout_ms(),
            certifying_module: default_certifying_module(),
            max_risk: default_max_risk(),
            max_anomaly: default_max_anomaly(),
        }
    }
}

impl PipelineConfig {
    pub fn margin(&self) -> Result<Margin, ConfigError> {
        Margin::new(self.epsilon)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.margin()?;
        if self.stage_timeout_ms == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "pipeline.stage_timeout_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.certifying_module.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                key: "pipeline.certifying_module".into(),
                reason: "must not be empty".into(),
            });
        }
        for (key, value) in [
            ("pipeline.max_risk", self.max_risk),
            ("pipeline.max_anomaly", self.max_anomaly),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidSetting {
                    key: key.into(),
                    reason: format!("must be a finite, non-negative number, got {value}"),
                });
            }
        }
        Ok(())
    }
}
