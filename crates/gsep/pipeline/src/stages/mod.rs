use std::time::Duration;

use gsep_types::Severity;
use serde::{Deserialize, Serialize};

use crate::error::StageError;

pub mod behavior;
pub mod context;
pub mod policy;
pub mod stability;
pub mod utility;

pub use behavior::BehaviorGateStage;
pub use context::ContextAttestationStage;
pub use policy::PolicyGateStage;
pub use stability::StabilityGateStage;
pub use utility::UtilityAuditStage;

/// Identity and failure class of a built-in stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProfile {
    pub name: String,
    pub owner: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl StageProfile {
    pub fn new(name: impl Into<String>, owner: impl Into<String>, severity: Severity) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            severity,
            timeout_ms: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Reject NaN and infinities coming from metric sources.
pub(crate) fn finite(metric: &str, value: f64) -> Result<f64, StageError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(StageError::InvalidMetric {
            metric: metric.to_string(),
            value,
        })
    }
}
