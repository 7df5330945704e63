//! Layered engine configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional file
//! (any format the `config` crate recognises by extension) and `GSEP_*`
//! environment variables. Nested keys use a double underscore, e.g.
//! `GSEP_PIPELINE__EPSILON=0.1` or `GSEP_LEDGER__JOURNAL_PATH=/var/lib/gsep/audit.jsonl`.

use std::path::{Path, PathBuf};

use gsep_pipeline::PipelineConfig;
use gsep_protocol::AuthorizationConfig;
use gsep_types::ConfigError;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;

/// Main engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// JSON file holding the protocol state map
    #[serde(default = "default_protocol_path")]
    pub protocol_path: PathBuf,

    #[serde(default)]
    pub authorization: AuthorizationConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            protocol_path: default_protocol_path(),
            authorization: AuthorizationConfig::default(),
            pipeline: PipelineConfig::default(),
            ledger: LedgerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Audit ledger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Append-only JSON Lines journal. Memory only when unset.
    #[serde(default)]
    pub journal_path: Option<PathBuf>,

    /// Key material for record seals. An ephemeral key is generated when
    /// unset, so seals do not survive a restart.
    #[serde(default)]
    pub seal_key: Option<String>,

    /// Identifier written next to every seal
    #[serde(default = "default_sealer_id")]
    pub sealer_id: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            journal_path: None,
            seal_key: None,
            sealer_id: default_sealer_id(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_protocol_path() -> PathBuf {
    PathBuf::from("protocol.json")
}

fn default_sealer_id() -> String {
    "gsep-ledger".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Load and validate configuration.
    pub fn load(path: Option<&Path>) -> EngineResult<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&EngineConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("GSEP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("authorization.required_roles")
                .with_list_parse_key("authorization.exempt_transitions"),
        );

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidSetting {
                key: "protocol_path".into(),
                reason: "must not be empty".into(),
            });
        }
        self.pipeline.validate()?;
        if self.ledger.sealer_id.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                key: "ledger.sealer_id".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.ledger.seal_key.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::InvalidSetting {
                key: "ledger.seal_key".into(),
                reason: "must not be empty when set".into(),
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                key: "logging.level".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.protocol_path, PathBuf::from("protocol.json"));
        assert_eq!(config.authorization.minimum_signature_threshold, 1);
        assert_eq!(config.pipeline.epsilon, 0.05);
        assert!(config.ledger.journal_path.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn empty_sealer_id_rejected() {
        let mut config = EngineConfig::default();
        config.ledger.sealer_id = " ".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSetting { key, .. }) if key == "ledger.sealer_id"
        ));
    }

    #[test]
    fn negative_epsilon_rejected() {
        let mut config = EngineConfig::default();
        config.pipeline.epsilon = -0.5;
        assert_eq!(config.validate(), Err(ConfigError::InvalidMargin(-0.5)));
    }
}
