use gsep_ledger::LedgerError;
use gsep_types::ConfigError;
use thiserror::Error;

/// Errors building or starting the engine.
///
/// Per-request outcomes are never errors; they come back as
/// [`crate::Submission`] values.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("telemetry error: {0}")]
    Telemetry(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
