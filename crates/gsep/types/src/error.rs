use thiserror::Error;

/// Load-time configuration errors.
///
/// Any `ConfigError` is fatal: the engine refuses to start rather than run
/// against a spec it cannot fully trust.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("protocol spec must be an object mapping state names to rules")]
    NotAnObject,

    #[error("state name must not be empty")]
    EmptyStateName,

    #[error("duplicate state key: {0}")]
    DuplicateState(String),

    #[error("state {state}: rule must be an object")]
    InvalidRule { state: String },

    #[error("state {state}: field `{field}` must be a list of strings")]
    InvalidList { state: String, field: String },

    #[error("state {state}: `{field}` entry at index {index} is not a string")]
    NonStringEntry {
        state: String,
        field: String,
        index: usize,
    },

    #[error("state {state}: next state {target} is not declared")]
    UndeclaredState { state: String, target: String },

    #[error("malformed transition id: {0:?} (expected \"A -> B\")")]
    MalformedTransition(String),

    #[error("signature threshold must be at least 1, got {0}")]
    ThresholdTooLow(i64),

    #[error("signature threshold {threshold} exceeds the {roles} required roles")]
    ThresholdUnreachable { threshold: u32, roles: usize },

    #[error("exempt transition {0} is not a declared protocol edge")]
    ExemptEdgeUndeclared(String),

    #[error("finality margin must be finite and non-negative, got {0}")]
    InvalidMargin(f64),

    #[error("invalid pipeline: {0}")]
    Pipeline(String),

    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_offender() {
        let err = ConfigError::NonStringEntry {
            state: "DRAFT".into(),
            field: "allowed_commands".into(),
            index: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("DRAFT"));
        assert!(msg.contains("allowed_commands"));
        assert!(msg.contains("index 2"));
    }

    #[test]
    fn threshold_error_display() {
        let err = ConfigError::ThresholdUnreachable {
            threshold: 3,
            roles: 2,
        };
        assert_eq!(
            err.to_string(),
            "signature threshold 3 exceeds the 2 required roles"
        );
    }
}
