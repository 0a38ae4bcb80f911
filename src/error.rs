//! Error types for shiftgrade
//!
//! Expected failures are explicit values. "Not found" is never an error:
//! stores return `Ok(None)`, `Ok(false)` or an empty list instead.

use thiserror::Error;

/// A value rejected by one of the pattern or configuration invariants
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {field} = {value}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub value: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures raised by a pattern store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("pattern {key} already exists (use update or upsert)")]
    AlreadyExists { key: String },

    #[error("pattern {key} does not exist")]
    NotFound { key: String },

    #[error("stored pattern {key} is invalid: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: ValidationError,
    },

    #[error("stored timestamp {value:?} is not RFC 3339")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Configuration could not be loaded or is out of range
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to write configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors from `PatternManager::learn`, passed through unchanged
#[derive(Debug, Error)]
pub enum LearningError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_field_and_value() {
        let err = ValidationError::new("hour", 24, "must be in 0..=23");
        assert_eq!(err.field, "hour");
        assert_eq!(err.value, "24");
        assert_eq!(err.to_string(), "invalid hour = 24: must be in 0..=23");
    }

    #[test]
    fn test_learning_error_keeps_store_key() {
        let err: LearningError = StoreError::AlreadyExists {
            key: "S001:Lobby:11:2".into(),
        }
        .into();
        assert!(err.to_string().contains("S001:Lobby:11:2"));
        assert!(matches!(err, LearningError::Store(StoreError::AlreadyExists { .. })));
    }
}
