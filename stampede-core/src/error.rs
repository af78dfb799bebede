//! Core error types for Stampede

use std::fmt;
use thiserror::Error;

/// Core error type shared by the engine, alerting and notification crates
#[derive(Debug, Error)]
pub enum StampedeError {
    /// Input rejected before any work started
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unknown test, alert, trigger or template ID
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Duplicate test ID
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operator or metric the evaluator does not know
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Lifecycle operation attempted in the wrong state
    #[error("{message} (test {id}, status {status})")]
    InvalidState {
        id: String,
        status: String,
        message: String,
    },

    /// Engine or client settings that cannot be used
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Stampede
pub type Result<T> = std::result::Result<T, StampedeError>;

impl StampedeError {
    pub fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        StampedeError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        StampedeError::UnsupportedOperation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StampedeError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StampedeError::Conflict(_))
    }
}

impl From<serde_json::Error> for StampedeError {
    fn from(err: serde_json::Error) -> Self {
        StampedeError::Serialization(err.to_string())
    }
}

/// Kind of entity a lookup failed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Test,
    Summary,
    Alert,
    AlertTrigger,
    AlertTemplate,
    Engine,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Test => "Test",
            EntityKind::Summary => "Test summary",
            EntityKind::Alert => "Alert",
            EntityKind::AlertTrigger => "Alert trigger",
            EntityKind::AlertTemplate => "Alert template",
            EntityKind::Engine => "Engine",
        };
        f.write_str(name)
    }
}

/// A single rejected input field. Validation stops at the first violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: String,
    pub value: String,
    pub rule: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        value: impl fmt::Display,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.to_string(),
            rule: rule.into(),
            message: message.into(),
        }
    }
}
