//! Error taxonomy for timecap operations
//!
//! Every failure is returned as a value; nothing in this crate panics on bad
//! input. The pipeline fails at the first violated gate in the fixed order
//! not-found, forbidden, validation, conflict.

use thiserror::Error;

/// The main error type for timecap operations
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Target entity absent. Never reveals whether the omission was true
    /// absence or denied visibility.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Permission resolver denied the required capability on a resource path.
    /// Carries the path and the capability letter, never the grant list.
    #[error("missing capability {required} on {path}")]
    Forbidden { path: String, required: char },

    /// A field-level business rule failed.
    #[error("validation failed on {}: {message}", .fields.join(", "))]
    Validation { fields: Vec<String>, message: String },

    /// A workflow guard rejected the transition.
    #[error("entry is {current}, expected {expected}")]
    Conflict { current: String, expected: String },

    /// Storage collaborator failure. Safe to retry by the caller; never
    /// retried internally.
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound { kind, id: id.into() }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Error::Validation { fields: vec![field.to_string()], message: message.into() }
    }

    /// Machine-readable error code for transports
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "NOT_FOUND",
            Error::Forbidden { .. } => "AUTH_FORBIDDEN",
            Error::Validation { .. } => "VALIDATION_ERROR",
            Error::Conflict { .. } => "CONFLICT",
            Error::Storage(_) => "STORAGE_UNAVAILABLE",
        }
    }

    /// Whether retrying the same call may succeed without changed inputs
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}

impl From<heed::Error> for Error {
    fn from(e: heed::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

/// Result type alias for timecap operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::not_found("entry", "7").code(), "NOT_FOUND");
        assert_eq!(Error::Forbidden { path: "Project/X".into(), required: 'A' }.code(), "AUTH_FORBIDDEN");
        assert_eq!(Error::validation("standardHours", "must be >= 0").code(), "VALIDATION_ERROR");
        assert_eq!(
            Error::Conflict { current: "Approved".into(), expected: "Submitted".into() }.code(),
            "CONFLICT"
        );
        assert_eq!(Error::Storage("io".into()).code(), "STORAGE_UNAVAILABLE");
    }

    #[test]
    fn only_storage_is_transient() {
        assert!(Error::Storage("map full".into()).is_transient());
        assert!(!Error::not_found("project", "X").is_transient());
    }
}
