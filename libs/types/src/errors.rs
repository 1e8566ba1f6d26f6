//! Error types for marketplace operations
//!
//! One taxonomy shared by every domain operation. The gateway maps each
//! variant onto an HTTP status code.

use thiserror::Error;

/// Top-level marketplace error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Authentication failed: {0}")]
    Unauthenticated(String),
}

impl MarketError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

pub type MarketResult<T> = Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = MarketError::not_found("Ad space", "abc");
        assert_eq!(err.to_string(), "Ad space not found: abc");
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = MarketError::InvalidTransition {
            from: "APPROVED".to_string(),
            to: "REJECTED".to_string(),
        };
        assert!(err.to_string().contains("APPROVED"));
        assert!(err.to_string().contains("REJECTED"));
    }
}
