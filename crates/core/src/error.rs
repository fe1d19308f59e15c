//! Domain error model.

use thiserror::Error;

/// Result type used by the core primitives.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error for the shared primitives (ids, money).
///
/// Ledger-specific failures live in `pettycash-ledger`'s `LedgerError`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
