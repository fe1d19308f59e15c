use thiserror::Error;

use pettycash_core::Money;

use crate::deposit::DepositStatus;
use crate::withdrawal::WithdrawalId;

/// Caller errors raised by the ledger.
///
/// None of these are retryable: re-running the same operation on the same
/// snapshot fails the same way.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid amount {0}: must be greater than zero")]
    InvalidAmount(Money),

    #[error("insufficient funds: requested {requested}, remaining {remaining}")]
    InsufficientFunds { requested: Money, remaining: Money },

    #[error("deposit is not open (status: {0})")]
    DepositNotOpen(DepositStatus),

    #[error("spend of {amount} exceeds the outstanding {outstanding} of the withdrawal")]
    OverJustification { amount: Money, outstanding: Money },

    #[error("withdrawal {0} is voided")]
    WithdrawalVoided(WithdrawalId),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("organization mismatch")]
    OrganizationMismatch,

    #[error("validation failed: {0}")]
    Validation(String),
}

impl LedgerError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::DepositNotOpen(_) => "deposit_not_open",
            LedgerError::OverJustification { .. } => "over_justification",
            LedgerError::WithdrawalVoided(_) => "withdrawal_voided",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::AlreadyExists(_) => "already_exists",
            LedgerError::OrganizationMismatch => "organization_mismatch",
            LedgerError::Validation(_) => "validation_error",
        }
    }
}
