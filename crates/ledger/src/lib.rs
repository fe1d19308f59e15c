//! Petty cash ledger (deposits → withdrawals → spends).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns. Every
//! status and balance is derived from the recorded withdrawals and spends.

pub mod deposit;
pub mod engine;
pub mod error;
pub mod policy;
pub mod summary;
pub mod withdrawal;

pub use deposit::{
    AddSpend, Deposit, DepositCommand, DepositEvent, DepositId, DepositOpened, DepositStatus,
    DrawWithdrawal, FlagOverdueWithdrawals, OpenDeposit, RemoveSpend, SpendAdded, SpendRemoved,
    VoidWithdrawal, WithdrawalDrawn, WithdrawalMarkedOverdue, WithdrawalVoided,
};
pub use engine::{Reconciliation, Transition};
pub use error::LedgerError;
pub use policy::PolicyWindow;
pub use summary::{DepositSummary, StatusCounts};
pub use withdrawal::{Spend, SpendId, Withdrawal, WithdrawalId, WithdrawalStatus};

/// Aggregate type name used in event envelopes and store keys.
pub const DEPOSIT_AGGREGATE_TYPE: &str = "petty_cash.deposit";
