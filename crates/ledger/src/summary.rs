use serde::{Deserialize, Serialize};

use pettycash_core::Money;

use crate::deposit::{Deposit, DepositId, DepositStatus};
use crate::withdrawal::WithdrawalStatus;

/// Withdrawal counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub partially_justified: usize,
    pub justified: usize,
    pub not_closed: usize,
    pub voided: usize,
}

impl StatusCounts {
    fn record(&mut self, status: WithdrawalStatus) {
        match status {
            WithdrawalStatus::Pending => self.pending += 1,
            WithdrawalStatus::PartiallyJustified => self.partially_justified += 1,
            WithdrawalStatus::Justified => self.justified += 1,
            WithdrawalStatus::NotClosed => self.not_closed += 1,
            WithdrawalStatus::Voided => self.voided += 1,
        }
    }
}

/// Read-only reconciliation view of one deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositSummary {
    pub deposit_id: DepositId,
    pub status: DepositStatus,
    pub deposit_amount: Money,
    pub remaining_amount: Money,
    /// Σ amount given over non-voided withdrawals.
    pub total_given: Money,
    pub total_justified: Money,
    /// Given but not yet justified.
    pub outstanding: Money,
    pub withdrawals: StatusCounts,
}

impl DepositSummary {
    pub fn of(deposit: &Deposit) -> Self {
        let mut withdrawals = StatusCounts::default();
        let mut total_justified = Money::ZERO;
        let mut outstanding = Money::ZERO;

        for w in deposit.withdrawals() {
            withdrawals.record(w.status());
            if !w.is_voided() {
                total_justified += w.amount_justified();
                outstanding += w.outstanding();
            }
        }

        Self {
            deposit_id: deposit.id_typed(),
            status: deposit.status(),
            deposit_amount: deposit.deposit_amount(),
            remaining_amount: deposit.remaining_amount(),
            total_given: deposit.total_given(),
            total_justified,
            outstanding,
            withdrawals,
        }
    }
}
