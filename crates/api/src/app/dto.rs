use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use pettycash_core::{AggregateRoot, BranchId, Money, UserId};
use pettycash_infra::UserWithdrawal;
use pettycash_ledger::{Deposit, Withdrawal};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct OpenDepositRequest {
    pub amount: Money,
    /// Defaults to the caller's branch.
    #[serde(default)]
    pub branch_id: Option<BranchId>,
}

#[derive(Debug, Deserialize)]
pub struct DrawWithdrawalRequest {
    pub amount: Money,
    /// Recipient; defaults to the caller.
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddSpendRequest {
    pub description: String,
    pub amount: Money,
    #[serde(default)]
    pub ticket_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileRequest {
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn withdrawal_to_json(w: &Withdrawal) -> Value {
    json!({
        "id": w.id_typed().to_string(),
        "user_id": w.user_id().to_string(),
        "user_name": w.user_name(),
        "amount_given": w.amount_given(),
        "amount_justified": w.amount_justified(),
        "outstanding": w.outstanding(),
        "status": w.status().as_str(),
        "created_at": w.created_at(),
        "overdue_since": w.overdue_since(),
        "voided_at": w.voided_at(),
        "spends": w.spends(),
    })
}

pub fn deposit_to_json(d: &Deposit) -> Value {
    json!({
        "id": d.id_typed().to_string(),
        "organization_id": d.organization_id().map(|id| id.to_string()),
        "branch_id": d.branch_id().map(|id| id.to_string()),
        "status": d.status().as_str(),
        "deposit_amount": d.deposit_amount(),
        "remaining_amount": d.remaining_amount(),
        "total_given": d.total_given(),
        "created_at": d.created_at(),
        "version": d.version(),
        "withdrawals": d.withdrawals().iter().map(withdrawal_to_json).collect::<Vec<_>>(),
    })
}

pub fn user_withdrawal_to_json(uw: &UserWithdrawal) -> Value {
    let mut body = withdrawal_to_json(&uw.withdrawal);
    body["deposit_id"] = json!(uw.deposit_id.to_string());
    body
}
