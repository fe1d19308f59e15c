//! Ledger engine: pure snapshot-in / snapshot-out operations.
//!
//! Each operation decides events against the given snapshot, then applies them
//! to a clone. On error the input snapshot is untouched and nothing is
//! returned, so a caller can never observe a half-applied mutation.

use chrono::{DateTime, Utc};

use pettycash_core::Aggregate;

use crate::deposit::{
    AddSpend, Deposit, DepositCommand, DepositEvent, DrawWithdrawal, FlagOverdueWithdrawals,
    OpenDeposit, RemoveSpend, VoidWithdrawal,
};
use crate::error::LedgerError;
use crate::policy::PolicyWindow;
use crate::withdrawal::WithdrawalId;

/// New snapshot plus the events that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub deposit: Deposit,
    pub events: Vec<DepositEvent>,
}

impl Transition {
    pub fn is_noop(&self) -> bool {
        self.events.is_empty()
    }
}

/// Outcome of a reconciliation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Only deposits that actually changed.
    pub updated: Vec<Transition>,
    /// Withdrawals moved to `not_closed` by this run.
    pub transitioned: Vec<WithdrawalId>,
}

/// Run any command against a snapshot.
pub fn execute(deposit: &Deposit, command: &DepositCommand) -> Result<Transition, LedgerError> {
    let events = deposit.handle(command)?;
    let mut next = deposit.clone();
    for event in &events {
        next.apply(event);
    }
    Ok(Transition {
        deposit: next,
        events,
    })
}

pub fn open_deposit(cmd: OpenDeposit) -> Result<Transition, LedgerError> {
    let empty = Deposit::empty(cmd.deposit_id);
    execute(&empty, &DepositCommand::OpenDeposit(cmd))
}

pub fn draw_withdrawal(deposit: &Deposit, cmd: DrawWithdrawal) -> Result<Transition, LedgerError> {
    execute(deposit, &DepositCommand::DrawWithdrawal(cmd))
}

pub fn add_spend(deposit: &Deposit, cmd: AddSpend) -> Result<Transition, LedgerError> {
    execute(deposit, &DepositCommand::AddSpend(cmd))
}

pub fn remove_spend(deposit: &Deposit, cmd: RemoveSpend) -> Result<Transition, LedgerError> {
    execute(deposit, &DepositCommand::RemoveSpend(cmd))
}

pub fn void_withdrawal(deposit: &Deposit, cmd: VoidWithdrawal) -> Result<Transition, LedgerError> {
    execute(deposit, &DepositCommand::VoidWithdrawal(cmd))
}

/// Flag one deposit's overdue withdrawals. Returns a no-op transition when
/// nothing is due.
pub fn flag_overdue(
    deposit: &Deposit,
    as_of: DateTime<Utc>,
    policy_window: PolicyWindow,
) -> Result<Transition, LedgerError> {
    let organization_id = deposit
        .organization_id()
        .ok_or_else(|| LedgerError::not_found(format!("deposit {}", deposit.id_typed())))?;

    execute(
        deposit,
        &DepositCommand::FlagOverdueWithdrawals(FlagOverdueWithdrawals {
            organization_id,
            as_of,
            policy_window,
        }),
    )
}

/// Batch sweep: every unjustified, non-voided withdrawal older than
/// `policy_window` at `as_of` becomes `not_closed`.
///
/// Idempotent: already-flagged withdrawals are skipped, so a second run with
/// the same `as_of` transitions nothing. Deposits that were never opened are
/// ignored.
pub fn reconcile_overdue_withdrawals(
    deposits: &[Deposit],
    as_of: DateTime<Utc>,
    policy_window: PolicyWindow,
) -> Result<Reconciliation, LedgerError> {
    let mut out = Reconciliation::default();

    for deposit in deposits.iter().filter(|d| d.is_created()) {
        let transition = flag_overdue(deposit, as_of, policy_window)?;
        if transition.is_noop() {
            continue;
        }
        out.transitioned
            .extend(transition.events.iter().filter_map(DepositEvent::withdrawal_id));
        out.updated.push(transition);
    }

    Ok(out)
}
