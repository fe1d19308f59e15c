use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pettycash_core::{
    Aggregate, AggregateId, AggregateRoot, BranchId, Money, OrganizationId, UserId,
};
use pettycash_events::Event;

use crate::error::LedgerError;
use crate::policy::PolicyWindow;
use crate::withdrawal::{Spend, SpendId, Withdrawal, WithdrawalId};

/// Deposit identifier (aggregate id).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepositId(pub AggregateId);

impl DepositId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DepositId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Funding status of a deposit (always derived, never stored).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    Open,
    PendingFunding,
    Closed,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Open => "open",
            DepositStatus::PendingFunding => "pending_funding",
            DepositStatus::Closed => "closed",
        }
    }
}

impl core::fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Deposit (a cash float and everything drawn from it).
///
/// The deposit owns its withdrawals, which own their spends, so a single
/// snapshot is the consistency boundary for every ledger invariant.
/// `remaining_amount()` and `status()` are computed from the records on each
/// call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    id: DepositId,
    organization_id: Option<OrganizationId>,
    branch_id: Option<BranchId>,
    deposit_amount: Money,
    withdrawals: Vec<Withdrawal>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Deposit {
    /// Empty aggregate, not yet opened.
    pub fn empty(id: DepositId) -> Self {
        Self {
            id,
            organization_id: None,
            branch_id: None,
            deposit_amount: Money::ZERO,
            withdrawals: Vec::new(),
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> DepositId {
        self.id
    }

    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }

    pub fn branch_id(&self) -> Option<BranchId> {
        self.branch_id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn deposit_amount(&self) -> Money {
        self.deposit_amount
    }

    /// All withdrawals, voided ones included, in draw order.
    pub fn withdrawals(&self) -> &[Withdrawal] {
        &self.withdrawals
    }

    pub fn withdrawal(&self, withdrawal_id: WithdrawalId) -> Option<&Withdrawal> {
        pettycash_core::entity::find_by_id(&self.withdrawals, &withdrawal_id)
    }

    pub fn contains_withdrawal(&self, withdrawal_id: WithdrawalId) -> bool {
        self.withdrawal(withdrawal_id).is_some()
    }

    /// Withdrawals that still count against the float.
    pub fn active_withdrawals(&self) -> impl Iterator<Item = &Withdrawal> {
        self.withdrawals.iter().filter(|w| !w.is_voided())
    }

    /// Σ amount given over non-voided withdrawals.
    pub fn total_given(&self) -> Money {
        self.active_withdrawals().map(|w| w.amount_given()).sum()
    }

    pub fn remaining_amount(&self) -> Money {
        self.deposit_amount - self.total_given()
    }

    pub fn status(&self) -> DepositStatus {
        if !self.remaining_amount().is_zero() {
            return DepositStatus::Open;
        }
        if self.active_withdrawals().all(|w| w.is_justified()) {
            DepositStatus::Closed
        } else {
            DepositStatus::PendingFunding
        }
    }

    fn withdrawal_mut(&mut self, withdrawal_id: WithdrawalId) -> Option<&mut Withdrawal> {
        self.withdrawals
            .iter_mut()
            .find(|w| w.id_typed() == withdrawal_id)
    }
}

impl AggregateRoot for Deposit {
    type Id = DepositId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenDeposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenDeposit {
    pub organization_id: OrganizationId,
    pub branch_id: Option<BranchId>,
    pub deposit_id: DepositId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DrawWithdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawWithdrawal {
    pub organization_id: OrganizationId,
    pub deposit_id: DepositId,
    pub withdrawal_id: WithdrawalId,
    pub user_id: UserId,
    pub user_name: String,
    pub amount_given: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddSpend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddSpend {
    pub organization_id: OrganizationId,
    pub withdrawal_id: WithdrawalId,
    pub spend_id: SpendId,
    pub description: String,
    pub amount: Money,
    pub ticket_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveSpend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveSpend {
    pub organization_id: OrganizationId,
    pub withdrawal_id: WithdrawalId,
    pub spend_id: SpendId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: VoidWithdrawal (return untouched funds to the float).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidWithdrawal {
    pub organization_id: OrganizationId,
    pub withdrawal_id: WithdrawalId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FlagOverdueWithdrawals (one deposit's share of the sweep).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagOverdueWithdrawals {
    pub organization_id: OrganizationId,
    pub as_of: DateTime<Utc>,
    pub policy_window: PolicyWindow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositCommand {
    OpenDeposit(OpenDeposit),
    DrawWithdrawal(DrawWithdrawal),
    AddSpend(AddSpend),
    RemoveSpend(RemoveSpend),
    VoidWithdrawal(VoidWithdrawal),
    FlagOverdueWithdrawals(FlagOverdueWithdrawals),
}

/// Event: DepositOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositOpened {
    pub organization_id: OrganizationId,
    pub branch_id: Option<BranchId>,
    pub deposit_id: DepositId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WithdrawalDrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalDrawn {
    pub organization_id: OrganizationId,
    pub deposit_id: DepositId,
    pub withdrawal_id: WithdrawalId,
    pub user_id: UserId,
    pub user_name: String,
    pub amount_given: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SpendAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendAdded {
    pub organization_id: OrganizationId,
    pub deposit_id: DepositId,
    pub withdrawal_id: WithdrawalId,
    pub spend_id: SpendId,
    pub description: String,
    pub amount: Money,
    pub ticket_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SpendRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendRemoved {
    pub organization_id: OrganizationId,
    pub deposit_id: DepositId,
    pub withdrawal_id: WithdrawalId,
    pub spend_id: SpendId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WithdrawalVoided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalVoided {
    pub organization_id: OrganizationId,
    pub deposit_id: DepositId,
    pub withdrawal_id: WithdrawalId,
    pub amount_returned: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WithdrawalMarkedOverdue (`occurred_at` is the sweep's `as_of`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalMarkedOverdue {
    pub organization_id: OrganizationId,
    pub deposit_id: DepositId,
    pub withdrawal_id: WithdrawalId,
    pub outstanding: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositEvent {
    DepositOpened(DepositOpened),
    WithdrawalDrawn(WithdrawalDrawn),
    SpendAdded(SpendAdded),
    SpendRemoved(SpendRemoved),
    WithdrawalVoided(WithdrawalVoided),
    WithdrawalMarkedOverdue(WithdrawalMarkedOverdue),
}

impl DepositEvent {
    /// The withdrawal an event concerns, if any.
    pub fn withdrawal_id(&self) -> Option<WithdrawalId> {
        match self {
            DepositEvent::DepositOpened(_) => None,
            DepositEvent::WithdrawalDrawn(e) => Some(e.withdrawal_id),
            DepositEvent::SpendAdded(e) => Some(e.withdrawal_id),
            DepositEvent::SpendRemoved(e) => Some(e.withdrawal_id),
            DepositEvent::WithdrawalVoided(e) => Some(e.withdrawal_id),
            DepositEvent::WithdrawalMarkedOverdue(e) => Some(e.withdrawal_id),
        }
    }
}

impl Event for DepositEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DepositEvent::DepositOpened(_) => "petty_cash.deposit.opened",
            DepositEvent::WithdrawalDrawn(_) => "petty_cash.withdrawal.drawn",
            DepositEvent::SpendAdded(_) => "petty_cash.spend.added",
            DepositEvent::SpendRemoved(_) => "petty_cash.spend.removed",
            DepositEvent::WithdrawalVoided(_) => "petty_cash.withdrawal.voided",
            DepositEvent::WithdrawalMarkedOverdue(_) => "petty_cash.withdrawal.marked_overdue",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DepositEvent::DepositOpened(e) => e.occurred_at,
            DepositEvent::WithdrawalDrawn(e) => e.occurred_at,
            DepositEvent::SpendAdded(e) => e.occurred_at,
            DepositEvent::SpendRemoved(e) => e.occurred_at,
            DepositEvent::WithdrawalVoided(e) => e.occurred_at,
            DepositEvent::WithdrawalMarkedOverdue(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Deposit {
    type Command = DepositCommand;
    type Event = DepositEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DepositEvent::DepositOpened(e) => {
                self.id = e.deposit_id;
                self.organization_id = Some(e.organization_id);
                self.branch_id = e.branch_id;
                self.deposit_amount = e.amount;
                self.withdrawals.clear();
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            DepositEvent::WithdrawalDrawn(e) => {
                self.withdrawals.push(Withdrawal::new(
                    e.withdrawal_id,
                    e.user_id,
                    e.user_name.clone(),
                    e.amount_given,
                    e.occurred_at,
                ));
            }
            DepositEvent::SpendAdded(e) => {
                if let Some(w) = self.withdrawal_mut(e.withdrawal_id) {
                    w.record_spend(Spend {
                        id: e.spend_id,
                        description: e.description.clone(),
                        amount: e.amount,
                        ticket_url: e.ticket_url.clone(),
                        created_at: e.occurred_at,
                    });
                }
            }
            DepositEvent::SpendRemoved(e) => {
                if let Some(w) = self.withdrawal_mut(e.withdrawal_id) {
                    w.remove_spend(e.spend_id);
                }
            }
            DepositEvent::WithdrawalVoided(e) => {
                if let Some(w) = self.withdrawal_mut(e.withdrawal_id) {
                    w.void(e.occurred_at);
                }
            }
            DepositEvent::WithdrawalMarkedOverdue(e) => {
                if let Some(w) = self.withdrawal_mut(e.withdrawal_id) {
                    w.mark_overdue(e.occurred_at);
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DepositCommand::OpenDeposit(cmd) => self.handle_open(cmd),
            DepositCommand::DrawWithdrawal(cmd) => self.handle_draw(cmd),
            DepositCommand::AddSpend(cmd) => self.handle_add_spend(cmd),
            DepositCommand::RemoveSpend(cmd) => self.handle_remove_spend(cmd),
            DepositCommand::VoidWithdrawal(cmd) => self.handle_void(cmd),
            DepositCommand::FlagOverdueWithdrawals(cmd) => self.handle_flag_overdue(cmd),
        }
    }
}

impl Deposit {
    fn ensure_created(&self) -> Result<(), LedgerError> {
        if !self.created {
            return Err(LedgerError::not_found(format!("deposit {}", self.id)));
        }
        Ok(())
    }

    fn ensure_organization(&self, organization_id: OrganizationId) -> Result<(), LedgerError> {
        if self.organization_id != Some(organization_id) {
            return Err(LedgerError::OrganizationMismatch);
        }
        Ok(())
    }

    fn existing_withdrawal(&self, withdrawal_id: WithdrawalId) -> Result<&Withdrawal, LedgerError> {
        self.withdrawal(withdrawal_id)
            .ok_or_else(|| LedgerError::not_found(format!("withdrawal {withdrawal_id}")))
    }

    fn handle_open(&self, cmd: &OpenDeposit) -> Result<Vec<DepositEvent>, LedgerError> {
        if self.created {
            return Err(LedgerError::already_exists(format!("deposit {}", cmd.deposit_id)));
        }
        if !cmd.amount.is_positive() {
            return Err(LedgerError::InvalidAmount(cmd.amount));
        }

        Ok(vec![DepositEvent::DepositOpened(DepositOpened {
            organization_id: cmd.organization_id,
            branch_id: cmd.branch_id,
            deposit_id: cmd.deposit_id,
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_draw(&self, cmd: &DrawWithdrawal) -> Result<Vec<DepositEvent>, LedgerError> {
        self.ensure_created()?;
        self.ensure_organization(cmd.organization_id)?;
        if self.id != cmd.deposit_id {
            return Err(LedgerError::not_found(format!("deposit {}", cmd.deposit_id)));
        }

        if !cmd.amount_given.is_positive() {
            return Err(LedgerError::InvalidAmount(cmd.amount_given));
        }
        let user_name = cmd.user_name.trim();
        if user_name.is_empty() {
            return Err(LedgerError::validation("user_name must not be empty"));
        }
        if self.contains_withdrawal(cmd.withdrawal_id) {
            return Err(LedgerError::already_exists(format!(
                "withdrawal {}",
                cmd.withdrawal_id
            )));
        }

        let remaining = self.remaining_amount();
        if cmd.amount_given > remaining {
            return Err(LedgerError::InsufficientFunds {
                requested: cmd.amount_given,
                remaining,
            });
        }
        let status = self.status();
        if status != DepositStatus::Open {
            return Err(LedgerError::DepositNotOpen(status));
        }

        Ok(vec![DepositEvent::WithdrawalDrawn(WithdrawalDrawn {
            organization_id: cmd.organization_id,
            deposit_id: self.id,
            withdrawal_id: cmd.withdrawal_id,
            user_id: cmd.user_id,
            user_name: user_name.to_string(),
            amount_given: cmd.amount_given,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_spend(&self, cmd: &AddSpend) -> Result<Vec<DepositEvent>, LedgerError> {
        self.ensure_created()?;
        self.ensure_organization(cmd.organization_id)?;
        let withdrawal = self.existing_withdrawal(cmd.withdrawal_id)?;

        if !cmd.amount.is_positive() {
            return Err(LedgerError::InvalidAmount(cmd.amount));
        }
        let description = cmd.description.trim();
        if description.is_empty() {
            return Err(LedgerError::validation("description must not be empty"));
        }
        if withdrawal.is_voided() {
            return Err(LedgerError::WithdrawalVoided(cmd.withdrawal_id));
        }
        if withdrawal.spend(cmd.spend_id).is_some() {
            return Err(LedgerError::already_exists(format!("spend {}", cmd.spend_id)));
        }

        let outstanding = withdrawal.outstanding();
        if cmd.amount > outstanding {
            return Err(LedgerError::OverJustification {
                amount: cmd.amount,
                outstanding,
            });
        }

        let ticket_url = cmd
            .ticket_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(vec![DepositEvent::SpendAdded(SpendAdded {
            organization_id: cmd.organization_id,
            deposit_id: self.id,
            withdrawal_id: cmd.withdrawal_id,
            spend_id: cmd.spend_id,
            description: description.to_string(),
            amount: cmd.amount,
            ticket_url,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_spend(&self, cmd: &RemoveSpend) -> Result<Vec<DepositEvent>, LedgerError> {
        self.ensure_created()?;
        self.ensure_organization(cmd.organization_id)?;
        let withdrawal = self.existing_withdrawal(cmd.withdrawal_id)?;
        let spend = withdrawal
            .spend(cmd.spend_id)
            .ok_or_else(|| LedgerError::not_found(format!("spend {}", cmd.spend_id)))?;

        Ok(vec![DepositEvent::SpendRemoved(SpendRemoved {
            organization_id: cmd.organization_id,
            deposit_id: self.id,
            withdrawal_id: cmd.withdrawal_id,
            spend_id: cmd.spend_id,
            amount: spend.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_void(&self, cmd: &VoidWithdrawal) -> Result<Vec<DepositEvent>, LedgerError> {
        self.ensure_created()?;
        self.ensure_organization(cmd.organization_id)?;
        let withdrawal = self.existing_withdrawal(cmd.withdrawal_id)?;

        if withdrawal.is_voided() {
            return Err(LedgerError::WithdrawalVoided(cmd.withdrawal_id));
        }
        if !withdrawal.spends().is_empty() {
            return Err(LedgerError::validation(
                "cannot void a withdrawal with recorded spends",
            ));
        }

        Ok(vec![DepositEvent::WithdrawalVoided(WithdrawalVoided {
            organization_id: cmd.organization_id,
            deposit_id: self.id,
            withdrawal_id: cmd.withdrawal_id,
            amount_returned: withdrawal.amount_given(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_flag_overdue(
        &self,
        cmd: &FlagOverdueWithdrawals,
    ) -> Result<Vec<DepositEvent>, LedgerError> {
        self.ensure_created()?;
        self.ensure_organization(cmd.organization_id)?;

        Ok(self
            .withdrawals
            .iter()
            .filter(|w| w.overdue_since().is_none() && w.is_past_window(cmd.as_of, cmd.policy_window))
            .map(|w| {
                DepositEvent::WithdrawalMarkedOverdue(WithdrawalMarkedOverdue {
                    organization_id: cmd.organization_id,
                    deposit_id: self.id,
                    withdrawal_id: w.id_typed(),
                    outstanding: w.outstanding(),
                    occurred_at: cmd.as_of,
                })
            })
            .collect())
    }
}
