use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pettycash_core::{Entity, Money, UserId, impl_uuid_newtype};

use crate::policy::PolicyWindow;

/// Withdrawal identifier (unique within an organization).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WithdrawalId(Uuid);

impl_uuid_newtype!(WithdrawalId, "WithdrawalId");

/// Spend identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpendId(Uuid);

impl_uuid_newtype!(SpendId, "SpendId");

/// Justification status of a withdrawal (always derived, never stored).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    PartiallyJustified,
    Justified,
    NotClosed,
    Voided,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::PartiallyJustified => "partially_justified",
            WithdrawalStatus::Justified => "justified",
            WithdrawalStatus::NotClosed => "not_closed",
            WithdrawalStatus::Voided => "voided",
        }
    }
}

impl core::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single justified expense (immutable once recorded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spend {
    pub id: SpendId,
    pub description: String,
    pub amount: Money,
    /// Receipt reference produced by the upload step, if any.
    pub ticket_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Spend {
    type Id = SpendId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Funds handed to a user, pending justification by spends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    id: WithdrawalId,
    user_id: UserId,
    user_name: String,
    amount_given: Money,
    spends: Vec<Spend>,
    created_at: DateTime<Utc>,
    /// Set by the reconciliation sweep; cleared whenever the spends change.
    overdue_since: Option<DateTime<Utc>>,
    voided_at: Option<DateTime<Utc>>,
}

impl Withdrawal {
    pub(crate) fn new(
        id: WithdrawalId,
        user_id: UserId,
        user_name: String,
        amount_given: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            user_name,
            amount_given,
            spends: Vec::new(),
            created_at,
            overdue_since: None,
            voided_at: None,
        }
    }

    pub fn id_typed(&self) -> WithdrawalId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn amount_given(&self) -> Money {
        self.amount_given
    }

    pub fn spends(&self) -> &[Spend] {
        &self.spends
    }

    pub fn spend(&self, spend_id: SpendId) -> Option<&Spend> {
        pettycash_core::entity::find_by_id(&self.spends, &spend_id)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn overdue_since(&self) -> Option<DateTime<Utc>> {
        self.overdue_since
    }

    pub fn voided_at(&self) -> Option<DateTime<Utc>> {
        self.voided_at
    }

    pub fn is_voided(&self) -> bool {
        self.voided_at.is_some()
    }

    /// Σ of the recorded spends.
    pub fn amount_justified(&self) -> Money {
        self.spends.iter().map(|s| s.amount).sum()
    }

    /// Amount still to be justified (zero once voided).
    pub fn outstanding(&self) -> Money {
        if self.is_voided() {
            return Money::ZERO;
        }
        self.amount_given.saturating_sub(self.amount_justified())
    }

    pub fn status(&self) -> WithdrawalStatus {
        if self.is_voided() {
            return WithdrawalStatus::Voided;
        }

        let justified = self.amount_justified();
        if justified == self.amount_given {
            WithdrawalStatus::Justified
        } else if self.overdue_since.is_some() {
            WithdrawalStatus::NotClosed
        } else if justified.is_zero() {
            WithdrawalStatus::Pending
        } else {
            WithdrawalStatus::PartiallyJustified
        }
    }

    pub fn is_justified(&self) -> bool {
        self.status() == WithdrawalStatus::Justified
    }

    /// Unjustified and older than the window at `as_of`.
    pub fn is_past_window(&self, as_of: DateTime<Utc>, window: PolicyWindow) -> bool {
        !self.is_voided()
            && self.amount_justified() < self.amount_given
            && as_of.signed_duration_since(self.created_at) > window.as_duration()
    }

    pub(crate) fn record_spend(&mut self, spend: Spend) {
        self.spends.push(spend);
        self.overdue_since = None;
    }

    pub(crate) fn remove_spend(&mut self, spend_id: SpendId) {
        self.spends.retain(|s| s.id != spend_id);
        self.overdue_since = None;
    }

    pub(crate) fn mark_overdue(&mut self, at: DateTime<Utc>) {
        self.overdue_since = Some(at);
    }

    pub(crate) fn void(&mut self, at: DateTime<Utc>) {
        self.voided_at = Some(at);
    }
}

impl Entity for Withdrawal {
    type Id = WithdrawalId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn withdrawal(amount: Money, created_at: DateTime<Utc>) -> Withdrawal {
        Withdrawal::new(WithdrawalId::new(), UserId::new(), "Ana".to_string(), amount, created_at)
    }

    fn spend(amount: Money) -> Spend {
        Spend {
            id: SpendId::new(),
            description: "fuel".to_string(),
            amount,
            ticket_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn status_follows_justified_amount() {
        let mut w = withdrawal(Money::new(dec!(100)), Utc::now());
        assert_eq!(w.status(), WithdrawalStatus::Pending);

        w.record_spend(spend(Money::new(dec!(40))));
        assert_eq!(w.status(), WithdrawalStatus::PartiallyJustified);
        assert_eq!(w.outstanding(), Money::new(dec!(60)));

        w.record_spend(spend(Money::new(dec!(60))));
        assert_eq!(w.status(), WithdrawalStatus::Justified);
        assert_eq!(w.outstanding(), Money::ZERO);
    }

    #[test]
    fn overdue_flag_shows_as_not_closed_until_spends_change() {
        let mut w = withdrawal(Money::new(dec!(100)), Utc::now());
        w.mark_overdue(Utc::now());
        assert_eq!(w.status(), WithdrawalStatus::NotClosed);

        w.record_spend(spend(Money::new(dec!(10))));
        assert_eq!(w.status(), WithdrawalStatus::PartiallyJustified);
        assert!(w.overdue_since().is_none());
    }

    #[test]
    fn justified_wins_over_overdue_flag() {
        let mut w = withdrawal(Money::new(dec!(50)), Utc::now());
        w.record_spend(spend(Money::new(dec!(50))));
        w.mark_overdue(Utc::now());
        assert_eq!(w.status(), WithdrawalStatus::Justified);
    }

    #[test]
    fn past_window_is_strictly_older_than_window() {
        let now = Utc::now();
        let window = PolicyWindow::days(30).unwrap();

        let exactly = withdrawal(Money::new(dec!(5)), now - Duration::days(30));
        assert!(!exactly.is_past_window(now, window));

        let older = withdrawal(Money::new(dec!(5)), now - Duration::days(31));
        assert!(older.is_past_window(now, window));
    }

    #[test]
    fn voided_withdrawal_is_never_past_window() {
        let now = Utc::now();
        let mut w = withdrawal(Money::new(dec!(5)), now - Duration::days(90));
        w.void(now);
        assert_eq!(w.status(), WithdrawalStatus::Voided);
        assert!(!w.is_past_window(now, PolicyWindow::default()));
        assert_eq!(w.outstanding(), Money::ZERO);
    }
}
