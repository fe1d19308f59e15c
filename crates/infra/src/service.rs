//! Application service: the write path for petty cash.
//!
//! Every mutation follows the same cycle:
//!
//! ```text
//! load snapshot → engine op (pure) → save(ExpectedVersion::Exact(loaded)) → publish events
//! ```
//!
//! A version conflict on save means another writer got there first; the cycle
//! restarts from a fresh load, up to `max_conflict_retries` times. Ledger
//! errors are never retried. Events are published only after the snapshot is
//! saved; a publish failure is logged and the committed result still returned.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use pettycash_core::{AggregateRoot, BranchId, ExpectedVersion, OrganizationId, UserId};
use pettycash_events::{Event, EventBus, EventEnvelope};
use pettycash_ledger::{
    AddSpend, DEPOSIT_AGGREGATE_TYPE, Deposit, DepositEvent, DepositId, DepositSummary,
    DrawWithdrawal, LedgerError, OpenDeposit, PolicyWindow, RemoveSpend, Transition,
    VoidWithdrawal, Withdrawal, WithdrawalId, engine,
};

use crate::config::PettyCashConfig;
use crate::store::{DepositStore, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Still conflicting after every retry.
    #[error("deposit {0} was modified concurrently; retries exhausted")]
    Conflict(DepositId),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

/// A withdrawal together with the deposit it was drawn from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserWithdrawal {
    pub deposit_id: DepositId,
    pub withdrawal: Withdrawal,
}

pub struct PettyCashService<S, B> {
    store: S,
    bus: B,
    policy_window: PolicyWindow,
    max_conflict_retries: u32,
}

impl<S, B> PettyCashService<S, B> {
    pub fn new(store: S, bus: B, config: &PettyCashConfig) -> Self {
        Self::with_settings(store, bus, config.policy_window, config.max_conflict_retries)
    }

    pub fn with_settings(
        store: S,
        bus: B,
        policy_window: PolicyWindow,
        max_conflict_retries: u32,
    ) -> Self {
        Self {
            store,
            bus,
            policy_window,
            max_conflict_retries,
        }
    }

    pub fn policy_window(&self) -> PolicyWindow {
        self.policy_window
    }
}

impl<S, B> PettyCashService<S, B>
where
    S: DepositStore,
    B: EventBus<EventEnvelope<DepositEvent>>,
{
    #[instrument(skip(self, cmd), fields(organization = %cmd.organization_id, deposit = %cmd.deposit_id))]
    pub fn open_deposit(&self, cmd: OpenDeposit) -> Result<Deposit, ServiceError> {
        let organization_id = cmd.organization_id;
        let deposit_id = cmd.deposit_id;
        let transition = engine::open_deposit(cmd)?;

        match self.store.save(&transition.deposit, ExpectedVersion::NoRecord) {
            Ok(()) => {}
            Err(StoreError::Conflict { .. }) => {
                return Err(LedgerError::already_exists(format!("deposit {deposit_id}")).into());
            }
            Err(e) => return Err(e.into()),
        }
        self.publish(organization_id, deposit_id, 0, &transition.events);

        tracing::info!(amount = %transition.deposit.deposit_amount(), "deposit opened");
        Ok(transition.deposit)
    }

    #[instrument(skip(self, cmd), fields(organization = %cmd.organization_id, deposit = %cmd.deposit_id))]
    pub fn draw_withdrawal(&self, cmd: DrawWithdrawal) -> Result<Deposit, ServiceError> {
        let transition = self.mutate(cmd.organization_id, cmd.deposit_id, |d| {
            engine::draw_withdrawal(d, cmd.clone())
        })?;

        tracing::info!(
            withdrawal = %cmd.withdrawal_id,
            amount = %cmd.amount_given,
            remaining = %transition.deposit.remaining_amount(),
            "withdrawal drawn"
        );
        Ok(transition.deposit)
    }

    #[instrument(skip(self, cmd), fields(organization = %cmd.organization_id, withdrawal = %cmd.withdrawal_id))]
    pub fn add_spend(&self, cmd: AddSpend) -> Result<Deposit, ServiceError> {
        let deposit_id = self.owning_deposit(cmd.organization_id, cmd.withdrawal_id)?;
        let transition = self.mutate(cmd.organization_id, deposit_id, |d| {
            engine::add_spend(d, cmd.clone())
        })?;

        tracing::info!(spend = %cmd.spend_id, amount = %cmd.amount, "spend added");
        Ok(transition.deposit)
    }

    #[instrument(skip(self, cmd), fields(organization = %cmd.organization_id, withdrawal = %cmd.withdrawal_id))]
    pub fn remove_spend(&self, cmd: RemoveSpend) -> Result<Deposit, ServiceError> {
        let deposit_id = self.owning_deposit(cmd.organization_id, cmd.withdrawal_id)?;
        let transition = self.mutate(cmd.organization_id, deposit_id, |d| {
            engine::remove_spend(d, cmd.clone())
        })?;

        tracing::info!(spend = %cmd.spend_id, "spend removed");
        Ok(transition.deposit)
    }

    #[instrument(skip(self, cmd), fields(organization = %cmd.organization_id, withdrawal = %cmd.withdrawal_id))]
    pub fn void_withdrawal(&self, cmd: VoidWithdrawal) -> Result<Deposit, ServiceError> {
        let deposit_id = self.owning_deposit(cmd.organization_id, cmd.withdrawal_id)?;
        let transition = self.mutate(cmd.organization_id, deposit_id, |d| {
            engine::void_withdrawal(d, cmd.clone())
        })?;

        tracing::info!("withdrawal voided");
        Ok(transition.deposit)
    }

    /// Flag every overdue withdrawal of the organization as `not_closed`.
    ///
    /// With `branch_id` set, only deposits of that branch are swept. Returns
    /// the withdrawals transitioned by this run only.
    #[instrument(skip(self), fields(organization = %organization_id, branch = ?branch_id))]
    pub fn reconcile(
        &self,
        organization_id: OrganizationId,
        branch_id: Option<BranchId>,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<WithdrawalId>, ServiceError> {
        let window = self.policy_window;
        let mut deposits = self.store.list(organization_id)?;
        if let Some(branch_id) = branch_id {
            deposits.retain(|d| d.branch_id() == Some(branch_id));
        }
        let sweep = engine::reconcile_overdue_withdrawals(&deposits, as_of, window)?;

        let mut transitioned = Vec::with_capacity(sweep.transitioned.len());
        for transition in sweep.updated {
            let deposit_id = transition.deposit.id_typed();
            let loaded_version = transition.deposit.version() - transition.events.len() as u64;

            let committed =
                match self.commit(organization_id, loaded_version, transition) {
                    Ok(committed) => committed,
                    Err(ServiceError::Conflict(_)) => {
                        tracing::debug!(deposit = %deposit_id, "sweep raced a writer; reapplying");
                        self.mutate(organization_id, deposit_id, |d| {
                            engine::flag_overdue(d, as_of, window)
                        })?
                    }
                    Err(e) => return Err(e),
                };

            transitioned.extend(committed.events.iter().filter_map(DepositEvent::withdrawal_id));
        }

        tracing::info!(
            deposits = deposits.len(),
            transitioned = transitioned.len(),
            "reconciliation sweep finished"
        );
        Ok(transitioned)
    }

    pub fn deposit(
        &self,
        organization_id: OrganizationId,
        deposit_id: DepositId,
    ) -> Result<Deposit, ServiceError> {
        self.store
            .load(organization_id, deposit_id)?
            .ok_or_else(|| LedgerError::not_found(format!("deposit {deposit_id}")).into())
    }

    pub fn deposits(&self, organization_id: OrganizationId) -> Result<Vec<Deposit>, ServiceError> {
        Ok(self.store.list(organization_id)?)
    }

    pub fn summary(
        &self,
        organization_id: OrganizationId,
        deposit_id: DepositId,
    ) -> Result<DepositSummary, ServiceError> {
        let deposit = self.deposit(organization_id, deposit_id)?;
        Ok(DepositSummary::of(&deposit))
    }

    /// Deposit holding `withdrawal_id`.
    pub fn deposit_of_withdrawal(
        &self,
        organization_id: OrganizationId,
        withdrawal_id: WithdrawalId,
    ) -> Result<Deposit, ServiceError> {
        let deposit_id = self.owning_deposit(organization_id, withdrawal_id)?;
        self.deposit(organization_id, deposit_id)
    }

    /// Every withdrawal drawn to `user_id`, oldest first.
    pub fn withdrawals_for_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Vec<UserWithdrawal>, ServiceError> {
        let mut out: Vec<UserWithdrawal> = self
            .store
            .list(organization_id)?
            .into_iter()
            .flat_map(|deposit| {
                let deposit_id = deposit.id_typed();
                deposit
                    .withdrawals()
                    .iter()
                    .filter(|w| w.user_id() == user_id)
                    .map(|w| UserWithdrawal {
                        deposit_id,
                        withdrawal: w.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        out.sort_by_key(|uw| uw.withdrawal.created_at());
        Ok(out)
    }

    fn owning_deposit(
        &self,
        organization_id: OrganizationId,
        withdrawal_id: WithdrawalId,
    ) -> Result<DepositId, ServiceError> {
        self.store
            .find_by_withdrawal(organization_id, withdrawal_id)?
            .ok_or_else(|| LedgerError::not_found(format!("withdrawal {withdrawal_id}")).into())
    }

    /// Load → decide → compare-and-set, restarting on version conflicts.
    fn mutate(
        &self,
        organization_id: OrganizationId,
        deposit_id: DepositId,
        op: impl Fn(&Deposit) -> Result<Transition, LedgerError>,
    ) -> Result<Transition, ServiceError> {
        for attempt in 0..=self.max_conflict_retries {
            let deposit = self.deposit(organization_id, deposit_id)?;
            let transition = op(&deposit)?;
            if transition.is_noop() {
                return Ok(transition);
            }

            match self.commit(organization_id, deposit.version(), transition) {
                Err(ServiceError::Conflict(_)) => {
                    tracing::warn!(deposit = %deposit_id, attempt, "version conflict; reloading");
                }
                other => return other,
            }
        }

        Err(ServiceError::Conflict(deposit_id))
    }

    /// Save `transition` if the stored deposit is still at `loaded_version`,
    /// then publish its events.
    fn commit(
        &self,
        organization_id: OrganizationId,
        loaded_version: u64,
        transition: Transition,
    ) -> Result<Transition, ServiceError> {
        let deposit_id = transition.deposit.id_typed();
        match self
            .store
            .save(&transition.deposit, ExpectedVersion::Exact(loaded_version))
        {
            Ok(()) => {}
            Err(StoreError::Conflict { .. }) => return Err(ServiceError::Conflict(deposit_id)),
            Err(e) => return Err(e.into()),
        }

        self.publish(organization_id, deposit_id, loaded_version, &transition.events);
        Ok(transition)
    }

    /// Runs after the save: a failure here cannot undo the commit, so it is
    /// logged instead of returned.
    fn publish(
        &self,
        organization_id: OrganizationId,
        deposit_id: DepositId,
        loaded_version: u64,
        events: &[DepositEvent],
    ) {
        for (offset, event) in events.iter().enumerate() {
            let envelope = EventEnvelope::wrap(
                organization_id,
                deposit_id.0,
                DEPOSIT_AGGREGATE_TYPE,
                loaded_version + offset as u64 + 1,
                event.clone(),
            );
            if let Err(e) = self.bus.publish(envelope) {
                tracing::error!(
                    deposit = %deposit_id,
                    event_type = event.event_type(),
                    error = ?e,
                    "event publication failed after commit"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::Duration;
    use pettycash_core::{AggregateId, Money};
    use pettycash_events::{InMemoryEventBus, Subscription};
    use pettycash_ledger::{DepositStatus, SpendId, WithdrawalStatus};
    use rust_decimal_macros::dec;

    use crate::store::InMemoryDepositStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<DepositEvent>>>;

    /// Wraps the in-memory store and rejects the next `n` saves as stale.
    #[derive(Default)]
    struct ContendedStore {
        inner: InMemoryDepositStore,
        conflicts_left: AtomicU32,
    }

    impl ContendedStore {
        fn conflict_next(&self, n: u32) {
            self.conflicts_left.store(n, Ordering::SeqCst);
        }
    }

    impl DepositStore for ContendedStore {
        fn load(
            &self,
            organization_id: OrganizationId,
            deposit_id: DepositId,
        ) -> Result<Option<Deposit>, StoreError> {
            self.inner.load(organization_id, deposit_id)
        }

        fn save(&self, deposit: &Deposit, expected: ExpectedVersion) -> Result<(), StoreError> {
            let left = self.conflicts_left.load(Ordering::SeqCst);
            if left > 0 {
                self.conflicts_left.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Conflict {
                    deposit_id: deposit.id_typed(),
                    expected,
                    stored: None,
                });
            }
            self.inner.save(deposit, expected)
        }

        fn find_by_withdrawal(
            &self,
            organization_id: OrganizationId,
            withdrawal_id: WithdrawalId,
        ) -> Result<Option<DepositId>, StoreError> {
            self.inner.find_by_withdrawal(organization_id, withdrawal_id)
        }

        fn list(&self, organization_id: OrganizationId) -> Result<Vec<Deposit>, StoreError> {
            self.inner.list(organization_id)
        }
    }

    fn service() -> (PettyCashService<Arc<ContendedStore>, Bus>, Arc<ContendedStore>, Bus) {
        let store = Arc::new(ContendedStore::default());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let service = PettyCashService::with_settings(
            store.clone(),
            bus.clone(),
            PolicyWindow::default(),
            3,
        );
        (service, store, bus)
    }

    fn open(
        service: &PettyCashService<Arc<ContendedStore>, Bus>,
        organization_id: OrganizationId,
        amount: Money,
        at: DateTime<Utc>,
    ) -> DepositId {
        let deposit_id = DepositId::new(AggregateId::new());
        service
            .open_deposit(OpenDeposit {
                organization_id,
                branch_id: None,
                deposit_id,
                amount,
                occurred_at: at,
            })
            .unwrap();
        deposit_id
    }

    fn draw_cmd(
        organization_id: OrganizationId,
        deposit_id: DepositId,
        user_id: UserId,
        amount: Money,
        at: DateTime<Utc>,
    ) -> DrawWithdrawal {
        DrawWithdrawal {
            organization_id,
            deposit_id,
            withdrawal_id: WithdrawalId::new(),
            user_id,
            user_name: "Marta".to_string(),
            amount_given: amount,
            occurred_at: at,
        }
    }

    fn spend_cmd(organization_id: OrganizationId, withdrawal_id: WithdrawalId, amount: Money) -> AddSpend {
        AddSpend {
            organization_id,
            withdrawal_id,
            spend_id: SpendId::new(),
            description: "taxi".to_string(),
            amount,
            ticket_url: Some("https://receipts.example/1.jpg".to_string()),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn full_cycle_closes_the_deposit_and_publishes_in_order() {
        let (service, _store, bus) = service();
        let sub = bus.subscribe();
        let org = OrganizationId::new();
        let now = Utc::now();

        let deposit_id = open(&service, org, Money::new(dec!(10000)), now);

        let a = draw_cmd(org, deposit_id, UserId::new(), Money::new(dec!(4000)), now);
        let deposit = service.draw_withdrawal(a.clone()).unwrap();
        assert_eq!(deposit.remaining_amount(), Money::new(dec!(6000)));
        assert_eq!(deposit.status(), DepositStatus::Open);
        service.add_spend(spend_cmd(org, a.withdrawal_id, Money::new(dec!(4000)))).unwrap();

        let b = draw_cmd(org, deposit_id, UserId::new(), Money::new(dec!(6000)), now);
        let deposit = service.draw_withdrawal(b.clone()).unwrap();
        assert_eq!(deposit.status(), DepositStatus::PendingFunding);

        let deposit = service
            .add_spend(spend_cmd(org, b.withdrawal_id, Money::new(dec!(6000))))
            .unwrap();
        assert_eq!(deposit.status(), DepositStatus::Closed);

        let published = sub.drain();
        let versions: Vec<u64> = published.iter().map(|e| e.version()).collect();
        assert_eq!(versions, vec![1, 2, 3, 4, 5]);
        assert!(published.iter().all(|e| e.organization_id() == org));
        assert_eq!(published[0].event_type(), "petty_cash.deposit.opened");
        assert_eq!(published[4].event_type(), "petty_cash.spend.added");
        assert_eq!(bus.journal(), published);
    }

    #[test]
    fn opening_the_same_deposit_twice_is_already_exists() {
        let (service, _store, _bus) = service();
        let org = OrganizationId::new();
        let deposit_id = open(&service, org, Money::new(dec!(10)), Utc::now());

        let err = service
            .open_deposit(OpenDeposit {
                organization_id: org,
                branch_id: None,
                deposit_id,
                amount: Money::new(dec!(10)),
                occurred_at: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::Ledger(LedgerError::AlreadyExists(_))));
    }

    #[test]
    fn transient_conflicts_are_retried() {
        let (service, store, _bus) = service();
        let org = OrganizationId::new();
        let deposit_id = open(&service, org, Money::new(dec!(100)), Utc::now());

        store.conflict_next(2);
        let deposit = service
            .draw_withdrawal(draw_cmd(org, deposit_id, UserId::new(), Money::new(dec!(30)), Utc::now()))
            .unwrap();

        assert_eq!(deposit.remaining_amount(), Money::new(dec!(70)));
        assert_eq!(service.deposit(org, deposit_id).unwrap(), deposit);
    }

    #[test]
    fn persistent_conflicts_surface_after_retries() {
        let (service, store, bus) = service();
        let org = OrganizationId::new();
        let deposit_id = open(&service, org, Money::new(dec!(100)), Utc::now());
        let sub = bus.subscribe();

        store.conflict_next(4);
        let err = service
            .draw_withdrawal(draw_cmd(org, deposit_id, UserId::new(), Money::new(dec!(30)), Utc::now()))
            .unwrap_err();

        assert!(matches!(err, ServiceError::Conflict(id) if id == deposit_id));
        assert!(sub.drain().is_empty());
        assert_eq!(
            service.deposit(org, deposit_id).unwrap().remaining_amount(),
            Money::new(dec!(100))
        );
    }

    #[test]
    fn ledger_errors_are_not_retried_and_leave_state_untouched() {
        let (service, _store, _bus) = service();
        let org = OrganizationId::new();
        let deposit_id = open(&service, org, Money::new(dec!(100)), Utc::now());
        let before = service.deposit(org, deposit_id).unwrap();

        let err = service
            .draw_withdrawal(draw_cmd(org, deposit_id, UserId::new(), Money::new(dec!(101)), Utc::now()))
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Ledger(LedgerError::InsufficientFunds { .. })
        ));
        assert_eq!(service.deposit(org, deposit_id).unwrap(), before);
    }

    #[test]
    fn spend_on_unknown_withdrawal_is_not_found() {
        let (service, _store, _bus) = service();
        let err = service
            .add_spend(spend_cmd(OrganizationId::new(), WithdrawalId::new(), Money::new(dec!(1))))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Ledger(LedgerError::NotFound(_))));
    }

    #[test]
    fn reconcile_flags_once_and_reports_only_new_transitions() {
        let (service, _store, _bus) = service();
        let org = OrganizationId::new();
        let long_ago = Utc::now() - Duration::days(40);

        let deposit_id = open(&service, org, Money::new(dec!(1000)), long_ago);
        let stale = draw_cmd(org, deposit_id, UserId::new(), Money::new(dec!(500)), long_ago);
        service.draw_withdrawal(stale.clone()).unwrap();
        let fresh = draw_cmd(org, deposit_id, UserId::new(), Money::new(dec!(100)), Utc::now());
        service.draw_withdrawal(fresh.clone()).unwrap();

        let as_of = Utc::now();
        assert_eq!(service.reconcile(org, None, as_of).unwrap(), vec![stale.withdrawal_id]);
        assert!(service.reconcile(org, None, as_of).unwrap().is_empty());

        let deposit = service.deposit(org, deposit_id).unwrap();
        assert_eq!(
            deposit.withdrawal(stale.withdrawal_id).unwrap().status(),
            WithdrawalStatus::NotClosed
        );
        assert_eq!(
            deposit.withdrawal(fresh.withdrawal_id).unwrap().status(),
            WithdrawalStatus::Pending
        );
    }

    #[test]
    fn reconcile_reapplies_after_a_conflict() {
        let (service, store, _bus) = service();
        let org = OrganizationId::new();
        let long_ago = Utc::now() - Duration::days(40);

        let deposit_id = open(&service, org, Money::new(dec!(1000)), long_ago);
        let stale = draw_cmd(org, deposit_id, UserId::new(), Money::new(dec!(500)), long_ago);
        service.draw_withdrawal(stale.clone()).unwrap();

        store.conflict_next(1);
        assert_eq!(service.reconcile(org, None, Utc::now()).unwrap(), vec![stale.withdrawal_id]);
    }

    #[test]
    fn withdrawals_for_user_spans_deposits() {
        let (service, _store, _bus) = service();
        let org = OrganizationId::new();
        let user = UserId::new();
        let now = Utc::now();

        let first = open(&service, org, Money::new(dec!(100)), now);
        let second = open(&service, org, Money::new(dec!(100)), now);
        service.draw_withdrawal(draw_cmd(org, first, user, Money::new(dec!(10)), now)).unwrap();
        service
            .draw_withdrawal(draw_cmd(org, second, user, Money::new(dec!(20)), now + Duration::seconds(1)))
            .unwrap();
        service
            .draw_withdrawal(draw_cmd(org, second, UserId::new(), Money::new(dec!(30)), now))
            .unwrap();

        let mine = service.withdrawals_for_user(org, user).unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].deposit_id, first);
        assert_eq!(mine[1].withdrawal.amount_given(), Money::new(dec!(20)));
        assert!(service.withdrawals_for_user(OrganizationId::new(), user).unwrap().is_empty());
    }

    #[test]
    fn reconcile_scoped_to_a_branch_leaves_other_branches_alone() {
        let (service, _store, _bus) = service();
        let org = OrganizationId::new();
        let long_ago = Utc::now() - Duration::days(40);
        let (north, south) = (BranchId::new(), BranchId::new());

        let mut stale = Vec::new();
        for branch_id in [north, south] {
            let deposit_id = DepositId::new(AggregateId::new());
            service
                .open_deposit(OpenDeposit {
                    organization_id: org,
                    branch_id: Some(branch_id),
                    deposit_id,
                    amount: Money::new(dec!(1000)),
                    occurred_at: long_ago,
                })
                .unwrap();
            let draw = draw_cmd(org, deposit_id, UserId::new(), Money::new(dec!(500)), long_ago);
            service.draw_withdrawal(draw.clone()).unwrap();
            stale.push((deposit_id, draw.withdrawal_id));
        }

        let as_of = Utc::now();
        assert_eq!(service.reconcile(org, Some(south), as_of).unwrap(), vec![stale[1].1]);

        let (north_deposit, north_withdrawal) = stale[0];
        let untouched = service.deposit(org, north_deposit).unwrap();
        assert_eq!(
            untouched.withdrawal(north_withdrawal).unwrap().status(),
            WithdrawalStatus::Pending
        );

        assert_eq!(service.reconcile(org, None, as_of).unwrap(), vec![north_withdrawal]);
    }

    struct RefusingBus;

    impl EventBus<EventEnvelope<DepositEvent>> for RefusingBus {
        type Error = &'static str;

        fn publish(&self, _message: EventEnvelope<DepositEvent>) -> Result<(), Self::Error> {
            Err("bus offline")
        }

        fn subscribe(&self) -> Subscription<EventEnvelope<DepositEvent>> {
            Subscription::new(std::sync::mpsc::channel().1)
        }
    }

    #[test]
    fn publish_failure_does_not_fail_a_committed_mutation() {
        let store = Arc::new(InMemoryDepositStore::new());
        let service = PettyCashService::with_settings(
            store.clone(),
            RefusingBus,
            PolicyWindow::default(),
            3,
        );
        let org = OrganizationId::new();
        let deposit_id = DepositId::new(AggregateId::new());

        service
            .open_deposit(OpenDeposit {
                organization_id: org,
                branch_id: None,
                deposit_id,
                amount: Money::new(dec!(100)),
                occurred_at: Utc::now(),
            })
            .unwrap();
        let deposit = service
            .draw_withdrawal(draw_cmd(org, deposit_id, UserId::new(), Money::new(dec!(40)), Utc::now()))
            .unwrap();

        assert_eq!(deposit.remaining_amount(), Money::new(dec!(60)));
        let stored = store.load(org, deposit_id).unwrap().unwrap();
        assert_eq!(stored.version(), 2);
        assert_eq!(stored.withdrawals().len(), 1);
    }
}
