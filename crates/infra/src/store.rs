//! Deposit snapshot persistence.
//!
//! Snapshots are saved with a compare-and-set on the aggregate version, so two
//! writers racing on the same deposit cannot both win: the loser gets
//! `StoreError::Conflict` and must reload.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use pettycash_core::{AggregateRoot, ExpectedVersion, OrganizationId};
use pettycash_ledger::{Deposit, DepositId, WithdrawalId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("version conflict on deposit {deposit_id} (expected {expected:?}, stored {stored:?})")]
    Conflict {
        deposit_id: DepositId,
        expected: ExpectedVersion,
        stored: Option<u64>,
    },

    #[error("deposit {0} has not been opened")]
    NotCreated(DepositId),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Organization-scoped deposit persistence.
pub trait DepositStore: Send + Sync {
    fn load(
        &self,
        organization_id: OrganizationId,
        deposit_id: DepositId,
    ) -> Result<Option<Deposit>, StoreError>;

    /// Compare-and-set on `deposit.version()`: `expected` is checked against
    /// the stored version before the write.
    fn save(&self, deposit: &Deposit, expected: ExpectedVersion) -> Result<(), StoreError>;

    /// Owning deposit of a withdrawal.
    fn find_by_withdrawal(
        &self,
        organization_id: OrganizationId,
        withdrawal_id: WithdrawalId,
    ) -> Result<Option<DepositId>, StoreError>;

    fn list(&self, organization_id: OrganizationId) -> Result<Vec<Deposit>, StoreError>;
}

impl<S> DepositStore for Arc<S>
where
    S: DepositStore + ?Sized,
{
    fn load(
        &self,
        organization_id: OrganizationId,
        deposit_id: DepositId,
    ) -> Result<Option<Deposit>, StoreError> {
        (**self).load(organization_id, deposit_id)
    }

    fn save(&self, deposit: &Deposit, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).save(deposit, expected)
    }

    fn find_by_withdrawal(
        &self,
        organization_id: OrganizationId,
        withdrawal_id: WithdrawalId,
    ) -> Result<Option<DepositId>, StoreError> {
        (**self).find_by_withdrawal(organization_id, withdrawal_id)
    }

    fn list(&self, organization_id: OrganizationId) -> Result<Vec<Deposit>, StoreError> {
        (**self).list(organization_id)
    }
}

/// In-memory deposit store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryDepositStore {
    inner: RwLock<HashMap<(OrganizationId, DepositId), Deposit>>,
}

impl InMemoryDepositStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DepositStore for InMemoryDepositStore {
    fn load(
        &self,
        organization_id: OrganizationId,
        deposit_id: DepositId,
    ) -> Result<Option<Deposit>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(&(organization_id, deposit_id)).cloned())
    }

    fn save(&self, deposit: &Deposit, expected: ExpectedVersion) -> Result<(), StoreError> {
        let deposit_id = deposit.id_typed();
        let organization_id = deposit
            .organization_id()
            .ok_or(StoreError::NotCreated(deposit_id))?;

        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let key = (organization_id, deposit_id);

        let stored = map.get(&key).map(|d| d.version());
        if !expected.matches(stored) {
            return Err(StoreError::Conflict {
                deposit_id,
                expected,
                stored,
            });
        }

        map.insert(key, deposit.clone());
        Ok(())
    }

    fn find_by_withdrawal(
        &self,
        organization_id: OrganizationId,
        withdrawal_id: WithdrawalId,
    ) -> Result<Option<DepositId>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map
            .iter()
            .find(|((org, _), d)| *org == organization_id && d.contains_withdrawal(withdrawal_id))
            .map(|((_, id), _)| *id))
    }

    fn list(&self, organization_id: OrganizationId) -> Result<Vec<Deposit>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let mut out: Vec<Deposit> = map
            .iter()
            .filter_map(|((org, _), d)| (*org == organization_id).then(|| d.clone()))
            .collect();
        out.sort_by_key(|d| (d.created_at(), *d.id_typed().0.as_uuid()));
        Ok(out)
    }
}
