use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "petty_cash.read"). The wildcard
/// `"*"` grants everything and is what the admin role resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const PETTY_CASH_READ: Permission = Permission(Cow::Borrowed("petty_cash.read"));
    pub const DEPOSIT_OPEN: Permission = Permission(Cow::Borrowed("petty_cash.deposit.open"));
    pub const WITHDRAWAL_DRAW: Permission = Permission(Cow::Borrowed("petty_cash.withdrawal.draw"));
    pub const WITHDRAWAL_VOID: Permission = Permission(Cow::Borrowed("petty_cash.withdrawal.void"));
    pub const SPEND_WRITE: Permission = Permission(Cow::Borrowed("petty_cash.spend.write"));
    pub const RECONCILE: Permission = Permission(Cow::Borrowed("petty_cash.reconcile"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
