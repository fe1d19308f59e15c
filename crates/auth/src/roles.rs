use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role identifier used for RBAC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    /// Manages the float: opens deposits, hands out and voids withdrawals.
    pub const CASHIER: Role = Role(Cow::Borrowed("cashier"));
    /// Receives withdrawals and justifies them with receipts.
    pub const EMPLOYEE: Role = Role(Cow::Borrowed("employee"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Permissions granted by this role. Unknown roles grant nothing.
    pub fn permissions(&self) -> Vec<Permission> {
        match self.as_str() {
            "admin" => vec![Permission::WILDCARD],
            "cashier" => vec![
                Permission::PETTY_CASH_READ,
                Permission::DEPOSIT_OPEN,
                Permission::WITHDRAWAL_DRAW,
                Permission::WITHDRAWAL_VOID,
                Permission::SPEND_WRITE,
                Permission::RECONCILE,
            ],
            "employee" => vec![Permission::PETTY_CASH_READ, Permission::SPEND_WRITE],
            _ => Vec::new(),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Union of the permissions granted by `roles` (deduplicated, in order).
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut out: Vec<Permission> = Vec::new();
    for perm in roles.iter().flat_map(Role::permissions) {
        if !out.contains(&perm) {
            out.push(perm);
        }
    }
    out
}
