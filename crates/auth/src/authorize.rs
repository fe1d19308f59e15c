use thiserror::Error;

use pettycash_core::{BranchId, OrganizationId, UserId};

use crate::{Membership, Permission};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub user_name: String,
    pub active_organization_id: OrganizationId,
    pub membership: Membership,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("organization mismatch")]
    OrganizationMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("forbidden: principal is restricted to another branch")]
    BranchForbidden,
}

/// Command-side authorization contract (checked before dispatch).
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Authorize a principal within its active organization.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_organization_id != principal.membership.organization_id {
        return Err(AuthzError::OrganizationMismatch);
    }

    let granted = principal
        .membership
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Check that a branch-restricted principal only touches its own branch.
///
/// Organization-wide deposits (`target == None`) are off limits to branch
/// staff as well.
pub fn authorize_branch(principal: &Principal, target: Option<BranchId>) -> Result<(), AuthzError> {
    match principal.membership.branch_id {
        None => Ok(()),
        Some(own) if target == Some(own) => Ok(()),
        Some(_) => Err(AuthzError::BranchForbidden),
    }
}
