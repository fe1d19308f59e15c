//! API-side authorization guards.
//!
//! Checked before any service call, keeping the ledger and infra
//! auth-agnostic.

use pettycash_auth::{
    AuthzError, CommandAuthorization, Membership, Permission, Principal, authorize,
    authorize_branch,
};
use pettycash_core::BranchId;
use pettycash_ledger::Withdrawal;

use crate::context::{OrganizationContext, PrincipalContext};

/// Resolve the request's principal with role-derived permissions.
pub fn principal_for(organization: &OrganizationContext, principal: &PrincipalContext) -> Principal {
    Principal {
        user_id: principal.user_id(),
        user_name: principal.user_name().to_string(),
        active_organization_id: organization.organization_id(),
        membership: Membership::from_roles(
            organization.organization_id(),
            organization.branch_id(),
            principal.roles().to_vec(),
        ),
    }
}

/// Check every permission the command requires.
pub fn authorize_command<C: CommandAuthorization>(
    organization: &OrganizationContext,
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = principal_for(organization, principal);
    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }
    Ok(())
}

/// Check a single permission (reads and other non-command routes).
pub fn authorize_permission(
    organization: &OrganizationContext,
    principal: &PrincipalContext,
    required: &Permission,
) -> Result<(), AuthzError> {
    authorize(&principal_for(organization, principal), required)
}

/// Branch restriction for a deposit's branch.
pub fn authorize_deposit_branch(
    organization: &OrganizationContext,
    principal: &PrincipalContext,
    deposit_branch: Option<BranchId>,
) -> Result<(), AuthzError> {
    authorize_branch(&principal_for(organization, principal), deposit_branch)
}

/// Only the withdrawal's holder, or someone who can draw funds, may touch
/// its spends.
pub fn authorize_withdrawal_holder(
    organization: &OrganizationContext,
    principal: &PrincipalContext,
    withdrawal: &Withdrawal,
) -> Result<(), AuthzError> {
    if withdrawal.user_id() == principal.user_id() {
        return Ok(());
    }
    authorize(&principal_for(organization, principal), &Permission::WITHDRAWAL_DRAW)
}
