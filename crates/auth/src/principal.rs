use serde::{Deserialize, Serialize};

use pettycash_core::{BranchId, OrganizationId};

use crate::{Permission, Role};

/// A user's membership in an organization.
///
/// States *which organization* the user is acting within, which
/// roles/permissions are granted there, and, for branch staff, the single
/// branch whose deposits they may touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub organization_id: OrganizationId,
    /// `None` means organization-wide.
    pub branch_id: Option<BranchId>,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Membership {
    /// Membership whose permissions are derived from `roles`.
    pub fn from_roles(
        organization_id: OrganizationId,
        branch_id: Option<BranchId>,
        roles: Vec<Role>,
    ) -> Self {
        let permissions = crate::permissions_for_roles(&roles);
        Self {
            organization_id,
            branch_id,
            roles,
            permissions,
        }
    }
}
