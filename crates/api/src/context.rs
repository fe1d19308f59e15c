use pettycash_auth::Role;
use pettycash_core::{BranchId, OrganizationId, UserId};

/// Organization context for a request.
///
/// Immutable and present on every protected route; taken from the verified
/// token, never from the request body.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OrganizationContext {
    organization_id: OrganizationId,
    branch_id: Option<BranchId>,
}

impl OrganizationContext {
    pub fn new(organization_id: OrganizationId, branch_id: Option<BranchId>) -> Self {
        Self {
            organization_id,
            branch_id,
        }
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    /// Branch the caller is restricted to, if any.
    pub fn branch_id(&self) -> Option<BranchId> {
        self.branch_id
    }
}

/// Principal context for a request (authenticated identity + roles).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    user_name: String,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, user_name: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            roles,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
