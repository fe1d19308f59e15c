use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use pettycash_auth::permissions_for_roles;

use crate::context::{OrganizationContext, PrincipalContext};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(organization): Extension<OrganizationContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "organization_id": organization.organization_id().to_string(),
        "branch_id": organization.branch_id().map(|b| b.to_string()),
        "user_id": principal.user_id().to_string(),
        "name": principal.user_name(),
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "permissions": permissions_for_roles(principal.roles())
            .iter()
            .map(|p| p.as_str().to_string())
            .collect::<Vec<_>>(),
    }))
}
