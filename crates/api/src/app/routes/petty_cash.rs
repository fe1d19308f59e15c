use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::Utc;
use serde_json::{Value, json};

use pettycash_auth::Permission;
use pettycash_core::AggregateId;
use pettycash_ledger::{
    AddSpend, DepositId, DepositSummary, DrawWithdrawal, OpenDeposit, RemoveSpend, SpendId,
    VoidWithdrawal, WithdrawalId,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{OrganizationContext, PrincipalContext};

pub fn router() -> Router {
    Router::new()
        .route("/deposits", get(list_deposits).post(open_deposit))
        .route("/deposits/:id", get(get_deposit))
        .route("/deposits/:id/summary", get(get_summary))
        .route("/deposits/:id/withdrawals", post(draw_withdrawal))
        .route("/withdrawals/:id/spends", post(add_spend))
        .route("/withdrawals/:id/spends/:spend_id", delete(remove_spend))
        .route("/withdrawals/:id/void", post(void_withdrawal))
        .route("/me/withdrawals", get(my_withdrawals))
        .route("/reconcile", post(reconcile))
}

pub async fn list_deposits(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(organization): Extension<OrganizationContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(e) = authz::authorize_permission(&organization, &principal, &Permission::PETTY_CASH_READ) {
        return errors::authz_error_to_response(e);
    }

    let deposits = match services.deposits(organization.organization_id()) {
        Ok(d) => d,
        Err(e) => return errors::service_error_to_response(e),
    };

    // Branch staff only see their own branch.
    let visible: Vec<Value> = deposits
        .iter()
        .filter(|d| organization.branch_id().is_none() || d.branch_id() == organization.branch_id())
        .map(dto::deposit_to_json)
        .collect();

    (StatusCode::OK, Json(visible)).into_response()
}

pub async fn open_deposit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(organization): Extension<OrganizationContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::OpenDepositRequest>,
) -> Response {
    let branch_id = body.branch_id.or(organization.branch_id());

    let cmd_auth = CmdAuth::new(
        OpenDeposit {
            organization_id: organization.organization_id(),
            branch_id,
            deposit_id: DepositId::new(AggregateId::new()),
            amount: body.amount,
            occurred_at: Utc::now(),
        },
        Permission::DEPOSIT_OPEN,
    );

    if let Err(e) = authz::authorize_command(&organization, &principal, &cmd_auth) {
        return errors::authz_error_to_response(e);
    }
    if let Err(e) = authz::authorize_deposit_branch(&organization, &principal, branch_id) {
        return errors::authz_error_to_response(e);
    }

    match services.open_deposit(cmd_auth.inner) {
        Ok(deposit) => (StatusCode::CREATED, Json(dto::deposit_to_json(&deposit))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_deposit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(organization): Extension<OrganizationContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let deposit_id = match parse_deposit_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    if let Err(e) = authz::authorize_permission(&organization, &principal, &Permission::PETTY_CASH_READ) {
        return errors::authz_error_to_response(e);
    }

    let deposit = match services.deposit(organization.organization_id(), deposit_id) {
        Ok(d) => d,
        Err(e) => return errors::service_error_to_response(e),
    };
    if let Err(e) = authz::authorize_deposit_branch(&organization, &principal, deposit.branch_id()) {
        return errors::authz_error_to_response(e);
    }

    (StatusCode::OK, Json(dto::deposit_to_json(&deposit))).into_response()
}

pub async fn get_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(organization): Extension<OrganizationContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let deposit_id = match parse_deposit_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    if let Err(e) = authz::authorize_permission(&organization, &principal, &Permission::PETTY_CASH_READ) {
        return errors::authz_error_to_response(e);
    }

    let deposit = match services.deposit(organization.organization_id(), deposit_id) {
        Ok(d) => d,
        Err(e) => return errors::service_error_to_response(e),
    };
    if let Err(e) = authz::authorize_deposit_branch(&organization, &principal, deposit.branch_id()) {
        return errors::authz_error_to_response(e);
    }

    (StatusCode::OK, Json(DepositSummary::of(&deposit))).into_response()
}

pub async fn draw_withdrawal(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(organization): Extension<OrganizationContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::DrawWithdrawalRequest>,
) -> Response {
    let deposit_id = match parse_deposit_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let (user_id, user_name) = match (body.user_id, body.user_name) {
        (None, name) => (
            principal.user_id(),
            name.unwrap_or_else(|| principal.user_name().to_string()),
        ),
        (Some(user_id), Some(name)) => (user_id, name),
        (Some(user_id), None) if user_id == principal.user_id() => {
            (user_id, principal.user_name().to_string())
        }
        (Some(_), None) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "user_name is required when drawing for another user",
            );
        }
    };

    let withdrawal_id = WithdrawalId::new();
    let cmd_auth = CmdAuth::new(
        DrawWithdrawal {
            organization_id: organization.organization_id(),
            deposit_id,
            withdrawal_id,
            user_id,
            user_name,
            amount_given: body.amount,
            occurred_at: Utc::now(),
        },
        Permission::WITHDRAWAL_DRAW,
    );

    if let Err(e) = authz::authorize_command(&organization, &principal, &cmd_auth) {
        return errors::authz_error_to_response(e);
    }

    let current = match services.deposit(organization.organization_id(), deposit_id) {
        Ok(d) => d,
        Err(e) => return errors::service_error_to_response(e),
    };
    if let Err(e) = authz::authorize_deposit_branch(&organization, &principal, current.branch_id()) {
        return errors::authz_error_to_response(e);
    }

    match services.draw_withdrawal(cmd_auth.inner) {
        Ok(deposit) => (
            StatusCode::CREATED,
            Json(json!({
                "withdrawal": withdrawal_json(&deposit, withdrawal_id),
                "deposit": dto::deposit_to_json(&deposit),
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn add_spend(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(organization): Extension<OrganizationContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddSpendRequest>,
) -> Response {
    let withdrawal_id = match parse_withdrawal_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let spend_id = SpendId::new();
    let cmd_auth = CmdAuth::new(
        AddSpend {
            organization_id: organization.organization_id(),
            withdrawal_id,
            spend_id,
            description: body.description,
            amount: body.amount,
            ticket_url: body.ticket_url,
            occurred_at: Utc::now(),
        },
        Permission::SPEND_WRITE,
    );

    if let Err(e) = authz::authorize_command(&organization, &principal, &cmd_auth) {
        return errors::authz_error_to_response(e);
    }
    if let Err(res) = guard_withdrawal(&services, &organization, &principal, withdrawal_id) {
        return res;
    }

    match services.add_spend(cmd_auth.inner) {
        Ok(deposit) => (
            StatusCode::CREATED,
            Json(json!({
                "spend_id": spend_id.to_string(),
                "withdrawal": withdrawal_json(&deposit, withdrawal_id),
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn remove_spend(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(organization): Extension<OrganizationContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, spend_id)): Path<(String, String)>,
) -> Response {
    let withdrawal_id = match parse_withdrawal_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let spend_id: SpendId = match spend_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("spend"),
    };

    let cmd_auth = CmdAuth::new(
        RemoveSpend {
            organization_id: organization.organization_id(),
            withdrawal_id,
            spend_id,
            occurred_at: Utc::now(),
        },
        Permission::SPEND_WRITE,
    );

    if let Err(e) = authz::authorize_command(&organization, &principal, &cmd_auth) {
        return errors::authz_error_to_response(e);
    }
    if let Err(res) = guard_withdrawal(&services, &organization, &principal, withdrawal_id) {
        return res;
    }

    match services.remove_spend(cmd_auth.inner) {
        Ok(deposit) => (StatusCode::OK, Json(withdrawal_json(&deposit, withdrawal_id))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn void_withdrawal(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(organization): Extension<OrganizationContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let withdrawal_id = match parse_withdrawal_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let cmd_auth = CmdAuth::new(
        VoidWithdrawal {
            organization_id: organization.organization_id(),
            withdrawal_id,
            occurred_at: Utc::now(),
        },
        Permission::WITHDRAWAL_VOID,
    );

    if let Err(e) = authz::authorize_command(&organization, &principal, &cmd_auth) {
        return errors::authz_error_to_response(e);
    }
    if let Err(res) = guard_withdrawal(&services, &organization, &principal, withdrawal_id) {
        return res;
    }

    match services.void_withdrawal(cmd_auth.inner) {
        Ok(deposit) => (StatusCode::OK, Json(withdrawal_json(&deposit, withdrawal_id))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn my_withdrawals(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(organization): Extension<OrganizationContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(e) = authz::authorize_permission(&organization, &principal, &Permission::PETTY_CASH_READ) {
        return errors::authz_error_to_response(e);
    }

    match services.withdrawals_for_user(organization.organization_id(), principal.user_id()) {
        Ok(mine) => (
            StatusCode::OK,
            Json(mine.iter().map(dto::user_withdrawal_to_json).collect::<Vec<_>>()),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn reconcile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(organization): Extension<OrganizationContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::ReconcileRequest>, JsonRejection>,
) -> Response {
    if let Err(e) = authz::authorize_permission(&organization, &principal, &Permission::RECONCILE) {
        return errors::authz_error_to_response(e);
    }

    let request = match body {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => dto::ReconcileRequest::default(),
        Err(rejection) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                rejection.body_text(),
            );
        }
    };
    let as_of = request.as_of.unwrap_or_else(Utc::now);

    match services.reconcile(organization.organization_id(), organization.branch_id(), as_of) {
        Ok(transitioned) => (
            StatusCode::OK,
            Json(json!({
                "as_of": as_of,
                "policy_window_seconds": services.policy_window().as_duration().num_seconds(),
                "count": transitioned.len(),
                "transitioned": transitioned.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Branch and holder checks for operations addressed by withdrawal id.
fn guard_withdrawal(
    services: &AppServices,
    organization: &OrganizationContext,
    principal: &PrincipalContext,
    withdrawal_id: WithdrawalId,
) -> Result<(), Response> {
    let deposit = services
        .deposit_of_withdrawal(organization.organization_id(), withdrawal_id)
        .map_err(errors::service_error_to_response)?;

    authz::authorize_deposit_branch(organization, principal, deposit.branch_id())
        .map_err(errors::authz_error_to_response)?;

    if let Some(withdrawal) = deposit.withdrawal(withdrawal_id) {
        authz::authorize_withdrawal_holder(organization, principal, withdrawal)
            .map_err(errors::authz_error_to_response)?;
    }
    Ok(())
}

fn withdrawal_json(deposit: &pettycash_ledger::Deposit, withdrawal_id: WithdrawalId) -> Value {
    deposit
        .withdrawal(withdrawal_id)
        .map(dto::withdrawal_to_json)
        .unwrap_or(Value::Null)
}

fn parse_deposit_id(raw: &str) -> Result<DepositId, Response> {
    raw.parse::<AggregateId>()
        .map(DepositId::new)
        .map_err(|_| errors::invalid_id("deposit"))
}

fn parse_withdrawal_id(raw: &str) -> Result<WithdrawalId, Response> {
    raw.parse::<WithdrawalId>()
        .map_err(|_| errors::invalid_id("withdrawal"))
}
