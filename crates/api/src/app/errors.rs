use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use pettycash_auth::AuthzError;
use pettycash_infra::ServiceError;
use pettycash_ledger::LedgerError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Ledger(e) => ledger_error_to_response(e),
        ServiceError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", err.to_string()),
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let status = match &err {
        LedgerError::InvalidAmount(_) | LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::InsufficientFunds { .. }
        | LedgerError::OverJustification { .. }
        | LedgerError::DepositNotOpen(_)
        | LedgerError::WithdrawalVoided(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::AlreadyExists(_) => StatusCode::CONFLICT,
        LedgerError::OrganizationMismatch => StatusCode::FORBIDDEN,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn authz_error_to_response(err: AuthzError) -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
