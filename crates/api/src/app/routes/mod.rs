use axum::{Router, routing::get};

pub mod common;
pub mod petty_cash;
pub mod system;

/// Router for all authenticated (organization-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/petty-cash", petty_cash::router())
}
