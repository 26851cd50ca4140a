mod customers;

pub use customers::*;

use axum::{Router, routing::post};

use crate::db::AppState;
use crate::middleware::admin_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/customers", post(issue_customer).get(list_customers))
        .route("/customers/{id}/renew", post(renew_customer))
        .route("/customers/{id}/ban", post(ban_customer))
        .route_layer(axum::middleware::from_fn_with_state(state, admin_auth))
}
