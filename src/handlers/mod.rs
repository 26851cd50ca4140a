pub mod admin;
pub mod public;

use axum::Router;

use crate::db::AppState;

/// Assemble the full route tree: the public activation surface at the
/// root and the admin surface nested under `/admin`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(public::router())
        .nest("/admin", admin::router(state.clone()))
        .with_state(state)
}
