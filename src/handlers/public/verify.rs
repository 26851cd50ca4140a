use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::db::AppState;
use crate::error::Result;
use crate::service::VerifyOutcome;

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub license_key: String,
    pub device_id: String,
}

pub async fn verify_license(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<VerifyOutcome>> {
    let outcome = state
        .service
        .verify_license(&query.license_key, &query.device_id)
        .await?;
    Ok(Json(outcome))
}
