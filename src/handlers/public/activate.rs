use axum::{Json, extract::State};
use serde::Deserialize;

use crate::db::AppState;
use crate::error::Result;
use crate::service::ActivationGranted;

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub license_key: String,
    pub device_id: String,
}

pub async fn activate_license(
    State(state): State<AppState>,
    Json(request): Json<ActivateRequest>,
) -> Result<Json<ActivationGranted>> {
    let granted = state
        .service
        .activate_license(&request.license_key, &request.device_id)
        .await?;
    Ok(Json(granted))
}
