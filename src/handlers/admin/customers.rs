use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::Value;

use crate::db::AppState;
use crate::error::Result;
use crate::models::{Customer, IssueCustomer};
use crate::util::lenient_count;

/// Issue request. `months` and `max_devices` accept numbers or numeric
/// strings; anything unparseable falls back to the defaults.
#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub months: Option<Value>,
    #[serde(default)]
    pub max_devices: Option<Value>,
}

pub async fn issue_customer(
    State(state): State<AppState>,
    Json(request): Json<IssueRequest>,
) -> Result<Json<Customer>> {
    let input = IssueCustomer {
        name: request.name.unwrap_or_default(),
        email: request.email.unwrap_or_default(),
        months: lenient_count(request.months.as_ref()),
        max_devices: lenient_count(request.max_devices.as_ref()),
    };
    let customer = state.service.issue_customer(input).await?;
    Ok(Json(customer))
}

pub async fn list_customers(State(state): State<AppState>) -> Result<Json<Vec<Customer>>> {
    let customers = state.service.list_customers().await?;
    Ok(Json(customers))
}

#[derive(Debug, Default, Deserialize)]
pub struct RenewRequest {
    #[serde(default)]
    pub months: Option<Value>,
}

pub async fn renew_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<RenewRequest>>,
) -> Result<Json<Customer>> {
    let months = body.and_then(|Json(b)| lenient_count(b.months.as_ref()));
    let customer = state.service.renew_customer(&id, months).await?;
    Ok(Json(customer))
}

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    #[serde(default = "default_banned")]
    pub banned: bool,
}

fn default_banned() -> bool {
    true
}

pub async fn ban_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<BanRequest>>,
) -> Result<Json<Customer>> {
    let banned = body.map(|Json(b)| b.banned).unwrap_or(true);
    let customer = state.service.ban_customer(&id, banned).await?;
    Ok(Json(customer))
}
