// SPDX-License-Identifier: MIT

//! API routes: user and warehouse status, credential checks.

use crate::error::{AppError, Result};
use crate::models::{Role, UserSummary};
use crate::services::CredentialCheck;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/{name}", get(get_user))
        .route("/api/warehouse", get(warehouse_status))
}

/// Routes that reach UDisc on the caller's behalf (bearer token required).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/credentials/validate", post(validate_credentials))
}

#[derive(Deserialize)]
pub struct UsersQuery {
    pub role: Option<String>,
}

/// Configuration status of every user, optionally for one role.
async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UsersQuery>,
) -> Result<Json<BTreeMap<String, UserSummary>>> {
    let users = state.pipeline.users();
    let summary = match query.role.as_deref() {
        Some(raw) => users.summary_by_role(raw.parse::<Role>().map_err(AppError::BadRequest)?),
        None => users.summary(),
    };
    Ok(Json(summary))
}

/// Configuration status of one user (case-insensitive name).
async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<UserSummary>> {
    let key = name.to_uppercase();
    state
        .pipeline
        .users()
        .summary()
        .remove(&key)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("User {}", name)))
}

#[derive(Serialize)]
pub struct WarehouseStatus {
    pub scorecards: i64,
    pub by_user: BTreeMap<String, i64>,
    pub latest_updated_at: Option<String>,
}

/// Row counts and latest ingested timestamp.
async fn warehouse_status(State(state): State<Arc<AppState>>) -> Result<Json<WarehouseStatus>> {
    let warehouse = state.pipeline.warehouse();
    let scorecards = warehouse.count_scorecards(None).await?;
    let by_user = warehouse.count_by_user().await?;
    let latest_updated_at = warehouse
        .latest_updated_at()
        .await?
        .map(crate::time_utils::format_utc_millis);

    Ok(Json(WarehouseStatus {
        scorecards,
        by_user,
        latest_updated_at,
    }))
}

#[derive(Deserialize)]
pub struct ValidateCredentialsRequest {
    pub username: String,
    pub password: String,
}

/// Check a UDisc login before it is added to the credential secret.
async fn validate_credentials(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ValidateCredentialsRequest>,
) -> Result<Json<CredentialCheck>> {
    let username = request.username.trim();
    if username.is_empty() || request.password.is_empty() {
        return Err(AppError::BadRequest(
            "username and password are required".to_string(),
        ));
    }

    let check = state
        .udisc
        .validate_credentials(username, &request.password)
        .await;
    Ok(Json(check))
}
