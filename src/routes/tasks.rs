// SPDX-License-Identifier: MIT

//! Task handler routes for scheduler callbacks.
//!
//! These endpoints are called by the scheduler, not directly by users.
//! The bearer-token middleware is applied in routes/mod.rs.

use crate::db::LoadSummary;
use crate::error::{AppError, Result};
use crate::services::{RunReport, RunRequest};
use crate::AppState;
use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use std::sync::Arc;

/// Task handler routes (called by the scheduler).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/fetch-scorecards", post(fetch_scorecards))
        .route("/tasks/load-warehouse", post(load_warehouse))
}

/// Fetch scorecards for the requested users, store them, load them.
///
/// The body is optional: `{"users": ["alice"], "mode": "incremental"}`.
async fn fetch_scorecards(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<RunReport>> {
    let request: RunRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RunRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid run request: {}", e)))?
    };

    tracing::info!(
        users = ?request.users,
        mode = ?request.mode,
        "Fetch task received"
    );

    let report = state.pipeline.run(request).await?;
    Ok(Json(report))
}

/// Load the newest raw blob of every user into the warehouse.
async fn load_warehouse(State(state): State<Arc<AppState>>) -> Result<Json<LoadSummary>> {
    let summary = state.pipeline.load_latest().await?;
    tracing::info!(
        total_records = summary.total_records,
        files = summary.files_loaded.len(),
        "Warehouse load task complete"
    );
    Ok(Json(summary))
}
