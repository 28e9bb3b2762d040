// SPDX-License-Identifier: MIT

//! Scheduler authentication middleware for `/tasks/*`.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Require `Authorization: Bearer <TASKS_TOKEN>` on task routes.
pub async fn require_tasks_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    let Some(presented) = presented else {
        tracing::warn!("Blocked tasks request without bearer token");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let expected = state.config.tasks_token.as_bytes();
    let matches: bool = presented.as_bytes().ct_eq(expected).into();

    if expected.is_empty() || !matches {
        tracing::warn!("Blocked tasks request with invalid token");
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}
