// SPDX-License-Identifier: MIT

//! UDisc Parse API client.
//!
//! Handles:
//! - Login (username/password → session token + account id)
//! - Scorecard page requests scoped to one account
//!
//! The client holds no session state. Every authenticated request takes
//! the caller's `Session` explicitly, so concurrent users never share a
//! token through the client.

use crate::error::AppError;
use crate::models::{Scorecard, Session, UserIdentity, PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// iOS user agent the Parse server expects from the mobile app.
const IOS_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_3_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Mobile/15E148 Safari/604.1";

const SESSION_TOKEN_HEADER: &str = "X-Parse-Session-Token";

/// Related entities expanded inline on every scorecard page.
const SCORECARD_INCLUDE: &str = "createdBy,entries,entries.users,entries.players";

/// UDisc Parse API client.
#[derive(Clone)]
pub struct UdiscClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
}

impl UdiscClient {
    /// Create a client for the given Parse endpoint.
    pub fn new(base_url: &str, app_id: &str, request_timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(IOS_USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::UdiscApi(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
        })
    }

    /// Log a user in and return their session.
    ///
    /// Fails with `MissingCredentials` before any request when the user has
    /// no username or password, and with `LoginFailed` on a non-2xx status or
    /// a 2xx body lacking `sessionToken`/`objectId`. No retry.
    pub async fn login(&self, user: &UserIdentity) -> Result<Session, AppError> {
        if !user.has_credentials() {
            return Err(AppError::MissingCredentials(user.display_name.clone()));
        }

        match self.open_session(&user.username, &user.password).await {
            Ok(session) => {
                tracing::info!(user = %user.name, "Login succeeded");
                Ok(session)
            }
            Err(reason) => {
                tracing::warn!(user = %user.name, reason = %reason, "Login failed");
                Err(AppError::LoginFailed(user.display_name.clone()))
            }
        }
    }

    /// Check a username/password pair by logging in once.
    ///
    /// The session is discarded. A rejection carries the server's `error` text.
    pub async fn validate_credentials(&self, username: &str, password: &str) -> CredentialCheck {
        match self.open_session(username, password).await {
            Ok(_) => {
                tracing::info!(username, "Credential validation succeeded");
                CredentialCheck {
                    valid: true,
                    message: "Credentials validated successfully".to_string(),
                }
            }
            Err(reason) => {
                tracing::warn!(username, reason = %reason, "Credential validation failed");
                CredentialCheck {
                    valid: false,
                    message: format!("Invalid UDisc credentials: {}", reason),
                }
            }
        }
    }

    /// `POST /login`. The error is a human-readable rejection reason.
    async fn open_session(&self, username: &str, password: &str) -> Result<Session, String> {
        let body = serde_json::json!({
            "username": username,
            "password": password,
        });

        let response = self
            .request(reqwest::Method::POST, "/login")
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("login request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let reason = response
                .json::<ParseErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(format!("HTTP {}: {}", status.as_u16(), reason));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| format!("login response was not JSON: {}", e))?;

        match (login.session_token, login.object_id) {
            (Some(token), Some(account_id)) if !token.is_empty() && !account_id.is_empty() => {
                Ok(Session::new(token, account_id))
            }
            _ => Err("login response missing session token".to_string()),
        }
    }

    /// Fetch one page of scorecards created by or shared with the session's
    /// account, ascending by `updatedAt`.
    pub async fn list_scorecards(
        &self,
        session: &Session,
        skip: usize,
    ) -> Result<Vec<Scorecard>, AppError> {
        let filter = scorecard_filter(session.account_id());

        let response = self
            .request(reqwest::Method::GET, "/classes/Scorecard")
            .header(SESSION_TOKEN_HEADER, session.token())
            .query(&[
                ("where", filter.to_string()),
                ("order", "updatedAt".to_string()),
                ("include", SCORECARD_INCLUDE.to_string()),
                ("limit", PAGE_SIZE.to_string()),
                ("skip", skip.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::UdiscApi(e.to_string()))?;

        let page: ResultsPage = self.check_response_json(response).await?;
        Ok(page.results)
    }

    /// Request builder with the base Parse headers.
    fn request(&self, method: reqwest::Method, endpoint: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, endpoint))
            .header("X-Parse-Application-Id", &self.app_id)
            .header("X-Parse-Revocable-Session", "1")
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UdiscApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::UdiscApi(format!("JSON parse error: {}", e)))
    }
}

/// `where` filter: created by or shared with the account, schema version in (0, 4).
pub fn scorecard_filter(account_id: &str) -> serde_json::Value {
    let pointer = serde_json::json!({
        "__type": "Pointer",
        "className": "_User",
        "objectId": account_id,
    });

    serde_json::json!({
        "$or": [
            { "createdBy": pointer },
            { "users": pointer },
        ],
        "version": { "$gt": 0, "$lt": 4 },
    })
}

/// Outcome of a credential check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialCheck {
    pub valid: bool,
    pub message: String,
}

/// Successful login body.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "sessionToken")]
    session_token: Option<String>,
    #[serde(rename = "objectId")]
    object_id: Option<String>,
}

/// Parse error body (`{"code": 101, "error": "..."}`).
#[derive(Debug, Deserialize)]
struct ParseErrorBody {
    error: Option<String>,
}

/// Parse query response.
#[derive(Debug, Deserialize)]
struct ResultsPage {
    results: Vec<Scorecard>,
}
