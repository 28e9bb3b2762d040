// SPDX-License-Identifier: MIT

//! Shared test helpers: an in-process stand-in for the UDisc Parse server.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use disc_golf_etl::config::Config;
use disc_golf_etl::db::Warehouse;
use disc_golf_etl::models::{Role, Scorecard, UserIdentity};
use disc_golf_etl::routes::create_router;
use disc_golf_etl::services::{
    Dispatcher, Pipeline, RawStore, ScorecardFetcher, SecretStore, UdiscClient, UserRegistry,
};
use disc_golf_etl::AppState;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One fake UDisc account.
#[derive(Clone, Default)]
pub struct MockAccount {
    pub password: String,
    pub token: String,
    pub account_id: String,
    /// Pages served for skip = 0, 50, 100, ...
    pub pages: Vec<Vec<Value>>,
    /// Page indexes answered with HTTP 500
    pub failing_pages: HashSet<usize>,
    /// Login answers 200 without `sessionToken`
    pub login_missing_token: bool,
    /// Delay before answering a login
    pub login_delay: Option<Duration>,
}

#[derive(Default)]
struct MockState {
    accounts: HashMap<String, MockAccount>,
    skips: HashMap<String, Vec<usize>>,
    logins: HashMap<String, usize>,
    page_delay: Option<Duration>,
}

/// Fake Parse server. Cloning shares state.
#[derive(Clone, Default)]
pub struct MockUdisc {
    state: Arc<Mutex<MockState>>,
}

#[allow(dead_code)]
impl MockUdisc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account whose login is `username`/`password`.
    pub fn account(self, username: &str, account: MockAccount) -> Self {
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(username.to_string(), account);
        self
    }

    /// Delay every scorecard page response.
    pub fn with_page_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().page_delay = Some(delay);
        self
    }

    /// `skip` values served for an account, in request order.
    pub fn skips(&self, account_id: &str) -> Vec<usize> {
        self.state
            .lock()
            .unwrap()
            .skips
            .get(account_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn login_count(&self, username: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .logins
            .get(username)
            .copied()
            .unwrap_or(0)
    }

    /// Serve on an ephemeral local port and return the base URL.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/login", post(login))
            .route("/classes/Scorecard", get(scorecards))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }
}

async fn login(
    State(mock): State<MockUdisc>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if headers.get("X-Parse-Application-Id").is_none() {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "unauthorized" })),
        );
    }

    let username = body["username"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default();

    let delay = mock
        .state
        .lock()
        .unwrap()
        .accounts
        .get(&username)
        .and_then(|a| a.login_delay);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut state = mock.state.lock().unwrap();
    *state.logins.entry(username.clone()).or_default() += 1;

    match state.accounts.get(&username) {
        Some(acct) if acct.password == password => {
            if acct.login_missing_token {
                (StatusCode::OK, Json(json!({ "objectId": acct.account_id })))
            } else {
                (
                    StatusCode::OK,
                    Json(json!({
                        "objectId": acct.account_id,
                        "sessionToken": acct.token,
                        "username": username,
                    })),
                )
            }
        }
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "code": 101, "error": "Invalid username/password." })),
        ),
    }
}

async fn scorecards(
    State(mock): State<MockUdisc>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let delay = mock.state.lock().unwrap().page_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let token = headers
        .get("X-Parse-Session-Token")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut state = mock.state.lock().unwrap();
    let Some(acct) = state.accounts.values().find(|a| a.token == token).cloned() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "code": 209, "error": "Invalid session token" })),
        );
    };

    // The filter must be scoped to the account that owns the token.
    let filter: Value = serde_json::from_str(params.get("where").map(String::as_str).unwrap_or("{}"))
        .unwrap_or_default();
    if filter["$or"][0]["createdBy"]["objectId"] != json!(acct.account_id)
        || filter["$or"][1]["users"]["objectId"] != json!(acct.account_id)
        || params.get("order").map(String::as_str) != Some("updatedAt")
        || params.get("limit").map(String::as_str) != Some("50")
    {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "code": 119, "error": "Permission denied" })),
        );
    }

    let skip: usize = params
        .get("skip")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    state
        .skips
        .entry(acct.account_id.clone())
        .or_default()
        .push(skip);

    let index = skip / 50;
    if acct.failing_pages.contains(&index) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "code": 1, "error": "Internal server error" })),
        );
    }

    let results = acct.pages.get(index).cloned().unwrap_or_default();
    (StatusCode::OK, Json(json!({ "results": results })))
}

/// `count` scorecards with strictly ascending `updatedAt`, one minute apart,
/// the first at `start` minutes after 2023-06-01T00:00:00Z.
#[allow(dead_code)]
pub fn scorecard_values(prefix: &str, start: i64, count: usize) -> Vec<Value> {
    let base = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let ts = base + ChronoDuration::minutes(start + i as i64);
            json!({
                "objectId": format!("{}-{}", prefix, start + i as i64),
                "updatedAt": ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                "entries": [],
            })
        })
        .collect()
}

/// Split consecutive scorecards into pages of the given sizes.
#[allow(dead_code)]
pub fn pages(prefix: &str, sizes: &[usize]) -> Vec<Vec<Value>> {
    let mut start = 0;
    sizes
        .iter()
        .map(|&n| {
            let page = scorecard_values(prefix, start, n);
            start += n as i64;
            page
        })
        .collect()
}

#[allow(dead_code)]
pub fn ids(cards: &[Scorecard]) -> Vec<String> {
    cards
        .iter()
        .map(|c| c.object_id().unwrap_or_default().to_string())
        .collect()
}

#[allow(dead_code)]
pub fn account(username: &str, pages: Vec<Vec<Value>>) -> MockAccount {
    MockAccount {
        password: format!("{}-pw", username),
        token: format!("r:token-{}", username),
        account_id: format!("obj-{}", username),
        pages,
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn user(username: &str) -> UserIdentity {
    UserIdentity {
        name: username.to_string(),
        display_name: username.to_uppercase(),
        username: username.to_string(),
        password: format!("{}-pw", username),
        email: None,
        pdga_id: None,
        role: Role::Viewer,
    }
}

#[allow(dead_code)]
pub fn client(base_url: &str) -> UdiscClient {
    UdiscClient::new(base_url, "test_app_id", Duration::from_secs(5)).expect("client")
}

#[allow(dead_code)]
pub fn dispatcher(base_url: &str, deadline: Duration) -> Dispatcher {
    Dispatcher::new(ScorecardFetcher::new(client(base_url)), deadline)
}

/// Create a test app against the given upstream and data directory.
#[allow(dead_code)]
pub async fn create_test_app(
    base_url: &str,
    users_json: &str,
    data_dir: &std::path::Path,
) -> (axum::Router, Arc<AppState>) {
    let mut config = Config::test_default();
    config.udisc_base_url = base_url.to_string();
    config.users_json = users_json.to_string();
    config.data_dir = data_dir.to_path_buf();

    let users = UserRegistry::from_config(&config.users_json, &SecretStore::default())
        .expect("users");
    let warehouse = Warehouse::connect(":memory:").await.expect("warehouse");
    let pipeline = Pipeline::new(
        users,
        dispatcher(base_url, Duration::from_secs(config.user_deadline_secs)),
        RawStore::new(config.data_dir.clone()),
        warehouse,
        config.load_mode,
    );

    let state = Arc::new(AppState {
        config,
        pipeline,
        udisc: client(base_url),
    });
    (create_router(state.clone()), state)
}
