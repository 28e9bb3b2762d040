// SPDX-License-Identifier: MIT

//! Credential secret parsing.
//!
//! The secret is a JSON document of the form
//! `{"users": [{"username": "...", "password": "..."}]}`. The `users` value
//! may itself be a JSON-encoded string, and a bare array is accepted too.
//! Malformed secrets produce an empty store rather than an error.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// One username/password pair from the secret.
#[derive(Clone, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credentials keyed by lower-cased username (or email).
#[derive(Debug, Clone, Default)]
pub struct SecretStore {
    by_login: HashMap<String, String>,
}

impl SecretStore {
    pub fn from_json(raw: &str) -> Self {
        let credentials = match parse_credentials(raw) {
            Ok(creds) => creds,
            Err(reason) => {
                tracing::warn!(reason = %reason, "Could not parse credential secret");
                Vec::new()
            }
        };

        let by_login: HashMap<_, _> = credentials
            .into_iter()
            .filter_map(|c| {
                let login = c.username.trim().to_lowercase();
                (!login.is_empty()).then_some((login, c.password))
            })
            .collect();

        tracing::info!(count = by_login.len(), "Loaded credentials from secret");
        Self { by_login }
    }

    /// Password for a username or email, compared case-insensitively.
    pub fn password_for(&self, login: &str) -> Option<&str> {
        self.by_login
            .get(&login.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Lower-cased logins present in the secret.
    pub fn logins(&self) -> impl Iterator<Item = &str> {
        self.by_login.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_login.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_login.is_empty()
    }
}

fn parse_credentials(raw: &str) -> Result<Vec<Credential>, String> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;

    let users = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut obj) => match obj.remove("users") {
            Some(serde_json::Value::String(encoded)) => {
                serde_json::from_str(&encoded).map_err(|e| e.to_string())?
            }
            Some(users) => users,
            None => return Ok(Vec::new()),
        },
        _ => return Err("expected an object or array".to_string()),
    };

    serde_json::from_value(users).map_err(|e| e.to_string())
}
