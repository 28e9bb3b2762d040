//! User identity and per-run session state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Access level of a configured user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Viewer,
    Developer,
    Admin,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "developer" => Ok(Role::Developer),
            "admin" => Ok(Role::Admin),
            other => Err(format!(
                "Invalid role '{}'. Must be 'viewer', 'developer', or 'admin'",
                other
            )),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Viewer => "viewer",
            Role::Developer => "developer",
            Role::Admin => "admin",
        };
        f.write_str(s)
    }
}

/// A configured UDisc account. Built once at startup and never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// Stable internal key (case-insensitive)
    pub name: String,
    /// Human label
    pub display_name: String,
    /// UDisc login
    pub username: String,
    /// UDisc password (from the secret store or inline config)
    pub password: String,
    pub email: Option<String>,
    pub pdga_id: Option<String>,
    pub role: Role,
}

impl UserIdentity {
    /// Both login fields are present.
    pub fn has_credentials(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserIdentity")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .field("pdga_id", &self.pdga_id)
            .field("role", &self.role)
            .finish()
    }
}

/// Session returned by a successful login. Owned by one fetch task for
/// one run; token and account id always travel together.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    account_id: String,
}

impl Session {
    pub fn new(token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            account_id: account_id.into(),
        }
    }

    /// Session token sent as `X-Parse-Session-Token`.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Parse `_User` object id used to scope scorecard queries.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// Configuration status of one user, as exposed by `/api/users`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub display_name: String,
    pub configured: bool,
    pub pdga_id: Option<String>,
    pub role: Role,
}
