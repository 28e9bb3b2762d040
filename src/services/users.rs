// SPDX-License-Identifier: MIT

//! Registry of configured UDisc users.
//!
//! User metadata comes from `UDISC_USERS`; passwords come from the
//! credential secret (matched by username, then email) or, failing that,
//! from an inline `password` field. Users without a password are skipped.

use crate::config::ConfigError;
use crate::models::{Role, UserIdentity, UserSummary};
use crate::services::SecretStore;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

/// One entry of `UDISC_USERS`.
#[derive(Debug, Deserialize)]
struct UserMetadata {
    name: String,
    display_name: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    pdga_id: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Configured users, keyed by upper-cased name.
#[derive(Debug, Clone, Default)]
pub struct UserRegistry {
    users: BTreeMap<String, UserIdentity>,
}

impl UserRegistry {
    /// Build the registry from the `UDISC_USERS` JSON and the secret store.
    pub fn from_config(users_json: &str, secrets: &SecretStore) -> Result<Self, ConfigError> {
        let entries: Vec<UserMetadata> = serde_json::from_str(users_json)
            .map_err(|e| ConfigError::Invalid("UDISC_USERS", e.to_string()))?;

        let mut users = BTreeMap::new();

        for entry in entries {
            let username = entry.username.trim().to_string();
            let email = non_empty(entry.email);

            let password = secrets
                .password_for(&username)
                .filter(|_| !username.is_empty())
                .or_else(|| email.as_deref().and_then(|e| secrets.password_for(e)))
                .map(str::to_string)
                .or_else(|| non_empty(entry.password));

            let Some(password) = password else {
                tracing::warn!(
                    user = %entry.name,
                    "No credentials found for user, skipping"
                );
                continue;
            };

            let role = match entry.role.as_deref().map(str::parse::<Role>) {
                Some(Ok(role)) => role,
                Some(Err(reason)) => {
                    tracing::warn!(user = %entry.name, reason = %reason, "Defaulting to viewer");
                    Role::Viewer
                }
                None => Role::Viewer,
            };

            let key = entry.name.to_uppercase();
            let user = UserIdentity {
                name: entry.name,
                display_name: entry.display_name,
                username,
                password,
                email,
                pdga_id: non_empty(entry.pdga_id),
                role,
            };

            if users.insert(key, user).is_some() {
                tracing::warn!("Duplicate user name in UDISC_USERS, keeping the last entry");
            }
        }

        let registry = Self { users };
        tracing::info!(count = registry.users.len(), "Loaded users with credentials");

        let unmatched = registry.unmatched_secret_users(secrets);
        if !unmatched.is_empty() {
            tracing::warn!(
                count = unmatched.len(),
                users = ?unmatched,
                "Secret store has users without matching UDISC_USERS metadata"
            );
        }

        Ok(registry)
    }

    /// Look up a user by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&UserIdentity> {
        self.users.get(&name.to_uppercase())
    }

    pub fn all(&self) -> Vec<UserIdentity> {
        self.users.values().cloned().collect()
    }

    /// Users for the given names, or all users when `names` is `None`.
    /// Unknown names are dropped; a name repeated in any case is kept once.
    pub fn select(&self, names: Option<&[String]>) -> Vec<UserIdentity> {
        let Some(names) = names else {
            return self.all();
        };

        let mut seen = HashSet::new();
        names
            .iter()
            .filter(|name| seen.insert(name.to_uppercase()))
            .filter_map(|name| {
                let user = self.get(name);
                if user.is_none() {
                    tracing::warn!(user = %name, "Unknown user requested, ignoring");
                }
                user.cloned()
            })
            .collect()
    }

    pub fn summary(&self) -> BTreeMap<String, UserSummary> {
        Self::summarize(self.users.iter())
    }

    /// Summaries of the users holding `role`.
    pub fn summary_by_role(&self, role: Role) -> BTreeMap<String, UserSummary> {
        Self::summarize(self.users.iter().filter(|(_, u)| u.role == role))
    }

    fn summarize<'a>(
        users: impl Iterator<Item = (&'a String, &'a UserIdentity)>,
    ) -> BTreeMap<String, UserSummary> {
        users
            .map(|(key, user)| {
                (
                    key.clone(),
                    UserSummary {
                        display_name: user.display_name.clone(),
                        configured: user.has_credentials(),
                        pdga_id: user.pdga_id.clone(),
                        role: user.role,
                    },
                )
            })
            .collect()
    }

    /// Secret logins that match neither a configured username nor email.
    pub fn unmatched_secret_users(&self, secrets: &SecretStore) -> Vec<String> {
        let known: HashSet<String> = self
            .users
            .values()
            .flat_map(|u| {
                std::iter::once(u.username.to_lowercase())
                    .chain(u.email.as_ref().map(|e| e.to_lowercase()))
            })
            .filter(|s| !s.is_empty())
            .collect();

        let mut unmatched: Vec<String> = secrets
            .logins()
            .filter(|login| !known.contains(*login))
            .map(str::to_string)
            .collect();
        unmatched.sort();
        unmatched
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
