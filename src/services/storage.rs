// SPDX-License-Identifier: MIT

//! Raw scorecard object store.
//!
//! One JSON blob per user per run, keyed `{user}/data_{YYYYmmdd_HHMMSS}.json`
//! under the configured data directory.

use crate::error::{AppError, Result};
use crate::models::{FetchResult, Scorecard};
use crate::time_utils::run_stamp;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Filesystem-backed object store for raw API responses.
#[derive(Debug, Clone)]
pub struct RawStore {
    root: PathBuf,
}

impl RawStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Object key for a user's blob of the run started at `at`.
    pub fn object_key(user_name: &str, at: DateTime<Utc>) -> String {
        format!("{}/data_{}.json", user_name.to_lowercase(), run_stamp(at))
    }

    /// Write one user's scorecards and return the object key.
    pub async fn put_scorecards(
        &self,
        user_name: &str,
        scorecards: &[Scorecard],
        at: DateTime<Utc>,
    ) -> Result<String> {
        let key = Self::object_key(user_name, at);
        let path = self.root.join(&key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("{}: {}", parent.display(), e)))?;
        }

        let body = serde_json::to_vec_pretty(scorecards)
            .map_err(|e| AppError::Storage(format!("Failed to serialize scorecards: {}", e)))?;

        tokio::fs::write(&path, body)
            .await
            .map_err(|e| AppError::Storage(format!("{}: {}", path.display(), e)))?;

        tracing::info!(
            user = %user_name,
            key = %key,
            count = scorecards.len(),
            "Stored scorecard data"
        );
        Ok(key)
    }

    /// Write every user's scorecards. Stops at the first failure.
    pub async fn put_all(
        &self,
        result: &FetchResult,
        at: DateTime<Utc>,
    ) -> Result<BTreeMap<String, String>> {
        let mut keys = BTreeMap::new();
        for (user_name, scorecards) in result {
            let key = self.put_scorecards(user_name, scorecards, at).await?;
            keys.insert(user_name.clone(), key);
        }
        Ok(keys)
    }

    /// User directories present in the store (lower-cased names).
    pub async fn users(&self) -> Result<Vec<String>> {
        let mut users = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(users),
            Err(e) => return Err(AppError::Storage(e.to_string())),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir {
                users.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        users.sort();
        Ok(users)
    }

    /// A user's object keys, oldest first.
    pub async fn list_keys(&self, user_name: &str) -> Result<Vec<String>> {
        let user = user_name.to_lowercase();
        let dir = self.root.join(&user);
        let mut keys = Vec::new();

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(AppError::Storage(e.to_string())),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.starts_with("data_") && file_name.ends_with(".json") {
                keys.push(format!("{}/{}", user, file_name));
            }
        }

        keys.sort();
        Ok(keys)
    }

    /// Read a blob back.
    pub async fn get_scorecards(&self, key: &str) -> Result<Vec<Scorecard>> {
        let path = self.root.join(key);
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| AppError::Storage(format!("{}: {}", path.display(), e)))?;

        serde_json::from_slice(&body)
            .map_err(|e| AppError::Storage(format!("Invalid blob {}: {}", key, e)))
    }
}
