// SPDX-License-Identifier: MIT

//! Embedded SQLite warehouse with typed operations.
//!
//! Provides:
//! - Raw scorecard loading (idempotent, keyed by user + objectId + updatedAt)
//! - Loading the newest raw blob per user from the object store
//! - The latest ingested `updatedAt`, used as the incremental cutoff

use crate::db::tables;
use crate::error::AppError;
use crate::models::{Cutoff, Scorecard};
use crate::services::RawStore;
use crate::time_utils::{format_utc_millis, format_utc_rfc3339, parse_utc};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

const MAX_CONNECTIONS: u32 = 5;

/// One raw blob loaded into the warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadedFile {
    pub user: String,
    pub file: String,
    /// Rows actually inserted (duplicates excluded)
    pub records: u64,
}

/// Result of a warehouse load step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadSummary {
    pub total_records: u64,
    pub files_loaded: Vec<LoadedFile>,
}

/// Warehouse client.
#[derive(Clone)]
pub struct Warehouse {
    pool: Option<SqlitePool>,
}

impl Warehouse {
    /// Open (or create) the warehouse at `path`. `:memory:` opens a private
    /// in-memory database.
    pub async fn connect(path: &str) -> Result<Self, AppError> {
        let pool = if path == ":memory:" {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
            // A single long-lived connection keeps the in-memory database alive.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| AppError::Database(format!("{}: {}", parent.display(), e)))?;
                }
            }
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect_with(options)
                .await?
        };

        let warehouse = Self { pool: Some(pool) };
        warehouse.ensure_schema().await?;

        tracing::info!(path, "Connected to warehouse");
        Ok(warehouse)
    }

    /// Create an offline warehouse for testing.
    ///
    /// All operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { pool: None }
    }

    /// Helper to get the pool or return an error if offline.
    fn get_pool(&self) -> Result<&SqlitePool, AppError> {
        self.pool
            .as_ref()
            .ok_or_else(|| AppError::Database("Warehouse not connected (offline mode)".to_string()))
    }

    async fn ensure_schema(&self) -> Result<(), AppError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                object_id TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                user_name TEXT NOT NULL,
                raw_data TEXT NOT NULL,
                file_name TEXT NOT NULL,
                loaded_at TEXT NOT NULL,
                UNIQUE (user_name, object_id, updated_at)
            )",
            table = tables::RAW_SCORECARDS
        );
        sqlx::query(&sql).execute(self.get_pool()?).await?;
        Ok(())
    }

    // ─── Loading ─────────────────────────────────────────────────

    /// Insert a user's scorecards. Rows already present for the same
    /// user, objectId and updatedAt are skipped, so loading a page twice
    /// adds nothing. Returns the number of rows inserted.
    pub async fn load_scorecards(
        &self,
        user_name: &str,
        file_name: &str,
        scorecards: &[Scorecard],
    ) -> Result<u64, AppError> {
        let pool = self.get_pool()?;
        let user = user_name.to_lowercase();
        let loaded_at = format_utc_rfc3339(Utc::now());
        let sql = format!(
            "INSERT OR IGNORE INTO {} \
             (object_id, updated_at, user_name, raw_data, file_name, loaded_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
            tables::RAW_SCORECARDS
        );

        let mut tx = pool.begin().await?;
        let mut inserted = 0;

        for card in scorecards {
            let raw = serde_json::to_string(card.as_json())
                .map_err(|e| AppError::Internal(e.into()))?;
            let updated_at = card.updated_at().map(format_utc_millis).unwrap_or_default();

            inserted += sqlx::query(&sql)
                .bind(dedup_key(card, &raw))
                .bind(updated_at)
                .bind(&user)
                .bind(&raw)
                .bind(file_name)
                .bind(&loaded_at)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;

        tracing::info!(
            user = %user,
            file = file_name,
            received = scorecards.len(),
            inserted,
            "Loaded scorecards into warehouse"
        );
        Ok(inserted)
    }

    /// Load the newest blob of every user in the object store.
    pub async fn load_latest_files(&self, store: &RawStore) -> Result<LoadSummary, AppError> {
        let mut summary = LoadSummary::default();

        for user in store.users().await? {
            let keys = store.list_keys(&user).await?;
            let Some(latest) = keys.last() else {
                tracing::info!(user = %user, "No raw files found for user");
                continue;
            };

            let scorecards = store.get_scorecards(latest).await?;
            let records = self.load_scorecards(&user, latest, &scorecards).await?;

            summary.total_records += records;
            summary.files_loaded.push(LoadedFile {
                user,
                file: latest.clone(),
                records,
            });
        }

        Ok(summary)
    }

    // ─── Queries ─────────────────────────────────────────────────

    /// Latest ingested `updatedAt` across all users, if any.
    pub async fn latest_updated_at(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        let sql = format!(
            "SELECT MAX(updated_at) FROM {} WHERE updated_at <> ''",
            tables::RAW_SCORECARDS
        );
        let latest: Option<String> = sqlx::query_scalar(&sql)
            .fetch_one(self.get_pool()?)
            .await?;

        Ok(latest.as_deref().and_then(parse_utc))
    }

    /// Row count, optionally for one user.
    pub async fn count_scorecards(&self, user_name: Option<&str>) -> Result<i64, AppError> {
        let pool = self.get_pool()?;
        let count = match user_name {
            Some(user) => {
                let sql = format!(
                    "SELECT COUNT(*) FROM {} WHERE user_name = ?",
                    tables::RAW_SCORECARDS
                );
                sqlx::query_scalar(&sql)
                    .bind(user.to_lowercase())
                    .fetch_one(pool)
                    .await?
            }
            None => {
                let sql = format!("SELECT COUNT(*) FROM {}", tables::RAW_SCORECARDS);
                sqlx::query_scalar(&sql).fetch_one(pool).await?
            }
        };
        Ok(count)
    }

    /// Row count per user.
    pub async fn count_by_user(&self) -> Result<BTreeMap<String, i64>, AppError> {
        let sql = format!(
            "SELECT user_name, COUNT(*) FROM {} GROUP BY user_name",
            tables::RAW_SCORECARDS
        );
        let rows: Vec<(String, i64)> = sqlx::query_as(&sql)
            .fetch_all(self.get_pool()?)
            .await?;
        Ok(rows.into_iter().collect())
    }

    /// Resolve the incremental cutoff. Any failure resolves to
    /// `Cutoff::Unresolved` so the run proceeds as a full fetch.
    pub async fn resolve_cutoff(&self) -> Cutoff {
        match self.latest_updated_at().await {
            Ok(Some(ts)) => {
                tracing::info!(cutoff = %format_utc_millis(ts), "Resolved incremental cutoff");
                Cutoff::Resolved(ts)
            }
            Ok(None) => {
                tracing::info!("No scorecards in warehouse yet, fetching all scorecards");
                Cutoff::Unresolved
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not query latest timestamp, fetching all scorecards");
                Cutoff::Unresolved
            }
        }
    }
}

/// Row identity: `objectId`, or a content hash when it is missing.
fn dedup_key(card: &Scorecard, raw: &str) -> String {
    match card.object_id() {
        Some(id) => id.to_string(),
        None => hex::encode(Sha256::digest(raw.as_bytes())),
    }
}
