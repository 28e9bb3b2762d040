// SPDX-License-Identifier: MIT

//! One ETL run: fetch, store raw blobs, load into the warehouse.

use crate::db::{LoadSummary, LoadedFile, Warehouse};
use crate::error::{AppError, Result};
use crate::models::{Cutoff, LoadMode};
use crate::services::{Dispatcher, RawStore, UserRegistry};
use crate::time_utils::{format_utc_millis, format_utc_rfc3339};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters of a run. Empty means every user in the configured mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub users: Option<Vec<String>>,
    #[serde(default)]
    pub mode: Option<String>,
}

/// Outcome of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: String,
    pub mode: LoadMode,
    /// Cutoff used for the run, when one was resolved
    pub cutoff: Option<String>,
    /// Scorecards fetched per user
    pub fetched: BTreeMap<String, usize>,
    /// Error message per failed user
    pub failures: BTreeMap<String, String>,
    /// Raw object key per user
    pub storage_keys: BTreeMap<String, String>,
    pub load: LoadSummary,
}

/// Wires the registry, dispatcher, raw store and warehouse together.
#[derive(Clone)]
pub struct Pipeline {
    users: UserRegistry,
    dispatcher: Dispatcher,
    store: RawStore,
    warehouse: Warehouse,
    default_mode: LoadMode,
}

impl Pipeline {
    pub fn new(
        users: UserRegistry,
        dispatcher: Dispatcher,
        store: RawStore,
        warehouse: Warehouse,
        default_mode: LoadMode,
    ) -> Self {
        Self {
            users,
            dispatcher,
            store,
            warehouse,
            default_mode,
        }
    }

    pub fn users(&self) -> &UserRegistry {
        &self.users
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    pub fn store(&self) -> &RawStore {
        &self.store
    }

    /// Run fetch → store → load.
    ///
    /// Per-user fetch failures are reported, not raised. Storage and
    /// warehouse failures abort the run.
    pub async fn run(&self, request: RunRequest) -> Result<RunReport> {
        let started = Utc::now();
        let mode = match request.mode.as_deref() {
            Some(raw) => raw.parse::<LoadMode>().map_err(AppError::BadRequest)?,
            None => self.default_mode,
        };

        let cutoff = match mode {
            LoadMode::Incremental => self.warehouse.resolve_cutoff().await,
            LoadMode::Full => Cutoff::Unresolved,
        };

        let users = self.users.select(request.users.as_deref());
        let outcome = self.dispatcher.fetch_all(users, mode, cutoff).await;

        let storage_keys = self.store.put_all(&outcome.scorecards, started).await?;

        let mut load = LoadSummary::default();
        for (user, key) in &storage_keys {
            let cards = outcome
                .scorecards
                .get(user)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let records = self.warehouse.load_scorecards(user, key, cards).await?;
            load.total_records += records;
            load.files_loaded.push(LoadedFile {
                user: user.to_lowercase(),
                file: key.clone(),
                records,
            });
        }

        let report = RunReport {
            started_at: format_utc_rfc3339(started),
            mode,
            cutoff: cutoff.timestamp().map(format_utc_millis),
            fetched: outcome
                .scorecards
                .iter()
                .map(|(user, cards)| (user.clone(), cards.len()))
                .collect(),
            failures: outcome
                .failures
                .iter()
                .map(|(user, err)| (user.clone(), err.to_string()))
                .collect(),
            storage_keys,
            load,
        };

        tracing::info!(
            mode = ?report.mode,
            users = report.fetched.len(),
            failed = report.failures.len(),
            loaded = report.load.total_records,
            "ETL run complete"
        );
        Ok(report)
    }

    /// Load the newest raw blob of every user (standalone load step).
    pub async fn load_latest(&self) -> Result<LoadSummary> {
        self.warehouse.load_latest_files(&self.store).await
    }
}
