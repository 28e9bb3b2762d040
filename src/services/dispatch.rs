// SPDX-License-Identifier: MIT

//! Per-user fan-out of scorecard fetches.

use crate::error::AppError;
use crate::models::{Cutoff, FetchResult, LoadMode, Scorecard, UserIdentity};
use crate::services::ScorecardFetcher;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Results of one dispatch, assembled after every user task has finished.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Scorecards per user name. Failed users have no entry.
    pub scorecards: FetchResult,
    /// Error per user name for users that could not be fetched.
    pub failures: BTreeMap<String, AppError>,
}

impl DispatchOutcome {
    fn record(&mut self, name: String, result: Result<Vec<Scorecard>, AppError>) {
        match result {
            Ok(cards) => {
                self.scorecards.insert(name, cards);
            }
            Err(e) => {
                if e.is_session_error() {
                    tracing::warn!(user = %name, error = %e, "Could not log in user, skipping");
                } else {
                    tracing::error!(user = %name, error = %e, "Scorecard fetch failed for user");
                }
                self.failures.insert(name, e);
            }
        }
    }
}

/// Runs one fetch per user. Each task owns its own session; a failure in
/// one task never affects the others.
#[derive(Clone)]
pub struct Dispatcher {
    fetcher: ScorecardFetcher,
    user_deadline: Duration,
}

impl Dispatcher {
    pub fn new(fetcher: ScorecardFetcher, user_deadline: Duration) -> Self {
        Self {
            fetcher,
            user_deadline,
        }
    }

    /// Fetch scorecards for every user in `users`.
    ///
    /// A single user runs inline; two or more run as one task each.
    pub async fn fetch_all(
        &self,
        users: Vec<UserIdentity>,
        mode: LoadMode,
        cutoff: Cutoff,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        if users.is_empty() {
            tracing::warn!("No users to fetch scorecards for");
            return outcome;
        }

        tracing::info!(users = users.len(), ?mode, "Fetching scorecards");

        if let [user] = users.as_slice() {
            let result =
                fetch_with_deadline(&self.fetcher, user, mode, &cutoff, self.user_deadline).await;
            outcome.record(user.name.clone(), result);
            return outcome;
        }

        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();

        for user in users {
            let fetcher = self.fetcher.clone();
            let deadline = self.user_deadline;
            let name = user.name.clone();
            let handle = tasks.spawn(async move {
                fetch_with_deadline(&fetcher, &user, mode, &cutoff, deadline).await
            });
            names.insert(handle.id(), name);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    let name = names.remove(&id).unwrap_or_default();
                    outcome.record(name, result);
                }
                Err(join_err) => {
                    let name = names.remove(&join_err.id()).unwrap_or_default();
                    outcome.record(
                        name,
                        Err(AppError::Internal(anyhow::anyhow!(
                            "Fetch task aborted: {}",
                            join_err
                        ))),
                    );
                }
            }
        }

        tracing::info!(
            fetched = outcome.scorecards.len(),
            failed = outcome.failures.len(),
            "Retrieved scorecards from API"
        );
        outcome
    }
}

/// The deadline starts when the user's task starts.
async fn fetch_with_deadline(
    fetcher: &ScorecardFetcher,
    user: &UserIdentity,
    mode: LoadMode,
    cutoff: &Cutoff,
    deadline: Duration,
) -> Result<Vec<Scorecard>, AppError> {
    fetcher
        .fetch_for_user_until(user, mode, cutoff, Instant::now() + deadline)
        .await
}
