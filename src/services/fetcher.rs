// SPDX-License-Identifier: MIT

//! Scorecard fetching for one user.
//!
//! Workflow:
//! 1. Log in (fresh session per run)
//! 2. Request pages of 50 in ascending `updatedAt` order, advancing `skip`
//! 3. Stop on a short page, on the incremental cutoff, on the first
//!    failed page or at the user deadline (keeping what was already fetched)

use crate::error::{AppError, Result};
use crate::models::{Cutoff, LoadMode, Scorecard, Session, UserIdentity, PAGE_SIZE};
use crate::services::UdiscClient;
use tokio::time::Instant;

/// What to do after a page has been appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDecision {
    /// Full page, keep going.
    Continue,
    /// Fewer than `PAGE_SIZE` records: no next page.
    Exhausted,
    /// Last record is at or before the cutoff.
    CutoffReached,
}

/// Decide whether pagination continues after `page`.
///
/// Only the last record of the page is compared against the cutoff. A page
/// straddling the cutoff is therefore kept whole, and may contain records
/// that are already in the warehouse; the loader deduplicates them.
pub fn page_decision(page: &[Scorecard], mode: LoadMode, cutoff: &Cutoff) -> PageDecision {
    if page.len() < PAGE_SIZE {
        return PageDecision::Exhausted;
    }

    if mode == LoadMode::Incremental {
        if let Cutoff::Resolved(cutoff_ts) = cutoff {
            let last_ts = page.last().and_then(Scorecard::updated_at);
            if matches!(last_ts, Some(ts) if ts <= *cutoff_ts) {
                return PageDecision::CutoffReached;
            }
        }
    }

    PageDecision::Continue
}

/// Fetches every scorecard visible to one user.
#[derive(Clone)]
pub struct ScorecardFetcher {
    client: UdiscClient,
}

impl ScorecardFetcher {
    pub fn new(client: UdiscClient) -> Self {
        Self { client }
    }

    /// Log the user in and page through their scorecards.
    ///
    /// Errors only for missing credentials or a failed login. Page failures
    /// end the loop and return the partial result.
    pub async fn fetch_for_user(
        &self,
        user: &UserIdentity,
        mode: LoadMode,
        cutoff: &Cutoff,
    ) -> Result<Vec<Scorecard>> {
        self.fetch(user, mode, cutoff, None).await
    }

    /// Like `fetch_for_user`, bounded by `deadline`.
    ///
    /// A login still pending at the deadline is an error. Once logged in,
    /// reaching the deadline ends pagination like a failed page: the pages
    /// already fetched are returned.
    pub async fn fetch_for_user_until(
        &self,
        user: &UserIdentity,
        mode: LoadMode,
        cutoff: &Cutoff,
        deadline: Instant,
    ) -> Result<Vec<Scorecard>> {
        self.fetch(user, mode, cutoff, Some(deadline)).await
    }

    async fn fetch(
        &self,
        user: &UserIdentity,
        mode: LoadMode,
        cutoff: &Cutoff,
        deadline: Option<Instant>,
    ) -> Result<Vec<Scorecard>> {
        let login = self.client.login(user);
        let session = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, login)
                .await
                .map_err(|_| {
                    AppError::UdiscApi(format!("Login for {} exceeded deadline", user.name))
                })??,
            None => login.await?,
        };

        match (mode, cutoff) {
            (LoadMode::Incremental, Cutoff::Resolved(ts)) => tracing::info!(
                user = %user.name,
                cutoff = %ts,
                "Incremental mode: fetching scorecards newer than cutoff"
            ),
            (LoadMode::Incremental, Cutoff::Unresolved) => tracing::info!(
                user = %user.name,
                "Incremental mode without cutoff: fetching all scorecards"
            ),
            (LoadMode::Full, _) => {
                tracing::info!(user = %user.name, "Full load mode: fetching all scorecards")
            }
        }

        let scorecards = self
            .paginate(&user.name, &session, mode, cutoff, deadline)
            .await;

        tracing::info!(
            user = %user.name,
            count = scorecards.len(),
            "Fetched scorecards from API"
        );
        Ok(scorecards)
    }

    /// Pagination loop over an already authenticated session.
    pub async fn paginate(
        &self,
        user_name: &str,
        session: &Session,
        mode: LoadMode,
        cutoff: &Cutoff,
        deadline: Option<Instant>,
    ) -> Vec<Scorecard> {
        let mut accumulated: Vec<Scorecard> = Vec::new();
        let mut skip = 0usize;

        loop {
            let request = self.client.list_scorecards(session, skip);
            let result = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, request).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(
                            user = %user_name,
                            skip,
                            fetched = accumulated.len(),
                            "User deadline reached, keeping partial results"
                        );
                        break;
                    }
                },
                None => request.await,
            };

            let page = match result {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(
                        user = %user_name,
                        skip,
                        error = %e,
                        "Failed to fetch scorecard page, keeping partial results"
                    );
                    break;
                }
            };

            let decision = page_decision(&page, mode, cutoff);
            tracing::debug!(user = %user_name, skip, count = page.len(), ?decision, "Fetched page");
            accumulated.extend(page);

            match decision {
                PageDecision::Continue => skip += PAGE_SIZE,
                PageDecision::Exhausted => {
                    tracing::debug!(user = %user_name, "Short page, ending pagination");
                    break;
                }
                PageDecision::CutoffReached => {
                    tracing::info!(
                        user = %user_name,
                        skip,
                        "Reached scorecards at or before cutoff, stopping pagination"
                    );
                    break;
                }
            }
        }

        accumulated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_utils::parse_utc;
    use serde_json::json;

    fn page(n: usize, last_updated: &str) -> Vec<Scorecard> {
        (0..n)
            .map(|i| {
                let ts = if i + 1 == n {
                    last_updated.to_string()
                } else {
                    "2023-06-01T00:00:00.000Z".to_string()
                };
                Scorecard(json!({ "objectId": format!("c{}", i), "updatedAt": ts }))
            })
            .collect()
    }

    fn cutoff(ts: &str) -> Cutoff {
        Cutoff::Resolved(parse_utc(ts).unwrap())
    }

    #[test]
    fn test_short_page_is_exhausted() {
        let p = page(12, "2030-01-01T00:00:00Z");
        assert_eq!(
            page_decision(&p, LoadMode::Full, &Cutoff::Unresolved),
            PageDecision::Exhausted
        );
        assert_eq!(
            page_decision(&[], LoadMode::Incremental, &cutoff("2024-01-01T00:00:00Z")),
            PageDecision::Exhausted
        );
    }

    #[test]
    fn test_cutoff_equal_stops() {
        let p = page(PAGE_SIZE, "2024-01-01T00:00:00.000Z");
        assert_eq!(
            page_decision(&p, LoadMode::Incremental, &cutoff("2024-01-01T00:00:00Z")),
            PageDecision::CutoffReached
        );
    }

    #[test]
    fn test_newer_last_record_continues() {
        let p = page(PAGE_SIZE, "2024-01-01T00:00:01Z");
        assert_eq!(
            page_decision(&p, LoadMode::Incremental, &cutoff("2024-01-01T00:00:00Z")),
            PageDecision::Continue
        );
    }

    #[test]
    fn test_full_mode_ignores_cutoff() {
        let p = page(PAGE_SIZE, "2020-01-01T00:00:00Z");
        assert_eq!(
            page_decision(&p, LoadMode::Full, &cutoff("2024-01-01T00:00:00Z")),
            PageDecision::Continue
        );
    }

    #[test]
    fn test_unparseable_last_timestamp_continues() {
        let mut p = page(PAGE_SIZE, "2020-01-01T00:00:00Z");
        p[PAGE_SIZE - 1] = Scorecard(json!({ "objectId": "x" }));
        assert_eq!(
            page_decision(&p, LoadMode::Incremental, &cutoff("2024-01-01T00:00:00Z")),
            PageDecision::Continue
        );
    }
}
