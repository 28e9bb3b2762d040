// SPDX-License-Identifier: MIT

//! Scorecard records as returned by the UDisc Parse API.

use crate::time_utils::parse_utc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Records requested per page. A shorter page means there is no next page.
pub const PAGE_SIZE: usize = 50;

/// One played round. Opaque apart from `objectId` and `updatedAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scorecard(pub serde_json::Value);

impl Scorecard {
    /// Raw `updatedAt` string, if present.
    pub fn updated_at_raw(&self) -> Option<&str> {
        self.0.get("updatedAt").and_then(|v| v.as_str())
    }

    /// Parsed `updatedAt`. `None` when missing or not ISO-8601.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at_raw().and_then(parse_utc)
    }

    /// Parse `objectId`, if present.
    pub fn object_id(&self) -> Option<&str> {
        self.0.get("objectId").and_then(|v| v.as_str())
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for Scorecard {
    fn from(value: serde_json::Value) -> Self {
        Scorecard(value)
    }
}

/// Scorecards of one run, keyed by user name.
pub type FetchResult = BTreeMap<String, Vec<Scorecard>>;
