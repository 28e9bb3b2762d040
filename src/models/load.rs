// SPDX-License-Identifier: MIT

//! Load mode and incremental cutoff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Whether a run fetches everything or stops at the warehouse cutoff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    #[default]
    Full,
    Incremental,
}

impl FromStr for LoadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(LoadMode::Full),
            "incremental" => Ok(LoadMode::Incremental),
            other => Err(format!("Unknown load mode '{}'", other)),
        }
    }
}

/// Latest already-ingested `updatedAt`, resolved once per run.
///
/// `Unresolved` covers full mode, an empty warehouse and an unreachable
/// warehouse alike: pagination then ends only on exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cutoff {
    Resolved(DateTime<Utc>),
    Unresolved,
}

impl Cutoff {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Cutoff::Resolved(ts) => Some(*ts),
            Cutoff::Unresolved => None,
        }
    }
}
