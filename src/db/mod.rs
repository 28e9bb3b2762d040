//! Database layer (embedded SQLite warehouse).

pub mod warehouse;

pub use warehouse::{LoadSummary, LoadedFile, Warehouse};

/// Table names as constants.
pub mod tables {
    /// Raw scorecard JSON, one row per user/objectId/updatedAt
    pub const RAW_SCORECARDS: &str = "raw_udisc_scorecards";
}
