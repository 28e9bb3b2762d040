// SPDX-License-Identifier: MIT

//! Disc Golf ETL: UDisc scorecards into an analytical warehouse
//!
//! This crate logs configured users into the UDisc Parse API, pages
//! through their scorecards (fully or incrementally), stores the raw
//! JSON per run and loads it into an embedded warehouse.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{Pipeline, UdiscClient};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub pipeline: Pipeline,
    /// Client for one-off calls outside a run (credential checks)
    pub udisc: UdiscClient,
}
