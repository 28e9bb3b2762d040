// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod load;
pub mod scorecard;
pub mod user;

pub use load::{Cutoff, LoadMode};
pub use scorecard::{FetchResult, Scorecard, PAGE_SIZE};
pub use user::{Role, Session, UserIdentity, UserSummary};
