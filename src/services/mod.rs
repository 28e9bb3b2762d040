// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod dispatch;
pub mod fetcher;
pub mod pipeline;
pub mod secrets;
pub mod storage;
pub mod udisc;
pub mod users;

pub use dispatch::{DispatchOutcome, Dispatcher};
pub use fetcher::{page_decision, PageDecision, ScorecardFetcher};
pub use pipeline::{Pipeline, RunReport, RunRequest};
pub use secrets::SecretStore;
pub use storage::RawStore;
pub use udisc::{CredentialCheck, UdiscClient};
pub use users::UserRegistry;
