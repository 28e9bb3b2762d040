// SPDX-License-Identifier: MIT

//! Middleware modules (task authentication, response headers).

pub mod security;
pub mod tasks_auth;

pub use tasks_auth::require_tasks_auth;
