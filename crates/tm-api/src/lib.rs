//! # tm-api
//!
//! REST API server for Temuan.
//!
//! Session-authenticated JSON endpoints for accounts, categories, found
//! items, claims, dashboards and photo uploads, plus health checks,
//! Prometheus metrics and an OpenAPI document.

pub mod auth;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod routes;
pub mod server;
pub mod state;

#[cfg(test)]
mod test_helpers;

pub use error::ApiError;
pub use server::{ApiServer, ApiServerConfig, SessionConfig};
pub use state::AppState;
