//! HTTP gateway for the loadagg load-test orchestrator.
//!
//! This crate provides the public API surface:
//!
//! - Bearer-authenticated load-test endpoints (create, list, get, status,
//!   stop, cleanup, metrics)
//! - SSE streams for live metrics snapshots and per-pod log lines
//! - Signup/login endpoints issuing HS256 tokens
//!
//! Every load-test handler extracts an [`AuthUser`] first; an invalid or
//! missing token rejects the request before the handler body runs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::AuthUser;
pub use config::{ConfigError, DbConfig, GatewayConfig};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
