//! Control plane for loadagg load tests.
//!
//! This crate coordinates the descriptor store and the workload driver:
//!
//! - [`LoadTestService`]: the request-path operations (create, get, list,
//!   status, stop, cleanup, metrics, streams), with every operation scoped
//!   to the owning user
//! - [`Reconciler`]: the background loop that writes terminal workload
//!   phases back to the store
//!
//! The store is the single source of truth for business status; the
//! orchestrator is the single source of truth for runtime phase. No
//! operation writes both without reconciling.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod reconciler;
pub mod service;
pub mod types;

pub use error::{ControlError, Result};
pub use reconciler::{Reconciler, RECONCILE_INTERVAL};
pub use service::LoadTestService;
pub use types::CreateLoadTestRequest;
