//! Error types for the control plane.

use thiserror::Error;

use loadagg_core::TestId;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in control-plane operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The test does not exist, or the caller does not own it.
    ///
    /// The two cases are deliberately indistinguishable so existence does
    /// not leak across users.
    #[error("load test not found: {0}")]
    TestNotFound(TestId),

    /// The named pod does not belong to the test.
    #[error("pod not found: {0}")]
    PodNotFound(String),

    /// The request failed validation; the message surfaces verbatim.
    #[error("{0}")]
    Validation(String),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] loadagg_store::StoreError),

    /// Workload orchestrator error.
    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] loadagg_orchestrator::OrchestratorError),
}
