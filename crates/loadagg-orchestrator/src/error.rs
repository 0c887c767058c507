//! Error types for workload orchestration.

use thiserror::Error;

/// A result type using `OrchestratorError`.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors that can occur while driving workloads and reading pods.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The orchestrator API call failed (transport or server error).
    #[error("Kubernetes API error: {0}")]
    KubeApi(#[from] kube::Error),

    /// The workload for a test does not exist.
    ///
    /// The reconciler interprets this as "terminal, assume completed".
    #[error("workload not found: {0}")]
    JobNotFound(String),

    /// A workload with the derived name already exists.
    #[error("workload already exists: {0}")]
    AlreadyExists(String),

    /// Reading a log stream failed mid-flight.
    #[error("log stream error: {0}")]
    LogStream(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Check whether this error means the workload is absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::JobNotFound(_))
    }
}
