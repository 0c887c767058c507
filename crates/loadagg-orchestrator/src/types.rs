//! Transient status and metrics types.
//!
//! Nothing in this module is persisted. Status is derived from the
//! workload's replica counters on every read; metrics are re-aggregated
//! from worker stdout on every sample.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loadagg_core::TestId;

/// Runtime phase of a load-test workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobPhase {
    /// No replica has started yet.
    Pending,
    /// At least one replica is active.
    Running,
    /// Every replica exited successfully.
    Completed,
    /// A replica failed and none are active.
    Failed,
}

impl JobPhase {
    /// Derive the phase from the workload's replica counters.
    ///
    /// First match wins: an active replica means `Running` even when
    /// earlier replicas already succeeded or failed.
    #[must_use]
    pub const fn from_counters(active: i32, succeeded: i32, failed: i32) -> Self {
        if active > 0 {
            Self::Running
        } else if succeeded > 0 {
            Self::Completed
        } else if failed > 0 {
            Self::Failed
        } else {
            Self::Pending
        }
    }

    /// Check if the phase is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

/// Point-in-time projection of a workload's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTestStatus {
    /// The test this status belongs to.
    pub test_id: TestId,
    /// Derived runtime phase.
    pub phase: JobPhase,
    /// Replicas currently running.
    pub active: i32,
    /// Replicas that exited successfully.
    pub succeeded: i32,
    /// Replicas that failed.
    pub failed: i32,
    /// When the workload started, if it has.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
}

/// One metric frame emitted by a worker on its stdout.
///
/// Workers print these periodically behind a `METRICS:` sentinel; unknown
/// fields are ignored so worker images can evolve independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTestMetrics {
    /// Requests sent so far.
    pub total_requests: i64,
    /// Requests answered with a success status.
    pub successful_requests: i64,
    /// Requests that errored or got a failure status.
    pub failed_requests: i64,
    /// Mean response time in seconds.
    pub avg_response_time: f64,
    /// Response count per status code.
    #[serde(default)]
    pub status_codes: BTreeMap<String, i64>,
    /// When the worker emitted this frame.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Per-worker metrics included in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerMetrics {
    /// Worker identifier (the pod name).
    pub worker_id: String,
    /// Pod the frame was read from.
    pub pod_name: String,
    /// Requests sent so far.
    pub total_requests: i64,
    /// Requests answered with a success status.
    pub successful_requests: i64,
    /// Requests that errored or got a failure status.
    pub failed_requests: i64,
    /// Mean response time in seconds.
    pub avg_response_time: f64,
    /// When the worker last reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

/// Aggregated totals across every worker of a test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    /// Sum of worker request counts.
    pub total_requests: i64,
    /// Sum of worker success counts.
    pub successful_requests: i64,
    /// Sum of worker failure counts.
    pub failed_requests: i64,
    /// `failed / total * 100`; zero when no requests were made.
    pub overall_error_rate: f64,
    /// Request-weighted mean response time in seconds.
    pub avg_response_time: f64,
    /// `total / elapsed` over the workload's own wall clock.
    pub requests_per_second: f64,
    /// Response counts per status code, summed across workers.
    pub status_code_breakdown: BTreeMap<String, i64>,
    /// Workers that contributed a frame to this snapshot.
    pub active_workers: usize,
}

/// A point-in-time aggregated metrics view across all workers of one test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// The test this snapshot belongs to.
    pub test_id: TestId,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Per-worker breakdown.
    pub workers: Vec<WorkerMetrics>,
    /// Cross-worker totals.
    pub summary: AggregatedMetrics,
}

impl MetricsSnapshot {
    /// An empty snapshot for a test with no reporting workers.
    #[must_use]
    pub fn empty(test_id: TestId) -> Self {
        Self {
            test_id,
            timestamp: Utc::now(),
            workers: Vec::new(),
            summary: AggregatedMetrics::default(),
        }
    }
}

/// Configuration for the workload driver.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Kubernetes namespace for load-test workloads.
    pub namespace: String,
    /// Container image for the traffic-generating worker.
    pub worker_image: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            namespace: "loadtest".to_string(),
            worker_image: "vinayak9769/loadtest-worker:latest".to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Create a config with the given namespace.
    #[must_use]
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_derivation_first_match_wins() {
        // All eight boolean combinations of (active, succeeded, failed).
        assert_eq!(JobPhase::from_counters(0, 0, 0), JobPhase::Pending);
        assert_eq!(JobPhase::from_counters(0, 0, 1), JobPhase::Failed);
        assert_eq!(JobPhase::from_counters(0, 1, 0), JobPhase::Completed);
        assert_eq!(JobPhase::from_counters(0, 1, 1), JobPhase::Completed);
        assert_eq!(JobPhase::from_counters(1, 0, 0), JobPhase::Running);
        assert_eq!(JobPhase::from_counters(1, 0, 1), JobPhase::Running);
        assert_eq!(JobPhase::from_counters(1, 1, 0), JobPhase::Running);
        assert_eq!(JobPhase::from_counters(1, 1, 1), JobPhase::Running);
    }

    #[test]
    fn phase_terminality() {
        assert!(JobPhase::Completed.is_terminal());
        assert!(JobPhase::Failed.is_terminal());
        assert!(!JobPhase::Running.is_terminal());
        assert!(!JobPhase::Pending.is_terminal());
    }

    #[test]
    fn phase_serializes_as_capitalized_string() {
        assert_eq!(
            serde_json::to_string(&JobPhase::Running).unwrap(),
            "\"Running\""
        );
    }

    #[test]
    fn config_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.namespace, "loadtest");
        assert_eq!(config.worker_image, "vinayak9769/loadtest-worker:latest");

        let custom = OrchestratorConfig::with_namespace("staging");
        assert_eq!(custom.namespace, "staging");
        assert_eq!(custom.worker_image, config.worker_image);
    }

    #[test]
    fn empty_snapshot_has_zeroed_summary() {
        let snapshot = MetricsSnapshot::empty(TestId::parse("test-1").unwrap());
        assert!(snapshot.workers.is_empty());
        assert_eq!(snapshot.summary.total_requests, 0);
        assert_eq!(snapshot.summary.active_workers, 0);
    }
}
