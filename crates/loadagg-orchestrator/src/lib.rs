//! Kubernetes workload orchestration for loadagg.
//!
//! This crate owns everything that touches the cluster:
//!
//! - [`WorkloadDriver`] / [`K8sDriver`]: lifecycle of the parallel worker
//!   fleet (a batch Job with N identical replicas run to completion)
//! - per-pod log streaming with follow, reconnect, and terminal draining
//! - metric-frame extraction from worker stdout and cross-worker
//!   aggregation into a [`MetricsSnapshot`]
//!
//! # Example
//!
//! ```no_run
//! use loadagg_orchestrator::{K8sDriver, OrchestratorConfig, WorkloadDriver};
//! use loadagg_core::TestId;
//!
//! # async fn example(test: loadagg_store::LoadTest) -> Result<(), Box<dyn std::error::Error>> {
//! let driver = K8sDriver::new(OrchestratorConfig::default()).await?;
//!
//! driver.start(&test).await?;
//!
//! let status = driver.status(&test.id).await?;
//! println!("phase: {:?}, active workers: {}", status.phase, status.active);
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature to get [`MockDriver`], an in-memory
//! driver for exercising the control plane without a cluster.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod driver;
pub mod error;
pub mod job;
mod logs;
pub mod metrics;
pub mod types;

pub use driver::{K8sDriver, WorkloadDriver};
pub use error::{OrchestratorError, Result};
pub use job::job_name_for_test;
pub use metrics::{last_metric_frame, stream_metrics};
pub use types::{
    AggregatedMetrics, JobPhase, LoadTestMetrics, LoadTestStatus, MetricsSnapshot,
    OrchestratorConfig, WorkerMetrics,
};

#[cfg(any(test, feature = "test-utils"))]
pub use driver::mock::MockDriver;
