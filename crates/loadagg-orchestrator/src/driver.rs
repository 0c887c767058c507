//! Kubernetes workload driver.
//!
//! The driver owns the lifecycle of a test's worker fleet and the two
//! observation paths over it (logs and metrics). The workload name is
//! always derived from the test id; nothing in here is persisted.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use loadagg_core::TestId;
use loadagg_store::LoadTest;

use crate::error::{OrchestratorError, Result};
use crate::job::{build_job, job_name_for_test, WORKER_APP_LABEL};
use crate::types::{JobPhase, LoadTestStatus, MetricsSnapshot, OrchestratorConfig};
use crate::{logs, metrics};

/// The `WorkloadDriver` trait defines workload lifecycle and observation.
#[async_trait]
pub trait WorkloadDriver: Send + Sync {
    /// Create the worker fleet for a test.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` when the derived name collides, or a
    /// transport error when the orchestrator is unavailable.
    async fn start(&self, test: &LoadTest) -> Result<()>;

    /// Delete a test's workload with background cascade.
    ///
    /// Idempotent on absence: deleting a missing workload succeeds, since
    /// the desired post-condition already holds.
    ///
    /// # Errors
    ///
    /// Returns an error when the orchestrator is unavailable.
    async fn stop(&self, test_id: &TestId) -> Result<()>;

    /// Project the workload's replica counters into a transient status.
    ///
    /// # Errors
    ///
    /// Returns `JobNotFound` when the workload is absent.
    async fn status(&self, test_id: &TestId) -> Result<LoadTestStatus>;

    /// Delete workloads whose completion time is older than the horizon.
    ///
    /// Per-workload failures are logged and do not abort the sweep.
    /// Returns the number of workloads deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if listing the workloads fails.
    async fn cleanup_completed(&self, older_than: Duration) -> Result<u32>;

    /// Aggregate the newest metric frame from every worker of a test.
    ///
    /// # Errors
    ///
    /// Returns an error if listing the test's pods fails.
    async fn metrics(&self, test_id: &TestId) -> Result<MetricsSnapshot>;

    /// Stream log lines for one worker pod.
    ///
    /// The returned channel is bounded; a slow consumer blocks the
    /// producer. The stream ends on cancel, on a terminal pod phase, or
    /// when the pod cannot be read.
    fn stream_logs(&self, pod_name: &str, cancel: CancellationToken) -> mpsc::Receiver<String>;
}

/// Kubernetes-backed workload driver.
#[derive(Clone)]
pub struct K8sDriver {
    client: Client,
    config: OrchestratorConfig,
}

impl K8sDriver {
    /// Create a driver, connecting via in-cluster config or kubeconfig.
    ///
    /// # Errors
    ///
    /// Returns an error if no Kubernetes configuration can be resolved.
    pub async fn new(config: OrchestratorConfig) -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client, config })
    }

    /// Create a driver with a pre-configured client.
    #[must_use]
    pub fn with_client(client: Client, config: OrchestratorConfig) -> Self {
        Self { client, config }
    }

    /// Get a reference to the driver config.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub(crate) fn jobs_api(&self) -> Api<Job> {
        Api::namespaced(self.client.clone(), &self.config.namespace)
    }

    pub(crate) fn pods_api(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.config.namespace)
    }
}

#[async_trait]
impl WorkloadDriver for K8sDriver {
    async fn start(&self, test: &LoadTest) -> Result<()> {
        let jobs = self.jobs_api();
        let name = job_name_for_test(&test.id);
        let job = build_job(test, &self.config);

        match jobs.create(&PostParams::default(), &job).await {
            Ok(_) => {
                info!(
                    test_id = %test.id,
                    job_name = %name,
                    workers = test.config.worker_count,
                    "Created load-test workload"
                );
                Ok(())
            }
            Err(kube::Error::Api(e)) if e.code == 409 => {
                Err(OrchestratorError::AlreadyExists(name))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn stop(&self, test_id: &TestId) -> Result<()> {
        let jobs = self.jobs_api();
        let name = job_name_for_test(test_id);

        // Background propagation: child pods are garbage-collected
        // asynchronously after the delete returns.
        match jobs.delete(&name, &DeleteParams::background()).await {
            Ok(_) => {
                info!(test_id = %test_id, job_name = %name, "Deleted load-test workload");
                Ok(())
            }
            Err(kube::Error::Api(e)) if e.code == 404 => {
                warn!(job_name = %name, "Workload already absent on stop");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn status(&self, test_id: &TestId) -> Result<LoadTestStatus> {
        let jobs = self.jobs_api();
        let name = job_name_for_test(test_id);

        let Some(job) = jobs.get_opt(&name).await? else {
            return Err(OrchestratorError::JobNotFound(name));
        };

        let status = job.status.unwrap_or_default();
        let active = status.active.unwrap_or(0);
        let succeeded = status.succeeded.unwrap_or(0);
        let failed = status.failed.unwrap_or(0);

        Ok(LoadTestStatus {
            test_id: test_id.clone(),
            phase: JobPhase::from_counters(active, succeeded, failed),
            active,
            succeeded,
            failed,
            start_time: status.start_time.map(|t| t.0),
        })
    }

    async fn cleanup_completed(&self, older_than: Duration) -> Result<u32> {
        let jobs = self.jobs_api();
        let params = ListParams::default().labels(&format!("app={WORKER_APP_LABEL}"));
        let list = jobs.list(&params).await?;

        let now = Utc::now();
        let mut deleted = 0;

        for job in list.items {
            let Some(name) = job.metadata.name.clone() else {
                continue;
            };
            let Some(completed_at) = job
                .status
                .as_ref()
                .and_then(|s| s.completion_time.as_ref())
                .map(|t| t.0)
            else {
                continue;
            };

            let age = now
                .signed_duration_since(completed_at)
                .to_std()
                .unwrap_or_default();
            if age <= older_than {
                continue;
            }

            match jobs.delete(&name, &DeleteParams::background()).await {
                Ok(_) => {
                    info!(job_name = %name, "Deleted completed workload");
                    deleted += 1;
                }
                Err(e) => {
                    warn!(job_name = %name, error = %e, "Failed to delete completed workload");
                }
            }
        }

        Ok(deleted)
    }

    async fn metrics(&self, test_id: &TestId) -> Result<MetricsSnapshot> {
        metrics::collect(self, test_id).await
    }

    fn stream_logs(&self, pod_name: &str, cancel: CancellationToken) -> mpsc::Receiver<String> {
        logs::spawn(self.clone(), pod_name.to_string(), cancel)
    }
}

/// A mock driver for testing without a Kubernetes cluster.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::{
        async_trait, mpsc, CancellationToken, Duration, JobPhase, LoadTest, LoadTestStatus,
        MetricsSnapshot, OrchestratorError, Result, TestId, WorkloadDriver,
    };
    use crate::job::job_name_for_test;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// A mock driver that tracks workloads in memory.
    #[derive(Default)]
    pub struct MockDriver {
        jobs: Mutex<HashMap<TestId, LoadTestStatus>>,
        snapshots: Mutex<HashMap<TestId, MetricsSnapshot>>,
        log_lines: Mutex<Vec<String>>,
        stopped: Mutex<Vec<TestId>>,
        fail_start: Mutex<bool>,
        fail_status: Mutex<bool>,
    }

    impl MockDriver {
        /// Create an empty mock driver.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the next `start` call fail.
        pub fn fail_next_start(&self) {
            *self.fail_start.lock() = true;
        }

        /// Make every `status` call fail with a transport-style error.
        pub fn fail_status(&self) {
            *self.fail_status.lock() = true;
        }

        /// Replace the tracked status of a workload.
        pub fn set_status(&self, status: LoadTestStatus) {
            self.jobs.lock().insert(status.test_id.clone(), status);
        }

        /// Remove a workload, as if it was deleted externally.
        pub fn remove_job(&self, test_id: &TestId) {
            self.jobs.lock().remove(test_id);
        }

        /// Preset the snapshot returned for a test.
        pub fn set_snapshot(&self, test_id: TestId, snapshot: MetricsSnapshot) {
            self.snapshots.lock().insert(test_id, snapshot);
        }

        /// Preset log lines replayed by `stream_logs`.
        pub fn push_log_line(&self, line: impl Into<String>) {
            self.log_lines.lock().push(line.into());
        }

        /// Tests that were stopped, in call order.
        #[must_use]
        pub fn stopped_tests(&self) -> Vec<TestId> {
            self.stopped.lock().clone()
        }

        /// Number of tracked workloads.
        #[must_use]
        pub fn job_count(&self) -> usize {
            self.jobs.lock().len()
        }
    }

    #[async_trait]
    impl WorkloadDriver for MockDriver {
        async fn start(&self, test: &LoadTest) -> Result<()> {
            if std::mem::take(&mut *self.fail_start.lock()) {
                return Err(OrchestratorError::AlreadyExists(job_name_for_test(
                    &test.id,
                )));
            }

            self.jobs.lock().insert(
                test.id.clone(),
                LoadTestStatus {
                    test_id: test.id.clone(),
                    phase: JobPhase::Pending,
                    active: 0,
                    succeeded: 0,
                    failed: 0,
                    start_time: None,
                },
            );
            Ok(())
        }

        async fn stop(&self, test_id: &TestId) -> Result<()> {
            self.stopped.lock().push(test_id.clone());
            self.jobs.lock().remove(test_id);
            Ok(())
        }

        async fn status(&self, test_id: &TestId) -> Result<LoadTestStatus> {
            if *self.fail_status.lock() {
                return Err(OrchestratorError::KubeApi(kube::Error::Api(
                    kube::core::ErrorResponse {
                        status: "Failure".to_string(),
                        message: "the server is currently unable to handle the request"
                            .to_string(),
                        reason: "ServiceUnavailable".to_string(),
                        code: 503,
                    },
                )));
            }

            self.jobs
                .lock()
                .get(test_id)
                .cloned()
                .ok_or_else(|| OrchestratorError::JobNotFound(job_name_for_test(test_id)))
        }

        async fn cleanup_completed(&self, _older_than: Duration) -> Result<u32> {
            let mut jobs = self.jobs.lock();
            let before = jobs.len();
            jobs.retain(|_, status| !status.phase.is_terminal());
            Ok(u32::try_from(before - jobs.len()).unwrap_or(0))
        }

        async fn metrics(&self, test_id: &TestId) -> Result<MetricsSnapshot> {
            Ok(self
                .snapshots
                .lock()
                .get(test_id)
                .cloned()
                .unwrap_or_else(|| MetricsSnapshot::empty(test_id.clone())))
        }

        fn stream_logs(&self, _pod_name: &str, cancel: CancellationToken) -> mpsc::Receiver<String> {
            let (tx, rx) = mpsc::channel(50);
            let lines = self.log_lines.lock().clone();
            tokio::spawn(async move {
                for line in lines {
                    tokio::select! {
                        () = cancel.cancelled() => return,
                        sent = tx.send(line) => {
                            if sent.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
            rx
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockDriver;
    use super::*;
    use chrono::Utc;
    use loadagg_core::UserId;
    use loadagg_store::{LoadTestConfig, TestStatus};

    fn make_test(id: &str) -> LoadTest {
        LoadTest {
            id: TestId::parse(id).unwrap(),
            name: "t1".to_string(),
            user_id: UserId::new("user-a"),
            target_url: "http://svc/".to_string(),
            config: LoadTestConfig {
                duration_seconds: 10,
                requests_per_sec: 5,
                max_concurrency: 10,
                worker_count: 3,
                http_method: "GET".to_string(),
                headers: None,
                body: None,
            },
            status: TestStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn mock_start_status_stop() {
        let driver = MockDriver::new();
        let test = make_test("test-1");

        driver.start(&test).await.unwrap();
        assert_eq!(driver.job_count(), 1);

        let status = driver.status(&test.id).await.unwrap();
        assert_eq!(status.phase, JobPhase::Pending);

        driver.stop(&test.id).await.unwrap();
        assert_eq!(driver.job_count(), 0);
        assert!(matches!(
            driver.status(&test.id).await,
            Err(OrchestratorError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn mock_stop_is_idempotent() {
        let driver = MockDriver::new();
        let id = TestId::parse("test-1").unwrap();

        driver.stop(&id).await.unwrap();
        driver.stop(&id).await.unwrap();
        assert_eq!(driver.stopped_tests().len(), 2);
    }

    #[tokio::test]
    async fn mock_cleanup_removes_terminal_jobs() {
        let driver = MockDriver::new();
        let running = make_test("test-1");
        let done = make_test("test-2");

        driver.start(&running).await.unwrap();
        driver.start(&done).await.unwrap();
        driver.set_status(LoadTestStatus {
            test_id: running.id.clone(),
            phase: JobPhase::Running,
            active: 3,
            succeeded: 0,
            failed: 0,
            start_time: Some(Utc::now()),
        });
        driver.set_status(LoadTestStatus {
            test_id: done.id.clone(),
            phase: JobPhase::Completed,
            active: 0,
            succeeded: 3,
            failed: 0,
            start_time: Some(Utc::now()),
        });

        let deleted = driver
            .cleanup_completed(Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(driver.job_count(), 1);
    }

    #[tokio::test]
    async fn mock_log_stream_replays_and_closes() {
        let driver = MockDriver::new();
        driver.push_log_line("line one");
        driver.push_log_line("line two");

        let mut rx = driver.stream_logs("loadtest-test-1-abcde", CancellationToken::new());
        assert_eq!(rx.recv().await.as_deref(), Some("line one"));
        assert_eq!(rx.recv().await.as_deref(), Some("line two"));
        assert!(rx.recv().await.is_none());
    }
}
