//! Load-test control service.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use loadagg_core::{TestId, UserId};
use loadagg_orchestrator::{
    job_name_for_test, stream_metrics, LoadTestStatus, MetricsSnapshot, WorkloadDriver,
};
use loadagg_store::{LoadTest, Store, TestStatus};

use crate::error::{ControlError, Result};
use crate::types::CreateLoadTestRequest;

/// Coordinates the descriptor store and the workload driver.
///
/// Every operation on a test id verifies that the caller owns the test;
/// a failed check is indistinguishable from a missing test.
pub struct LoadTestService<S: Store, D: WorkloadDriver> {
    store: Arc<S>,
    driver: Arc<D>,
}

impl<S, D> LoadTestService<S, D>
where
    S: Store + 'static,
    D: WorkloadDriver + 'static,
{
    /// Create a new service over shared store and driver handles.
    #[must_use]
    pub fn new(store: Arc<S>, driver: Arc<D>) -> Self {
        Self { store, driver }
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    async fn verify_ownership(&self, user_id: &UserId, test_id: &TestId) -> Result<()> {
        if self.store.owns_test(test_id, user_id).await? {
            Ok(())
        } else {
            Err(ControlError::TestNotFound(test_id.clone()))
        }
    }

    /// Create a load test: persist it as `pending`, start the workload,
    /// and flip the row to `running`.
    ///
    /// On a start failure the row is flipped to `failed` (the record
    /// remains for auditability) and a best-effort stop tears down
    /// whatever the orchestrator may have partially created.
    ///
    /// # Errors
    ///
    /// Returns a validation error, a store error, or the start failure.
    pub async fn create_test(
        &self,
        user_id: &UserId,
        request: CreateLoadTestRequest,
    ) -> Result<LoadTest> {
        request.validate()?;

        let mut test = LoadTest {
            id: TestId::generate(),
            name: request.name,
            user_id: user_id.clone(),
            target_url: request.target_url,
            config: request.config,
            status: TestStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        };

        self.store.insert_test(&test).await?;

        if let Err(e) = self.driver.start(&test).await {
            error!(test_id = %test.id, error = %e, "Failed to start load test, marking as failed");
            if let Err(store_err) = self.store.update_status(&test.id, TestStatus::Failed).await {
                error!(test_id = %test.id, error = %store_err, "Failed to record start failure");
            }
            if let Err(stop_err) = self.driver.stop(&test.id).await {
                warn!(test_id = %test.id, error = %stop_err, "Teardown after failed start did not complete");
            }
            return Err(e.into());
        }

        self.store
            .update_status(&test.id, TestStatus::Running)
            .await?;
        test.status = TestStatus::Running;

        info!(
            test_id = %test.id,
            user_id = %user_id,
            name = %test.name,
            workers = test.config.worker_count,
            "Started load test"
        );

        Ok(test)
    }

    /// Get a test by id, scoped to its owner.
    ///
    /// # Errors
    ///
    /// Returns `TestNotFound` when missing or owned by someone else.
    pub async fn get_test(&self, user_id: &UserId, test_id: &TestId) -> Result<LoadTest> {
        self.store
            .get_test(test_id, user_id)
            .await?
            .ok_or_else(|| ControlError::TestNotFound(test_id.clone()))
    }

    /// List the caller's tests, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    pub async fn list_tests(&self, user_id: &UserId) -> Result<Vec<LoadTest>> {
        Ok(self.store.list_tests(user_id).await?)
    }

    /// Read the runtime status of a test's workload.
    ///
    /// # Errors
    ///
    /// Returns `TestNotFound` when not owned, or the driver's error when
    /// the workload cannot be read.
    pub async fn test_status(&self, user_id: &UserId, test_id: &TestId) -> Result<LoadTestStatus> {
        self.verify_ownership(user_id, test_id).await?;
        Ok(self.driver.status(test_id).await?)
    }

    /// Stop a test: delete its workload and mark the row `stopped`.
    ///
    /// The completion time is stamped here rather than waiting for the
    /// reconciler, which only revisits `running` rows.
    ///
    /// # Errors
    ///
    /// Returns `TestNotFound` when not owned, or a driver/store error.
    pub async fn stop_test(&self, user_id: &UserId, test_id: &TestId) -> Result<()> {
        self.verify_ownership(user_id, test_id).await?;

        self.driver.stop(test_id).await?;
        self.store
            .update_status(test_id, TestStatus::Stopped)
            .await?;
        self.store.set_completed(test_id).await?;

        info!(test_id = %test_id, user_id = %user_id, "Stopped load test");

        Ok(())
    }

    /// Delete completed workloads older than the horizon.
    ///
    /// # Errors
    ///
    /// Returns an error if listing the workloads fails.
    pub async fn cleanup(&self, older_than: Duration) -> Result<u32> {
        let deleted = self.driver.cleanup_completed(older_than).await?;
        info!(deleted, "Cleaned up completed workloads");
        Ok(deleted)
    }

    /// Aggregate one metrics snapshot across the test's workers.
    ///
    /// # Errors
    ///
    /// Returns `TestNotFound` when not owned, or the driver's error.
    pub async fn test_metrics(
        &self,
        user_id: &UserId,
        test_id: &TestId,
    ) -> Result<MetricsSnapshot> {
        self.verify_ownership(user_id, test_id).await?;
        Ok(self.driver.metrics(test_id).await?)
    }

    /// Open a periodic metrics stream for a test.
    ///
    /// # Errors
    ///
    /// Returns `TestNotFound` when not owned.
    pub async fn stream_test_metrics(
        &self,
        user_id: &UserId,
        test_id: &TestId,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<MetricsSnapshot>> {
        self.verify_ownership(user_id, test_id).await?;
        Ok(stream_metrics(
            Arc::clone(&self.driver),
            test_id.clone(),
            cancel,
        ))
    }

    /// Open a log stream for one worker pod of a test.
    ///
    /// # Errors
    ///
    /// Returns `TestNotFound` when not owned, or `PodNotFound` when the
    /// pod name does not belong to the test's workload.
    pub async fn stream_pod_logs(
        &self,
        user_id: &UserId,
        test_id: &TestId,
        pod_name: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<String>> {
        self.verify_ownership(user_id, test_id).await?;

        // Pods of a workload are named `loadtest-<id>-<suffix>`; anything
        // else would let one test read another test's logs.
        let prefix = format!("{}-", job_name_for_test(test_id));
        if !pod_name.starts_with(&prefix) {
            return Err(ControlError::PodNotFound(pod_name.to_string()));
        }

        Ok(self.driver.stream_logs(pod_name, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadagg_orchestrator::{JobPhase, MockDriver, OrchestratorError};
    use loadagg_store::{LoadTestConfig, MemoryStore};

    fn setup() -> (LoadTestService<MemoryStore, MockDriver>, Arc<MemoryStore>, Arc<MockDriver>) {
        let store = Arc::new(MemoryStore::new());
        let driver = Arc::new(MockDriver::new());
        let service = LoadTestService::new(Arc::clone(&store), Arc::clone(&driver));
        (service, store, driver)
    }

    fn valid_request() -> CreateLoadTestRequest {
        CreateLoadTestRequest {
            name: "t1".to_string(),
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
        }
    }

    #[tokio::test]
    async fn create_test_success() {
        let (service, store, driver) = setup();
        let user = UserId::new("user-a");

        let test = service.create_test(&user, valid_request()).await.unwrap();

        assert_eq!(test.status, TestStatus::Running);
        assert_eq!(driver.job_count(), 1);
        assert_eq!(
            store.get_any(&test.id).unwrap().status,
            TestStatus::Running
        );
    }

    #[tokio::test]
    async fn create_test_rejects_invalid_request_without_inserting() {
        let (service, store, _driver) = setup();
        let user = UserId::new("user-a");

        let mut request = valid_request();
        request.config.worker_count = 0;

        let result = service.create_test(&user, request).await;
        assert!(matches!(
            result,
            Err(ControlError::Validation(msg)) if msg == "worker_count must be greater than 0"
        ));
        assert_eq!(store.test_count(), 0);
    }

    #[tokio::test]
    async fn create_test_start_failure_marks_failed_and_tears_down() {
        let (service, store, driver) = setup();
        let user = UserId::new("user-a");
        driver.fail_next_start();

        let result = service.create_test(&user, valid_request()).await;
        assert!(matches!(result, Err(ControlError::Orchestrator(_))));

        // The row remains, flipped to failed.
        let ids = store
            .list_ids_by_status(TestStatus::Failed)
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);

        // A best-effort stop was issued against the (possibly partial) workload.
        assert_eq!(driver.stopped_tests(), ids);
    }

    #[tokio::test]
    async fn get_test_is_scoped_to_owner() {
        let (service, _store, _driver) = setup();
        let owner = UserId::new("user-a");
        let stranger = UserId::new("user-b");

        let test = service.create_test(&owner, valid_request()).await.unwrap();

        assert!(service.get_test(&owner, &test.id).await.is_ok());
        assert!(matches!(
            service.get_test(&stranger, &test.id).await,
            Err(ControlError::TestNotFound(_))
        ));
        assert!(service.list_tests(&stranger).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_requires_ownership_and_projects_driver_view() {
        let (service, _store, driver) = setup();
        let owner = UserId::new("user-a");
        let stranger = UserId::new("user-b");

        let test = service.create_test(&owner, valid_request()).await.unwrap();
        driver.set_status(LoadTestStatus {
            test_id: test.id.clone(),
            phase: JobPhase::Running,
            active: 3,
            succeeded: 0,
            failed: 0,
            start_time: Some(Utc::now()),
        });

        let status = service.test_status(&owner, &test.id).await.unwrap();
        assert_eq!(status.phase, JobPhase::Running);
        assert_eq!(status.active, 3);

        assert!(matches!(
            service.test_status(&stranger, &test.id).await,
            Err(ControlError::TestNotFound(_))
        ));
    }

    #[tokio::test]
    async fn stop_test_marks_stopped_with_completion_time() {
        let (service, store, driver) = setup();
        let user = UserId::new("user-a");

        let test = service.create_test(&user, valid_request()).await.unwrap();
        service.stop_test(&user, &test.id).await.unwrap();

        let row = store.get_any(&test.id).unwrap();
        assert_eq!(row.status, TestStatus::Stopped);
        assert!(row.completed_at.is_some());
        assert!(driver.stopped_tests().contains(&test.id));
    }

    #[tokio::test]
    async fn stream_pod_logs_rejects_foreign_pods() {
        let (service, _store, _driver) = setup();
        let user = UserId::new("user-a");

        let test = service.create_test(&user, valid_request()).await.unwrap();

        let result = service
            .stream_pod_logs(
                &user,
                &test.id,
                "loadtest-test-other-abcde",
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(ControlError::PodNotFound(_))));

        let own_pod = format!("loadtest-{}-abcde", test.id);
        assert!(service
            .stream_pod_logs(&user, &test.id, &own_pod, CancellationToken::new())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn metrics_requires_ownership() {
        let (service, _store, _driver) = setup();
        let owner = UserId::new("user-a");
        let stranger = UserId::new("user-b");

        let test = service.create_test(&owner, valid_request()).await.unwrap();

        assert!(service.test_metrics(&owner, &test.id).await.is_ok());
        assert!(matches!(
            service.test_metrics(&stranger, &test.id).await,
            Err(ControlError::TestNotFound(_))
        ));
    }

    #[tokio::test]
    async fn status_surfaces_missing_workload() {
        let (service, _store, driver) = setup();
        let user = UserId::new("user-a");

        let test = service.create_test(&user, valid_request()).await.unwrap();
        driver.remove_job(&test.id);

        assert!(matches!(
            service.test_status(&user, &test.id).await,
            Err(ControlError::Orchestrator(OrchestratorError::JobNotFound(_)))
        ));
    }
}
