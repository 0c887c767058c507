//! Periodic convergence of store status with orchestrator phase.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use loadagg_core::TestId;
use loadagg_orchestrator::{JobPhase, WorkloadDriver};
use loadagg_store::{Store, TestStatus};

/// How often the reconciler polls running tests.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Background loop that writes terminal workload phases back to the store.
///
/// A workload's terminal transition does not notify the control plane;
/// polling bounds staleness to one tick. Writes are idempotent and
/// monotonic: only `running` rows are revisited, so a terminal status is
/// never overwritten.
pub struct Reconciler<S: Store, D: WorkloadDriver> {
    store: Arc<S>,
    driver: Arc<D>,
}

impl<S, D> Reconciler<S, D>
where
    S: Store + 'static,
    D: WorkloadDriver + 'static,
{
    /// Create a reconciler over shared store and driver handles.
    #[must_use]
    pub fn new(store: Arc<S>, driver: Arc<D>) -> Self {
        Self { store, driver }
    }

    /// Run until the token is cancelled. Spawn this as a background task
    /// with a parent cancellation that fires on process shutdown.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(RECONCILE_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!("Starting load-test reconciler");

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Reconciler shutting down");
                    return;
                }
                _ = ticker.tick() => self.reconcile_once().await,
            }
        }
    }

    /// Run a single reconciliation pass over every running test.
    pub async fn reconcile_once(&self) {
        let ids = match self.store.list_ids_by_status(TestStatus::Running).await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "Failed to list running tests");
                return;
            }
        };

        if !ids.is_empty() {
            debug!(count = ids.len(), "Checking running load tests");
        }

        for id in ids {
            match self.driver.status(&id).await {
                Ok(status) => match status.phase {
                    JobPhase::Completed => {
                        info!(test_id = %id, "Workload completed, updating store");
                        self.mark_terminal(&id, TestStatus::Completed).await;
                    }
                    JobPhase::Failed => {
                        info!(test_id = %id, "Workload failed, updating store");
                        self.mark_terminal(&id, TestStatus::Failed).await;
                    }
                    JobPhase::Running | JobPhase::Pending => {}
                },
                Err(e) if e.is_not_found() => {
                    // Deleted out from under us or purged by cleanup; treat
                    // as terminal so the record does not linger.
                    info!(test_id = %id, "Workload missing, marking test completed");
                    self.mark_terminal(&id, TestStatus::Completed).await;
                }
                Err(e) => {
                    warn!(test_id = %id, error = %e, "Failed to read workload status, will retry");
                }
            }
        }
    }

    async fn mark_terminal(&self, id: &TestId, status: TestStatus) {
        if let Err(e) = self.store.update_status(id, status).await {
            error!(test_id = %id, error = %e, "Failed to update test status");
            return;
        }
        if let Err(e) = self.store.set_completed(id).await {
            error!(test_id = %id, error = %e, "Failed to set completion time");
        }
    }
}
