//! Shared application state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use loadagg_auth::HmacTokenSigner;
use loadagg_control::LoadTestService;
use loadagg_orchestrator::WorkloadDriver;
use loadagg_store::Store;

use crate::config::GatewayConfig;

/// Shared state available to every request handler.
pub struct AppState<S, D>
where
    S: Store,
    D: WorkloadDriver,
{
    /// Load-test orchestration service.
    pub service: Arc<LoadTestService<S, D>>,
    /// Issues and validates bearer tokens.
    pub tokens: Arc<HmacTokenSigner>,
    /// Parent cancellation for request-spawned streams; fires on shutdown.
    pub shutdown: CancellationToken,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<S, D> AppState<S, D>
where
    S: Store,
    D: WorkloadDriver,
{
    /// Create a new application state.
    #[must_use]
    pub fn new(
        service: Arc<LoadTestService<S, D>>,
        tokens: Arc<HmacTokenSigner>,
        shutdown: CancellationToken,
        config: GatewayConfig,
    ) -> Self {
        Self {
            service,
            tokens,
            shutdown,
            config,
        }
    }
}

impl<S, D> Clone for AppState<S, D>
where
    S: Store,
    D: WorkloadDriver,
{
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            tokens: Arc::clone(&self.tokens),
            shutdown: self.shutdown.clone(),
            config: self.config.clone(),
        }
    }
}
