//! Router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use loadagg_orchestrator::WorkloadDriver;
use loadagg_store::Store;

use crate::handlers::{auth, health, loadtests};
use crate::state::AppState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `POST /api/auth/signup` - Create an account
/// - `POST /api/auth/login` - Exchange credentials for a token
///
/// ## Load tests (bearer-authenticated)
/// - `POST /api/v1/loadtests` - Create and start a test
/// - `GET /api/v1/loadtests` - List the caller's tests
/// - `GET /api/v1/loadtests/{id}` - Get a test
/// - `GET /api/v1/loadtests/{id}/status` - Workload status
/// - `DELETE /api/v1/loadtests/{id}` - Stop a test
/// - `POST /api/v1/loadtests/{id}/stop` - Stop a test
/// - `POST /api/v1/loadtests/cleanup` - Delete old completed workloads
/// - `GET /api/v1/loadtests/{id}/metrics` - One aggregated snapshot
/// - `GET /api/v1/loadtests/{id}/metrics/stream` - SSE snapshot stream
/// - `GET /api/v1/loadtests/{id}/logs/{pod}` - SSE log stream for one pod
pub fn create_router<S, D>(state: AppState<S, D>) -> Router
where
    S: Store + 'static,
    D: WorkloadDriver + 'static,
{
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let state = Arc::new(state);

    Router::new()
        // Health (public)
        .route("/health", get(health::health))
        // Accounts
        .route("/api/auth/signup", post(auth::signup::<S, D>))
        .route("/api/auth/login", post(auth::login::<S, D>))
        // Load tests
        .route(
            "/api/v1/loadtests",
            get(loadtests::list_load_tests::<S, D>).post(loadtests::create_load_test::<S, D>),
        )
        .route(
            "/api/v1/loadtests/cleanup",
            post(loadtests::cleanup_workloads::<S, D>),
        )
        .route(
            "/api/v1/loadtests/{id}",
            get(loadtests::get_load_test::<S, D>).delete(loadtests::stop_load_test::<S, D>),
        )
        .route(
            "/api/v1/loadtests/{id}/status",
            get(loadtests::get_load_test_status::<S, D>),
        )
        .route(
            "/api/v1/loadtests/{id}/stop",
            post(loadtests::stop_load_test::<S, D>),
        )
        // Observability
        .route(
            "/api/v1/loadtests/{id}/metrics",
            get(loadtests::get_load_test_metrics::<S, D>),
        )
        .route(
            "/api/v1/loadtests/{id}/metrics/stream",
            get(loadtests::stream_load_test_metrics::<S, D>),
        )
        .route(
            "/api/v1/loadtests/{id}/logs/{pod}",
            get(loadtests::stream_pod_logs::<S, D>),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
