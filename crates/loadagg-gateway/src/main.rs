//! loadagg - distributed load-test orchestrator control plane.
//!
//! Wires the Postgres store, the Kubernetes workload driver, the control
//! service, and the HTTP gateway together, then runs the reconciler and
//! the server until shutdown.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loadagg_auth::HmacTokenSigner;
use loadagg_control::{LoadTestService, Reconciler};
use loadagg_gateway::{create_router, AppState, DbConfig, GatewayConfig};
use loadagg_orchestrator::{K8sDriver, OrchestratorConfig};
use loadagg_store::PgStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,loadagg=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting loadagg control plane");

    // Configuration; missing secrets are fatal.
    let jwt_secret =
        std::env::var("JWT_SECRET").map_err(|_| "JWT_SECRET environment variable is required")?;
    let db_config = DbConfig::from_env()?;
    let gateway_config = GatewayConfig::from_env();
    let namespace =
        std::env::var("LOADTEST_NAMESPACE").unwrap_or_else(|_| "loadtest".to_string());

    tracing::info!(
        listen_addr = %gateway_config.listen_addr,
        db_host = %db_config.host,
        db_name = %db_config.name,
        namespace = %namespace,
        "Configuration loaded"
    );

    // Schema migrations are applied externally at deploy time; the pool
    // assumes the tables exist.
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect_with(db_config.connect_options()?)
        .await?;
    let store = Arc::new(PgStore::new(pool));
    tracing::info!("Connected to Postgres");

    let driver = Arc::new(K8sDriver::new(OrchestratorConfig::with_namespace(namespace)).await?);
    tracing::info!("Connected to Kubernetes cluster");

    let service = Arc::new(LoadTestService::new(
        Arc::clone(&store),
        Arc::clone(&driver),
    ));
    let tokens = Arc::new(HmacTokenSigner::new(&jwt_secret));

    // One parent token: the reconciler and every request-spawned stream
    // hang off it so nothing outlives shutdown.
    let shutdown = CancellationToken::new();

    let reconciler = Reconciler::new(store, driver);
    tokio::spawn(reconciler.run(shutdown.child_token()));
    tracing::info!("Started reconciler loop");

    let state = AppState::new(service, tokens, shutdown.clone(), gateway_config.clone());
    let app = create_router(state);

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_shutdown.cancel();
        }
    });

    tracing::info!(listen_addr = %gateway_config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&gateway_config.listen_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
