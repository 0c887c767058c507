//! Load-test management endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use loadagg_control::CreateLoadTestRequest;
use loadagg_core::TestId;
use loadagg_orchestrator::WorkloadDriver;
use loadagg_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Response for operations that only report an outcome message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human-readable outcome.
    pub message: String,
}

/// Query parameters for the cleanup endpoint.
#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    /// Age horizon as a duration string (default `1h`).
    #[serde(default)]
    pub older_than: Option<String>,
}

/// Create a load test and start its worker fleet.
///
/// # Errors
///
/// Returns 400 on validation failure, 500 when the store or orchestrator
/// is unavailable.
pub async fn create_load_test<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    user: AuthUser,
    Json(body): Json<CreateLoadTestRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    D: WorkloadDriver + 'static,
{
    let test = state.service.create_test(&user.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(test)))
}

/// List the caller's load tests, newest first.
///
/// # Errors
///
/// Returns 500 when the store is unavailable.
pub async fn list_load_tests<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    D: WorkloadDriver + 'static,
{
    let tests = state.service.list_tests(&user.user_id).await?;
    Ok(Json(tests))
}

/// Get a single load test.
///
/// # Errors
///
/// Returns 404 when the test is missing or not owned by the caller.
pub async fn get_load_test<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    D: WorkloadDriver + 'static,
{
    let test_id = parse_test_id(&id)?;
    let test = state.service.get_test(&user.user_id, &test_id).await?;
    Ok(Json(test))
}

/// Get the runtime status of a load test's workload.
///
/// # Errors
///
/// Returns 404 when not owned or the workload is absent, 500 when the
/// orchestrator is unavailable.
pub async fn get_load_test_status<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    D: WorkloadDriver + 'static,
{
    let test_id = parse_test_id(&id)?;
    let status = state.service.test_status(&user.user_id, &test_id).await?;
    Ok(Json(status))
}

/// Stop a load test.
///
/// # Errors
///
/// Returns 404 when not owned, 500 when stopping fails.
pub async fn stop_load_test<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    D: WorkloadDriver + 'static,
{
    let test_id = parse_test_id(&id)?;
    state.service.stop_test(&user.user_id, &test_id).await?;

    Ok(Json(MessageResponse {
        message: "Load test stopped successfully".to_string(),
    }))
}

/// Delete completed workloads older than the `older_than` horizon.
///
/// # Errors
///
/// Returns 400 on an unparsable duration string.
pub async fn cleanup_workloads<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    _user: AuthUser,
    Query(query): Query<CleanupQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    D: WorkloadDriver + 'static,
{
    let older_than = query.older_than.as_deref().unwrap_or("1h");
    let older_than = parse_duration(older_than)
        .ok_or_else(|| ApiError::BadRequest("Invalid duration format".to_string()))?;

    state.service.cleanup(older_than).await?;

    Ok(Json(MessageResponse {
        message: "Cleanup completed successfully".to_string(),
    }))
}

/// Aggregate one metrics snapshot across the test's workers.
///
/// # Errors
///
/// Returns 404 when not owned, 500 when the orchestrator is unavailable.
pub async fn get_load_test_metrics<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    D: WorkloadDriver + 'static,
{
    let test_id = parse_test_id(&id)?;
    let snapshot = state.service.test_metrics(&user.user_id, &test_id).await?;
    Ok(Json(snapshot))
}

/// Stream aggregated metrics snapshots as SSE, one every 5 seconds.
///
/// The stream ends when the client disconnects or the process shuts down.
///
/// # Errors
///
/// Returns 404 when not owned.
pub async fn stream_load_test_metrics<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    D: WorkloadDriver + 'static,
{
    let test_id = parse_test_id(&id)?;

    let cancel = state.shutdown.child_token();
    let rx = state
        .service
        .stream_test_metrics(&user.user_id, &test_id, cancel.clone())
        .await?;

    // Dropping the response body cancels the producer promptly instead of
    // waiting for its next failed send.
    let guard = cancel.drop_guard();
    let stream = ReceiverStream::new(rx).map(move |snapshot| {
        let _ = &guard;
        Event::default().json_data(&snapshot)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Stream one worker pod's log lines as SSE.
///
/// # Errors
///
/// Returns 404 when the test is not owned or the pod does not belong to it.
pub async fn stream_pod_logs<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    user: AuthUser,
    Path((id, pod)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    D: WorkloadDriver + 'static,
{
    let test_id = parse_test_id(&id)?;

    let cancel = state.shutdown.child_token();
    let rx = state
        .service
        .stream_pod_logs(&user.user_id, &test_id, &pod, cancel.clone())
        .await?;

    let guard = cancel.drop_guard();
    let stream = ReceiverStream::new(rx).map(move |line| {
        let _ = &guard;
        Ok::<_, std::convert::Infallible>(Event::default().data(line))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn parse_test_id(s: &str) -> Result<TestId, ApiError> {
    TestId::parse(s).map_err(|_| ApiError::BadRequest(format!("invalid test ID: {s}")))
}

/// Parse a duration string of one or more `<number><unit>` segments with
/// units `ms`, `s`, `m`, `h` (e.g. `90s`, `1h30m`).
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut total = Duration::ZERO;
    let mut rest = s;

    while !rest.is_empty() {
        let digits_end = rest.find(|c: char| !c.is_ascii_digit())?;
        if digits_end == 0 {
            return None;
        }
        let value: u64 = rest[..digits_end].parse().ok()?;
        rest = &rest[digits_end..];

        let step = if let Some(tail) = rest.strip_prefix("ms") {
            rest = tail;
            Duration::from_millis(value)
        } else if let Some(tail) = rest.strip_prefix('s') {
            rest = tail;
            Duration::from_secs(value)
        } else if let Some(tail) = rest.strip_prefix('m') {
            rest = tail;
            Duration::from_secs(value.checked_mul(60)?)
        } else if let Some(tail) = rest.strip_prefix('h') {
            rest = tail;
            Duration::from_secs(value.checked_mul(3600)?)
        } else {
            return None;
        };

        total = total.checked_add(step)?;
    }

    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use loadagg_auth::HmacTokenSigner;
    use loadagg_control::LoadTestService;
    use loadagg_core::UserId;
    use loadagg_orchestrator::MockDriver;
    use loadagg_store::{LoadTestConfig, MemoryStore, TestStatus};
    use tokio_util::sync::CancellationToken;

    fn test_state() -> Arc<AppState<MemoryStore, MockDriver>> {
        let store = Arc::new(MemoryStore::new());
        let driver = Arc::new(MockDriver::new());
        let service = Arc::new(LoadTestService::new(store, driver));
        Arc::new(AppState::new(
            service,
            Arc::new(HmacTokenSigner::new("test-secret")),
            CancellationToken::new(),
            GatewayConfig::default(),
        ))
    }

    fn test_user() -> AuthUser {
        AuthUser {
            user_id: UserId::new("user-a"),
            username: "alice".to_string(),
        }
    }

    fn valid_body() -> CreateLoadTestRequest {
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

    #[test]
    fn parse_duration_accepts_go_style_strings() {
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("90s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("h"), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("10d"), None);
        assert_eq!(parse_duration("ten-seconds"), None);
        assert_eq!(parse_duration("1h30"), None);
    }

    #[test]
    fn parse_test_id_rejects_invalid() {
        assert!(parse_test_id("test-1").is_ok());
        assert!(parse_test_id("Not Valid!").is_err());
    }

    #[tokio::test]
    async fn create_then_get_round_trip() {
        let state = test_state();
        let user = test_user();

        let response =
            create_load_test(State(Arc::clone(&state)), user.clone(), Json(valid_body()))
                .await
                .unwrap()
                .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let tests = state.service.list_tests(&user.user_id).await.unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].status, TestStatus::Running);

        let get = get_load_test(
            State(Arc::clone(&state)),
            user,
            Path(tests[0].id.to_string()),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(get.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_rejects_invalid_body() {
        let state = test_state();
        let mut body = valid_body();
        body.config.worker_count = 0;

        let result = create_load_test(State(state), test_user(), Json(body)).await;
        assert!(matches!(result, Err(ApiError::BadRequest(msg)) if msg == "worker_count must be greater than 0"));
    }

    #[tokio::test]
    async fn get_returns_not_found_across_users() {
        let state = test_state();
        let owner = test_user();

        create_load_test(State(Arc::clone(&state)), owner.clone(), Json(valid_body()))
            .await
            .unwrap();
        let id = state.service.list_tests(&owner.user_id).await.unwrap()[0]
            .id
            .to_string();

        let stranger = AuthUser {
            user_id: UserId::new("user-b"),
            username: "bob".to_string(),
        };
        let result = get_load_test(State(state), stranger, Path(id)).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn stop_reports_message() {
        let state = test_state();
        let user = test_user();

        create_load_test(State(Arc::clone(&state)), user.clone(), Json(valid_body()))
            .await
            .unwrap();
        let id = state.service.list_tests(&user.user_id).await.unwrap()[0]
            .id
            .to_string();

        let response = stop_load_test(State(state), user, Path(id))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cleanup_rejects_bad_duration() {
        let state = test_state();
        let query = CleanupQuery {
            older_than: Some("soon".to_string()),
        };

        let result = cleanup_workloads(State(state), test_user(), Query(query)).await;
        assert!(matches!(result, Err(ApiError::BadRequest(msg)) if msg == "Invalid duration format"));
    }

    #[tokio::test]
    async fn cleanup_defaults_to_one_hour() {
        let state = test_state();
        let query = CleanupQuery { older_than: None };

        let response = cleanup_workloads(State(state), test_user(), Query(query))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
