//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use loadagg_auth::AuthError;
use loadagg_control::ControlError;
use loadagg_orchestrator::OrchestratorError;

/// API error type that implements `IntoResponse`.
///
/// Not-found and not-owned are folded into the same 404 so that resource
/// existence does not leak across users. Store and orchestrator failures
/// surface as generic 500s; the detail goes to the server log.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid authentication token.
    #[error("unauthorized")]
    Unauthorized,

    /// The requested resource was not found (or is not yours).
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request body or parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::TestNotFound(id) => Self::NotFound(format!("load test {id}")),
            ControlError::PodNotFound(pod) => Self::NotFound(format!("pod {pod}")),
            ControlError::Validation(msg) => Self::BadRequest(msg),
            ControlError::Store(e) => {
                tracing::error!(error = %e, "Store error");
                Self::Internal("storage error".to_string())
            }
            ControlError::Orchestrator(OrchestratorError::JobNotFound(name)) => {
                Self::NotFound(format!("workload {name}"))
            }
            ControlError::Orchestrator(e) => {
                tracing::error!(error = %e, "Orchestrator error");
                Self::Internal("orchestrator error".to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenExpired
            | AuthError::InvalidToken(_)
            | AuthError::InvalidCredentials => Self::Unauthorized,
            AuthError::PasswordHash(_) | AuthError::Signing(_) => {
                tracing::error!(error = %err, "Auth internal error");
                Self::Internal("authentication error".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadagg_core::TestId;

    #[test]
    fn error_status_codes() {
        assert_eq!(
            ApiError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn ownership_failures_fold_into_not_found() {
        let id = TestId::parse("test-1").unwrap();
        let err = ApiError::from(ControlError::TestNotFound(id));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_surfaces_as_bad_request_with_message() {
        let err = ApiError::from(ControlError::Validation(
            "worker_count must be greater than 0".to_string(),
        ));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "bad request: worker_count must be greater than 0");
    }

    #[test]
    fn missing_workload_is_not_found() {
        let err = ApiError::from(ControlError::Orchestrator(
            OrchestratorError::JobNotFound("loadtest-test-1".to_string()),
        ));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn auth_errors_are_unauthorized() {
        assert_eq!(
            ApiError::from(AuthError::TokenExpired).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }
}
