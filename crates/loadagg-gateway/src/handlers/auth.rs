//! Signup and login endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use loadagg_auth::{hash_password, verify_password, AuthError};
use loadagg_orchestrator::WorkloadDriver;
use loadagg_store::{Store, StoreError};

use crate::error::ApiError;
use crate::state::AppState;

/// Request to create an account.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    /// Display name.
    pub username: String,
    /// Login email.
    pub email: String,
    /// Plaintext password; hashed before storage.
    pub password: String,
}

/// Request to log in.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Login email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

/// Response carrying a fresh bearer token.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Signed bearer token.
    pub token: String,
    /// The account's display name.
    pub user: String,
}

/// Create an account and issue a token.
///
/// # Errors
///
/// Returns 400 on missing fields or an already-registered email.
pub async fn signup<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    Json(body): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    D: WorkloadDriver + 'static,
{
    if body.username.is_empty() || body.email.is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest("All fields are required".to_string()));
    }

    let password_hash = hash_password(&body.password)?;

    let user = match state
        .service
        .store()
        .create_user(&body.username, &body.email, &password_hash)
        .await
    {
        Ok(user) => user,
        Err(StoreError::Duplicate) => {
            return Err(ApiError::BadRequest(
                "email is already registered".to_string(),
            ));
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create user");
            return Err(ApiError::Internal("storage error".to_string()));
        }
    };

    let token = state.tokens.issue(&user.id, &user.username)?;

    tracing::info!(user_id = %user.id, username = %user.username, "Created account");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.username,
        }),
    ))
}

/// Exchange email/password for a token.
///
/// # Errors
///
/// Returns 401 when the email or password does not match.
pub async fn login<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: Store + 'static,
    D: WorkloadDriver + 'static,
{
    let user = state
        .service
        .store()
        .find_user_by_email(&body.email)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to look up user");
            ApiError::Internal("storage error".to_string())
        })?;

    let Some(user) = user else {
        return Err(AuthError::InvalidCredentials.into());
    };

    if !verify_password(&body.password, &user.password_hash)? {
        return Err(AuthError::InvalidCredentials.into());
    }

    let token = state.tokens.issue(&user.id, &user.username)?;

    Ok(Json(AuthResponse {
        token,
        user: user.username,
    }))
}
