//! Authentication extractor.
//!
//! The `AuthUser` extractor validates the `Authorization: Bearer <token>`
//! header and yields the caller's identity. Rejection is terminal: a
//! handler whose signature includes `AuthUser` never runs for an
//! unauthenticated request.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use loadagg_auth::Claims;
use loadagg_core::UserId;
use loadagg_orchestrator::WorkloadDriver;
use loadagg_store::Store;

use crate::error::ApiError;
use crate::state::AppState;

/// An authenticated user extracted from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The authenticated user id (the token's `ID` claim).
    pub user_id: UserId,
    /// The user's display name.
    pub username: String,
}

impl AuthUser {
    /// Build an `AuthUser` from validated claims.
    #[must_use]
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
        }
    }
}

impl<S, D> FromRequestParts<Arc<AppState<S, D>>> for AuthUser
where
    S: Store + 'static,
    D: WorkloadDriver + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S, D>>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        let claims = state.tokens.validate(token)?;

        Ok(Self::from_claims(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn auth_user_from_claims() {
        let claims = Claims {
            user_id: UserId::new("user-1"),
            username: "alice".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        };

        let user = AuthUser::from_claims(claims);
        assert_eq!(user.user_id, UserId::new("user-1"));
        assert_eq!(user.username, "alice");
    }
}
