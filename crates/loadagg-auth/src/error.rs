//! Error types for authentication.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while issuing or validating credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token's expiry is in the past.
    #[error("token expired")]
    TokenExpired,

    /// The token is malformed, has a bad signature, or carries bad claims.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The presented email/password pair does not match a user.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Password hashing or verification failed.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    /// Token signing failed.
    #[error("token signing failed: {0}")]
    Signing(String),
}
