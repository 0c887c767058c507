//! HS256 bearer-token issuing and validation.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use loadagg_core::UserId;

use crate::error::{AuthError, Result};

/// How long issued tokens remain valid.
const TOKEN_TTL_HOURS: i64 = 24;

/// Validated claims extracted from a bearer token.
///
/// This is a typed record rather than a loose claim map; handlers read the
/// user identity from here and nowhere else.
#[derive(Debug, Clone)]
pub struct Claims {
    /// The authenticated user.
    pub user_id: UserId,
    /// The user's display name.
    pub username: String,
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
}

/// The wire shape of the claims, as encoded into tokens.
#[derive(Debug, Serialize, Deserialize)]
struct RawClaims {
    #[serde(rename = "ID")]
    id: String,
    username: String,
    exp: i64,
    iat: i64,
}

/// Issues and validates HS256-signed bearer tokens.
pub struct HmacTokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl HmacTokenSigner {
    /// Create a signer from the shared secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a token for a user, valid for 24 hours.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn issue(&self, user_id: &UserId, username: &str) -> Result<String> {
        let now = Utc::now();
        let claims = RawClaims {
            id: user_id.to_string(),
            username: username.to_string(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Validate a token and extract its claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is expired, malformed, signed with a
    /// different secret, or carries an invalid user id.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);

        let data =
            decode::<RawClaims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        let claims = data.claims;

        let user_id =
            UserId::parse(&claims.id).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::InvalidToken("invalid exp timestamp".to_string()))?;

        Ok(Claims {
            user_id,
            username: claims.username,
            expires_at,
        })
    }
}
