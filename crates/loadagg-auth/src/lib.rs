//! Authentication primitives for loadagg.
//!
//! This crate provides:
//!
//! - [`HmacTokenSigner`]: HS256 bearer-token issuing and validation with a
//!   typed [`Claims`] record
//! - Argon2id password hashing for the signup/login flow
//!
//! The signing secret is injected at construction rather than read from
//! module-global state, so tests can vary it freely.
//!
//! # Example
//!
//! ```
//! use loadagg_auth::HmacTokenSigner;
//! use loadagg_core::UserId;
//!
//! let signer = HmacTokenSigner::new("super-secret");
//! let user_id = UserId::new("user-1");
//!
//! let token = signer.issue(&user_id, "alice").unwrap();
//! let claims = signer.validate(&token).unwrap();
//! assert_eq!(claims.user_id, user_id);
//! assert_eq!(claims.username, "alice");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod jwt;
pub mod password;

pub use error::{AuthError, Result};
pub use jwt::{Claims, HmacTokenSigner};
pub use password::{hash_password, verify_password};
