//! Identifier types for load tests and users.
//!
//! Both identifiers are opaque strings on the wire. Test ids additionally
//! carry validation so that the workload name derived from them is always a
//! legal DNS-1123 label on the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum length of a test id.
///
/// The derived workload name `loadtest-<id>` must fit the 63-character
/// Kubernetes object name limit.
pub const MAX_TEST_ID_LEN: usize = 54;

/// Errors from parsing an identifier.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier is empty.
    #[error("identifier is empty")]
    Empty,

    /// The identifier exceeds the maximum length.
    #[error("identifier is too long: {got} characters (max {max})")]
    TooLong {
        /// Actual length in characters.
        got: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// The identifier contains a character outside `[a-z0-9-]`.
    #[error("identifier contains invalid character {0:?}")]
    InvalidChar(char),
}

/// The unique identifier of a load test.
///
/// Generated from a high-resolution timestamp at creation time, so ids are
/// unique and roughly monotonic. The workload name on the orchestrator is
/// always reconstructed from this id and never persisted.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TestId(String);

impl TestId {
    /// Generate a new unique `TestId` from the current time in nanoseconds.
    #[must_use]
    pub fn generate() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Self(format!("test-{nanos}"))
    }

    /// Parse a `TestId` from an untrusted string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty, too long, or contains a
    /// character outside `[a-z0-9-]`.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if s.len() > MAX_TEST_ID_LEN {
            return Err(IdError::TooLong {
                got: s.len(),
                max: MAX_TEST_ID_LEN,
            });
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
        {
            return Err(IdError::InvalidChar(c));
        }
        Ok(Self(s.to_string()))
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TestId({})", self.0)
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TestId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TestId> for String {
    fn from(id: TestId) -> Self {
        id.0
    }
}

impl AsRef<str> for TestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The opaque identifier of a user.
///
/// Issued at signup and carried in the `ID` claim of bearer tokens. The
/// engine never inspects its contents; it only scopes store reads.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a `UserId` from a trusted source (the store or a generator).
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Parse a `UserId` from an untrusted string (e.g. a token claim).
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(s.to_string()))
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
