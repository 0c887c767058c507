//! Persisted domain types for load tests and users.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loadagg_core::{TestId, UserId};

/// A load-test descriptor as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTest {
    /// Unique identifier, generated at creation.
    pub id: TestId,
    /// Human-readable name.
    pub name: String,
    /// Owner; immutable after creation.
    pub user_id: UserId,
    /// The URL workers aim traffic at.
    pub target_url: String,
    /// Traffic-generation parameters.
    pub config: LoadTestConfig,
    /// Current business status.
    pub status: TestStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Set once the test reaches a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Traffic-generation parameters for a load test.
///
/// Opaque to the store (persisted as JSON text); interpreted by the
/// workload driver when building worker environments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTestConfig {
    /// How long each worker emits traffic.
    #[serde(rename = "duration", alias = "duration_seconds")]
    pub duration_seconds: u32,
    /// Target request rate per worker.
    pub requests_per_sec: u32,
    /// Upper bound on in-flight requests per worker.
    #[serde(default)]
    pub max_concurrency: u32,
    /// Number of parallel worker replicas.
    pub worker_count: u32,
    /// HTTP method workers use against the target.
    pub http_method: String,
    /// Extra request headers, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    /// Request body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Business status of a load test.
///
/// Distinct from the orchestrator's runtime phase: the store owns this
/// field, and terminal values are never overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Row inserted; workload not yet created.
    Pending,
    /// Workload created and presumed active.
    Running,
    /// Every worker finished successfully, or the workload vanished.
    Completed,
    /// Workload creation or execution failed.
    Failed,
    /// Stopped by an explicit user request.
    Stopped,
}

impl TestStatus {
    /// The lowercase string stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    /// Parse a status from its stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Check if this status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered user account.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique identifier, generated at signup.
    pub id: UserId,
    /// Display name.
    pub username: String,
    /// Login email, unique per account.
    pub email: String,
    /// Argon2id PHC hash of the password.
    pub password_hash: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            TestStatus::Pending,
            TestStatus::Running,
            TestStatus::Completed,
            TestStatus::Failed,
            TestStatus::Stopped,
        ] {
            assert_eq!(TestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TestStatus::parse("bogus"), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(TestStatus::Completed.is_terminal());
        assert!(TestStatus::Failed.is_terminal());
        assert!(TestStatus::Stopped.is_terminal());
        assert!(!TestStatus::Pending.is_terminal());
        assert!(!TestStatus::Running.is_terminal());
    }

    #[test]
    fn status_serde_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&TestStatus::Running).unwrap(),
            "\"running\""
        );
        let back: TestStatus = serde_json::from_str("\"stopped\"").unwrap();
        assert_eq!(back, TestStatus::Stopped);
    }

    #[test]
    fn config_serde_shape() {
        let config = LoadTestConfig {
            duration_seconds: 10,
            requests_per_sec: 5,
            max_concurrency: 0,
            worker_count: 3,
            http_method: "GET".to_string(),
            headers: None,
            body: None,
        };

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["duration"], 10);
        assert_eq!(json["worker_count"], 3);
        assert!(json.get("headers").is_none());
        assert!(json.get("body").is_none());

        let back: LoadTestConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.duration_seconds, 10);
    }

    #[test]
    fn config_accepts_duration_seconds_alias() {
        let back: LoadTestConfig = serde_json::from_str(
            r#"{"duration_seconds": 30, "requests_per_sec": 2, "worker_count": 1, "http_method": "POST"}"#,
        )
        .unwrap();
        assert_eq!(back.duration_seconds, 30);
        assert_eq!(back.max_concurrency, 0);
    }
}
