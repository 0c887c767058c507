//! Durable storage for load-test descriptors and user accounts.
//!
//! The store is the single source of truth for a test's *business* status
//! (`pending`, `running`, `completed`, `failed`, `stopped`); the
//! orchestrator owns the *runtime* phase. The reconciler converges the two.
//!
//! # Schema
//!
//! Migrations are applied by an external collaborator at deploy time; the
//! queries in this crate expect:
//!
//! ```sql
//! CREATE TABLE load_tests (
//!     id           TEXT PRIMARY KEY,
//!     name         TEXT NOT NULL,
//!     user_id      TEXT NOT NULL,
//!     target_url   TEXT NOT NULL,
//!     config       TEXT NOT NULL,
//!     status       TEXT NOT NULL,
//!     created_at   TIMESTAMPTZ NOT NULL,
//!     completed_at TIMESTAMPTZ
//! );
//!
//! CREATE TABLE users (
//!     id            TEXT PRIMARY KEY,
//!     username      TEXT NOT NULL,
//!     email         TEXT NOT NULL UNIQUE,
//!     password_hash TEXT NOT NULL,
//!     created_at    TIMESTAMPTZ NOT NULL
//! );
//! ```
//!
//! The `config` column is opaque JSON to the store; it is encoded and
//! decoded at the edge.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod postgres;
pub mod types;

pub use error::{Result, StoreError};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use types::{LoadTest, LoadTestConfig, TestStatus, User};

use async_trait::async_trait;
use loadagg_core::{TestId, UserId};

/// The storage trait defining all database operations.
///
/// All load-test reads are scoped to a `user_id` except
/// [`Store::list_ids_by_status`], which is used only by the reconciler and
/// reads across users.
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Load-test operations
    // =========================================================================

    /// Insert a new load-test row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` on a primary-key collision; callers
    /// may retry with a freshly generated id.
    async fn insert_test(&self, test: &LoadTest) -> Result<()>;

    /// Get a test by id, scoped to its owner.
    ///
    /// Returns `None` when the row does not exist *or* belongs to another
    /// user; callers cannot distinguish the two.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation or row decoding fails.
    async fn get_test(&self, id: &TestId, user_id: &UserId) -> Result<Option<LoadTest>>;

    /// List all tests for a user, newest first.
    ///
    /// Rows whose config fails to decode are skipped with a warning;
    /// listing is best-effort.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_tests(&self, user_id: &UserId) -> Result<Vec<LoadTest>>;

    /// Update a test's business status.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no row matches.
    async fn update_status(&self, id: &TestId, status: TestStatus) -> Result<()>;

    /// Stamp a test's completion time with the current time.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no row matches.
    async fn set_completed(&self, id: &TestId) -> Result<()>;

    /// List the ids of every test with the given status, across all users.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_ids_by_status(&self, status: TestStatus) -> Result<Vec<TestId>>;

    /// Check whether a `(test, user)` pair matches a stored row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn owns_test(&self, id: &TestId, user_id: &UserId) -> Result<bool>;

    // =========================================================================
    // User operations
    // =========================================================================

    /// Create a user account with a freshly generated id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` when the email is already registered.
    async fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<User>;

    /// Look up a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
}
