//! Postgres-backed store implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use loadagg_core::{TestId, UserId};

use crate::error::{Result, StoreError};
use crate::types::{LoadTest, TestStatus, User};
use crate::Store;

/// A store backed by a shared Postgres connection pool.
///
/// The pool is safe for concurrent use; one `PgStore` is shared by the
/// request handlers and the reconciler alike.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn decode_test_row(row: &PgRow) -> Result<LoadTest> {
        let id: String = row.try_get("id")?;
        let id = TestId::parse(&id).map_err(|e| StoreError::Corrupt(format!("id: {e}")))?;

        let status: String = row.try_get("status")?;
        let status = TestStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("status: {status}")))?;

        let config_json: String = row.try_get("config")?;
        let config = serde_json::from_str(&config_json)?;

        Ok(LoadTest {
            id,
            name: row.try_get("name")?,
            user_id: UserId::new(row.try_get::<String, _>("user_id")?),
            target_url: row.try_get("target_url")?,
            config,
            status,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn decode_user_row(row: &PgRow) -> Result<User> {
        Ok(User {
            id: UserId::new(row.try_get::<String, _>("id")?),
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl Store for PgStore {
    async fn insert_test(&self, test: &LoadTest) -> Result<()> {
        let config_json = serde_json::to_string(&test.config)?;

        let result = sqlx::query(
            r"
            INSERT INTO load_tests (id, name, user_id, target_url, config, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(test.id.as_str())
        .bind(&test.name)
        .bind(test.user_id.as_str())
        .bind(&test.target_url)
        .bind(config_json)
        .bind(test.status.as_str())
        .bind(test.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_test(&self, id: &TestId, user_id: &UserId) -> Result<Option<LoadTest>> {
        let row = sqlx::query(
            r"
            SELECT id, name, user_id, target_url, config, status, created_at, completed_at
            FROM load_tests
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id.as_str())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::decode_test_row).transpose()
    }

    async fn list_tests(&self, user_id: &UserId) -> Result<Vec<LoadTest>> {
        let rows = sqlx::query(
            r"
            SELECT id, name, user_id, target_url, config, status, created_at, completed_at
            FROM load_tests
            WHERE user_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        // Listing is best-effort: a row with an undecodable config is
        // skipped rather than failing the whole response.
        let mut tests = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::decode_test_row(row) {
                Ok(test) => tests.push(test),
                Err(e) => warn!(error = %e, "Skipping undecodable load-test row"),
            }
        }

        Ok(tests)
    }

    async fn update_status(&self, id: &TestId, status: TestStatus) -> Result<()> {
        let result = sqlx::query("UPDATE load_tests SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_completed(&self, id: &TestId) -> Result<()> {
        let result =
            sqlx::query("UPDATE load_tests SET completed_at = CURRENT_TIMESTAMP WHERE id = $1")
                .bind(id.as_str())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_ids_by_status(&self, status: TestStatus) -> Result<Vec<TestId>> {
        let rows = sqlx::query("SELECT id FROM load_tests WHERE status = $1")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let raw: String = row.try_get("id")?;
            match TestId::parse(&raw) {
                Ok(id) => ids.push(id),
                Err(e) => warn!(id = %raw, error = %e, "Skipping corrupt test id"),
            }
        }

        Ok(ids)
    }

    async fn owns_test(&self, id: &TestId, user_id: &UserId) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM load_tests WHERE id = $1 AND user_id = $2")
            .bind(id.as_str())
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<User> {
        let user = User {
            id: UserId::new(Uuid::new_v4().to_string()),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };

        let result = sqlx::query(
            r"
            INSERT INTO users (id, username, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(user.id.as_str())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::decode_user_row).transpose()
    }
}
