//! In-memory store for testing without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use loadagg_core::{TestId, UserId};

use crate::error::{Result, StoreError};
use crate::types::{LoadTest, TestStatus, User};
use crate::Store;

/// A store that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tests: Mutex<HashMap<TestId, LoadTest>>,
    users: Mutex<HashMap<String, User>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a test regardless of its owner. Test-inspection helper.
    #[must_use]
    pub fn get_any(&self, id: &TestId) -> Option<LoadTest> {
        self.tests.lock().get(id).cloned()
    }

    /// Number of stored tests.
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.tests.lock().len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_test(&self, test: &LoadTest) -> Result<()> {
        let mut tests = self.tests.lock();
        if tests.contains_key(&test.id) {
            return Err(StoreError::Duplicate);
        }
        tests.insert(test.id.clone(), test.clone());
        Ok(())
    }

    async fn get_test(&self, id: &TestId, user_id: &UserId) -> Result<Option<LoadTest>> {
        Ok(self
            .tests
            .lock()
            .get(id)
            .filter(|t| t.user_id == *user_id)
            .cloned())
    }

    async fn list_tests(&self, user_id: &UserId) -> Result<Vec<LoadTest>> {
        let mut tests: Vec<LoadTest> = self
            .tests
            .lock()
            .values()
            .filter(|t| t.user_id == *user_id)
            .cloned()
            .collect();
        tests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tests)
    }

    async fn update_status(&self, id: &TestId, status: TestStatus) -> Result<()> {
        let mut tests = self.tests.lock();
        let test = tests.get_mut(id).ok_or(StoreError::NotFound)?;
        test.status = status;
        Ok(())
    }

    async fn set_completed(&self, id: &TestId) -> Result<()> {
        let mut tests = self.tests.lock();
        let test = tests.get_mut(id).ok_or(StoreError::NotFound)?;
        test.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn list_ids_by_status(&self, status: TestStatus) -> Result<Vec<TestId>> {
        Ok(self
            .tests
            .lock()
            .values()
            .filter(|t| t.status == status)
            .map(|t| t.id.clone())
            .collect())
    }

    async fn owns_test(&self, id: &TestId, user_id: &UserId) -> Result<bool> {
        Ok(self
            .tests
            .lock()
            .get(id)
            .is_some_and(|t| t.user_id == *user_id))
    }

    async fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<User> {
        let mut users = self.users.lock();
        if users.contains_key(email) {
            return Err(StoreError::Duplicate);
        }
        let user = User {
            id: UserId::new(Uuid::new_v4().to_string()),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        users.insert(email.to_string(), user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.lock().get(email).cloned())
    }
}
