//! Request types for control-plane operations.

use serde::{Deserialize, Serialize};

use loadagg_store::LoadTestConfig;

use crate::error::{ControlError, Result};

/// Request to create and immediately start a load test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLoadTestRequest {
    /// Human-readable name for the test.
    pub name: String,
    /// The URL workers aim traffic at.
    pub target_url: String,
    /// Traffic-generation parameters.
    pub config: LoadTestConfig,
}

impl CreateLoadTestRequest {
    /// Validate the request.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` with a message suitable for a
    /// 400 response.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ControlError::Validation("name is required".to_string()));
        }
        if self.target_url.is_empty() {
            return Err(ControlError::Validation(
                "target_url is required".to_string(),
            ));
        }
        if self.config.worker_count == 0 {
            return Err(ControlError::Validation(
                "worker_count must be greater than 0".to_string(),
            ));
        }
        if self.config.requests_per_sec == 0 {
            return Err(ControlError::Validation(
                "requests_per_sec must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
