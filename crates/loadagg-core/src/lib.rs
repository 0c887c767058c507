//! Core types for the loadagg load-test orchestrator.
//!
//! This crate provides the strongly-typed identifiers shared by every other
//! crate in the workspace:
//!
//! - [`TestId`]: the unique identifier of a load test, also the seed for the
//!   workload name on the orchestrator
//! - [`UserId`]: the opaque identifier of the user owning a test
//!
//! # Example
//!
//! ```
//! use loadagg_core::{TestId, UserId};
//!
//! // Generate a fresh test id
//! let test_id = TestId::generate();
//! assert!(test_id.as_str().starts_with("test-"));
//!
//! // Parse an id from an untrusted source
//! let parsed = TestId::parse("test-1717171717000000000").unwrap();
//!
//! // User ids are opaque strings
//! let user_id = UserId::new("a3c1f2e4-9b7d-4c1e-8f2a-5d6e7f8a9b0c");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;

pub use ids::{IdError, TestId, UserId};
