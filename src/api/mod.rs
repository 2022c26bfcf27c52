//! TrueNAS middleware API access.
//!
//! The provisioning core only requires two transport operations: a
//! synchronous method call and a blocking variant that waits for a
//! server-tracked job to finish. Both are expressed by the [`ApiClient`]
//! trait so orchestrators can be tested without a live appliance.

mod client;
mod types;

#[cfg(test)]
pub mod mock;

pub use client::TrueNasClient;
pub use types::{Job, JobState};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Contract for the TrueNAS JSON-RPC transport.
///
/// Methods are dot-qualified names (`<entity>.<verb>`); parameters are
/// either a map of named fields or a positional list (commonly
/// `[identity, updateMap]` for updates).
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Invokes a remote method and returns its raw result.
    async fn call(&self, method: &str, params: Value) -> Result<Value>;

    /// Invokes a remote method that starts a server-tracked job and blocks
    /// until the job reaches a terminal state, returning the job's result.
    async fn call_and_wait(&self, method: &str, params: Value) -> Result<Value>;
}
