//! Recording test double for the [`ApiClient`] trait.
//!
//! Records every invocation in order (method, params, whether the blocking
//! variant was used) and serves scripted replies per method, so orchestrator
//! tests can assert call sequencing without a live appliance.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ApiError, ProvisionError, Result};

use super::ApiClient;

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Dot-qualified method name.
    pub method: String,
    /// Parameters passed to the call.
    pub params: Value,
    /// True if the call used the blocking `call_and_wait` variant.
    pub waited: bool,
}

/// Scripted reply for a mocked method.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this value.
    Ok(Value),
    /// Fail with a not-found error.
    NotFound,
    /// Fail with an RPC error carrying this message.
    Fail(String),
}

/// Recording mock implementation of [`ApiClient`].
#[derive(Debug, Default)]
pub struct MockClient {
    calls: Mutex<Vec<RecordedCall>>,
    replies: Mutex<HashMap<String, VecDeque<MockReply>>>,
}

impl MockClient {
    /// Creates an empty mock; unscripted methods reply with `null`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for the next invocation of `method`.
    pub fn expect(&self, method: &str, reply: MockReply) {
        self.replies
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Returns all recorded calls in invocation order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns the recorded method names in invocation order.
    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.method.clone())
            .collect()
    }

    fn record(&self, method: &str, params: Value, waited: bool) -> Result<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: method.to_string(),
            params,
            waited,
        });

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(VecDeque::pop_front);

        match reply {
            None => Ok(Value::Null),
            Some(MockReply::Ok(value)) => Ok(value),
            Some(MockReply::NotFound) => {
                let entity = method.split('.').next().unwrap_or(method).to_string();
                Err(ProvisionError::Api(ApiError::not_found(entity, method)))
            }
            Some(MockReply::Fail(message)) => {
                Err(ProvisionError::Api(ApiError::rpc(method, -32000, message)))
            }
        }
    }
}

#[async_trait]
impl ApiClient for MockClient {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.record(method, params, false)
    }

    async fn call_and_wait(&self, method: &str, params: Value) -> Result<Value> {
        self.record(method, params, true)
    }
}
