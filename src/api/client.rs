//! HTTP JSON-RPC client for the TrueNAS middleware.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{json, Value};
use tracing::{debug, trace, warn};

use crate::error::{ApiError, ProvisionError, Result};

use super::types::{Job, JobState, RpcRequest, RpcResponse};
use super::ApiClient;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Interval between job status polls in milliseconds.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// TrueNAS middleware JSON-RPC client.
///
/// Speaks JSON-RPC 2.0 over HTTPS POST with bearer API-key authentication.
/// The core performs no retries; transient-failure handling belongs to the
/// caller.
#[derive(Debug)]
pub struct TrueNasClient {
    /// HTTP client.
    client: Client,
    /// JSON-RPC endpoint URL.
    endpoint: String,
    /// API key.
    api_key: String,
    /// Monotonic request id counter.
    request_id: AtomicU64,
    /// Interval between job status polls.
    poll_interval: Duration,
}

impl TrueNasClient {
    /// Creates a new client for the given base URL and API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        Self::builder(base_url, api_key, DEFAULT_TIMEOUT_SECS, true)
    }

    /// Creates a client with a custom timeout and TLS verification toggle.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_options(
        base_url: &str,
        api_key: &str,
        timeout_secs: u64,
        verify_tls: bool,
    ) -> Result<Self> {
        Self::builder(base_url, api_key, timeout_secs, verify_tls)
    }

    fn builder(base_url: &str, api_key: &str, timeout_secs: u64, verify_tls: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/current", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            request_id: AtomicU64::new(1),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        })
    }

    /// Sets the interval between job status polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Executes a single JSON-RPC request.
    async fn execute(&self, method: &str, params: Value) -> Result<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.request_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        trace!("Calling {method} (id {})", request.id);

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::network(format!("Request for {method} failed: {e}")))?;

        let status = response.status();

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProvisionError::Api(ApiError::AuthenticationFailed {
                message: String::from("Invalid API key"),
            }));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Api(ApiError::rpc(
                method,
                i64::from(status.as_u16()),
                body,
            )));
        }

        let rpc_response: RpcResponse = response.json().await.map_err(|e| {
            ApiError::invalid_response(method, format!("Failed to parse response: {e}"))
        })?;

        if let Some(err) = rpc_response.error {
            if err.is_not_found() {
                let entity = method.split('.').next().unwrap_or(method);
                return Err(ProvisionError::Api(ApiError::not_found(
                    entity,
                    err.message,
                )));
            }
            return Err(ProvisionError::Api(ApiError::rpc(
                method,
                err.code,
                err.message,
            )));
        }

        rpc_response
            .result
            .ok_or_else(|| ApiError::invalid_response(method, "No result in response").into())
    }

    /// Polls a server-tracked job until it reaches a terminal state.
    async fn wait_for_job(&self, method: &str, job_id: i64) -> Result<Value> {
        debug!("Waiting for job {job_id} started by {method}");

        loop {
            let raw = self
                .execute("core.get_jobs", json!([[["id", "=", job_id]]]))
                .await?;

            let jobs: Vec<Job> = serde_json::from_value(raw).map_err(|e| {
                ApiError::invalid_response("core.get_jobs", format!("Failed to decode jobs: {e}"))
            })?;

            let Some(job) = jobs.into_iter().next() else {
                return Err(ProvisionError::Api(ApiError::invalid_response(
                    "core.get_jobs",
                    format!("Job {job_id} disappeared while waiting"),
                )));
            };

            if job.state.is_terminal() {
                if let Some(finished) = job.finished_at() {
                    debug!("Job {job_id} reached {:?} at {finished}", job.state);
                }
                return match job.state {
                    JobState::Success => Ok(job.result.unwrap_or(Value::Null)),
                    JobState::Failed | JobState::Aborted => {
                        Err(ProvisionError::Api(ApiError::JobFailed {
                            job_id,
                            message: job
                                .error
                                .unwrap_or_else(|| format!("Job ended in state {:?}", job.state)),
                        }))
                    }
                    JobState::Waiting | JobState::Running => unreachable!(),
                };
            }

            trace!("Job {job_id} still {:?}", job.state);
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl ApiClient for TrueNasClient {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.execute(method, params).await
    }

    async fn call_and_wait(&self, method: &str, params: Value) -> Result<Value> {
        let result = self.execute(method, params).await?;

        // Job-producing methods return the job id; a handful complete
        // inline and return their result directly.
        let Some(job_id) = result.as_i64() else {
            warn!("{method} returned no job id, treating result as final");
            return Ok(result);
        };

        self.wait_for_job(method, job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method as http_method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> TrueNasClient {
        TrueNasClient::new(&server.uri(), "test-key")
            .unwrap()
            .with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_call_returns_result() {
        let server = MockServer::start().await;

        Mock::given(http_method("POST"))
            .and(path("/api/current"))
            .and(body_partial_json(serde_json::json!({"method": "user.create"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"id": 42},
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client
            .call("user.create", serde_json::json!({"username": "alice"}))
            .await
            .unwrap();

        assert_eq!(result["id"], 42);
    }

    #[tokio::test]
    async fn test_call_maps_enoent_to_not_found() {
        let server = MockServer::start().await;

        Mock::given(http_method("POST"))
            .and(path("/api/current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {
                    "code": 2,
                    "message": "[ENOENT] Path does not exist",
                    "data": {"errname": "ENOENT"},
                },
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .call("filesystem.stat", serde_json::json!(["/mnt/tank/missing"]))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_call_surfaces_rpc_error_with_method() {
        let server = MockServer::start().await;

        Mock::given(http_method("POST"))
            .and(path("/api/current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "pool is degraded"},
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .call("pool.dataset.create", serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("pool.dataset.create"));
        assert!(err.to_string().contains("pool is degraded"));
    }

    #[tokio::test]
    async fn test_call_and_wait_polls_job_to_success() {
        let server = MockServer::start().await;

        Mock::given(http_method("POST"))
            .and(path("/api/current"))
            .and(body_partial_json(serde_json::json!({"method": "vm.stop"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": 77,
            })))
            .mount(&server)
            .await;

        Mock::given(http_method("POST"))
            .and(path("/api/current"))
            .and(body_partial_json(serde_json::json!({"method": "core.get_jobs"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 2,
                "result": [{"id": 77, "state": "SUCCESS", "result": true}],
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client
            .call_and_wait("vm.stop", serde_json::json!([14]))
            .await
            .unwrap();

        assert_eq!(result, serde_json::json!(true));
    }

    #[tokio::test]
    async fn test_call_and_wait_surfaces_job_failure() {
        let server = MockServer::start().await;

        Mock::given(http_method("POST"))
            .and(path("/api/current"))
            .and(body_partial_json(serde_json::json!({"method": "cloudsync.sync"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": 9,
            })))
            .mount(&server)
            .await;

        Mock::given(http_method("POST"))
            .and(path("/api/current"))
            .and(body_partial_json(serde_json::json!({"method": "core.get_jobs"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 2,
                "result": [{"id": 9, "state": "FAILED", "error": "credentials rejected"}],
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .call_and_wait("cloudsync.sync", serde_json::json!([3]))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("credentials rejected"));
    }

    #[tokio::test]
    async fn test_authentication_failure() {
        let server = MockServer::start().await;

        Mock::given(http_method("POST"))
            .and(path("/api/current"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .call("system.info", serde_json::json!([]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Api(ApiError::AuthenticationFailed { .. })
        ));
    }
}
