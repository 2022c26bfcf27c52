//! Wire types for the TrueNAS JSON-RPC API.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    /// Protocol version, always "2.0".
    pub jsonrpc: &'static str,
    /// Request identifier.
    pub id: u64,
    /// Dot-qualified method name.
    pub method: &'a str,
    /// Method parameters.
    pub params: Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    /// Result payload, present on success.
    pub result: Option<Value>,
    /// Error payload, present on failure.
    pub error: Option<RpcError>,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Middleware-specific error details.
    #[serde(default)]
    pub data: Option<RpcErrorData>,
}

/// Middleware error details attached to an RPC error.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorData {
    /// Symbolic errno name (e.g. "ENOENT").
    #[serde(default)]
    pub errname: Option<String>,
}

impl RpcError {
    /// Returns true if this error means the target entity does not exist.
    pub(crate) fn is_not_found(&self) -> bool {
        if let Some(data) = &self.data {
            if data.errname.as_deref() == Some("ENOENT") {
                return true;
            }
        }
        // Middleware ValidationErrors for missing instances carry no errname.
        self.message.contains("does not exist") || self.message.contains("not found")
    }
}

/// A server-tracked background job.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    /// Remote job identifier.
    pub id: i64,
    /// Current job state.
    pub state: JobState,
    /// Job result, present once the job succeeds.
    #[serde(default)]
    pub result: Option<Value>,
    /// Failure message, present once the job fails.
    #[serde(default)]
    pub error: Option<String>,
    /// Epoch milliseconds at which the job started.
    #[serde(default, deserialize_with = "deserialize_api_date")]
    pub time_started: Option<i64>,
    /// Epoch milliseconds at which the job finished.
    #[serde(default, deserialize_with = "deserialize_api_date")]
    pub time_finished: Option<i64>,
}

/// Lifecycle states of a server-tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Job is queued.
    Waiting,
    /// Job is executing.
    Running,
    /// Job finished successfully.
    Success,
    /// Job failed.
    Failed,
    /// Job was aborted.
    Aborted,
}

impl JobState {
    /// Returns true if the job has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Aborted)
    }
}

impl Job {
    /// Returns the job start time, if reported.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.time_started
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    /// Returns the job finish time, if reported.
    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.time_finished
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

/// The middleware encodes timestamps as `{"$date": <millis>}`.
fn deserialize_api_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ApiDate {
        Wrapped {
            #[serde(rename = "$date")]
            date: i64,
        },
        Plain(i64),
    }

    let value: Option<ApiDate> = Option::deserialize(deserializer)?;
    Ok(value.map(|d| match d {
        ApiDate::Wrapped { date } => date,
        ApiDate::Plain(ms) => ms,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_state_terminal() {
        assert!(JobState::Success.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Aborted.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(!JobState::Waiting.is_terminal());
    }

    #[test]
    fn test_job_deserializes_wrapped_dates() {
        let job: Job = serde_json::from_value(json!({
            "id": 12,
            "state": "SUCCESS",
            "result": true,
            "time_started": {"$date": 1_700_000_000_000_i64},
            "time_finished": {"$date": 1_700_000_060_000_i64},
        }))
        .unwrap();

        assert_eq!(job.state, JobState::Success);
        assert!(job.started_at().is_some());
        assert!(job.finished_at().unwrap() > job.started_at().unwrap());
    }

    #[test]
    fn test_rpc_error_not_found_detection() {
        let err: RpcError = serde_json::from_value(json!({
            "code": 2,
            "message": "[ENOENT] Path /mnt/tank/missing not found",
            "data": {"errname": "ENOENT"},
        }))
        .unwrap();
        assert!(err.is_not_found());

        let err: RpcError = serde_json::from_value(json!({
            "code": -32000,
            "message": "Internal error",
        }))
        .unwrap();
        assert!(!err.is_not_found());
    }
}
