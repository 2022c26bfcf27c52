//! Host path resource: a directory on the appliance filesystem.
//!
//! Identity is the absolute path itself. Deleting the resource only
//! forgets it: the directory is left in place so that data under it is
//! never destroyed by a configuration change.

use serde_json::{json, Value};
use tracing::info;

use crate::api::ApiClient;
use crate::attr::Attr;
use crate::error::{MappingError, ProvisionError, ReconcileError, Result};

/// Declarative model of a host path.
#[derive(Debug, Clone, Default)]
pub struct HostPathModel {
    /// Absolute path on the appliance (required; identity).
    pub path: Attr<String>,
    /// Permission bits as an octal string, e.g. "0755".
    pub mode: Attr<String>,
}

impl HostPathModel {
    /// Overwrites remote-owned fields from a `filesystem.stat` response.
    ///
    /// The stat mode carries the file type bits; only the permission
    /// bits are kept, rendered as a zero-padded octal string.
    ///
    /// # Errors
    ///
    /// Returns an error if the response lacks the mode.
    pub fn apply_stat(&mut self, response: &Value) -> Result<()> {
        let mode = response
            .get("mode")
            .and_then(Value::as_i64)
            .ok_or_else(|| MappingError::missing("filesystem.stat", "mode"))?;
        self.mode = Attr::known(format!("{:04o}", mode & 0o7777));
        Ok(())
    }
}

/// Orchestrator for host paths.
#[derive(Debug)]
pub struct HostPathResource<'a, C: ApiClient> {
    client: &'a C,
}

impl<'a, C: ApiClient> HostPathResource<'a, C> {
    /// Creates a new host path orchestrator.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Creates the directory and applies the requested mode.
    ///
    /// # Errors
    ///
    /// Returns an error if any remote call fails.
    pub async fn create(&self, model: &mut HostPathModel) -> Result<()> {
        let path = require_path(model)?;
        self.client
            .call("filesystem.mkdir", json!([path.as_str()]))
            .await?;
        info!("Created host path {path}");

        if let Some(mode) = model.mode.as_str() {
            self.client
                .call_and_wait(
                    "filesystem.setperm",
                    json!([{"path": path.as_str(), "mode": mode}]),
                )
                .await?;
        }

        let response = self
            .client
            .call("filesystem.stat", json!([path.as_str()]))
            .await?;
        model.apply_stat(&response)
    }

    /// Reads the path; `Ok(None)` signals the directory is gone.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or decode failure.
    pub async fn read(&self, path: &str) -> Result<Option<HostPathModel>> {
        let response = match self.client.call("filesystem.stat", json!([path])).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut model = HostPathModel {
            path: Attr::known(path.to_string()),
            ..HostPathModel::default()
        };
        model.apply_stat(&response)?;
        Ok(Some(model))
    }

    /// Reapplies the mode when it differs from prior state.
    ///
    /// # Errors
    ///
    /// Returns an error if the permission job or the read-back fails.
    pub async fn update(&self, prior: &HostPathModel, plan: &mut HostPathModel) -> Result<()> {
        plan.path = plan.path.clone().or_prior(prior.path.clone());
        let path = require_path(plan)?;

        if plan.mode.is_known() && plan.mode != prior.mode {
            let mode = plan.mode.as_str().unwrap_or_default().to_string();
            self.client
                .call_and_wait(
                    "filesystem.setperm",
                    json!([{"path": path.as_str(), "mode": mode}]),
                )
                .await?;
        }

        let response = self
            .client
            .call("filesystem.stat", json!([path.as_str()]))
            .await?;
        plan.apply_stat(&response)
    }

    /// Forgets the path without touching the remote directory.
    pub fn delete(model: &HostPathModel) {
        if let Some(path) = model.path.as_str() {
            info!("Forgetting host path {path}; directory left in place");
        }
    }

    /// Validates an import identifier: the absolute path, taken verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is not an absolute path.
    pub fn import(identifier: &str) -> Result<String> {
        let trimmed = identifier.trim();
        if !trimmed.starts_with('/') {
            return Err(ProvisionError::Reconcile(ReconcileError::InvalidImportId {
                entity: String::from("filesystem"),
                identifier: identifier.to_string(),
            }));
        }
        Ok(trimmed.to_string())
    }
}

fn require_path(model: &HostPathModel) -> Result<String> {
    model
        .path
        .as_str()
        .map(String::from)
        .ok_or_else(|| ProvisionError::internal("host path identity is not known"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{MockClient, MockReply};

    #[test]
    fn test_stat_mode_masks_file_type_bits() {
        let mut model = HostPathModel::default();
        // 0o40755: directory bit plus rwxr-xr-x.
        model.apply_stat(&json!({"mode": 0o40_755})).unwrap();
        assert_eq!(model.mode, Attr::known(String::from("0755")));
    }

    #[tokio::test]
    async fn test_create_applies_mode_then_reads_back() {
        let client = MockClient::new();
        client.expect("filesystem.stat", MockReply::Ok(json!({"mode": 0o40_700})));

        let mut model = HostPathModel {
            path: Attr::known(String::from("/mnt/tank/media")),
            mode: Attr::known(String::from("0700")),
        };
        HostPathResource::new(&client).create(&mut model).await.unwrap();

        assert_eq!(
            client.methods(),
            vec!["filesystem.mkdir", "filesystem.setperm", "filesystem.stat"]
        );
        let calls = client.calls();
        assert!(calls[1].waited);
        assert_eq!(model.mode, Attr::known(String::from("0700")));
    }

    #[tokio::test]
    async fn test_read_missing_path_signals_removed() {
        let client = MockClient::new();
        client.expect("filesystem.stat", MockReply::NotFound);

        let result = HostPathResource::new(&client)
            .read("/mnt/tank/gone")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_read_error_propagates_when_not_a_removal() {
        let client = MockClient::new();
        client.expect("filesystem.stat", MockReply::Fail(String::from("EPERM")));

        let result = HostPathResource::new(&client).read("/mnt/tank/media").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_skips_job_when_mode_unchanged() {
        let client = MockClient::new();
        client.expect("filesystem.stat", MockReply::Ok(json!({"mode": 0o40_755})));

        let prior = HostPathModel {
            path: Attr::known(String::from("/mnt/tank/media")),
            mode: Attr::known(String::from("0755")),
        };
        let mut plan = prior.clone();

        HostPathResource::new(&client).update(&prior, &mut plan).await.unwrap();

        assert_eq!(client.methods(), vec!["filesystem.stat"]);
    }

    #[test]
    fn test_import_requires_absolute_path() {
        assert!(HostPathResource::<MockClient>::import("/mnt/tank/media").is_ok());
        assert!(HostPathResource::<MockClient>::import("tank/media").is_err());
    }
}
