//! Managed file resource: a file on the appliance whose content is
//! pushed from configuration.
//!
//! Identity is the absolute path. Content is write-only: the remote API
//! never returns it, so reads only refresh the permission bits and the
//! model's content survives read-backs untouched.

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::attr::Attr;
use crate::error::{MappingError, ProvisionError, ReconcileError, Result};

/// Declarative model of a managed file.
#[derive(Debug, Clone, Default)]
pub struct ManagedFileModel {
    /// Absolute path on the appliance (required; identity).
    pub path: Attr<String>,
    /// File content. Write-only.
    pub content: Attr<String>,
    /// Permission bits as an octal string, e.g. "0644".
    pub mode: Attr<String>,
}

impl ManagedFileModel {
    /// Overwrites remote-owned fields from a `filesystem.stat` response.
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

    fn mode_bits(&self) -> Result<Option<i64>> {
        match self.mode.as_str() {
            None => Ok(None),
            Some(mode) => i64::from_str_radix(mode, 8).map(Some).map_err(|_| {
                MappingError::shape("filesystem", "mode", format!("Invalid octal mode {mode:?}"))
                    .into()
            }),
        }
    }
}

/// Orchestrator for managed files.
#[derive(Debug)]
pub struct ManagedFileResource<'a, C: ApiClient> {
    client: &'a C,
}

impl<'a, C: ApiClient> ManagedFileResource<'a, C> {
    /// Creates a new managed file orchestrator.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Writes the file content and reads back the resulting mode.
    ///
    /// # Errors
    ///
    /// Returns an error if any remote call fails.
    pub async fn create(&self, model: &mut ManagedFileModel) -> Result<()> {
        let path = require_path(model)?;
        self.push_content(&path, model).await?;
        info!("Wrote managed file {path}");

        let response = self
            .client
            .call("filesystem.stat", json!([path.as_str()]))
            .await?;
        model.apply_stat(&response)
    }

    /// Reads the file metadata; `Ok(None)` signals the file is gone.
    ///
    /// Content is write-only and is not part of the read.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or decode failure.
    pub async fn read(&self, path: &str) -> Result<Option<ManagedFileModel>> {
        let response = match self.client.call("filesystem.stat", json!([path])).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut model = ManagedFileModel {
            path: Attr::known(path.to_string()),
            ..ManagedFileModel::default()
        };
        model.apply_stat(&response)?;
        Ok(Some(model))
    }

    /// Rewrites the file when content or mode changed.
    ///
    /// # Errors
    ///
    /// Returns an error if any remote call fails.
    pub async fn update(
        &self,
        prior: &ManagedFileModel,
        plan: &mut ManagedFileModel,
    ) -> Result<()> {
        plan.path = plan.path.clone().or_prior(prior.path.clone());
        plan.content = plan.content.clone().or_prior(prior.content.clone());
        let path = require_path(plan)?;

        let content_changed = plan.content.is_known() && plan.content != prior.content;
        let mode_changed = plan.mode.is_known() && plan.mode != prior.mode;
        if content_changed || mode_changed {
            self.push_content(&path, plan).await?;
        }

        let response = self
            .client
            .call("filesystem.stat", json!([path.as_str()]))
            .await?;
        plan.apply_stat(&response)
    }

    /// Removes the file.
    ///
    /// Ownership is first reset to root so the unlink cannot be blocked
    /// by a delegated owner; a failure there is logged and the unlink
    /// proceeds anyway.
    ///
    /// # Errors
    ///
    /// Returns an error if the unlink fails.
    pub async fn delete(&self, model: &ManagedFileModel) -> Result<()> {
        let path = require_path(model)?;

        let chown = self
            .client
            .call_and_wait(
                "filesystem.chown",
                json!([{"path": path.as_str(), "uid": 0, "gid": 0}]),
            )
            .await;
        if let Err(e) = chown {
            warn!("Failed to reset ownership of {path} before unlink: {e}");
        }

        self.client
            .call("filesystem.unlink", json!([path.as_str()]))
            .await?;
        info!("Removed managed file {path}");
        Ok(())
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

    async fn push_content(&self, path: &str, model: &ManagedFileModel) -> Result<()> {
        let content = model.content.as_str().unwrap_or_default();
        let mut options = serde_json::Map::new();
        if let Some(mode) = model.mode_bits()? {
            options.insert(String::from("mode"), json!(mode));
        }
        self.client
            .call_and_wait(
                "filesystem.file_receive",
                json!([path, content, Value::Object(options)]),
            )
            .await?;
        Ok(())
    }
}

fn require_path(model: &ManagedFileModel) -> Result<String> {
    model
        .path
        .as_str()
        .map(String::from)
        .ok_or_else(|| ProvisionError::internal("managed file identity is not known"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{MockClient, MockReply};

    fn sample() -> ManagedFileModel {
        ManagedFileModel {
            path: Attr::known(String::from("/mnt/tank/conf/app.toml")),
            content: Attr::known(String::from("retries = 3\n")),
            mode: Attr::known(String::from("0644")),
        }
    }

    #[tokio::test]
    async fn test_create_sends_content_with_mode() {
        let client = MockClient::new();
        client.expect("filesystem.stat", MockReply::Ok(json!({"mode": 0o100_644})));

        let mut model = sample();
        ManagedFileResource::new(&client).create(&mut model).await.unwrap();

        let calls = client.calls();
        assert_eq!(calls[0].method, "filesystem.file_receive");
        assert!(calls[0].waited);
        assert_eq!(
            calls[0].params,
            json!(["/mnt/tank/conf/app.toml", "retries = 3\n", {"mode": 0o644}])
        );
        assert_eq!(model.mode, Attr::known(String::from("0644")));
    }

    #[tokio::test]
    async fn test_content_survives_read_back() {
        let client = MockClient::new();
        client.expect("filesystem.stat", MockReply::Ok(json!({"mode": 0o100_600})));

        let prior = sample();
        let mut plan = sample();
        plan.content = Attr::Unknown;
        ManagedFileResource::new(&client).update(&prior, &mut plan).await.unwrap();

        // Unknown content fell back to prior; nothing was rewritten.
        assert_eq!(plan.content, prior.content);
        assert_eq!(client.methods(), vec!["filesystem.stat"]);
    }

    #[tokio::test]
    async fn test_delete_chowns_before_unlink() {
        let client = MockClient::new();

        ManagedFileResource::new(&client).delete(&sample()).await.unwrap();

        assert_eq!(client.methods(), vec!["filesystem.chown", "filesystem.unlink"]);
        let calls = client.calls();
        assert!(calls[0].waited);
        assert!(!calls[1].waited);
    }

    #[tokio::test]
    async fn test_delete_proceeds_when_chown_fails() {
        let client = MockClient::new();
        client.expect("filesystem.chown", MockReply::Fail(String::from("EPERM")));

        ManagedFileResource::new(&client).delete(&sample()).await.unwrap();

        assert_eq!(client.methods(), vec!["filesystem.chown", "filesystem.unlink"]);
    }

    #[test]
    fn test_invalid_mode_string_is_rejected() {
        let model = ManagedFileModel {
            mode: Attr::known(String::from("rw-r--r--")),
            ..sample()
        };
        assert!(model.mode_bits().is_err());
    }
}
