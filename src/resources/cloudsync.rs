//! Cloud sync task resource.
//!
//! Besides the usual CRUD surface this resource can trigger a sync run
//! on demand, which is a long-running job on the appliance side.

use serde_json::{json, Map, Value};
use tracing::info;

use crate::api::ApiClient;
use crate::attr::Attr;
use crate::error::{ApiError, MappingError, ProvisionError, Result};
use crate::plan::modifier;

use super::cron::CronSchedule;
use super::{convert, parse_import_id};

/// Declarative model of a cloud sync task.
#[derive(Debug, Clone, Default)]
pub struct CloudSyncModel {
    /// Remote-assigned identity (computed).
    pub id: Attr<i64>,
    /// Human-readable task description (required).
    pub description: Attr<String>,
    /// Local filesystem path to sync (required).
    pub path: Attr<String>,
    /// Identity of the cloud credential to use (required).
    pub credentials: Attr<i64>,
    /// Transfer direction (PUSH or PULL); canonical uppercase remotely.
    pub direction: Attr<String>,
    /// Transfer mode (SYNC, COPY or MOVE); canonical uppercase remotely.
    pub transfer_mode: Attr<String>,
    /// Whether the task runs on its schedule.
    pub enabled: Attr<bool>,
    /// Take a dataset snapshot before pushing.
    pub snapshot: Attr<bool>,
    /// Remote bucket name.
    pub bucket: Attr<String>,
    /// Folder inside the bucket.
    pub folder: Attr<String>,
    /// Schedule block.
    pub schedule: CronSchedule,
}

impl CloudSyncModel {
    /// Builds the params map shared by create and update.
    #[must_use]
    pub fn build_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        self.description.write_param(&mut params, "description");
        self.path.write_param(&mut params, "path");
        self.credentials.write_param(&mut params, "credentials");
        self.direction.write_param(&mut params, "direction");
        self.transfer_mode.write_param(&mut params, "transfer_mode");
        self.enabled.write_param(&mut params, "enabled");
        self.snapshot.write_param(&mut params, "snapshot");

        let mut attributes = Map::new();
        self.bucket.write_param(&mut attributes, "bucket");
        self.folder.write_param(&mut attributes, "folder");
        if !attributes.is_empty() {
            params.insert(String::from("attributes"), Value::Object(attributes));
        }

        let schedule = self.schedule.to_params();
        if !schedule.is_empty() {
            params.insert(String::from("schedule"), Value::Object(schedule));
        }
        params
    }

    /// Overwrites remote-owned fields from a `cloudsync.query` entry.
    ///
    /// The credential may come back expanded as an object; only its
    /// identity is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity is missing.
    pub fn apply_response(&mut self, response: &Value) -> Result<()> {
        let id = response
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| MappingError::missing("cloudsync", "id"))?;
        self.id = Attr::known(id);

        self.description = convert::string_field(response, "description");
        self.path = convert::string_field(response, "path");
        self.direction = convert::string_field(response, "direction");
        self.transfer_mode = convert::string_field(response, "transfer_mode");
        self.enabled = convert::bool_field(response, "enabled");
        self.snapshot = convert::bool_field(response, "snapshot");

        self.credentials = Attr::from_response(match response.get("credentials") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::Object(obj)) => obj.get("id").and_then(Value::as_i64),
            _ => None,
        });

        if let Some(attributes) = response.get("attributes") {
            self.bucket = convert::string_field(attributes, "bucket");
            self.folder = convert::string_field(attributes, "folder");
        }
        if let Some(schedule) = response.get("schedule") {
            self.schedule = CronSchedule::from_response(schedule);
        }
        Ok(())
    }

    /// Plan-time prediction pass: keeps a case-insensitive plan stable
    /// against the appliance's canonical uppercase enums.
    #[must_use]
    pub fn predict_plan(mut self, prior: &Self) -> Self {
        self.id = self.id.or_prior(prior.id.clone());
        self.direction = modifier::normalize_case(&prior.direction, self.direction);
        self.transfer_mode = modifier::normalize_case(&prior.transfer_mode, self.transfer_mode);
        self
    }
}

/// CRUD orchestrator for cloud sync tasks.
#[derive(Debug)]
pub struct CloudSyncResource<'a, C: ApiClient> {
    client: &'a C,
}

impl<'a, C: ApiClient> CloudSyncResource<'a, C> {
    /// Creates a new cloud sync orchestrator.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Creates the task.
    ///
    /// # Errors
    ///
    /// Returns an error if the create call fails.
    pub async fn create(&self, model: &mut CloudSyncModel) -> Result<()> {
        let params = model.build_params();
        let response = self
            .client
            .call("cloudsync.create", json!([params]))
            .await?;
        model.apply_response(&response)?;
        info!("Created cloud sync task {:?}", model.id.as_value());
        Ok(())
    }

    /// Reads the task; `Ok(None)` signals it was removed.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or decode failure.
    pub async fn read(&self, id: i64) -> Result<Option<CloudSyncModel>> {
        let response = match self
            .client
            .call("cloudsync.query", json!([[["id", "=", id]]]))
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let entries = response
            .as_array()
            .ok_or_else(|| ApiError::invalid_response("cloudsync.query", "Expected an array"))?;
        let Some(entry) = entries.first() else {
            return Ok(None);
        };

        let mut model = CloudSyncModel::default();
        model.apply_response(entry)?;
        Ok(Some(model))
    }

    /// Updates the task when the mapped params differ.
    ///
    /// # Errors
    ///
    /// Returns an error if the update call fails.
    pub async fn update(&self, prior: &CloudSyncModel, plan: &mut CloudSyncModel) -> Result<()> {
        plan.id = plan.id.clone().or_prior(prior.id.clone());
        let id = require_id(plan)?;

        let params = plan.build_params();
        if params != prior.build_params() {
            let response = self
                .client
                .call("cloudsync.update", json!([id, params]))
                .await?;
            return plan.apply_response(&response);
        }
        Ok(())
    }

    /// Deletes the task.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete call fails.
    pub async fn delete(&self, model: &CloudSyncModel) -> Result<()> {
        let id = require_id(model)?;
        self.client.call("cloudsync.delete", json!([id])).await?;
        info!("Deleted cloud sync task {id}");
        Ok(())
    }

    /// Triggers a sync run and blocks until the job reaches a terminal
    /// state.
    ///
    /// # Errors
    ///
    /// Returns an error if the run cannot be started or the job fails.
    pub async fn run(&self, model: &CloudSyncModel) -> Result<()> {
        let id = require_id(model)?;
        info!("Running cloud sync task {id}");
        self.client
            .call_and_wait("cloudsync.sync", json!([id]))
            .await?;
        Ok(())
    }

    /// Parses an import identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is not a decimal id.
    pub fn import(identifier: &str) -> Result<i64> {
        parse_import_id("cloudsync", identifier)
    }
}

fn require_id(model: &CloudSyncModel) -> Result<i64> {
    model
        .id
        .as_value()
        .copied()
        .ok_or_else(|| ProvisionError::internal("cloud sync task identity is not known"))
}
