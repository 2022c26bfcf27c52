//! Cron job resource: a straightforward attribute-mapping pass-through.

use serde_json::{json, Map, Value};
use tracing::info;

use crate::api::ApiClient;
use crate::attr::Attr;
use crate::error::{ApiError, MappingError, ProvisionError, Result};

use super::{convert, parse_import_id};

/// Cron schedule block, shared with the cloud-sync task resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CronSchedule {
    /// Minute field.
    pub minute: Attr<String>,
    /// Hour field.
    pub hour: Attr<String>,
    /// Day-of-month field.
    pub dom: Attr<String>,
    /// Month field.
    pub month: Attr<String>,
    /// Day-of-week field.
    pub dow: Attr<String>,
}

impl CronSchedule {
    /// Serializes the schedule into a params map, omitting unset fields.
    #[must_use]
    pub fn to_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        self.minute.write_param(&mut params, "minute");
        self.hour.write_param(&mut params, "hour");
        self.dom.write_param(&mut params, "dom");
        self.month.write_param(&mut params, "month");
        self.dow.write_param(&mut params, "dow");
        params
    }

    /// Decodes a schedule block from a response entry.
    #[must_use]
    pub fn from_response(response: &Value) -> Self {
        Self {
            minute: convert::string_field(response, "minute"),
            hour: convert::string_field(response, "hour"),
            dom: convert::string_field(response, "dom"),
            month: convert::string_field(response, "month"),
            dow: convert::string_field(response, "dow"),
        }
    }
}

/// Declarative model of a cron job.
#[derive(Debug, Clone, Default)]
pub struct CronJobModel {
    /// Remote-assigned identity (computed).
    pub id: Attr<i64>,
    /// User the command runs as (required).
    pub user: Attr<String>,
    /// Command line (required).
    pub command: Attr<String>,
    /// Description shown in the UI.
    pub description: Attr<String>,
    /// Whether the job is enabled.
    pub enabled: Attr<bool>,
    /// Hide standard output from the job mail.
    pub stdout: Attr<bool>,
    /// Hide standard error from the job mail.
    pub stderr: Attr<bool>,
    /// Schedule block.
    pub schedule: CronSchedule,
}

impl CronJobModel {
    /// Builds the params map for both create and update.
    #[must_use]
    pub fn build_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        self.user.write_param(&mut params, "user");
        self.command.write_param(&mut params, "command");
        self.description.write_param(&mut params, "description");
        self.enabled.write_param(&mut params, "enabled");
        self.stdout.write_param(&mut params, "stdout");
        self.stderr.write_param(&mut params, "stderr");

        let schedule = self.schedule.to_params();
        if !schedule.is_empty() {
            params.insert(String::from("schedule"), Value::Object(schedule));
        }
        params
    }

    /// Overwrites remote-owned fields from a `cronjob.query` entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity is missing.
    pub fn apply_response(&mut self, response: &Value) -> Result<()> {
        let id = response
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| MappingError::missing("cronjob", "id"))?;
        self.id = Attr::known(id);
        self.user = convert::string_field(response, "user");
        self.command = convert::string_field(response, "command");
        self.description = convert::string_field(response, "description");
        self.enabled = convert::bool_field(response, "enabled");
        self.stdout = convert::bool_field(response, "stdout");
        self.stderr = convert::bool_field(response, "stderr");
        if let Some(schedule) = response.get("schedule") {
            self.schedule = CronSchedule::from_response(schedule);
        }
        Ok(())
    }
}

/// CRUD orchestrator for cron jobs.
#[derive(Debug)]
pub struct CronJobResource<'a, C: ApiClient> {
    client: &'a C,
}

impl<'a, C: ApiClient> CronJobResource<'a, C> {
    /// Creates a new cron job orchestrator.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Creates the cron job.
    ///
    /// # Errors
    ///
    /// Returns an error if the create call fails.
    pub async fn create(&self, model: &mut CronJobModel) -> Result<()> {
        let params = model.build_params();
        let response = self.client.call("cronjob.create", json!([params])).await?;
        model.apply_response(&response)?;
        info!("Created cron job {:?}", model.id.as_value());
        Ok(())
    }

    /// Reads the cron job; `Ok(None)` signals it was removed.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or decode failure.
    pub async fn read(&self, id: i64) -> Result<Option<CronJobModel>> {
        let response = match self
            .client
            .call("cronjob.query", json!([[["id", "=", id]]]))
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let entries = response
            .as_array()
            .ok_or_else(|| ApiError::invalid_response("cronjob.query", "Expected an array"))?;
        let Some(entry) = entries.first() else {
            return Ok(None);
        };

        let mut model = CronJobModel::default();
        model.apply_response(entry)?;
        Ok(Some(model))
    }

    /// Updates the cron job when the mapped params differ.
    ///
    /// # Errors
    ///
    /// Returns an error if the update call fails.
    pub async fn update(&self, prior: &CronJobModel, plan: &mut CronJobModel) -> Result<()> {
        plan.id = plan.id.clone().or_prior(prior.id.clone());
        let id = plan
            .id
            .as_value()
            .copied()
            .ok_or_else(|| ProvisionError::internal("cron job identity is not known"))?;

        let params = plan.build_params();
        if params != prior.build_params() {
            let response = self.client.call("cronjob.update", json!([id, params])).await?;
            return plan.apply_response(&response);
        }
        Ok(())
    }

    /// Deletes the cron job.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete call fails.
    pub async fn delete(&self, model: &CronJobModel) -> Result<()> {
        let id = model
            .id
            .as_value()
            .copied()
            .ok_or_else(|| ProvisionError::internal("cron job identity is not known"))?;
        self.client.call("cronjob.delete", json!([id])).await?;
        Ok(())
    }

    /// Parses an import identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is not a decimal id.
    pub fn import(identifier: &str) -> Result<i64> {
        parse_import_id("cronjob", identifier)
    }
}
