//! ZFS volume (zvol) resource.
//!
//! Identity is the dataset path (`pool/name`), assigned at create and used
//! verbatim for import. Several attributes are fixed at creation time:
//! the name, the dataset type, sparseness, and the block size.

use serde_json::{json, Map, Value};
use tracing::info;

use crate::api::ApiClient;
use crate::attr::Attr;
use crate::error::{ApiError, MappingError, ProvisionError, ReconcileError, Result};
use crate::plan::modifier;

use super::convert;

/// Declarative model of a zvol.
#[derive(Debug, Clone, Default)]
pub struct ZvolModel {
    /// Dataset path, e.g. `tank/vm-disk0` (required; identity; create-only).
    pub name: Attr<String>,
    /// Volume size in bytes (required).
    pub volsize: Attr<i64>,
    /// Whether the volume is sparse. Create-only.
    pub sparse: Attr<bool>,
    /// Block size, e.g. "16K". Create-only.
    pub volblocksize: Attr<String>,
    /// Free-form comments.
    pub comments: Attr<String>,
    /// Compression algorithm; the appliance reports canonical uppercase.
    pub compression: Attr<String>,
    /// Deduplication setting; canonical uppercase remotely.
    pub deduplication: Attr<String>,
    /// Readonly setting (ON/OFF/INHERIT).
    pub readonly: Attr<String>,
}

impl ZvolModel {
    /// Builds the params map for `pool.dataset.create`.
    #[must_use]
    pub fn build_create_params(&self) -> Map<String, Value> {
        let mut params = self.build_update_params();
        self.name.write_param(&mut params, "name");
        params.insert(String::from("type"), json!("VOLUME"));
        self.sparse.write_param(&mut params, "sparse");
        self.volblocksize.write_param(&mut params, "volblocksize");
        params
    }

    /// Builds the params map for `pool.dataset.update`: create params minus
    /// the create-only name, type, sparse and block size fields.
    #[must_use]
    pub fn build_update_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        self.volsize.write_param(&mut params, "volsize");
        self.comments.write_param(&mut params, "comments");
        self.compression.write_param(&mut params, "compression");
        self.deduplication.write_param(&mut params, "deduplication");
        self.readonly.write_param(&mut params, "readonly");
        params
    }

    /// Overwrites remote-owned fields from a `pool.dataset.query` entry.
    ///
    /// Dataset properties may come back flat or wrapped in the middleware's
    /// `{"value", "parsed"}` envelope; both shapes are accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity is missing.
    pub fn apply_response(&mut self, response: &Value) -> Result<()> {
        let name = response
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| MappingError::missing("pool.dataset", "name"))?;
        self.name = Attr::known(name.to_string());

        self.volsize = convert::int_property(response, "volsize");
        self.sparse = convert::bool_field(response, "sparse");
        self.volblocksize = convert::string_property(response, "volblocksize");
        self.comments = convert::string_property(response, "comments");
        self.compression = convert::string_property(response, "compression");
        self.deduplication = convert::string_property(response, "deduplication");
        self.readonly = convert::string_property(response, "readonly");
        Ok(())
    }

    /// Plan-time prediction pass: adopts the stored canonical casing for
    /// the enumerated property fields so a lowercase plan value produces
    /// no diff against the appliance's uppercase canonical form.
    #[must_use]
    pub fn predict_plan(mut self, prior: &Self) -> Self {
        self.name = self.name.or_prior(prior.name.clone());
        self.compression = modifier::normalize_case(&prior.compression, self.compression);
        self.deduplication = modifier::normalize_case(&prior.deduplication, self.deduplication);
        self.readonly = modifier::normalize_case(&prior.readonly, self.readonly);
        self
    }
}

/// CRUD orchestrator for zvols.
#[derive(Debug)]
pub struct ZvolResource<'a, C: ApiClient> {
    client: &'a C,
}

impl<'a, C: ApiClient> ZvolResource<'a, C> {
    /// Creates a new zvol orchestrator.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Creates the zvol and maps the response back onto the model.
    ///
    /// # Errors
    ///
    /// Returns an error if the create call fails.
    pub async fn create(&self, model: &mut ZvolModel) -> Result<()> {
        let params = model.build_create_params();
        let response = self
            .client
            .call("pool.dataset.create", json!([params]))
            .await?;
        model.apply_response(&response)?;
        info!("Created zvol {:?}", model.name.as_str());
        Ok(())
    }

    /// Reads the zvol by dataset path; `Ok(None)` signals it was removed.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or decode failure.
    pub async fn read(&self, name: &str) -> Result<Option<ZvolModel>> {
        let response = match self
            .client
            .call("pool.dataset.query", json!([[["id", "=", name]]]))
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let entries = response
            .as_array()
            .ok_or_else(|| ApiError::invalid_response("pool.dataset.query", "Expected an array"))?;
        let Some(entry) = entries.first() else {
            return Ok(None);
        };

        let mut model = ZvolModel::default();
        model.apply_response(entry)?;
        Ok(Some(model))
    }

    /// Updates the zvol when the mapped params differ from prior state.
    ///
    /// # Errors
    ///
    /// Returns an error if the update or read-back call fails.
    pub async fn update(&self, prior: &ZvolModel, plan: &mut ZvolModel) -> Result<()> {
        plan.name = plan.name.clone().or_prior(prior.name.clone());
        let name = require_name(plan)?;

        let params = plan.build_update_params();
        if params != prior.build_update_params() {
            let response = self
                .client
                .call("pool.dataset.update", json!([name.as_str(), params]))
                .await?;
            plan.apply_response(&response)?;
            return Ok(());
        }

        // Nothing changed; refresh from the remote source of truth.
        let response = self
            .client
            .call("pool.dataset.query", json!([[["id", "=", name.as_str()]]]))
            .await?;
        let entry = response
            .as_array()
            .and_then(|entries| entries.first())
            .ok_or_else(|| ProvisionError::Api(ApiError::not_found("pool.dataset", &name)))?;
        plan.apply_response(entry)
    }

    /// Deletes the zvol.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete call fails.
    pub async fn delete(&self, model: &ZvolModel) -> Result<()> {
        let name = require_name(model)?;
        self.client
            .call("pool.dataset.delete", json!([name.as_str(), {"recursive": false}]))
            .await?;
        info!("Deleted zvol {name}");
        Ok(())
    }

    /// Validates an import identifier: the dataset path, taken verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is not a `pool/name` path.
    pub fn import(identifier: &str) -> Result<String> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() || !trimmed.contains('/') {
            return Err(ProvisionError::Reconcile(ReconcileError::InvalidImportId {
                entity: String::from("pool.dataset"),
                identifier: identifier.to_string(),
            }));
        }
        Ok(trimmed.to_string())
    }
}

fn require_name(model: &ZvolModel) -> Result<String> {
    model
        .name
        .as_str()
        .map(String::from)
        .ok_or_else(|| ProvisionError::internal("zvol identity is not known"))
}
