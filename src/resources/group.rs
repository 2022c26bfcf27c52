//! Group resource.

use serde_json::{json, Map, Value};
use tracing::info;

use crate::api::ApiClient;
use crate::attr::Attr;
use crate::error::{ApiError, MappingError, ProvisionError, Result};

use super::{convert, parse_import_id};

/// Declarative model of a group.
#[derive(Debug, Clone, Default)]
pub struct GroupModel {
    /// Remote-assigned identity (computed).
    pub id: Attr<i64>,
    /// Unix GID; remote-assigned when not set. Create-only.
    pub gid: Attr<i64>,
    /// Group name (required).
    pub name: Attr<String>,
    /// Whether the group is available to Samba.
    pub smb: Attr<bool>,
}

impl GroupModel {
    /// Builds the params map for `group.create`.
    #[must_use]
    pub fn build_create_params(&self) -> Map<String, Value> {
        let mut params = self.build_update_params();
        self.gid.write_param(&mut params, "gid");
        params
    }

    /// Builds the params map for `group.update` (no create-only `gid`).
    #[must_use]
    pub fn build_update_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        self.name.write_param(&mut params, "name");
        self.smb.write_param(&mut params, "smb");
        params
    }

    /// Overwrites remote-owned fields from a `group.query` entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity is missing.
    pub fn apply_response(&mut self, response: &Value) -> Result<()> {
        let id = response
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| MappingError::missing("group", "id"))?;
        self.id = Attr::known(id);
        self.gid = convert::int_field(response, "gid");
        self.name = convert::string_field(response, "name");
        self.smb = convert::bool_field(response, "smb");
        Ok(())
    }
}

/// CRUD orchestrator for groups.
#[derive(Debug)]
pub struct GroupResource<'a, C: ApiClient> {
    client: &'a C,
}

impl<'a, C: ApiClient> GroupResource<'a, C> {
    /// Creates a new group orchestrator.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Creates the group and reads back the remote-owned fields.
    ///
    /// # Errors
    ///
    /// Returns an error if any remote call fails.
    pub async fn create(&self, model: &mut GroupModel) -> Result<()> {
        let params = model.build_create_params();
        let response = self.client.call("group.create", json!([params])).await?;
        let id = response
            .as_i64()
            .ok_or_else(|| ApiError::invalid_response("group.create", "Expected the new id"))?;
        info!("Created group {id}");
        self.read_into(id, model).await
    }

    /// Reads the group by identity; `Ok(None)` signals it was removed.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or decode failure.
    pub async fn read(&self, id: i64) -> Result<Option<GroupModel>> {
        let response = match self
            .client
            .call("group.query", json!([[["id", "=", id]]]))
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let entries = response
            .as_array()
            .ok_or_else(|| ApiError::invalid_response("group.query", "Expected an array"))?;
        let Some(entry) = entries.first() else {
            return Ok(None);
        };

        let mut model = GroupModel::default();
        model.apply_response(entry)?;
        Ok(Some(model))
    }

    /// Updates the group when the mapped params differ from prior state.
    ///
    /// # Errors
    ///
    /// Returns an error if the update or read-back call fails.
    pub async fn update(&self, prior: &GroupModel, plan: &mut GroupModel) -> Result<()> {
        plan.id = plan.id.clone().or_prior(prior.id.clone());
        let id = require_id(plan)?;

        let params = plan.build_update_params();
        if params != prior.build_update_params() {
            self.client.call("group.update", json!([id, params])).await?;
        }

        self.read_into(id, plan).await
    }

    /// Deletes the group.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete call fails.
    pub async fn delete(&self, model: &GroupModel) -> Result<()> {
        let id = require_id(model)?;
        self.client.call("group.delete", json!([id])).await?;
        info!("Deleted group {id}");
        Ok(())
    }

    /// Parses an import identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is not a decimal id.
    pub fn import(identifier: &str) -> Result<i64> {
        parse_import_id("group", identifier)
    }

    async fn read_into(&self, id: i64, model: &mut GroupModel) -> Result<()> {
        let response = self
            .client
            .call("group.query", json!([[["id", "=", id]]]))
            .await?;
        let entry = response
            .as_array()
            .and_then(|entries| entries.first())
            .ok_or_else(|| ProvisionError::Api(ApiError::not_found("group", id)))?;
        model.apply_response(entry)
    }
}

fn require_id(model: &GroupModel) -> Result<i64> {
    model
        .id
        .as_value()
        .copied()
        .ok_or_else(|| ProvisionError::internal("group identity is not known"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{MockClient, MockReply};

    #[test]
    fn test_gid_is_create_only() {
        let model = GroupModel {
            name: Attr::known(String::from("media")),
            gid: Attr::known(3000),
            ..GroupModel::default()
        };

        assert!(model.build_create_params().contains_key("gid"));
        assert!(!model.build_update_params().contains_key("gid"));
    }

    #[tokio::test]
    async fn test_create_then_read_back() {
        let client = MockClient::new();
        client.expect("group.create", MockReply::Ok(json!(7)));
        client.expect(
            "group.query",
            MockReply::Ok(json!([{"id": 7, "gid": 3000, "name": "media", "smb": false}])),
        );

        let mut model = GroupModel {
            name: Attr::known(String::from("media")),
            ..GroupModel::default()
        };
        GroupResource::new(&client).create(&mut model).await.unwrap();

        assert_eq!(model.id, Attr::known(7));
        assert_eq!(model.gid, Attr::known(3000));
    }
}
