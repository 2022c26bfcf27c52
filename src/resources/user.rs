//! User account resource.

use serde_json::{json, Map, Value};
use tracing::info;

use crate::api::ApiClient;
use crate::attr::Attr;
use crate::error::{ApiError, ProvisionError, Result};

use super::{convert, parse_import_id};

/// Declarative model of a user account.
#[derive(Debug, Clone, Default)]
pub struct UserModel {
    /// Remote-assigned identity (computed).
    pub id: Attr<i64>,
    /// Unix UID; remote-assigned when not set (computed).
    pub uid: Attr<i64>,
    /// Login name (required).
    pub username: Attr<String>,
    /// Full name (required by the API).
    pub full_name: Attr<String>,
    /// Password. Write-only: the remote API never echoes it back, so the
    /// model's value survives read-backs untouched.
    pub password: Attr<String>,
    /// Primary group identity.
    pub group: Attr<i64>,
    /// One-shot creation flag: create a matching primary group along with
    /// the user. Create-only; never part of update params.
    pub group_create: Attr<bool>,
    /// Home directory.
    pub home: Attr<String>,
    /// Login shell.
    pub shell: Attr<String>,
    /// Email address.
    pub email: Attr<String>,
    /// Whether the account is locked.
    pub locked: Attr<bool>,
    /// Whether Samba authentication is enabled.
    pub smb: Attr<bool>,
    /// Authorized SSH public key.
    pub sshpubkey: Attr<String>,
    /// Delete option: also remove the user's primary group. Local only.
    pub delete_group: Attr<bool>,
}

impl UserModel {
    /// Builds the params map for `user.create`.
    #[must_use]
    pub fn build_create_params(&self) -> Map<String, Value> {
        let mut params = self.build_update_params();
        self.group_create.write_param(&mut params, "group_create");
        params
    }

    /// Builds the params map for `user.update`: create params minus the
    /// create-only `group_create` flag.
    #[must_use]
    pub fn build_update_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        self.username.write_param(&mut params, "username");
        self.full_name.write_param(&mut params, "full_name");
        self.password.write_param(&mut params, "password");
        self.uid.write_param(&mut params, "uid");
        self.group.write_param(&mut params, "group");
        self.home.write_param(&mut params, "home");
        self.shell.write_param(&mut params, "shell");
        self.email.write_param(&mut params, "email");
        self.locked.write_param(&mut params, "locked");
        self.smb.write_param(&mut params, "smb");
        self.sshpubkey.write_param(&mut params, "sshpubkey");
        params
    }

    /// Overwrites every remote-owned field from a `user.query` entry.
    /// The password is never echoed and keeps its current value.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity is missing.
    pub fn apply_response(&mut self, response: &Value) -> Result<()> {
        let id = response
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| crate::error::MappingError::missing("user", "id"))?;
        self.id = Attr::known(id);

        self.uid = convert::int_field(response, "uid");
        self.username = convert::string_field(response, "username");
        self.full_name = convert::string_field(response, "full_name");
        self.home = convert::string_field(response, "home");
        self.shell = convert::string_field(response, "shell");
        self.email = convert::string_field(response, "email");
        self.locked = convert::bool_field(response, "locked");
        self.smb = convert::bool_field(response, "smb");
        self.sshpubkey = convert::string_field(response, "sshpubkey");

        // The primary group comes back either as a bare id or expanded.
        self.group = Attr::from_response(match response.get("group") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::Object(obj)) => obj.get("id").and_then(Value::as_i64),
            _ => None,
        });

        Ok(())
    }
}

/// CRUD orchestrator for user accounts.
#[derive(Debug)]
pub struct UserResource<'a, C: ApiClient> {
    /// Remote API client.
    client: &'a C,
}

impl<'a, C: ApiClient> UserResource<'a, C> {
    /// Creates a new user orchestrator.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Creates the user and reads back the remote-owned fields.
    ///
    /// # Errors
    ///
    /// Returns an error if any remote call fails.
    pub async fn create(&self, model: &mut UserModel) -> Result<()> {
        let params = model.build_create_params();
        let response = self.client.call("user.create", json!([params])).await?;

        let id = response
            .as_i64()
            .ok_or_else(|| ApiError::invalid_response("user.create", "Expected the new id"))?;
        info!("Created user {id}");

        self.read_into(id, model).await
    }

    /// Reads the user by identity; `Ok(None)` signals it was removed.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or decode failure.
    pub async fn read(&self, id: i64) -> Result<Option<UserModel>> {
        let response = match self.client.call("user.query", json!([[["id", "=", id]]])).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let entries = response
            .as_array()
            .ok_or_else(|| ApiError::invalid_response("user.query", "Expected an array"))?;

        let Some(entry) = entries.first() else {
            return Ok(None);
        };

        let mut model = UserModel::default();
        model.apply_response(entry)?;
        Ok(Some(model))
    }

    /// Updates the user when the mapped params differ from prior state.
    ///
    /// # Errors
    ///
    /// Returns an error if the update or read-back call fails.
    pub async fn update(&self, prior: &UserModel, plan: &mut UserModel) -> Result<()> {
        plan.id = plan.id.clone().or_prior(prior.id.clone());
        let id = plan
            .id
            .as_value()
            .copied()
            .ok_or_else(|| ProvisionError::internal("user identity is not known"))?;

        let params = plan.build_update_params();
        if params != prior.build_update_params() {
            self.client.call("user.update", json!([id, params])).await?;
        }

        self.read_into(id, plan).await
    }

    /// Deletes the user, passing along the delete-primary-group option.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete call fails.
    pub async fn delete(&self, model: &UserModel) -> Result<()> {
        let id = model
            .id
            .as_value()
            .copied()
            .ok_or_else(|| ProvisionError::internal("user identity is not known"))?;

        let delete_group = model.delete_group.as_value().copied().unwrap_or(true);
        self.client
            .call("user.delete", json!([id, {"delete_group": delete_group}]))
            .await?;
        info!("Deleted user {id}");
        Ok(())
    }

    /// Parses an import identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is not a decimal id.
    pub fn import(identifier: &str) -> Result<i64> {
        parse_import_id("user", identifier)
    }

    async fn read_into(&self, id: i64, model: &mut UserModel) -> Result<()> {
        let response = self.client.call("user.query", json!([[["id", "=", id]]])).await?;
        let entry = response
            .as_array()
            .and_then(|entries| entries.first())
            .ok_or_else(|| ProvisionError::Api(ApiError::not_found("user", id)))?;
        model.apply_response(entry)
    }
}
