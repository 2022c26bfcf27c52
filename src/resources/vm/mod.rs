//! Virtual machine resource.
//!
//! The VM is the one composite resource: it owns a collection of devices
//! reconciled through the diff engine, and its updates are sequenced around
//! lifecycle transitions (stop before device reconfiguration, stop before
//! delete, restart afterwards).

mod device;
mod lifecycle;
mod model;

pub use device::{
    CdromDevice, DevicePayload, DiskDevice, DisplayDevice, NicDevice, PciDevice, RawDevice,
    UsbDevice, VmDevice,
};
pub use lifecycle::{LifecycleSequencer, VmLifecycle};
pub use model::VmModel;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::error::{ApiError, MappingError, ProvisionError, ReconcileError, Result};
use crate::plan::DiffEngine;

use super::parse_import_id;

/// CRUD orchestrator for virtual machines.
#[derive(Debug)]
pub struct VmResource<'a, C: ApiClient> {
    /// Remote API client.
    client: &'a C,
    /// Device diff engine.
    diff_engine: DiffEngine,
    /// Lifecycle sequencer.
    sequencer: LifecycleSequencer<'a, C>,
}

impl<'a, C: ApiClient> VmResource<'a, C> {
    /// Creates a new VM orchestrator.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self {
            client,
            diff_engine: DiffEngine::new(),
            sequencer: LifecycleSequencer::new(client),
        }
    }

    /// Creates the VM, its devices, and transitions it to the desired
    /// lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns an error if any remote call fails. Devices already created
    /// are not rolled back; the next Read observes them.
    pub async fn create(&self, model: &mut VmModel) -> Result<()> {
        let params = model.build_params();
        let response = self.client.call("vm.create", json!([params])).await?;
        model.apply_response(&response)?;

        let vm_id = require_id(model)?;
        info!("Created vm {vm_id}");

        for device in &mut model.devices {
            let response = self
                .client
                .call("vm.device.create", json!([device.to_params(vm_id)]))
                .await
                .map_err(|e| device_error("create", device.describe(), vm_id, &e))?;
            device.id = response.get("id").and_then(Value::as_i64);
        }

        if let Some(desired) = parse_desired(model)? {
            // A freshly created VM is stopped.
            self.sequencer
                .ensure(vm_id, VmLifecycle::Stopped, desired)
                .await?;
        }

        self.read_into(vm_id, model).await
    }

    /// Reads the VM by identity. Returns `Ok(None)` when the VM no longer
    /// exists, signaling the caller to drop its persisted state.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or decode failure.
    pub async fn read(&self, id: i64) -> Result<Option<VmModel>> {
        let response = match self.client.call("vm.query", query_by_id(id)).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let entries = response
            .as_array()
            .ok_or_else(|| ApiError::invalid_response("vm.query", "Expected an array"))?;

        let Some(entry) = entries.first() else {
            return Ok(None);
        };

        let mut model = VmModel::default();
        model.apply_response(entry)?;
        Ok(Some(model))
    }

    /// Reconciles the VM toward the planned model: top-level update when the
    /// mapped params differ, device create/update/delete per the diff
    /// engine (quiescing an active VM first), then the lifecycle transition
    /// pass and a read-back.
    ///
    /// # Errors
    ///
    /// The first failing call aborts the reconciliation; earlier operations
    /// are not undone.
    pub async fn update(&self, prior: &VmModel, plan: &mut VmModel) -> Result<()> {
        plan.id = plan.id.clone().or_prior(prior.id.clone());
        let vm_id = require_id(plan)?;

        let planned_params = plan.build_params();
        if planned_params != prior.build_params() {
            debug!("vm {vm_id} top-level attributes changed");
            self.client
                .call("vm.update", json!([vm_id, planned_params]))
                .await?;
        }

        let diff = self.diff_engine.compute(&plan.devices, &prior.devices);
        let explicit_desired = match parse_desired(plan)? {
            Some(desired) => Some(desired),
            None => prior
                .desired_state
                .as_str()
                .map(str::parse::<VmLifecycle>)
                .transpose()
                .map_err(ProvisionError::from)?,
        };

        if !diff.has_changes() && explicit_desired.is_none() {
            return self.read_into(vm_id, plan).await;
        }

        let mut current = self.query_status(vm_id).await?;
        let was_active = current.is_active();

        if diff.has_changes() {
            info!(
                "Reconciling vm {vm_id} devices: {} creates, {} updates, {} deletes",
                diff.creates.len(),
                diff.updates.len(),
                diff.deletes.len()
            );

            if was_active {
                self.sequencer.ensure_stopped(vm_id, current).await?;
                current = VmLifecycle::Stopped;
            }

            for device_id in &diff.deletes {
                self.client
                    .call("vm.device.delete", json!([device_id]))
                    .await
                    .map_err(|e| device_error("delete", format!("#{device_id}"), vm_id, &e))?;
            }

            for (device_id, device) in &diff.updates {
                self.client
                    .call("vm.device.update", json!([device_id, device.to_params(vm_id)]))
                    .await
                    .map_err(|e| device_error("update", device.describe(), vm_id, &e))?;
            }

            for device in &diff.creates {
                self.client
                    .call("vm.device.create", json!([device.to_params(vm_id)]))
                    .await
                    .map_err(|e| device_error("create", device.describe(), vm_id, &e))?;
            }
        }

        // Without an explicit driving value, a VM that was running before a
        // device reconciliation is brought back up.
        let desired = explicit_desired.or(if was_active {
            Some(VmLifecycle::Running)
        } else {
            None
        });

        if let Some(desired) = desired {
            self.sequencer.ensure(vm_id, current, desired).await?;
        }

        self.read_into(vm_id, plan).await
    }

    /// Deletes the VM, stopping it first (blocking) when it is active.
    ///
    /// # Errors
    ///
    /// Returns an error if the stop or delete call fails.
    pub async fn delete(&self, model: &VmModel) -> Result<()> {
        let vm_id = require_id(model)?;

        let current = self.query_status(vm_id).await?;
        self.sequencer.ensure_stopped(vm_id, current).await?;

        self.client.call("vm.delete", json!([vm_id])).await?;
        info!("Deleted vm {vm_id}");
        Ok(())
    }

    /// Parses an import identifier into a VM identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is not a decimal id.
    pub fn import(identifier: &str) -> Result<i64> {
        parse_import_id("vm", identifier)
    }

    /// Queries the live lifecycle state.
    async fn query_status(&self, vm_id: i64) -> Result<VmLifecycle> {
        let response = self.client.call("vm.status", json!([vm_id])).await?;
        let state = response
            .get("state")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::invalid_response("vm.status", "Missing state"))?;
        Ok(state.parse::<VmLifecycle>()?)
    }

    /// Refreshes the model from a `vm.query` read-back.
    async fn read_into(&self, vm_id: i64, model: &mut VmModel) -> Result<()> {
        let response = self.client.call("vm.query", query_by_id(vm_id)).await?;
        let entry = response
            .as_array()
            .and_then(|entries| entries.first())
            .ok_or_else(|| ProvisionError::Api(ApiError::not_found("vm", vm_id)))?;
        model.apply_response(entry)
    }
}

fn require_id(model: &VmModel) -> Result<i64> {
    model
        .id
        .as_value()
        .copied()
        .ok_or_else(|| ProvisionError::internal("vm identity is not known"))
}

/// Builds the standard `[[["id", "=", id]]]` query filter.
fn query_by_id(id: i64) -> Value {
    json!([[["id", "=", id]]])
}

/// Parses the model's driving field, if known.
fn parse_desired(model: &VmModel) -> Result<Option<VmLifecycle>> {
    model
        .desired_state
        .as_str()
        .map(str::parse)
        .transpose()
        .map_err(|e: MappingError| e.into())
}

fn device_error(
    operation: &str,
    device: String,
    vm_id: i64,
    source: &ProvisionError,
) -> ProvisionError {
    ProvisionError::Reconcile(ReconcileError::DeviceOperationFailed {
        operation: operation.to_string(),
        device,
        vm_id,
        reason: source.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{MockClient, MockReply};
    use crate::attr::Attr;

    fn disk(id: Option<i64>, path: &str) -> VmDevice {
        VmDevice {
            id,
            order: None,
            payload: DevicePayload::Disk(DiskDevice {
                path: path.to_string(),
                disk_type: None,
                logical_sectorsize: None,
                physical_sectorsize: None,
            }),
        }
    }

    fn read_back(id: i64, state: &str) -> MockReply {
        MockReply::Ok(json!([{
            "id": id,
            "name": "worker-1",
            "status": {"state": state},
            "devices": [],
        }]))
    }

    fn base_model(id: Option<i64>) -> VmModel {
        VmModel {
            id: id.map_or(Attr::Unknown, Attr::known),
            name: Attr::known(String::from("worker-1")),
            memory: Attr::known(4096),
            ..VmModel::default()
        }
    }

    #[tokio::test]
    async fn test_create_sequences_devices_then_start() {
        let client = MockClient::new();
        client.expect("vm.create", MockReply::Ok(json!({"id": 14, "name": "worker-1"})));
        client.expect("vm.device.create", MockReply::Ok(json!({"id": 50})));
        client.expect("vm.query", read_back(14, "RUNNING"));

        let mut model = base_model(None);
        model.desired_state = Attr::known(String::from("running"));
        model.devices = vec![disk(None, "/dev/zvol/tank/d0")];

        let resource = VmResource::new(&client);
        resource.create(&mut model).await.unwrap();

        assert_eq!(
            client.methods(),
            vec!["vm.create", "vm.device.create", "vm.start", "vm.query"]
        );
        let calls = client.calls();
        assert!(!calls[2].waited, "start is fire-and-forget");
        assert_eq!(model.id, Attr::known(14));
        assert_eq!(model.status, Attr::known(String::from("RUNNING")));
    }

    #[tokio::test]
    async fn test_delete_stops_active_vm_first() {
        let client = MockClient::new();
        client.expect("vm.status", MockReply::Ok(json!({"state": "RUNNING"})));

        let model = base_model(Some(14));
        let resource = VmResource::new(&client);
        resource.delete(&model).await.unwrap();

        assert_eq!(client.methods(), vec!["vm.status", "vm.stop", "vm.delete"]);
        assert!(client.calls()[1].waited, "stop uses the blocking variant");
    }

    #[tokio::test]
    async fn test_delete_skips_stop_when_inactive() {
        let client = MockClient::new();
        client.expect("vm.status", MockReply::Ok(json!({"state": "STOPPED"})));

        let model = base_model(Some(14));
        let resource = VmResource::new(&client);
        resource.delete(&model).await.unwrap();

        assert_eq!(client.methods(), vec!["vm.status", "vm.delete"]);
    }

    #[tokio::test]
    async fn test_update_without_changes_issues_no_mutation() {
        let client = MockClient::new();
        client.expect("vm.query", read_back(14, "STOPPED"));

        let prior = VmModel {
            devices: vec![disk(Some(50), "/a")],
            ..base_model(Some(14))
        };
        let mut plan = prior.clone();

        let resource = VmResource::new(&client);
        resource.update(&prior, &mut plan).await.unwrap();

        assert_eq!(client.methods(), vec!["vm.query"]);
    }

    #[tokio::test]
    async fn test_update_quiesces_before_device_change_and_restores() {
        let client = MockClient::new();
        client.expect("vm.status", MockReply::Ok(json!({"state": "RUNNING"})));
        client.expect("vm.query", read_back(14, "RUNNING"));

        let prior = VmModel {
            devices: vec![disk(Some(50), "/old")],
            ..base_model(Some(14))
        };
        let mut plan = VmModel {
            devices: vec![disk(Some(50), "/new")],
            ..base_model(Some(14))
        };

        let resource = VmResource::new(&client);
        resource.update(&prior, &mut plan).await.unwrap();

        assert_eq!(
            client.methods(),
            vec!["vm.status", "vm.stop", "vm.device.update", "vm.start", "vm.query"]
        );
        assert!(client.calls()[1].waited);
    }

    #[tokio::test]
    async fn test_update_mixed_device_operations() {
        let client = MockClient::new();
        client.expect("vm.status", MockReply::Ok(json!({"state": "STOPPED"})));
        client.expect("vm.query", read_back(14, "STOPPED"));

        let prior = VmModel {
            devices: vec![disk(Some(50), "/old"), disk(Some(60), "/c")],
            ..base_model(Some(14))
        };
        let mut plan = VmModel {
            devices: vec![disk(None, "/a"), disk(Some(50), "/b")],
            ..base_model(Some(14))
        };

        let resource = VmResource::new(&client);
        resource.update(&prior, &mut plan).await.unwrap();

        assert_eq!(
            client.methods(),
            vec![
                "vm.status",
                "vm.device.delete",
                "vm.device.update",
                "vm.device.create",
                "vm.query"
            ]
        );

        let calls = client.calls();
        assert_eq!(calls[1].params, json!([60]));
        assert_eq!(calls[2].params[0], json!(50));
    }

    #[tokio::test]
    async fn test_device_failure_aborts_without_rollback() {
        let client = MockClient::new();
        client.expect("vm.status", MockReply::Ok(json!({"state": "STOPPED"})));
        client.expect("vm.device.delete", MockReply::Fail(String::from("busy")));

        let prior = VmModel {
            devices: vec![disk(Some(60), "/c")],
            ..base_model(Some(14))
        };
        let mut plan = VmModel {
            devices: vec![disk(None, "/a")],
            ..base_model(Some(14))
        };

        let resource = VmResource::new(&client);
        let err = resource.update(&prior, &mut plan).await.unwrap_err();

        assert!(err.to_string().contains("busy"));
        // Reconciliation stopped at the failing call; nothing after it ran.
        assert_eq!(client.methods(), vec!["vm.status", "vm.device.delete"]);
    }

    #[tokio::test]
    async fn test_read_missing_vm_signals_removed() {
        let client = MockClient::new();
        client.expect("vm.query", MockReply::Ok(json!([])));

        let resource = VmResource::new(&client);
        assert!(resource.read(99).await.unwrap().is_none());
    }

    #[test]
    fn test_import_parses_numeric_id() {
        assert_eq!(VmResource::<MockClient>::import("14").unwrap(), 14);
        assert!(VmResource::<MockClient>::import("worker-1").is_err());
    }
}
