//! Virtual machine resource model and attribute mapping.

use serde_json::{Map, Value};

use crate::attr::Attr;
use crate::error::{MappingError, Result};
use crate::plan::modifier;
use crate::resources::convert::{bool_field, int_field, string_field};

use super::device::VmDevice;

/// Declarative model of a virtual machine.
#[derive(Debug, Clone, Default)]
pub struct VmModel {
    /// Remote-assigned identity (computed).
    pub id: Attr<i64>,
    /// VM name (required).
    pub name: Attr<String>,
    /// Free-form description.
    pub description: Attr<String>,
    /// Number of virtual CPUs.
    pub vcpus: Attr<i64>,
    /// Cores per virtual CPU.
    pub cores: Attr<i64>,
    /// Threads per core.
    pub threads: Attr<i64>,
    /// Memory in MiB.
    pub memory: Attr<i64>,
    /// Start the VM at boot.
    pub autostart: Attr<bool>,
    /// Guest clock (LOCAL or UTC).
    pub time: Attr<String>,
    /// Bootloader (UEFI or UEFI_CSM).
    pub bootloader: Attr<String>,
    /// Seconds to wait for a guest shutdown before forcing it off.
    pub shutdown_timeout: Attr<i64>,
    /// Driving field: the lifecycle state the VM should be in
    /// ("running" or "stopped"). Never sent to the API directly.
    pub desired_state: Attr<String>,
    /// Remote-controlled lifecycle status (computed).
    pub status: Attr<String>,
    /// Attached devices, in plan order.
    pub devices: Vec<VmDevice>,
}

impl VmModel {
    /// Builds the params map for `vm.create` and `vm.update`.
    ///
    /// Required fields are included unconditionally; optional fields only
    /// when known-set. The VM has no create-only top-level fields, so
    /// create and update share one mapping.
    #[must_use]
    pub fn build_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        self.name.write_param(&mut params, "name");
        self.description.write_param(&mut params, "description");
        self.vcpus.write_param(&mut params, "vcpus");
        self.cores.write_param(&mut params, "cores");
        self.threads.write_param(&mut params, "threads");
        self.memory.write_param(&mut params, "memory");
        self.autostart.write_param(&mut params, "autostart");
        self.time.write_param(&mut params, "time");
        self.bootloader.write_param(&mut params, "bootloader");
        self.shutdown_timeout
            .write_param(&mut params, "shutdown_timeout");
        params
    }

    /// Overwrites every remote-owned field from a `vm.query` entry.
    ///
    /// The driving `desired_state` field is local and left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the response lacks the identity or a device
    /// entry cannot be decoded.
    pub fn apply_response(&mut self, response: &Value) -> Result<()> {
        let id = response
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| MappingError::missing("vm", "id"))?;
        self.id = Attr::known(id);

        self.name = string_field(response, "name");
        self.description = string_field(response, "description");
        self.vcpus = int_field(response, "vcpus");
        self.cores = int_field(response, "cores");
        self.threads = int_field(response, "threads");
        self.memory = int_field(response, "memory");
        self.autostart = bool_field(response, "autostart");
        self.time = string_field(response, "time");
        self.bootloader = string_field(response, "bootloader");
        self.shutdown_timeout = int_field(response, "shutdown_timeout");

        self.status = Attr::from_response(
            response
                .get("status")
                .and_then(|s| s.get("state"))
                .and_then(Value::as_str)
                .map(String::from),
        );

        if let Some(entries) = response.get("devices").and_then(Value::as_array) {
            self.devices = entries
                .iter()
                .map(VmDevice::from_response)
                .collect::<Result<Vec<_>>>()?;
        }

        Ok(())
    }

    /// Plan-time prediction pass: normalizes the driving field's casing
    /// against prior state and predicts the post-apply status.
    #[must_use]
    pub fn predict_plan(mut self, prior: &Self) -> Self {
        self.id = self.id.or_prior(prior.id.clone());
        self.desired_state =
            modifier::normalize_case(&prior.desired_state, self.desired_state);
        self.status =
            modifier::predict_status(&prior.status, &prior.desired_state, &self.desired_state);
        self
    }
}
