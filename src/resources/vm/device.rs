//! Virtual machine device entities.
//!
//! The seven device kinds share an envelope (remote-assigned identity, kind
//! discriminator, boot order) and differ only in their payload fields. The
//! diff engine operates on the envelope; payload comparison is exact field
//! equality per kind.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{MappingError, Result};
use crate::plan::Reconcilable;

/// A virtual device attached to a VM.
#[derive(Debug, Clone, PartialEq)]
pub struct VmDevice {
    /// Remote-assigned device identity, absent until first create.
    pub id: Option<i64>,
    /// Boot/attach order.
    pub order: Option<i64>,
    /// Kind-specific payload.
    pub payload: DevicePayload,
}

/// Kind-specific device payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DevicePayload {
    /// Zvol-backed virtual disk.
    Disk(DiskDevice),
    /// Raw file-backed disk.
    Raw(RawDevice),
    /// CD-ROM drive.
    Cdrom(CdromDevice),
    /// Network interface.
    Nic(NicDevice),
    /// SPICE/VNC display.
    Display(DisplayDevice),
    /// PCI passthrough device.
    Pci(PciDevice),
    /// USB passthrough device.
    Usb(UsbDevice),
}

/// Zvol-backed disk attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskDevice {
    /// Zvol device path.
    pub path: String,
    /// Disk bus type (AHCI or VIRTIO).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
    /// Logical sector size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_sectorsize: Option<i64>,
    /// Physical sector size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_sectorsize: Option<i64>,
}

/// Raw file-backed disk attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDevice {
    /// Backing file path.
    pub path: String,
    /// Disk bus type (AHCI or VIRTIO).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
    /// File size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    /// Whether this is the boot device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot: Option<bool>,
}

/// CD-ROM attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdromDevice {
    /// ISO image path.
    pub path: String,
}

/// Network interface attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NicDevice {
    /// NIC emulation type (E1000 or VIRTIO).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub nic_type: Option<String>,
    /// MAC address; remote-generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    /// Host interface to attach to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nic_attach: Option<String>,
}

/// Display attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayDevice {
    /// Display protocol (SPICE or VNC).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub display_type: Option<String>,
    /// Screen resolution (e.g. "1024x768").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// Listen port; remote-assigned when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    /// Bind address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    /// Whether the web interface is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<bool>,
}

/// PCI passthrough attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PciDevice {
    /// Host PCI passthrough device id.
    pub pptdev: String,
}

/// USB passthrough attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsbDevice {
    /// Host USB device identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// USB controller type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_type: Option<String>,
}

impl DevicePayload {
    /// Returns the remote kind discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Disk(_) => "DISK",
            Self::Raw(_) => "RAW",
            Self::Cdrom(_) => "CDROM",
            Self::Nic(_) => "NIC",
            Self::Display(_) => "DISPLAY",
            Self::Pci(_) => "PCI",
            Self::Usb(_) => "USB",
        }
    }

    /// Serializes the payload into the remote `attributes` map.
    fn to_attributes(&self) -> Value {
        match self {
            Self::Disk(d) => json!(d),
            Self::Raw(d) => json!(d),
            Self::Cdrom(d) => json!(d),
            Self::Nic(d) => json!(d),
            Self::Display(d) => json!(d),
            Self::Pci(d) => json!(d),
            Self::Usb(d) => json!(d),
        }
    }

    /// Decodes a payload from the kind discriminator and `attributes` map.
    fn from_attributes(kind: &str, attributes: Value) -> Result<Self> {
        let decode_err = |e: serde_json::Error| {
            MappingError::shape("vm.device", "attributes", e.to_string())
        };

        Ok(match kind {
            "DISK" => Self::Disk(serde_json::from_value(attributes).map_err(decode_err)?),
            "RAW" => Self::Raw(serde_json::from_value(attributes).map_err(decode_err)?),
            "CDROM" => Self::Cdrom(serde_json::from_value(attributes).map_err(decode_err)?),
            "NIC" => Self::Nic(serde_json::from_value(attributes).map_err(decode_err)?),
            "DISPLAY" => Self::Display(serde_json::from_value(attributes).map_err(decode_err)?),
            "PCI" => Self::Pci(serde_json::from_value(attributes).map_err(decode_err)?),
            "USB" => Self::Usb(serde_json::from_value(attributes).map_err(decode_err)?),
            other => {
                return Err(MappingError::UnknownDeviceKind {
                    kind: other.to_string(),
                }
                .into())
            }
        })
    }
}

impl VmDevice {
    /// Builds the params map for `vm.device.create` / `vm.device.update`.
    #[must_use]
    pub fn to_params(&self, vm_id: i64) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert(String::from("vm"), json!(vm_id));
        params.insert(String::from("dtype"), json!(self.payload.kind()));
        params.insert(String::from("attributes"), self.payload.to_attributes());
        if let Some(order) = self.order {
            params.insert(String::from("order"), json!(order));
        }
        params
    }

    /// Decodes a device from a remote response entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is missing required fields or the kind
    /// discriminator is unknown.
    pub fn from_response(entry: &Value) -> Result<Self> {
        let id = entry
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| MappingError::missing("vm.device", "id"))?;
        let kind = entry
            .get("dtype")
            .and_then(Value::as_str)
            .ok_or_else(|| MappingError::missing("vm.device", "dtype"))?;
        let attributes = entry.get("attributes").cloned().unwrap_or(Value::Null);

        Ok(Self {
            id: Some(id),
            order: entry.get("order").and_then(Value::as_i64),
            payload: DevicePayload::from_attributes(kind, attributes)?,
        })
    }

    /// Short human-readable description used in error context.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.id {
            Some(id) => format!("{} #{id}", self.payload.kind()),
            None => format!("{} (new)", self.payload.kind()),
        }
    }
}

impl Reconcilable for VmDevice {
    type Id = i64;

    fn identity(&self) -> Option<i64> {
        self.id
    }

    fn differs_from(&self, current: &Self) -> bool {
        self.payload != current.payload
            || (self.order.is_some() && self.order != current.order)
    }
}
