//! VM lifecycle states and the transition sequencer.
//!
//! The sequencer translates a lifecycle-state change request into zero or
//! more ordered remote calls. Starting is fire-and-forget; stopping uses
//! the blocking transport variant because subsequent steps (device
//! reconfiguration, deletion) require a fully quiesced VM.

use std::fmt;
use std::str::FromStr;

use serde_json::json;
use tracing::debug;

use crate::api::ApiClient;
use crate::error::{MappingError, ProvisionError, ReconcileError, Result};

/// Lifecycle state of a virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmLifecycle {
    /// The VM is running.
    Running,
    /// The VM is shut down.
    Stopped,
    /// The VM exited abnormally. Counts as inactive; a crashed VM with a
    /// stopped target needs no transition.
    Crashed,
}

impl VmLifecycle {
    /// Returns true if the state is an active one.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if `self` already satisfies the `desired` state.
    ///
    /// Crashed satisfies a stopped target: the appliance considers a
    /// crashed VM stopped enough.
    #[must_use]
    pub const fn satisfies(self, desired: Self) -> bool {
        match desired {
            Self::Running => self.is_active(),
            Self::Stopped | Self::Crashed => !self.is_active(),
        }
    }
}

impl FromStr for VmLifecycle {
    type Err = MappingError;

    fn from_str(s: &str) -> std::result::Result<Self, MappingError> {
        if s.eq_ignore_ascii_case("running") {
            Ok(Self::Running)
        } else if s.eq_ignore_ascii_case("stopped") {
            Ok(Self::Stopped)
        } else if s.eq_ignore_ascii_case("crashed") {
            Ok(Self::Crashed)
        } else {
            Err(MappingError::UnknownLifecycleState {
                state: s.to_string(),
            })
        }
    }
}

impl fmt::Display for VmLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Crashed => "CRASHED",
        };
        write!(f, "{s}")
    }
}

/// Sequencer for VM lifecycle transitions.
#[derive(Debug)]
pub struct LifecycleSequencer<'a, C: ApiClient> {
    /// Remote API client.
    client: &'a C,
}

impl<'a, C: ApiClient> LifecycleSequencer<'a, C> {
    /// Creates a new sequencer.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Drives the VM from `current` toward `desired`, issuing the required
    /// remote calls in order.
    ///
    /// # Errors
    ///
    /// Stop/start failures propagate immediately; callers must not proceed
    /// with steps that depend on the transition.
    pub async fn ensure(&self, vm_id: i64, current: VmLifecycle, desired: VmLifecycle) -> Result<()> {
        if current.satisfies(desired) {
            debug!("vm {vm_id} already {current}, no transition needed");
            return Ok(());
        }

        let transition = |e: ProvisionError| {
            ProvisionError::Reconcile(ReconcileError::TransitionFailed {
                vm_id,
                from: current.to_string(),
                to: desired.to_string(),
                reason: e.to_string(),
            })
        };

        if desired.is_active() {
            debug!("Starting vm {vm_id}");
            self.client
                .call("vm.start", json!([vm_id]))
                .await
                .map_err(transition)?;
        } else {
            debug!("Stopping vm {vm_id} (blocking)");
            self.client
                .call_and_wait("vm.stop", json!([vm_id]))
                .await
                .map_err(transition)?;
        }

        Ok(())
    }

    /// Quiesces the VM if it is active. Used before device reconfiguration
    /// and before delete; a VM already inactive issues no call.
    ///
    /// # Errors
    ///
    /// Returns an error if the stop call fails.
    pub async fn ensure_stopped(&self, vm_id: i64, current: VmLifecycle) -> Result<()> {
        self.ensure(vm_id, current, VmLifecycle::Stopped).await
    }
}
