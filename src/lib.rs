// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Additional strictness - Leave nothing unchecked
#![warn(missing_docs)]                // All public items must be documented
#![warn(unused_imports)]              // Unused imports produce warnings
#![warn(unused_must_use)]             // Must handle Result and Option explicitly

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::redundant_clone)]     // Useless clones warning

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # TrueNAS Provision
//!
//! A declarative, idempotent provisioning engine for TrueNAS appliances.
//!
//! ## Overview
//!
//! The crate models appliance primitives (cron jobs, cloud sync tasks,
//! directories, managed files, ZFS volumes, users, groups, and virtual
//! machines) as declarative resources and reconciles them against a
//! TrueNAS middleware instance over its JSON-RPC API:
//!
//! - Define the desired shape of each resource as a typed model
//! - Predict the post-apply state at plan time, including drift
//! - Diff nested object collections by remote-assigned identity
//! - Sequence VM lifecycle transitions around structural changes
//!
//! ## Architecture
//!
//! The system is built around **desired state reconciliation**:
//!
//! 1. **Planned State**: The resource model as configured
//! 2. **Stored State**: What the last apply recorded
//! 3. **Remote State**: What the appliance reports right now
//!
//! ## Modules
//!
//! - [`attr`]: Tri-state attribute values (set, null, unknown)
//! - [`api`]: JSON-RPC client and long-running job handling
//! - [`plan`]: Device diff engine and plan-time prediction modifiers
//! - [`resources`]: Per-resource CRUD orchestrators
//! - [`config`]: Connection configuration
//! - [`error`]: Error taxonomy

// ============================================================================
// Modules
// ============================================================================

pub mod api;
pub mod attr;
pub mod config;
pub mod error;
pub mod plan;
pub mod resources;

// ============================================================================
// Re-exports
// ============================================================================

pub use api::{ApiClient, Job, JobState, TrueNasClient};
pub use attr::Attr;
pub use config::Config;
pub use error::{ProvisionError, Result};
pub use plan::{DiffEngine, DiffResult, Reconcilable};
pub use resources::cloudsync::{CloudSyncModel, CloudSyncResource};
pub use resources::cron::{CronJobModel, CronJobResource, CronSchedule};
pub use resources::file::{ManagedFileModel, ManagedFileResource};
pub use resources::group::{GroupModel, GroupResource};
pub use resources::hostpath::{HostPathModel, HostPathResource};
pub use resources::user::{UserModel, UserResource};
pub use resources::vm::{
    DevicePayload, LifecycleSequencer, VmDevice, VmLifecycle, VmModel, VmResource,
};
pub use resources::zvol::{ZvolModel, ZvolResource};
