//! Resource orchestrators.
//!
//! One module per resource kind. Each composes the attribute mappers, the
//! diff engine, and (for the VM) the lifecycle sequencer into the
//! Create/Read/Update/Delete/Import operations, issuing remote calls
//! through an [`crate::api::ApiClient`].

pub mod cloudsync;
pub(crate) mod convert;
pub mod cron;
pub mod file;
pub mod group;
pub mod hostpath;
pub mod user;
pub mod vm;
pub mod zvol;

use crate::error::{ProvisionError, ReconcileError, Result};

/// Parses a numeric import identifier.
///
/// Numeric-id resources accept the remote id as a decimal string; path
/// identified resources (datasets, files) take the path verbatim instead.
pub(crate) fn parse_import_id(entity: &str, identifier: &str) -> Result<i64> {
    identifier.trim().parse().map_err(|_| {
        ProvisionError::Reconcile(ReconcileError::InvalidImportId {
            entity: entity.to_string(),
            identifier: identifier.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_id() {
        assert_eq!(parse_import_id("vm", "14").unwrap(), 14);
        assert_eq!(parse_import_id("vm", " 7 ").unwrap(), 7);
        assert!(parse_import_id("vm", "tank/vol1").is_err());
    }
}
