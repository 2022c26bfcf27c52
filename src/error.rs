//! Error types for the TrueNAS provisioning core.
//!
//! This module provides the error hierarchy for all operations in the
//! resource lifecycle: configuration, the remote JSON-RPC API, attribute
//! mapping, and reconciliation.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the provisioning core.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// TrueNAS API errors.
    #[error("TrueNAS API error: {0}")]
    Api(#[from] ApiError),

    /// Attribute mapping errors.
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Errors from the TrueNAS JSON-RPC API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed.
    #[error("TrueNAS authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// The remote method call failed.
    #[error("TrueNAS call {method} failed: [{code}] {message}")]
    Rpc {
        /// Dot-qualified method name that failed.
        method: String,
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the API.
        message: String,
    },

    /// The target entity does not exist on the appliance.
    #[error("{entity} not found: {identity}")]
    NotFound {
        /// Kind of entity (vm, user, dataset, ...).
        entity: String,
        /// Identity that was looked up.
        identity: String,
    },

    /// Network error.
    #[error("Network error communicating with TrueNAS: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// The remote response did not match the expected contract.
    #[error("Invalid response from TrueNAS for {method}: {message}")]
    InvalidResponse {
        /// Method whose response could not be decoded.
        method: String,
        /// Description of the decode failure.
        message: String,
    },

    /// A server-tracked job finished in a failed state.
    #[error("TrueNAS job {job_id} failed: {message}")]
    JobFailed {
        /// Remote job identifier.
        job_id: i64,
        /// Failure message reported by the job.
        message: String,
    },
}

/// Attribute mapping errors (model <-> remote representation).
#[derive(Debug, Error)]
pub enum MappingError {
    /// A field the remote contract requires was absent from the response.
    #[error("Response for {entity} is missing field {field}")]
    MissingField {
        /// Kind of entity being mapped.
        entity: String,
        /// Name of the missing field.
        field: String,
    },

    /// A field had an unexpected JSON shape.
    #[error("Unexpected shape for {entity}.{field}: {message}")]
    UnexpectedShape {
        /// Kind of entity being mapped.
        entity: String,
        /// Name of the offending field.
        field: String,
        /// Description of the mismatch.
        message: String,
    },

    /// The device kind discriminator was not recognized.
    #[error("Unknown device kind: {kind}")]
    UnknownDeviceKind {
        /// The unrecognized discriminator value.
        kind: String,
    },

    /// A lifecycle state string was not recognized.
    #[error("Unknown lifecycle state: {state}")]
    UnknownLifecycleState {
        /// The unrecognized state value.
        state: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A device operation failed partway through a reconciliation.
    #[error("Failed to {operation} device {device} on vm {vm_id}: {reason}")]
    DeviceOperationFailed {
        /// Operation that failed (create, update, delete).
        operation: String,
        /// Description of the device.
        device: String,
        /// Parent VM identity.
        vm_id: i64,
        /// Reason for failure.
        reason: String,
    },

    /// A required lifecycle transition failed.
    #[error("Failed to transition vm {vm_id} from {from} to {to}: {reason}")]
    TransitionFailed {
        /// VM identity.
        vm_id: i64,
        /// State the VM was in.
        from: String,
        /// State the VM was asked to reach.
        to: String,
        /// Reason for failure.
        reason: String,
    },

    /// An import identifier could not be parsed.
    #[error("Invalid import identifier for {entity}: {identifier}")]
    InvalidImportId {
        /// Kind of entity being imported.
        entity: String,
        /// The identifier that failed to parse.
        identifier: String,
    },
}

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;

impl ProvisionError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error means the target entity does not exist.
    ///
    /// Read paths use this to signal "removed" instead of failing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(ApiError::NotFound { .. }))
    }
}

impl ApiError {
    /// Creates an RPC failure for the given method.
    #[must_use]
    pub fn rpc(method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    /// Creates a not-found error for an entity kind and identity.
    #[must_use]
    pub fn not_found(entity: impl Into<String>, identity: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            identity: identity.to_string(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an invalid-response error for the given method.
    #[must_use]
    pub fn invalid_response(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            method: method.into(),
            message: message.into(),
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl MappingError {
    /// Creates a missing-field error.
    #[must_use]
    pub fn missing(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Creates an unexpected-shape error.
    #[must_use]
    pub fn shape(
        entity: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::UnexpectedShape {
            entity: entity.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_probe() {
        let err = ProvisionError::Api(ApiError::not_found("user", 42));
        assert!(err.is_not_found());

        let err = ProvisionError::Api(ApiError::rpc("user.query", -32000, "boom"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_error_display_includes_context() {
        let err = ApiError::rpc("vm.stop", 14, "EBADF");
        assert_eq!(err.to_string(), "TrueNAS call vm.stop failed: [14] EBADF");
    }
}
