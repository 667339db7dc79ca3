use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::DocError;
use crate::folder::AclError;
use crate::types::ReconciliationOutcome;

/// Configuration-specific errors
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for field {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Transport failure during {operation}: {cause}")]
    #[diagnostic(
        code(chipin_core::transport_failure),
        help("The backing service was unreachable or errored; the operation is safe to retry")
    )]
    TransportFailure { operation: String, cause: String },

    #[error("Not authenticated with {service}")]
    #[diagnostic(
        code(chipin_core::not_authenticated),
        help("Sign in before invoking folder operations; the engine never initiates auth itself")
    )]
    NotAuthenticated { service: String },

    #[error("No user found for email {email}")]
    #[diagnostic(
        code(chipin_core::user_not_found),
        help("A user must have signed in at least once before they can be added to a group")
    )]
    UserNotFound { email: String },

    #[error("Shared folder provisioning failed for group '{group_name}': {cause}")]
    #[diagnostic(
        code(chipin_core::resource_provisioning_failed),
        help("Nothing was written to the document store; retry the whole creation")
    )]
    ResourceProvisioningFailed { group_name: String, cause: String },

    #[error("Group document write failed for '{group_name}': {cause}")]
    #[diagnostic(
        code(chipin_core::group_persist_failed),
        help("The provisioned folder has been deleted again; retry the whole creation")
    )]
    GroupPersistFailed { group_name: String, cause: String },

    #[error("Group not found: {identifier}")]
    #[diagnostic(
        code(chipin_core::group_not_found),
        help("No group exists with identifier: {identifier}")
    )]
    GroupNotFound { identifier: String },

    #[error("Permission denied: {user} may not {operation}")]
    #[diagnostic(
        code(chipin_core::permission_denied),
        help("Structural group operations are restricted to the group's creator")
    )]
    PermissionDenied { user: String, operation: String },

    #[error("Reconciliation of {operation} partially completed: {outcome}")]
    #[diagnostic(
        code(chipin_core::partial_reconciliation),
        help(
            "Some steps committed before a failure; every step is idempotent, so retrying the same call converges"
        )
    )]
    PartialReconciliation {
        operation: String,
        outcome: ReconciliationOutcome,
    },

    #[error("Configuration error for field '{field}'")]
    #[diagnostic(
        code(chipin_core::configuration_error),
        help("Check configuration file at {config_path}\nExpected: {expected}")
    )]
    ConfigurationError {
        config_path: String,
        field: String,
        expected: String,
        #[source]
        cause: ConfigError,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;

// Helper functions for creating common errors with context
impl CoreError {
    pub fn transport(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::TransportFailure {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    pub fn user_not_found(email: impl Into<String>) -> Self {
        Self::UserNotFound {
            email: email.into(),
        }
    }

    pub fn group_not_found(identifier: impl std::fmt::Display) -> Self {
        Self::GroupNotFound {
            identifier: identifier.to_string(),
        }
    }

    pub fn permission_denied(
        user: impl std::fmt::Display,
        operation: impl Into<String>,
    ) -> Self {
        Self::PermissionDenied {
            user: user.to_string(),
            operation: operation.into(),
        }
    }

    pub fn partial(operation: impl Into<String>, outcome: ReconciliationOutcome) -> Self {
        Self::PartialReconciliation {
            operation: operation.into(),
            outcome,
        }
    }

    /// Map a document-store error into engine terms, attaching the failed
    /// operation for context. `NotFound` keeps its identity so callers can
    /// distinguish a missing group from an unreachable backend.
    pub fn from_doc(operation: impl Into<String>, err: DocError) -> Self {
        match err {
            DocError::NotFound(identifier) => Self::GroupNotFound { identifier },
            DocError::Transport(cause) => Self::TransportFailure {
                operation: operation.into(),
                cause,
            },
        }
    }

    /// Map a folder-service error into engine terms. `AlreadyGranted` and
    /// `GranteeNotFound` never reach this point: the ACL client normalizes
    /// them to success per the idempotence contract.
    pub fn from_acl(operation: impl Into<String>, err: AclError) -> Self {
        match err {
            AclError::NotAuthenticated => Self::NotAuthenticated {
                service: "folder service".to_string(),
            },
            other => Self::TransportFailure {
                operation: operation.into(),
                cause: other.to_string(),
            },
        }
    }

    /// If this is a partial reconciliation, borrow its outcome.
    pub fn outcome(&self) -> Option<&ReconciliationOutcome> {
        match self {
            CoreError::PartialReconciliation { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}
