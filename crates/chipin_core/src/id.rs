//! Type-safe ID generation and management
//!
//! This module provides a generic, type-safe ID system with consistent
//! prefixes and UUID-based uniqueness guarantees. Document-store and
//! folder-service assigned identifiers are wrapped the same way so they
//! cannot be confused at call sites.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Trait for types that can be used as ID markers
pub trait IdType: Send + Sync + 'static {
    /// The record prefix for this ID type (e.g. "group" for groups)
    const PREFIX: &'static str;

    /// Convert to a string key for record lookup
    fn to_key(&self) -> String;

    /// Convert from a string key
    fn from_key(key: &str) -> Result<Self, IdError>
    where
        Self: Sized;
}

/// Errors that can occur when working with IDs
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum IdError {
    #[error("Invalid ID format: expected prefix '{expected}', got '{actual}'")]
    #[diagnostic(help("Ensure the ID starts with the correct prefix followed by an underscore"))]
    InvalidPrefix { expected: String, actual: String },

    #[error("Invalid UUID: {0}")]
    #[diagnostic(help("The UUID portion of the ID must be a valid UUID v4 format"))]
    InvalidUuid(#[from] uuid::Error),

    #[error("Invalid ID format: {0}")]
    #[diagnostic(help(
        "IDs must be in the format 'prefix_uuid' where prefix matches the expected type"
    ))]
    InvalidFormat(String),
}

/// Macro to define new ID types with minimal boilerplate
#[macro_export]
macro_rules! define_id_type {
    ($type_name:ident, $table:expr) => {
        #[derive(
            Debug,
            PartialEq,
            Eq,
            Hash,
            Clone,
            ::serde::Serialize,
            ::serde::Deserialize,
            ::schemars::JsonSchema,
        )]
        pub struct $type_name(pub String);

        impl $crate::id::IdType for $type_name {
            const PREFIX: &'static str = $table;

            fn to_key(&self) -> String {
                self.0.clone()
            }

            fn from_key(key: &str) -> Result<Self, $crate::id::IdError> {
                Ok($type_name(key.to_string()))
            }
        }

        impl std::fmt::Display for $type_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(
                    f,
                    "{}:{}",
                    <$type_name as $crate::id::IdType>::PREFIX,
                    self.0,
                )
            }
        }

        impl $type_name {
            pub fn new(id: impl Into<String>) -> Self {
                $type_name(id.into())
            }

            pub fn generate() -> Self {
                $type_name(::uuid::Uuid::new_v4().simple().to_string())
            }

            pub fn nil() -> Self {
                $type_name(::uuid::Uuid::nil().simple().to_string())
            }

            pub fn from_uuid(uuid: ::uuid::Uuid) -> Self {
                $type_name(uuid.simple().to_string())
            }

            pub fn is_nil(&self) -> bool {
                self.0 == ::uuid::Uuid::nil().simple().to_string()
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::std::str::FromStr for $type_name {
            type Err = $crate::id::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok($type_name(s.to_string()))
            }
        }
    };
}

define_id_type!(GroupId, "group");
define_id_type!(UserId, "user");

/// FolderId is assigned by the external folder service and is opaque to us,
/// so unlike the document-store IDs it accepts any string without a UUID
/// shape.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize, JsonSchema)]
#[repr(transparent)]
pub struct FolderId(pub String);

impl FolderId {
    /// Create a new FolderId from any string
    pub fn new(id: impl Into<String>) -> Self {
        FolderId(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for FolderId {
    fn from(s: String) -> Self {
        FolderId(s)
    }
}

impl From<&str> for FolderId {
    fn from(s: &str) -> Self {
        FolderId(s.to_string())
    }
}

impl AsRef<str> for FolderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for FolderId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FolderId(s.to_string()))
    }
}

impl IdType for FolderId {
    const PREFIX: &'static str = "folder";

    fn to_key(&self) -> String {
        self.0.clone()
    }

    fn from_key(key: &str) -> Result<Self, IdError> {
        Ok(FolderId(key.to_string()))
    }
}

/// FileId is likewise assigned by the external folder service.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize, JsonSchema)]
#[repr(transparent)]
pub struct FileId(pub String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        FileId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for FileId {
    fn from(s: String) -> Self {
        FileId(s)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        FileId(s.to_string())
    }
}

impl FromStr for FileId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FileId(s.to_string()))
    }
}

impl IdType for FileId {
    const PREFIX: &'static str = "file";

    fn to_key(&self) -> String {
        self.0.clone()
    }

    fn from_key(key: &str) -> Result<Self, IdError> {
        Ok(FileId(key.to_string()))
    }
}
