//! Engine configuration.
//!
//! Settings are deliberately few: how shared folders are named, which role
//! members receive, and how deep the change-feed buffer runs. Everything
//! else the engine derives from its collaborators.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, CoreError, Result};
use crate::folder::FolderRole;

pub const DEFAULT_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix for shared folder names; a group named "Ski trip" gets a
    /// folder named "{folder_prefix} - Ski trip"
    pub folder_prefix: String,
    /// ACL role granted to group members on the shared folder
    pub member_role: FolderRole,
    /// Ring-buffer depth of each change feed; a consumer that falls further
    /// behind than this skips to newer snapshots
    pub feed_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            folder_prefix: "Chipin".to_string(),
            member_role: FolderRole::Writer,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Deterministic folder name for a group.
    pub fn folder_name(&self, group_name: &str) -> String {
        format!("{} - {}", self.folder_prefix, group_name)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "<file>".to_string(),
            expected: "readable TOML file".to_string(),
            cause: ConfigError::Io(e.to_string()),
        })?;

        let config: EngineConfig =
            toml::from_str(&content).map_err(|e| CoreError::ConfigurationError {
                config_path: path.display().to_string(),
                field: "<file>".to_string(),
                expected: "valid engine configuration".to_string(),
                cause: ConfigError::TomlParse(e.to_string()),
            })?;

        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.feed_capacity == 0 {
            return Err(CoreError::ConfigurationError {
                config_path: path.display().to_string(),
                field: "feed_capacity".to_string(),
                expected: "a positive buffer depth".to_string(),
                cause: ConfigError::InvalidValue {
                    field: "feed_capacity".to_string(),
                    reason: "must be at least 1".to_string(),
                },
            });
        }
        Ok(())
    }
}
