mod defaults;
mod env;
pub mod types;
mod validation;

use std::path::Path;

pub use defaults::{
    DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_MAX_TREE_DEPTH, DEFAULT_OAUTH_TIMEOUT_SECS,
    DEFAULT_POLICY_TTL_SECS,
};
pub use types::*;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing environment variables: {0:?}")]
    MissingEnvVars(Vec<String>),

    #[error("Duplicate policy id: {0}")]
    DuplicatePolicyId(u64),

    #[error("Two policies claim virtual path '{0}'")]
    DuplicateVirtualPath(String),

    #[error("Invalid virtual path '{0}': {1}")]
    InvalidVirtualPath(String, String),

    #[error("No policy is mounted at '/'. Add a root policy so every path resolves.")]
    MissingRootPolicy,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PolyfsConfig {
    /// Parse a configuration from a YAML string.
    /// Environment variables in the format `${VAR_NAME}` will be interpolated.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let interpolated = env::interpolate_env(yaml)?;
        let config: PolyfsConfig = serde_yaml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Load a configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
