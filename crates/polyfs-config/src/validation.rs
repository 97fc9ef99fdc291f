use std::collections::HashSet;

use crate::types::{normalize_virtual_path, PolyfsConfig};
use crate::ConfigError;

impl PolyfsConfig {
    /// Validate the configuration and return a list of errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let mut seen_ids = HashSet::new();
        for policy in &self.policies {
            if !seen_ids.insert(policy.id) {
                errors.push(ConfigError::DuplicatePolicyId(policy.id));
            }
        }

        for policy in &self.policies {
            if !policy.virtual_path.starts_with('/') {
                errors.push(ConfigError::InvalidVirtualPath(
                    policy.virtual_path.clone(),
                    "Virtual path must start with '/'".to_string(),
                ));
            }
        }

        // Nested mounts are fine; two policies on the same mount are not.
        let mut seen_paths = HashSet::new();
        for policy in &self.policies {
            let normalized = normalize_virtual_path(&policy.virtual_path);
            if !seen_paths.insert(normalized.clone()) {
                errors.push(ConfigError::DuplicateVirtualPath(normalized));
            }
        }

        if !self.policies.is_empty() && !seen_paths.contains("/") {
            errors.push(ConfigError::MissingRootPolicy);
        }

        if self.tree.max_depth == Some(0) {
            errors.push(ConfigError::InvalidConfig(
                "tree.max_depth must be at least 1".to_string(),
            ));
        }

        let needs_site_url = self.policies.iter().any(|p| p.policy_type.requires_oauth());
        let has_site_url = self
            .site_url
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false);
        if needs_site_url && !has_site_url {
            errors.push(ConfigError::InvalidConfig(
                "site_url is required when an OAuth policy is configured".to_string(),
            ));
        }

        errors
    }

    /// Validate and return Ok(()) if valid, or Err with the first error.
    pub fn validate_or_err(&self) -> Result<(), ConfigError> {
        match self.validate().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
