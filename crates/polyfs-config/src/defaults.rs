use crate::types::{normalize_virtual_path, HumanDuration, PolyfsConfig};

/// TTL of the cached policy list.
pub const DEFAULT_POLICY_TTL_SECS: u64 = 300;

/// Entry bound of the in-process cache.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1024;

/// Ancestor hop limit when rebuilding virtual paths.
pub const DEFAULT_MAX_TREE_DEPTH: usize = 100;

/// Timeout for outbound OAuth and Graph requests.
pub const DEFAULT_OAUTH_TIMEOUT_SECS: u64 = 30;

impl PolyfsConfig {
    /// Apply default inference rules to the configuration.
    /// This mutates the config in place.
    pub fn apply_defaults(&mut self) {
        if self.cache.policy_ttl.is_none() {
            self.cache.policy_ttl = Some(HumanDuration::from_secs(DEFAULT_POLICY_TTL_SECS));
        }
        if self.cache.max_entries.is_none() {
            self.cache.max_entries = Some(DEFAULT_CACHE_MAX_ENTRIES);
        }
        if self.tree.max_depth.is_none() {
            self.tree.max_depth = Some(DEFAULT_MAX_TREE_DEPTH);
        }
        if self.oauth.timeout.is_none() {
            self.oauth.timeout = Some(HumanDuration::from_secs(DEFAULT_OAUTH_TIMEOUT_SECS));
        }

        if let Some(site_url) = self.site_url.as_mut() {
            let trimmed = site_url.trim_end_matches('/').len();
            site_url.truncate(trimmed);
        }

        for policy in &mut self.policies {
            policy.virtual_path = normalize_virtual_path(&policy.virtual_path);
        }
    }

    /// Returns a new config with all defaults applied.
    pub fn effective(&self) -> PolyfsConfig {
        let mut config = self.clone();
        config.apply_defaults();
        config
    }

    /// Policy list TTL, falling back to the default when unset.
    pub fn policy_ttl(&self) -> std::time::Duration {
        self.cache
            .policy_ttl
            .map(|d| d.as_duration())
            .unwrap_or(std::time::Duration::from_secs(DEFAULT_POLICY_TTL_SECS))
    }

    /// Ancestor hop limit, falling back to the default when unset.
    pub fn max_tree_depth(&self) -> usize {
        self.tree.max_depth.unwrap_or(DEFAULT_MAX_TREE_DEPTH)
    }

    /// OAuth request timeout, falling back to the default when unset.
    pub fn oauth_timeout(&self) -> std::time::Duration {
        self.oauth
            .timeout
            .map(|d| d.as_duration())
            .unwrap_or(std::time::Duration::from_secs(DEFAULT_OAUTH_TIMEOUT_SECS))
    }
}
