use polyfs_config::PolicyType;

/// Errors raised by backend strategies and the OAuth handler.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StrategyError {
    /// No strategy is registered for the policy type.
    #[error("No strategy registered for policy type '{0}'")]
    UnsupportedPolicyType(PolicyType),

    /// A policy setting failed validation.
    #[error("Invalid setting '{key}': {reason}")]
    Validation { key: String, reason: String },

    /// The OAuth flow could not proceed or the provider rejected it.
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Transport failure talking to an authorization server.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Cleanup before policy deletion failed.
    #[error("Cleanup for policy {policy_id} failed: {reason}")]
    Cleanup { policy_id: u64, reason: String },
}

impl StrategyError {
    pub(crate) fn validation(key: &str, reason: impl Into<String>) -> Self {
        StrategyError::Validation {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StrategyError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
