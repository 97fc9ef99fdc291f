use std::sync::Arc;

use async_trait::async_trait;
use polyfs_config::{Policy, PolicyType, Settings};
use reqwest::Url;

use crate::error::StrategyError;

/// Per-backend-type behavior: settings validation, optional OAuth, and the
/// cleanup hook run before a policy is deleted.
#[async_trait]
pub trait PolicyTypeStrategy: Send + Sync + 'static {
    /// Backend type this strategy serves.
    fn policy_type(&self) -> PolicyType;

    /// Check `settings` and fill in defaults. Unknown keys are left alone.
    /// Callers must persist any inserted defaults.
    fn validate_settings(&self, settings: &mut Settings) -> Result<(), StrategyError>;

    /// OAuth handler for backends that authorize through a browser flow.
    fn auth_handler(&self) -> Option<Arc<dyn AuthHandler>> {
        None
    }

    /// Release backend-side resources tied to the policy.
    async fn before_delete(&self, _policy: &Policy) -> Result<(), StrategyError> {
        Ok(())
    }
}

/// OAuth2 authorization-code flow for one backend type.
#[async_trait]
pub trait AuthHandler: Send + Sync + 'static {
    /// URL the administrator visits to grant access. `state` carries the policy id.
    fn generate_auth_url(&self, policy: &Policy, site_url: &str) -> Result<Url, StrategyError>;

    /// Exchange the authorization `code` and store the resulting refresh
    /// token on `policy`. On failure `policy` is left unchanged.
    async fn finalize_auth(
        &self,
        policy: &mut Policy,
        code: &str,
        site_url: &str,
    ) -> Result<(), StrategyError>;

    /// Trade the stored refresh token for a short-lived access token.
    async fn refresh_access_token(&self, policy: &Policy) -> Result<String, StrategyError>;
}
