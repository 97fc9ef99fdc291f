use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use polyfs_config::{Policy, PolicyType};
use polyfs_core::ProviderRegistry;
use tracing::{debug, info, warn};

use crate::auth::{OneDriveAuthHandler, TokenExchanger};
use crate::cos::CosStrategy;
use crate::error::StrategyError;
use crate::local::{LocalProvider, LocalStrategy};
use crate::onedrive::{OneDriveProvider, OneDriveStrategy};
use crate::oss::OssStrategy;
use crate::qiniu::QiniuStrategy;
use crate::s3::S3Strategy;
use crate::strategy::{AuthHandler, PolicyTypeStrategy};

/// Immutable map from backend type to its strategy. Built once at startup
/// and cloned cheaply into every consumer.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: Arc<HashMap<PolicyType, Arc<dyn PolicyTypeStrategy>>>,
}

impl StrategyRegistry {
    pub fn builder() -> StrategyRegistryBuilder {
        StrategyRegistryBuilder::default()
    }

    /// Registry with a strategy for every supported backend type.
    pub fn with_defaults(exchanger: Arc<dyn TokenExchanger>) -> Self {
        Self::builder()
            .register(Arc::new(LocalStrategy))
            .register(Arc::new(OneDriveStrategy::new(exchanger)))
            .register(Arc::new(S3Strategy))
            .register(Arc::new(CosStrategy))
            .register(Arc::new(OssStrategy))
            .register(Arc::new(QiniuStrategy))
            .build()
    }

    pub fn get(&self, policy_type: PolicyType) -> Result<Arc<dyn PolicyTypeStrategy>, StrategyError> {
        self.strategies
            .get(&policy_type)
            .cloned()
            .ok_or(StrategyError::UnsupportedPolicyType(policy_type))
    }

    /// Registered types in declaration order.
    pub fn policy_types(&self) -> Vec<PolicyType> {
        PolicyType::ALL
            .iter()
            .copied()
            .filter(|t| self.strategies.contains_key(t))
            .collect()
    }

    /// OAuth handler for a type, `None` when the backend needs no browser flow.
    pub fn auth_handler(
        &self,
        policy_type: PolicyType,
    ) -> Result<Option<Arc<dyn AuthHandler>>, StrategyError> {
        Ok(self.get(policy_type)?.auth_handler())
    }

    /// Validate a policy's settings with its type's strategy, writing any
    /// injected defaults back into `policy.settings`.
    pub fn validate_policy(&self, policy: &mut Policy) -> Result<(), StrategyError> {
        let strategy = self.get(policy.policy_type)?;
        strategy.validate_settings(&mut policy.settings)?;
        debug!(policy_id = policy.id, policy_type = %policy.policy_type, "policy settings valid");
        Ok(())
    }

    /// Run the cleanup hook ahead of deleting `policy`. Failures are logged
    /// and never block the deletion.
    pub async fn before_delete(&self, policy: &Policy) {
        let strategy = match self.get(policy.policy_type) {
            Ok(strategy) => strategy,
            Err(e) => {
                warn!(policy_id = policy.id, error = %e, "skipping cleanup before delete");
                return;
            }
        };
        match strategy.before_delete(policy).await {
            Ok(()) => debug!(policy_id = policy.id, "cleanup before delete finished"),
            Err(e) => warn!(
                policy_id = policy.id,
                policy_type = %policy.policy_type,
                error = %e,
                "cleanup before delete failed, continuing"
            ),
        }
    }
}

/// Collects strategies at startup; `build` freezes them.
#[derive(Default)]
pub struct StrategyRegistryBuilder {
    strategies: HashMap<PolicyType, Arc<dyn PolicyTypeStrategy>>,
}

impl StrategyRegistryBuilder {
    /// Register a strategy under its own type. A later registration for the
    /// same type replaces the earlier one.
    pub fn register(mut self, strategy: Arc<dyn PolicyTypeStrategy>) -> Self {
        let policy_type = strategy.policy_type();
        if self.strategies.insert(policy_type, strategy).is_some() {
            warn!(policy_type = %policy_type, "replacing registered strategy");
        }
        self
    }

    pub fn build(self) -> StrategyRegistry {
        info!(count = self.strategies.len(), "strategy registry built");
        StrategyRegistry {
            strategies: Arc::new(self.strategies),
        }
    }
}

/// Provider registry for every backend this build can read from.
///
/// OneDrive reads refresh their access token through `exchanger`; the
/// object storage types are only served when the `s3` feature is enabled.
pub fn default_providers(
    signing_secret: Option<String>,
    exchanger: Arc<dyn TokenExchanger>,
    http_timeout: Duration,
) -> Result<ProviderRegistry, StrategyError> {
    let auth: Arc<dyn AuthHandler> = Arc::new(OneDriveAuthHandler::new(exchanger));
    let builder = ProviderRegistry::builder()
        .register(PolicyType::Local, Arc::new(LocalProvider::new(signing_secret)))
        .register(
            PolicyType::OneDrive,
            Arc::new(OneDriveProvider::new(auth, http_timeout)?),
        );

    #[cfg(feature = "s3")]
    let builder = {
        let provider = Arc::new(crate::s3_provider::S3CompatibleProvider);
        crate::s3_provider::S3CompatibleProvider::TYPES
            .iter()
            .fold(builder, |b, t| b.register(*t, provider.clone()))
    };

    Ok(builder.build())
}
