pub mod auth_url;
pub mod config;
pub mod resolve;
pub mod sign;
pub mod validate;

use std::sync::Arc;

use polyfs_backends::{default_providers, HttpTokenExchanger, StrategyRegistry, TokenExchanger};
use polyfs_config::PolyfsConfig;
use polyfs_core::{
    CacheConfig, MemoryCache, MemoryEntityRepository, MemoryFileRepository, MemoryPolicyStore,
    PolicyResolver, ResolverOptions,
};

pub fn token_exchanger(config: &PolyfsConfig) -> anyhow::Result<Arc<dyn TokenExchanger>> {
    Ok(Arc::new(HttpTokenExchanger::new(config.oauth_timeout())?))
}

pub fn strategies(config: &PolyfsConfig) -> anyhow::Result<StrategyRegistry> {
    Ok(StrategyRegistry::with_defaults(token_exchanger(config)?))
}

/// Resolver over the configured policies. The file tree is empty: the CLI
/// only routes paths.
pub fn resolver(config: &PolyfsConfig) -> anyhow::Result<PolicyResolver> {
    let cache = MemoryCache::new(CacheConfig {
        max_entries: config
            .cache
            .max_entries
            .unwrap_or(polyfs_config::DEFAULT_CACHE_MAX_ENTRIES),
        ..Default::default()
    });
    let providers = default_providers(
        config.local.signing_secret.clone(),
        token_exchanger(config)?,
        config.oauth_timeout(),
    )?;

    Ok(PolicyResolver::new(
        Arc::new(MemoryPolicyStore::new(config.policies.clone())),
        Arc::new(cache),
        Arc::new(MemoryFileRepository::new()),
        Arc::new(MemoryEntityRepository::new()),
        providers,
    )
    .with_options(ResolverOptions::from_config(config)))
}
