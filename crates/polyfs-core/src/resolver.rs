use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use polyfs_config::{normalize_virtual_path, Policy, PolyfsConfig};
use tracing::{debug, instrument, trace, warn};

use crate::error::VfsError;
use crate::metrics::{create_metrics, MetricsSnapshot, ResolverMetrics, SharedMetrics};
use crate::model::File;
use crate::router::{join_segments, longest_prefix_match};
use crate::traits::{
    EntityRepository, FileRepository, KvCache, PolicyStore, ProviderRegistry, ReadStream,
};

/// Cache key holding the JSON-encoded list of every policy.
pub const POLICY_CACHE_KEY: &str = "vfs:policies:all";

/// Tunables for [`PolicyResolver`].
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// How long the cached policy list stays valid.
    pub policy_ttl: Duration,
    /// Maximum ancestor hops when rebuilding a file's virtual path.
    pub max_depth: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        ResolverOptions {
            policy_ttl: Duration::from_secs(polyfs_config::DEFAULT_POLICY_TTL_SECS),
            max_depth: polyfs_config::DEFAULT_MAX_TREE_DEPTH,
        }
    }
}

impl ResolverOptions {
    pub fn from_config(config: &PolyfsConfig) -> Self {
        ResolverOptions {
            policy_ttl: config.policy_ttl(),
            max_depth: config.max_tree_depth(),
        }
    }
}

/// Resolves virtual paths to storage policies and files to byte streams.
///
/// Holds no state of its own beyond metrics: the policy list lives in the
/// injected cache and is reloaded from the store whenever the cache cannot
/// serve it.
pub struct PolicyResolver {
    policies: Arc<dyn PolicyStore>,
    cache: Arc<dyn KvCache>,
    files: Arc<dyn FileRepository>,
    entities: Arc<dyn EntityRepository>,
    providers: ProviderRegistry,
    options: ResolverOptions,
    metrics: SharedMetrics,
}

impl PolicyResolver {
    pub fn new(
        policies: Arc<dyn PolicyStore>,
        cache: Arc<dyn KvCache>,
        files: Arc<dyn FileRepository>,
        entities: Arc<dyn EntityRepository>,
        providers: ProviderRegistry,
    ) -> Self {
        PolicyResolver {
            policies,
            cache,
            files,
            entities,
            providers,
            options: ResolverOptions::default(),
            metrics: create_metrics(),
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Find the policy owning `virtual_path` by longest mount-prefix match.
    #[instrument(skip(self), fields(path = %virtual_path))]
    pub async fn find_policy_for_path(&self, virtual_path: &str) -> Result<Policy, VfsError> {
        ResolverMetrics::incr(&self.metrics.resolutions);
        let normalized = normalize_virtual_path(virtual_path);
        let policies = self.load_policies().await?;

        match longest_prefix_match(&policies, &normalized) {
            Some(policy) => {
                debug!(
                    policy_id = policy.id,
                    policy_type = %policy.policy_type,
                    mount = %policy.virtual_path,
                    "matched policy"
                );
                Ok(policy.clone())
            }
            None => {
                ResolverMetrics::incr(&self.metrics.unmatched);
                Err(VfsError::NotMatched(normalized))
            }
        }
    }

    /// Drop the cached policy list. Policy create/update/delete must call
    /// this so the next lookup reloads from the store.
    pub async fn invalidate_policies(&self) {
        match self.cache.delete(POLICY_CACHE_KEY).await {
            Ok(()) => debug!("invalidated policy cache"),
            Err(e) => {
                ResolverMetrics::incr(&self.metrics.cache_failures);
                warn!(error = %e, "failed to invalidate policy cache, entry expires with its TTL");
            }
        }
    }

    /// Read-through load of the full policy list.
    async fn load_policies(&self) -> Result<Vec<Policy>, VfsError> {
        match self.cache.get(POLICY_CACHE_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Policy>>(&raw) {
                Ok(policies) => {
                    ResolverMetrics::incr(&self.metrics.cache_hits);
                    trace!(count = policies.len(), "policy list served from cache");
                    return Ok(policies);
                }
                Err(e) => {
                    ResolverMetrics::incr(&self.metrics.cache_failures);
                    warn!(error = %e, "discarding undecodable policy cache entry");
                }
            },
            Ok(None) => {
                ResolverMetrics::incr(&self.metrics.cache_misses);
                trace!("policy cache miss");
            }
            Err(e) => {
                ResolverMetrics::incr(&self.metrics.cache_failures);
                warn!(error = %e, "policy cache read failed, loading from store");
            }
        }

        ResolverMetrics::incr(&self.metrics.store_loads);
        let policies = self.policies.list_all().await?;
        debug!(count = policies.len(), "loaded policies from store");

        match serde_json::to_string(&policies) {
            Ok(raw) => {
                if let Err(e) = self
                    .cache
                    .set(POLICY_CACHE_KEY, raw, self.options.policy_ttl)
                    .await
                {
                    ResolverMetrics::incr(&self.metrics.cache_failures);
                    warn!(error = %e, "failed to populate policy cache");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode policy list for cache"),
        }

        Ok(policies)
    }

    /// Rebuild the full virtual path of `file` by walking its ancestors.
    ///
    /// Soft-deleted ancestors are followed. The walk stops with
    /// `StructuralCorruption` on a revisited node or after `max_depth` hops.
    #[instrument(skip(self, file), fields(file_id = file.id))]
    pub async fn resolve_virtual_path(&self, file: &File) -> Result<String, VfsError> {
        let mut segments = vec![file.name.clone()];
        let mut visited = HashSet::from([file.id]);
        let mut parent = file.parent_id;
        let mut hops = 0usize;

        while let Some(parent_id) = parent {
            hops += 1;
            if hops > self.options.max_depth {
                return Err(self.corruption(
                    file.id,
                    format!("ancestor chain exceeds {} levels", self.options.max_depth),
                ));
            }
            if !visited.insert(parent_id) {
                return Err(self.corruption(
                    file.id,
                    format!("ancestor cycle through file {}", parent_id),
                ));
            }

            let node = self
                .files
                .find_by_id_unscoped(parent_id)
                .await?
                .ok_or_else(|| VfsError::NotFound(format!("ancestor file {}", parent_id)))?;
            segments.push(node.name);
            parent = node.parent_id;
        }

        segments.reverse();
        let path = join_segments(&segments);
        trace!(path = %path, hops, "rebuilt virtual path");
        Ok(path)
    }

    /// Policy owning the location `file` is filed under.
    pub async fn find_policy_for_file(&self, file: &File) -> Result<Policy, VfsError> {
        let path = self.resolve_virtual_path(file).await?;
        self.find_policy_for_path(&path).await
    }

    /// Open the content of `file` through the provider of its owning policy.
    #[instrument(skip(self, file), fields(file_id = file.id, name = %file.name))]
    pub async fn get_file_reader(&self, file: &File) -> Result<ReadStream, VfsError> {
        let result = self.open(file).await;
        match &result {
            Ok(_) => ResolverMetrics::incr(&self.metrics.readers_opened),
            Err(e) => {
                ResolverMetrics::incr(&self.metrics.reader_errors);
                debug!(error = %e, "failed to open file");
            }
        }
        result
    }

    /// Look up a live file by id and open it.
    pub async fn get_file_reader_by_id(&self, file_id: u64) -> Result<ReadStream, VfsError> {
        let file = self
            .files
            .find_by_id(file_id)
            .await?
            .ok_or_else(|| VfsError::NotFound(format!("file {}", file_id)))?;
        self.get_file_reader(&file).await
    }

    async fn open(&self, file: &File) -> Result<ReadStream, VfsError> {
        if file.is_dir() {
            return Err(VfsError::IsDirectory(file.id));
        }
        let entity_id = file
            .primary_entity_id
            .ok_or(VfsError::MissingPhysicalSource(file.id))?;

        let policy = self.find_policy_for_file(file).await?;
        let provider = self
            .providers
            .get(policy.policy_type)
            .ok_or(VfsError::UnsupportedBackendType(policy.policy_type))?;

        let entity = self
            .entities
            .find_by_id(entity_id)
            .await?
            .ok_or_else(|| VfsError::NotFound(format!("entity {}", entity_id)))?;
        if entity.source.is_empty() {
            return Err(VfsError::MissingPhysicalSource(file.id));
        }

        debug!(
            policy_id = policy.id,
            entity_id,
            source = %entity.source,
            "opening physical source"
        );
        Ok(provider.get(&policy, &entity.source).await?)
    }

    fn corruption(&self, file_id: u64, reason: String) -> VfsError {
        ResolverMetrics::incr(&self.metrics.corruptions);
        warn!(file_id, reason = %reason, "file tree corruption detected");
        VfsError::StructuralCorruption { file_id, reason }
    }
}
