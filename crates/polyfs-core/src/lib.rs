mod cache;
mod error;
pub mod memory;
mod metrics;
mod model;
mod resolver;
mod router;
mod traits;

pub use cache::{create_cache, CacheConfig, CacheStats, MemoryCache, SharedCache};
pub use error::{CacheError, ProviderError, StoreError, VfsError};
pub use memory::{MemoryEntityRepository, MemoryFileRepository, MemoryPolicyStore};
pub use metrics::{create_metrics, MetricsSnapshot, ResolverMetrics, SharedMetrics};
pub use model::{Entity, File, FileType};
pub use resolver::{PolicyResolver, ResolverOptions, POLICY_CACHE_KEY};
pub use router::{join_segments, longest_prefix_match};
pub use traits::{
    EntityRepository, FileRepository, KvCache, PolicyStore, ProviderRegistry,
    ProviderRegistryBuilder, ReadStream, StorageProvider,
};
