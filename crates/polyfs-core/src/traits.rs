use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use polyfs_config::{Policy, PolicyType};
use tokio::io::AsyncRead;

use crate::error::{CacheError, ProviderError, StoreError};
use crate::model::{Entity, File};

/// Byte stream handed back to callers of `get_file_reader`.
pub type ReadStream = Box<dyn AsyncRead + Send + Unpin>;

/// Durable storage of policy records.
#[async_trait]
pub trait PolicyStore: Send + Sync + 'static {
    /// Load every policy.
    async fn list_all(&self) -> Result<Vec<Policy>, StoreError>;
}

/// String key-value cache with per-entry TTL.
#[async_trait]
pub trait KvCache: Send + Sync + 'static {
    /// Fetch a value. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value that expires after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Remove a value. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Lookup of VFS nodes.
#[async_trait]
pub trait FileRepository: Send + Sync + 'static {
    /// Find a live (not soft-deleted) file.
    async fn find_by_id(&self, id: u64) -> Result<Option<File>, StoreError>;

    /// Find a file regardless of soft-deletion.
    async fn find_by_id_unscoped(&self, id: u64) -> Result<Option<File>, StoreError>;
}

/// Lookup of physical entity records.
#[async_trait]
pub trait EntityRepository: Send + Sync + 'static {
    async fn find_by_id(&self, id: u64) -> Result<Option<Entity>, StoreError>;
}

/// Byte-level I/O against one backend type.
#[async_trait]
pub trait StorageProvider: Send + Sync + 'static {
    /// Open the object at `source` using the credentials and options of `policy`.
    async fn get(&self, policy: &Policy, source: &str) -> Result<ReadStream, ProviderError>;
}

/// Immutable map from backend type to its storage provider.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<PolicyType, Arc<dyn StorageProvider>>,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    /// Provider registered for a backend type.
    pub fn get(&self, policy_type: PolicyType) -> Option<Arc<dyn StorageProvider>> {
        self.providers.get(&policy_type).cloned()
    }

    pub fn contains(&self, policy_type: PolicyType) -> bool {
        self.providers.contains_key(&policy_type)
    }
}

/// Collects providers at startup; `build` freezes them.
#[derive(Default)]
pub struct ProviderRegistryBuilder {
    providers: HashMap<PolicyType, Arc<dyn StorageProvider>>,
}

impl ProviderRegistryBuilder {
    /// Register a provider, replacing any earlier one for the same type.
    pub fn register(mut self, policy_type: PolicyType, provider: Arc<dyn StorageProvider>) -> Self {
        self.providers.insert(policy_type, provider);
        self
    }

    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            providers: self.providers,
        }
    }
}
