use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::error::CacheError;
use crate::traits::KvCache;

/// A cached value with its own deadline.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
    /// Access sequence number, higher is more recent.
    last_accessed: u64,
}

impl CacheEntry {
    fn new(value: String, ttl: Duration, tick: u64) -> Self {
        CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
            last_accessed: tick,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Configuration for the in-process cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of live entries before the least recently used is evicted.
    pub max_entries: usize,
    /// Whether to enable the cache.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_entries: polyfs_config::DEFAULT_CACHE_MAX_ENTRIES,
            enabled: true,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct CacheState {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
    tick: u64,
}

impl CacheState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// In-process TTL cache implementing [`KvCache`].
///
/// Deployments sharing policies across processes plug in their own
/// `KvCache` (Redis and the like); this one serves single-node setups and tests.
pub struct MemoryCache {
    config: CacheConfig,
    state: RwLock<CacheState>,
}

impl MemoryCache {
    pub fn new(config: CacheConfig) -> Self {
        MemoryCache {
            config,
            state: RwLock::new(CacheState {
                entries: HashMap::new(),
                stats: CacheStats::default(),
                tick: 0,
            }),
        }
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.state.read().await.stats.clone()
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn prune_expired(&self) -> usize {
        let mut state = self.state.write().await;
        let now = Instant::now();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - state.entries.len();
        state.stats.expirations += removed as u64;
        state.stats.entries = state.entries.len();
        removed
    }

    fn evict_lru(state: &mut CacheState) {
        let oldest = state
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            state.entries.remove(&key);
            state.stats.evictions += 1;
            debug!(key = %key, reason = "count_limit", "evicted cache entry");
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[async_trait]
impl KvCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if !self.config.enabled {
            trace!(key = %key, "cache disabled, skipping lookup");
            return Ok(None);
        }

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let now = Instant::now();
        let tick = state.next_tick();

        let expired = match state.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.last_accessed = tick;
                state.stats.hits += 1;
                trace!(key = %key, "cache hit");
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.entries.remove(key);
            state.stats.expirations += 1;
            state.stats.entries = state.entries.len();
            debug!(key = %key, "cache entry expired");
        }
        state.stats.misses += 1;
        trace!(key = %key, "cache miss");
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        if !self.config.enabled {
            trace!(key = %key, "cache disabled, skipping set");
            return Ok(());
        }

        let mut state = self.state.write().await;
        if !state.entries.contains_key(key) {
            while !state.entries.is_empty() && state.entries.len() >= self.config.max_entries {
                Self::evict_lru(&mut state);
            }
        }

        let tick = state.next_tick();
        state
            .entries
            .insert(key.to_string(), CacheEntry::new(value, ttl, tick));
        state.stats.entries = state.entries.len();
        debug!(key = %key, ttl_secs = ttl.as_secs(), "cached entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut state = self.state.write().await;
        if state.entries.remove(key).is_some() {
            debug!(key = %key, "removed cache entry");
        }
        state.stats.entries = state.entries.len();
        Ok(())
    }
}

/// Thread-safe shared cache.
pub type SharedCache = Arc<MemoryCache>;

/// Create a new shared cache.
pub fn create_cache(config: CacheConfig) -> SharedCache {
    Arc::new(MemoryCache::new(config))
}
