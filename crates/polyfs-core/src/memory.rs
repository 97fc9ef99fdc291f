//! In-memory collaborators for single-node setups and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use polyfs_config::Policy;

use crate::error::StoreError;
use crate::model::{Entity, File};
use crate::traits::{EntityRepository, FileRepository, PolicyStore};

/// Policy store backed by a vector.
#[derive(Default)]
pub struct MemoryPolicyStore {
    policies: RwLock<Vec<Policy>>,
    loads: AtomicU64,
}

impl MemoryPolicyStore {
    pub fn new(policies: Vec<Policy>) -> Self {
        MemoryPolicyStore {
            policies: RwLock::new(policies),
            loads: AtomicU64::new(0),
        }
    }

    /// Insert or replace a policy by id.
    pub fn upsert(&self, policy: Policy) {
        let mut policies = self.policies.write().unwrap_or_else(|e| e.into_inner());
        match policies.iter_mut().find(|p| p.id == policy.id) {
            Some(existing) => *existing = policy,
            None => policies.push(policy),
        }
    }

    /// Remove a policy by id, returning it if present.
    pub fn remove(&self, id: u64) -> Option<Policy> {
        let mut policies = self.policies.write().unwrap_or_else(|e| e.into_inner());
        let index = policies.iter().position(|p| p.id == id)?;
        Some(policies.remove(index))
    }

    /// Number of `list_all` calls served so far.
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn list_all(&self) -> Result<Vec<Policy>, StoreError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let policies = self.policies.read().unwrap_or_else(|e| e.into_inner());
        Ok(policies.clone())
    }
}

/// File repository keyed by id. Soft-deleted files are hidden from
/// `find_by_id` but still visible to `find_by_id_unscoped`.
#[derive(Default)]
pub struct MemoryFileRepository {
    files: RwLock<HashMap<u64, File>>,
}

impl MemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file: File) {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.insert(file.id, file);
    }
}

#[async_trait]
impl FileRepository for MemoryFileRepository {
    async fn find_by_id(&self, id: u64) -> Result<Option<File>, StoreError> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        Ok(files.get(&id).filter(|f| !f.is_deleted()).cloned())
    }

    async fn find_by_id_unscoped(&self, id: u64) -> Result<Option<File>, StoreError> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        Ok(files.get(&id).cloned())
    }
}

/// Entity repository keyed by id.
#[derive(Default)]
pub struct MemoryEntityRepository {
    entities: RwLock<HashMap<u64, Entity>>,
}

impl MemoryEntityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entity: Entity) {
        let mut entities = self.entities.write().unwrap_or_else(|e| e.into_inner());
        entities.insert(entity.id, entity);
    }
}

#[async_trait]
impl EntityRepository for MemoryEntityRepository {
    async fn find_by_id(&self, id: u64) -> Result<Option<Entity>, StoreError> {
        let entities = self.entities.read().unwrap_or_else(|e| e.into_inner());
        Ok(entities.get(&id).cloned())
    }
}
