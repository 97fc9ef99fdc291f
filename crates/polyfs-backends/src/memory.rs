use std::collections::HashMap;
use std::io::Cursor;
use std::sync::RwLock;

use async_trait::async_trait;
use polyfs_config::Policy;
use polyfs_core::{ProviderError, ReadStream, StorageProvider};

/// Storage provider holding object bytes in memory, keyed by
/// `(policy id, source)`.
#[derive(Default)]
pub struct MemoryProvider {
    objects: RwLock<HashMap<(u64, String), Vec<u8>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, policy_id: u64, source: &str, content: impl Into<Vec<u8>>) {
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        objects.insert((policy_id, source.to_string()), content.into());
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    async fn get(&self, policy: &Policy, source: &str) -> Result<ReadStream, ProviderError> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        let content = objects
            .get(&(policy.id, source.to_string()))
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(source.to_string()))?;
        Ok(Box::new(Cursor::new(content)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyfs_config::PolicyType;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_objects_scoped_by_policy() {
        let provider = MemoryProvider::new();
        provider.insert(1, "a.txt", "one");
        provider.insert(2, "a.txt", "two");
        assert_eq!(provider.len(), 2);

        let policy = Policy::new(2, "b", PolicyType::OneDrive, "/b");
        let mut stream = provider.get(&policy, "a.txt").await.unwrap();
        let mut content = String::new();
        stream.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "two");

        let other = Policy::new(3, "c", PolicyType::OneDrive, "/c");
        assert!(matches!(
            provider.get(&other, "a.txt").await,
            Err(ProviderError::NotFound(_))
        ));
    }
}
