use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Kind of a VFS node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    #[default]
    File,
    Directory,
}

/// A node in the virtual file tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub id: u64,
    /// None for the root directory.
    pub parent_id: Option<u64>,
    pub owner_id: u64,
    pub name: String,
    pub file_type: FileType,
    /// Physical entity holding the current content. None for directories.
    pub primary_entity_id: Option<u64>,
    /// Soft-delete marker.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl File {
    /// Create a regular file node.
    pub fn file(id: u64, parent_id: Option<u64>, name: &str, entity_id: Option<u64>) -> Self {
        File {
            id,
            parent_id,
            owner_id: 0,
            name: name.to_string(),
            file_type: FileType::File,
            primary_entity_id: entity_id,
            deleted_at: None,
        }
    }

    /// Create a directory node.
    pub fn dir(id: u64, parent_id: Option<u64>, name: &str) -> Self {
        File {
            id,
            parent_id,
            owner_id: 0,
            name: name.to_string(),
            file_type: FileType::Directory,
            primary_entity_id: None,
            deleted_at: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Physical object record. `source` is opaque to the core and only
/// meaningful to the provider of the owning policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: u64,
    pub source: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: IndexMap<String, String>,
}

impl Entity {
    pub fn new(id: u64, source: &str, size: u64) -> Self {
        Entity {
            id,
            source: source.to_string(),
            size,
            created_at: Utc::now(),
            metadata: IndexMap::new(),
        }
    }
}
