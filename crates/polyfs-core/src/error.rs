use polyfs_config::PolicyType;

/// Errors raised by a storage provider while opening physical bytes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// Physical object does not exist.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Source locator escapes the policy root.
    #[error("Path traversal attempt detected: {0}")]
    PathTraversal(String),

    /// Backend refused the credentials or the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Connection to a backend failed.
    #[error("Connection to backend '{backend}' failed")]
    ConnectionFailed {
        backend: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("Operation '{operation}' timed out for source: {source_locator}")]
    Timeout {
        operation: String,
        source_locator: String,
    },

    /// Policy lacks something the provider needs (bucket, token, ...).
    #[error("Policy '{policy}' is misconfigured: {reason}")]
    Misconfigured { policy: String, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other backend-specific error.
    #[error("Backend error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Returns true if this error is transient and the operation may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::ConnectionFailed { .. } => true,
            ProviderError::Timeout { .. } => true,
            ProviderError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

/// Errors from the policy store and file/entity repositories.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store query failed: {0}")]
    Query(String),
}

/// Errors from the key-value cache. These never reach callers of the
/// resolver; they are logged and treated as misses.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cached value could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors that can occur while resolving policies and opening files.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum VfsError {
    /// No policy mount is a prefix of the path.
    #[error("No storage policy matches path '{0}'. Configure a policy mounted at '/'.")]
    NotMatched(String),

    /// No strategy or provider is registered for the policy's backend type.
    #[error("Unsupported backend type: {0}")]
    UnsupportedBackendType(PolicyType),

    /// The file tree is cyclic or deeper than the walk allows.
    #[error("File tree is corrupted at file {file_id}: {reason}")]
    StructuralCorruption { file_id: u64, reason: String },

    /// File has no primary entity, or the entity has no source locator.
    #[error("File {0} has no physical source")]
    MissingPhysicalSource(u64),

    /// A file or entity record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Directories have no byte stream.
    #[error("File {0} is a directory")]
    IsDirectory(u64),

    /// Policy store or repository failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Provider-level failure, passed through unchanged.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<polyfs_config::ConfigError> for VfsError {
    fn from(e: polyfs_config::ConfigError) -> Self {
        VfsError::Config(e.to_string())
    }
}
