use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use polyfs_config::{Policy, PolicyType, Settings};
use polyfs_core::{ProviderError, ReadStream, StorageProvider};
use sha2::Sha256;
use tokio::fs;
use tracing::{debug, instrument};

use crate::error::StrategyError;
use crate::strategy::PolicyTypeStrategy;

type HmacSha256 = Hmac<Sha256>;

/// Local disk policies carry no settings to check.
pub struct LocalStrategy;

#[async_trait]
impl PolicyTypeStrategy for LocalStrategy {
    fn policy_type(&self) -> PolicyType {
        PolicyType::Local
    }

    fn validate_settings(&self, _settings: &mut Settings) -> Result<(), StrategyError> {
        Ok(())
    }
}

/// Opens entity sources on the local filesystem.
///
/// Relative sources are joined to the policy's `base_path`; when a base
/// path is set, absolute sources must also live under it.
pub struct LocalProvider {
    signing_secret: Option<String>,
}

impl LocalProvider {
    pub fn new(signing_secret: Option<String>) -> Self {
        LocalProvider {
            signing_secret: signing_secret.filter(|s| !s.is_empty()),
        }
    }

    /// Resolve a source locator to a disk path, rejecting traversal.
    pub fn resolve_source(policy: &Policy, source: &str) -> Result<PathBuf, ProviderError> {
        let rel = Path::new(source);
        if rel
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(ProviderError::PathTraversal(source.to_string()));
        }

        let root = Path::new(&policy.base_path);
        let full = if rel.is_absolute() {
            rel.to_path_buf()
        } else {
            root.join(rel)
        };

        if !policy.base_path.is_empty() && !full.starts_with(root) {
            return Err(ProviderError::PathTraversal(source.to_string()));
        }
        Ok(full)
    }

    /// Signature authorizing access to `source` until `ttl` from now.
    pub fn sign(&self, source: &str, ttl: Duration) -> Result<String, ProviderError> {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = Utc::now().timestamp().saturating_add(ttl);
        self.sign_until(source, expires)
    }

    /// Signature of the form `<expires>:<hex hmac>`, valid until the unix
    /// timestamp `expires`.
    pub fn sign_until(&self, source: &str, expires: i64) -> Result<String, ProviderError> {
        let mac = self.mac(source, expires)?;
        Ok(format!("{}:{}", expires, hex::encode(mac.finalize().into_bytes())))
    }

    /// Check a signature produced by [`LocalProvider::sign`].
    pub fn verify(&self, source: &str, signature: &str) -> Result<(), ProviderError> {
        let denied = || ProviderError::PermissionDenied(format!("invalid signature for {}", source));

        let (expires, digest) = signature.split_once(':').ok_or_else(denied)?;
        let expires: i64 = expires.parse().map_err(|_| denied())?;
        let digest = hex::decode(digest).map_err(|_| denied())?;

        self.mac(source, expires)?
            .verify_slice(&digest)
            .map_err(|_| denied())?;

        if Utc::now().timestamp() > expires {
            return Err(ProviderError::PermissionDenied(format!(
                "signature for {} expired",
                source
            )));
        }
        Ok(())
    }

    fn mac(&self, source: &str, expires: i64) -> Result<HmacSha256, ProviderError> {
        let secret = self
            .signing_secret
            .as_deref()
            .ok_or_else(|| ProviderError::Misconfigured {
                policy: "local".to_string(),
                reason: "no signing secret configured".to_string(),
            })?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| ProviderError::Other(e.to_string()))?;
        mac.update(source.as_bytes());
        mac.update(b":");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    #[instrument(skip(self, policy), fields(backend = "local", policy_id = policy.id, source = %source))]
    async fn get(&self, policy: &Policy, source: &str) -> Result<ReadStream, ProviderError> {
        let full_path = Self::resolve_source(policy, source)?;
        debug!(full_path = ?full_path, "opening local file");

        let not_found = |e: std::io::Error| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProviderError::NotFound(source.to_string())
            } else {
                ProviderError::Io(e)
            }
        };

        let metadata = fs::metadata(&full_path).await.map_err(not_found)?;
        if metadata.is_dir() {
            return Err(ProviderError::Other(format!("{} is a directory", source)));
        }
        let file = fs::File::open(&full_path).await.map_err(not_found)?;
        Ok(Box::new(file))
    }
}
