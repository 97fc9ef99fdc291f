use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend-specific policy options. Values keep their JSON type so validators
/// can tell `true` from `"true"`.
pub type Settings = IndexMap<String, serde_json::Value>;

/// Physical backend kind a storage policy points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyType {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "onedrive")]
    OneDrive,
    #[serde(rename = "s3")]
    S3,
    #[serde(rename = "tencent-cos")]
    TencentCos,
    #[serde(rename = "ali-oss")]
    AliOss,
    #[serde(rename = "qiniu")]
    Qiniu,
}

impl PolicyType {
    pub const ALL: [PolicyType; 6] = [
        PolicyType::Local,
        PolicyType::OneDrive,
        PolicyType::S3,
        PolicyType::TencentCos,
        PolicyType::AliOss,
        PolicyType::Qiniu,
    ];

    /// Wire name as persisted in policy records.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyType::Local => "local",
            PolicyType::OneDrive => "onedrive",
            PolicyType::S3 => "s3",
            PolicyType::TencentCos => "tencent-cos",
            PolicyType::AliOss => "ali-oss",
            PolicyType::Qiniu => "qiniu",
        }
    }

    /// Whether the backend needs a three-legged OAuth flow before use.
    pub fn requires_oauth(&self) -> bool {
        matches!(self, PolicyType::OneDrive)
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolicyType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown policy type: {}", s))
    }
}

/// A storage policy: one physical backend mounted at a virtual path.
///
/// The credential slots are generic and reused per backend: object stores
/// keep their key pair in `access_key`/`secret_key`, while OneDrive maps
/// them as documented in `polyfs_backends::onedrive::fields`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    pub virtual_path: String,
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub bucket_name: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub settings: Settings,
    /// Maximum single file size in bytes, 0 for unlimited.
    #[serde(default)]
    pub max_size: u64,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub node_id: Option<u64>,
}

impl Policy {
    /// Create a policy with empty credentials and settings.
    pub fn new(id: u64, name: &str, policy_type: PolicyType, virtual_path: &str) -> Self {
        Policy {
            id,
            name: name.to_string(),
            policy_type,
            virtual_path: virtual_path.to_string(),
            base_path: String::new(),
            server: String::new(),
            bucket_name: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            settings: Settings::new(),
            max_size: 0,
            flag: None,
            node_id: None,
        }
    }

    /// Normalized mount path with a trailing slash, e.g. `/photos/` or `/`.
    pub fn mount_prefix(&self) -> String {
        with_trailing_slash(&normalize_virtual_path(&self.virtual_path))
    }

    /// Look up a string setting.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }

    /// Look up a boolean setting, defaulting to false.
    pub fn setting_bool(&self, key: &str) -> bool {
        self.settings
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("policy_type", &self.policy_type)
            .field("virtual_path", &self.virtual_path)
            .field("base_path", &self.base_path)
            .field("server", &self.server)
            .field("bucket_name", &self.bucket_name)
            .field("access_key", &redact(&self.access_key))
            .field("secret_key", &redact(&self.secret_key))
            .field("settings", &self.settings)
            .field("max_size", &self.max_size)
            .field("flag", &self.flag)
            .field("node_id", &self.node_id)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "[REDACTED]"
    }
}

/// Canonical virtual path: single leading slash, no trailing slash, no empty
/// segments. The root is `/`.
pub fn normalize_virtual_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Append a slash unless the path already ends with one.
pub fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Human-readable duration (e.g., "200ms", "5m", "1h").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub std::time::Duration);

impl HumanDuration {
    pub fn from_secs(secs: u64) -> Self {
        HumanDuration(std::time::Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> std::time::Duration {
        self.0
    }
}

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("Missing unit in duration: {}", s))?;
        let (num_str, unit) = s.split_at(split);

        let num: u64 = num_str
            .parse()
            .map_err(|_| format!("Invalid number in duration: {}", s))?;

        let scaled = |factor: u64| {
            num.checked_mul(factor)
                .map(std::time::Duration::from_secs)
                .ok_or_else(|| format!("Duration too large: {}", s))
        };

        let duration = match unit {
            "ms" => std::time::Duration::from_millis(num),
            "s" => std::time::Duration::from_secs(num),
            "m" => scaled(60)?,
            "h" => scaled(3600)?,
            "d" => scaled(86400)?,
            _ => return Err(format!("Unknown duration unit: {}", unit)),
        };

        Ok(HumanDuration(duration))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        let millis = self.0.as_millis();

        if millis < 1000 || self.0.subsec_millis() != 0 {
            write!(f, "{}ms", millis)
        } else if secs % 86400 == 0 {
            write!(f, "{}d", secs / 86400)
        } else if secs % 3600 == 0 {
            write!(f, "{}h", secs / 3600)
        } else if secs % 60 == 0 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{}s", secs)
        }
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HumanDuration::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Policy list cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    /// TTL of the cached policy list.
    #[serde(default)]
    pub policy_ttl: Option<HumanDuration>,
    /// Upper bound on entries held by the in-process cache.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

/// VFS tree walking limits.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TreeConfig {
    /// Maximum ancestor hops when rebuilding a file's virtual path.
    #[serde(default)]
    pub max_depth: Option<usize>,
}

/// Outbound OAuth / Graph HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OAuthConfig {
    #[serde(default)]
    pub timeout: Option<HumanDuration>,
}

/// Local storage provider settings.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct LocalConfig {
    /// Secret used to sign local direct links.
    #[serde(default)]
    pub signing_secret: Option<String>,
}

impl fmt::Debug for LocalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalConfig")
            .field(
                "signing_secret",
                &self.signing_secret.as_deref().map(redact),
            )
            .finish()
    }
}

/// Top-level polyfs configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PolyfsConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Public base URL of the site, used to build OAuth callback URLs.
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub local: LocalConfig,
    /// Policies seeded into the in-memory policy store.
    #[serde(default)]
    pub policies: Vec<Policy>,
}

impl PolyfsConfig {
    /// Find a seeded policy by id.
    pub fn policy(&self, id: u64) -> Option<&Policy> {
        self.policies.iter().find(|p| p.id == id)
    }
}
