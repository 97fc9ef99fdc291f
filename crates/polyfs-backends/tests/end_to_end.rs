//! End-to-end: a config with a local root mount and a OneDrive mount, wired
//! through the strategy registry, the resolver, and real/in-memory providers.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use polyfs_backends::{
    LocalProvider, MemoryProvider, StrategyError, StrategyRegistry, TokenExchanger, TokenResponse,
};
use polyfs_config::{PolicyType, PolyfsConfig};
use polyfs_core::{
    Entity, File, MemoryCache, MemoryEntityRepository, MemoryFileRepository, MemoryPolicyStore,
    PolicyResolver, ProviderRegistry, ResolverOptions, VfsError,
};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

/// Token endpoint stand-in that always grants a refresh token.
struct GrantingExchanger {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl TokenExchanger for GrantingExchanger {
    async fn exchange(
        &self,
        token_url: &str,
        _form: &[(&'static str, String)],
    ) -> Result<TokenResponse, StrategyError> {
        self.calls.lock().unwrap().push(token_url.to_string());
        Ok(TokenResponse {
            access_token: Some("access".to_string()),
            refresh_token: Some("refresh-from-graph".to_string()),
            expires_in: Some(3600),
            token_type: Some("Bearer".to_string()),
        })
    }
}

struct Setup {
    _dir: TempDir,
    config: PolyfsConfig,
    store: Arc<MemoryPolicyStore>,
    strategies: StrategyRegistry,
    exchanger: Arc<GrantingExchanger>,
    resolver: PolicyResolver,
}

fn setup() -> Setup {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
    std::fs::write(dir.path().join("uploads/notes.txt"), "local bytes").unwrap();

    let yaml = format!(
        r#"
name: e2e
site_url: https://cloud.example.com/
tree:
  max_depth: 16
policies:
  - id: 1
    name: disk
    type: local
    virtual_path: /
    base_path: {}
  - id: 2
    name: drive
    type: onedrive
    virtual_path: /drive/
    server: https://graph.microsoft.com/v1.0
    bucket_name: client-id
    secret_key: client-secret
"#,
        dir.path().display()
    );
    let config = PolyfsConfig::from_yaml(&yaml).unwrap().effective();
    config.validate_or_err().unwrap();

    let exchanger = Arc::new(GrantingExchanger {
        calls: Mutex::new(Vec::new()),
    });
    let strategies = StrategyRegistry::with_defaults(exchanger.clone());

    let drive_objects = Arc::new(MemoryProvider::new());
    drive_objects.insert(2, "01REPORT", "drive bytes");
    let providers = ProviderRegistry::builder()
        .register(PolicyType::Local, Arc::new(LocalProvider::new(None)))
        .register(PolicyType::OneDrive, drive_objects)
        .build();

    let files = Arc::new(MemoryFileRepository::new());
    files.insert(File::dir(1, None, ""));
    files.insert(File::dir(2, Some(1), "drive"));
    files.insert(File::file(3, Some(2), "report.docx", Some(30)));
    files.insert(File::file(4, Some(1), "notes.txt", Some(40)));
    files.insert(File::file(5, Some(1), "drive-notes.txt", Some(40)));

    let entities = Arc::new(MemoryEntityRepository::new());
    entities.insert(Entity::new(30, "01REPORT", 11));
    entities.insert(Entity::new(40, "uploads/notes.txt", 11));

    let store = Arc::new(MemoryPolicyStore::new(config.policies.clone()));
    let resolver = PolicyResolver::new(
        store.clone(),
        Arc::new(MemoryCache::default()),
        files,
        entities,
        providers,
    )
    .with_options(ResolverOptions::from_config(&config));

    Setup {
        _dir: dir,
        config,
        store,
        strategies,
        exchanger,
        resolver,
    }
}

async fn read(resolver: &PolicyResolver, file_id: u64) -> String {
    let mut stream = resolver.get_file_reader_by_id(file_id).await.unwrap();
    let mut out = String::new();
    stream.read_to_string(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn test_routing_between_local_and_onedrive() {
    let s = setup();

    let drive = s.resolver.find_policy_for_path("/drive/report.docx").await.unwrap();
    assert_eq!(drive.policy_type, PolicyType::OneDrive);
    let disk = s.resolver.find_policy_for_path("/notes.txt").await.unwrap();
    assert_eq!(disk.policy_type, PolicyType::Local);
    // Sibling sharing the mount name as a prefix stays on the root.
    let sibling = s.resolver.find_policy_for_path("/drive-notes.txt").await.unwrap();
    assert_eq!(sibling.id, 1);

    assert!(s
        .strategies
        .get(drive.policy_type)
        .unwrap()
        .auth_handler()
        .is_some());
    assert!(s
        .strategies
        .get(disk.policy_type)
        .unwrap()
        .auth_handler()
        .is_none());
}

#[tokio::test]
async fn test_reads_through_each_backend() {
    let s = setup();
    assert_eq!(read(&s.resolver, 3).await, "drive bytes");
    assert_eq!(read(&s.resolver, 4).await, "local bytes");
    assert_eq!(read(&s.resolver, 5).await, "local bytes");

    let metrics = s.resolver.metrics();
    assert_eq!(metrics.readers_opened, 3);
    assert_eq!(metrics.store_loads, 1);
}

#[tokio::test]
async fn test_unknown_file_id() {
    let s = setup();
    let err = s.resolver.get_file_reader_by_id(99).await.err().unwrap();
    assert!(matches!(err, VfsError::NotFound(_)));
}

#[tokio::test]
async fn test_authorize_onedrive_policy() {
    let s = setup();
    let site_url = s.config.site_url.clone().unwrap();
    let mut drive = s.config.policy(2).unwrap().clone();
    let handler = s.strategies.auth_handler(PolicyType::OneDrive).unwrap().unwrap();

    let url = handler.generate_auth_url(&drive, &site_url).unwrap();
    assert!(url
        .query_pairs()
        .any(|(k, v)| k == "redirect_uri"
            && v == "https://cloud.example.com/api/v3/callback/onedrive/auth"));

    handler
        .finalize_auth(&mut drive, "code-from-callback", &site_url)
        .await
        .unwrap();
    assert_eq!(drive.access_key, "refresh-from-graph");
    assert_eq!(s.exchanger.calls.lock().unwrap().len(), 1);

    // Persisting the token is the caller's job, followed by invalidation.
    s.store.upsert(drive);
    s.resolver.invalidate_policies().await;
    let reloaded = s.resolver.find_policy_for_path("/drive").await.unwrap();
    assert_eq!(reloaded.access_key, "refresh-from-graph");
}

#[tokio::test]
async fn test_validate_every_configured_policy() {
    let s = setup();
    let mut policies = s.config.policies.clone();
    for policy in &mut policies {
        s.strategies.validate_policy(policy).unwrap();
    }
    assert!(policies[0].settings.is_empty());
    assert_eq!(policies[1].settings["upload_method"], "client");
}
