use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use polyfs_config::{Policy, PolicyType, Settings};
use polyfs_core::{ProviderError, ReadStream, StorageProvider};
use reqwest::{Client, StatusCode};
use tokio_util::io::StreamReader;
use tracing::{debug, instrument};

use crate::auth::{OneDriveAuthHandler, TokenExchanger};
use crate::error::StrategyError;
use crate::strategy::{AuthHandler, PolicyTypeStrategy};
use crate::validation;

/// How OneDrive reuses the generic credential slots of a [`Policy`].
pub mod fields {
    use polyfs_config::Policy;

    pub const DRIVE_TYPE: &str = "drive_type";
    pub const DRIVE_TYPE_DEFAULT: &str = "default";
    pub const DRIVE_TYPE_SHAREPOINT: &str = "sharepoint";

    pub const DEFAULT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/v1.0";

    /// `bucket_name` holds the OAuth client id.
    pub fn client_id(policy: &Policy) -> &str {
        &policy.bucket_name
    }

    /// `secret_key` holds the OAuth client secret.
    pub fn client_secret(policy: &Policy) -> &str {
        &policy.secret_key
    }

    /// `server` holds the Graph API endpoint.
    pub fn graph_endpoint(policy: &Policy) -> &str {
        &policy.server
    }

    /// `access_key` holds the refresh token once authorization finishes.
    pub fn refresh_token(policy: &Policy) -> &str {
        &policy.access_key
    }

    pub fn set_refresh_token(policy: &mut Policy, token: String) {
        policy.access_key = token;
    }
}

pub struct OneDriveStrategy {
    auth: Arc<OneDriveAuthHandler>,
}

impl OneDriveStrategy {
    pub fn new(exchanger: Arc<dyn TokenExchanger>) -> Self {
        OneDriveStrategy {
            auth: Arc::new(OneDriveAuthHandler::new(exchanger)),
        }
    }
}

#[async_trait]
impl PolicyTypeStrategy for OneDriveStrategy {
    fn policy_type(&self) -> PolicyType {
        PolicyType::OneDrive
    }

    fn validate_settings(&self, settings: &mut Settings) -> Result<(), StrategyError> {
        validation::ensure_upload_method(settings)?;
        validation::check_one_of(
            settings,
            fields::DRIVE_TYPE,
            &[fields::DRIVE_TYPE_DEFAULT, fields::DRIVE_TYPE_SHAREPOINT],
        )
    }

    fn auth_handler(&self) -> Option<Arc<dyn AuthHandler>> {
        Some(self.auth.clone())
    }
}

/// Graph URL returning the raw content of `source`.
///
/// A source starting with `/` is a drive path, anything else an item id.
pub fn content_url(policy: &Policy, source: &str) -> String {
    let endpoint = match fields::graph_endpoint(policy) {
        "" => fields::DEFAULT_GRAPH_ENDPOINT,
        server => server,
    }
    .trim_end_matches('/');

    if source.starts_with('/') {
        format!("{}/me/drive/root:{}:/content", endpoint, source)
    } else {
        format!("{}/me/drive/items/{}/content", endpoint, source)
    }
}

/// Downloads OneDrive content through Microsoft Graph.
pub struct OneDriveProvider {
    auth: Arc<dyn AuthHandler>,
    client: Client,
}

impl OneDriveProvider {
    /// `timeout` bounds connecting and each read, not the whole download.
    pub fn new(auth: Arc<dyn AuthHandler>, timeout: Duration) -> Result<Self, StrategyError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(OneDriveProvider { auth, client })
    }
}

#[async_trait]
impl StorageProvider for OneDriveProvider {
    #[instrument(skip(self, policy), fields(backend = "onedrive", policy_id = policy.id, source = %source))]
    async fn get(&self, policy: &Policy, source: &str) -> Result<ReadStream, ProviderError> {
        let token = self
            .auth
            .refresh_access_token(policy)
            .await
            .map_err(|e| match e {
                StrategyError::Http(e) => http_error(e, source),
                other => ProviderError::PermissionDenied(other.to_string()),
            })?;

        let url = content_url(policy, source);
        debug!(url = %url, "downloading from Graph");
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| http_error(e, source))?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => return Err(ProviderError::NotFound(source.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ProviderError::PermissionDenied(source.to_string()))
            }
            status => {
                return Err(ProviderError::Other(format!(
                    "Graph returned {} for {}",
                    status, source
                )))
            }
        }

        let body = response.bytes_stream().map_err(io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(body))))
    }
}

fn http_error(e: reqwest::Error, source: &str) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout {
            operation: "get".to_string(),
            source_locator: source.to_string(),
        }
    } else {
        ProviderError::ConnectionFailed {
            backend: "onedrive".to_string(),
            source: Box::new(e),
        }
    }
}
