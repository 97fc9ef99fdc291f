//! OneDrive OAuth2 authorization-code flow.
//!
//! Client credentials and the Graph endpoint are read from the policy on
//! every call, so edits to a policy take effect without rebuilding anything.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use polyfs_config::Policy;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::error::StrategyError;
use crate::onedrive::fields;
use crate::strategy::AuthHandler;

pub const GLOBAL_AUTHORIZE_URL: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
pub const GLOBAL_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
pub const CHINA_AUTHORIZE_URL: &str = "https://login.chinacloudapi.cn/common/oauth2/v2.0/authorize";
pub const CHINA_TOKEN_URL: &str = "https://login.chinacloudapi.cn/common/oauth2/v2.0/token";

/// Graph host that selects the China cloud login endpoints.
pub const CHINA_GRAPH_HOST: &str = "microsoftgraph.chinacloudapi.cn";

/// Appended to the site URL to form the redirect URI.
pub const CALLBACK_PATH: &str = "/api/v3/callback/onedrive/auth";

pub const SCOPE: &str = "offline_access files.readwrite.all";

/// Authorize/token endpoint pair of one Microsoft cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OAuthEndpoints {
    pub authorize: &'static str,
    pub token: &'static str,
}

impl OAuthEndpoints {
    pub const GLOBAL: OAuthEndpoints = OAuthEndpoints {
        authorize: GLOBAL_AUTHORIZE_URL,
        token: GLOBAL_TOKEN_URL,
    };

    pub const CHINA: OAuthEndpoints = OAuthEndpoints {
        authorize: CHINA_AUTHORIZE_URL,
        token: CHINA_TOKEN_URL,
    };

    /// Pick the cloud from the Graph endpoint. Unparseable or empty
    /// endpoints fall back to the global cloud.
    pub fn for_graph_endpoint(server: &str) -> Self {
        let is_china = Url::parse(server)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.eq_ignore_ascii_case(CHINA_GRAPH_HOST)))
            .unwrap_or(false);
        if is_china {
            OAuthEndpoints::CHINA
        } else {
            OAuthEndpoints::GLOBAL
        }
    }
}

/// Redirect URI registered with the OAuth application.
pub fn callback_url(site_url: &str) -> String {
    format!("{}{}", site_url.trim_end_matches('/'), CALLBACK_PATH)
}

/// Token endpoint response. Only the fields polyfs reads are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Performs the form POST against a token endpoint.
#[async_trait]
pub trait TokenExchanger: Send + Sync + 'static {
    async fn exchange(
        &self,
        token_url: &str,
        form: &[(&'static str, String)],
    ) -> Result<TokenResponse, StrategyError>;
}

/// [`TokenExchanger`] over `reqwest` with a request timeout.
pub struct HttpTokenExchanger {
    client: Client,
}

impl HttpTokenExchanger {
    pub fn new(timeout: Duration) -> Result<Self, StrategyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpTokenExchanger { client })
    }

    pub fn with_client(client: Client) -> Self {
        HttpTokenExchanger { client }
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    #[instrument(skip(self, form), fields(url = %token_url))]
    async fn exchange(
        &self,
        token_url: &str,
        form: &[(&'static str, String)],
    ) -> Result<TokenResponse, StrategyError> {
        let response = self.client.post(token_url).form(form).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<TokenResponse>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            },
            Err(_) => format!("token endpoint returned {}", status),
        };
        warn!(status = %status, "token exchange rejected");
        Err(StrategyError::Authorization(message))
    }
}

/// Client credentials and endpoints derived from a OneDrive policy.
struct OAuthClient<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    endpoints: OAuthEndpoints,
}

impl<'a> OAuthClient<'a> {
    fn from_policy(policy: &'a Policy) -> Result<Self, StrategyError> {
        let client_id = fields::client_id(policy);
        let client_secret = fields::client_secret(policy);
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(StrategyError::Authorization(format!(
                "policy {} is missing the OAuth client id or client secret",
                policy.id
            )));
        }
        Ok(OAuthClient {
            client_id,
            client_secret,
            endpoints: OAuthEndpoints::for_graph_endpoint(fields::graph_endpoint(policy)),
        })
    }
}

/// Authorization-code flow against Microsoft identity for OneDrive policies.
pub struct OneDriveAuthHandler {
    exchanger: Arc<dyn TokenExchanger>,
}

impl OneDriveAuthHandler {
    pub fn new(exchanger: Arc<dyn TokenExchanger>) -> Self {
        OneDriveAuthHandler { exchanger }
    }
}

#[async_trait]
impl AuthHandler for OneDriveAuthHandler {
    fn generate_auth_url(&self, policy: &Policy, site_url: &str) -> Result<Url, StrategyError> {
        let client = OAuthClient::from_policy(policy)?;
        let redirect = callback_url(site_url);
        let state = policy.id.to_string();

        Url::parse_with_params(
            client.endpoints.authorize,
            [
                ("client_id", client.client_id),
                ("response_type", "code"),
                ("redirect_uri", redirect.as_str()),
                ("response_mode", "query"),
                ("scope", SCOPE),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| StrategyError::Authorization(format!("invalid authorize URL: {}", e)))
    }

    #[instrument(skip(self, policy, code), fields(policy_id = policy.id))]
    async fn finalize_auth(
        &self,
        policy: &mut Policy,
        code: &str,
        site_url: &str,
    ) -> Result<(), StrategyError> {
        let client = OAuthClient::from_policy(policy)?;
        let form = [
            ("grant_type", "authorization_code".to_string()),
            ("client_id", client.client_id.to_string()),
            ("client_secret", client.client_secret.to_string()),
            ("code", code.to_string()),
            ("redirect_uri", callback_url(site_url)),
            ("scope", SCOPE.to_string()),
        ];

        let response = self
            .exchanger
            .exchange(client.endpoints.token, &form)
            .await
            .map_err(|e| match e {
                StrategyError::Http(e) => {
                    StrategyError::Authorization(format!("token exchange failed: {}", e))
                }
                other => other,
            })?;
        let refresh_token = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                StrategyError::Authorization(
                    "token response carried no refresh token; was offline_access granted?"
                        .to_string(),
                )
            })?;

        fields::set_refresh_token(policy, refresh_token);
        info!("OneDrive authorization finalized");
        Ok(())
    }

    #[instrument(skip(self, policy), fields(policy_id = policy.id))]
    async fn refresh_access_token(&self, policy: &Policy) -> Result<String, StrategyError> {
        let client = OAuthClient::from_policy(policy)?;
        let refresh_token = fields::refresh_token(policy);
        if refresh_token.is_empty() {
            return Err(StrategyError::Authorization(format!(
                "policy {} has not been authorized yet",
                policy.id
            )));
        }

        let form = [
            ("grant_type", "refresh_token".to_string()),
            ("client_id", client.client_id.to_string()),
            ("client_secret", client.client_secret.to_string()),
            ("refresh_token", refresh_token.to_string()),
            ("scope", SCOPE.to_string()),
        ];
        let response = self.exchanger.exchange(client.endpoints.token, &form).await?;
        if response
            .refresh_token
            .as_deref()
            .is_some_and(|t| t != refresh_token)
        {
            debug!("token endpoint rotated the refresh token");
        }

        response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                StrategyError::Authorization("token response carried no access token".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{closed_url, CannedServer};
    use polyfs_config::PolicyType;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Returns a canned result and records every request.
    struct MockExchanger {
        response: Result<TokenResponse, String>,
        requests: Mutex<Vec<(String, HashMap<String, String>)>>,
    }

    impl MockExchanger {
        fn new(response: TokenResponse) -> Arc<Self> {
            Arc::new(MockExchanger {
                response: Ok(response),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn rejecting(message: &str) -> Arc<Self> {
            Arc::new(MockExchanger {
                response: Err(message.to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<(String, HashMap<String, String>)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TokenExchanger for MockExchanger {
        async fn exchange(
            &self,
            token_url: &str,
            form: &[(&'static str, String)],
        ) -> Result<TokenResponse, StrategyError> {
            let form = form
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect();
            self.requests
                .lock()
                .unwrap()
                .push((token_url.to_string(), form));
            self.response.clone().map_err(StrategyError::Authorization)
        }
    }

    fn onedrive_policy(server: &str) -> Policy {
        let mut policy = Policy::new(7, "drive", PolicyType::OneDrive, "/drive");
        policy.bucket_name = "client-id".to_string();
        policy.secret_key = "client-secret".to_string();
        policy.server = server.to_string();
        policy
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_endpoint_selection() {
        assert_eq!(
            OAuthEndpoints::for_graph_endpoint("https://graph.microsoft.com/v1.0"),
            OAuthEndpoints::GLOBAL
        );
        assert_eq!(
            OAuthEndpoints::for_graph_endpoint("https://microsoftgraph.chinacloudapi.cn/v1.0"),
            OAuthEndpoints::CHINA
        );
        assert_eq!(OAuthEndpoints::for_graph_endpoint(""), OAuthEndpoints::GLOBAL);
        assert_eq!(
            OAuthEndpoints::for_graph_endpoint("https://evil.example/microsoftgraph.chinacloudapi.cn"),
            OAuthEndpoints::GLOBAL
        );
    }

    #[test]
    fn test_generate_auth_url_global() {
        let handler = OneDriveAuthHandler::new(MockExchanger::new(TokenResponse::default()));
        let policy = onedrive_policy("https://graph.microsoft.com/v1.0");

        let url = handler
            .generate_auth_url(&policy, "https://cloud.example.com/")
            .unwrap();
        assert!(url.as_str().starts_with(GLOBAL_AUTHORIZE_URL));

        let params = query(&url);
        assert_eq!(params["client_id"], "client-id");
        assert_eq!(params["response_type"], "code");
        assert_eq!(
            params["redirect_uri"],
            "https://cloud.example.com/api/v3/callback/onedrive/auth"
        );
        assert_eq!(params["scope"], SCOPE);
        assert_eq!(params["state"], "7");
        assert!(!params.contains_key("client_secret"));
    }

    #[test]
    fn test_generate_auth_url_china() {
        let handler = OneDriveAuthHandler::new(MockExchanger::new(TokenResponse::default()));
        let policy = onedrive_policy("https://microsoftgraph.chinacloudapi.cn/v1.0");

        let url = handler.generate_auth_url(&policy, "https://cloud.example.cn").unwrap();
        assert_eq!(url.host_str(), Some("login.chinacloudapi.cn"));
    }

    #[test]
    fn test_generate_auth_url_requires_credentials() {
        let handler = OneDriveAuthHandler::new(MockExchanger::new(TokenResponse::default()));
        let mut policy = onedrive_policy("https://graph.microsoft.com/v1.0");
        policy.secret_key.clear();

        let err = handler.generate_auth_url(&policy, "https://x.example").unwrap_err();
        assert!(matches!(err, StrategyError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_finalize_auth_stores_refresh_token() {
        let exchanger = MockExchanger::new(TokenResponse {
            access_token: Some("at".to_string()),
            refresh_token: Some("rt-123".to_string()),
            ..Default::default()
        });
        let handler = OneDriveAuthHandler::new(exchanger.clone());
        let mut policy = onedrive_policy("https://graph.microsoft.com/v1.0");

        handler
            .finalize_auth(&mut policy, "auth-code", "https://cloud.example.com")
            .await
            .unwrap();
        assert_eq!(policy.access_key, "rt-123");

        let requests = exchanger.requests();
        assert_eq!(requests.len(), 1);
        let (url, form) = &requests[0];
        assert_eq!(url, GLOBAL_TOKEN_URL);
        assert_eq!(form["grant_type"], "authorization_code");
        assert_eq!(form["code"], "auth-code");
        assert_eq!(form["client_secret"], "client-secret");
        assert!(form["scope"].contains("offline_access"));
    }

    #[tokio::test]
    async fn test_finalize_auth_without_refresh_token_leaves_policy() {
        let exchanger = MockExchanger::new(TokenResponse {
            access_token: Some("at".to_string()),
            ..Default::default()
        });
        let handler = OneDriveAuthHandler::new(exchanger);
        let mut policy = onedrive_policy("https://graph.microsoft.com/v1.0");
        policy.access_key = "previous".to_string();
        let before = policy.clone();

        let err = handler
            .finalize_auth(&mut policy, "auth-code", "https://cloud.example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::Authorization(_)));
        assert_eq!(policy, before);
    }

    #[tokio::test]
    async fn test_refresh_access_token() {
        let exchanger = MockExchanger::new(TokenResponse {
            access_token: Some("fresh".to_string()),
            ..Default::default()
        });
        let handler = OneDriveAuthHandler::new(exchanger.clone());
        let mut policy = onedrive_policy("https://microsoftgraph.chinacloudapi.cn/v1.0");
        policy.access_key = "rt".to_string();

        assert_eq!(handler.refresh_access_token(&policy).await.unwrap(), "fresh");
        let requests = exchanger.requests();
        let (url, form) = &requests[0];
        assert_eq!(url, CHINA_TOKEN_URL);
        assert_eq!(form["grant_type"], "refresh_token");
        assert_eq!(form["refresh_token"], "rt");
    }

    #[tokio::test]
    async fn test_refresh_requires_prior_authorization() {
        let handler = OneDriveAuthHandler::new(MockExchanger::new(TokenResponse::default()));
        let policy = onedrive_policy("https://graph.microsoft.com/v1.0");

        let err = handler.refresh_access_token(&policy).await.unwrap_err();
        assert!(err.to_string().contains("not been authorized"));
    }

    #[tokio::test]
    async fn test_finalize_auth_rejected_exchange_leaves_policy() {
        let exchanger = MockExchanger::rejecting("invalid_grant: code expired");
        let handler = OneDriveAuthHandler::new(exchanger.clone());
        let mut policy = onedrive_policy("https://graph.microsoft.com/v1.0");
        policy.access_key = "previous".to_string();
        let before = policy.clone();

        let err = handler
            .finalize_auth(&mut policy, "stale-code", "https://cloud.example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::Authorization(msg) if msg.contains("invalid_grant")));
        assert_eq!(policy, before);
        assert_eq!(exchanger.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_finalize_auth_unreachable_endpoint_is_authorization_error() {
        let url = closed_url().await;
        let exchanger = Arc::new(HttpTokenExchanger::new(Duration::from_secs(2)).unwrap());
        let mut policy = onedrive_policy("https://graph.microsoft.com/v1.0");
        policy.access_key = "previous".to_string();
        let before = policy.clone();

        // Drive the handler's error mapping with a real transport failure.
        let err = exchanger
            .exchange(&url, &[("grant_type", "authorization_code".to_string())])
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::Http(_)));

        let handler = OneDriveAuthHandler::new(Arc::new(FixedUrlExchanger { url, inner: exchanger }));
        let err = handler
            .finalize_auth(&mut policy, "code", "https://cloud.example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::Authorization(msg) if msg.contains("token exchange failed")));
        assert_eq!(policy, before);
    }

    /// Sends every exchange to `url` instead of the Microsoft endpoint.
    struct FixedUrlExchanger {
        url: String,
        inner: Arc<HttpTokenExchanger>,
    }

    #[async_trait]
    impl TokenExchanger for FixedUrlExchanger {
        async fn exchange(
            &self,
            _token_url: &str,
            form: &[(&'static str, String)],
        ) -> Result<TokenResponse, StrategyError> {
            self.inner.exchange(&self.url, form).await
        }
    }

    #[tokio::test]
    async fn test_http_exchanger_decodes_tokens() {
        let server = CannedServer::start(
            200,
            "application/json",
            r#"{"access_token":"at","refresh_token":"rt","expires_in":3600,"token_type":"Bearer"}"#,
        )
        .await;
        let exchanger = HttpTokenExchanger::new(Duration::from_secs(5)).unwrap();

        let token = exchanger
            .exchange(
                &format!("{}/token", server.url),
                &[("grant_type", "authorization_code".to_string()), ("code", "a b".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(token.refresh_token.as_deref(), Some("rt"));
        assert_eq!(token.expires_in, Some(3600));

        let requests = server.requests();
        assert!(requests[0].starts_with("POST /token "));
        assert!(requests[0].ends_with("grant_type=authorization_code&code=a+b"));
    }

    #[tokio::test]
    async fn test_http_exchanger_reports_oauth_error_body() {
        let server = CannedServer::start(
            400,
            "application/json",
            r#"{"error":"invalid_grant","error_description":"AADSTS70008: code expired"}"#,
        )
        .await;
        let exchanger = HttpTokenExchanger::new(Duration::from_secs(5)).unwrap();

        let err = exchanger.exchange(&server.url, &[]).await.unwrap_err();
        match err {
            StrategyError::Authorization(msg) => {
                assert_eq!(msg, "invalid_grant: AADSTS70008: code expired")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_exchanger_reports_opaque_failure_status() {
        let server = CannedServer::start(502, "text/html", "<h1>Bad Gateway</h1>").await;
        let exchanger = HttpTokenExchanger::new(Duration::from_secs(5)).unwrap();

        let err = exchanger.exchange(&server.url, &[]).await.unwrap_err();
        assert!(matches!(err, StrategyError::Authorization(msg) if msg.contains("502")));
    }
}
