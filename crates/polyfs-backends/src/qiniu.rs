use std::sync::LazyLock;

use async_trait::async_trait;
use polyfs_config::{Policy, PolicyType, Settings};
use regex::Regex;

use crate::error::StrategyError;
use crate::strategy::PolicyTypeStrategy;
use crate::validation;

pub const DEFAULT_REGION: &str = "cn-east-1";

static CDN_DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9:-]*\.[A-Za-z0-9.:-]*$").unwrap());
static STYLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-!/][A-Za-z0-9_-]{1,100}$").unwrap());

/// Qiniu Kodo.
pub struct QiniuStrategy;

#[async_trait]
impl PolicyTypeStrategy for QiniuStrategy {
    fn policy_type(&self) -> PolicyType {
        PolicyType::Qiniu
    }

    fn validate_settings(&self, settings: &mut Settings) -> Result<(), StrategyError> {
        validation::ensure_upload_method(settings)?;

        let cdn_domain = validation::require_string(settings, "cdn_domain")?;
        if cdn_domain.contains("://") {
            return Err(StrategyError::validation(
                "cdn_domain",
                "must be a bare domain without a scheme",
            ));
        }
        validation::match_pattern(
            "cdn_domain",
            cdn_domain,
            &CDN_DOMAIN,
            3..=253,
            "a domain such as cdn.example.com",
        )?;

        validation::check_pattern(
            settings,
            "style_separator",
            &STYLE_SEPARATOR,
            2..=101,
            "'-', '!' or '/' followed by a style name",
        )
    }
}

pub fn region(policy: &Policy) -> String {
    policy
        .setting_str("region")
        .unwrap_or(DEFAULT_REGION)
        .to_string()
}

/// Qiniu S3-compatible endpoint, unless `server` overrides it.
pub fn endpoint(policy: &Policy) -> String {
    if !policy.server.is_empty() {
        return policy.server.clone();
    }
    format!("https://s3.{}.qiniucs.com", region(policy))
}
