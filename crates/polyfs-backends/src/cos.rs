use std::sync::LazyLock;

use async_trait::async_trait;
use polyfs_config::{Policy, PolicyType, Settings};
use regex::Regex;

use crate::error::StrategyError;
use crate::strategy::PolicyTypeStrategy;
use crate::validation;

pub const DEFAULT_REGION: &str = "ap-guangzhou";

static REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)+$").unwrap());
static STYLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([?!|-]|/[A-Za-z0-9_-]{1,100})$").unwrap());

/// Tencent Cloud Object Storage.
pub struct CosStrategy;

#[async_trait]
impl PolicyTypeStrategy for CosStrategy {
    fn policy_type(&self) -> PolicyType {
        PolicyType::TencentCos
    }

    fn validate_settings(&self, settings: &mut Settings) -> Result<(), StrategyError> {
        validation::ensure_upload_method(settings)?;
        validation::check_pattern(
            settings,
            "region",
            &REGION,
            6..=20,
            "a region such as ap-guangzhou",
        )?;
        validation::check_pattern(
            settings,
            "style_separator",
            &STYLE_SEPARATOR,
            1..=101,
            "one of ? ! | - or '/' followed by a style name",
        )?;
        for key in ["source_auth", "custom_proxy"] {
            validation::check_bool(settings, key)?;
        }
        Ok(())
    }
}

pub fn region(policy: &Policy) -> String {
    policy
        .setting_str("region")
        .unwrap_or(DEFAULT_REGION)
        .to_string()
}

/// COS S3-compatible endpoint, unless `server` overrides it.
pub fn endpoint(policy: &Policy) -> String {
    if !policy.server.is_empty() {
        return policy.server.clone();
    }
    format!("https://cos.{}.myqcloud.com", region(policy))
}
