use std::sync::LazyLock;

use async_trait::async_trait;
use polyfs_config::{Policy, PolicyType, Settings};
use regex::Regex;

use crate::error::StrategyError;
use crate::strategy::PolicyTypeStrategy;
use crate::validation;

pub const DEFAULT_REGION: &str = "oss-cn-hangzhou";

static REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(oss-)?[a-z0-9]+(-[a-z0-9]+)+$").unwrap());

/// Aliyun Object Storage Service.
pub struct OssStrategy;

#[async_trait]
impl PolicyTypeStrategy for OssStrategy {
    fn policy_type(&self) -> PolicyType {
        PolicyType::AliOss
    }

    fn validate_settings(&self, settings: &mut Settings) -> Result<(), StrategyError> {
        validation::ensure_upload_method(settings)?;
        validation::check_pattern(
            settings,
            "region",
            &REGION,
            5..=30,
            "a region such as oss-cn-hangzhou",
        )?;
        validation::check_one_of(settings, "style_separator", &["-", "_", "/", "!"])?;
        for key in ["source_auth", "custom_proxy", "internal_endpoint"] {
            validation::check_bool(settings, key)?;
        }
        for key in ["endpoint_url", "cdn_domain"] {
            validation::check_string(settings, key)?;
        }
        Ok(())
    }
}

/// Region with the `oss-` prefix OSS hostnames use.
pub fn region(policy: &Policy) -> String {
    let region = policy.setting_str("region").unwrap_or(DEFAULT_REGION);
    if region.starts_with("oss-") {
        region.to_string()
    } else {
        format!("oss-{}", region)
    }
}

/// `server`, then `endpoint_url`, then the public or internal regional host.
pub fn endpoint(policy: &Policy) -> String {
    if !policy.server.is_empty() {
        return policy.server.clone();
    }
    if let Some(url) = policy.setting_str("endpoint_url").filter(|u| !u.is_empty()) {
        return url.to_string();
    }
    if policy.setting_bool("internal_endpoint") {
        format!("https://{}-internal.aliyuncs.com", region(policy))
    } else {
        format!("https://{}.aliyuncs.com", region(policy))
    }
}
