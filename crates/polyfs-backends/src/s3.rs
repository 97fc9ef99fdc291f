use std::sync::LazyLock;

use async_trait::async_trait;
use polyfs_config::{Policy, PolicyType, Settings};
use regex::Regex;

use crate::error::StrategyError;
use crate::strategy::PolicyTypeStrategy;
use crate::validation;

pub const DEFAULT_REGION: &str = "us-east-1";

static REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]*-[a-z0-9-]*$").unwrap());

pub struct S3Strategy;

#[async_trait]
impl PolicyTypeStrategy for S3Strategy {
    fn policy_type(&self) -> PolicyType {
        PolicyType::S3
    }

    fn validate_settings(&self, settings: &mut Settings) -> Result<(), StrategyError> {
        validation::ensure_upload_method(settings)?;
        validation::check_pattern(
            settings,
            "region",
            &REGION,
            8..=20,
            "8-20 lowercase letters, digits and '-' with at least one '-'",
        )?;
        for key in ["force_path_style", "source_auth", "custom_proxy"] {
            validation::check_bool(settings, key)?;
        }
        for key in ["endpoint_url", "cdn_domain"] {
            validation::check_string(settings, key)?;
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

/// Explicit `server`, then the `endpoint_url` setting, then AWS.
pub fn endpoint(policy: &Policy) -> String {
    if !policy.server.is_empty() {
        return policy.server.clone();
    }
    match policy.setting_str("endpoint_url") {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => format!("https://s3.{}.amazonaws.com", region(policy)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validate(pairs: &[(&str, serde_json::Value)]) -> Result<Settings, StrategyError> {
        let mut settings: Settings = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        S3Strategy.validate_settings(&mut settings)?;
        Ok(settings)
    }

    #[test]
    fn test_regions() {
        for ok in ["us-east-1", "ap-southeast-2", "eu-west-3"] {
            assert!(validate(&[("region", json!(ok))]).is_ok(), "{}", ok);
        }
        for bad in ["useast1x", "us-east", "US-EAST-1", "us_east_1", "a-very-long-region-name-1"] {
            assert!(validate(&[("region", json!(bad))]).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_typed_settings() {
        let settings = validate(&[
            ("force_path_style", json!(true)),
            ("endpoint_url", json!("https://minio.local")),
            ("unknown_key", json!(42)),
        ])
        .unwrap();
        assert_eq!(settings["upload_method"], json!("client"));
        assert_eq!(settings["unknown_key"], json!(42));

        assert!(validate(&[("force_path_style", json!("true"))]).is_err());
        assert!(validate(&[("cdn_domain", json!(1))]).is_err());
    }

    #[test]
    fn test_endpoint_precedence() {
        let mut policy = Policy::new(1, "s3", PolicyType::S3, "/s3");
        assert_eq!(endpoint(&policy), "https://s3.us-east-1.amazonaws.com");

        policy
            .settings
            .insert("region".to_string(), json!("eu-west-1"));
        assert_eq!(endpoint(&policy), "https://s3.eu-west-1.amazonaws.com");

        policy
            .settings
            .insert("endpoint_url".to_string(), json!("https://minio.local:9000"));
        assert_eq!(endpoint(&policy), "https://minio.local:9000");

        policy.server = "https://explicit.example".to_string();
        assert_eq!(endpoint(&policy), "https://explicit.example");
    }
}
