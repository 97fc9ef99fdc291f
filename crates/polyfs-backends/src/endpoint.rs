//! S3-compatible addressing for the object storage backends.

use polyfs_config::{Policy, PolicyType};

use crate::{cos, oss, qiniu, s3};

/// Where and how to reach a policy's bucket over the S3 API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Target {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub force_path_style: bool,
}

impl S3Target {
    /// `None` for backends without an S3-compatible API.
    pub fn from_policy(policy: &Policy) -> Option<Self> {
        let (endpoint, region) = match policy.policy_type {
            PolicyType::S3 => (s3::endpoint(policy), s3::region(policy)),
            PolicyType::TencentCos => (cos::endpoint(policy), cos::region(policy)),
            // OSS signs with the bare region, hosts carry the `oss-` prefix.
            PolicyType::AliOss => (
                oss::endpoint(policy),
                oss::region(policy).trim_start_matches("oss-").to_string(),
            ),
            PolicyType::Qiniu => (qiniu::endpoint(policy), qiniu::region(policy)),
            PolicyType::Local | PolicyType::OneDrive => return None,
        };

        Some(S3Target {
            endpoint,
            region,
            bucket: policy.bucket_name.clone(),
            force_path_style: policy.setting_bool("force_path_style"),
        })
    }

    /// Object key for an entity source.
    pub fn key(source: &str) -> &str {
        source.trim_start_matches('/')
    }
}
