use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use polyfs_config::{Policy, PolicyType};
use polyfs_core::{ProviderError, ReadStream, StorageProvider};
use tracing::{debug, instrument};

use crate::endpoint::S3Target;

/// Reads objects from S3, Tencent COS, Aliyun OSS and Qiniu through their
/// S3-compatible APIs. The client is built from the policy on every call.
pub struct S3CompatibleProvider;

impl S3CompatibleProvider {
    /// Backend types this provider can serve.
    pub const TYPES: [PolicyType; 4] = [
        PolicyType::S3,
        PolicyType::TencentCos,
        PolicyType::AliOss,
        PolicyType::Qiniu,
    ];

    fn client(policy: &Policy, target: &S3Target) -> aws_sdk_s3::Client {
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .region(Region::new(target.region.clone()))
            .endpoint_url(&target.endpoint)
            .force_path_style(target.force_path_style);

        if !policy.access_key.is_empty() && !policy.secret_key.is_empty() {
            builder = builder.credentials_provider(Credentials::new(
                &policy.access_key,
                &policy.secret_key,
                None,
                None,
                "polyfs-policy",
            ));
        }

        aws_sdk_s3::Client::from_conf(builder.build())
    }
}

#[async_trait]
impl StorageProvider for S3CompatibleProvider {
    #[instrument(skip(self, policy), fields(backend = %policy.policy_type, policy_id = policy.id, source = %source))]
    async fn get(&self, policy: &Policy, source: &str) -> Result<ReadStream, ProviderError> {
        let target = S3Target::from_policy(policy).ok_or_else(|| ProviderError::Misconfigured {
            policy: policy.name.clone(),
            reason: format!("{} has no S3-compatible API", policy.policy_type),
        })?;
        if target.bucket.is_empty() {
            return Err(ProviderError::Misconfigured {
                policy: policy.name.clone(),
                reason: "bucket_name is empty".to_string(),
            });
        }

        let key = S3Target::key(source);
        debug!(endpoint = %target.endpoint, bucket = %target.bucket, key, "fetching object");

        let response = Self::client(policy, &target)
            .get_object()
            .bucket(&target.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_no_such_key()) {
                    ProviderError::NotFound(source.to_string())
                } else {
                    ProviderError::ConnectionFailed {
                        backend: policy.policy_type.to_string(),
                        source: Box::new(e),
                    }
                }
            })?;

        Ok(Box::new(Box::pin(response.body.into_async_read())))
    }
}
