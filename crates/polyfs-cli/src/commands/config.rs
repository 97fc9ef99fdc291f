use polyfs_config::PolyfsConfig;

const REDACTED: &str = "[REDACTED]";

/// Copy of `config` with credentials and the signing secret masked.
pub fn redacted(config: &PolyfsConfig) -> PolyfsConfig {
    let mut config = config.clone();
    for policy in &mut config.policies {
        for secret in [&mut policy.access_key, &mut policy.secret_key] {
            if !secret.is_empty() {
                *secret = REDACTED.to_string();
            }
        }
    }
    if config.local.signing_secret.is_some() {
        config.local.signing_secret = Some(REDACTED.to_string());
    }
    config
}

pub fn run(config: &PolyfsConfig) -> anyhow::Result<()> {
    // Print as YAML for readability
    let yaml = serde_yaml::to_string(&redacted(config))?;
    println!("{}", yaml);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyfs_config::{Policy, PolicyType};

    #[test]
    fn test_redacted_masks_secrets() {
        let mut config = PolyfsConfig::default();
        let mut policy = Policy::new(1, "s3", PolicyType::S3, "/");
        policy.access_key = "AKIA".to_string();
        policy.bucket_name = "media".to_string();
        config.policies.push(policy);
        config.local.signing_secret = Some("hunter2".to_string());

        let yaml = serde_yaml::to_string(&redacted(&config)).unwrap();
        assert!(!yaml.contains("AKIA"));
        assert!(!yaml.contains("hunter2"));
        assert!(yaml.contains("media"));
        assert_eq!(redacted(&config).policies[0].secret_key, "");
    }
}
