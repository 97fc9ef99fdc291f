use anyhow::Context;
use polyfs_backends::StrategyRegistry;
use polyfs_config::PolyfsConfig;

/// Authorization URL for the policy with `policy_id`.
pub fn auth_url(
    config: &PolyfsConfig,
    strategies: &StrategyRegistry,
    policy_id: u64,
) -> anyhow::Result<String> {
    let policy = config
        .policy(policy_id)
        .with_context(|| format!("no policy with id {}", policy_id))?;
    let handler = strategies
        .auth_handler(policy.policy_type)?
        .with_context(|| format!("{} policies do not use OAuth", policy.policy_type))?;
    let site_url = config
        .site_url
        .as_deref()
        .context("site_url must be set to build the OAuth callback")?;

    Ok(handler.generate_auth_url(policy, site_url)?.to_string())
}

pub fn run(config: &PolyfsConfig, policy_id: u64) -> anyhow::Result<()> {
    let strategies = super::strategies(config)?;
    println!("{}", auth_url(config, &strategies, policy_id)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PolyfsConfig {
        PolyfsConfig::from_yaml(
            r#"
site_url: https://cloud.example.com
policies:
  - id: 1
    name: disk
    type: local
    virtual_path: /
  - id: 2
    name: drive
    type: onedrive
    virtual_path: /drive
    server: https://graph.microsoft.com/v1.0
    bucket_name: client-id
    secret_key: client-secret
"#,
        )
        .unwrap()
        .effective()
    }

    #[test]
    fn test_auth_url_for_onedrive() {
        let config = config();
        let strategies = super::super::strategies(&config).unwrap();
        let url = auth_url(&config, &strategies, 2).unwrap();
        assert!(url.starts_with("https://login.microsoftonline.com/"));
        assert!(url.contains("state=2"));
    }

    #[test]
    fn test_auth_url_rejects_local_and_unknown() {
        let config = config();
        let strategies = super::super::strategies(&config).unwrap();
        let err = auth_url(&config, &strategies, 1).unwrap_err();
        assert!(err.to_string().contains("do not use OAuth"));
        let err = auth_url(&config, &strategies, 42).unwrap_err();
        assert!(err.to_string().contains("no policy with id 42"));
    }
}
