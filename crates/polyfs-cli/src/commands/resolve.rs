use polyfs_config::{Policy, PolicyType, PolyfsConfig};
use serde::Serialize;
use tracing::info;

/// Policy fields safe to print: no credentials.
#[derive(Debug, Serialize, PartialEq)]
pub struct PolicySummary {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    pub virtual_path: String,
    pub authorized: Option<bool>,
}

impl From<&Policy> for PolicySummary {
    fn from(policy: &Policy) -> Self {
        PolicySummary {
            id: policy.id,
            name: policy.name.clone(),
            policy_type: policy.policy_type,
            virtual_path: policy.virtual_path.clone(),
            authorized: policy
                .policy_type
                .requires_oauth()
                .then(|| !policy.access_key.is_empty()),
        }
    }
}

pub async fn run(config: &PolyfsConfig, path: &str, json: bool) -> anyhow::Result<()> {
    let resolver = super::resolver(config)?;
    let policy = resolver.find_policy_for_path(path).await?;
    let summary = PolicySummary::from(&policy);
    info!(path, policy_id = summary.id, mount = %summary.virtual_path, "path resolved");

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{} -> policy {} '{}' ({}) mounted at {}",
            path, summary.id, summary.name, summary.policy_type, summary.virtual_path
        );
    }

    Ok(())
}
