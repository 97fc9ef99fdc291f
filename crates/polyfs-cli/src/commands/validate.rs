use polyfs_backends::StrategyRegistry;
use polyfs_config::PolyfsConfig;
use tracing::{debug, info, warn};

/// Every problem in the configuration and in each policy's settings.
pub fn check(config: &PolyfsConfig, strategies: &StrategyRegistry) -> Vec<String> {
    let mut problems: Vec<String> = config.validate().iter().map(|e| e.to_string()).collect();

    for policy in &config.policies {
        let mut policy = policy.clone();
        debug!(policy_id = policy.id, policy_type = %policy.policy_type, "checking policy settings");
        if let Err(e) = strategies.validate_policy(&mut policy) {
            problems.push(format!("policy {} '{}': {}", policy.id, policy.name, e));
        }
    }

    problems
}

pub fn run(config: &PolyfsConfig) -> anyhow::Result<()> {
    let strategies = super::strategies(config)?;
    let problems = check(config, &strategies);

    if problems.is_empty() {
        info!(policies = config.policies.len(), "configuration valid");
        println!("Configuration OK ({} policies)", config.policies.len());
        return Ok(());
    }

    warn!(problems = problems.len(), "configuration invalid");
    for problem in &problems {
        eprintln!("error: {}", problem);
    }
    anyhow::bail!("{} problem(s) found", problems.len())
}
