use polyfs_backends::LocalProvider;
use polyfs_config::{HumanDuration, PolyfsConfig};

pub fn run(config: &PolyfsConfig, source: &str, ttl: HumanDuration) -> anyhow::Result<()> {
    let provider = LocalProvider::new(config.local.signing_secret.clone());
    let signature = provider.sign(source, ttl.as_duration())?;
    println!("{}", signature);
    Ok(())
}
