use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use polyfs_config::{HumanDuration, PolyfsConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "polyfs", version, about = "Multi-backend virtual filesystem tools")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which policy owns a virtual path
    Resolve {
        /// Virtual path to resolve
        path: String,
        /// Print the policy as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the configuration and every policy's settings
    Validate,
    /// Print the OAuth authorization URL for a policy
    AuthUrl {
        /// Policy id
        policy_id: u64,
    },
    /// Produce a signed link token for a local source
    Sign {
        /// Entity source locator
        source: String,
        /// How long the signature stays valid (e.g. 30m, 1h)
        #[arg(long, default_value = "1h")]
        ttl: HumanDuration,
    },
    /// Show effective configuration
    Config,
}

fn find_config() -> Option<PathBuf> {
    // 1. POLYFS_CONFIG environment variable
    if let Ok(path) = std::env::var("POLYFS_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. polyfs.yaml in current directory
    let cwd_config = PathBuf::from("polyfs.yaml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. ~/.config/polyfs/config.yaml
    if let Some(home) = dirs_next::home_dir() {
        let home_config = home.join(".config/polyfs/config.yaml");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.or_else(find_config).context(
        "No configuration file found. Use --config, set POLYFS_CONFIG, or create polyfs.yaml",
    )?;
    let raw = PolyfsConfig::from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    debug!(path = %config_path.display(), policies = raw.policies.len(), "configuration loaded");
    let config = raw.effective();

    match cli.command {
        Commands::Resolve { path, json } => {
            commands::resolve::run(&config, &path, json).await?;
        }
        Commands::Validate => {
            // Before defaults: normalization would hide malformed mount paths.
            commands::validate::run(&raw)?;
        }
        Commands::AuthUrl { policy_id } => {
            commands::auth_url::run(&config, policy_id)?;
        }
        Commands::Sign { source, ttl } => {
            commands::sign::run(&config, &source, ttl)?;
        }
        Commands::Config => {
            commands::config::run(&config)?;
        }
    }

    Ok(())
}
