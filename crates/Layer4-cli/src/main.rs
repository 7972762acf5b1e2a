//! Agora CLI - Main entry point

mod cli;
mod plugins;

use agora_foundation::{AgoraConfig, PluginScope};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Agora - plugin management for the terminal
#[derive(Parser, Debug)]
#[command(name = "agora")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Additional plugin root (local scope, highest priority)
    #[arg(long, global = true)]
    plugins_dir: Option<PathBuf>,

    /// Keep records in memory only
    #[arg(long, global = true)]
    in_memory: bool,

    /// Print raw JSON responses
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List discovered plugins and their state
    List,
    /// Scan the search paths
    Discover {
        /// Clear discovery records before scanning
        #[arg(short, long)]
        force: bool,
    },
    /// Show discovery status and counts
    Status,
    /// Install a discovered plugin
    Install { name: String },
    /// Uninstall a plugin
    Uninstall { name: String },
    /// Enable an installed plugin
    Enable { name: String },
    /// Disable a plugin
    Disable { name: String },
    /// Run the security check for a plugin
    Check { name: String },
    /// Plugin configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List registered channels
    Channels,
    /// Rebuild the channel registry from installation records
    Reconcile,
    /// Send through a registered SMS channel
    Sms {
        #[command(subcommand)]
        action: SmsAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show config groups
    Get { name: String },
    /// Set values (`key=value`, value parsed as JSON when possible)
    Set {
        name: String,
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Restore every entry to its default
    Reset { name: String },
}

#[derive(Subcommand, Debug)]
pub enum SmsAction {
    /// Send a templated message
    Send {
        /// Channel key (e.g. "log", "plugin.console-sms.sms")
        #[arg(short, long, default_value = "log")]
        channel: String,
        destination: String,
        template: String,
        /// Template parameters (`key=value`)
        params: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = AgoraConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        AgoraConfig::default()
    });

    if let Some(dir) = &args.plugins_dir {
        config = config.search_path(dir.clone(), PluginScope::Local);
    }
    if args.in_memory {
        config = config.in_memory_storage();
    }

    // Initialize logging
    let log_level = if args.debug {
        "debug".to_string()
    } else {
        config.logging.level.clone().unwrap_or_else(|| "warn".to_string())
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let runtime = cli::Runtime::start(&config).await?;
    let response = runtime.execute(args.command).await?;
    cli::print_response(&response, args.json)?;

    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_set() {
        let args = Args::parse_from(["agora", "config", "set", "sms", "sign_name=Shop", "limit=5"]);
        match args.command {
            Command::Config {
                action: ConfigAction::Set { name, values },
            } => {
                assert_eq!(name, "sms");
                assert_eq!(values, vec!["sign_name=Shop", "limit=5"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["agora", "list", "--in-memory", "--plugins-dir", "/tmp/p"]);
        assert!(args.in_memory);
        assert_eq!(args.plugins_dir, Some(PathBuf::from("/tmp/p")));
    }
}
