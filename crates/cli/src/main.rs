//! Sleuth CLI: the main entry point.
//!
//! Commands:
//! - `chat`     : Interactive REPL (the default)
//! - `ask`      : Answer a single query and exit
//! - `scrape`   : Scrape a social-media user's timeline into the store
//! - `timeline` : Print a stored timeline
//! - `store`    : Inspect and maintain stored search summaries
//! - `onboard`  : Write the default config file

use clap::{Parser, Subcommand};
use sleuth_config::AppConfig;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "sleuth",
    about = "Sleuth: research assistant that searches, scrapes and condenses",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read configuration from this file instead of ~/.sleuth/config.toml
    #[arg(short, long, global = true, env = "SLEUTH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,

    /// Answer one query and exit
    Ask {
        /// The query
        #[arg(short, long)]
        message: String,
    },

    /// Scrape a user's timeline into the store
    Scrape {
        /// Handle, with or without a leading @
        handle: String,
    },

    /// Print a user's stored timeline, newest first
    Timeline {
        handle: String,

        /// Show at most this many entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Stored search summaries
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Write the default configuration file
    Onboard,
}

#[derive(Subcommand)]
enum StoreAction {
    /// List stored keys
    List {
        /// Only keys starting with this prefix
        #[arg(short, long)]
        prefix: Option<String>,
    },
    /// Print a stored value
    Get { key: String },
    /// Delete one key
    Delete { key: String },
    /// Delete every key
    Clear {
        /// Required to actually clear
        #[arg(long)]
        confirm: bool,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(&path)?;
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Quiet by default so log lines do not interleave with the REPL
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let path = cli.config;
    let config = || load_config(path.clone()).map_err(|e| format!("Failed to load config: {e}"));

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Onboard => commands::onboard::run()?,
        Commands::Chat => commands::chat::run(config()?).await?,
        Commands::Ask { message } => commands::ask::run(config()?, &message).await?,
        Commands::Scrape { handle } => commands::scrape::run(config()?, &handle).await?,
        Commands::Timeline { handle, limit } => {
            commands::timeline::run(config()?, &handle, limit).await?
        }
        Commands::Store { action } => match action {
            StoreAction::List { prefix } => {
                commands::store::list(config()?, prefix.as_deref()).await?
            }
            StoreAction::Get { key } => commands::store::get(config()?, &key).await?,
            StoreAction::Delete { key } => commands::store::delete(config()?, &key).await?,
            StoreAction::Clear { confirm } => commands::store::clear(config()?, confirm).await?,
        },
    }

    Ok(())
}
