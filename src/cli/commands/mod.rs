//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod extract;
mod helpers;
mod init;
mod links;
mod platforms;
mod refresh;
mod serve;
mod token;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::load_settings;

#[derive(Parser)]
#[command(name = "vidlink")]
#[command(about = "Direct video link extraction for file hosting platforms")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Extract a direct video link from a share URL
    Extract {
        /// Share or embed URL
        url: String,
        /// Ignore any cached result
        #[arg(long)]
        refresh: bool,
        /// Neither read nor write the cache
        #[arg(long)]
        skip_cache: bool,
        /// Print the JSON envelope instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// List supported platforms
    Platforms,

    /// Manage stored links
    Links {
        #[command(subcommand)]
        command: LinkCommands,
    },

    /// Refresh stored links that are expired, expiring or stale
    Refresh {
        /// Keep sweeping on the configured interval until interrupted
        #[arg(long)]
        daemon: bool,
    },

    /// Inspect or refresh platform credentials
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Start the HTTP server
    Serve {
        /// Address to bind to: port, host, or host:port
        #[arg(short, long, default_value = "127.0.0.1:3030")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum LinkCommands {
    /// Register a share link for periodic refresh
    Add {
        /// Share URL
        url: String,
        /// Extract immediately instead of waiting for the next sweep
        #[arg(long)]
        now: bool,
    },
    /// List stored links
    List,
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Show the stored token for a platform
    Show {
        #[arg(default_value = "terabox")]
        platform: String,
    },
    /// Fetch a fresh token from the network sources and store it
    Refresh {
        #[arg(default_value = "terabox")]
        platform: String,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (settings, _config) = load_settings(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Extract {
            url,
            refresh,
            skip_cache,
            json,
        } => extract::cmd_extract(&settings, &url, refresh, skip_cache, json).await,
        Commands::Platforms => platforms::cmd_platforms(&settings).await,
        Commands::Links { command } => match command {
            LinkCommands::Add { url, now } => links::cmd_links_add(&settings, &url, now).await,
            LinkCommands::List => links::cmd_links_list(&settings).await,
        },
        Commands::Refresh { daemon } => refresh::cmd_refresh(&settings, daemon).await,
        Commands::Token { command } => match command {
            TokenCommands::Show { platform } => token::cmd_token_show(&settings, &platform).await,
            TokenCommands::Refresh { platform } => {
                token::cmd_token_refresh(&settings, &platform).await
            }
        },
        Commands::Serve { bind } => serve::cmd_serve(&settings, &bind).await,
    }
}
