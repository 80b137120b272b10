//! Platform credential commands.

use chrono::Utc;
use console::style;

use crate::config::Settings;
use crate::http_client::Deadline;
use crate::utils::format_timestamp;

use super::helpers::{truncate, Runtime};

/// Show the stored token for `platform` and how old it is.
pub async fn cmd_token_show(settings: &Settings, platform: &str) -> anyhow::Result<()> {
    let runtime = Runtime::open(settings).await?;

    match runtime.registry.tokens().stored(platform).await? {
        Some((token, updated)) => {
            println!("{} {} token: {}", style("✓").green(), platform, truncate(&token, 24));
            match updated {
                Some(at) => {
                    let age = Utc::now() - at;
                    println!(
                        "  Updated {} ({}h{:02}m ago)",
                        format_timestamp(&at),
                        age.num_hours(),
                        age.num_minutes() % 60
                    );
                }
                None => println!("  Update time unknown"),
            }
        }
        None => println!("{} No stored {} token", style("!").yellow(), platform),
    }

    Ok(())
}

/// Resolve a fresh token from the network sources and persist it.
pub async fn cmd_token_refresh(settings: &Settings, platform: &str) -> anyhow::Result<()> {
    let runtime = Runtime::open(settings).await?;
    let deadline = Deadline::after(settings.extract_timeout);

    match runtime.registry.tokens().refresh_token(platform, &deadline).await {
        Some(token) => {
            println!(
                "{} {} token from {}: {}",
                style("✓").green(),
                platform,
                token.source.as_str(),
                truncate(&token.value, 24)
            );
            Ok(())
        }
        None => Err(anyhow::anyhow!("no {} token could be resolved", platform)),
    }
}
