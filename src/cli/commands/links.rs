//! Stored link commands.

use chrono::Utc;
use console::style;

use crate::config::Settings;
use crate::models::ExtractOptions;
use crate::repository::LinkStore;
use crate::utils::format_timestamp;

use super::helpers::{print_result, truncate, Runtime};

/// Register a share link, optionally extracting it right away.
pub async fn cmd_links_add(settings: &Settings, url: &str, now: bool) -> anyhow::Result<()> {
    let runtime = Runtime::open(settings).await?;

    if runtime.registry.descriptor_for(url).is_none() {
        println!(
            "{} No platform claims {}; it will fail until one does",
            style("!").yellow(),
            url
        );
    }

    let record = runtime.links.add_link(url.trim()).await?;
    println!("{} Link #{} stored", style("✓").green(), record.id);

    if now {
        let result = runtime
            .registry
            .extract_url(&record.original_url, ExtractOptions::refresh())
            .await;
        print_result(&result);

        let checked_at = Utc::now();
        match (result.link(), result.error()) {
            (Some(link), _) => {
                let expires_at = link.expiry.map(|e| e.expires_at);
                runtime
                    .links
                    .record_success(record.id, &link.direct_link, expires_at, checked_at)
                    .await?;
            }
            (None, Some(failure)) => {
                runtime
                    .links
                    .record_failure(record.id, checked_at, failure.kind.is_permanent())
                    .await?;
            }
            (None, None) => {}
        }
    }

    Ok(())
}

/// List stored links with their last extraction state.
pub async fn cmd_links_list(settings: &Settings) -> anyhow::Result<()> {
    let runtime = Runtime::open(settings).await?;
    let links = runtime.links.list().await?;

    if links.is_empty() {
        println!(
            "{} No links stored. Add one with 'vidlink links add <url>'.",
            style("!").yellow()
        );
        return Ok(());
    }

    println!("\n{}", style("Links").bold());
    println!("{}", "-".repeat(90));
    println!("{:<5} {:<45} {:<24} State", "ID", "URL", "Expires");
    println!("{}", "-".repeat(90));

    for link in links {
        let expires = match (&link.direct_video_url, link.video_expires_at) {
            (None, _) => "not extracted".to_string(),
            (Some(_), Some(at)) => format_timestamp(&at),
            (Some(_), None) => "never".to_string(),
        };
        let state = if link.needs_review {
            style("review").red()
        } else if !link.is_active {
            style("inactive").dim()
        } else {
            style("active").green()
        };
        println!(
            "{:<5} {:<45} {:<24} {}",
            link.id,
            truncate(&link.original_url, 44),
            expires,
            state
        );
    }

    Ok(())
}
