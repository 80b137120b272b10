//! Shared helper functions for CLI commands.

use std::sync::Arc;

use anyhow::Context;
use console::style;

use crate::cache::ExtractionCache;
use crate::config::Settings;
use crate::models::ExtractionResult;
use crate::registry::Registry;
use crate::repository::{run_migrations, DieselLinkStore, DieselSettingsStore, SqlitePool};
use crate::token::TokenChain;
use crate::utils::format_size;

/// Stores and pipeline wired against the configured database.
pub struct Runtime {
    pub links: Arc<DieselLinkStore>,
    pub registry: Arc<Registry>,
}

impl Runtime {
    /// Open the database, creating the schema if needed, and build the registry.
    pub async fn open(settings: &Settings) -> anyhow::Result<Self> {
        if settings.database_url.is_none() {
            settings
                .ensure_directories()
                .with_context(|| format!("Cannot create {}", settings.data_dir.display()))?;
        }

        let pool = SqlitePool::new(&settings.database_url());
        run_migrations(&pool)
            .await
            .with_context(|| format!("Cannot prepare database {}", pool.database_url()))?;

        let links = Arc::new(DieselLinkStore::new(pool.clone()));
        let settings_store = Arc::new(DieselSettingsStore::new(pool));

        let fetcher = settings.fetcher();
        let tokens = TokenChain::new(settings_store.clone(), fetcher.clone(), settings.token.clone());
        let cache = Arc::new(ExtractionCache::new(settings.cache.clone()));
        let registry = Arc::new(Registry::new(
            settings.platforms.clone(),
            fetcher,
            tokens,
            cache,
            settings.extract_timeout,
        ));

        Ok(Self { links, registry })
    }
}

/// Truncate a string to a maximum display width.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Print a human-readable summary of an extraction result.
pub fn print_result(result: &ExtractionResult) {
    let platform = result.platform.as_deref().unwrap_or("-");

    if let Some(link) = result.link() {
        let origin = if result.cached { " (cached)" } else { "" };
        println!(
            "{} {} via {}{}",
            style("✓").green(),
            style(&link.filename).bold(),
            platform,
            origin
        );
        println!("  {}", link.direct_link);
        if let Some(size) = link.size_bytes {
            println!("  Size:    {}", format_size(size));
        }
        println!("  Quality: {}", link.quality);
        match &link.expiry {
            Some(expiry) => println!("  Expires: {}", expiry.formatted()),
            None => println!("  Expires: never"),
        }
        if link.low_confidence {
            println!("  {} Link could not be verified", style("!").yellow());
        }
        if result.refresh_hint {
            println!("  {} Close to expiry, consider --refresh", style("!").yellow());
        }
        return;
    }

    if let Some(failure) = result.error() {
        eprintln!(
            "{} {} [{}]: {}",
            style("✗").red(),
            platform,
            failure.kind,
            failure.message
        );
        if let Some(hint) = &failure.hint {
            eprintln!("  {}", hint);
        }
        if let Some(retry) = &failure.retry_hint {
            eprintln!("  Retry: {}", retry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("https://example.com/long/path", 12), "https://e...");
    }
}
