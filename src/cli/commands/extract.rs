//! Extract command.

use crate::config::Settings;
use crate::models::ExtractOptions;

use super::helpers::{print_result, Runtime};

/// Extract a direct link and print it. Exits non-zero on failure.
pub async fn cmd_extract(
    settings: &Settings,
    url: &str,
    refresh: bool,
    skip_cache: bool,
    json: bool,
) -> anyhow::Result<()> {
    let runtime = Runtime::open(settings).await?;
    let options = ExtractOptions {
        force_refresh: refresh,
        skip_cache,
    };

    let result = runtime.registry.extract_url(url, options).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.to_envelope())?);
    } else {
        print_result(&result);
    }

    match result.error() {
        Some(failure) => Err(anyhow::anyhow!("extraction failed: {}", failure.kind)),
        None => Ok(()),
    }
}
