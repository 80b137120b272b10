//! Initialize command.

use console::style;

use super::helpers::Runtime;
use crate::config::Settings;

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    let runtime = Runtime::open(settings).await?;

    let enabled = runtime.registry.supported_platforms().len();
    println!(
        "{} Initialized vidlink database at {}",
        style("✓").green(),
        settings.database_url()
    );
    println!("  {} platform(s) enabled", enabled);

    Ok(())
}
