//! Platform listing command.

use console::style;

use crate::config::Settings;

use super::helpers::truncate;

/// List configured platforms in dispatch order.
pub async fn cmd_platforms(settings: &Settings) -> anyhow::Result<()> {
    println!("\n{}", style("Platforms").bold());
    println!("{}", "-".repeat(72));
    println!(
        "{:<12} {:<14} {:<9} {:<8} Domains",
        "ID", "Name", "Lifetime", "Enabled"
    );
    println!("{}", "-".repeat(72));

    for platform in &settings.platforms {
        let lifetime = match platform.default_link_lifetime {
            0 => "-".to_string(),
            secs => format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60),
        };
        let enabled = if platform.enabled {
            style("yes").green()
        } else {
            style("no").dim()
        };
        println!(
            "{:<12} {:<14} {:<9} {:<8} {}",
            platform.id,
            truncate(&platform.name, 13),
            lifetime,
            enabled,
            truncate(&platform.domain_list().join(", "), 40)
        );
    }

    Ok(())
}
