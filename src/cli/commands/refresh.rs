//! Refresh sweep command.

use console::style;
use tokio::sync::watch;

use crate::config::Settings;
use crate::refresh::RefreshSweep;

use super::helpers::Runtime;

/// Run one sweep, or keep sweeping until Ctrl+C in daemon mode.
pub async fn cmd_refresh(settings: &Settings, daemon: bool) -> anyhow::Result<()> {
    let runtime = Runtime::open(settings).await?;
    let sweep = RefreshSweep::new(
        runtime.registry.clone(),
        runtime.links.clone(),
        settings.refresh.clone(),
    );

    if !daemon {
        let report = sweep.run_once().await?;
        println!(
            "{} {} due ({} expired, {} expiring, {} stale)",
            style("→").cyan(),
            report.selected,
            report.expired,
            report.expiring_soon,
            report.stale
        );
        println!(
            "  {} refreshed, {} failed, {} flagged for review",
            style(report.refreshed).green(),
            style(report.failed).red(),
            report.flagged
        );
        return Ok(());
    }

    if !settings.refresh.enabled {
        println!(
            "{} Refresh is disabled in the configuration",
            style("!").yellow()
        );
        return Ok(());
    }

    let janitor = runtime.registry.cache().spawn_janitor();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    println!(
        "{} Refreshing every {}s. Press Ctrl+C to stop",
        style("→").cyan(),
        settings.refresh.interval.as_secs()
    );

    let worker = tokio::spawn(async move { sweep.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    let _ = shutdown_tx.send(true);
    worker.await?;
    janitor.abort();

    println!("{} Stopped", style("✓").green());
    Ok(())
}
