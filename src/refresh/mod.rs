//! Scheduled refresh sweep.
//!
//! Re-extracts stored links that are expired, about to expire, or have not
//! been checked for a while, one at a time with a pause between rows.
//! Permanent failures flag the row for review so it stops being selected.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::{DueReason, ExtractOptions, LinkRecord};
use crate::registry::Registry;
use crate::repository::{DueCriteria, LinkStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    pub enabled: bool,
    /// Time between sweeps, never below `min_interval`.
    pub interval: Duration,
    pub min_interval: Duration,
    /// Links expiring within this window are refreshed early.
    pub lookahead: Duration,
    /// Links not checked for this long are refreshed.
    pub stale_after: Duration,
    /// A row checked this recently is not retried for expiry reasons.
    pub failure_backoff: Duration,
    pub batch_size: usize,
    /// Pause between two rows.
    pub item_delay: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(20 * 60),
            min_interval: Duration::from_secs(15 * 60),
            lookahead: Duration::from_secs(10 * 60),
            stale_after: Duration::from_secs(30 * 60),
            failure_backoff: Duration::from_secs(5 * 60),
            batch_size: 50,
            item_delay: Duration::from_millis(500),
        }
    }
}

impl RefreshConfig {
    pub fn criteria(&self) -> DueCriteria {
        DueCriteria {
            lookahead: chrono::Duration::seconds(self.lookahead.as_secs() as i64),
            stale_after: chrono::Duration::seconds(self.stale_after.as_secs() as i64),
            retry_after: chrono::Duration::seconds(self.failure_backoff.as_secs() as i64),
            batch_size: self.batch_size,
        }
    }
}

/// Counts from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub selected: usize,
    pub expired: usize,
    pub expiring_soon: usize,
    pub stale: usize,
    pub refreshed: usize,
    pub failed: usize,
    /// Rows flagged for manual review after a permanent failure.
    pub flagged: usize,
}

impl SweepReport {
    fn count_reason(&mut self, reason: DueReason) {
        match reason {
            DueReason::Expired => self.expired += 1,
            DueReason::ExpiringSoon => self.expiring_soon += 1,
            DueReason::Stale => self.stale += 1,
        }
    }
}

pub struct RefreshSweep {
    registry: Arc<Registry>,
    links: Arc<dyn LinkStore>,
    config: RefreshConfig,
}

impl RefreshSweep {
    pub fn new(registry: Arc<Registry>, links: Arc<dyn LinkStore>, config: RefreshConfig) -> Self {
        Self {
            registry,
            links,
            config,
        }
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Run one sweep over the due rows.
    pub async fn run_once(&self) -> Result<SweepReport, StoreError> {
        let due = self.links.due_links(Utc::now(), &self.config.criteria()).await?;
        let mut report = SweepReport {
            selected: due.len(),
            ..Default::default()
        };
        info!("Refresh sweep started: {} link(s) due", due.len());

        for (index, (record, reason)) in due.into_iter().enumerate() {
            if index > 0 && !self.config.item_delay.is_zero() {
                tokio::time::sleep(self.config.item_delay).await;
            }
            report.count_reason(reason);
            self.refresh_one(&record, reason, &mut report).await;
        }

        info!(
            "Refresh sweep finished: {} refreshed, {} failed, {} flagged for review",
            report.refreshed, report.failed, report.flagged
        );
        Ok(report)
    }

    async fn refresh_one(&self, record: &LinkRecord, reason: DueReason, report: &mut SweepReport) {
        debug!("Refreshing link {} ({}): {}", record.id, reason.as_str(), record.original_url);
        let result = self
            .registry
            .extract_url(&record.original_url, ExtractOptions::refresh())
            .await;
        let checked_at = Utc::now();

        if let Some(link) = result.link() {
            let expires_at = link.expiry.map(|e| e.expires_at);
            match self
                .links
                .record_success(record.id, &link.direct_link, expires_at, checked_at)
                .await
            {
                Ok(()) => report.refreshed += 1,
                Err(e) => {
                    warn!("Could not store refreshed link {}: {}", record.id, e);
                    report.failed += 1;
                }
            }
            return;
        }

        report.failed += 1;
        let Some(failure) = result.error() else {
            return;
        };
        let permanent = failure.kind.is_permanent();
        warn!(
            "Refresh of link {} failed [{}]: {}",
            record.id, failure.kind, failure.message
        );
        if permanent {
            warn!("Link {} flagged for manual review ({})", record.id, failure.kind);
        }

        match self.links.record_failure(record.id, checked_at, permanent).await {
            Ok(()) if permanent => report.flagged += 1,
            Ok(()) => {}
            Err(e) => warn!("Could not record failure for link {}: {}", record.id, e),
        }
    }

    /// Sweep every `interval` until `shutdown` flips to true or its sender
    /// goes away. The first sweep runs immediately; a sweep in progress is
    /// abandoned between requests when shutdown arrives.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        if !self.config.enabled {
            info!("Refresh sweep disabled");
            return;
        }
        let interval = self.config.interval.max(self.config.min_interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        outcome = self.run_once() => {
                            if let Err(e) = outcome {
                                warn!("Refresh sweep could not select links: {}", e);
                            }
                        }
                        _ = shutdown_requested(&mut shutdown) => {
                            info!("Refresh sweep interrupted, stopping");
                            return;
                        }
                    }
                }
                _ = shutdown_requested(&mut shutdown) => {
                    info!("Refresh sweep stopping");
                    return;
                }
            }
        }
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
