//! Adaptive per-domain rate limiter.
//!
//! Spaces out requests to the same host and widens the gap when a host
//! answers 429/503, recovering gradually once requests succeed again.

mod domain_state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use domain_state::DomainState;

/// Rate limiter tuning.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Delay between requests to one domain when not backing off.
    pub base_delay: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub recovery_multiplier: f64,
    /// Successes needed before the delay is reduced again.
    pub recovery_threshold: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::ZERO,
            min_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.8,
            recovery_threshold: 5,
        }
    }
}

impl RateLimitConfig {
    pub fn with_base_delay(base_delay: Duration) -> Self {
        Self {
            base_delay,
            ..Default::default()
        }
    }
}

/// Adaptive rate limiter that tracks per-domain request timing.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    domains: Arc<RwLock<HashMap<String, DomainState>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            domains: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn extract_domain(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|s| s.to_ascii_lowercase()))
    }

    /// Wait until the domain is ready, then mark a request as started.
    ///
    /// Never waits longer than `budget`; returns the domain for later reports.
    pub async fn acquire(&self, url: &str, budget: Duration) -> Option<String> {
        let domain = Self::extract_domain(url)?;

        let wait_time = {
            let domains = self.domains.read().await;
            domains
                .get(&domain)
                .map(|s| s.time_until_ready())
                .unwrap_or(Duration::ZERO)
        };

        if wait_time > Duration::ZERO {
            let wait_time = wait_time.min(budget);
            debug!("Rate limiting {}: waiting {:?}", domain, wait_time);
            tokio::time::sleep(wait_time).await;
        }

        let mut domains = self.domains.write().await;
        let state = domains
            .entry(domain.clone())
            .or_insert_with(|| DomainState::new(self.config.base_delay));
        state.last_request = Some(Instant::now());
        state.total_requests += 1;

        Some(domain)
    }

    /// Feed a response status back into the limiter.
    pub async fn report_status(&self, domain: &str, status: u16) {
        match status {
            429 | 503 => self.report_rate_limit(domain, status).await,
            500..=599 => self.report_server_error(domain).await,
            200..=399 => self.report_success(domain).await,
            _ => {}
        }
    }

    pub async fn report_success(&self, domain: &str) {
        let mut domains = self.domains.write().await;
        let Some(state) = domains.get_mut(domain) else {
            return;
        };
        state.consecutive_successes += 1;

        if state.in_backoff && state.consecutive_successes >= self.config.recovery_threshold {
            let reduced = state.current_delay.mul_f64(self.config.recovery_multiplier);
            state.current_delay = reduced.max(self.config.min_delay);

            if state.current_delay <= self.config.base_delay.max(self.config.min_delay) {
                state.in_backoff = false;
                state.current_delay = self.config.base_delay;
                info!("Domain {} recovered from rate limit backoff", domain);
            } else {
                debug!("Domain {} delay reduced to {:?}", domain, state.current_delay);
            }
            state.consecutive_successes = 0;
        }
    }

    /// Definite rate limit (429 or 503); increases the delay.
    pub async fn report_rate_limit(&self, domain: &str, status_code: u16) {
        let mut domains = self.domains.write().await;
        let Some(state) = domains.get_mut(domain) else {
            return;
        };
        state.rate_limit_hits += 1;
        state.consecutive_successes = 0;
        state.in_backoff = true;

        let grown = state
            .current_delay
            .max(self.config.min_delay)
            .mul_f64(self.config.backoff_multiplier);
        state.current_delay = grown.min(self.config.max_delay);

        warn!(
            "Rate limited by {} (HTTP {}, {} of {} requests), backing off to {:?}",
            domain, status_code, state.rate_limit_hits, state.total_requests, state.current_delay
        );
    }

    /// Other 5xx responses; mild backoff.
    pub async fn report_server_error(&self, domain: &str) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            let grown = state.current_delay.max(self.config.min_delay).mul_f64(1.5);
            state.current_delay = grown.min(self.config.max_delay);
            debug!(
                "Server error for {}, delay increased to {:?}",
                domain, state.current_delay
            );
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn state_of(limiter: &RateLimiter, domain: &str) -> DomainState {
        limiter.domains.read().await.get(domain).cloned().unwrap()
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            RateLimiter::extract_domain("https://WWW.TeraBox.com/s/1abc"),
            Some("www.terabox.com".to_string())
        );
        assert_eq!(RateLimiter::extract_domain("not a url"), None);
    }

    #[tokio::test]
    async fn test_backoff_on_rate_limit() {
        let limiter = RateLimiter::with_config(RateLimitConfig {
            base_delay: Duration::from_millis(100),
            min_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            ..Default::default()
        });

        limiter.acquire("https://example.com/1", Duration::from_secs(5)).await;
        limiter.report_status("example.com", 429).await;

        let domain_stats = state_of(&limiter, "example.com").await;
        assert!(domain_stats.current_delay >= Duration::from_millis(200));
        assert!(domain_stats.in_backoff);
        assert_eq!(domain_stats.rate_limit_hits, 1);
    }

    #[tokio::test]
    async fn test_recovers_after_successes() {
        let limiter = RateLimiter::with_config(RateLimitConfig {
            base_delay: Duration::from_millis(100),
            min_delay: Duration::from_millis(100),
            recovery_multiplier: 0.5,
            recovery_threshold: 2,
            ..Default::default()
        });

        limiter.acquire("https://example.com/1", Duration::ZERO).await;
        limiter.report_rate_limit("example.com", 503).await;
        for _ in 0..2 {
            limiter.report_success("example.com").await;
        }

        let domain_stats = state_of(&limiter, "example.com").await;
        assert!(!domain_stats.in_backoff);
        assert_eq!(domain_stats.current_delay, Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_no_longer_than_budget() {
        let limiter = RateLimiter::with_config(RateLimitConfig::with_base_delay(Duration::from_secs(10)));
        limiter.acquire("https://example.com/a", Duration::from_secs(30)).await;

        let start = Instant::now();
        limiter.acquire("https://example.com/b", Duration::from_secs(2)).await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_secs(3));
    }
}
