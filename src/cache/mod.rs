//! TTL cache for extraction results.
//!
//! Entries are whole [`ExtractionResult`] snapshots replaced on every
//! successful extraction. Expired entries are dropped when read and by a
//! periodic janitor sweep.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use crate::models::ExtractionResult;

/// Cache behaviour.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub default_ttl: Duration,
    /// Hits closer than this to expiry carry a refresh hint.
    pub refresh_before_expiry: Duration,
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(3600),
            refresh_before_expiry: Duration::from_secs(600),
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: ExtractionResult,
    cached_at: DateTime<Utc>,
    /// `None` when no expiry is tracked.
    expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Cache key for a request URL: the URL without its fragment, hashed.
pub fn key_for(url: &str) -> String {
    let normalized = match Url::parse(url.trim()) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.trim().to_string(),
    };
    let digest = Sha256::digest(normalized.as_bytes());
    format!("extract:{}", hex::encode(digest))
}

/// In-process extraction cache.
pub struct ExtractionCache {
    config: CacheConfig,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ExtractionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn get(&self, key: &str) -> Option<ExtractionResult> {
        self.get_at(key, Utc::now())
    }

    /// Look up `key` as of `now`, deleting it if it has expired.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<ExtractionResult> {
        if !self.config.enabled {
            return None;
        }

        let entry = self
            .entries
            .read()
            .ok()
            .and_then(|guard| guard.get(key).cloned())?;

        if entry.is_expired_at(now) {
            if let Ok(mut guard) = self.entries.write() {
                // Only drop the entry we judged expired, not a fresher replacement
                if guard.get(key).is_some_and(|e| e.is_expired_at(now)) {
                    guard.remove(key);
                }
            }
            debug!("Cache entry {} expired on read", key);
            return None;
        }

        let refresh_window = chrono::Duration::from_std(self.config.refresh_before_expiry)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let mut result = entry.payload;
        result.cached = true;
        result.cached_at = Some(entry.cached_at);
        result.refresh_hint = entry
            .expires_at
            .is_some_and(|at| at - now < refresh_window);
        Some(result)
    }

    /// Store `result` for `ttl`. A zero TTL tracks no expiry.
    pub fn set(&self, key: &str, result: &ExtractionResult, ttl: Duration) {
        self.set_at(key, result, ttl, Utc::now());
    }

    pub fn set_at(&self, key: &str, result: &ExtractionResult, ttl: Duration, now: DateTime<Utc>) {
        if !self.config.enabled {
            return;
        }

        let expires_at = if ttl.is_zero() {
            None
        } else {
            chrono::Duration::from_std(ttl).ok().map(|d| now + d)
        };

        let mut payload = result.clone();
        payload.cached = false;
        payload.cached_at = None;
        payload.refresh_hint = false;

        if let Ok(mut guard) = self.entries.write() {
            guard.insert(
                key.to_string(),
                CacheEntry {
                    payload,
                    cached_at: now,
                    expires_at,
                },
            );
        }
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.entries
            .write()
            .map(|mut guard| guard.remove(key).is_some())
            .unwrap_or(false)
    }

    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    /// Delete every entry past expiry, read or not.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        match self.entries.write() {
            Ok(mut guard) => {
                let before = guard.len();
                guard.retain(|_, entry| !entry.is_expired_at(now));
                before - guard.len()
            }
            Err(_) => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `cleanup_interval`.
    pub fn spawn_janitor(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let period = self.config.cleanup_interval.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = cache.sweep_expired();
                debug!("Cache janitor evicted {} entries", evicted);
            }
        })
    }
}

impl Default for ExtractionCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
