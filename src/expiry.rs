//! Link expiry normalization.
//!
//! Hosting platforms sign their media URLs with an expiry timestamp, either
//! in a query parameter or in the API response next to the link. This
//! module turns whichever signal is available into one canonical shape.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::utils::format_timestamp;

/// Query parameter names that carry a unix expiry timestamp, checked in order.
pub const EXPIRY_PARAMS: &[&str] = &["expire", "expires", "exp", "expiry", "expiration", "e"];

/// Values further out than this are not treated as timestamps.
const MAX_HORIZON_SECS: i64 = 365 * 24 * 60 * 60;

/// Normalized expiry of a direct link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryInfo {
    pub expires_at: DateTime<Utc>,
    /// Seconds remaining at the time the expiry was computed.
    pub expires_in: i64,
}

impl ExpiryInfo {
    fn at(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            expires_at,
            expires_in: (expires_at - now).num_seconds().max(0),
        }
    }

    /// Expiry `secs` seconds from now. Non-positive lifetimes mean "no expiry".
    pub fn from_lifetime(secs: i64) -> Option<Self> {
        Self::from_lifetime_at(secs, Utc::now())
    }

    pub fn from_lifetime_at(secs: i64, now: DateTime<Utc>) -> Option<Self> {
        if secs <= 0 {
            return None;
        }
        Some(Self::at(now + Duration::seconds(secs), now))
    }

    /// Seconds left relative to `now`, never negative.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn formatted(&self) -> String {
        format_timestamp(&self.expires_at)
    }
}

/// Derive an expiry from the query parameters of a signed URL.
pub fn from_url(url: &str) -> Option<ExpiryInfo> {
    from_url_at(url, Utc::now())
}

/// Same as [`from_url`] against an explicit clock.
pub fn from_url_at(url: &str, now: DateTime<Utc>) -> Option<ExpiryInfo> {
    let parsed = Url::parse(url).ok()?;
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.into_owned()))
        .collect();

    for name in EXPIRY_PARAMS {
        for (key, value) in pairs.iter().filter(|(k, _)| k == name) {
            if let Some(expires_at) = plausible_timestamp(value, now) {
                tracing::trace!("Expiry from '{}' parameter: {}", key, expires_at);
                return Some(ExpiryInfo::at(expires_at, now));
            }
        }
    }

    None
}

/// Derive an expiry from hints in a platform response.
///
/// `expires_at` is an absolute unix timestamp and wins when it lies in the
/// future; otherwise a positive relative `expires_in` is used.
pub fn from_hints(expires_in: Option<i64>, expires_at: Option<i64>) -> Option<ExpiryInfo> {
    from_hints_at(expires_in, expires_at, Utc::now())
}

pub fn from_hints_at(
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    now: DateTime<Utc>,
) -> Option<ExpiryInfo> {
    if let Some(absolute) = expires_at.and_then(|ts| Utc.timestamp_opt(ts, 0).single()) {
        if absolute > now {
            return Some(ExpiryInfo::at(absolute, now));
        }
    }

    expires_in.and_then(|secs| ExpiryInfo::from_lifetime_at(secs, now))
}

fn plausible_timestamp(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let secs: i64 = value.trim().parse().ok()?;
    let now_secs = now.timestamp();
    if secs <= now_secs || secs > now_secs + MAX_HORIZON_SECS {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}
