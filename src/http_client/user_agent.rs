//! Client identity strings and their rotation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;

/// Real browser user agents used for rotation.
pub const IMPERSONATE_USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    // Chrome on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:132.0) Gecko/20100101 Firefox/132.0",
    // Firefox on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
    // Safari on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    // Edge on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
    // Chrome on Android
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Mobile Safari/537.36",
];

/// Rotating source of user agents shared by clones of a fetcher.
///
/// A custom user agent is never rotated.
#[derive(Debug, Clone)]
pub struct UserAgentPool {
    custom: Option<String>,
    cursor: Arc<AtomicUsize>,
}

impl UserAgentPool {
    pub fn new(config: Option<&str>) -> Self {
        let custom = match config {
            None | Some("impersonate") => None,
            Some(custom) => Some(custom.to_string()),
        };
        let start = rand::rng().random_range(0..IMPERSONATE_USER_AGENTS.len());
        Self {
            custom,
            cursor: Arc::new(AtomicUsize::new(start)),
        }
    }

    /// The next user agent in rotation.
    pub fn next(&self) -> String {
        if let Some(custom) = &self.custom {
            return custom.clone();
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        IMPERSONATE_USER_AGENTS[idx % IMPERSONATE_USER_AGENTS.len()].to_string()
    }

    pub fn rotates(&self) -> bool {
        self.custom.is_none()
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self::new(None)
    }
}
