//! Resilient HTTP fetching.
//!
//! [`Fetcher`] wraps an [`HttpTransport`] with bounded retries, exponential
//! backoff with jitter, TLS profile fallback and user agent rotation. Every
//! call is bounded by a [`Deadline`] shared across all of its attempts.

mod deadline;
mod request;
mod response;
mod transport;
mod user_agent;

pub use deadline::Deadline;
pub use request::{FetchRequest, Method, RequestBody};
pub use response::{parse_content_disposition_filename, FetchResponse};
pub use transport::{HttpTransport, ReqwestTransport, TlsProfile, TransportError, TransportRequest};
pub use user_agent::{UserAgentPool, IMPERSONATE_USER_AGENTS};

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{ErrorKind, ExtractError};
use crate::rate_limit::RateLimiter;

/// Upper bound for a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Retry behaviour of a [`Fetcher`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
    /// Upper bound for one attempt; the deadline may cut it shorter.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_secs(1),
            request_timeout: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1 for the second attempt),
    /// `base * 2^(retry - 1)` capped at one minute. Jitter not included.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

/// All attempts for one request failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{url}: giving up after {attempts} attempt(s): {message}")]
pub struct FetchError {
    pub url: String,
    pub attempts: u32,
    pub last_status: Option<u16>,
    /// Last underlying error or status line.
    pub message: String,
}

impl From<FetchError> for ExtractError {
    fn from(err: FetchError) -> Self {
        let rate_limited = err.last_status == Some(429);
        let extract = ExtractError::new(ErrorKind::ConnectionFailed, err.message);
        if rate_limited {
            extract.with_retry_hint("The host is rate limiting requests")
        } else {
            extract
        }
    }
}

/// HTTP client with retry, backoff and fingerprint rotation.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
    user_agents: UserAgentPool,
    rate_limiter: Option<RateLimiter>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            user_agents: UserAgentPool::default(),
            rate_limiter: None,
        }
    }

    /// Fetcher over the real network.
    pub fn reqwest(policy: RetryPolicy) -> Self {
        Self::new(Arc::new(ReqwestTransport::new()), policy)
    }

    /// Set the user agent configuration (`None`/"impersonate" rotates).
    pub fn with_user_agent(mut self, config: Option<&str>) -> Self {
        self.user_agents = UserAgentPool::new(config);
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Issue `request`, retrying failures until it succeeds, attempts run out
    /// or the deadline would be exceeded.
    pub async fn fetch(
        &self,
        request: &FetchRequest,
        deadline: &Deadline,
    ) -> Result<FetchResponse, FetchError> {
        let mut tls = TlsProfile::Auto;
        let mut user_agent = self.user_agents.next();
        let mut attempts = 0u32;
        let mut last_status = None;
        let mut last_error = String::from("no attempt was made before the deadline");

        for attempt in 1..=self.policy.max_retries.max(1) {
            if attempt > 1 {
                let delay = self.policy.backoff_delay(attempt - 1) + self.policy.jitter();
                if delay >= deadline.remaining() {
                    debug!(
                        "Not retrying {}: backoff {:?} exceeds remaining budget",
                        request.url, delay
                    );
                    break;
                }
                tokio::time::sleep(delay).await;
            }

            let remaining = deadline.remaining();
            if remaining.is_zero() {
                break;
            }

            let domain = match &self.rate_limiter {
                Some(limiter) => limiter.acquire(&request.url, remaining).await,
                None => None,
            };

            let timeout = self.policy.request_timeout.min(deadline.remaining());
            if timeout.is_zero() {
                break;
            }

            let attempt_request = TransportRequest {
                request: request.clone(),
                user_agent: user_agent.clone(),
                tls,
                timeout,
            };
            attempts += 1;

            let outcome = tokio::time::timeout(timeout, self.transport.execute(&attempt_request)).await;
            match outcome {
                Ok(Ok(response)) => {
                    if let (Some(limiter), Some(domain)) = (&self.rate_limiter, &domain) {
                        limiter.report_status(domain, response.status).await;
                    }
                    if response.is_success() || self.accepts(request, response.status) {
                        return Ok(response);
                    }
                    debug!(
                        "Attempt {} for {} {} returned HTTP {}",
                        attempt,
                        request.method.as_str(),
                        request.url,
                        response.status
                    );
                    last_status = Some(response.status);
                    last_error = format!("HTTP {}", response.status);
                }
                Ok(Err(err)) => {
                    debug!(
                        "Attempt {} for {} failed: {}",
                        attempt, request.url, err.message
                    );
                    last_error = err.message;
                    if err.connection_level {
                        tls = tls.next();
                        if self.user_agents.rotates() {
                            user_agent = self.user_agents.next();
                        }
                        debug!(
                            "Switching {} to TLS profile {} with a new client identity",
                            request.url,
                            tls.as_str()
                        );
                    }
                }
                Err(_) => {
                    debug!("Attempt {} for {} timed out after {:?}", attempt, request.url, timeout);
                    last_error = format!("timed out after {:?}", timeout);
                    if self.user_agents.rotates() {
                        user_agent = self.user_agents.next();
                    }
                }
            }
        }

        warn!(
            "Giving up on {} after {} attempt(s): {}",
            request.url, attempts, last_error
        );
        Err(FetchError {
            url: request.url.clone(),
            attempts,
            last_status,
            message: last_error,
        })
    }

    /// GET a page and return its body.
    pub async fn get_text(&self, url: &str, deadline: &Deadline) -> Result<String, FetchError> {
        Ok(self.fetch(&FetchRequest::get(url), deadline).await?.body)
    }

    fn accepts(&self, request: &FetchRequest, status: u16) -> bool {
        request.accept_client_errors && (400..500).contains(&status) && status != 429
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for exercising code that fetches.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    pub enum Scripted {
        Respond(FetchResponse),
        Fail(TransportError),
    }

    /// Replays canned responses per URL prefix and records every request.
    #[derive(Default)]
    pub struct ScriptedTransport {
        routes: Mutex<Vec<(String, VecDeque<Scripted>)>>,
        pub seen: Mutex<Vec<TransportRequest>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a response for URLs starting with `prefix`. The last queued
        /// item repeats once the queue drains.
        pub fn push(&self, prefix: &str, item: Scripted) {
            let mut routes = self.routes.lock().unwrap();
            match routes.iter_mut().find(|(p, _)| p == prefix) {
                Some((_, queue)) => queue.push_back(item),
                None => routes.push((prefix.to_string(), VecDeque::from([item]))),
            }
        }

        pub fn respond(&self, prefix: &str, status: u16, body: &str) {
            self.push(
                prefix,
                Scripted::Respond(FetchResponse::new(status, body, prefix)),
            );
        }

        pub fn fail(&self, prefix: &str, message: &str) {
            self.push(prefix, Scripted::Fail(TransportError::connection(message)));
        }

        pub fn requests(&self) -> Vec<TransportRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn execute(&self, request: &TransportRequest) -> Result<FetchResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            let mut routes = self.routes.lock().unwrap();
            let route = routes
                .iter_mut()
                .filter(|(p, _)| request.request.url.starts_with(p.as_str()))
                .max_by_key(|(p, _)| p.len());
            let Some((_, queue)) = route else {
                return Err(TransportError::connection(format!(
                    "no route for {}",
                    request.request.url
                )));
            };
            let item = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().map(|i| match i {
                    Scripted::Respond(r) => Scripted::Respond(r.clone()),
                    Scripted::Fail(e) => Scripted::Fail(e.clone()),
                })
            };
            match item {
                Some(Scripted::Respond(r)) => Ok(r),
                Some(Scripted::Fail(e)) => Err(e),
                None => Err(TransportError::connection("empty route")),
            }
        }
    }
}
