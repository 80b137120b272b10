//! The network seam beneath the fetcher.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::redirect::Policy;
use reqwest::tls::Version;
use reqwest::Client;
use thiserror::Error;

use super::request::{FetchRequest, Method, RequestBody};
use super::response::FetchResponse;

/// TLS negotiation preference, tried in ladder order after connection failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlsProfile {
    Auto,
    Tls12,
    Tls13,
    Tls10Plus,
}

impl TlsProfile {
    pub const LADDER: [TlsProfile; 4] = [Self::Auto, Self::Tls12, Self::Tls13, Self::Tls10Plus];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Tls12 => "tls1.2",
            Self::Tls13 => "tls1.3",
            Self::Tls10Plus => "tls1.0+",
        }
    }

    /// The next rung, wrapping back to `Auto` after the last.
    pub fn next(&self) -> Self {
        let idx = Self::LADDER.iter().position(|p| p == self).unwrap_or(0);
        Self::LADDER[(idx + 1) % Self::LADDER.len()]
    }
}

/// A single attempt handed to the transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub request: FetchRequest,
    pub user_agent: String,
    pub tls: TlsProfile,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    /// Failed below HTTP (connect, TLS handshake, reset) rather than mid-body.
    pub connection_level: bool,
}

impl TransportError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            connection_level: true,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            connection_level: false,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        Self {
            connection_level: err.is_connect() || err.is_timeout(),
            message: err.to_string(),
        }
    }
}

/// Executes one HTTP exchange. No retry logic lives here.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: &TransportRequest) -> Result<FetchResponse, TransportError>;
}

/// Production transport backed by reqwest, one client per TLS profile.
#[derive(Default)]
pub struct ReqwestTransport {
    clients: Mutex<HashMap<TlsProfile, Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_client(tls: TlsProfile) -> Result<Client, TransportError> {
        let mut builder = Client::builder()
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .redirect(Policy::limited(10));

        builder = match tls {
            TlsProfile::Auto => builder,
            TlsProfile::Tls12 => builder
                .min_tls_version(Version::TLS_1_2)
                .max_tls_version(Version::TLS_1_2),
            TlsProfile::Tls13 => builder.min_tls_version(Version::TLS_1_3),
            TlsProfile::Tls10Plus => builder.min_tls_version(Version::TLS_1_0),
        };

        builder
            .build()
            .map_err(|e| TransportError::other(format!("failed to build HTTP client: {}", e)))
    }

    fn client_for(&self, tls: TlsProfile) -> Result<Client, TransportError> {
        if let Ok(clients) = self.clients.lock() {
            if let Some(client) = clients.get(&tls) {
                return Ok(client.clone());
            }
        }

        let client = Self::build_client(tls)?;
        if let Ok(mut clients) = self.clients.lock() {
            clients.insert(tls, client.clone());
        }
        Ok(client)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, req: &TransportRequest) -> Result<FetchResponse, TransportError> {
        let request = &req.request;
        let client = self.client_for(req.tls)?;

        let mut builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Head => client.head(&request.url),
            Method::Post => client.post(&request.url),
        };
        builder = builder
            .header(USER_AGENT, req.user_agent.as_str())
            .timeout(req.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            Some(RequestBody::Form(fields)) => builder.form(fields),
            None => builder,
        };

        let response = builder.send().await.map_err(TransportError::from_reqwest)?;

        let status = response.status().as_u16();
        let effective_url = response.url().to_string();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), v.to_string());
            }
        }

        let body = if request.method == Method::Head {
            String::new()
        } else {
            response.text().await.map_err(TransportError::from_reqwest)?
        };

        Ok(FetchResponse {
            status,
            headers,
            body,
            effective_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_ladder_order() {
        assert_eq!(TlsProfile::Auto.next(), TlsProfile::Tls12);
        assert_eq!(TlsProfile::Tls12.next(), TlsProfile::Tls13);
        assert_eq!(TlsProfile::Tls13.next(), TlsProfile::Tls10Plus);
        assert_eq!(TlsProfile::Tls10Plus.next(), TlsProfile::Auto);
    }

    #[test]
    fn test_clients_build_for_every_profile() {
        let transport = ReqwestTransport::new();
        for tls in TlsProfile::LADDER {
            assert!(transport.client_for(tls).is_ok());
        }
    }
}
