//! Static platform descriptors.

use serde::{Deserialize, Serialize};

/// How a platform claims URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainMatch {
    /// Host contains one of these substrings.
    Domains(Vec<String>),
    /// Any host; the extractor decides via URL validation.
    AnyDomain,
}

/// A supported hosting platform, loaded once from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    pub id: String,
    pub name: String,
    pub domains: DomainMatch,
    pub enabled: bool,
    /// Extractor variant id.
    pub extractor: String,
    /// Seconds a fresh link is assumed valid when it carries no expiry. 0 = durable.
    pub default_link_lifetime: u64,
    pub icon: Option<String>,
    pub requires_credential: bool,
}

impl PlatformDescriptor {
    pub fn is_wildcard(&self) -> bool {
        matches!(self.domains, DomainMatch::AnyDomain)
    }

    /// Whether `host` falls under one of this platform's domain patterns.
    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        match &self.domains {
            DomainMatch::Domains(patterns) => patterns
                .iter()
                .any(|p| !p.is_empty() && host.contains(&p.to_ascii_lowercase())),
            DomainMatch::AnyDomain => false,
        }
    }

    pub fn domain_list(&self) -> Vec<String> {
        match &self.domains {
            DomainMatch::Domains(d) => d.clone(),
            DomainMatch::AnyDomain => vec!["*".to_string()],
        }
    }
}
