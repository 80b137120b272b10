//! Built-in platform descriptor table and its configuration form.

use serde::{Deserialize, Serialize};

use crate::models::{DomainMatch, PlatformDescriptor};

/// One `[[platforms]]` entry. Omitted fields take the built-in values for
/// the same id, or generic defaults for unknown ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Domain substrings; `["*"]` makes the platform a self-validating wildcard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Extractor variant id. Defaults to `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_link_lifetime: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_credential: Option<bool>,
}

impl PlatformConfig {
    /// Resolve against the built-in descriptor with the same id, if any.
    pub fn resolve(&self, builtins: &[PlatformDescriptor]) -> PlatformDescriptor {
        let base = builtins.iter().find(|d| d.id == self.id);
        let extractor = self
            .extractor
            .clone()
            .or_else(|| base.map(|b| b.extractor.clone()))
            .unwrap_or_else(|| self.id.clone());

        let domains = match &self.domains {
            Some(list) if list.iter().any(|d| d == "*") => DomainMatch::AnyDomain,
            Some(list) => DomainMatch::Domains(list.clone()),
            None => base
                .map(|b| b.domains.clone())
                .unwrap_or_else(|| DomainMatch::Domains(Vec::new())),
        };

        PlatformDescriptor {
            id: self.id.clone(),
            name: self
                .name
                .clone()
                .or_else(|| base.map(|b| b.name.clone()))
                .unwrap_or_else(|| self.id.clone()),
            domains,
            enabled: self.enabled.or(base.map(|b| b.enabled)).unwrap_or(true),
            extractor,
            default_link_lifetime: self
                .default_link_lifetime
                .or(base.map(|b| b.default_link_lifetime))
                .unwrap_or(3600),
            icon: self.icon.clone().or_else(|| base.and_then(|b| b.icon.clone())),
            requires_credential: self
                .requires_credential
                .or(base.map(|b| b.requires_credential))
                .unwrap_or(false),
        }
    }
}

fn builtin(
    id: &str,
    name: &str,
    domains: &[&str],
    lifetime: u64,
    icon: &str,
) -> PlatformDescriptor {
    PlatformDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        domains: DomainMatch::Domains(domains.iter().map(|d| d.to_string()).collect()),
        enabled: true,
        extractor: id.to_string(),
        default_link_lifetime: lifetime,
        icon: Some(icon.to_string()),
        requires_credential: false,
    }
}

/// The descriptor table used when no platforms are configured. Order matters:
/// dispatch takes the first concrete match, and the wildcard comes last.
pub fn default_platforms() -> Vec<PlatformDescriptor> {
    let mut terabox = builtin(
        "terabox",
        "TeraBox",
        &[
            "terabox.com",
            "terabox.app",
            "terabox.fun",
            "teraboxapp.com",
            "teraboxlink.com",
            "terasharelink.com",
            "1024terabox.com",
            "1024tera.com",
            "4funbox.com",
            "mirrobox.com",
            "nephobox.com",
            "momerybox.com",
            "tibibox.com",
            "freeterabox.com",
        ],
        4 * 3600,
        "terabox.svg",
    );
    terabox.requires_credential = true;

    vec![
        terabox,
        builtin("streamtape", "Streamtape", &["streamtape.com", "streamtape.to", "streamtape.net", "strtape.cloud", "streamta.pe", "stape.fun"], 2 * 3600, "streamtape.svg"),
        builtin(
            "doodstream",
            "DoodStream",
            &["doodstream.com", "dood.to", "dood.so", "dood.la", "dood.li", "dood.ws", "dood.watch", "dood.wf", "dood.pm", "dood.re", "dood.yt", "ds2play.com", "d0000d.com", "d000d.com", "doods.pro"],
            2 * 3600,
            "doodstream.svg",
        ),
        builtin("mixdrop", "MixDrop", &["mixdrop.co", "mixdrop.to", "mixdrop.ch", "mixdrop.bz", "mixdrop.ag", "mixdrp.to", "m1xdrop.com"], 2 * 3600, "mixdrop.svg"),
        builtin("filemoon", "Filemoon", &["filemoon.sx", "filemoon.to", "filemoon.in", "filemoon.nl", "kerapoxy.cc"], 3 * 3600, "filemoon.svg"),
        builtin("streamwish", "StreamWish", &["streamwish.to", "streamwish.com", "wishembed.pro", "sfastwish.com", "awish.pro", "embedwish.com", "strwish.com"], 3 * 3600, "streamwish.svg"),
        builtin("vidoza", "Vidoza", &["vidoza.net", "vidoza.co"], 4 * 3600, "vidoza.svg"),
        builtin("mp4upload", "Mp4Upload", &["mp4upload.com"], 2 * 3600, "mp4upload.svg"),
        builtin("krakenfiles", "KrakenFiles", &["krakenfiles.com"], 4 * 3600, "krakenfiles.svg"),
        builtin("gofile", "Gofile", &["gofile.io"], 4 * 3600, "gofile.svg"),
        builtin("pixeldrain", "Pixeldrain", &["pixeldrain.com", "pixeldra.in"], 0, "pixeldrain.svg"),
        PlatformDescriptor {
            id: "direct".to_string(),
            name: "Direct".to_string(),
            domains: DomainMatch::AnyDomain,
            enabled: true,
            extractor: "direct".to_string(),
            default_link_lifetime: 0,
            icon: Some("link.svg".to_string()),
            requires_credential: false,
        },
    ]
}
