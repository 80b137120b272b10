//! Pure page-scraping steps shared by the extractors.
//!
//! Each step takes page text and returns a candidate or `None`, so the
//! extractors can chain them in priority order and each step can be tested
//! against literal HTML.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

/// Path extensions recognised as playable media.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "webm", "avi", "mov", "flv", "m4v", "wmv", "3gp", "ts", "m3u8", "mpd",
];

/// Keys whose string values commonly hold the media URL in hydration state.
const STATE_MEDIA_KEYS: &[&str] = &["dlink", "video_url", "videoUrl", "file", "src", "url", "stream"];

/// Inline scripts assigning hydration state, checked in order.
const STATE_MARKERS: &[&str] = &[
    "window.__INITIAL_STATE__",
    "window.__PRELOADED_STATE__",
    "window.__APP_STATE__",
    "window.jsData",
    "locals.mset(",
];

/// Markers of anti-bot interstitials.
const CHALLENGE_MARKERS: &[&str] = &[
    "cf-browser-verification",
    "challenge-platform",
    "<title>Just a moment...</title>",
    "g-recaptcha",
    "h-captcha",
];

static PLAYER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // jwplayer / clappr style sources array
        Regex::new(r#"sources\s*:\s*\[\s*\{\s*["']?file["']?\s*:\s*["']([^"']+)["']"#).unwrap(),
        Regex::new(r#"sources\s*:\s*\[\s*["']([^"']+)["']"#).unwrap(),
        // video.js player.src({...})
        Regex::new(r#"player\.src\(\s*\{[^}]*?src\s*:\s*["']([^"']+)["']"#).unwrap(),
        Regex::new(r#"sourcesCode\s*:\s*\[\s*\{\s*src\s*:\s*["']([^"']+)["']"#).unwrap(),
        Regex::new(r#"["']?file["']?\s*:\s*["']([^"']+\.(?:m3u8|mp4)[^"']*)["']"#).unwrap(),
    ]
});

static MEDIA_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:https?:)?(?:\\?/){2}[^"'\s<>()]+?\.(?:m3u8|mp4)(?:\?[^"'\s<>()]*)?"#).unwrap()
});

/// A `<video>`/`<source>` element found in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTag {
    pub src: String,
    pub poster: Option<String>,
}

/// The first hydration JSON blob assigned in an inline script, or the
/// `__NEXT_DATA__` script payload.
pub fn find_initial_state(html: &str) -> Option<Value> {
    for marker in STATE_MARKERS {
        let mut search_from = 0;
        while let Some(pos) = html[search_from..].find(marker) {
            let after = search_from + pos + marker.len();
            if let Some(open) = html[after..].find(['{', '[']) {
                let start = after + open;
                // Only whitespace, `=` or `(` may sit between the marker and the JSON
                let gap = &html[after..start];
                if gap.chars().all(|c| c.is_whitespace() || c == '=' || c == '(' || c == ',') {
                    if let Some(value) = balanced_json(&html[start..])
                        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
                    {
                        return Some(value);
                    }
                }
            }
            search_from = after;
        }
    }

    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script#__NEXT_DATA__"#).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|script| serde_json::from_str(&script.text().collect::<String>()).ok())
}

/// Slice of `text` holding one balanced JSON object or array from its start.
pub fn balanced_json(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Depth-first search for the first value stored under `key`.
pub fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|v| find_key(v, key))),
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

/// A media-looking URL stored anywhere in a hydration state blob.
pub fn media_url_in_state(state: &Value) -> Option<String> {
    STATE_MEDIA_KEYS.iter().find_map(|key| {
        find_key(state, key)
            .and_then(Value::as_str)
            .filter(|s| s.starts_with("http") || s.starts_with("//"))
            .filter(|s| *key == "dlink" || looks_like_media(s))
            .map(str::to_string)
    })
}

/// Media URL from an embedded player configuration.
pub fn find_player_config(script: &str) -> Option<String> {
    PLAYER_PATTERNS
        .iter()
        .find_map(|re| re.captures(script).map(|c| unescape_js(&c[1])))
        .filter(|s| !s.is_empty())
}

/// First `.m3u8`/`.mp4` URL literal in the text.
pub fn find_media_literal(text: &str) -> Option<String> {
    MEDIA_LITERAL
        .find(text)
        .map(|m| unescape_js(m.as_str()))
}

/// `src` of the first `<video>`/`<source>` element, with the video poster.
pub fn find_video_tag(html: &str) -> Option<VideoTag> {
    let document = Html::parse_document(html);
    let poster = Selector::parse("video[poster]").ok().and_then(|sel| {
        document
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr("poster"))
            .map(str::to_string)
    });

    for selector in ["video source[src]", "video[src]", "source[src]"] {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        if let Some(src) = document
            .select(&sel)
            .filter_map(|el| el.value().attr("src"))
            .find(|s| !s.trim().is_empty())
        {
            return Some(VideoTag {
                src: src.trim().to_string(),
                poster,
            });
        }
    }
    None
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

/// Page title: `og:title` first, then `<title>`.
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    if let Some(title) = meta_content(&document, r#"meta[property="og:title"]"#) {
        return Some(title);
    }
    let sel = Selector::parse("title").ok()?;
    document
        .select(&sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn og_image(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    meta_content(&document, r#"meta[property="og:image"]"#)
}

/// Resolve `candidate` against `base`, handling protocol-relative links.
pub fn absolutize(base: &Url, candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    if let Some(rest) = candidate.strip_prefix("//") {
        return Some(format!("{}://{}", base.scheme(), rest));
    }
    base.join(candidate).ok().map(|u| u.to_string())
}

/// Whether the URL path ends in a known video extension.
pub fn is_media_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| has_video_extension(u.path()))
        .unwrap_or(false)
}

pub fn has_video_extension(path: &str) -> bool {
    let path = path.to_ascii_lowercase();
    VIDEO_EXTENSIONS
        .iter()
        .any(|ext| path.ends_with(&format!(".{}", ext)))
}

fn looks_like_media(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.contains(".m3u8") || lower.contains(".mp4") || is_media_url(s)
}

/// Last path segment, percent-decoded.
pub fn filename_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    Some(decoded).filter(|s| !s.is_empty())
}

/// First marker present in the page, if any.
pub fn detect_page_change<'a>(html: &str, markers: &[&'a str]) -> Option<&'a str> {
    markers.iter().copied().find(|m| html.contains(m))
}

/// Whether the page is an anti-bot interstitial.
pub fn is_challenge_page(html: &str) -> bool {
    CHALLENGE_MARKERS.iter().any(|m| html.contains(m))
}

/// Undo the escaping JSON and JS apply to URLs.
pub fn unescape_js(s: &str) -> String {
    s.replace("\\/", "/")
        .replace("\\u0026", "&")
        .replace("\\u002F", "/")
        .replace("&amp;", "&")
}

/// Number that may arrive as a JSON number or numeric string.
pub fn json_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn json_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn json_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
