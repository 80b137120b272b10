//! Unpacker for `eval(function(p,a,c,k,e,d){...})` packed scripts.
//!
//! Several streaming hosts hide their player setup behind this packer. The
//! payload is a template whose word tokens are indexes, written in base
//! `a`, into a `|`-separated dictionary.

use std::sync::LazyLock;

use regex::{Captures, Regex};

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

static PACKED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\}\s*\(\s*'(.*?)'\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*'(.*?)'\.split\(\s*'\|'\s*\)"#)
        .unwrap()
});

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").unwrap());

/// Decode `token` written in `radix` (up to 62) using the packer alphabet.
fn decode_base(token: &str, radix: usize) -> Option<usize> {
    if !(2..=ALPHABET.len()).contains(&radix) {
        return None;
    }
    let digits = &ALPHABET[..radix];
    token.bytes().try_fold(0usize, |acc, b| {
        let digit = digits.iter().position(|d| *d == b)?;
        acc.checked_mul(radix)?.checked_add(digit)
    })
}

/// Expand one packed payload.
pub fn unpack(payload: &str, radix: usize, count: usize, words: &[&str]) -> String {
    let payload = payload.replace("\\'", "'").replace("\\\\", "\\");
    WORD.replace_all(&payload, |caps: &Captures| {
        let token = &caps[0];
        match decode_base(token, radix) {
            Some(idx) if idx < count.max(words.len()) => match words.get(idx) {
                Some(word) if !word.is_empty() => word.to_string(),
                _ => token.to_string(),
            },
            _ => token.to_string(),
        }
    })
    .into_owned()
}

/// Every packed script in `html`, unpacked.
pub fn unpack_all(html: &str) -> Vec<String> {
    PACKED
        .captures_iter(html)
        .filter_map(|caps| {
            let radix: usize = caps[2].parse().ok()?;
            let count: usize = caps[3].parse().ok()?;
            let words: Vec<&str> = caps.get(4)?.as_str().split('|').collect();
            Some(unpack(&caps[1], radix, count, &words))
        })
        .collect()
}
