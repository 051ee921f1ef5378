//! Shared utilities for resolver modules: host normalization, URL joins, and common regexes.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Normalizes a host string: trim, strip leading "www.", trailing '.', and lowercases.
#[must_use]
pub fn canonical_host(host: &str) -> String {
    host.trim()
        .trim_start_matches("www.")
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Parses `url_or_host` as a URL and returns the canonical host, or normalizes it as a bare host string.
#[must_use]
pub fn parse_host_or_fallback(url_or_host: &str) -> String {
    Url::parse(url_or_host)
        .ok()
        .and_then(|url| url.host_str().map(canonical_host))
        .unwrap_or_else(|| canonical_host(url_or_host))
}

/// Returns true if `host` is `domain` or one of its subdomains.
#[must_use]
pub fn host_is_within(host: &str, domain: &str) -> bool {
    let host = canonical_host(host);
    let domain = canonical_host(domain);
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Resolves a possibly relative URL string against a base URL.
///
/// Returns the value as-is if it already starts with `http://` or `https://`;
/// normalizes `//...` to `https:...`; otherwise joins with `base_url`.
#[must_use]
pub fn absolutize_url(value: &str, base_url: &Url) -> Option<String> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some(value.to_string());
    }
    if value.starts_with("//") {
        return Some(format!("https:{value}"));
    }
    base_url.join(value).ok().map(|url| url.to_string())
}

/// Returns the first capture of `regex` in `html`, trimmed.
#[must_use]
pub fn extract_meta_value(html: &str, regex: &Regex) -> Option<String> {
    regex
        .captures(html)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
}

/// Returns every first-group capture of `regex` in `html`, trimmed and non-empty.
#[must_use]
pub fn extract_meta_values(html: &str, regex: &Regex) -> Vec<String> {
    regex
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|value| !value.is_empty())
        .collect()
}

/// Regex for extracting a 4-digit year (19xx or 20xx) from a string.
pub static YEAR_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"\b(19|20)\d{2}\b"));

/// Returns the first year-like match (19xx or 20xx) in `value`.
#[must_use]
pub fn extract_year_from_str(value: &str) -> Option<String> {
    YEAR_VALUE_RE
        .find(value)
        .map(|capture| capture.as_str().to_string())
}
