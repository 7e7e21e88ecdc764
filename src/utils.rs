//! Shared helpers: host normalization, domain matching, link absolutization and regex capture.

use regex::Regex;
use url::Url;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Normalizes a host string: trim, lowercase, strip leading "www." and trailing '.'.
#[must_use]
pub fn canonical_host(host: &str) -> String {
    let lowered = host.trim().to_ascii_lowercase();
    lowered
        .trim_start_matches("www.")
        .trim_end_matches('.')
        .to_string()
}

/// Returns true if `host` is `domain` itself or one of its subdomains.
///
/// Matching is label-aligned: `notmediafire.com` does not match `mediafire.com`,
/// and `mediafire.com.example.net` does not either.
#[must_use]
pub fn host_matches_domain(host: &str, domain: &str) -> bool {
    let host = canonical_host(host);
    let domain = canonical_host(domain);
    if host.is_empty() || domain.is_empty() {
        return false;
    }
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Resolves a possibly relative link against a base URL.
///
/// Absolute http(s) links are returned unchanged, `//host/...` gets the base scheme,
/// fragments, `javascript:` and `mailto:` links yield `None`.
#[must_use]
pub fn absolutize_url(value: &str, base_url: &Url) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') {
        return None;
    }
    let lowered = value.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("data:")
    {
        return None;
    }
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        return Url::parse(value).ok().map(String::from);
    }
    if value.starts_with("//") {
        return Url::parse(&format!("{}:{value}", base_url.scheme()))
            .ok()
            .map(String::from);
    }
    base_url
        .join(value)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(String::from)
}

/// Returns the first capture group of `regex` in `haystack`, trimmed.
#[must_use]
pub fn first_capture(haystack: &str, regex: &Regex) -> Option<String> {
    regex
        .captures(haystack)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|value| !value.is_empty())
}

/// Returns the percent-decoded last non-empty path segment of `url`.
#[must_use]
pub fn last_path_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
}

/// Unescapes JSON/JS string escapes that providers leave inside embedded URLs.
#[must_use]
pub fn unescape_js_url(value: &str) -> String {
    value
        .replace("\\u0026", "&")
        .replace("\\u003d", "=")
        .replace("\\/", "/")
        .replace("&amp;", "&")
}
