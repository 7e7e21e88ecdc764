//! Solidfiles extractor: the file page embeds its download URL in a JSON blob.

use std::sync::Arc;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use reqwest::cookie::Jar;
use tracing::info;
use url::Url;

use crate::host::HostKind;
use crate::http_client::{HttpClientError, build_http_client};
use crate::utils::{absolutize_url, compile_static_regex, first_capture, unescape_js_url};

use super::{
    ExtractionResult, ExtractionStrategy, HostExtractor, PageFetch, ResolvedLink, TokenRule,
    fallback_or_miss, fetch_page, first_match, parse_base_url, rebase_url,
};

static DOWNLOAD_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#""downloadUrl"\s*:\s*"([^"]+)""#));
static STREAM_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#""streamUrl"\s*:\s*"([^"]+)""#));
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#""name"\s*:\s*"([^"]+)""#));

const RULES: &[TokenRule] = &[
    TokenRule {
        name: "download_url_json",
        apply: download_url,
    },
    TokenRule {
        name: "stream_url_json",
        apply: stream_url,
    },
];

fn download_url(body: &str) -> Option<String> {
    first_capture(body, &DOWNLOAD_URL_RE).map(|token| unescape_js_url(&token))
}

fn stream_url(body: &str) -> Option<String> {
    first_capture(body, &STREAM_URL_RE).map(|token| unescape_js_url(&token))
}

/// Extractor for Solidfiles file pages.
pub struct SolidfilesExtractor {
    client: Client,
    base_url: Option<Url>,
    direct_fallback: bool,
}

impl SolidfilesExtractor {
    /// Creates an extractor talking to solidfiles.com.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError`] if client construction fails.
    pub fn new(cookie_jar: Option<Arc<Jar>>, direct_fallback: bool) -> Result<Self, HttpClientError> {
        Self::with_base_url(cookie_jar, direct_fallback, "")
    }

    /// Creates an extractor that sends page requests to `base_url` (for tests).
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError`] if client construction fails.
    pub fn with_base_url(
        cookie_jar: Option<Arc<Jar>>,
        direct_fallback: bool,
        base_url: &str,
    ) -> Result<Self, HttpClientError> {
        Ok(Self {
            client: build_http_client("solidfiles", cookie_jar)?,
            base_url: parse_base_url(base_url),
            direct_fallback,
        })
    }
}

impl std::fmt::Debug for SolidfilesExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolidfilesExtractor")
            .field("base_url", &self.base_url)
            .field("direct_fallback", &self.direct_fallback)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HostExtractor for SolidfilesExtractor {
    fn name(&self) -> &'static str {
        "solidfiles"
    }

    fn host_kind(&self) -> HostKind {
        HostKind::Solidfiles
    }

    #[tracing::instrument(skip(self), fields(host = "solidfiles"))]
    async fn extract(&self, url: &str) -> ExtractionResult {
        let request_url = rebase_url(url, self.base_url.as_ref());
        let (page_url, body) =
            match fetch_page(&self.client, &request_url, HostKind::Solidfiles).await? {
                PageFetch::Html { final_url, body } => (final_url, body),
                PageFetch::Binary { final_url, .. } => {
                    return Ok(ResolvedLink::new(
                        final_url.as_str(),
                        HostKind::Solidfiles,
                        ExtractionStrategy::AlreadyDirect,
                        url,
                    ));
                }
            };

        let Some((rule, token)) = first_match(RULES, &body) else {
            return fallback_or_miss(self.direct_fallback, HostKind::Solidfiles, url);
        };
        let Some(token) = absolutize_url(&token, &page_url) else {
            return fallback_or_miss(self.direct_fallback, HostKind::Solidfiles, url);
        };
        info!(rule, url = %token, "Solidfiles download link extracted");
        Ok(
            ResolvedLink::new(token, HostKind::Solidfiles, ExtractionStrategy::PagePattern, url)
                .with_rule(rule)
                .with_file_name(first_capture(&body, &NAME_RE)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_url_preferred_over_stream_url() {
        let body = r#"viewerOptions = {"streamUrl":"https://s.solidfilesusercontent.com/stream/x","downloadUrl":"https:\/\/s.solidfilesusercontent.com\/dl\/x\/ep.mp4","name":"ep.mp4"}"#;
        assert_eq!(
            first_match(RULES, body),
            Some((
                "download_url_json",
                "https://s.solidfilesusercontent.com/dl/x/ep.mp4".to_string()
            ))
        );
        assert_eq!(first_capture(body, &NAME_RE).as_deref(), Some("ep.mp4"));
    }

    #[test]
    fn test_stream_url_rule() {
        let body = r#"{"streamUrl":"https://s.solidfilesusercontent.com/stream/x"}"#;
        assert_eq!(
            first_match(RULES, body).map(|(rule, _)| rule),
            Some("stream_url_json")
        );
    }
}
