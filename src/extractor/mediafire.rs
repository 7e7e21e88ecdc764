//! MediaFire extractor: file page to `download*.mediafire.com` URL.

use std::sync::Arc;
use std::sync::LazyLock;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use reqwest::Client;
use reqwest::cookie::Jar;
use tracing::{debug, info};
use url::Url;

use crate::error::ResolveError;
use crate::host::HostKind;
use crate::http_client::{HttpClientError, build_http_client};
use crate::utils::{compile_static_regex, first_capture, last_path_segment, unescape_js_url};

use super::{
    ExtractionResult, ExtractionStrategy, HostExtractor, PageFetch, ResolvedLink, TokenRule,
    fallback_or_miss, fetch_page, first_match, parse_base_url, rebase_url,
};

const REJECTION_MARKERS: &[&str] = &[
    "Invalid or Deleted File",
    "File Removed",
    "The key you provided for file download was invalid",
    "This file has been removed",
];

static BUTTON_ID_FIRST_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<a\b[^>]*\bid\s*=\s*["']downloadButton["'][^>]*?\bhref\s*=\s*["']([^"']+)["']"#,
    )
});
static BUTTON_HREF_FIRST_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']+)["'][^>]*\bid\s*=\s*["']downloadButton["']"#,
    )
});
static SCRAMBLED_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?i)data-scrambled-url\s*=\s*["']([A-Za-z0-9+/=]+)["']"#)
});
static DOWNLOAD_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"(?i)href\s*=\s*["'](https?://download[^"']+)["']"#));
static LOCATION_ASSIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"window\.location\.href\s*=\s*['"](https?://[^'"]+)['"]"#)
});
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?i)Download\s*\(\s*([\d.,]+\s*[KMGT]?B)\s*\)")
});
static FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<div[^>]*\bclass\s*=\s*["'][^"']*\bfilename\b[^"']*["'][^>]*>\s*([^<]+?)\s*<"#,
    )
});

const RULES: &[TokenRule] = &[
    TokenRule {
        name: "download_button",
        apply: download_button_href,
    },
    TokenRule {
        name: "scrambled_url",
        apply: scrambled_url,
    },
    TokenRule {
        name: "download_host_href",
        apply: download_host_href,
    },
    TokenRule {
        name: "location_assignment",
        apply: location_assignment,
    },
];

fn http_token(token: String) -> Option<String> {
    let token = unescape_js_url(&token);
    token.starts_with("http").then_some(token)
}

fn download_button_href(body: &str) -> Option<String> {
    first_capture(body, &BUTTON_ID_FIRST_RE)
        .and_then(http_token)
        .or_else(|| first_capture(body, &BUTTON_HREF_FIRST_RE).and_then(http_token))
}

fn scrambled_url(body: &str) -> Option<String> {
    let encoded = first_capture(body, &SCRAMBLED_URL_RE)?;
    let decoded = STANDARD.decode(encoded.as_bytes()).ok()?;
    String::from_utf8(decoded).ok().and_then(http_token)
}

fn download_host_href(body: &str) -> Option<String> {
    first_capture(body, &DOWNLOAD_HREF_RE).and_then(http_token)
}

fn location_assignment(body: &str) -> Option<String> {
    first_capture(body, &LOCATION_ASSIGN_RE).and_then(http_token)
}

fn is_cdn_url(url: &Url) -> bool {
    url.host_str().is_some_and(|host| {
        let host = host.to_ascii_lowercase();
        host.starts_with("download") && host.ends_with(".mediafire.com")
    })
}

/// Extractor for MediaFire file pages.
pub struct MediaFireExtractor {
    client: Client,
    base_url: Option<Url>,
    direct_fallback: bool,
}

impl MediaFireExtractor {
    /// Creates an extractor talking to mediafire.com.
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
            client: build_http_client("mediafire", cookie_jar)?,
            base_url: parse_base_url(base_url),
            direct_fallback,
        })
    }
}

impl std::fmt::Debug for MediaFireExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFireExtractor")
            .field("base_url", &self.base_url)
            .field("direct_fallback", &self.direct_fallback)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HostExtractor for MediaFireExtractor {
    fn name(&self) -> &'static str {
        "mediafire"
    }

    fn host_kind(&self) -> HostKind {
        HostKind::MediaFire
    }

    #[tracing::instrument(skip(self), fields(host = "mediafire"))]
    async fn extract(&self, url: &str) -> ExtractionResult {
        let parsed = Url::parse(url)
            .map_err(|e| ResolveError::invalid_link(HostKind::MediaFire, url, e.to_string()))?;
        if is_cdn_url(&parsed) {
            return Ok(
                ResolvedLink::new(url, HostKind::MediaFire, ExtractionStrategy::AlreadyDirect, url)
                    .with_file_name(last_path_segment(&parsed)),
            );
        }

        let request_url = rebase_url(url, self.base_url.as_ref());
        let (final_url, body) = match fetch_page(&self.client, &request_url, HostKind::MediaFire).await? {
            PageFetch::Binary { final_url, .. } => {
                debug!(url, "MediaFire served the file without a landing page");
                return Ok(ResolvedLink::new(
                    final_url.as_str(),
                    HostKind::MediaFire,
                    ExtractionStrategy::AlreadyDirect,
                    url,
                )
                .with_file_name(last_path_segment(&final_url)));
            }
            PageFetch::Html { final_url, body } => (final_url, body),
        };

        if final_url.path().contains("error.php") {
            return Err(ResolveError::invalid_link(
                HostKind::MediaFire,
                url,
                "redirected to the MediaFire error page",
            ));
        }
        if let Some(marker) = REJECTION_MARKERS.iter().find(|marker| body.contains(**marker)) {
            return Err(ResolveError::invalid_link(HostKind::MediaFire, url, *marker));
        }

        let Some((rule, token)) = first_match(RULES, &body) else {
            return fallback_or_miss(self.direct_fallback, HostKind::MediaFire, url);
        };
        let file_name = first_capture(&body, &FILENAME_RE)
            .or_else(|| file_name_from_slug(&parsed));
        info!(rule, url = %token, "MediaFire download link extracted");
        Ok(
            ResolvedLink::new(token, HostKind::MediaFire, ExtractionStrategy::PagePattern, url)
                .with_rule(rule)
                .with_file_name(file_name)
                .with_size_hint(first_capture(&body, &SIZE_RE)),
        )
    }
}

/// File name from `/file/{key}/{name}[/file]`.
fn file_name_from_slug(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let name = segments.get(2)?;
    urlencoding::decode(name).ok().map(|decoded| decoded.into_owned())
}
