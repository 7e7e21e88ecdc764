//! 4shared extractor.
//!
//! File pages either expose the download anchor directly or link to a
//! `download/free/` page that shows a countdown before the anchor appears. The
//! free page is followed once and the same rules are applied to it.

use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use reqwest::cookie::Jar;
use tracing::{debug, info};
use url::Url;

use crate::error::ResolveError;
use crate::host::HostKind;
use crate::http_client::{HttpClientError, build_http_client};
use crate::utils::{absolutize_url, compile_static_regex, first_capture, unescape_js_url};

use super::{
    ExtractionResult, ExtractionStrategy, HostExtractor, PageFetch, ResolvedLink, TokenRule,
    fallback_or_miss, fetch_page, first_match, parse_base_url, rebase_url,
};

const DEFAULT_MAX_COUNTDOWN: Duration = Duration::from_secs(15);

const REJECTION_MARKERS: &[&str] = &[
    "The file link that you requested is not valid",
    "link that you requested is not valid",
    "This file is no longer available",
    "file was deleted",
];

static BASE_BUTTON_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?s)id\s*=\s*["']baseDownloadButton["'][^>]*?href\s*=\s*["']([^"']+)["']"#)
});
static DIRECT_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?s)id\s*=\s*["']directDownloadLink["'][^>]*?href\s*=\s*["']([^"']+)["']"#)
});
static DBTN_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?s)<a\b[^>]*?class\s*=\s*["']dbtn[^"']*["'][^>]*?href\s*=\s*["']([^"']+)["']"#)
});
static GET_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"href\s*=\s*["'](https?://[^"']+?/get/[^"']+?)["']"#));
static LINK_SHOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?s)<a\b[^>]*?class\s*=\s*["']linkShowD["'][^>]*?href\s*=\s*["']([^"']+)["']"#)
});
static DL_LINK_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"var\s+dlLink\s*=\s*["']([^"']+)["']"#));
static URL_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"var\s+url\s*=\s*["'](https?://[^"']+)["']"#));
static FREE_PAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"href\s*=\s*["']([^"']*download/free/[^"']*)["']"#)
});
static FREE_BUTTON_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?s)(?:id|class)\s*=\s*["']freeDownloadButton["'][^>]*?href\s*=\s*["']([^"']+)["']"#,
    )
});
static COUNTDOWN_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"var\s+c\s*=\s*(\d+)\s*;"));

fn rule(regex: &Regex, body: &str) -> Option<String> {
    first_capture(body, regex)
        .map(|token| unescape_js_url(&token))
        .filter(|token| !token.starts_with('#') && !token.starts_with("javascript:"))
}

fn base_download_button(body: &str) -> Option<String> {
    rule(&BASE_BUTTON_RE, body)
}

fn direct_download_link(body: &str) -> Option<String> {
    rule(&DIRECT_LINK_RE, body)
}

fn dbtn_anchor(body: &str) -> Option<String> {
    rule(&DBTN_RE, body)
}

fn get_href(body: &str) -> Option<String> {
    rule(&GET_HREF_RE, body)
}

fn link_show(body: &str) -> Option<String> {
    rule(&LINK_SHOW_RE, body)
}

fn dl_link_variable(body: &str) -> Option<String> {
    rule(&DL_LINK_VAR_RE, body)
}

fn url_variable(body: &str) -> Option<String> {
    rule(&URL_VAR_RE, body)
}

fn free_download_href(body: &str) -> Option<String> {
    rule(&FREE_PAGE_RE, body)
}

fn free_download_button(body: &str) -> Option<String> {
    rule(&FREE_BUTTON_RE, body)
}

const ANCHOR_RULES: &[TokenRule] = &[
    TokenRule {
        name: "base_download_button",
        apply: base_download_button,
    },
    TokenRule {
        name: "direct_download_link",
        apply: direct_download_link,
    },
    TokenRule {
        name: "dbtn_anchor",
        apply: dbtn_anchor,
    },
    TokenRule {
        name: "get_href",
        apply: get_href,
    },
    TokenRule {
        name: "link_show",
        apply: link_show,
    },
];

const SCRIPT_RULES: &[TokenRule] = &[
    TokenRule {
        name: "dl_link_variable",
        apply: dl_link_variable,
    },
    TokenRule {
        name: "url_variable",
        apply: url_variable,
    },
];

const FREE_PAGE_RULES: &[TokenRule] = &[
    TokenRule {
        name: "free_download_href",
        apply: free_download_href,
    },
    TokenRule {
        name: "free_download_button",
        apply: free_download_button,
    },
];

/// Extractor for 4shared file pages.
pub struct FourSharedExtractor {
    client: Client,
    base_url: Option<Url>,
    direct_fallback: bool,
    max_countdown: Duration,
}

impl FourSharedExtractor {
    /// Creates an extractor talking to 4shared.com.
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
            client: build_http_client("four_shared", cookie_jar)?,
            base_url: parse_base_url(base_url),
            direct_fallback,
            max_countdown: DEFAULT_MAX_COUNTDOWN,
        })
    }

    /// Caps how long the free-download countdown is honoured.
    #[must_use]
    pub fn with_max_countdown(mut self, max_countdown: Duration) -> Self {
        self.max_countdown = max_countdown;
        self
    }

    async fn fetch(&self, url: &str, source_url: &str) -> Result<PageFetch, ResolveError> {
        let request_url = rebase_url(url, self.base_url.as_ref());
        let fetched = fetch_page(&self.client, &request_url, HostKind::FourShared).await?;
        if let PageFetch::Html { body, .. } = &fetched
            && let Some(marker) = REJECTION_MARKERS.iter().find(|marker| body.contains(**marker))
        {
            return Err(ResolveError::invalid_link(HostKind::FourShared, source_url, *marker));
        }
        Ok(fetched)
    }

    /// Follows the free-download page once; `None` when there is no such page.
    async fn follow_free_page(
        &self,
        body: &str,
        page_url: &Url,
        source_url: &str,
    ) -> Result<Option<PageFetch>, ResolveError> {
        let Some((_, href)) = first_match(FREE_PAGE_RULES, body) else {
            return Ok(None);
        };
        let Some(free_url) = absolutize_url(&href, page_url) else {
            return Ok(None);
        };
        debug!(url = %free_url, "Following 4shared free download page");
        let fetched = self.fetch(&free_url, source_url).await?;

        if let PageFetch::Html { body, .. } = &fetched
            && let Some(seconds) =
                first_capture(body, &COUNTDOWN_RE).and_then(|value| value.parse::<u64>().ok())
        {
            let wait = countdown_wait(seconds, self.max_countdown);
            debug!(seconds, waited_ms = wait.as_millis(), "Honouring 4shared countdown");
            tokio::time::sleep(wait).await;
        }
        Ok(Some(fetched))
    }
}

/// Time to wait for a page countdown of `seconds`, capped at `max`.
fn countdown_wait(seconds: u64, max: Duration) -> Duration {
    Duration::from_secs(seconds.saturating_add(1)).min(max)
}

impl std::fmt::Debug for FourSharedExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FourSharedExtractor")
            .field("base_url", &self.base_url)
            .field("direct_fallback", &self.direct_fallback)
            .field("max_countdown", &self.max_countdown)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HostExtractor for FourSharedExtractor {
    fn name(&self) -> &'static str {
        "four_shared"
    }

    fn host_kind(&self) -> HostKind {
        HostKind::FourShared
    }

    #[tracing::instrument(skip(self), fields(host = "four_shared"))]
    async fn extract(&self, url: &str) -> ExtractionResult {
        let (mut page_url, mut body) = match self.fetch(url, url).await? {
            PageFetch::Html { final_url, body } => (final_url, body),
            PageFetch::Binary { final_url, .. } => {
                return Ok(ResolvedLink::new(
                    final_url.as_str(),
                    HostKind::FourShared,
                    ExtractionStrategy::AlreadyDirect,
                    url,
                ));
            }
        };

        let mut found = first_match(ANCHOR_RULES, &body);
        if found.is_none() {
            let hop = self.follow_free_page(&body, &page_url, url).await?;
            match hop {
                Some(PageFetch::Html { final_url, body: free_body }) => {
                    found = first_match(ANCHOR_RULES, &free_body);
                    page_url = final_url;
                    body = free_body;
                }
                Some(PageFetch::Binary { final_url, .. }) => {
                    return Ok(ResolvedLink::new(
                        final_url.as_str(),
                        HostKind::FourShared,
                        ExtractionStrategy::AlreadyDirect,
                        url,
                    )
                    .with_rule("free_download_page"));
                }
                None => {}
            }
        }
        if found.is_none() {
            found = first_match(SCRIPT_RULES, &body);
        }

        let Some((rule_name, token)) = found else {
            return fallback_or_miss(self.direct_fallback, HostKind::FourShared, url);
        };
        let Some(download_url) = absolutize_url(&token, &page_url) else {
            return fallback_or_miss(self.direct_fallback, HostKind::FourShared, url);
        };
        info!(rule = rule_name, url = %download_url, "4shared download link extracted");
        Ok(
            ResolvedLink::new(download_url, HostKind::FourShared, ExtractionStrategy::PagePattern, url)
                .with_rule(rule_name),
        )
    }
}
