//! Google Drive extractor.
//!
//! Small files are served straight from the `uc?export=download` template. Large
//! files answer with a virus-scan interstitial whose form or confirm token leads
//! to the real download.

use std::sync::Arc;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use reqwest::cookie::Jar;
use scraper::{Html, Selector};
use tracing::info;
use url::Url;

use crate::error::ResolveError;
use crate::host::{HostKind, google_drive_file_id};
use crate::http_client::{HttpClientError, build_http_client};
use crate::utils::{compile_static_regex, first_capture};

use super::{
    ExtractionResult, ExtractionStrategy, HostExtractor, PageFetch, ResolvedLink, TokenRule,
    fallback_or_miss, fetch_page, first_match,
};

const DEFAULT_DRIVE_BASE_URL: &str = "https://drive.google.com";
const DEFAULT_USERCONTENT_BASE_URL: &str = "https://drive.usercontent.google.com";

const MISSING_MARKERS: &[&str] = &[
    "Sorry, the file you have requested does not exist",
    "the file you have requested has been removed",
];
const QUOTA_MARKERS: &[&str] = &[
    "Quota exceeded",
    "Too many users have viewed or downloaded this file recently",
];

static CONFIRM_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"confirm=([0-9A-Za-z_-]+)"));
static NAME_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)class\s*=\s*["']uc-name-size["'][^>]*>\s*<a[^>]*>([^<]+)</a>\s*\(([^)]+)\)"#)
});

const RULES: &[TokenRule] = &[
    TokenRule {
        name: "download_form",
        apply: download_form_url,
    },
    TokenRule {
        name: "confirm_token",
        apply: confirm_token,
    },
    TokenRule {
        name: "uuid_input",
        apply: uuid_input,
    },
];

/// Action of `form#download-form` with its hidden inputs as query parameters.
fn download_form_url(body: &str) -> Option<String> {
    let form_selector = Selector::parse("form#download-form").ok()?;
    let input_selector = Selector::parse("input[type='hidden'][name]").ok()?;
    let document = Html::parse_document(body);
    let form = document.select(&form_selector).next()?;
    let mut action = Url::parse(form.value().attr("action")?.trim()).ok()?;
    {
        let mut pairs = action.query_pairs_mut();
        for input in form.select(&input_selector) {
            if let Some(name) = input.value().attr("name") {
                pairs.append_pair(name, input.value().attr("value").unwrap_or_default());
            }
        }
    }
    Some(action.to_string())
}

fn confirm_token(body: &str) -> Option<String> {
    first_capture(body, &CONFIRM_TOKEN_RE)
}

fn uuid_input(body: &str) -> Option<String> {
    let selector = Selector::parse("input[name='uuid']").ok()?;
    let document = Html::parse_document(body);
    document
        .select(&selector)
        .find_map(|input| input.value().attr("value"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

/// Extractor for Google Drive file links.
pub struct GoogleDriveExtractor {
    client: Client,
    drive_base_url: String,
    usercontent_base_url: String,
    direct_fallback: bool,
}

impl GoogleDriveExtractor {
    /// Creates an extractor talking to Google Drive.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError`] if client construction fails.
    pub fn new(cookie_jar: Option<Arc<Jar>>, direct_fallback: bool) -> Result<Self, HttpClientError> {
        let mut extractor =
            Self::with_base_url(cookie_jar, direct_fallback, DEFAULT_DRIVE_BASE_URL)?;
        extractor.usercontent_base_url = DEFAULT_USERCONTENT_BASE_URL.to_string();
        Ok(extractor)
    }

    /// Creates an extractor sending every request to `base_url` (for tests).
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError`] if client construction fails.
    pub fn with_base_url(
        cookie_jar: Option<Arc<Jar>>,
        direct_fallback: bool,
        base_url: &str,
    ) -> Result<Self, HttpClientError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client: build_http_client("google_drive", cookie_jar)?,
            usercontent_base_url: base_url.clone(),
            drive_base_url: base_url,
            direct_fallback,
        })
    }

    fn build_url(&self, rule: &str, token: String, file_id: &str) -> String {
        match rule {
            "confirm_token" => format!(
                "{}/uc?export=download&confirm={token}&id={file_id}",
                self.drive_base_url
            ),
            "uuid_input" => format!(
                "{}/download?id={file_id}&export=download&confirm=t&uuid={token}",
                self.usercontent_base_url
            ),
            _ => token,
        }
    }
}

impl std::fmt::Debug for GoogleDriveExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleDriveExtractor")
            .field("drive_base_url", &self.drive_base_url)
            .field("usercontent_base_url", &self.usercontent_base_url)
            .field("direct_fallback", &self.direct_fallback)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HostExtractor for GoogleDriveExtractor {
    fn name(&self) -> &'static str {
        "google_drive"
    }

    fn host_kind(&self) -> HostKind {
        HostKind::GoogleDrive
    }

    #[tracing::instrument(skip(self), fields(host = "google_drive"))]
    async fn extract(&self, url: &str) -> ExtractionResult {
        let file_id = Url::parse(url)
            .ok()
            .as_ref()
            .and_then(google_drive_file_id)
            .ok_or_else(|| {
                ResolveError::invalid_link(HostKind::GoogleDrive, url, "no file id in URL")
            })?;
        let template_url = format!("{}/uc?id={file_id}&export=download", self.drive_base_url);

        let body = match fetch_page(&self.client, &template_url, HostKind::GoogleDrive).await? {
            PageFetch::Binary { .. } => {
                return Ok(ResolvedLink::new(
                    template_url,
                    HostKind::GoogleDrive,
                    ExtractionStrategy::UrlTemplate,
                    url,
                ));
            }
            PageFetch::Html { body, .. } => body,
        };

        if let Some(marker) = MISSING_MARKERS.iter().find(|marker| body.contains(**marker)) {
            return Err(ResolveError::invalid_link(HostKind::GoogleDrive, url, *marker));
        }
        if QUOTA_MARKERS.iter().any(|marker| body.contains(marker)) {
            return Err(ResolveError::network(url, "Google Drive download quota exceeded"));
        }

        let Some((rule, token)) = first_match(RULES, &body) else {
            return fallback_or_miss(self.direct_fallback, HostKind::GoogleDrive, url);
        };
        let download_url = self.build_url(rule, token, &file_id);
        let (file_name, size_hint) = NAME_SIZE_RE
            .captures(&body)
            .map(|caps| {
                (
                    caps.get(1).map(|m| m.as_str().trim().to_string()),
                    caps.get(2).map(|m| m.as_str().trim().to_string()),
                )
            })
            .unwrap_or_default();
        info!(rule, url = %download_url, "Google Drive download link extracted");
        Ok(
            ResolvedLink::new(download_url, HostKind::GoogleDrive, ExtractionStrategy::PagePattern, url)
                .with_rule(rule)
                .with_file_name(file_name)
                .with_size_hint(size_hint),
        )
    }
}
