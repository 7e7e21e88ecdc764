//! Host extractors: validated provider URL to final downloadable URL.
//!
//! Each provider has one [`HostExtractor`]. Extractors fetch the provider page,
//! apply an ordered list of [`TokenRule`]s, build the canonical URL from the first
//! token found and, when nothing matches, degrade to treating the provider URL as
//! directly downloadable ([`ExtractionStrategy::DirectFallback`]) unless that
//! fallback is disabled.
//!
//! # Architecture
//!
//! - [`HostExtractor`] - async trait implemented per provider
//! - [`ExtractorRegistry`] - extractors keyed by [`HostKind`]
//! - [`ResolvedLink`] - successful extraction with strategy and hints
//! - [`MediaFireExtractor`], [`GoogleDriveExtractor`], [`FourSharedExtractor`],
//!   [`SolidfilesExtractor`], [`Mp4UploadExtractor`], [`DropboxExtractor`] - providers

mod dropbox;
mod four_shared;
mod google_drive;
mod mediafire;
mod mp4upload;
mod solidfiles;

pub use dropbox::DropboxExtractor;
pub use four_shared::FourSharedExtractor;
pub use google_drive::GoogleDriveExtractor;
pub use mediafire::MediaFireExtractor;
pub use mp4upload::Mp4UploadExtractor;
pub use solidfiles::SolidfilesExtractor;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::ResolveError;
use crate::host::HostKind;

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Result of one extraction attempt.
pub type ExtractionResult = Result<ResolvedLink, ResolveError>;

/// How the final URL was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// A token rule matched on the provider page.
    PagePattern,
    /// Built from a URL template without page inspection.
    UrlTemplate,
    /// The provider URL already served the file.
    AlreadyDirect,
    /// No rule matched; the provider URL is handed back as-is.
    DirectFallback,
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PagePattern => "page_pattern",
            Self::UrlTemplate => "url_template",
            Self::AlreadyDirect => "already_direct",
            Self::DirectFallback => "direct_fallback",
        })
    }
}

/// A downloadable URL produced by an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLink {
    /// Final downloadable URL.
    pub url: String,
    /// Provider the link belongs to.
    pub host: HostKind,
    /// How `url` was obtained.
    pub strategy: ExtractionStrategy,
    /// Name of the token rule that matched, if any.
    pub rule: Option<String>,
    /// Provider URL the extraction started from.
    pub source_url: String,
    /// File name advertised by the provider.
    pub file_name: Option<String>,
    /// Human-readable size advertised by the provider, e.g. `245.3MB`.
    pub size_hint: Option<String>,
}

impl ResolvedLink {
    /// Creates a link with no rule or hints.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        host: HostKind,
        strategy: ExtractionStrategy,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            host,
            strategy,
            rule: None,
            source_url: source_url.into(),
            file_name: None,
            size_hint: None,
        }
    }

    /// Sets the matching rule name.
    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    /// Sets the file name hint.
    #[must_use]
    pub fn with_file_name(mut self, file_name: Option<String>) -> Self {
        self.file_name = file_name;
        self
    }

    /// Sets the size hint.
    #[must_use]
    pub fn with_size_hint(mut self, size_hint: Option<String>) -> Self {
        self.size_hint = size_hint;
        self
    }
}

/// A named, pure token extraction rule over a provider page body.
#[derive(Clone, Copy)]
pub struct TokenRule {
    /// Stable rule name reported in [`ResolvedLink::rule`].
    pub name: &'static str,
    /// Returns the token when the rule matches.
    pub apply: fn(&str) -> Option<String>,
}

impl fmt::Debug for TokenRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRule").field("name", &self.name).finish()
    }
}

/// Applies `rules` in order and returns the first match with its rule name.
#[must_use]
pub fn first_match(rules: &[TokenRule], body: &str) -> Option<(&'static str, String)> {
    rules
        .iter()
        .find_map(|rule| (rule.apply)(body).map(|token| (rule.name, token)))
}

/// Trait implemented by every provider extractor.
///
/// Uses `async_trait` so the registry can hold `Box<dyn HostExtractor>`.
#[async_trait]
pub trait HostExtractor: Send + Sync {
    /// Returns the extractor's name for logs.
    fn name(&self) -> &str;

    /// Returns the provider this extractor handles.
    fn host_kind(&self) -> HostKind;

    /// Resolves a provider URL (already classified as [`Self::host_kind`]) to a
    /// downloadable URL.
    async fn extract(&self, url: &str) -> ExtractionResult;
}

/// Extractors keyed by provider.
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<HostKind, Box<dyn HostExtractor>>,
}

impl ExtractorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an extractor, replacing any previous one for the same provider.
    pub fn register(&mut self, extractor: Box<dyn HostExtractor>) {
        let kind = extractor.host_kind();
        if let Some(previous) = self.extractors.insert(kind, extractor) {
            debug!(host = %kind, replaced = previous.name(), "Extractor replaced");
        }
    }

    /// Returns the extractor for `kind`.
    #[must_use]
    pub fn get(&self, kind: HostKind) -> Option<&dyn HostExtractor> {
        self.extractors.get(&kind).map(|extractor| &**extractor)
    }

    /// Returns the registered provider kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<HostKind> {
        let mut kinds: Vec<HostKind> = self.extractors.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Number of registered extractors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// Returns true when no extractor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Builds the registry with every extractable provider.
///
/// All extractors share one cookie jar. A provider whose client cannot be built
/// is skipped with a warning.
#[must_use]
pub fn build_default_extractor_registry(direct_fallback: bool) -> ExtractorRegistry {
    let jar = Arc::new(Jar::default());
    let mut registry = ExtractorRegistry::new();

    match MediaFireExtractor::new(Some(jar.clone()), direct_fallback) {
        Ok(extractor) => registry.register(Box::new(extractor)),
        Err(error) => warn!(error = %error, "MediaFire extractor unavailable"),
    }
    match GoogleDriveExtractor::new(Some(jar.clone()), direct_fallback) {
        Ok(extractor) => registry.register(Box::new(extractor)),
        Err(error) => warn!(error = %error, "Google Drive extractor unavailable"),
    }
    match FourSharedExtractor::new(Some(jar.clone()), direct_fallback) {
        Ok(extractor) => registry.register(Box::new(extractor)),
        Err(error) => warn!(error = %error, "4shared extractor unavailable"),
    }
    match SolidfilesExtractor::new(Some(jar.clone()), direct_fallback) {
        Ok(extractor) => registry.register(Box::new(extractor)),
        Err(error) => warn!(error = %error, "Solidfiles extractor unavailable"),
    }
    match Mp4UploadExtractor::new(Some(jar), direct_fallback) {
        Ok(extractor) => registry.register(Box::new(extractor)),
        Err(error) => warn!(error = %error, "MP4Upload extractor unavailable"),
    }
    registry.register(Box::new(DropboxExtractor::new()));
    registry
}

/// Outcome of fetching a provider URL.
#[derive(Debug)]
pub(crate) enum PageFetch {
    /// A text page to inspect.
    Html { final_url: Url, body: String },
    /// The response is the file itself.
    Binary {
        final_url: Url,
        content_length: Option<u64>,
    },
}

/// Fetches `url`, classifying HTTP failures per provider semantics.
///
/// Unreachable hosts, 429 and 5xx are retryable network failures; other 4xx
/// responses mean the provider rejected the link.
pub(crate) async fn fetch_page(
    client: &Client,
    url: &str,
    host: HostKind,
) -> Result<PageFetch, ResolveError> {
    let response = client
        .get(url)
        .header(ACCEPT, HTML_ACCEPT)
        .send()
        .await
        .map_err(|e| {
            let reason = if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            };
            ResolveError::network(url, reason)
        })?;

    let status = response.status();
    if status.as_u16() == 429 || status.is_server_error() {
        return Err(ResolveError::network(
            url,
            format!("provider returned HTTP {}", status.as_u16()),
        ));
    }
    if !status.is_success() {
        return Err(ResolveError::invalid_link(
            host,
            url,
            format!("provider returned HTTP {}", status.as_u16()),
        ));
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_ascii_lowercase);
    if let Some(content_type) = content_type
        && !is_text_content_type(&content_type)
    {
        debug!(url, content_type, "Provider served the file directly");
        return Ok(PageFetch::Binary {
            final_url,
            content_length: response.content_length(),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| ResolveError::network(url, format!("response body unreadable: {e}")))?;
    Ok(PageFetch::Html { final_url, body })
}

fn is_text_content_type(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || content_type.contains("html")
        || content_type.contains("json")
        || content_type.contains("javascript")
}

/// Returns `original` with scheme, host and port replaced by `base`.
///
/// Lets tests point real provider URLs at a local mock server.
pub(crate) fn rebase_url(original: &str, base: Option<&Url>) -> String {
    let Some(base) = base else {
        return original.to_string();
    };
    let Ok(parsed) = Url::parse(original) else {
        return original.to_string();
    };
    let mut rebased = base.clone();
    rebased.set_path(parsed.path());
    rebased.set_query(parsed.query());
    rebased.to_string()
}

/// Parses a base URL override; empty or invalid input disables the override.
pub(crate) fn parse_base_url(base_url: &str) -> Option<Url> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return None;
    }
    Url::parse(trimmed).ok()
}

/// Falls back to the provider URL when allowed, else reports a pattern miss.
pub(crate) fn fallback_or_miss(direct_fallback: bool, host: HostKind, url: &str) -> ExtractionResult {
    if direct_fallback {
        warn!(host = %host, url, "No extraction rule matched; using provider URL directly");
        Ok(ResolvedLink::new(url, host, ExtractionStrategy::DirectFallback, url))
    } else {
        Err(ResolveError::pattern_miss(host, url))
    }
}
