//! Browser driver contract and the default HTTP driver.
//!
//! A driver loads a URL and returns a [`PageSnapshot`]: the final URL plus the
//! page HTML. Selector queries run on the snapshot, so drivers only need to
//! produce markup.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::cookie::Jar;
use reqwest::header::ACCEPT;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::error::ResolveError;
use crate::http_client::{HttpClientError, build_http_client};

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Errors constructing a driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The HTTP client could not be built.
    #[error(transparent)]
    HttpClient(#[from] HttpClientError),

    /// The headless browser could not be started.
    #[error("browser launch failed: {reason}\n  Suggestion: Install Chrome/Chromium or switch to driver = \"http\"")]
    Launch {
        /// Launch failure detail
        reason: String,
    },
}

/// One element matched by a selector query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageElement {
    /// Lowercase tag name.
    pub tag: String,
    /// Attributes by name.
    pub attributes: BTreeMap<String, String>,
    /// Visible text, whitespace collapsed.
    pub text: String,
}

impl PageElement {
    /// Returns the value of attribute `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A loaded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    url: Url,
    html: String,
}

impl PageSnapshot {
    /// Creates a snapshot from the final URL and page markup.
    #[must_use]
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        Self {
            url,
            html: html.into(),
        }
    }

    /// Final URL after redirects.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Raw markup.
    #[must_use]
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Parses the markup once for a batch of selector queries.
    ///
    /// The parsed tree is not `Send`; keep it out of `.await` points.
    #[must_use]
    pub fn parse(&self) -> ParsedPage<'_> {
        ParsedPage {
            snapshot: self,
            document: Html::parse_document(&self.html),
        }
    }

    /// Returns every element matching the CSS `selector`, in document order.
    ///
    /// Invalid selectors match nothing. Parses the page on each call; use
    /// [`PageSnapshot::parse`] for several queries.
    #[must_use]
    pub fn find_all(&self, selector: &str) -> Vec<PageElement> {
        self.parse().find_all(selector)
    }
}

/// A [`PageSnapshot`] with its markup parsed.
pub struct ParsedPage<'a> {
    snapshot: &'a PageSnapshot,
    document: Html,
}

impl ParsedPage<'_> {
    /// Final URL of the underlying snapshot.
    #[must_use]
    pub fn url(&self) -> &Url {
        self.snapshot.url()
    }

    /// Returns every element matching the CSS `selector`, in document order.
    ///
    /// Invalid selectors match nothing.
    #[must_use]
    pub fn find_all(&self, selector: &str) -> Vec<PageElement> {
        let Ok(parsed) = Selector::parse(selector) else {
            debug!(selector, "Ignoring invalid selector");
            return Vec::new();
        };
        self.document.select(&parsed).map(page_element).collect()
    }
}

impl std::fmt::Debug for ParsedPage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedPage")
            .field("url", &self.snapshot.url().as_str())
            .finish_non_exhaustive()
    }
}

fn page_element(element: ElementRef<'_>) -> PageElement {
    let value = element.value();
    PageElement {
        tag: value.name().to_ascii_lowercase(),
        attributes: value
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        text: element
            .text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Loads pages for the navigator.
///
/// Uses `async_trait` so the navigator can hold `Arc<dyn BrowserDriver>`.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Returns the driver name for logs.
    fn name(&self) -> &str;

    /// Loads `url`, giving up after `timeout`.
    async fn load(&self, url: &str, timeout: Duration) -> Result<PageSnapshot, ResolveError>;
}

/// Driver that fetches raw HTML over HTTP. Scripts are not executed.
#[derive(Debug, Clone)]
pub struct HttpDriver {
    client: Client,
}

impl HttpDriver {
    /// Creates a driver with the shared HTTP policy.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if client construction fails.
    pub fn new(cookie_jar: Option<Arc<Jar>>) -> Result<Self, DriverError> {
        Ok(Self {
            client: build_http_client("http_driver", cookie_jar)?,
        })
    }
}

#[async_trait]
impl BrowserDriver for HttpDriver {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn load(&self, url: &str, timeout: Duration) -> Result<PageSnapshot, ResolveError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, HTML_ACCEPT)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ResolveError::network(url, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::network(
                url,
                format!("page returned HTTP {}", status.as_u16()),
            ));
        }
        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| ResolveError::network(url, format!("page body unreadable: {e}")))?;
        Ok(PageSnapshot::new(final_url, html))
    }
}
