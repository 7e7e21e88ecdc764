//! Headless Chromium driver (cargo feature `chromium`).
//!
//! Pages are rendered with scripts enabled, which some streaming sites need
//! before their server lists appear.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::error::ResolveError;

use super::driver::{BrowserDriver, DriverError, PageSnapshot};

/// Driver backed by a headless Chromium instance.
pub struct ChromiumDriver {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumDriver {
    /// Launches headless Chromium; `executable` overrides binary detection.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Launch`] when the browser cannot be started.
    pub async fn launch(executable: Option<PathBuf>) -> Result<Self, DriverError> {
        let mut builder = BrowserConfig::builder()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|reason| DriverError::Launch { reason })?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch {
                reason: e.to_string(),
            })?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Chromium handler event error");
                }
            }
        });
        Ok(Self { browser, handler })
    }

    async fn open_tab(&self, url: &str) -> Result<Page, ResolveError> {
        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| ResolveError::network(url, format!("new tab failed: {e}")))
    }
}

async fn read_page(page: &Page, url: &str) -> Result<PageSnapshot, ResolveError> {
    page.goto(url)
        .await
        .map_err(|e| ResolveError::network(url, format!("navigation failed: {e}")))?;
    if let Err(e) = page.wait_for_navigation().await {
        debug!(url, error = %e, "wait_for_navigation failed; reading current DOM");
    }
    let html = page
        .content()
        .await
        .map_err(|e| ResolveError::network(url, format!("DOM read failed: {e}")))?;
    let final_url = match page
        .url()
        .await
        .ok()
        .flatten()
        .and_then(|current| Url::parse(&current).ok())
    {
        Some(final_url) => final_url,
        None => Url::parse(url).map_err(|e| ResolveError::network(url, e.to_string()))?,
    };
    Ok(PageSnapshot::new(final_url, html))
}

/// Closes its tab when dropped, including when a load is cancelled by a timeout.
struct OpenTab(Option<Page>);

impl OpenTab {
    fn new(page: Page) -> Self {
        Self(Some(page))
    }

    async fn close(mut self) {
        if let Some(page) = self.0.take() {
            close_tab(page).await;
        }
    }
}

impl Drop for OpenTab {
    fn drop(&mut self) {
        let Some(page) = self.0.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(close_tab(page));
            }
            Err(_) => warn!("No runtime to close an abandoned Chromium tab"),
        }
    }
}

async fn close_tab(page: Page) {
    if let Err(e) = page.close().await {
        warn!(error = %e, "Chromium tab did not close cleanly");
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

impl std::fmt::Debug for ChromiumDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumDriver").finish_non_exhaustive()
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    fn name(&self) -> &'static str {
        "chromium"
    }

    async fn load(&self, url: &str, timeout: Duration) -> Result<PageSnapshot, ResolveError> {
        let page = self.open_tab(url).await?;
        let tab = OpenTab::new(page.clone());
        let rendered = tokio::time::timeout(timeout, read_page(&page, url)).await;
        tab.close().await;
        rendered.map_err(|_| ResolveError::network(url, format!("page load exceeded {timeout:?}")))?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timed_out_loads_do_not_leak_tabs() {
        let Ok(driver) = ChromiumDriver::launch(None).await else {
            eprintln!("skipping: Chromium is not available");
            return;
        };
        let before = driver.browser.pages().await.unwrap().len();
        for _ in 0..3 {
            let err = driver
                .load("data:text/html,<p>slow</p>", Duration::from_millis(1))
                .await
                .unwrap_err();
            assert_eq!(err.kind_label(), "network_failure");
        }
        let page = driver
            .load("data:text/html,<p>ok</p>", Duration::from_secs(20))
            .await
            .unwrap();
        assert!(page.html().contains("ok"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(driver.browser.pages().await.unwrap().len(), before);
    }
}
