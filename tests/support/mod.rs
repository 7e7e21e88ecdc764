#![allow(dead_code)]

pub mod socket_guard;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use animedl_core::{
    BrowserDriver, ExtractionResult, ExtractionStrategy, HostExtractor, HostKind, PageSnapshot,
    ResolveError, ResolvedLink,
};
use async_trait::async_trait;
use url::Url;

/// In-memory page driver keyed by URL.
#[derive(Default)]
pub struct FixtureDriver {
    pages: HashMap<String, String>,
    loads: AtomicUsize,
}

impl FixtureDriver {
    pub fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, html)| ((*url).to_string(), (*html).to_string()))
                .collect(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserDriver for FixtureDriver {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn load(&self, url: &str, _timeout: Duration) -> Result<PageSnapshot, ResolveError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let html = self
            .pages
            .get(url)
            .ok_or_else(|| ResolveError::network(url, "page returned HTTP 404"))?;
        let parsed = Url::parse(url).map_err(|e| ResolveError::network(url, e.to_string()))?;
        Ok(PageSnapshot::new(parsed, html.clone()))
    }
}

/// Extractor that always fails with a fixed error and counts its calls.
pub struct FailingExtractor {
    kind: HostKind,
    calls: Arc<AtomicUsize>,
}

impl FailingExtractor {
    pub fn new(kind: HostKind) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                kind,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl HostExtractor for FailingExtractor {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn host_kind(&self) -> HostKind {
        self.kind
    }

    async fn extract(&self, url: &str) -> ExtractionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ResolveError::invalid_link(
            self.kind,
            url,
            "file link is invalid or expired",
        ))
    }
}

/// Extractor that hands every URL back as already direct.
pub struct EchoExtractor(pub HostKind);

#[async_trait]
impl HostExtractor for EchoExtractor {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn host_kind(&self) -> HostKind {
        self.0
    }

    async fn extract(&self, url: &str) -> ExtractionResult {
        Ok(ResolvedLink::new(
            url,
            self.0,
            ExtractionStrategy::AlreadyDirect,
            url,
        ))
    }
}
