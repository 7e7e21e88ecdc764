//! Resolution engine: navigation, classification, extraction and learning.
//!
//! One call to [`ResolutionEngine::resolve`] runs the states
//! Discover, ClassifyAndOrder, ExtractLoop and Exhausted. Per-candidate failures
//! stay inside the loop; callers see the first success or one aggregate error.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{CandidateFailure, ResolveError};
use crate::extractor::{ExtractionResult, ExtractorRegistry, build_default_extractor_registry};
use crate::host::{HostKind, HostPreference, classify};
use crate::navigator::{BrowserDriver, CandidateLink, DEFAULT_PAGE_TIMEOUT, Navigator};
use crate::patterns::{NavigationPattern, Outcome, PatternStore};
use crate::site::{EpisodeTarget, SiteIdentifier, SiteTemplate};

/// Adaptive resolver for episode download links.
///
/// Resolutions for the same site are serialized; different sites may run
/// concurrently on a shared engine.
pub struct ResolutionEngine {
    driver: Arc<dyn BrowserDriver>,
    navigator: Navigator,
    extractors: ExtractorRegistry,
    store: Arc<Mutex<PatternStore>>,
    store_path: Option<PathBuf>,
    preference: HostPreference,
    site_locks: DashMap<SiteIdentifier, Arc<tokio::sync::Mutex<()>>>,
}

impl ResolutionEngine {
    /// Creates an engine with an in-memory store and default preference.
    #[must_use]
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        extractors: ExtractorRegistry,
        store: PatternStore,
    ) -> Self {
        let store = Arc::new(Mutex::new(store));
        Self {
            navigator: Navigator::new(driver.clone(), store.clone(), DEFAULT_PAGE_TIMEOUT),
            driver,
            extractors,
            store,
            store_path: None,
            preference: HostPreference::default(),
            site_locks: DashMap::new(),
        }
    }

    /// Builds an engine from runtime configuration.
    ///
    /// Loads the store from `config.pattern_store` (corrupted stores start
    /// empty) and registers the default extractors.
    #[must_use]
    pub fn from_config(config: &EngineConfig, driver: Arc<dyn BrowserDriver>) -> Self {
        let store = PatternStore::load(&config.pattern_store);
        Self::new(
            driver,
            build_default_extractor_registry(config.direct_fallback),
            store,
        )
        .with_store_path(config.pattern_store.clone())
        .with_preference(config.host_preference.clone())
        .with_page_timeout(config.page_timeout)
    }

    /// Persists the store to `path` after every resolution.
    #[must_use]
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Replaces the host preference.
    #[must_use]
    pub fn with_preference(mut self, preference: HostPreference) -> Self {
        self.preference = preference;
        self
    }

    /// Bounds each page load.
    #[must_use]
    pub fn with_page_timeout(mut self, page_timeout: Duration) -> Self {
        self.navigator = Navigator::new(self.driver.clone(), self.store.clone(), page_timeout);
        self
    }

    /// Shared handle to the pattern store.
    #[must_use]
    pub fn store(&self) -> Arc<Mutex<PatternStore>> {
        self.store.clone()
    }

    /// Resolves `target` on `site` to a downloadable link.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoLinksFound`] when navigation finds no usable
    /// candidate, or [`ResolveError::AllCandidatesFailed`] with one entry per
    /// attempted candidate when every extraction fails.
    #[tracing::instrument(skip(self, site), fields(site = %site.id()))]
    pub async fn resolve(&self, site: &SiteTemplate, target: &EpisodeTarget) -> ExtractionResult {
        let site_lock = self
            .site_locks
            .entry(site.id().clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = site_lock.lock().await;

        let discovery = self.navigator.discover(site, target).await;
        let ordered = self.order_candidates(discovery.candidates);
        if ordered.is_empty() {
            self.record_all(site.id(), &discovery.failed_patterns, Outcome::Failure);
            self.persist();
            return Err(ResolveError::no_links(site.id().as_str(), &discovery.page_url));
        }

        let mut failures = Vec::new();
        let mut attempted: Vec<NavigationPattern> = Vec::new();
        for (kind, candidate) in ordered {
            if !attempted.contains(&candidate.source.pattern) {
                attempted.push(candidate.source.pattern.clone());
            }
            let Some(extractor) = self.extractors.get(kind) else {
                let reason = if kind.is_extractable() {
                    format!("no extractor registered for {kind}")
                } else {
                    format!("extraction is not supported for {kind} links")
                };
                warn!(host = %kind, url = %candidate.url, reason = %reason, "Candidate not extractable");
                failures.push(CandidateFailure {
                    error: ResolveError::rejected(&candidate.url, reason),
                    url: candidate.url,
                    host: kind,
                });
                continue;
            };

            debug!(
                host = %kind,
                url = %candidate.url,
                learned = candidate.source.learned,
                confidence = candidate.source.confidence,
                "Trying candidate"
            );
            match extractor.extract(&candidate.url).await {
                Ok(link) => {
                    info!(
                        host = %kind,
                        strategy = %link.strategy,
                        url = %link.url,
                        pattern = %candidate.source.pattern,
                        "Episode resolved"
                    );
                    self.record_all(site.id(), &discovery.failed_patterns, Outcome::Failure);
                    self.record_all(
                        site.id(),
                        std::slice::from_ref(&candidate.source.pattern),
                        Outcome::Success,
                    );
                    self.persist();
                    return Ok(link);
                }
                Err(error) => {
                    warn!(
                        host = %kind,
                        url = %candidate.url,
                        retryable = error.is_retryable(),
                        error = %error,
                        "Candidate failed"
                    );
                    failures.push(CandidateFailure {
                        url: candidate.url,
                        host: kind,
                        error,
                    });
                }
            }
        }

        for pattern in discovery.failed_patterns {
            if !attempted.contains(&pattern) {
                attempted.push(pattern);
            }
        }
        self.record_all(site.id(), &attempted, Outcome::Failure);
        self.persist();
        Err(ResolveError::all_failed(site.id().as_str(), failures))
    }

    /// Classifies, deduplicates and orders candidates.
    ///
    /// Order: host preference rank, then confidence (descending), then learned
    /// before generic. Ties keep discovery order.
    fn order_candidates(&self, candidates: Vec<CandidateLink>) -> Vec<(HostKind, CandidateLink)> {
        let mut seen = HashSet::new();
        let mut ordered: Vec<(HostKind, CandidateLink)> = candidates
            .into_iter()
            .filter(|candidate| seen.insert(candidate.url.clone()))
            .filter_map(|candidate| {
                let kind = classify(&candidate.url);
                if kind.is_supported() {
                    Some((kind, candidate))
                } else {
                    let rejection =
                        ResolveError::rejected(&candidate.url, "no supported provider matched");
                    debug!(error = %rejection, "Candidate skipped");
                    None
                }
            })
            .collect();
        ordered.sort_by_key(|(kind, candidate)| {
            (
                self.preference.rank(*kind),
                Reverse(candidate.source.confidence),
                !candidate.source.learned,
            )
        });
        ordered
    }

    fn record_all(&self, site: &SiteIdentifier, patterns: &[NavigationPattern], outcome: Outcome) {
        if patterns.is_empty() {
            return;
        }
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        for pattern in patterns {
            store.record(site, pattern, outcome);
        }
    }

    fn persist(&self) {
        let Some(path) = &self.store_path else {
            return;
        };
        let snapshot = self
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Err(e) = snapshot.save(path) {
            warn!(path = %path.display(), error = %e, "Pattern store not saved");
        }
    }
}

impl std::fmt::Debug for ResolutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionEngine")
            .field("navigator", &self.navigator)
            .field("extractors", &self.extractors)
            .field("store_path", &self.store_path)
            .field("preference", &self.preference)
            .finish_non_exhaustive()
    }
}
