//! Navigator: finds candidate download links on a streaming site's episode page.
//!
//! Learned patterns from the [`PatternStore`] are tried first, in stored order.
//! Links of other providers collected by a matching pattern are kept as mirror
//! candidates. When no pattern surfaces a link of its declared provider, generic
//! discovery scans known server-list selectors, then every link-bearing element,
//! and finally follows a download button to a separate download page. Generic
//! and mirror candidates carry a synthesized recipe so the engine can learn it.
//!
//! # Architecture
//!
//! - [`BrowserDriver`] - loads pages; [`HttpDriver`] by default, `ChromiumDriver`
//!   with the `chromium` feature
//! - [`PageSnapshot`] / [`PageElement`] - selector queries over loaded markup
//! - [`Navigator::discover`] - produces a [`Discovery`]

#[cfg(feature = "chromium")]
mod chromium;
mod driver;
mod heuristics;

#[cfg(feature = "chromium")]
pub use chromium::ChromiumDriver;
pub use driver::{BrowserDriver, DriverError, HttpDriver, PageElement, PageSnapshot, ParsedPage};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::host::{HostKind, classify};
use crate::patterns::{NavigationPattern, NavigationStep, PatternRecord, PatternStore};
use crate::site::{EpisodeTarget, SiteIdentifier, SiteTemplate};
use crate::utils::absolutize_url;

use heuristics::{
    CATCH_ALL_SELECTOR, DOWNLOAD_BUTTON_SELECTORS, DOWNLOAD_KEYWORDS, LINK_ATTRIBUTES,
    link_list_selectors, provisional_confidence,
};

/// Default bound on a single page load.
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a candidate came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSource {
    /// Recipe that produced the candidate.
    pub pattern: NavigationPattern,
    /// True when the recipe came from the store.
    pub learned: bool,
    /// Stored confidence, or the provisional confidence of a generic recipe.
    pub confidence: u32,
}

/// A raw link found during navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    /// Absolute link URL.
    pub url: String,
    /// Anchor text.
    pub text: String,
    /// Attributes of the element carrying the link.
    pub attributes: BTreeMap<String, String>,
    /// Recipe and confidence.
    pub source: CandidateSource,
}

/// Outcome of one navigation.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Episode page URL.
    pub page_url: String,
    /// Candidates, deduplicated by URL, learned ones first.
    pub candidates: Vec<CandidateLink>,
    /// Learned patterns that ran and surfaced nothing.
    pub failed_patterns: Vec<NavigationPattern>,
    /// True when generic discovery ran.
    pub used_generic: bool,
}

struct GenericHit {
    url: String,
    element: PageElement,
    pattern: NavigationPattern,
    confidence: u32,
}

type PageCache = HashMap<String, Option<PageSnapshot>>;

/// Drives a [`BrowserDriver`] to find candidate links.
pub struct Navigator {
    driver: Arc<dyn BrowserDriver>,
    store: Arc<Mutex<PatternStore>>,
    page_timeout: Duration,
}

impl Navigator {
    /// Creates a navigator reading learned patterns from `store`.
    #[must_use]
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        store: Arc<Mutex<PatternStore>>,
        page_timeout: Duration,
    ) -> Self {
        Self {
            driver,
            store,
            page_timeout,
        }
    }

    /// Finds candidate links for `target` on the site described by `site`.
    ///
    /// Never fails: unreachable or slow pages yield no candidates.
    #[tracing::instrument(skip(self, site), fields(site = %site.id(), driver = self.driver.name()))]
    pub async fn discover(&self, site: &SiteTemplate, target: &EpisodeTarget) -> Discovery {
        let page_url = site.episode_url(target);
        let mut discovery = Discovery {
            page_url: page_url.clone(),
            ..Discovery::default()
        };
        let mut cache = PageCache::new();
        let Some(episode) = self.load_cached(&mut cache, &page_url).await else {
            return discovery;
        };

        let mut seen = HashSet::new();
        let mut mirrors = Vec::new();
        for record in self.learned_patterns(site.id()) {
            let links = self.run_pattern(&mut cache, &episode, &record.pattern).await;
            let (matching, others): (Vec<_>, Vec<_>) = links
                .into_iter()
                .partition(|(url, _)| classify(url) == record.pattern.host_kind);
            if matching.is_empty() {
                debug!(pattern = %record.pattern, "Learned pattern surfaced nothing");
                discovery.failed_patterns.push(record.pattern);
                continue;
            }
            debug!(pattern = %record.pattern, links = matching.len(), "Learned pattern matched");
            for (url, element) in matching {
                push_candidate(
                    &mut discovery.candidates,
                    &mut seen,
                    url,
                    element,
                    CandidateSource {
                        pattern: record.pattern.clone(),
                        learned: true,
                        confidence: record.confidence,
                    },
                );
            }
            mirrors.extend(mirror_hits(&record, others));
        }

        if discovery.candidates.is_empty() {
            discovery.used_generic = true;
            for hit in self.generic_discovery(&mut cache, &episode).await {
                push_candidate(
                    &mut discovery.candidates,
                    &mut seen,
                    hit.url,
                    hit.element,
                    CandidateSource {
                        pattern: hit.pattern,
                        learned: false,
                        confidence: hit.confidence,
                    },
                );
            }
        } else {
            for hit in mirrors {
                push_candidate(
                    &mut discovery.candidates,
                    &mut seen,
                    hit.url,
                    hit.element,
                    CandidateSource {
                        pattern: hit.pattern,
                        learned: false,
                        confidence: hit.confidence,
                    },
                );
            }
        }

        info!(
            candidates = discovery.candidates.len(),
            failed_patterns = discovery.failed_patterns.len(),
            used_generic = discovery.used_generic,
            "Discovery finished"
        );
        discovery
    }

    fn learned_patterns(&self, site: &SiteIdentifier) -> Vec<PatternRecord> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(site)
    }

    async fn load_cached(&self, cache: &mut PageCache, url: &str) -> Option<PageSnapshot> {
        if let Some(cached) = cache.get(url) {
            return cached.clone();
        }
        let loaded =
            match tokio::time::timeout(self.page_timeout, self.driver.load(url, self.page_timeout))
                .await
            {
                Ok(Ok(page)) => Some(page),
                Ok(Err(e)) => {
                    warn!(url, error = %e, "Page load failed");
                    None
                }
                Err(_) => {
                    warn!(
                        url,
                        timeout_ms = self.page_timeout.as_millis(),
                        "Page load timed out"
                    );
                    None
                }
            };
        cache.insert(url.to_string(), loaded.clone());
        loaded
    }

    async fn run_pattern(
        &self,
        cache: &mut PageCache,
        episode: &PageSnapshot,
        pattern: &NavigationPattern,
    ) -> Vec<(String, PageElement)> {
        let mut current = episode.clone();
        let mut links = Vec::new();
        for step in &pattern.steps {
            match step {
                NavigationStep::FollowLink { selector } => {
                    let next = first_link(&current.parse(), selector);
                    let Some(next) = next else {
                        return Vec::new();
                    };
                    let Some(page) = self.load_cached(cache, &next).await else {
                        return Vec::new();
                    };
                    current = page;
                }
                NavigationStep::FollowText { needle } => {
                    let next = link_by_text(&current.parse(), needle);
                    let Some(next) = next else {
                        return Vec::new();
                    };
                    let Some(page) = self.load_cached(cache, &next).await else {
                        return Vec::new();
                    };
                    current = page;
                }
                NavigationStep::CollectLinks { selector } => {
                    for element in current.parse().find_all(selector) {
                        if let Some(url) = element_link(&element, current.url()) {
                            links.push((url, element));
                        }
                    }
                }
            }
        }
        links
    }

    async fn generic_discovery(
        &self,
        cache: &mut PageCache,
        episode: &PageSnapshot,
    ) -> Vec<GenericHit> {
        let (hits, button) = {
            let parsed = episode.parse();
            let hits = scan_for_provider_links(&parsed, &[]);
            let button = if hits.is_empty() {
                find_download_button(&parsed)
            } else {
                None
            };
            (hits, button)
        };
        if !hits.is_empty() {
            return hits;
        }
        let Some((step, next)) = button else {
            debug!("No provider links and no download button on episode page");
            return Vec::new();
        };
        debug!(step = %step, url = %next, "Following download button");
        match self.load_cached(cache, &next).await {
            Some(page) => scan_for_provider_links(&page.parse(), &[step]),
            None => Vec::new(),
        }
    }
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("driver", &self.driver.name())
            .field("page_timeout", &self.page_timeout)
            .finish_non_exhaustive()
    }
}

fn push_candidate(
    candidates: &mut Vec<CandidateLink>,
    seen: &mut HashSet<String>,
    url: String,
    element: PageElement,
    source: CandidateSource,
) {
    if !seen.insert(url.clone()) {
        return;
    }
    candidates.push(CandidateLink {
        url,
        text: element.text,
        attributes: element.attributes,
        source,
    });
}

fn element_link(element: &PageElement, base: &Url) -> Option<String> {
    LINK_ATTRIBUTES
        .iter()
        .filter_map(|name| element.attribute(name))
        .find_map(|value| absolutize_url(value, base))
}

/// Mirror candidates from links a learned pattern collected for other providers.
fn mirror_hits(record: &PatternRecord, others: Vec<(String, PageElement)>) -> Vec<GenericHit> {
    let classified: Vec<(String, PageElement, HostKind)> = others
        .into_iter()
        .filter_map(|(url, element)| {
            let kind = classify(&url);
            kind.is_supported().then_some((url, element, kind))
        })
        .collect();
    let mut counts: HashMap<HostKind, usize> = HashMap::new();
    for (_, _, kind) in &classified {
        *counts.entry(*kind).or_default() += 1;
    }
    classified
        .into_iter()
        .map(|(url, element, kind)| GenericHit {
            url,
            element,
            pattern: NavigationPattern::new(record.pattern.steps.clone(), kind),
            confidence: provisional_confidence(counts.get(&kind).copied().unwrap_or(0))
                .min(record.confidence),
        })
        .collect()
}

fn first_link(page: &ParsedPage<'_>, selector: &str) -> Option<String> {
    page.find_all(selector)
        .iter()
        .find_map(|element| element_link(element, page.url()))
}

fn link_by_text(page: &ParsedPage<'_>, needle: &str) -> Option<String> {
    let needle = needle.to_lowercase();
    page.find_all("a, button")
        .iter()
        .filter(|element| element.text.to_lowercase().contains(&needle))
        .find_map(|element| element_link(element, page.url()))
}

/// Known button selectors first, then anchor text.
fn find_download_button(page: &ParsedPage<'_>) -> Option<(NavigationStep, String)> {
    for selector in DOWNLOAD_BUTTON_SELECTORS {
        if let Some(url) = first_link(page, selector) {
            return Some((
                NavigationStep::FollowLink {
                    selector: (*selector).to_string(),
                },
                url,
            ));
        }
    }
    for needle in DOWNLOAD_KEYWORDS {
        if let Some(url) = link_by_text(page, needle) {
            return Some((
                NavigationStep::FollowText {
                    needle: (*needle).to_string(),
                },
                url,
            ));
        }
    }
    None
}

/// Returns supported-provider links from the first productive selector.
fn scan_for_provider_links(page: &ParsedPage<'_>, prefix: &[NavigationStep]) -> Vec<GenericHit> {
    let selectors = link_list_selectors();
    let all = selectors
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(CATCH_ALL_SELECTOR));
    for selector in all {
        let classified: Vec<(String, PageElement, HostKind)> = page
            .find_all(selector)
            .into_iter()
            .filter_map(|element| {
                let url = element_link(&element, page.url())?;
                let kind = classify(&url);
                kind.is_supported().then_some((url, element, kind))
            })
            .collect();
        if classified.is_empty() {
            continue;
        }

        let mut counts: HashMap<HostKind, usize> = HashMap::new();
        for (_, _, kind) in &classified {
            *counts.entry(*kind).or_default() += 1;
        }
        debug!(selector, links = classified.len(), "Generic selector matched");
        return classified
            .into_iter()
            .map(|(url, element, kind)| {
                let mut steps = prefix.to_vec();
                steps.push(NavigationStep::CollectLinks {
                    selector: selector.to_string(),
                });
                GenericHit {
                    url,
                    element,
                    pattern: NavigationPattern::new(steps, kind),
                    confidence: provisional_confidence(counts.get(&kind).copied().unwrap_or(0)),
                }
            })
            .collect();
    }
    Vec::new()
}
