//! Persistent per-site pattern store.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::site::SiteIdentifier;

use super::{NavigationPattern, Outcome, PatternRecord, StorePolicy};

/// On-disk format version written by [`PatternStore::save`].
pub const STORE_FORMAT_VERSION: u32 = 1;

#[derive(Deserialize)]
struct StoreDocument {
    version: u32,
    #[serde(default)]
    sites: BTreeMap<String, Vec<PatternRecord>>,
}

#[derive(Serialize)]
struct StoreDocumentRef<'a> {
    version: u32,
    sites: &'a BTreeMap<String, Vec<PatternRecord>>,
}

/// Site identifier to ordered pattern records, most recently successful first.
///
/// The store is plain data: callers share it behind a mutex and persist it with
/// [`PatternStore::save`] after each resolution attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternStore {
    sites: BTreeMap<String, Vec<PatternRecord>>,
    policy: StorePolicy,
}

impl PatternStore {
    /// Creates an empty store with the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the confidence policy.
    #[must_use]
    pub fn with_policy(mut self, policy: StorePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the active policy.
    #[must_use]
    pub fn policy(&self) -> StorePolicy {
        self.policy
    }

    /// Returns the learned patterns for `site` in preference order.
    #[must_use]
    pub fn lookup(&self, site: &SiteIdentifier) -> Vec<PatternRecord> {
        self.sites.get(site.as_str()).cloned().unwrap_or_default()
    }

    /// Iterates over every site and its records, sorted by site key.
    pub fn sites(&self) -> impl Iterator<Item = (&str, &[PatternRecord])> {
        self.sites
            .iter()
            .map(|(site, records)| (site.as_str(), records.as_slice()))
    }

    /// Number of stored records across all sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.values().map(Vec::len).sum()
    }

    /// Returns true when no site has a stored record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies the outcome of using `pattern` on `site`.
    ///
    /// Success moves the record to the front, creating it if needed. Failure
    /// demotes it to the end or evicts it; failure of an unknown pattern is ignored.
    pub fn record(&mut self, site: &SiteIdentifier, pattern: &NavigationPattern, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.record_success(site, pattern),
            Outcome::Failure => self.record_failure(site, pattern),
        }
    }

    fn record_success(&mut self, site: &SiteIdentifier, pattern: &NavigationPattern) {
        let policy = self.policy;
        let records = self.sites.entry(site.as_str().to_string()).or_default();
        let mut record = match records.iter().position(|r| r.pattern == *pattern) {
            Some(index) => {
                let mut existing = records.remove(index);
                existing.confidence = (existing.confidence + policy.success_boost).min(100);
                existing
            }
            None => PatternRecord {
                pattern: pattern.clone(),
                confidence: policy.initial_confidence.min(100),
                successes: 0,
                failures: 0,
                consecutive_failures: 0,
                revision: 0,
                last_success_unix: None,
            },
        };
        record.successes += 1;
        record.consecutive_failures = 0;
        record.revision += 1;
        record.last_success_unix = unix_now();
        debug!(
            site = %site,
            pattern = %record.pattern,
            confidence = record.confidence,
            "Pattern promoted"
        );
        records.insert(0, record);
    }

    fn record_failure(&mut self, site: &SiteIdentifier, pattern: &NavigationPattern) {
        let policy = self.policy;
        let Some(records) = self.sites.get_mut(site.as_str()) else {
            return;
        };
        let Some(index) = records.iter().position(|r| r.pattern == *pattern) else {
            return;
        };
        let mut record = records.remove(index);
        record.confidence = record.confidence.saturating_sub(policy.failure_penalty);
        record.failures += 1;
        record.consecutive_failures += 1;
        record.revision += 1;

        if record.confidence < policy.confidence_floor
            || record.consecutive_failures >= policy.max_consecutive_failures
        {
            debug!(
                site = %site,
                pattern = %record.pattern,
                confidence = record.confidence,
                consecutive_failures = record.consecutive_failures,
                "Pattern evicted"
            );
        } else {
            debug!(site = %site, pattern = %record.pattern, "Pattern demoted");
            records.push(record);
        }
        if records.is_empty() {
            self.sites.remove(site.as_str());
        }
    }

    /// Loads a store, failing on unreadable content.
    ///
    /// A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::StoreCorrupted`] when the file cannot be read, is
    /// not valid JSON or carries an unsupported version.
    pub fn try_load(path: &Path) -> Result<Self, ResolveError> {
        let display = path.display().to_string();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(ResolveError::store_corrupted(&display, e.to_string())),
        };
        let document: StoreDocument = serde_json::from_str(&raw)
            .map_err(|e| ResolveError::store_corrupted(&display, e.to_string()))?;
        if document.version != STORE_FORMAT_VERSION {
            return Err(ResolveError::store_corrupted(
                &display,
                format!(
                    "unsupported version {} (expected {STORE_FORMAT_VERSION})",
                    document.version
                ),
            ));
        }

        let mut sites = document.sites;
        sites.retain(|_, records| !records.is_empty());
        for record in sites.values_mut().flatten() {
            record.confidence = record.confidence.min(100);
        }
        Ok(Self {
            sites,
            policy: StorePolicy::default(),
        })
    }

    /// Loads a store; never fails.
    ///
    /// Corrupted files are logged and treated as empty so resolution can proceed
    /// with generic discovery.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(store) => {
                debug!(path = %path.display(), records = store.len(), "Pattern store loaded");
                store
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable pattern store");
                Self::new()
            }
        }
    }

    /// Persists the store atomically (temp file in the same directory, then rename).
    ///
    /// # Errors
    ///
    /// Returns an IO error when the directory cannot be created or the file
    /// cannot be written or renamed.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let document = StoreDocumentRef {
            version: STORE_FORMAT_VERSION,
            sites: &self.sites,
        };
        let mut json = serde_json::to_string_pretty(&document).map_err(std::io::Error::other)?;
        json.push('\n');

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        debug!(path = %path.display(), records = self.len(), "Pattern store saved");
        Ok(())
    }
}

fn unix_now() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|elapsed| elapsed.as_secs())
}
