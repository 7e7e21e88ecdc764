//! Error types for link resolution.
//!
//! Every failure mode of the resolution pipeline has a named variant here,
//! following the What/Suggestion layout used across the project. Per-candidate
//! failures are collected by the engine; only aggregate outcomes reach callers.

use std::fmt;

use thiserror::Error;

use crate::host::HostKind;

/// Errors that can occur while resolving an episode to a downloadable URL.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// A page or provider could not be reached (timeout, DNS, 5xx, throttling).
    #[error("network failure for '{url}': {reason}\n  Suggestion: Check connectivity and retry later")]
    NetworkFailure {
        /// URL that could not be fetched
        url: String,
        /// What went wrong
        reason: String,
    },

    /// Navigation found no candidate links for the episode.
    #[error(
        "no download links found for site '{site}' at '{page_url}'\n  Suggestion: Verify the episode exists or update the site URL template"
    )]
    NoLinksFound {
        /// Site identifier that was navigated
        site: String,
        /// Episode page URL
        page_url: String,
    },

    /// The link did not match any supported hosting provider.
    #[error("link '{url}' was rejected: {reason}")]
    ClassificationRejected {
        /// Rejected URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The provider page was not recognized by any extraction rule.
    #[error(
        "{host} page structure not recognized for '{url}'\n  Suggestion: The provider may have changed its markup; enable direct fallback or report the page"
    )]
    ExtractionPatternMiss {
        /// Provider the page belongs to
        host: HostKind,
        /// Provider URL
        url: String,
    },

    /// The provider explicitly rejected the link (removed, expired or invalid).
    #[error("{host} rejected link '{url}': {reason}\n  Suggestion: Try another mirror for this episode")]
    InvalidOrExpiredLink {
        /// Provider that rejected the link
        host: HostKind,
        /// Provider URL
        url: String,
        /// Rejection detail
        reason: String,
    },

    /// Every candidate link failed.
    #[error(
        "all {} candidate link(s) failed for site '{site}'\n  Suggestion: Retry later or check the individual failures", .failures.len()
    )]
    AllCandidatesFailed {
        /// Site identifier
        site: String,
        /// One entry per attempted candidate, in attempt order
        failures: Vec<CandidateFailure>,
    },

    /// The persisted pattern store could not be read.
    #[error("pattern store '{path}' is unreadable: {reason}")]
    StoreCorrupted {
        /// Store location
        path: String,
        /// Parse or IO detail
        reason: String,
    },
}

impl ResolveError {
    /// Creates a `NetworkFailure` error.
    #[must_use]
    pub fn network(url: &str, reason: impl Into<String>) -> Self {
        Self::NetworkFailure {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a `NoLinksFound` error.
    #[must_use]
    pub fn no_links(site: &str, page_url: &str) -> Self {
        Self::NoLinksFound {
            site: site.to_string(),
            page_url: page_url.to_string(),
        }
    }

    /// Creates a `ClassificationRejected` error.
    #[must_use]
    pub fn rejected(url: &str, reason: impl Into<String>) -> Self {
        Self::ClassificationRejected {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an `ExtractionPatternMiss` error.
    #[must_use]
    pub fn pattern_miss(host: HostKind, url: &str) -> Self {
        Self::ExtractionPatternMiss {
            host,
            url: url.to_string(),
        }
    }

    /// Creates an `InvalidOrExpiredLink` error.
    #[must_use]
    pub fn invalid_link(host: HostKind, url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOrExpiredLink {
            host,
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an `AllCandidatesFailed` error.
    #[must_use]
    pub fn all_failed(site: &str, failures: Vec<CandidateFailure>) -> Self {
        Self::AllCandidatesFailed {
            site: site.to_string(),
            failures,
        }
    }

    /// Creates a `StoreCorrupted` error.
    #[must_use]
    pub fn store_corrupted(path: &str, reason: impl Into<String>) -> Self {
        Self::StoreCorrupted {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true when retrying the same operation later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure { .. })
    }

    /// Returns the stable label of this failure kind.
    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::NetworkFailure { .. } => "network_failure",
            Self::NoLinksFound { .. } => "no_links_found",
            Self::ClassificationRejected { .. } => "classification_rejected",
            Self::ExtractionPatternMiss { .. } => "extraction_pattern_miss",
            Self::InvalidOrExpiredLink { .. } => "invalid_or_expired_link",
            Self::AllCandidatesFailed { .. } => "all_candidates_failed",
            Self::StoreCorrupted { .. } => "store_corrupted",
        }
    }
}

/// Failure of a single candidate link inside the extract loop.
#[derive(Debug, Clone)]
pub struct CandidateFailure {
    /// Candidate URL that was attempted
    pub url: String,
    /// Classified provider of the candidate
    pub host: HostKind,
    /// Why the attempt failed
    pub error: ResolveError,
}

impl fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.host, self.url, self.error.kind_label())
    }
}
