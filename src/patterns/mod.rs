//! Learned navigation patterns and their persistent store.
//!
//! A [`NavigationPattern`] is a typed recipe: an ordered list of
//! [`NavigationStep`]s executed against the episode page plus the [`HostKind`]
//! the recipe reliably surfaces. The [`PatternStore`] keeps, per site, the
//! patterns that worked, most recently successful first.

mod store;

pub use store::{PatternStore, STORE_FORMAT_VERSION};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::host::HostKind;

/// One navigation step of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum NavigationStep {
    /// Navigate to the link of the first element matching `selector`.
    FollowLink {
        /// CSS selector of the element carrying the link
        selector: String,
    },
    /// Navigate to the first anchor whose text contains `needle` (case-insensitive).
    FollowText {
        /// Text fragment, e.g. "download"
        needle: String,
    },
    /// Collect the links of every element matching `selector` on the current page.
    CollectLinks {
        /// CSS selector of link-bearing elements
        selector: String,
    },
}

impl fmt::Display for NavigationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FollowLink { selector } => write!(f, "follow({selector})"),
            Self::FollowText { needle } => write!(f, "follow-text({needle})"),
            Self::CollectLinks { selector } => write!(f, "collect({selector})"),
        }
    }
}

/// A reusable recipe for finding download links on a site.
///
/// Two patterns are the same entry when their steps and host kind are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NavigationPattern {
    /// Steps in execution order; the last one is expected to collect links.
    pub steps: Vec<NavigationStep>,
    /// Provider the recipe surfaces.
    pub host_kind: HostKind,
}

impl NavigationPattern {
    /// Creates a recipe.
    #[must_use]
    pub fn new(steps: Vec<NavigationStep>, host_kind: HostKind) -> Self {
        Self { steps, host_kind }
    }
}

impl fmt::Display for NavigationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self.steps.iter().map(ToString::to_string).collect();
        write!(f, "{} -> {}", steps.join(" > "), self.host_kind)
    }
}

/// Stored pattern with usage statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRecord {
    /// The recipe.
    pub pattern: NavigationPattern,
    /// Confidence in percent (0..=100).
    pub confidence: u32,
    /// Total successful resolutions.
    pub successes: u32,
    /// Total failed resolutions.
    pub failures: u32,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Bumped on every mutation of this record.
    pub revision: u32,
    /// Unix timestamp (seconds) of the last success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success_unix: Option<u64>,
}

impl PatternRecord {
    /// Success ratio over all recorded outcomes, in percent.
    #[must_use]
    pub fn success_rate(&self) -> u32 {
        let total = self.successes + self.failures;
        if total == 0 {
            return 0;
        }
        self.successes * 100 / total
    }
}

/// Outcome of using a pattern during one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The pattern produced the link that resolved.
    Success,
    /// The pattern produced nothing usable.
    Failure,
}

/// Tuning knobs for confidence bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    /// Confidence of a newly learned pattern.
    pub initial_confidence: u32,
    /// Added on success (capped at 100).
    pub success_boost: u32,
    /// Subtracted on failure.
    pub failure_penalty: u32,
    /// Records below this confidence are evicted.
    pub confidence_floor: u32,
    /// Records failing this many times in a row are evicted.
    pub max_consecutive_failures: u32,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            initial_confidence: 60,
            success_boost: 10,
            failure_penalty: 20,
            confidence_floor: 20,
            max_consecutive_failures: 3,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_pattern() -> NavigationPattern {
        NavigationPattern::new(
            vec![
                NavigationStep::FollowText {
                    needle: "download".to_string(),
                },
                NavigationStep::CollectLinks {
                    selector: ".download-servers a".to_string(),
                },
            ],
            HostKind::MediaFire,
        )
    }

    #[test]
    fn test_pattern_display_lists_steps() {
        assert_eq!(
            sample_pattern().to_string(),
            "follow-text(download) > collect(.download-servers a) -> mediafire"
        );
    }

    #[test]
    fn test_pattern_serializes_tagged_steps() {
        let json = serde_json::to_value(sample_pattern()).unwrap();
        assert_eq!(json["steps"][0]["step"], "follow_text");
        assert_eq!(json["steps"][1]["selector"], ".download-servers a");
        assert_eq!(json["host_kind"], "mediafire");
    }

    #[test]
    fn test_success_rate() {
        let record = PatternRecord {
            pattern: sample_pattern(),
            confidence: 60,
            successes: 3,
            failures: 1,
            consecutive_failures: 0,
            revision: 4,
            last_success_unix: None,
        };
        assert_eq!(record.success_rate(), 75);
    }
}
