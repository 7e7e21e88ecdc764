//! Streaming-site templates, site identifiers and episode targets.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::utils::canonical_host;

const SHOW_PLACEHOLDER: &str = "{show}";
const EPISODE_PLACEHOLDER: &str = "{episode}";

/// Errors for site templates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SiteError {
    /// The template is not an absolute http(s) URL.
    #[error("site template '{template}' is not an http(s) URL")]
    InvalidUrl {
        /// Offending template
        template: String,
    },
    /// The template lacks the `{episode}` placeholder.
    #[error("site template '{template}' has no {{episode}} placeholder")]
    MissingEpisodePlaceholder {
        /// Offending template
        template: String,
    },
}

/// Stable key naming a streaming site's navigation template.
///
/// Built from the template host (lowercased, `www.` stripped) plus the path and
/// query template with placeholders kept verbatim, so every episode of every show
/// on the same layout shares learned patterns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteIdentifier(String);

impl SiteIdentifier {
    /// Wraps an already-normalized key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A configured episode URL template, e.g. `https://witanime.cyou/episode/{show}-episode-{episode}/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteTemplate {
    template: String,
    id: SiteIdentifier,
}

impl SiteTemplate {
    /// Parses and validates a URL template.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError`] when the template is not an http(s) URL or has no
    /// `{episode}` placeholder.
    pub fn parse(template: &str) -> Result<Self, SiteError> {
        let template = template.trim().to_string();
        if !template.contains(EPISODE_PLACEHOLDER) {
            return Err(SiteError::MissingEpisodePlaceholder { template });
        }
        // Placeholders are not valid in every URL position; check with sample values.
        let sample = template
            .replace(SHOW_PLACEHOLDER, "show")
            .replace(EPISODE_PLACEHOLDER, "1");
        let parsed = Url::parse(&sample).map_err(|_| SiteError::InvalidUrl {
            template: template.clone(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(SiteError::InvalidUrl { template });
        }
        let id = identifier_for(&template);
        Ok(Self { template, id })
    }

    /// Returns the identifier shared by every episode rendered from this template.
    #[must_use]
    pub fn id(&self) -> &SiteIdentifier {
        &self.id
    }

    /// Returns the raw template.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Renders the episode page URL for `target`.
    #[must_use]
    pub fn episode_url(&self, target: &EpisodeTarget) -> String {
        self.template
            .replace(SHOW_PLACEHOLDER, &target.show)
            .replace(EPISODE_PLACEHOLDER, &target.episode)
    }
}

fn identifier_for(template: &str) -> SiteIdentifier {
    let without_scheme = template
        .split_once("://")
        .map_or(template, |(_, rest)| rest);
    let (host, rest) = match without_scheme.find(['/', '?']) {
        Some(index) => without_scheme.split_at(index),
        None => (without_scheme, ""),
    };
    let rest = rest.split('#').next().unwrap_or_default();
    SiteIdentifier(format!("{}{}", canonical_host(host), rest))
}

/// Show and episode to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeTarget {
    /// Show slug as used in the site's URLs.
    pub show: String,
    /// Episode number as text (keeps values like `12.5`).
    pub episode: String,
}

impl EpisodeTarget {
    /// Creates a target from a show slug and episode label.
    #[must_use]
    pub fn new(show: impl Into<String>, episode: impl Into<String>) -> Self {
        Self {
            show: show.into().trim().to_string(),
            episode: episode.into().trim().to_string(),
        }
    }
}

impl fmt::Display for EpisodeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.show, self.episode)
    }
}
