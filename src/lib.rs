//! Adaptive download-link resolver for anime streaming sites.
//!
//! Given a streaming site's episode URL template and a show/episode, the
//! resolver navigates to the episode page, collects links to file-hosting
//! providers, classifies them structurally and extracts a downloadable URL
//! from the best provider. Navigation recipes that work are remembered per
//! site in a persistent pattern store, so later resolutions skip discovery.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`host`] - provider kinds, structural URL classifier, host preference
//! - [`extractor`] - per-provider extractors and their registry
//! - [`patterns`] - learned navigation patterns and the JSON pattern store
//! - [`navigator`] - page drivers and link discovery on episode pages
//! - [`engine`] - the resolution state machine tying everything together
//! - [`config`] - TOML file config and the engine-facing runtime config

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod host;
pub mod http_client;
pub mod navigator;
pub mod patterns;
pub mod site;
pub mod utils;

mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, DriverKind, EngineConfig, FileConfig, load_config};
pub use engine::ResolutionEngine;
pub use error::{CandidateFailure, ResolveError};
pub use extractor::{
    ExtractionResult, ExtractionStrategy, ExtractorRegistry, HostExtractor, ResolvedLink,
    build_default_extractor_registry,
};
pub use host::{HostKind, HostPreference, classify};
pub use http_client::configure_http_policy;
pub use navigator::{BrowserDriver, HttpDriver, Navigator, PageSnapshot};
pub use patterns::{NavigationPattern, NavigationStep, Outcome, PatternRecord, PatternStore};
pub use site::{EpisodeTarget, SiteIdentifier, SiteTemplate};
