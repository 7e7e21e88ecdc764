//! Configuration file loading and the engine-facing runtime config.
//!
//! The file is TOML, read from `--config PATH` or the default location
//! (`$XDG_CONFIG_HOME/animedl/config.toml`, then `$HOME/.config/animedl/config.toml`).
//! Every key is optional; [`EngineConfig::from_file_config`] fills defaults.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::host::{HostKind, HostPreference};
use crate::http_client::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS};
use crate::navigator::DEFAULT_PAGE_TIMEOUT;
use crate::site::SiteTemplate;

const APP_DIR: &str = "animedl";


/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but cannot be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`FileConfig`].
    #[error("failed to parse config file '{path}': {reason}\n  Suggestion: Check the TOML syntax and key names")]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// A value is outside its accepted range or format.
    #[error("Invalid config value for `{field}`: {value}. Expected {expected}")]
    InvalidValue {
        /// Offending key
        field: String,
        /// Offending value
        value: String,
        /// What would have been accepted
        expected: String,
    },

    /// A site name was requested that the config does not define.
    #[error("unknown site '{name}'\n  Suggestion: Add [sites.{name}] with a url_template, or pass a template containing {{episode}}")]
    UnknownSite {
        /// Requested site name
        name: String,
    },
}

impl ConfigError {
    fn invalid(field: &str, value: impl ToString, expected: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }
}

/// Page driver selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Plain HTTP fetch, no script execution.
    #[default]
    Http,
    /// Headless Chromium (cargo feature `chromium`).
    Chromium,
}

impl DriverKind {
    /// Returns the stable label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Chromium => "chromium",
        }
    }
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerbositySetting {
    /// `info`
    Default,
    /// `debug`
    Verbose,
    /// `error`
    Quiet,
    /// `trace`
    Debug,
}

impl VerbositySetting {
    /// Returns the stable string label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Verbose => "verbose",
            Self::Quiet => "quiet",
            Self::Debug => "debug",
        }
    }
}

/// A named streaming site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Episode URL template with `{show}` and `{episode}` placeholders.
    pub url_template: String,
}

/// TOML-backed file configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Pattern store JSON location.
    pub pattern_store: Option<PathBuf>,
    /// Bound on one page load, in seconds.
    pub page_timeout_secs: Option<u64>,
    /// Client connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Client read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Provider labels, most preferred first.
    pub host_preference: Option<Vec<String>>,
    /// Return the provider URL itself when no extraction rule matches.
    pub direct_fallback: Option<bool>,
    /// Custom User-Agent for page and provider requests.
    pub user_agent: Option<String>,
    /// Page driver.
    pub driver: Option<DriverKind>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
    /// Named sites.
    #[serde(default)]
    pub sites: BTreeMap<String, SiteConfig>,
}

impl FileConfig {
    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] with `path` as context on syntax or type errors.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string().trim_end().to_string(),
        })
    }

    /// Validates values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::InvalidValue`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_secs("page_timeout_secs", self.page_timeout_secs)?;
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        self.host_preference()?;

        if let Some(user_agent) = &self.user_agent
            && user_agent.trim().is_empty()
        {
            return Err(ConfigError::invalid(
                "user_agent",
                "\"\"",
                "a non-empty string",
            ));
        }

        for (name, site) in &self.sites {
            if let Err(e) = SiteTemplate::parse(&site.url_template) {
                return Err(ConfigError::invalid(
                    &format!("sites.{name}.url_template"),
                    &site.url_template,
                    format!("an http(s) URL containing {{episode}} ({e})"),
                ));
            }
        }
        Ok(())
    }

    /// Parses `host_preference`, if set.
    ///
    /// # Errors
    ///
    /// Rejects unknown labels, `unknown` and duplicates.
    pub fn host_preference(&self) -> Result<Option<HostPreference>, ConfigError> {
        let Some(labels) = &self.host_preference else {
            return Ok(None);
        };
        let expected = || {
            let labels: Vec<&str> = HostKind::SUPPORTED.iter().map(|k| k.as_str()).collect();
            format!("distinct labels from [{}]", labels.join(", "))
        };
        let mut kinds = Vec::with_capacity(labels.len());
        for label in labels {
            let kind = label
                .parse::<HostKind>()
                .ok()
                .filter(|kind| kind.is_supported())
                .ok_or_else(|| ConfigError::invalid("host_preference", label, expected()))?;
            if kinds.contains(&kind) {
                return Err(ConfigError::invalid(
                    "host_preference",
                    format!("duplicate '{label}'"),
                    expected(),
                ));
            }
            kinds.push(kind);
        }
        Ok(Some(HostPreference::new(kinds)))
    }

    /// Resolves `--site` input: a configured name, or an inline template.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownSite`] for an unconfigured name and
    /// [`ConfigError::InvalidValue`] for a malformed template.
    pub fn site_template(&self, name_or_template: &str) -> Result<SiteTemplate, ConfigError> {
        let raw = match self.sites.get(name_or_template) {
            Some(site) => site.url_template.as_str(),
            None if name_or_template.contains("{episode}") => name_or_template,
            None => {
                return Err(ConfigError::UnknownSite {
                    name: name_or_template.to_string(),
                });
            }
        };
        SiteTemplate::parse(raw)
            .map_err(|e| ConfigError::invalid("site", raw, format!("a valid site template ({e})")))
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<(), ConfigError> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::invalid(field, value, "range: 1..=3600"));
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config (default when no file exists).
    pub config: FileConfig,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/animedl/config.toml`
/// 2. `$HOME/.config/animedl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }
    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

/// Resolves the default pattern store location.
///
/// Priority:
/// 1. `$XDG_DATA_HOME/animedl/patterns.json`
/// 2. `$HOME/.local/share/animedl/patterns.json`
/// 3. `./animedl-patterns.json`
#[must_use]
pub fn resolve_default_store_path() -> PathBuf {
    if let Some(xdg_data_home) = env_var_non_empty_os("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data_home).join(APP_DIR).join("patterns.json");
    }
    match env_var_non_empty_os("HOME") {
        Some(home) => PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR)
            .join("patterns.json"),
        None => PathBuf::from("animedl-patterns.json"),
    }
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit` if given, else from the default path if present.
///
/// An explicit path must exist; a missing default file yields defaults.
///
/// # Errors
///
/// Returns [`ConfigError`] on read, parse or validation failure.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: FileConfig::default(),
            loaded_from_file: false,
        }),
    }
}

/// Reads, parses and validates one config file.
///
/// # Errors
///
/// Returns [`ConfigError`] on read, parse or validation failure.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = FileConfig::from_toml(&text, path)?;
    config.validate()?;
    Ok(config)
}

/// Typed runtime settings for the resolution engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pattern store JSON location.
    pub pattern_store: PathBuf,
    /// Bound on one page load.
    pub page_timeout: Duration,
    /// Client connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Client read timeout in seconds.
    pub read_timeout_secs: u64,
    /// Provider order for extraction attempts.
    pub host_preference: HostPreference,
    /// Return the provider URL itself when no extraction rule matches.
    pub direct_fallback: bool,
    /// Custom User-Agent; `None` uses the built-in browser UA.
    pub user_agent: Option<String>,
    /// Page driver.
    pub driver: DriverKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pattern_store: resolve_default_store_path(),
            page_timeout: DEFAULT_PAGE_TIMEOUT,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            host_preference: HostPreference::default(),
            direct_fallback: true,
            user_agent: None,
            driver: DriverKind::default(),
        }
    }
}

impl EngineConfig {
    /// Applies file values over defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `file` does not validate.
    pub fn from_file_config(file: &FileConfig) -> Result<Self, ConfigError> {
        file.validate()?;
        let defaults = Self::default();
        Ok(Self {
            pattern_store: file
                .pattern_store
                .clone()
                .unwrap_or(defaults.pattern_store),
            page_timeout: file
                .page_timeout_secs
                .map_or(defaults.page_timeout, Duration::from_secs),
            connect_timeout_secs: file
                .connect_timeout_secs
                .unwrap_or(defaults.connect_timeout_secs),
            read_timeout_secs: file.read_timeout_secs.unwrap_or(defaults.read_timeout_secs),
            host_preference: file
                .host_preference()?
                .unwrap_or(defaults.host_preference),
            direct_fallback: file.direct_fallback.unwrap_or(defaults.direct_fallback),
            user_agent: file.user_agent.clone(),
            driver: file.driver.unwrap_or(defaults.driver),
        })
    }
}
