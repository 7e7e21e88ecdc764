//! Shared HTTP client construction policy.
//!
//! Extractors and the HTTP page driver build their clients here so they agree
//! on timeouts, User-Agent, compression, cookies and proxy handling.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use reqwest::Client;
use reqwest::cookie::Jar;
use reqwest::{ClientBuilder, Proxy};
use thiserror::Error;
use tracing::warn;

use crate::user_agent;

/// Default client connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default client read timeout.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Errors building an HTTP client.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// Client construction panicked even with the env-proxy fallback.
    #[error("HTTP client construction panicked for {component}")]
    Panicked {
        /// Component that requested the client
        component: String,
    },

    /// reqwest rejected the client configuration.
    #[error("HTTP client construction failed for {component}: {source}")]
    Build {
        /// Component that requested the client
        component: String,
        /// Underlying error
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone)]
struct HttpPolicy {
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
    user_agent: Option<String>,
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

static HTTP_POLICY: RwLock<HttpPolicy> = RwLock::new(HttpPolicy {
    connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
    read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
    user_agent: None,
});

/// Configures timeouts and User-Agent used by every client built afterwards.
///
/// Intended for runtime configuration before extractors and drivers are constructed.
pub fn configure_http_policy(
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
    user_agent: Option<String>,
) {
    if let Ok(mut guard) = HTTP_POLICY.write() {
        *guard = HttpPolicy {
            connect_timeout_secs,
            read_timeout_secs,
            user_agent,
        };
    }
}

fn http_policy() -> HttpPolicy {
    HTTP_POLICY
        .read()
        .map(|guard| guard.clone())
        .unwrap_or_default()
}

/// Builds an HTTP client using the shared policy.
///
/// `component` is only used in logs and errors.
///
/// # Errors
///
/// Returns [`HttpClientError`] when client construction fails.
pub fn build_http_client(
    component: &str,
    cookie_jar: Option<Arc<Jar>>,
) -> Result<Client, HttpClientError> {
    let policy = http_policy();
    match try_build_client(&policy, cookie_jar.clone(), false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // System proxy lookup panics in some sandboxed environments.
            warn!(
                component,
                "HTTP client hit system proxy panic; using env-proxy fallback builder"
            );
            match try_build_client(&policy, cookie_jar, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(HttpClientError::Panicked {
                    component: component.to_string(),
                }),
                Err(BuildClientFailure::Build(source)) => Err(HttpClientError::Build {
                    component: component.to_string(),
                    source,
                }),
            }
        }
        Err(BuildClientFailure::Build(source)) => Err(HttpClientError::Build {
            component: component.to_string(),
            source,
        }),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    policy: &HttpPolicy,
    cookie_jar: Option<Arc<Jar>>,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let policy = policy.clone();
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(&policy, cookie_jar);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(policy: &HttpPolicy, cookie_jar: Option<Arc<Jar>>) -> ClientBuilder {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(policy.connect_timeout_secs))
        .timeout(Duration::from_secs(policy.read_timeout_secs))
        .user_agent(user_agent::user_agent_or_default(policy.user_agent.as_deref()))
        .gzip(true);

    builder = match cookie_jar {
        Some(jar) => builder.cookie_provider(jar),
        None => builder.cookie_store(true),
    };

    builder
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => first_env_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => first_env_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn first_env_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
