//! User-Agent strings for page and provider requests.
//!
//! File hosts and streaming sites serve interstitials or block requests that
//! identify as tools, so traffic presents as a desktop browser by default.

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Default User-Agent for all outgoing requests.
#[must_use]
pub(crate) fn default_browser_user_agent() -> String {
    BROWSER_USER_AGENT.to_string()
}

/// Returns `configured` when it is non-blank, else the browser default.
#[must_use]
pub(crate) fn user_agent_or_default(configured: Option<&str>) -> String {
    configured
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(default_browser_user_agent, ToString::to_string)
}
