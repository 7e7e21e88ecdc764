//! Selector lists used by generic discovery.
//!
//! Ordered most specific first. Discovery stops at the first selector that
//! yields a supported provider link.

/// Containers grouping an episode's download links.
pub(crate) const CONTAINER_SELECTORS: &[&str] = &[
    ".episode-download-container",
    ".download-container",
    "[class*='download-container']",
    ".mwidget",
    ".quality-list",
];

/// Link elements inside a download container.
pub(crate) const CONTAINER_LINK_SELECTORS: &[&str] = &[
    "a.download-link",
    "a[data-index]",
    "a[class*='download']",
    "a.btn",
];

/// Server lists on episode or download pages.
pub(crate) const SERVER_SELECTORS: &[&str] = &[
    ".download-servers a.dashboard-button",
    ".download-servers a",
    ".server-list a",
    ".server-item a",
    "a.dashboard-button",
    ".quality-list a",
    "a.download-link",
    "a[class*='download']",
];

/// Buttons leading from the episode page to a separate download page.
pub(crate) const DOWNLOAD_BUTTON_SELECTORS: &[&str] = &[
    "a.btn-site",
    ".btn-site",
    ".episodes-buttons-list a",
    ".episode-buttons-container a",
];

/// Anchor text fragments marking a download button (case-insensitive).
pub(crate) const DOWNLOAD_KEYWORDS: &[&str] = &["تحميل", "download"];

/// Every element that may carry a link.
pub(crate) const CATCH_ALL_SELECTOR: &str = "a, button, [data-url], [data-href], [data-link]";

/// Attributes holding a link, checked in order.
pub(crate) const LINK_ATTRIBUTES: &[&str] = &["href", "data-url", "data-href", "data-link"];

/// Container-scoped link selectors followed by the server selectors.
pub(crate) fn link_list_selectors() -> Vec<String> {
    let mut selectors: Vec<String> = CONTAINER_SELECTORS
        .iter()
        .flat_map(|container| {
            CONTAINER_LINK_SELECTORS
                .iter()
                .map(move |link| format!("{container} {link}"))
        })
        .collect();
    for selector in SERVER_SELECTORS {
        if !selectors.iter().any(|known| known == selector) {
            selectors.push((*selector).to_string());
        }
    }
    selectors
}

/// Provisional confidence of a generic recipe that surfaced `count` links.
pub(crate) fn provisional_confidence(count: usize) -> u32 {
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    count.saturating_mul(20).saturating_add(50).min(95)
}
