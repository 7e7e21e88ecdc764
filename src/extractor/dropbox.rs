//! Dropbox extractor: shared links become direct links by URL rewriting alone.

use async_trait::async_trait;
use tracing::warn;
use url::Url;

use crate::error::ResolveError;
use crate::host::HostKind;
use crate::utils::{host_matches_domain, last_path_segment};

use super::{ExtractionResult, ExtractionStrategy, HostExtractor, ResolvedLink};

const CONTENT_HOST: &str = "dl.dropboxusercontent.com";

/// Extractor for Dropbox shared links. Performs no network requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct DropboxExtractor;

impl DropboxExtractor {
    /// Creates the extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// `/s/` links move to the content host; `/scl/fi/` links keep their `rlkey`
/// and only switch `dl` to 1.
fn direct_url(url: &Url) -> Result<Url, url::ParseError> {
    let mut direct = url.clone();
    let legacy_share = url.path().starts_with("/s/");
    if legacy_share {
        direct.set_host(Some(CONTENT_HOST))?;
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "dl")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    direct.set_query(None);
    if !pairs.is_empty() || !legacy_share {
        let mut query = direct.query_pairs_mut();
        for (key, value) in &pairs {
            query.append_pair(key, value);
        }
        if !legacy_share {
            query.append_pair("dl", "1");
        }
    }
    Ok(direct)
}

#[async_trait]
impl HostExtractor for DropboxExtractor {
    fn name(&self) -> &'static str {
        "dropbox"
    }

    fn host_kind(&self) -> HostKind {
        HostKind::Dropbox
    }

    async fn extract(&self, url: &str) -> ExtractionResult {
        let parsed = Url::parse(url)
            .map_err(|e| ResolveError::invalid_link(HostKind::Dropbox, url, e.to_string()))?;
        let file_name = last_path_segment(&parsed);
        if parsed
            .host_str()
            .is_some_and(|host| host_matches_domain(host, "dropboxusercontent.com"))
        {
            return Ok(
                ResolvedLink::new(url, HostKind::Dropbox, ExtractionStrategy::AlreadyDirect, url)
                    .with_file_name(file_name),
            );
        }
        let direct = match direct_url(&parsed) {
            Ok(direct) => direct,
            Err(e) => {
                warn!(url, error = %e, "Dropbox link not rewritable; using it directly");
                return Ok(
                    ResolvedLink::new(url, HostKind::Dropbox, ExtractionStrategy::DirectFallback, url)
                        .with_file_name(file_name),
                );
            }
        };
        Ok(ResolvedLink::new(
            direct.as_str(),
            HostKind::Dropbox,
            ExtractionStrategy::UrlTemplate,
            url,
        )
        .with_rule("content_host_rewrite")
        .with_file_name(file_name))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_legacy_share_link_moves_to_content_host() {
        let link = DropboxExtractor::new()
            .extract("https://www.dropbox.com/s/abc123/ep01.mp4?dl=0")
            .await
            .unwrap();
        assert_eq!(link.url, "https://dl.dropboxusercontent.com/s/abc123/ep01.mp4");
        assert_eq!(link.strategy, ExtractionStrategy::UrlTemplate);
        assert_eq!(link.file_name.as_deref(), Some("ep01.mp4"));
    }

    #[tokio::test]
    async fn test_scl_link_keeps_rlkey_and_sets_dl() {
        let link = DropboxExtractor::new()
            .extract("https://www.dropbox.com/scl/fi/abc123/ep01.mp4?rlkey=k9&dl=0")
            .await
            .unwrap();
        assert_eq!(
            link.url,
            "https://www.dropbox.com/scl/fi/abc123/ep01.mp4?rlkey=k9&dl=1"
        );
    }

    #[test]
    fn test_direct_url_rewrites_both_share_shapes() {
        let legacy = Url::parse("https://www.dropbox.com/s/abc123/ep01.mp4?dl=0&x=1").unwrap();
        assert_eq!(
            direct_url(&legacy).unwrap().as_str(),
            "https://dl.dropboxusercontent.com/s/abc123/ep01.mp4?x=1"
        );
        let scl = Url::parse("https://dropbox.com/scl/fi/abc123/ep01.mp4").unwrap();
        assert_eq!(
            direct_url(&scl).unwrap().as_str(),
            "https://dropbox.com/scl/fi/abc123/ep01.mp4?dl=1"
        );
    }

    #[tokio::test]
    async fn test_content_host_is_already_direct() {
        let url = "https://dl.dropboxusercontent.com/s/abc123/ep01.mp4";
        let link = DropboxExtractor::new().extract(url).await.unwrap();
        assert_eq!(link.strategy, ExtractionStrategy::AlreadyDirect);
        assert_eq!(link.url, url);
    }
}
