//! MP4Upload extractor.
//!
//! The video URL lives in the player markup of the embed page: a `<video src>`,
//! a `player.src(...)` call or a `"file":` entry in the player setup. File pages
//! without a player are retried once through their embed page.

use std::sync::Arc;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use reqwest::cookie::Jar;
use tracing::{debug, info};
use url::Url;

use crate::error::ResolveError;
use crate::host::{HostKind, mp4upload_file_id};
use crate::http_client::{HttpClientError, build_http_client};
use crate::utils::{absolutize_url, compile_static_regex, first_capture, unescape_js_url};

use super::{
    ExtractionResult, ExtractionStrategy, HostExtractor, PageFetch, ResolvedLink, TokenRule,
    fallback_or_miss, fetch_page, first_match, parse_base_url, rebase_url,
};

const REJECTION_MARKERS: &[&str] = &[
    "File Not Found",
    "File was deleted",
    "The file you were looking for could not be found",
];

static VIDEO_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?s)<video\b[^>]*?\ssrc\s*=\s*["']([^"']+)["']"#)
});
static PLAYER_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?s)player\.src\(\s*(?:\{[^}]*?\bsrc\s*:\s*)?["']([^"']+)["']"#,
    )
});
static FILE_ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"["']?\bfile["']?\s*:\s*["'](https?:[^"']+)["']"#));

const RULES: &[TokenRule] = &[
    TokenRule {
        name: "video_src",
        apply: video_src,
    },
    TokenRule {
        name: "player_src",
        apply: player_src,
    },
    TokenRule {
        name: "file_entry",
        apply: file_entry,
    },
];

fn video_src(body: &str) -> Option<String> {
    first_capture(body, &VIDEO_SRC_RE).filter(|token| !token.starts_with("blob:"))
}

fn player_src(body: &str) -> Option<String> {
    first_capture(body, &PLAYER_SRC_RE).map(|token| unescape_js_url(&token))
}

fn file_entry(body: &str) -> Option<String> {
    first_capture(body, &FILE_ENTRY_RE).map(|token| unescape_js_url(&token))
}

fn embed_url(id: &str) -> String {
    format!("https://www.mp4upload.com/embed-{id}.html")
}

/// Extractor for MP4Upload pages.
pub struct Mp4UploadExtractor {
    client: Client,
    base_url: Option<Url>,
    direct_fallback: bool,
}

impl Mp4UploadExtractor {
    /// Creates an extractor talking to mp4upload.com.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError`] if client construction fails.
    pub fn new(cookie_jar: Option<Arc<Jar>>, direct_fallback: bool) -> Result<Self, HttpClientError> {
        Self::with_base_url(cookie_jar, direct_fallback, "")
    }

    /// Creates an extractor that sends page requests to `base_url` (for tests).
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError`] if client construction fails.
    pub fn with_base_url(
        cookie_jar: Option<Arc<Jar>>,
        direct_fallback: bool,
        base_url: &str,
    ) -> Result<Self, HttpClientError> {
        Ok(Self {
            client: build_http_client("mp4upload", cookie_jar)?,
            base_url: parse_base_url(base_url),
            direct_fallback,
        })
    }

    async fn fetch(&self, url: &str, source_url: &str) -> Result<PageFetch, ResolveError> {
        let request_url = rebase_url(url, self.base_url.as_ref());
        let fetched = fetch_page(&self.client, &request_url, HostKind::Mp4Upload).await?;
        if let PageFetch::Html { body, .. } = &fetched
            && let Some(marker) = REJECTION_MARKERS.iter().find(|marker| body.contains(**marker))
        {
            return Err(ResolveError::invalid_link(HostKind::Mp4Upload, source_url, *marker));
        }
        Ok(fetched)
    }
}

impl std::fmt::Debug for Mp4UploadExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mp4UploadExtractor")
            .field("base_url", &self.base_url)
            .field("direct_fallback", &self.direct_fallback)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HostExtractor for Mp4UploadExtractor {
    fn name(&self) -> &'static str {
        "mp4upload"
    }

    fn host_kind(&self) -> HostKind {
        HostKind::Mp4Upload
    }

    #[tracing::instrument(skip(self), fields(host = "mp4upload"))]
    async fn extract(&self, url: &str) -> ExtractionResult {
        let parsed = Url::parse(url)
            .map_err(|e| ResolveError::invalid_link(HostKind::Mp4Upload, url, e.to_string()))?;
        let Some(id) = mp4upload_file_id(&parsed) else {
            return Err(ResolveError::invalid_link(
                HostKind::Mp4Upload,
                url,
                "URL carries no MP4Upload file id",
            ));
        };

        let mut pages = vec![url.to_string()];
        let embed = embed_url(&id);
        if !parsed.path().starts_with("/embed-") {
            pages.push(embed);
        }

        for page in &pages {
            let (page_url, body) = match self.fetch(page, url).await? {
                PageFetch::Html { final_url, body } => (final_url, body),
                PageFetch::Binary { final_url, .. } => {
                    return Ok(ResolvedLink::new(
                        final_url.as_str(),
                        HostKind::Mp4Upload,
                        ExtractionStrategy::AlreadyDirect,
                        url,
                    ));
                }
            };
            let Some((rule, token)) = first_match(RULES, &body) else {
                debug!(page = %page, "No player source on MP4Upload page");
                continue;
            };
            let Some(video_url) = absolutize_url(&token, &page_url) else {
                continue;
            };
            info!(rule, url = %video_url, "MP4Upload video link extracted");
            return Ok(
                ResolvedLink::new(video_url, HostKind::Mp4Upload, ExtractionStrategy::PagePattern, url)
                    .with_rule(rule),
            );
        }
        fallback_or_miss(self.direct_fallback, HostKind::Mp4Upload, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_src_preferred_over_script_rules() {
        let body = r#"<video id="player" class="vjs" src="https://s3.mp4upload.com:183/d/abc/video.mp4"></video>
            <script>player.src("https://other.test/x.mp4");</script>"#;
        assert_eq!(
            first_match(RULES, body),
            Some(("video_src", "https://s3.mp4upload.com:183/d/abc/video.mp4".to_string()))
        );
    }

    #[test]
    fn test_player_src_object_and_string_forms() {
        let object = r#"player.src({ type: "video/mp4", src: "https://s3.mp4upload.com:183/d/abc/video.mp4" });"#;
        assert_eq!(
            first_match(RULES, object),
            Some(("player_src", "https://s3.mp4upload.com:183/d/abc/video.mp4".to_string()))
        );
        let plain = r#"player.src('https:\/\/s3.mp4upload.com\/d\/abc\/video.mp4')"#;
        assert_eq!(
            first_match(RULES, plain).map(|(_, token)| token).as_deref(),
            Some("https://s3.mp4upload.com/d/abc/video.mp4")
        );
    }

    #[test]
    fn test_file_entry_rule() {
        let body = r#"jwplayer("vplayer").setup({file:"https://s3.mp4upload.com/d/abc/video.mp4",image:"x.jpg"});"#;
        assert_eq!(
            first_match(RULES, body).map(|(rule, _)| rule),
            Some("file_entry")
        );
    }

    #[test]
    fn test_file_entry_ignores_longer_keys() {
        let body = r#"{"profile":"https://mp4upload.test/u/1","file":"https://s3.mp4upload.com/d/v.mp4"}"#;
        assert_eq!(
            file_entry(body).as_deref(),
            Some("https://s3.mp4upload.com/d/v.mp4")
        );
    }

    #[test]
    fn test_blob_video_source_is_ignored() {
        assert_eq!(first_match(RULES, r#"<video src="blob:https://x/1"></video>"#), None);
    }
}
