//! Structural URL classification.
//!
//! Each provider rule checks the registrable domain (label-aligned, subdomains
//! allowed), then the path shape and any required query parameter. Substring
//! checks on the raw URL are never used: streaming sites routinely label 4shared
//! mirrors as "MediaFire" and embed provider names in file slugs.

use url::Url;

use crate::utils::host_matches_domain;

use super::HostKind;

const FOUR_SHARED_KINDS: &[&str] = &[
    "file", "video", "mp4", "mp3", "rar", "zip", "get", "office", "photo", "s",
];

const MP4UPLOAD_ID_LEN: usize = 12;

/// Classifies `url` into the provider it belongs to.
///
/// Returns [`HostKind::Unknown`] when no rule matches confidently.
#[must_use]
pub fn classify(url: &str) -> HostKind {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return HostKind::Unknown;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return HostKind::Unknown;
    }
    let Some(host) = parsed.host_str() else {
        return HostKind::Unknown;
    };

    if host_matches_domain(host, "mediafire.com") {
        return classify_mediafire(host, &parsed);
    }
    if is_google_drive_host(host) {
        return classify_google_drive(&parsed);
    }
    if host_matches_domain(host, "4shared.com") {
        return classify_four_shared(&parsed);
    }
    if host_matches_domain(host, "solidfiles.com") {
        return classify_solidfiles(&parsed);
    }
    if host_matches_domain(host, "dropbox.com") || host_matches_domain(host, "dropboxusercontent.com")
    {
        return classify_dropbox(&parsed);
    }
    if ["mega.nz", "mega.co.nz", "mega.io"]
        .iter()
        .any(|domain| host_matches_domain(host, domain))
    {
        return classify_mega(&parsed);
    }
    if host_matches_domain(host, "mp4upload.com") {
        return classify_mp4upload(&parsed);
    }
    HostKind::Unknown
}

fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|parts| parts.filter(|part| !part.is_empty()).collect())
        .unwrap_or_default()
}

fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_alphanumeric_key(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric())
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}

fn classify_mediafire(host: &str, url: &Url) -> HostKind {
    // download1234.mediafire.com/<hash>/<key>/<name> is the CDN and already direct.
    let label = host.trim_start_matches("www.").to_ascii_lowercase();
    if label.starts_with("download") && label.ends_with(".mediafire.com") {
        return if segments(url).is_empty() {
            HostKind::Unknown
        } else {
            HostKind::MediaFire
        };
    }

    let parts = segments(url);
    match parts.as_slice() {
        [kind, key, ..]
            if matches!(*kind, "file" | "file_premium" | "view" | "download")
                && is_alphanumeric_key(key) =>
        {
            HostKind::MediaFire
        }
        // Legacy share links: mediafire.com/?abcdef123
        [] => match url.query() {
            Some(query) if is_alphanumeric_key(query) => HostKind::MediaFire,
            _ => HostKind::Unknown,
        },
        _ => HostKind::Unknown,
    }
}

fn is_google_drive_host(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    matches!(
        host.as_str(),
        "drive.google.com" | "docs.google.com" | "drive.usercontent.google.com"
    )
}

fn classify_google_drive(url: &Url) -> HostKind {
    let parts = segments(url);
    match parts.as_slice() {
        ["file", "d", id, ..] if is_token(id) => HostKind::GoogleDrive,
        ["open" | "uc" | "download"] => match query_value(url, "id") {
            Some(id) if is_token(&id) => HostKind::GoogleDrive,
            _ => HostKind::Unknown,
        },
        _ => HostKind::Unknown,
    }
}

/// Extracts the Drive file id from any accepted Drive URL shape.
#[must_use]
pub(crate) fn google_drive_file_id(url: &Url) -> Option<String> {
    let parts = segments(url);
    match parts.as_slice() {
        ["file", "d", id, ..] if is_token(id) => Some((*id).to_string()),
        _ => query_value(url, "id").filter(|id| is_token(id)),
    }
}

fn classify_four_shared(url: &Url) -> HostKind {
    let parts = segments(url);
    match parts.as_slice() {
        [kind, id, ..] if FOUR_SHARED_KINDS.contains(kind) && is_token(id) => {
            HostKind::FourShared
        }
        _ => HostKind::Unknown,
    }
}

fn classify_solidfiles(url: &Url) -> HostKind {
    let parts = segments(url);
    match parts.as_slice() {
        ["v" | "d", id, ..] if is_token(id) => HostKind::Solidfiles,
        _ => HostKind::Unknown,
    }
}

fn classify_dropbox(url: &Url) -> HostKind {
    let parts = segments(url);
    match parts.as_slice() {
        ["s", id, _, ..] if is_token(id) => HostKind::Dropbox,
        ["scl", "fi", id, _, ..] if is_token(id) => HostKind::Dropbox,
        _ => HostKind::Unknown,
    }
}

fn classify_mega(url: &Url) -> HostKind {
    let parts = segments(url);
    match parts.as_slice() {
        ["file" | "embed", id, ..] if is_token(id) => HostKind::Mega,
        // Legacy links carry the id in the fragment: mega.nz/#!id!key
        [] => match url.fragment() {
            Some(fragment) if fragment.starts_with('!') && fragment.len() > 1 => HostKind::Mega,
            _ => HostKind::Unknown,
        },
        _ => HostKind::Unknown,
    }
}

/// Returns the MP4Upload file id from `/<id>`, `/<id>/<name>` or `/embed-<id>.html`.
#[must_use]
pub(crate) fn mp4upload_file_id(url: &Url) -> Option<String> {
    let parts = segments(url);
    let first = parts.first()?;
    let id = first
        .strip_prefix("embed-")
        .and_then(|rest| rest.strip_suffix(".html"))
        .unwrap_or(first);
    (id.len() == MP4UPLOAD_ID_LEN && is_alphanumeric_key(id)).then(|| id.to_ascii_lowercase())
}

fn classify_mp4upload(url: &Url) -> HostKind {
    if mp4upload_file_id(url).is_some() {
        HostKind::Mp4Upload
    } else {
        HostKind::Unknown
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_mediafire_file_shapes() {
        for url in [
            "https://www.mediafire.com/file/abc123xyz/One_Piece_01.mp4/file",
            "https://mediafire.com/file/abc123xyz",
            "http://www.mediafire.com/file_premium/abc123xyz/ep.mkv",
            "https://www.mediafire.com/view/abc123xyz/ep.mp4",
            "https://www.mediafire.com/?abc123xyz",
            "https://download2391.mediafire.com/hash/abc123xyz/ep.mp4",
        ] {
            assert_eq!(classify(url), HostKind::MediaFire, "{url}");
        }
    }

    #[test]
    fn test_classify_mediafire_folders_and_roots_unknown() {
        assert_eq!(
            classify("https://www.mediafire.com/folder/abc123/Season1"),
            HostKind::Unknown
        );
        assert_eq!(classify("https://www.mediafire.com/"), HostKind::Unknown);
        assert_eq!(
            classify("https://www.mediafire.com/file/abc%20def/x"),
            HostKind::Unknown
        );
    }

    #[test]
    fn test_classify_google_drive_shapes() {
        for url in [
            "https://drive.google.com/file/d/1AbC_d-EF/view?usp=sharing",
            "https://drive.google.com/open?id=1AbC_d-EF",
            "https://drive.google.com/uc?id=1AbC_d-EF&export=download",
            "https://docs.google.com/uc?export=download&id=1AbC_d-EF",
            "https://drive.usercontent.google.com/download?id=1AbC_d-EF&export=download",
        ] {
            assert_eq!(classify(url), HostKind::GoogleDrive, "{url}");
        }
        assert_eq!(classify("https://drive.google.com/uc?export=download"), HostKind::Unknown);
        assert_eq!(classify("https://drive.google.com/drive/folders/1AbC"), HostKind::Unknown);
    }

    #[test]
    fn test_classify_four_shared_shapes() {
        assert_eq!(
            classify("https://www.4shared.com/video/Ab12_cD/One_Piece_01.html"),
            HostKind::FourShared
        );
        assert_eq!(
            classify("https://www.4shared.com/file/Ab12cD/ep.html"),
            HostKind::FourShared
        );
        assert_eq!(classify("https://www.4shared.com/account/home.jsp"), HostKind::Unknown);
    }

    #[test]
    fn test_classify_other_providers() {
        assert_eq!(
            classify("https://www.solidfiles.com/v/aBc123"),
            HostKind::Solidfiles
        );
        assert_eq!(
            classify("https://www.dropbox.com/s/abc123/ep01.mp4?dl=0"),
            HostKind::Dropbox
        );
        assert_eq!(
            classify("https://www.dropbox.com/scl/fi/abc123/ep01.mp4?rlkey=x&dl=0"),
            HostKind::Dropbox
        );
    }

    #[test]
    fn test_classify_mega_shapes() {
        for url in [
            "https://mega.nz/file/AbC12dEf#key-Part_9",
            "https://mega.nz/embed/AbC12dEf#key",
            "https://mega.co.nz/#!AbC12dEf!key",
        ] {
            assert_eq!(classify(url), HostKind::Mega, "{url}");
        }
        assert_eq!(classify("https://mega.nz/folder/AbC12dEf#key"), HostKind::Unknown);
        assert_eq!(classify("https://mega.nz/"), HostKind::Unknown);
        assert_eq!(classify("https://notmega.nz/file/AbC12dEf"), HostKind::Unknown);
    }

    #[test]
    fn test_classify_mp4upload_shapes() {
        for url in [
            "https://www.mp4upload.com/a1b2c3d4e5f6",
            "https://mp4upload.com/a1b2c3d4e5f6/One_Piece_01.mp4.html",
            "https://www.mp4upload.com/embed-a1b2c3d4e5f6.html",
        ] {
            assert_eq!(classify(url), HostKind::Mp4Upload, "{url}");
        }
        assert_eq!(classify("https://www.mp4upload.com/faq"), HostKind::Unknown);
        assert_eq!(classify("https://www.mp4upload.com/"), HostKind::Unknown);
        let embed = Url::parse("https://www.mp4upload.com/embed-A1B2C3D4E5F6.html").unwrap();
        assert_eq!(mp4upload_file_id(&embed).as_deref(), Some("a1b2c3d4e5f6"));
    }

    #[test]
    fn test_classify_rejects_non_http_and_garbage() {
        assert_eq!(classify("javascript:void(0)"), HostKind::Unknown);
        assert_eq!(classify("ftp://www.mediafire.com/file/abc"), HostKind::Unknown);
        assert_eq!(classify("not a url"), HostKind::Unknown);
        assert_eq!(classify(""), HostKind::Unknown);
    }

    #[test]
    fn test_google_drive_file_id_extraction() {
        let url = Url::parse("https://drive.google.com/file/d/1AbC_d-EF/view").unwrap();
        assert_eq!(google_drive_file_id(&url).as_deref(), Some("1AbC_d-EF"));
        let url = Url::parse("https://drive.google.com/open?id=XyZ").unwrap();
        assert_eq!(google_drive_file_id(&url).as_deref(), Some("XyZ"));
        let url = Url::parse("https://drive.google.com/open").unwrap();
        assert_eq!(google_drive_file_id(&url), None);
    }
}
