//! File-hosting providers and the URL classifier that recognizes them.
//!
//! - [`HostKind`] - supported providers plus `Unknown`
//! - [`classify`] - structural URL classifier (domain, path shape, query keys)
//! - [`HostPreference`] - configurable ranking used to order extraction attempts

mod classifier;

pub use classifier::classify;
pub(crate) use classifier::{google_drive_file_id, mp4upload_file_id};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// File-hosting provider a download link points to.
///
/// `MediaFire` serves files directly and is preferred; `GoogleDrive` and
/// `FourShared` are mirrors. `FourShared` links are frequently labelled as
/// MediaFire on streaming sites, so classification never looks at labels.
/// `Mega` links are recognized but cannot be turned into a direct URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKind {
    /// mediafire.com file pages and download CDN links.
    #[serde(rename = "mediafire")]
    MediaFire,
    /// Google Drive file links.
    GoogleDrive,
    /// 4shared file pages.
    FourShared,
    /// Solidfiles file pages.
    Solidfiles,
    /// Dropbox shared links.
    Dropbox,
    /// mega.nz file links (end-to-end encrypted).
    Mega,
    /// MP4Upload video pages and embeds.
    #[serde(rename = "mp4upload")]
    Mp4Upload,
    /// No rule matched confidently.
    Unknown,
}

impl HostKind {
    /// All supported (non-`Unknown`) providers.
    pub const SUPPORTED: [HostKind; 7] = [
        HostKind::MediaFire,
        HostKind::GoogleDrive,
        HostKind::FourShared,
        HostKind::Solidfiles,
        HostKind::Dropbox,
        HostKind::Mega,
        HostKind::Mp4Upload,
    ];

    /// Returns the stable label used in config files and the pattern store.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MediaFire => "mediafire",
            Self::GoogleDrive => "google_drive",
            Self::FourShared => "four_shared",
            Self::Solidfiles => "solidfiles",
            Self::Dropbox => "dropbox",
            Self::Mega => "mega",
            Self::Mp4Upload => "mp4upload",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true for every kind except `Unknown`.
    #[must_use]
    pub fn is_supported(self) -> bool {
        self != Self::Unknown
    }

    /// Returns true when links of this kind can be resolved to a direct URL.
    ///
    /// Mega decrypts files client-side, so its links are classified but never extracted.
    #[must_use]
    pub fn is_extractable(self) -> bool {
        !matches!(self, Self::Mega | Self::Unknown)
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mediafire" => Ok(Self::MediaFire),
            "google_drive" | "googledrive" | "gdrive" => Ok(Self::GoogleDrive),
            "four_shared" | "4shared" => Ok(Self::FourShared),
            "solidfiles" => Ok(Self::Solidfiles),
            "dropbox" => Ok(Self::Dropbox),
            "mega" | "mega.nz" => Ok(Self::Mega),
            "mp4upload" | "mp4_upload" => Ok(Self::Mp4Upload),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown host kind '{other}'")),
        }
    }
}

/// Ordering of providers for extraction attempts (lower rank is tried first).
///
/// Kinds missing from the list rank after every listed kind; `Unknown` is last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPreference {
    order: Vec<HostKind>,
}

impl HostPreference {
    /// Creates a preference from an explicit order. Duplicates keep their first position.
    #[must_use]
    pub fn new(order: impl IntoIterator<Item = HostKind>) -> Self {
        let mut deduped = Vec::new();
        for kind in order {
            if kind.is_supported() && !deduped.contains(&kind) {
                deduped.push(kind);
            }
        }
        Self { order: deduped }
    }

    /// Returns the rank of `kind`; smaller is preferred.
    #[must_use]
    pub fn rank(&self, kind: HostKind) -> usize {
        if kind == HostKind::Unknown {
            return usize::MAX;
        }
        self.order
            .iter()
            .position(|candidate| *candidate == kind)
            .unwrap_or(self.order.len())
    }

    /// Returns the configured order.
    #[must_use]
    pub fn order(&self) -> &[HostKind] {
        &self.order
    }
}

impl Default for HostPreference {
    /// MediaFire first, then Google Drive, then the remaining mirrors.
    fn default() -> Self {
        Self::new([
            HostKind::MediaFire,
            HostKind::GoogleDrive,
            HostKind::Mega,
            HostKind::Solidfiles,
            HostKind::Mp4Upload,
            HostKind::Dropbox,
            HostKind::FourShared,
        ])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_host_kind_labels_round_trip() {
        for kind in HostKind::SUPPORTED {
            assert_eq!(kind.as_str().parse::<HostKind>().unwrap(), kind);
        }
        assert_eq!("4shared".parse::<HostKind>().unwrap(), HostKind::FourShared);
        assert_eq!("mega.nz".parse::<HostKind>().unwrap(), HostKind::Mega);
        assert!("megaupload".parse::<HostKind>().is_err());
    }

    #[test]
    fn test_default_preference_puts_direct_host_first() {
        let preference = HostPreference::default();
        assert_eq!(preference.rank(HostKind::MediaFire), 0);
        assert!(preference.rank(HostKind::MediaFire) < preference.rank(HostKind::GoogleDrive));
        assert!(preference.rank(HostKind::GoogleDrive) < preference.rank(HostKind::FourShared));
        assert_eq!(preference.rank(HostKind::Unknown), usize::MAX);
        assert_eq!(preference.rank(HostKind::Mega), 2);
        assert_eq!(preference.rank(HostKind::Mp4Upload), 4);
    }

    #[test]
    fn test_mega_is_supported_but_not_extractable() {
        assert!(HostKind::Mega.is_supported());
        assert!(!HostKind::Mega.is_extractable());
        assert!(HostKind::Mp4Upload.is_extractable());
        assert!(!HostKind::Unknown.is_extractable());
    }

    #[test]
    fn test_preference_unlisted_kinds_rank_after_listed() {
        let preference = HostPreference::new([HostKind::GoogleDrive, HostKind::GoogleDrive]);
        assert_eq!(preference.order(), &[HostKind::GoogleDrive]);
        assert_eq!(preference.rank(HostKind::GoogleDrive), 0);
        assert_eq!(preference.rank(HostKind::MediaFire), 1);
    }

    #[test]
    fn test_host_kind_serde_uses_snake_case() {
        let json = serde_json::to_string(&HostKind::GoogleDrive).unwrap();
        assert_eq!(json, "\"google_drive\"");
        let kind: HostKind = serde_json::from_str("\"four_shared\"").unwrap();
        assert_eq!(kind, HostKind::FourShared);
        assert_eq!(serde_json::to_string(&HostKind::Mp4Upload).unwrap(), "\"mp4upload\"");
    }
}
