//! Media classification for slideshow items.
//!
//! The loader itself does not care what a file is - callers pick
//! `load_image` or `load_animated`. The preloader does care: it only warms
//! stills, so sequence items carry their kind.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Extensions decoded as animations
const ANIMATED_EXTS: &[&str] = &["gif"];

/// Extensions handed to the external video player
const VIDEO_EXTS: &[&str] = &[
    "mp4", "m4v", "mov", "avi", "mkv", "wmv", "webm", "mpg", "mpeg", "3gp",
];

/// Kind of media behind a slideshow item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    /// Single-frame raster (JPEG, PNG, TIFF, ...)
    Still,
    /// Multi-frame image (GIF)
    Animated,
    /// Video container - never decoded here
    Video,
}

impl MediaKind {
    /// Classify by file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        if ANIMATED_EXTS.contains(&ext.as_str()) {
            MediaKind::Animated
        } else if VIDEO_EXTS.contains(&ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Still
        }
    }
}

/// One entry of the slideshow sequence handed to the preloader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MediaItem {
    /// Item with kind inferred from the extension
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = MediaKind::from_path(&path);
        Self { path, kind }
    }

    /// Item with an explicit kind (e.g. sniffed by the caller)
    pub fn with_kind(path: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}
