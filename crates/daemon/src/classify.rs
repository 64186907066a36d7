//! Classifier module for assigning files to a media class.
//!
//! Files are classified purely by the final extension of their filename,
//! matched case-insensitively against the configured image and video sets.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Media class a file is assigned to based on its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaClass {
    /// Source for an image-to-PNG conversion.
    Image,
    /// Source for a video-to-MP4 transcode.
    Video,
    /// Extension not in either configured set.
    Unrecognized,
}

impl Default for MediaClass {
    fn default() -> Self {
        Self::Unrecognized
    }
}

impl std::fmt::Display for MediaClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaClass::Image => write!(f, "image"),
            MediaClass::Video => write!(f, "video"),
            MediaClass::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// The filename's final extension, lower-cased and with the leading dot.
///
/// Returns `None` for files without an extension.
pub fn normalized_suffix(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

/// Whether the filename is hidden (begins with a dot).
///
/// Hidden files are always ignored regardless of extension; copy tools and
/// editors use dot-prefixed names for in-progress temporaries.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Classify a path against the normalized extension sets.
///
/// The image set is checked first so precedence is deterministic even if
/// the configured sets overlap.
pub fn classify(
    path: &Path,
    image_exts: &HashSet<String>,
    video_exts: &HashSet<String>,
) -> MediaClass {
    let suffix = match normalized_suffix(path) {
        Some(suffix) => suffix,
        None => return MediaClass::Unrecognized,
    };

    if image_exts.contains(&suffix) {
        MediaClass::Image
    } else if video_exts.contains(&suffix) {
        MediaClass::Video
    } else {
        MediaClass::Unrecognized
    }
}
