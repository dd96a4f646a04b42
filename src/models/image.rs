//! Image download records produced by fan-out operations.

use std::path::PathBuf;

/// One downloaded image from a camera, observation preview, or collection.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// File name parsed from the final URL (after any redirects).
    pub name: String,
    /// URL the image was fetched from.
    pub url: String,
    /// Raw image bytes. `None` when the caller only asked for files on disk.
    pub bytes: Option<Vec<u8>>,
    /// Path the image was written to, when an output directory was given.
    pub path: Option<PathBuf>,
}

impl ImageRecord {
    /// Derive the image name from the last path segment of a URL.
    pub(crate) fn name_from_url(url: &str) -> String {
        url.split('?')
            .next()
            .unwrap_or(url)
            .rsplit('/')
            .next()
            .unwrap_or(url)
            .to_string()
    }
}
