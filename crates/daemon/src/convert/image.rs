//! Image-to-PNG conversion.
//!
//! Decodes the source with the `image` crate and re-encodes it as PNG in
//! the destination directory. Transparency in the source pixel format is
//! preserved (PNG supports alpha); opaque sources are written as plain RGB.

use image::{DynamicImage, ImageError, ImageFormat};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for image conversion
#[derive(Debug, Error)]
pub enum ImageConvertError {
    /// Source data could not be identified or decoded as an image
    #[error("Cannot identify image file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    /// Destination file already exists; never overwritten
    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// PNG encoding or write failed
    #[error("Failed to encode {path} as PNG: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The destination path for a source file: its stem plus `.png`.
pub fn png_output_path(src: &Path, dest_dir: &Path) -> PathBuf {
    let stem = src
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest_dir.join(format!("{}.png", stem))
}

/// Convert a source image to PNG inside `dest_dir`.
///
/// Returns the written output path. The destination is never overwritten;
/// the caller is expected to check first and this function guards again.
/// Decode failures (corrupt or unrecognized image data) are reported as
/// `Unreadable`, distinct from IO and encode errors.
pub fn convert_image_to_png(src: &Path, dest_dir: &Path) -> Result<PathBuf, ImageConvertError> {
    let output_path = png_output_path(src, dest_dir);
    if output_path.exists() {
        return Err(ImageConvertError::DestinationExists(output_path));
    }

    let img = image::open(src).map_err(|source| match source {
        ImageError::Decoding(_) | ImageError::Unsupported(_) => ImageConvertError::Unreadable {
            path: src.to_path_buf(),
            source,
        },
        ImageError::IoError(e) => ImageConvertError::Io(e),
        other => ImageConvertError::Unreadable {
            path: src.to_path_buf(),
            source: other,
        },
    })?;

    // Normalize the pixel format: keep alpha only when the source has it.
    let img = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.into_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.into_rgb8())
    };

    img.save_with_format(&output_path, ImageFormat::Png)
        .map_err(|source| ImageConvertError::Encode {
            path: src.to_path_buf(),
            source,
        })?;

    Ok(output_path)
}
