//! Utility functions shared across the crate.

use std::path::PathBuf;

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Sniff an image MIME type from magic bytes.
///
/// Returns `None` for anything that is not a recognizable image.
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Png => Some("image/png"),
        image::ImageFormat::Jpeg => Some("image/jpeg"),
        image::ImageFormat::WebP => Some("image/webp"),
        image::ImageFormat::Gif => Some("image/gif"),
        image::ImageFormat::Bmp => Some("image/bmp"),
        image::ImageFormat::Tiff => Some("image/tiff"),
        _ => None,
    }
}

/// Whether uploaded bytes are a format the pipeline accepts.
pub fn is_supported_upload(bytes: &[u8]) -> bool {
    matches!(
        image::guess_format(bytes),
        Ok(image::ImageFormat::Png | image::ImageFormat::Jpeg | image::ImageFormat::WebP)
    )
}

/// Reject anything that is not PNG, JPEG, or WebP.
pub fn ensure_supported_upload(bytes: &[u8]) -> crate::error::Result<()> {
    if is_supported_upload(bytes) {
        Ok(())
    } else {
        let detected = sniff_image_mime(bytes).unwrap_or("unknown");
        Err(crate::error::Error::UnsupportedImage(format!(
            "{detected}; use PNG, JPEG, or WebP"
        )))
    }
}
