//! Section regeneration: pristine copy + one appended page per image.

use std::path::Path;

use lopdf::Document;
use tracing::debug;

use crate::compress::compress_to_target;
use crate::error::{Error, Result};
use crate::store::SectionImage;
use super::embed::append_image_page;

/// Rewrite the working copy at `path`, appending one page per image in
/// serial order, each compressed toward `inline_target` at `quality`.
///
/// Only correct against a freshly created workspace copy: running it twice
/// on the same file would append the image pages twice.
pub fn regenerate_section(
    path: &Path,
    images: &[SectionImage],
    quality: u8,
    inline_target: usize,
) -> Result<()> {
    if images.is_empty() {
        return Ok(());
    }

    let mut doc = Document::load(path)
        .map_err(|e| Error::Lopdf(format!("Failed to load {}: {}", path.display(), e)))?;

    for image in images {
        let compressed = compress_to_target(&image.bytes, quality, inline_target);
        debug!(
            "Embedding {} ({} -> {} bytes)",
            image.filename,
            image.bytes.len(),
            compressed.bytes.len()
        );
        append_image_page(&mut doc, &compressed)?;
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| Error::PdfSave(format!("Failed to save {}: {}", path.display(), e)))?;
    std::fs::write(path, output)?;

    Ok(())
}
