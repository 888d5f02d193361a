//! Size-targeted image recompression.
//!
//! Walks a descending ladder of (quality, width) pairs until a candidate
//! fits the byte target. Opaque images prefer lossy WebP and fall back to
//! JPEG; images with an alpha channel re-encode as PNG, where only the
//! width steps can shrink them. The walk is infallible: if nothing fits,
//! the smallest candidate seen wins, and any decode failure degrades to
//! returning the caller's bytes untouched.

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::io::Cursor;
use tracing::debug;

/// Quality floor for the ladder walk.
pub const MIN_QUALITY: u8 = 40;
/// Width floor in pixels for the ladder walk.
pub const MIN_WIDTH: u32 = 300;

const QUALITY_STEP: u8 = 10;
const WIDTH_STEP: u32 = 100;

/// Encoding of a compression candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedFormat {
    Png,
    Jpeg,
    WebP,
}

impl EncodedFormat {
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }
}

/// A compression result: encoded bytes plus the pixel dimensions they carry.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub bytes: Vec<u8>,
    pub format: EncodedFormat,
    pub width: u32,
    pub height: u32,
}

/// Compress `original` to at most `target_bytes` if the ladder allows it.
///
/// Returns the first candidate at or under the target, otherwise the
/// smallest candidate produced across the whole walk, never larger than
/// the original bytes.
pub fn compress_to_target(
    original: &[u8],
    start_quality: u8,
    target_bytes: usize,
) -> CompressedImage {
    let Ok(img) = image::load_from_memory(original) else {
        debug!("Undecodable image, keeping original {} bytes", original.len());
        return passthrough(original, None);
    };

    let has_alpha = img.color().has_alpha();
    let (full_width, full_height) = (img.width(), img.height());
    let width_floor = MIN_WIDTH.min(full_width);
    let quality_floor = MIN_QUALITY.min(start_quality);

    let mut best: Option<CompressedImage> = None;
    let mut previous_width = None;

    for step in 0u32.. {
        let quality = start_quality
            .saturating_sub(u8::try_from(step.saturating_mul(u32::from(QUALITY_STEP))).unwrap_or(u8::MAX))
            .max(quality_floor);
        let width = full_width
            .saturating_sub(step * WIDTH_STEP)
            .max(width_floor);
        let at_floor = quality == quality_floor && width == width_floor;

        // PNG ignores quality, so a repeated width yields an identical candidate.
        let skip = has_alpha && previous_width == Some(width);
        previous_width = Some(width);

        if !skip {
            let scaled = resize_to_width(&img, width, full_width, full_height);
            if let Some(candidate) = encode_candidate(&scaled, quality, has_alpha) {
                debug!(
                    "Candidate q={} w={} -> {} bytes (target {})",
                    quality,
                    width,
                    candidate.bytes.len(),
                    target_bytes
                );
                if candidate.bytes.len() <= target_bytes {
                    return candidate;
                }
                if best
                    .as_ref()
                    .is_none_or(|b| candidate.bytes.len() < b.bytes.len())
                {
                    best = Some(candidate);
                }
            }
        }

        if at_floor {
            break;
        }
    }

    match best {
        Some(candidate) if candidate.bytes.len() < original.len() => candidate,
        _ => passthrough(original, Some(&img)),
    }
}

fn resize_to_width(
    img: &DynamicImage,
    width: u32,
    full_width: u32,
    full_height: u32,
) -> DynamicImage {
    if width >= full_width {
        return img.clone();
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let height = ((f64::from(width) * f64::from(full_height) / f64::from(full_width)).round()
        as u32)
        .max(1);
    img.resize(width, height, FilterType::Lanczos3)
}

fn encode_candidate(img: &DynamicImage, quality: u8, has_alpha: bool) -> Option<CompressedImage> {
    let (width, height) = (img.width(), img.height());

    if has_alpha {
        return encode_png(img).map(|bytes| CompressedImage {
            bytes,
            format: EncodedFormat::Png,
            width,
            height,
        });
    }

    if let Some(bytes) = encode_webp(img, quality) {
        return Some(CompressedImage {
            bytes,
            format: EncodedFormat::WebP,
            width,
            height,
        });
    }

    encode_jpeg(img, quality).map(|bytes| CompressedImage {
        bytes,
        format: EncodedFormat::Jpeg,
        width,
        height,
    })
}

fn encode_png(img: &DynamicImage) -> Option<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).ok()?;
    Some(buf.into_inner())
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Option<Vec<u8>> {
    // The WebP encoder only accepts RGB8/RGBA8 layouts; anything else
    // falls through to JPEG.
    let encoder = webp::Encoder::from_image(img).ok()?;
    Some(encoder.encode(f32::from(quality)).to_vec())
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Option<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    img.to_rgb8().write_with_encoder(encoder).ok()?;
    Some(buf.into_inner())
}

/// Wrap the caller's bytes unchanged, sniffing format and dimensions where
/// possible.
fn passthrough(original: &[u8], decoded: Option<&DynamicImage>) -> CompressedImage {
    let format = match image::guess_format(original) {
        Ok(image::ImageFormat::Png) => EncodedFormat::Png,
        Ok(image::ImageFormat::WebP) => EncodedFormat::WebP,
        _ => EncodedFormat::Jpeg,
    };
    let (width, height) = decoded.map_or((0, 0), |img| (img.width(), img.height()));
    CompressedImage {
        bytes: original.to_vec(),
        format,
        width,
        height,
    }
}
