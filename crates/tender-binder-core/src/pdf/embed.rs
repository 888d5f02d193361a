//! Appending full-page image pages to a section PDF.
//!
//! Each stored image becomes one new A4 page: the image is scaled to fit
//! inside the page margin, centered, and painted through an image XObject.
//! JPEG bytes pass straight through as a DCTDecode stream; PNG and WebP
//! candidates are decoded and embedded as FlateDecode RGB samples, with
//! the alpha channel carried in an SMask when present.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::compress::{CompressedImage, EncodedFormat};
use crate::error::{Error, Result};
use super::{PAGE_HEIGHT, PAGE_MARGIN, PAGE_WIDTH};

/// Append one page to `doc` showing `image` scaled to fit within the margin.
pub fn append_image_page(doc: &mut Document, image: &CompressedImage) -> Result<()> {
    let (xobject_id, width, height) = add_image_xobject(doc, image)?;

    let avail_width = PAGE_WIDTH - 2.0 * PAGE_MARGIN;
    let avail_height = PAGE_HEIGHT - 2.0 * PAGE_MARGIN;
    #[allow(clippy::cast_precision_loss)]
    let (w, h) = (width as f32, height as f32);
    let scale = (avail_width / w).min(avail_height / h);
    let draw_width = w * scale;
    let draw_height = h * scale;
    let x = (PAGE_WIDTH - draw_width) / 2.0;
    let y = (PAGE_HEIGHT - draw_height) / 2.0;

    let content = format!("q\n{draw_width} 0 0 {draw_height} {x} {y} cm\n/Im1 Do\nQ\n");
    let content_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        content.into_bytes(),
    )));

    let resources = Dictionary::from_iter([(
        "XObject",
        Object::Dictionary(Dictionary::from_iter([(
            "Im1",
            Object::Reference(xobject_id),
        )])),
    )]);

    let pages_id = root_pages_id(doc)?;
    let page_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(pages_id)),
        (
            "MediaBox",
            Object::Array(vec![
                0.into(),
                0.into(),
                Object::Real(PAGE_WIDTH),
                Object::Real(PAGE_HEIGHT),
            ]),
        ),
        ("Contents", Object::Reference(content_id)),
        ("Resources", Object::Dictionary(resources)),
    ]));

    attach_page(doc, pages_id, page_id)
}

/// Build the image XObject for a compression candidate.
///
/// Returns the object id plus the pixel dimensions actually embedded.
fn add_image_xobject(doc: &mut Document, image: &CompressedImage) -> Result<(ObjectId, u32, u32)> {
    if image.format == EncodedFormat::Jpeg {
        // DCTDecode pass-through; decode only to confirm dimensions and
        // color layout.
        let decoded = image::load_from_memory(&image.bytes)
            .map_err(|e| Error::ImageDecode(format!("Bad JPEG candidate: {e}")))?;
        let (width, height) = (decoded.width(), decoded.height());
        let color_space: &[u8] = if decoded.color().has_color() {
            b"DeviceRGB"
        } else {
            b"DeviceGray"
        };

        let dict = Dictionary::from_iter([
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(i64::from(width))),
            ("Height", Object::Integer(i64::from(height))),
            ("ColorSpace", Object::Name(color_space.to_vec())),
            ("BitsPerComponent", Object::Integer(8)),
            ("Filter", Object::Name(b"DCTDecode".to_vec())),
        ]);
        let id = doc.add_object(Object::Stream(Stream::new(dict, image.bytes.clone())));
        return Ok((id, width, height));
    }

    // PNG / WebP: decode and embed raw samples under FlateDecode.
    let decoded = image::load_from_memory(&image.bytes)
        .map_err(|e| Error::ImageDecode(format!("Bad image candidate: {e}")))?;
    let (width, height) = (decoded.width(), decoded.height());
    let has_alpha = decoded.color().has_alpha();

    let rgb = decoded.to_rgb8();
    let rgb_data = deflate(rgb.as_raw())?;

    let mut dict = Dictionary::from_iter([
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Image".to_vec())),
        ("Width", Object::Integer(i64::from(width))),
        ("Height", Object::Integer(i64::from(height))),
        ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
        ("BitsPerComponent", Object::Integer(8)),
        ("Filter", Object::Name(b"FlateDecode".to_vec())),
    ]);

    if has_alpha {
        let alpha: Vec<u8> = decoded
            .to_rgba8()
            .pixels()
            .map(|p| p.0[3])
            .collect();
        let mask_dict = Dictionary::from_iter([
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(i64::from(width))),
            ("Height", Object::Integer(i64::from(height))),
            ("ColorSpace", Object::Name(b"DeviceGray".to_vec())),
            ("BitsPerComponent", Object::Integer(8)),
            ("Filter", Object::Name(b"FlateDecode".to_vec())),
        ]);
        let mask_id = doc.add_object(Object::Stream(Stream::new(mask_dict, deflate(&alpha)?)));
        dict.set("SMask", Object::Reference(mask_id));
    }

    let id = doc.add_object(Object::Stream(Stream::new(dict, rgb_data)));
    Ok((id, width, height))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish().map_err(Error::from)
}

/// Resolve the root page tree node.
fn root_pages_id(doc: &Document) -> Result<ObjectId> {
    let root_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|e| Error::Lopdf(format!("Missing document catalog: {e}")))?;
    let catalog = doc
        .get_object(root_id)
        .and_then(Object::as_dict)
        .map_err(|e| Error::Lopdf(format!("Bad document catalog: {e}")))?;
    catalog
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|e| Error::Lopdf(format!("Catalog has no page tree: {e}")))
}

/// Register a new page under the root page tree and bump its count.
fn attach_page(doc: &mut Document, pages_id: ObjectId, page_id: ObjectId) -> Result<()> {
    enum KidsSlot {
        Direct,
        Indirect(ObjectId),
    }

    let slot = {
        let pages = doc
            .get_object(pages_id)
            .and_then(Object::as_dict)
            .map_err(|e| Error::Lopdf(format!("Bad page tree node: {e}")))?;
        match pages.get(b"Kids") {
            Ok(Object::Array(_)) => KidsSlot::Direct,
            Ok(Object::Reference(id)) => KidsSlot::Indirect(*id),
            _ => return Err(Error::Lopdf("Page tree has no Kids array".to_string())),
        }
    };

    match slot {
        KidsSlot::Direct => {
            if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(pages_id)
                && let Ok(Object::Array(kids)) = dict.get_mut(b"Kids")
            {
                kids.push(Object::Reference(page_id));
            }
        }
        KidsSlot::Indirect(kids_id) => {
            if let Ok(Object::Array(kids)) = doc.get_object_mut(kids_id) {
                kids.push(Object::Reference(page_id));
            }
        }
    }

    if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(pages_id) {
        let count = dict.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        dict.set("Count", Object::Integer(count + 1));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compress::compress_to_target;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    fn minimal_pdf() -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let content = Stream::new(Dictionary::new(), b"q Q".to_vec());
        let content_id = doc.add_object(content);

        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            (
                "MediaBox",
                Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
            ),
        ]));

        let pages = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(vec![Object::Reference(page_id)])),
            ("Count", Object::Integer(1)),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc
    }

    fn test_image() -> CompressedImage {
        let img = RgbImage::from_fn(40, 30, |x, _| Rgb([(x * 6) as u8, 10, 20]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        compress_to_target(&buf.into_inner(), 75, usize::MAX)
    }

    #[test]
    fn test_append_adds_one_page() {
        let mut doc = minimal_pdf();
        assert_eq!(doc.get_pages().len(), 1);

        append_image_page(&mut doc, &test_image()).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_appended_page_is_a4() {
        let mut doc = minimal_pdf();
        append_image_page(&mut doc, &test_image()).unwrap();

        let pages = doc.get_pages();
        let last_id = pages.values().last().copied().unwrap();
        let page = doc.get_object(last_id).unwrap().as_dict().unwrap();
        let media = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media.len(), 4);
        match media[2] {
            Object::Real(w) => assert!((w - PAGE_WIDTH).abs() < 0.5),
            Object::Integer(w) =>
            {
                #[allow(clippy::cast_precision_loss)]
                assert!((w as f32 - PAGE_WIDTH).abs() < 0.5)
            }
            _ => panic!("unexpected MediaBox entry"),
        }
    }

    #[test]
    fn test_undecodable_candidate_is_an_error() {
        let mut doc = minimal_pdf();
        let bogus = CompressedImage {
            bytes: b"not an image".to_vec(),
            format: EncodedFormat::Png,
            width: 0,
            height: 0,
        };
        assert!(append_image_page(&mut doc, &bogus).is_err());
    }
}
