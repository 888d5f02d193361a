//! Merging regenerated section PDFs into one binder document.
//!
//! Pages are re-embedded, not just concatenated: every source page is
//! normalized to A4 by wrapping its content in a scale-and-center
//! transform computed from its MediaBox. Merge order is the caller's path
//! order (ascending numeric section folders), page order within a section
//! is preserved.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use super::{PAGE_HEIGHT, PAGE_WIDTH};

/// Merge the given section documents, in order, into a single A4 PDF.
pub fn merge_sections(paths: &[impl AsRef<Path>]) -> Result<Vec<u8>> {
    if paths.is_empty() {
        return Err(Error::NothingToMerge);
    }

    let mut max_id: u32 = 1;
    let mut ordered_pages: Vec<(ObjectId, Object, [f32; 4])> = Vec::new();
    let mut imported_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut document = Document::with_version("1.5");

    for path in paths {
        let path = path.as_ref();
        let mut doc = Document::load(path)
            .map_err(|e| Error::Lopdf(format!("Failed to load {}: {}", path.display(), e)))?;

        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        // get_pages is keyed by page number, so iteration preserves the
        // section's own page order.
        let source_pages = doc.get_pages();
        for &page_id in source_pages.values() {
            if let Ok(page_obj) = doc.get_object(page_id) {
                let media_box = page_media_box(&doc, page_obj);
                ordered_pages.push((page_id, page_obj.clone(), media_box));
            }
        }

        for (object_id, object) in doc.objects {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    imported_objects.insert(object_id, object);
                }
            }
        }
    }

    if ordered_pages.is_empty() {
        return Err(Error::NothingToMerge);
    }

    for (object_id, object) in imported_objects {
        document.objects.insert(object_id, object);
    }

    // Fresh ids (page tree, catalog, transform streams) must not collide
    // with the imported ranges.
    document.max_id = max_id;

    let pages_id = document.new_object_id();

    for (page_id, object, _) in &ordered_pages {
        if let Object::Dictionary(dict) = object {
            let mut new_dict = dict.clone();
            new_dict.set("Parent", Object::Reference(pages_id));
            document
                .objects
                .insert(*page_id, Object::Dictionary(new_dict));
        }
    }

    for (page_id, _, media_box) in &ordered_pages {
        normalize_page_to_a4(&mut document, *page_id, *media_box);
    }

    let kids: Vec<Object> = ordered_pages
        .iter()
        .map(|(id, _, _)| Object::Reference(*id))
        .collect();

    #[allow(clippy::cast_possible_truncation)]
    let total_pages = ordered_pages.len() as u32;

    let pages_dict = Dictionary::from_iter([
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(i64::from(total_pages))),
    ]);
    document.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = document.new_object_id();
    let catalog_dict = Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    document
        .objects
        .insert(catalog_id, Object::Dictionary(catalog_dict));

    document.trailer.set("Root", Object::Reference(catalog_id));

    document.renumber_objects();
    document.compress();

    let mut output = Vec::new();
    document
        .save_to(&mut output)
        .map_err(|e| Error::PdfSave(format!("Failed to save merged PDF: {e}")))?;

    Ok(output)
}

/// Wrap a page's content in a scale-and-center transform and pin its
/// MediaBox to A4.
fn normalize_page_to_a4(doc: &mut Document, page_id: ObjectId, media_box: [f32; 4]) {
    let source_width = media_box[2] - media_box[0];
    let source_height = media_box[3] - media_box[1];

    let a4 = Object::Array(vec![
        0.into(),
        0.into(),
        Object::Real(PAGE_WIDTH),
        Object::Real(PAGE_HEIGHT),
    ]);

    if source_width <= 0.0 || source_height <= 0.0 {
        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
            dict.set("MediaBox", a4);
        }
        return;
    }

    let scale = (PAGE_WIDTH / source_width).min(PAGE_HEIGHT / source_height);
    let tx = (PAGE_WIDTH - source_width * scale) / 2.0 - media_box[0] * scale;
    let ty = (PAGE_HEIGHT - source_height * scale) / 2.0 - media_box[1] * scale;

    let prefix = format!("q\n{scale} 0 0 {scale} {tx} {ty} cm\n");
    let prefix_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        prefix.into_bytes(),
    )));
    let suffix_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        b"\nQ".to_vec(),
    )));

    if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
        let existing = dict.get(b"Contents").ok().cloned();

        let mut contents = vec![Object::Reference(prefix_id)];
        match existing {
            Some(Object::Reference(id)) => contents.push(Object::Reference(id)),
            Some(Object::Array(items)) => contents.extend(items),
            _ => {}
        }
        contents.push(Object::Reference(suffix_id));

        dict.set("Contents", Object::Array(contents));
        dict.set("MediaBox", a4);
        // CropBox and Rotate would fight the normalization.
        dict.remove(b"CropBox");
        dict.remove(b"Rotate");
    }
}

/// Media box of a page, following the Parent chain, defaulting to A4.
fn page_media_box(doc: &Document, page_obj: &Object) -> [f32; 4] {
    if let Object::Dictionary(dict) = page_obj {
        if let Ok(Object::Array(arr)) = dict.get(b"MediaBox")
            && arr.len() == 4
        {
            let values: Vec<f32> = arr
                .iter()
                .filter_map(|o| match o {
                    #[allow(clippy::cast_precision_loss)]
                    Object::Integer(i) => Some(*i as f32),
                    Object::Real(r) => Some(*r),
                    _ => None,
                })
                .collect();

            if values.len() == 4 {
                return [values[0], values[1], values[2], values[3]];
            }
        }

        if let Ok(Object::Reference(parent_id)) = dict.get(b"Parent")
            && let Ok(parent) = doc.get_object(*parent_id)
        {
            return page_media_box(doc, parent);
        }
    }

    [0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use tempfile::TempDir;

    fn write_test_pdf(path: &Path, page_text: &str, media: [i64; 4]) {
        let mut doc = Document::with_version("1.5");
        let page_tree_id = doc.new_object_id();

        let font_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ]));

        let resources_id = doc.add_object(Dictionary::from_iter([(
            "Font",
            Object::Dictionary(Dictionary::from_iter([(
                "F1",
                Object::Reference(font_id),
            )])),
        )]));

        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 500.into()]),
                Operation::new("Tj", vec![Object::string_literal(page_text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_bytes = content.encode().unwrap_or_default();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content_bytes));

        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(page_tree_id)),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Reference(resources_id)),
            (
                "MediaBox",
                Object::Array(media.iter().map(|&v| v.into()).collect()),
            ),
        ]));

        let page_tree = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(vec![Object::Reference(page_id)])),
            ("Count", Object::Integer(1)),
        ]);
        doc.objects.insert(page_tree_id, Object::Dictionary(page_tree));

        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(page_tree_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        std::fs::write(path, out).unwrap();
    }

    #[test]
    fn test_merge_empty_is_an_error() {
        let result = merge_sections(&Vec::<std::path::PathBuf>::new());
        assert!(matches!(result, Err(Error::NothingToMerge)));
    }

    #[test]
    fn test_merge_combines_in_path_order() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        let c = dir.path().join("c.pdf");
        write_test_pdf(&a, "Section 1", [0, 0, 612, 792]);
        write_test_pdf(&b, "Section 2", [0, 0, 612, 792]);
        write_test_pdf(&c, "Section 10", [0, 0, 612, 792]);

        let merged = merge_sections(&[a, b, c]).unwrap();
        assert!(merged.starts_with(b"%PDF"));

        let doc = Document::load_mem(&merged).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn test_merged_pages_are_a4() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.pdf");
        // US-Letter source: must come out A4.
        write_test_pdf(&a, "Letter page", [0, 0, 612, 792]);

        let merged = merge_sections(&[a]).unwrap();
        let doc = Document::load_mem(&merged).unwrap();

        for (_, page_id) in doc.get_pages() {
            let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
            let media = page_media_box(&doc, &Object::Dictionary(page.clone()));
            assert!((media[2] - PAGE_WIDTH).abs() < 0.5);
            assert!((media[3] - PAGE_HEIGHT).abs() < 0.5);
        }
    }

    #[test]
    fn test_merge_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        write_test_pdf(&a, "One", [0, 0, 612, 792]);
        write_test_pdf(&b, "Two", [0, 0, 595, 842]);

        let first = merge_sections(&[a.clone(), b.clone()]).unwrap();
        let second = merge_sections(&[a, b]).unwrap();
        assert_eq!(first, second);
    }
}
