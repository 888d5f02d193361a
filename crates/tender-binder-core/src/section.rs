//! Section discovery over the canonical tender tree.
//!
//! The tender directory holds one numbered folder per section. The folder
//! name defines merge order; the single PDF inside it is the canonical
//! section document, and its file stem is the human-readable section name
//! that image filenames are derived from.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Error, Result};

/// One numbered subdivision of the tender document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Parsed folder number, used for merge ordering
    pub number: u32,
    /// Folder name exactly as it appears on disk (may carry leading zeros)
    pub folder: String,
    /// Human-readable name, derived from the canonical PDF's file stem
    pub name: String,
    /// Canonical section PDF
    pub pdf_path: PathBuf,
}

impl Section {
    /// Derived image filename for a serial number within this section.
    pub fn image_filename(&self, serial: i64) -> String {
        format!("{}_{}", self.name, serial)
    }
}

/// Scan the section tree, returning sections in ascending folder-number order.
///
/// Folders that are not numeric, or that contain no PDF, are logged and
/// skipped rather than failing the scan. A folder with more than one PDF
/// keeps the lexicographically first and warns about the rest.
pub fn scan_sections(dir: impl AsRef<Path>) -> Result<Vec<Section>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|e| {
        Error::SectionScan(format!("Failed to read {}: {}", dir.display(), e))
    })?;

    let mut sections = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|e| Error::SectionScan(e.to_string()))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let folder = entry.file_name().to_string_lossy().into_owned();
        let Ok(number) = folder.parse::<u32>() else {
            warn!("Skipping non-numeric section folder {}", path.display());
            continue;
        };

        match find_section_pdf(&path)? {
            Some(pdf_path) => {
                let name = pdf_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| folder.clone());
                sections.push(Section {
                    number,
                    folder,
                    name,
                    pdf_path,
                });
            }
            None => {
                warn!("Section folder {} has no PDF, skipping", path.display());
            }
        }
    }

    sections.sort_by_key(|s| s.number);
    Ok(sections)
}

/// Find a section by its folder name.
pub fn find_section(sections: &[Section], folder: &str) -> Result<Section> {
    sections
        .iter()
        .find(|s| s.folder == folder)
        .cloned()
        .ok_or_else(|| Error::SectionNotFound(folder.to_string()))
}

/// Locate the single canonical PDF in a section folder.
fn find_section_pdf(folder: &Path) -> Result<Option<PathBuf>> {
    let mut pdfs: Vec<PathBuf> = std::fs::read_dir(folder)
        .map_err(|e| Error::SectionScan(format!("Failed to read {}: {}", folder.display(), e)))?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();

    pdfs.sort();

    if pdfs.len() > 1 {
        warn!(
            "Section folder {} has {} PDFs, using {}",
            folder.display(),
            pdfs.len(),
            pdfs[0].display()
        );
    }

    Ok(pdfs.into_iter().next())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_section(root: &Path, folder: &str, pdf_name: &str) {
        let dir = root.join(folder);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(pdf_name), b"%PDF-1.5 stub").unwrap();
    }

    #[test]
    fn test_scan_orders_numerically() {
        let root = TempDir::new().unwrap();
        make_section(root.path(), "10", "Appendices.pdf");
        make_section(root.path(), "2", "Technical Proposal.pdf");
        make_section(root.path(), "1", "Cover Letter.pdf");

        let sections = scan_sections(root.path()).unwrap();
        let folders: Vec<&str> = sections.iter().map(|s| s.folder.as_str()).collect();
        assert_eq!(folders, ["1", "2", "10"]);
        assert_eq!(sections[1].name, "Technical Proposal");
    }

    #[test]
    fn test_scan_skips_non_numeric_and_empty() {
        let root = TempDir::new().unwrap();
        make_section(root.path(), "1", "Cover.pdf");
        std::fs::create_dir_all(root.path().join("notes")).unwrap();
        std::fs::create_dir_all(root.path().join("3")).unwrap(); // no PDF

        let sections = scan_sections(root.path()).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].folder, "1");
    }

    #[test]
    fn test_image_filename() {
        let section = Section {
            number: 2,
            folder: "2".to_string(),
            name: "Technical Proposal".to_string(),
            pdf_path: PathBuf::from("x.pdf"),
        };
        assert_eq!(section.image_filename(3), "Technical Proposal_3");
    }

    #[test]
    fn test_find_section_missing() {
        let err = find_section(&[], "9").unwrap_err();
        assert!(matches!(err, Error::SectionNotFound(_)));
    }
}
