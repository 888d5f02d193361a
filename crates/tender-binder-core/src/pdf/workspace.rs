//! Per-call scratch mirror of the section tree.
//!
//! Regeneration appends pages, so it must never run against an already
//! regenerated file. Every pipeline call builds a fresh `Workspace` from
//! the canonical originals; the temp directory disappears on drop, which
//! also keeps concurrent pipeline calls from clobbering each other.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::Result;
use crate::section::Section;

/// One section's pristine copy inside a workspace.
#[derive(Debug)]
pub struct SectionCopy {
    pub section: Section,
    pub path: PathBuf,
}

/// A scratch directory holding pristine copies of every section PDF.
pub struct Workspace {
    dir: TempDir,
    entries: Vec<SectionCopy>,
}

impl Workspace {
    /// Copy every section's canonical PDF into a fresh temp directory.
    ///
    /// Sections whose original cannot be copied are logged and left out of
    /// the workspace; the pipeline carries on with the rest.
    pub fn create(sections: &[Section]) -> Result<Self> {
        let dir = TempDir::new()?;
        let mut entries = Vec::new();

        for section in sections {
            let folder = dir.path().join(&section.folder);
            fs::create_dir_all(&folder)?;

            let file_name = section
                .pdf_path
                .file_name()
                .map_or_else(|| format!("{}.pdf", section.name).into(), ToOwned::to_owned);
            let dest = folder.join(file_name);

            if let Err(e) = fs::copy(&section.pdf_path, &dest) {
                warn!(
                    "Missing original PDF for section {} ({}): {}, skipping",
                    section.folder,
                    section.pdf_path.display(),
                    e
                );
                continue;
            }

            entries.push(SectionCopy {
                section: section.clone(),
                path: dest,
            });
        }

        debug!(
            "Created workspace at {} with {} sections",
            dir.path().display(),
            entries.len()
        );

        Ok(Self { dir, entries })
    }

    /// Section copies in ascending folder-number order.
    pub fn entries(&self) -> &[SectionCopy] {
        &self.entries
    }

    /// Paths of all section copies, in merge order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    /// Root of the scratch directory (mainly for logging).
    pub fn root(&self) -> &std::path::Path {
        self.dir.path()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::section::scan_sections;

    #[test]
    fn test_create_copies_originals() {
        let root = TempDir::new().unwrap();
        let sec_dir = root.path().join("1");
        fs::create_dir_all(&sec_dir).unwrap();
        fs::write(sec_dir.join("Cover.pdf"), b"%PDF-1.5 stub").unwrap();

        let sections = scan_sections(root.path()).unwrap();
        let workspace = Workspace::create(&sections).unwrap();

        assert_eq!(workspace.entries().len(), 1);
        let copy = &workspace.entries()[0];
        assert!(copy.path.starts_with(workspace.root()));
        assert_eq!(fs::read(&copy.path).unwrap(), b"%PDF-1.5 stub");
    }

    #[test]
    fn test_vanished_original_is_skipped() {
        let root = TempDir::new().unwrap();
        let sec_dir = root.path().join("1");
        fs::create_dir_all(&sec_dir).unwrap();
        fs::write(sec_dir.join("Cover.pdf"), b"%PDF-1.5 stub").unwrap();

        let mut sections = scan_sections(root.path()).unwrap();
        // Simulate the original disappearing between scan and copy.
        sections[0].pdf_path = root.path().join("1").join("gone.pdf");

        let workspace = Workspace::create(&sections).unwrap();
        assert!(workspace.entries().is_empty());
    }
}
