//! SQLite-backed store for uploaded section images.
//!
//! Each image belongs to one section and carries a dense 1-based serial
//! number that doubles as its embed order. The serial is also baked into
//! the stored filename (`<sectionName>_<serial>`), so every structural
//! mutation (add, move, delete) renumbers and renames inside a single
//! transaction to keep serials gap-free.

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::section::Section;

/// One stored image row, without its blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub id: i64,
    pub section: String,
    pub filename: String,
    pub serial_number: i64,
    pub uploaded_at: String,
}

/// An image fetched for section regeneration: serial order plus raw bytes.
#[derive(Debug, Clone)]
pub struct SectionImage {
    pub serial: i64,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Store over the `tender_images` table.
pub struct ImageStore {
    conn: Connection,
}

impl ImageStore {
    /// Open (or create) the store at the given database path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory store.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tender_images (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                section         TEXT NOT NULL,
                filename        TEXT NOT NULL,
                serial_number   INTEGER NOT NULL,
                image           BLOB NOT NULL,
                uploaded_at     TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tender_images_section
             ON tender_images(section, serial_number)",
            [],
        )?;
        Ok(())
    }

    /// Add an image at the end of a section's serial sequence.
    pub fn add_image(&mut self, section: &Section, bytes: &[u8]) -> Result<ImageRecord> {
        let tx = self.conn.transaction()?;

        let next_serial: i64 = tx.query_row(
            "SELECT COALESCE(MAX(serial_number), 0) + 1 FROM tender_images WHERE section = ?1",
            params![section.folder],
            |row| row.get(0),
        )?;

        let filename = section.image_filename(next_serial);
        tx.execute(
            "INSERT INTO tender_images (section, filename, serial_number, image)
             VALUES (?1, ?2, ?3, ?4)",
            params![section.folder, filename, next_serial, bytes],
        )?;
        let id = tx.last_insert_rowid();

        tx.commit()?;
        self.get_image(id)
    }

    /// Update an image: replace its bytes, move it to another serial slot,
    /// move it to another section, or any combination.
    ///
    /// `target` is the section the image should live in afterwards (pass the
    /// image's current section when only bytes or serial change). Both the
    /// vacated and the receiving serial sequences stay dense; every shifted
    /// row is renamed to match its new serial.
    pub fn update_image(
        &mut self,
        id: i64,
        bytes: Option<&[u8]>,
        target: &Section,
        serial: Option<i64>,
    ) -> Result<ImageRecord> {
        let tx = self.conn.transaction()?;

        let current: Option<String> = tx
            .query_row(
                "SELECT section FROM tender_images WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let current_section = current.ok_or(Error::ImageNotFound(id))?;

        if let Some(data) = bytes {
            tx.execute(
                "UPDATE tender_images SET image = ?1, uploaded_at = datetime('now') WHERE id = ?2",
                params![data, id],
            )?;
        }

        if current_section == target.folder {
            if serial.is_some() {
                reorder_within_section(&tx, &target.folder, &target.name, id, serial)?;
            }
        } else {
            // Cross-section move: close the gap behind, open a slot ahead.
            tx.execute(
                "UPDATE tender_images SET section = ?1 WHERE id = ?2",
                params![target.folder, id],
            )?;
            renumber_section(&tx, &current_section, None)?;
            reorder_within_section(&tx, &target.folder, &target.name, id, serial)?;
        }

        tx.commit()?;
        self.get_image(id)
    }

    /// Delete an image and shift every higher serial in its section down by one.
    pub fn delete_image(&mut self, id: i64) -> Result<()> {
        let tx = self.conn.transaction()?;

        let section: Option<String> = tx
            .query_row(
                "SELECT section FROM tender_images WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let section = section.ok_or(Error::ImageNotFound(id))?;

        tx.execute("DELETE FROM tender_images WHERE id = ?1", params![id])?;
        renumber_section(&tx, &section, None)?;

        tx.commit()?;
        Ok(())
    }

    /// All stored images, ordered by numeric section then serial.
    pub fn list_images(&self) -> Result<Vec<ImageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, section, filename, serial_number, uploaded_at
             FROM tender_images
             ORDER BY CAST(section AS INTEGER), serial_number",
        )?;
        let rows = stmt.query_map([], record_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    /// One image's metadata.
    pub fn get_image(&self, id: i64) -> Result<ImageRecord> {
        self.conn
            .query_row(
                "SELECT id, section, filename, serial_number, uploaded_at
                 FROM tender_images WHERE id = ?1",
                params![id],
                record_from_row,
            )
            .optional()?
            .ok_or(Error::ImageNotFound(id))
    }

    /// One image's raw bytes.
    pub fn image_bytes(&self, id: i64) -> Result<Vec<u8>> {
        self.conn
            .query_row(
                "SELECT image FROM tender_images WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(Error::ImageNotFound(id))
    }

    /// All images of one section with their blobs, in serial order.
    pub fn section_images(&self, folder: &str) -> Result<Vec<SectionImage>> {
        let mut stmt = self.conn.prepare(
            "SELECT serial_number, filename, image
             FROM tender_images WHERE section = ?1
             ORDER BY serial_number",
        )?;
        let rows = stmt.query_map(params![folder], |row| {
            Ok(SectionImage {
                serial: row.get(0)?,
                filename: row.get(1)?,
                bytes: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        id: row.get(0)?,
        section: row.get(1)?,
        filename: row.get(2)?,
        serial_number: row.get(3)?,
        uploaded_at: row.get(4)?,
    })
}

/// Place `id` at the requested serial within its section, shifting the rows
/// in between, then renumber so serials are exactly 1..=N.
///
/// `serial` of `None` means "append at the end" (used for cross-section
/// moves without an explicit slot). Out-of-range requests are clamped.
fn reorder_within_section(
    tx: &rusqlite::Transaction<'_>,
    folder: &str,
    name: &str,
    id: i64,
    serial: Option<i64>,
) -> Result<()> {
    let mut stmt = tx.prepare(
        "SELECT id FROM tender_images WHERE section = ?1 ORDER BY serial_number",
    )?;
    let mut ids: Vec<i64> = stmt
        .query_map(params![folder], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    drop(stmt);

    ids.retain(|&existing| existing != id);

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let end = ids.len() as i64 + 1;
    let requested = serial.unwrap_or(end).clamp(1, end);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    ids.insert((requested - 1) as usize, id);

    apply_order(tx, &ids, Some(name))
}

/// Renumber a section's rows to dense 1..=N in their current serial order.
///
/// When `name` is `None` the section name is recovered from the stored
/// filenames (everything before the trailing `_<serial>`).
fn renumber_section(
    tx: &rusqlite::Transaction<'_>,
    folder: &str,
    name: Option<&str>,
) -> Result<()> {
    let mut stmt = tx.prepare(
        "SELECT id, filename FROM tender_images WHERE section = ?1 ORDER BY serial_number",
    )?;
    let rows: Vec<(i64, String)> = stmt
        .query_map(params![folder], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    drop(stmt);

    if rows.is_empty() {
        return Ok(());
    }

    let derived;
    let name = match name {
        Some(n) => n,
        None => {
            derived = section_name_from_filename(&rows[0].1).to_string();
            &derived
        }
    };

    let ids: Vec<i64> = rows.into_iter().map(|(id, _)| id).collect();
    apply_order(tx, &ids, Some(name))
}

fn apply_order(tx: &rusqlite::Transaction<'_>, ids: &[i64], name: Option<&str>) -> Result<()> {
    for (index, &row_id) in ids.iter().enumerate() {
        #[allow(clippy::cast_possible_wrap)]
        let serial = index as i64 + 1;
        match name {
            Some(n) => {
                tx.execute(
                    "UPDATE tender_images SET serial_number = ?1, filename = ?2 WHERE id = ?3",
                    params![serial, format!("{n}_{serial}"), row_id],
                )?;
            }
            None => {
                tx.execute(
                    "UPDATE tender_images SET serial_number = ?1 WHERE id = ?2",
                    params![serial, row_id],
                )?;
            }
        }
    }
    Ok(())
}

/// Strip the trailing `_<serial>` from a stored filename.
fn section_name_from_filename(filename: &str) -> &str {
    filename
        .rfind('_')
        .map_or(filename, |idx| &filename[..idx])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn section(folder: &str, name: &str) -> Section {
        Section {
            number: folder.parse().unwrap(),
            folder: folder.to_string(),
            name: name.to_string(),
            pdf_path: PathBuf::from(format!("{name}.pdf")),
        }
    }

    fn serials(store: &ImageStore, folder: &str) -> Vec<i64> {
        store
            .list_images()
            .unwrap()
            .into_iter()
            .filter(|r| r.section == folder)
            .map(|r| r.serial_number)
            .collect()
    }

    #[test]
    fn test_add_assigns_dense_serials() {
        let mut store = ImageStore::in_memory().unwrap();
        let sec = section("2", "Technical Proposal");

        let a = store.add_image(&sec, b"aaa").unwrap();
        let b = store.add_image(&sec, b"bbb").unwrap();

        assert_eq!(a.serial_number, 1);
        assert_eq!(a.filename, "Technical Proposal_1");
        assert_eq!(b.serial_number, 2);
        assert_eq!(b.filename, "Technical Proposal_2");
    }

    #[test]
    fn test_delete_closes_gap_and_renames() {
        let mut store = ImageStore::in_memory().unwrap();
        let sec = section("2", "Site Photos");

        let a = store.add_image(&sec, b"a").unwrap();
        let b = store.add_image(&sec, b"b").unwrap();
        let c = store.add_image(&sec, b"c").unwrap();

        store.delete_image(a.id).unwrap();

        assert_eq!(serials(&store, "2"), vec![1, 2]);
        let b = store.get_image(b.id).unwrap();
        let c = store.get_image(c.id).unwrap();
        assert_eq!((b.serial_number, b.filename.as_str()), (1, "Site Photos_1"));
        assert_eq!((c.serial_number, c.filename.as_str()), (2, "Site Photos_2"));
    }

    #[test]
    fn test_move_down_shifts_between() {
        let mut store = ImageStore::in_memory().unwrap();
        let sec = section("1", "Cover");

        let a = store.add_image(&sec, b"a").unwrap();
        let b = store.add_image(&sec, b"b").unwrap();
        let c = store.add_image(&sec, b"c").unwrap();

        // Move c from serial 3 to serial 1: a and b shift up.
        store.update_image(c.id, None, &sec, Some(1)).unwrap();

        assert_eq!(store.get_image(c.id).unwrap().serial_number, 1);
        assert_eq!(store.get_image(a.id).unwrap().serial_number, 2);
        assert_eq!(store.get_image(b.id).unwrap().serial_number, 3);
        assert_eq!(serials(&store, "1"), vec![1, 2, 3]);
    }

    #[test]
    fn test_move_up_shifts_between() {
        let mut store = ImageStore::in_memory().unwrap();
        let sec = section("1", "Cover");

        let a = store.add_image(&sec, b"a").unwrap();
        let b = store.add_image(&sec, b"b").unwrap();
        let c = store.add_image(&sec, b"c").unwrap();

        store.update_image(a.id, None, &sec, Some(3)).unwrap();

        assert_eq!(store.get_image(b.id).unwrap().serial_number, 1);
        assert_eq!(store.get_image(c.id).unwrap().serial_number, 2);
        assert_eq!(store.get_image(a.id).unwrap().serial_number, 3);
    }

    #[test]
    fn test_out_of_range_serial_is_clamped() {
        let mut store = ImageStore::in_memory().unwrap();
        let sec = section("1", "Cover");

        let a = store.add_image(&sec, b"a").unwrap();
        let _b = store.add_image(&sec, b"b").unwrap();

        store.update_image(a.id, None, &sec, Some(99)).unwrap();
        assert_eq!(store.get_image(a.id).unwrap().serial_number, 2);

        store.update_image(a.id, None, &sec, Some(0)).unwrap();
        assert_eq!(store.get_image(a.id).unwrap().serial_number, 1);
    }

    #[test]
    fn test_cross_section_move_keeps_both_dense() {
        let mut store = ImageStore::in_memory().unwrap();
        let src = section("1", "Cover");
        let dst = section("2", "Photos");

        let a = store.add_image(&src, b"a").unwrap();
        let b = store.add_image(&src, b"b").unwrap();
        let x = store.add_image(&dst, b"x").unwrap();

        store.update_image(a.id, None, &dst, None).unwrap();

        assert_eq!(serials(&store, "1"), vec![1]);
        assert_eq!(store.get_image(b.id).unwrap().filename, "Cover_1");
        assert_eq!(serials(&store, "2"), vec![1, 2]);
        let moved = store.get_image(a.id).unwrap();
        assert_eq!(moved.section, "2");
        assert_eq!(moved.filename, "Photos_2");
        assert_eq!(store.get_image(x.id).unwrap().serial_number, 1);
    }

    #[test]
    fn test_replace_bytes_only() {
        let mut store = ImageStore::in_memory().unwrap();
        let sec = section("1", "Cover");

        let a = store.add_image(&sec, b"old").unwrap();
        store.update_image(a.id, Some(b"new"), &sec, None).unwrap();

        assert_eq!(store.image_bytes(a.id).unwrap(), b"new");
        assert_eq!(store.get_image(a.id).unwrap().serial_number, 1);
    }

    #[test]
    fn test_density_after_mixed_edit_sequence() {
        let mut store = ImageStore::in_memory().unwrap();
        let sec = section("3", "Progress");

        let mut ids = Vec::new();
        for payload in [&b"a"[..], b"b", b"c", b"d", b"e"] {
            ids.push(store.add_image(&sec, payload).unwrap().id);
        }
        store.delete_image(ids[1]).unwrap();
        store.update_image(ids[4], None, &sec, Some(1)).unwrap();
        store.delete_image(ids[0]).unwrap();
        store.update_image(ids[2], None, &sec, Some(3)).unwrap();

        let remaining = serials(&store, "3");
        assert_eq!(remaining, vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_image_errors() {
        let mut store = ImageStore::in_memory().unwrap();
        let sec = section("1", "Cover");

        assert!(matches!(
            store.get_image(42),
            Err(Error::ImageNotFound(42))
        ));
        assert!(matches!(
            store.delete_image(42),
            Err(Error::ImageNotFound(42))
        ));
        assert!(matches!(
            store.update_image(42, None, &sec, None),
            Err(Error::ImageNotFound(42))
        ));
    }
}
