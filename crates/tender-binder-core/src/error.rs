use thiserror::Error;

/// Unified error type for tender-binder-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Section discovery (scanning the section tree)
/// - Image store operations (SQLite reads/writes, renumbering)
/// - Image processing (decoding, encoding, resizing)
/// - PDF operations (loading, page embedding, merging, saving)
/// - Configuration operations (loading, validation)
/// - General I/O operations
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Section Errors
    // ==========================================================================
    /// Failed to scan the section directory tree
    #[error("failed to scan section tree: {0}")]
    SectionScan(String),

    /// A section referenced by folder name does not exist
    #[error("unknown section folder: {0}")]
    SectionNotFound(String),

    /// No section produced any pages to merge
    #[error("no section documents to merge")]
    NothingToMerge,

    // ==========================================================================
    // Image Store Errors
    // ==========================================================================
    /// Error from the SQLite image store
    #[error("image store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// An image id was not found in the store
    #[error("image {0} not found")]
    ImageNotFound(i64),

    // ==========================================================================
    // Image Errors
    // ==========================================================================
    /// Uploaded bytes are not a supported image format
    #[error("unsupported image type: {0}")]
    UnsupportedImage(String),

    /// Failed to decode image bytes
    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    // ==========================================================================
    // PDF Errors
    // ==========================================================================
    /// Error from the lopdf library
    #[error("lopdf error: {0}")]
    Lopdf(String),

    /// Failed to save a PDF
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
