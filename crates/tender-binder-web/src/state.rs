//! Shared application state.
//!
//! The image store sits behind one async mutex (a single SQLite
//! connection), and every structural edit additionally serializes on a
//! per-section mutex so concurrent edits to the same section cannot
//! interleave between the store transaction and the binder rebuild.
//!
//! Pipeline work (SQLite, file copies, PDF assembly) is synchronous and
//! CPU/IO heavy, so it always runs under `spawn_blocking`; the store lock
//! is taken inside the blocking task with `blocking_lock`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use tender_binder_core::{AppConfig, ImageStore, TenderAssembler};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::helpers::{CoreResultExt, RouteResult};

/// File name of the merged binder persisted after each edit.
pub const MERGED_FILENAME: &str = "tender_combined.pdf";

/// Global application state
pub struct AppState {
    assembler: TenderAssembler,
    store: Arc<Mutex<ImageStore>>,
    /// Edit serialization, keyed by section folder
    section_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AppState {
    /// Open the image store and prepare the output directory.
    pub fn new(config: AppConfig) -> Result<Self> {
        let store = ImageStore::open(&config.database_path).with_context(|| {
            format!("Failed to open image store at {}", config.database_path.display())
        })?;
        std::fs::create_dir_all(&config.output_dir).with_context(|| {
            format!("Failed to create output dir {}", config.output_dir.display())
        })?;

        Ok(Self {
            assembler: TenderAssembler::new(config),
            store: Arc::new(Mutex::new(store)),
            section_locks: Mutex::new(HashMap::new()),
        })
    }

    pub const fn assembler(&self) -> &TenderAssembler {
        &self.assembler
    }

    /// Acquire the edit lock for one section folder.
    pub async fn lock_section(&self, folder: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.section_locks.lock().await;
            Arc::clone(locks.entry(folder.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Acquire edit locks for several sections in a stable order.
    ///
    /// Folders are deduplicated and sorted before locking so two requests
    /// moving images between the same pair of sections cannot deadlock.
    pub async fn lock_sections(&self, folders: &[&str]) -> Vec<OwnedMutexGuard<()>> {
        let mut ordered: Vec<&str> = folders.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for folder in ordered {
            guards.push(self.lock_section(folder).await);
        }
        guards
    }

    /// Run a pipeline closure against the locked store on the blocking pool.
    pub async fn run_with_store<F, R>(&self, f: F) -> RouteResult<R>
    where
        F: FnOnce(&mut ImageStore, &TenderAssembler) -> tender_binder_core::Result<R>
            + Send
            + 'static,
        R: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let assembler = self.assembler.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = store.blocking_lock();
            f(&mut guard, &assembler)
        })
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Pipeline task panicked: {e}"),
            )
        })?
        .or_status()
    }
}

/// Rebuild the merged binder after an edit and persist it.
///
/// Returns the path the `mergedPdf` response field reports.
pub fn rebuild_merged(
    assembler: &TenderAssembler,
    store: &ImageStore,
) -> tender_binder_core::Result<PathBuf> {
    let quality = assembler.config().rebuild_quality;
    let bytes = assembler.assemble(store, quality)?;

    let out_dir = &assembler.config().output_dir;
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(MERGED_FILENAME);
    std::fs::write(&path, bytes)?;

    tracing::info!("Rebuilt merged binder at {}", path.display());
    Ok(path)
}
