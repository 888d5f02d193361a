//! Download route - negotiated merged binder.

use axum::{
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::helpers::{ResultExt, RouteResult};
use crate::state::{AppState, MERGED_FILENAME};

/// Download the merged tender binder.
///
/// Walks the quality ladder until the result fits the configured cap. A
/// cap miss still serves the smallest candidate, flagged with `X-Warning`.
pub async fn download_tender(State(state): State<Arc<AppState>>) -> RouteResult<Response> {
    let cap = state.assembler().config().merged_cap_bytes;

    let merged = state
        .run_with_store(|store, assembler| assembler.assemble_within_cap(store))
        .await?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{MERGED_FILENAME}\""),
        );

    if !merged.within_cap {
        warn!(
            "Serving over-cap binder: {} bytes at quality {}",
            merged.bytes.len(),
            merged.quality
        );
        builder = builder.header(
            "X-Warning",
            format!(
                "merged document exceeds {cap} bytes; smallest candidate served (quality {})",
                merged.quality
            ),
        );
    }

    builder.body(Body::from(merged.bytes)).or_internal_error()
}
