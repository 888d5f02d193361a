//! Section listing route.

use axum::{Json, extract::State};
use std::sync::Arc;

use crate::helpers::{CoreResultExt, RouteResult};
use crate::state::AppState;
use super::{SectionPayload, SectionsResponse};

/// List all tender sections in merge order.
pub async fn list_sections(
    State(state): State<Arc<AppState>>,
) -> RouteResult<Json<SectionsResponse>> {
    // Directory scanning is blocking I/O.
    let assembler = state.assembler().clone();
    let sections = tokio::task::spawn_blocking(move || assembler.sections())
        .await
        .map_err(|e| {
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Section scan task panicked: {e}"),
            )
        })?
        .or_status()?;

    Ok(Json(SectionsResponse {
        sections: sections.iter().map(SectionPayload::from).collect(),
    }))
}
