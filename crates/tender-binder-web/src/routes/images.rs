//! Image routes: list, add, update, delete, and raw blob serving.

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use axum_extra::extract::Multipart;
use std::sync::Arc;
use tracing::info;

use tender_binder_core::{ensure_supported_upload, find_section, sniff_image_mime};

use crate::helpers::{CoreResultExt, ResultExt, RouteResult};
use crate::state::{AppState, rebuild_merged};
use super::{AddImageResponse, ImagesResponse, OkResponse};

/// List all stored images, sorted by section then serial.
pub async fn list_images(
    State(state): State<Arc<AppState>>,
) -> RouteResult<Json<ImagesResponse>> {
    let images = state
        .run_with_store(|store, _| store.list_images())
        .await?;
    Ok(Json(ImagesResponse { images }))
}

/// Add an image at the end of a section's serial sequence, then rebuild
/// the merged binder.
pub async fn add_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> RouteResult<Json<AddImageResponse>> {
    let mut folder: Option<String> = None;
    let mut data: Option<Vec<u8>> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name().unwrap_or("") {
            "section" => folder = Some(field.text().await.or_bad_request()?),
            "image" => data = Some(field.bytes().await.or_bad_request()?.to_vec()),
            _ => {}
        }
    }

    let folder = folder.ok_or((StatusCode::BAD_REQUEST, "Missing section field".to_string()))?;
    let data = data.ok_or((StatusCode::BAD_REQUEST, "Missing image field".to_string()))?;
    ensure_supported_upload(&data).or_status()?;

    let _guard = state.lock_section(&folder).await;

    let closure_folder = folder.clone();
    let merged_path = state
        .run_with_store(move |store, assembler| {
            let sections = assembler.sections()?;
            let section = find_section(&sections, &closure_folder)?;
            let record = store.add_image(&section, &data)?;
            info!(
                "Stored {} as serial {} in section {}",
                record.filename, record.serial_number, record.section
            );
            rebuild_merged(assembler, store)
        })
        .await?;

    Ok(Json(AddImageResponse {
        success: true,
        merged_pdf: merged_path.display().to_string(),
    }))
}

/// Update an image: replace its bytes and/or move it to another serial or
/// section, then rebuild the merged binder.
pub async fn update_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> RouteResult<Json<OkResponse>> {
    let mut folder: Option<String> = None;
    let mut serial: Option<i64> = None;
    let mut data: Option<Vec<u8>> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name().unwrap_or("") {
            "section" => folder = Some(field.text().await.or_bad_request()?),
            "serial_number" => {
                let text = field.text().await.or_bad_request()?;
                serial = Some(text.trim().parse::<i64>().or_bad_request()?);
            }
            "image" => data = Some(field.bytes().await.or_bad_request()?.to_vec()),
            _ => {}
        }
    }

    if let Some(bytes) = &data {
        ensure_supported_upload(bytes).or_status()?;
    }

    let current = state.run_with_store(move |store, _| store.get_image(id)).await?;
    let target_folder = folder.unwrap_or_else(|| current.section.clone());

    let _guards = state
        .lock_sections(&[current.section.as_str(), target_folder.as_str()])
        .await;

    state
        .run_with_store(move |store, assembler| {
            let sections = assembler.sections()?;
            let section = find_section(&sections, &target_folder)?;
            let record = store.update_image(id, data.as_deref(), &section, serial)?;
            info!(
                "Updated image {} -> section {} serial {}",
                id, record.section, record.serial_number
            );
            rebuild_merged(assembler, store).map(|_| ())
        })
        .await?;

    Ok(Json(OkResponse { success: true }))
}

/// Delete an image, closing its serial gap, then rebuild the merged binder.
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> RouteResult<Json<OkResponse>> {
    let current = state.run_with_store(move |store, _| store.get_image(id)).await?;
    let _guard = state.lock_section(&current.section).await;

    state
        .run_with_store(move |store, assembler| {
            store.delete_image(id)?;
            info!("Deleted image {} from section {}", id, current.section);
            rebuild_merged(assembler, store).map(|_| ())
        })
        .await?;

    Ok(Json(OkResponse { success: true }))
}

/// Serve an image's raw bytes, content type sniffed from magic bytes.
///
/// Supports ETag revalidation so the dashboard can cache thumbnails.
pub async fn image_blob(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> RouteResult<Response> {
    let bytes = state
        .run_with_store(move |store, _| store.image_bytes(id))
        .await?;

    let content_type = sniff_image_mime(&bytes).unwrap_or("application/octet-stream");
    let etag = format!("\"{:x}\"", md5::compute(&bytes));

    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && if_none_match.to_str().ok() == Some(etag.as_str())
    {
        return Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .body(Body::empty())
            .or_internal_error();
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ETAG, etag)
        .header(
            header::CACHE_CONTROL,
            "private, max-age=3600, must-revalidate",
        )
        .body(Body::from(bytes))
        .or_internal_error()
}
