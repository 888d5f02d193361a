//! HTTP route handlers for the tender binder API.
//!
//! All routes return JSON except the two binary endpoints (the merged
//! binder download and the raw image blob).

mod download;
mod images;
mod sections;

pub use download::download_tender;
pub use images::{add_image, delete_image, image_blob, list_images, update_image};
pub use sections::list_sections;

use serde::Serialize;
use tender_binder_core::{ImageRecord, Section};

/// `GET /api/tender/sections` response body.
#[derive(Serialize)]
pub struct SectionsResponse {
    pub sections: Vec<SectionPayload>,
}

/// One section as the dashboard sees it.
#[derive(Serialize)]
pub struct SectionPayload {
    pub folder: String,
    #[serde(rename = "sectionName")]
    pub section_name: String,
}

impl From<&Section> for SectionPayload {
    fn from(section: &Section) -> Self {
        Self {
            folder: section.folder.clone(),
            section_name: section.name.clone(),
        }
    }
}

/// `GET /api/tender/images` response body.
#[derive(Serialize)]
pub struct ImagesResponse {
    pub images: Vec<ImageRecord>,
}

/// `POST /api/tender/add-image` response body.
#[derive(Serialize)]
pub struct AddImageResponse {
    pub success: bool,
    #[serde(rename = "mergedPdf")]
    pub merged_pdf: String,
}

/// Plain success acknowledgement for update/delete.
#[derive(Serialize)]
pub struct OkResponse {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_section_payload_field_names() {
        let section = Section {
            number: 2,
            folder: "2".to_string(),
            name: "Technical Proposal".to_string(),
            pdf_path: PathBuf::from("x.pdf"),
        };
        let json = serde_json::to_string(&SectionPayload::from(&section)).unwrap_or_default();
        assert!(json.contains("\"folder\":\"2\""));
        assert!(json.contains("\"sectionName\":\"Technical Proposal\""));
    }

    #[test]
    fn test_add_image_response_field_names() {
        let json = serde_json::to_string(&AddImageResponse {
            success: true,
            merged_pdf: "out/tender_combined.pdf".to_string(),
        })
        .unwrap_or_default();
        assert!(json.contains("\"mergedPdf\""));
    }
}
