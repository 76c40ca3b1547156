use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::form::FormData;
use crate::extraction::document::PdfExtraction;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub folder_path: String,
}

/// POST /api/pdf/extract
pub async fn extract_folder(
    State(state): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> Result<Json<Vec<PdfExtraction>>, ApiError> {
    if req.folder_path.trim().is_empty() {
        return Err(ApiError::BadRequest("Please enter a folder path".to_string()));
    }

    let documents = state.extractor.extract_folder(&req.folder_path).await?;
    Ok(Json(documents.iter().map(PdfExtraction::from).collect()))
}

/// POST /api/pdf/upload-extract
pub async fn upload_extract(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Vec<PdfExtraction>>, ApiError> {
    let mut form = FormData::read(multipart).await?;
    let files = form.take_files("files");

    tracing::info!("Received {} uploaded file(s) for extraction", files.len());
    let documents = state.extractor.extract_uploads(files).await?;
    Ok(Json(documents.iter().map(PdfExtraction::from).collect()))
}
