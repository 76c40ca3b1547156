use axum::{
    body::Body,
    extract::{Multipart, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::Deserialize;
use std::path::PathBuf;

use crate::api::downloads::attachment_disposition;
use crate::api::error::ApiError;
use crate::api::form::FormData;
use crate::email::draft::{DraftArtifact, DraftRequest, Sender};
use crate::extraction::document::DocumentSource;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DraftEmailRequest {
    pub pdf_filename: String,
    pub pdf_path: String,
    pub recipient_email: String,
    #[serde(default)]
    pub sender_email: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub subject: String,
    pub body: String,
}

fn request_for(
    recipient: String,
    subject: String,
    body: String,
    sender: Option<Sender>,
    attachment_name: String,
    attachment: DocumentSource,
) -> DraftRequest {
    DraftRequest {
        recipient_email: recipient,
        subject,
        body_html: body,
        sender_email: sender.as_ref().map(|s| s.email.clone()),
        sender_name: sender.and_then(|s| s.name),
        attachment_name,
        attachment,
    }
}

/// Raw `.eml` response offered as a file download
fn eml_response(artifact: DraftArtifact) -> Result<Response, ApiError> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "message/rfc822")
        .header("Content-Length", artifact.bytes.len().to_string())
        .header("Content-Disposition", attachment_disposition(&artifact.filename))
        .body(Body::from(artifact.bytes))
        .map_err(|e| ApiError::InternalError(e.to_string()))
}

/// POST /api/outlook/draft: one draft for a PDF on disk
pub async fn create_draft(
    State(state): State<AppState>,
    Json(req): Json<DraftEmailRequest>,
) -> Result<Response, ApiError> {
    let sender = Sender::from_parts(req.sender_email, req.sender_name);
    let request = request_for(
        req.recipient_email,
        req.subject,
        req.body,
        sender,
        req.pdf_filename,
        DocumentSource::ByPath(PathBuf::from(req.pdf_path)),
    );

    let artifact = state.composer.compose(&request).await?;
    tracing::info!(
        "Draft {} created for {}",
        artifact.filename,
        request.recipient_email
    );
    eml_response(artifact)
}

/// POST /api/outlook/draft-upload: one draft for an uploaded PDF
pub async fn create_draft_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = FormData::read(multipart).await?;
    let pdf = form
        .take_files("pdf_file")
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::BadRequest("Missing form field 'pdf_file'".to_string()))?;

    let sender = Sender::from_parts(form.optional("sender_email"), form.optional("sender_name"));
    let attachment_name = pdf.filename.clone();
    let request = request_for(
        form.required("recipient_email")?,
        form.required("subject")?,
        form.required("body")?,
        sender,
        attachment_name.clone(),
        DocumentSource::ByBlob {
            name: attachment_name,
            bytes: pdf.bytes,
        },
    );

    let artifact = state.composer.compose(&request).await?;
    tracing::info!(
        "Draft {} created for {} (uploaded PDF)",
        artifact.filename,
        request.recipient_email
    );
    eml_response(artifact)
}
