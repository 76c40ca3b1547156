use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

use crate::api::accounts::find_account;
use crate::api::downloads::download_url;
use crate::api::error::ApiError;
use crate::api::form::FormData;
use crate::api::templates::find_template;
use crate::batch::orchestrator::{BatchOrchestrator, BatchSummary, DraftFailure, DraftSuccess};
use crate::batch::report::{build_report, report_filename, save_report};
use crate::batch::selection::Selection;
use crate::batch::sink::{ArchiveSink, DeliveryMode, DirectorySink};
use crate::email::draft::{CommonFields, Sender};
use crate::extraction::document::{DocumentSource, ExtractedDocument, PdfExtraction};
use crate::AppState;

/// Path-backed batch request: the extraction results sent back by the
/// client plus the message fields.
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub documents: Vec<PdfExtraction>,
    /// Filenames to generate drafts for, in order. Everything when absent.
    #[serde(default)]
    pub selected: Option<Vec<String>>,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub sender_id: Option<Uuid>,
    #[serde(default)]
    pub sender_email: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub delivery: Option<DeliveryMode>,
}

#[derive(Debug, Deserialize)]
struct RecipientEntry {
    filename: String,
    email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileLink {
    pub filename: String,
    pub download_url: String,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub delivery: DeliveryMode,
    pub summary: BatchSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub drafts: Vec<FileLink>,
    pub successes: Vec<DraftSuccess>,
    pub failures: Vec<DraftFailure>,
    pub report: Option<FileLink>,
}

#[derive(Debug, Deserialize)]
pub struct SaveReportRequest {
    pub report_content: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Fields shared by both batch flows once the documents are known
struct MessageFields {
    selected: Option<Vec<String>>,
    template_id: Option<Uuid>,
    subject: Option<String>,
    body: Option<String>,
    sender_id: Option<Uuid>,
    sender: Option<Sender>,
}

/// Build and validate the working selection. Explicit subject and body
/// override the template's.
async fn prepare_selection(
    state: &AppState,
    documents: Vec<ExtractedDocument>,
    fields: MessageFields,
) -> Result<(Vec<ExtractedDocument>, CommonFields), ApiError> {
    let mut selection = Selection::new(documents);

    match fields.selected {
        Some(names) => {
            for name in &names {
                selection.select(name)?;
            }
        }
        None => selection.select_all(),
    }

    if let Some(id) = fields.template_id {
        selection.apply_template(&find_template(state, id).await?);
    }
    if let Some(subject) = fields.subject {
        selection.set_subject(subject);
    }
    if let Some(body) = fields.body {
        selection.set_body(body);
    }

    if let Some(id) = fields.sender_id {
        selection.use_account(&find_account(state, id).await?);
    } else {
        selection.set_sender(fields.sender);
    }

    Ok(selection.prepare()?)
}

/// First eight hex digits of a fresh UUID
fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

fn link(output_dir: &Path, path: &Path) -> Option<FileLink> {
    Some(FileLink {
        filename: path.file_name()?.to_str()?.to_string(),
        download_url: download_url(output_dir, path)?,
    })
}

/// Run one batch through the sink for `delivery` and write its report.
async fn execute(
    state: &AppState,
    documents: Vec<ExtractedDocument>,
    common: CommonFields,
    delivery: DeliveryMode,
) -> Result<BatchResponse, ApiError> {
    let output_dir = state.config.storage.output_dir.as_path();
    let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let run_id = format!("{}_{}", stamp, short_id());
    let batch_dir = output_dir.join(format!("batch_{}", run_id));
    let orchestrator = BatchOrchestrator::new(state.composer.as_ref(), state.config.pacing());

    let (result, archive) = match delivery {
        DeliveryMode::Individual => {
            let mut sink = DirectorySink::create(batch_dir.clone()).await?;
            let result = orchestrator.run_batch(&documents, &common, &mut sink).await?;
            (result, None)
        }
        DeliveryMode::Archive => {
            let mut sink = ArchiveSink::create(output_dir, format!("drafts_{}.zip", run_id))?;
            let result = orchestrator.run_batch(&documents, &common, &mut sink).await?;
            let archive = sink.finish().await?;
            tracing::info!(
                "Archive {} written with {} draft(s)",
                archive.filename,
                archive.entries
            );
            (result, Some(archive))
        }
    };

    let report = match build_report(&result, Utc::now()) {
        Some(content) => {
            let name = report_filename(Utc::now().date_naive());
            let path = save_report(&batch_dir, &name, &content).await?;
            link(output_dir, &path)
        }
        None => None,
    };

    let drafts = result
        .successes
        .iter()
        .filter_map(|s| s.stored_at.as_deref())
        .filter_map(|path| link(output_dir, path))
        .collect();

    Ok(BatchResponse {
        success: true,
        delivery,
        summary: result.summary(),
        download_url: archive
            .as_ref()
            .and_then(|a| download_url(output_dir, &a.path)),
        filename: archive.map(|a| a.filename),
        drafts,
        successes: result.successes,
        failures: result.failures,
        report,
    })
}

/// POST /api/outlook/batch: drafts for PDFs already on disk
pub async fn run_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let documents = req
        .documents
        .into_iter()
        .map(|record| {
            let filename = record.filename.clone();
            record
                .into_document()
                .ok_or_else(|| ApiError::BadRequest(format!("Missing file path for {}", filename)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let fields = MessageFields {
        selected: req.selected,
        template_id: req.template_id,
        subject: req.subject,
        body: req.body,
        sender_id: req.sender_id,
        sender: Sender::from_parts(req.sender_email, req.sender_name),
    };
    let (selected, common) = prepare_selection(&state, documents, fields).await?;
    let delivery = req.delivery.unwrap_or(state.config.batch.delivery);

    Ok(Json(execute(&state, selected, common, delivery).await?))
}

/// POST /api/outlook/batch-drafts: drafts for uploaded PDFs, packed into
/// one archive unless `delivery` says otherwise
pub async fn run_upload_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<BatchResponse>, ApiError> {
    let mut form = FormData::read(multipart).await?;
    let files = form.take_files("pdf_files");
    if files.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded".to_string()));
    }

    let recipients: HashMap<String, String> = match form.optional("recipients") {
        Some(raw) => serde_json::from_str::<Vec<RecipientEntry>>(&raw)
            .map_err(|e| ApiError::BadRequest(format!("Invalid recipients: {}", e)))?
            .into_iter()
            .map(|entry| (entry.filename, entry.email.trim().to_string()))
            .filter(|(_, email)| !email.is_empty())
            .collect(),
        None => HashMap::new(),
    };

    let documents = files
        .into_iter()
        .map(|file| {
            let emails = recipients.get(&file.filename).cloned().into_iter().collect();
            blob_document(file.filename, file.bytes, emails)
        })
        .collect();

    let delivery = match form.optional("delivery") {
        Some(raw) => raw
            .parse::<DeliveryMode>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => DeliveryMode::Archive,
    };

    let fields = MessageFields {
        selected: None,
        template_id: parse_id(form.optional("template_id"))?,
        subject: form.optional("subject"),
        body: form.optional("body"),
        sender_id: parse_id(form.optional("sender_id"))?,
        sender: Sender::from_parts(form.optional("sender_email"), form.optional("sender_name")),
    };
    let (selected, common) = prepare_selection(&state, documents, fields).await?;

    Ok(Json(execute(&state, selected, common, delivery).await?))
}

fn blob_document(filename: String, bytes: Bytes, emails: Vec<String>) -> ExtractedDocument {
    let source = DocumentSource::ByBlob {
        name: filename.clone(),
        bytes,
    };
    ExtractedDocument::new(filename, source, emails)
}

fn parse_id(raw: Option<String>) -> Result<Option<Uuid>, ApiError> {
    raw.map(|s| {
        Uuid::parse_str(&s).map_err(|_| ApiError::BadRequest(format!("Invalid id '{}'", s)))
    })
    .transpose()
}

/// POST /api/reports: keep a report the client edited or generated
pub async fn save_report_file(
    State(state): State<AppState>,
    Json(req): Json<SaveReportRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.report_content.trim().is_empty() {
        return Err(ApiError::BadRequest("Report content is empty".to_string()));
    }

    let filename = req
        .filename
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| report_filename(Utc::now().date_naive()));
    let output_dir = &state.config.storage.output_dir;
    let path = save_report(&output_dir.join("reports"), &filename, &req.report_content).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "filename": path.file_name().and_then(|n| n.to_str()),
        "download_url": download_url(output_dir, &path),
    })))
}
