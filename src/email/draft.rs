use std::path::Path;
use thiserror::Error;

use crate::extraction::document::{DocumentSource, ExtractedDocument};

/// Everything needed to compose one draft. Built per document at
/// generation time and never persisted.
#[derive(Debug, Clone)]
pub struct DraftRequest {
    pub recipient_email: String,
    pub subject: String,
    pub body_html: String,
    pub sender_email: Option<String>,
    pub sender_name: Option<String>,
    /// Name given to the PDF attachment
    pub attachment_name: String,
    pub attachment: DocumentSource,
}

/// Sender identity copied into the `From` header
#[derive(Debug, Clone, PartialEq)]
pub struct Sender {
    pub email: String,
    pub name: Option<String>,
}

impl Sender {
    /// `None` when no usable address is given
    pub fn from_parts(email: Option<String>, name: Option<String>) -> Option<Self> {
        let email = email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty())?;
        let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        Some(Self { email, name })
    }
}

/// Subject, body and sender shared by every draft of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct CommonFields {
    pub subject: String,
    pub body_html: String,
    pub sender: Option<Sender>,
}

impl DraftRequest {
    /// Request for `document` addressed to `recipient`
    pub fn for_document(document: &ExtractedDocument, recipient: &str, common: &CommonFields) -> Self {
        Self {
            recipient_email: recipient.to_string(),
            subject: common.subject.clone(),
            body_html: common.body_html.clone(),
            sender_email: common.sender.as_ref().map(|s| s.email.clone()),
            sender_name: common.sender.as_ref().and_then(|s| s.name.clone()),
            attachment_name: document.filename.clone(),
            attachment: document.source.clone(),
        }
    }

    pub fn artifact_name(&self) -> String {
        draft_file_name(&self.attachment_name)
    }
}

/// A composed message ready for delivery
#[derive(Debug, Clone)]
pub struct DraftArtifact {
    /// Suggested file name, `draft_<base>.eml`
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("no recipient email address")]
    MissingRecipient,
    #[error("PDF file not found: {0}")]
    AttachmentNotFound(String),
    #[error("failed to read attachment {path}: {source}")]
    AttachmentUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize message: {0}")]
    Serialization(#[source] std::io::Error),
}

/// `statement.PDF` -> `draft_statement.eml`
pub fn draft_file_name(pdf_filename: &str) -> String {
    format!("draft_{}.eml", base_name(pdf_filename))
}

/// File name without directories and without a trailing `.pdf` (any case)
pub fn base_name(pdf_filename: &str) -> &str {
    let name = Path::new(pdf_filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(pdf_filename);

    match name.len().checked_sub(4).and_then(|i| name.get(i..).map(|ext| (i, ext))) {
        Some((i, ext)) if ext.eq_ignore_ascii_case(".pdf") => &name[..i],
        _ => name,
    }
}
