use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the raw bytes of a PDF live.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A file directly addressable on the local filesystem
    ByPath(PathBuf),
    /// An uploaded in-memory blob
    ByBlob { name: String, bytes: Bytes },
}

impl DocumentSource {
    /// Resolve the source to its raw bytes
    pub async fn read(&self) -> std::io::Result<Bytes> {
        match self {
            DocumentSource::ByPath(path) => tokio::fs::read(path).await.map(Bytes::from),
            DocumentSource::ByBlob { bytes, .. } => Ok(bytes.clone()),
        }
    }

    /// Human-readable locator used in logs and error messages
    pub fn describe(&self) -> String {
        match self {
            DocumentSource::ByPath(path) => path.display().to_string(),
            DocumentSource::ByBlob { name, .. } => format!("upload:{}", name),
        }
    }
}

/// One PDF and the addresses found in it, in discovery order.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub filename: String,
    pub source: DocumentSource,
    pub emails: Vec<String>,
}

impl ExtractedDocument {
    pub fn new(filename: impl Into<String>, source: DocumentSource, emails: Vec<String>) -> Self {
        Self {
            filename: filename.into(),
            source,
            emails,
        }
    }

    /// The first discovered address is the draft recipient
    pub fn recipient(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }

    pub fn file_path(&self) -> Option<&Path> {
        match &self.source {
            DocumentSource::ByPath(path) => Some(path),
            DocumentSource::ByBlob { .. } => None,
        }
    }
}

/// Wire form of an extraction result: `{filename, emails, file_path}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdfExtraction {
    pub filename: String,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl From<&ExtractedDocument> for PdfExtraction {
    fn from(doc: &ExtractedDocument) -> Self {
        Self {
            filename: doc.filename.clone(),
            emails: doc.emails.clone(),
            file_path: doc.file_path().map(|p| p.display().to_string()),
        }
    }
}

impl PdfExtraction {
    /// Rebuild a path-backed document from a record sent back by the client.
    /// Returns `None` when the record carries no file path.
    pub fn into_document(self) -> Option<ExtractedDocument> {
        let path = self.file_path?;
        Some(ExtractedDocument::new(
            self.filename,
            DocumentSource::ByPath(PathBuf::from(path)),
            self.emails,
        ))
    }
}
