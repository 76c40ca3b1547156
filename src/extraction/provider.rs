use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use super::document::{DocumentSource, ExtractedDocument};
use super::text;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Folder path does not exist: {0}")]
    FolderNotFound(String),
    #[error("Path is not a directory: {0}")]
    NotADirectory(String),
    #[error("Permission denied to access folder: {0}")]
    PermissionDenied(String),
    #[error("No PDF files found in the specified folder")]
    NoPdfFiles,
    #[error("No files uploaded")]
    NoFilesUploaded,
    #[error("No valid PDF files uploaded")]
    NoValidPdfs,
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A PDF received as part of a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedPdf {
    pub filename: String,
    pub bytes: Bytes,
}

/// Turns a folder or a set of uploads into extracted documents.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Scan every `.pdf` file directly inside `folder`.
    async fn extract_folder(&self, folder: &str) -> Result<Vec<ExtractedDocument>, ExtractionError>;

    /// Extract addresses from uploaded PDFs. Uploads are persisted so that
    /// later draft requests can address them by path.
    async fn extract_uploads(
        &self,
        files: Vec<UploadedPdf>,
    ) -> Result<Vec<ExtractedDocument>, ExtractionError>;
}

/// Extraction backed by `lopdf` text extraction and an address regex.
pub struct PdfExtractor {
    upload_dir: PathBuf,
}

impl PdfExtractor {
    pub fn new(upload_dir: PathBuf) -> Self {
        Self { upload_dir }
    }
}

#[async_trait]
impl ExtractionProvider for PdfExtractor {
    async fn extract_folder(&self, folder: &str) -> Result<Vec<ExtractedDocument>, ExtractionError> {
        let folder = normalize_folder_path(folder);
        let root = Path::new(&folder);

        let meta = tokio::fs::metadata(root)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    ExtractionError::PermissionDenied(folder.clone())
                }
                _ => ExtractionError::FolderNotFound(folder.clone()),
            })?;
        if !meta.is_dir() {
            return Err(ExtractionError::NotADirectory(folder));
        }

        let pdf_files = list_pdf_files(root).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => ExtractionError::PermissionDenied(folder.clone()),
            _ => ExtractionError::Io {
                path: folder.clone(),
                source: e,
            },
        })?;

        if pdf_files.is_empty() {
            return Err(ExtractionError::NoPdfFiles);
        }

        tracing::info!("Extracting emails from {} PDF(s) in {}", pdf_files.len(), folder);

        let mut results = Vec::with_capacity(pdf_files.len());
        for filename in pdf_files {
            let path = root.join(&filename);
            let emails = match tokio::fs::read(&path).await {
                Ok(data) => scan(data, filename.clone()).await,
                Err(e) => {
                    tracing::error!("Error reading {}: {}", path.display(), e);
                    Vec::new()
                }
            };
            tracing::debug!("{}: {} address(es)", filename, emails.len());
            results.push(ExtractedDocument::new(
                filename,
                DocumentSource::ByPath(path),
                emails,
            ));
        }

        Ok(results)
    }

    async fn extract_uploads(
        &self,
        files: Vec<UploadedPdf>,
    ) -> Result<Vec<ExtractedDocument>, ExtractionError> {
        if files.is_empty() {
            return Err(ExtractionError::NoFilesUploaded);
        }

        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| ExtractionError::Io {
                path: self.upload_dir.display().to_string(),
                source: e,
            })?;

        let mut results = Vec::new();
        for file in files {
            if !is_pdf_name(&file.filename) {
                tracing::debug!("Ignoring non-PDF upload {}", file.filename);
                continue;
            }

            let emails = scan(file.bytes.to_vec(), file.filename.clone()).await;

            // Keep the upload for later draft generation
            let stored_name = format!("{}_{}", Uuid::new_v4().simple(), safe_file_name(&file.filename));
            let stored_path = self.upload_dir.join(stored_name);
            tokio::fs::write(&stored_path, &file.bytes)
                .await
                .map_err(|e| ExtractionError::Io {
                    path: stored_path.display().to_string(),
                    source: e,
                })?;

            results.push(ExtractedDocument::new(
                file.filename,
                DocumentSource::ByPath(stored_path),
                emails,
            ));
        }

        if results.is_empty() {
            return Err(ExtractionError::NoValidPdfs);
        }

        Ok(results)
    }
}

/// PDF parsing is CPU bound; keep it off the async workers.
async fn scan(data: Vec<u8>, label: String) -> Vec<String> {
    tokio::task::spawn_blocking(move || text::emails_in_pdf(&data, &label))
        .await
        .unwrap_or_else(|e| {
            tracing::error!("PDF scan task failed: {}", e);
            Vec::new()
        })
}

async fn list_pdf_files(root: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(root).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if is_pdf_name(name) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Strip quotes pasted along with the path and collapse doubled backslashes.
pub fn normalize_folder_path(raw: &str) -> String {
    raw.trim()
        .replace("\\\\", "\\")
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string()
}

pub fn is_pdf_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

/// Final path component of an uploaded name, so it cannot escape a directory.
pub fn safe_file_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .find(|part| !part.is_empty() && *part != "..")
        .unwrap_or("upload.pdf")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folder_path() {
        assert_eq!(normalize_folder_path("\"/home/me/PDFs\""), "/home/me/PDFs");
        assert_eq!(normalize_folder_path("'C:\\\\Users\\\\me'"), "C:\\Users\\me");
        assert_eq!(normalize_folder_path("  /data  "), "/data");
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("statement.pdf"), "statement.pdf");
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name("C:\\docs\\a.pdf"), "a.pdf");
        assert_eq!(safe_file_name(".."), "upload.pdf");
    }

    #[tokio::test]
    async fn test_extract_folder_errors() {
        let extractor = PdfExtractor::new(std::env::temp_dir());

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = extractor
            .extract_folder(missing.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::FolderNotFound(_)));

        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        let err = extractor.extract_folder(file.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::NotADirectory(_)));

        let err = extractor
            .extract_folder(dir.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NoPdfFiles));
    }

    #[tokio::test]
    async fn test_extract_folder_lists_pdfs_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.PDF"), b"junk").unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"junk").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x@y.com").unwrap();

        let extractor = PdfExtractor::new(dir.path().join("uploads"));
        let docs = extractor
            .extract_folder(&format!("\"{}\"", dir.path().display()))
            .await
            .unwrap();

        let names: Vec<_> = docs.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.PDF"]);
        // Unparseable PDFs are listed with no addresses
        assert!(docs.iter().all(|d| d.emails.is_empty()));
        assert_eq!(docs[0].file_path(), Some(dir.path().join("a.pdf").as_path()));
    }

    #[tokio::test]
    async fn test_extract_uploads_skips_non_pdfs_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = PdfExtractor::new(dir.path().join("uploads"));

        let err = extractor.extract_uploads(vec![]).await.unwrap_err();
        assert!(matches!(err, ExtractionError::NoFilesUploaded));

        let err = extractor
            .extract_uploads(vec![UploadedPdf {
                filename: "notes.txt".to_string(),
                bytes: Bytes::from_static(b"hello"),
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NoValidPdfs));

        let docs = extractor
            .extract_uploads(vec![
                UploadedPdf {
                    filename: "notes.txt".to_string(),
                    bytes: Bytes::from_static(b"hello"),
                },
                UploadedPdf {
                    filename: "march.pdf".to_string(),
                    bytes: Bytes::from_static(b"%PDF-1.4 stored"),
                },
            ])
            .await
            .unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].filename, "march.pdf");
        let stored = docs[0].file_path().unwrap();
        assert!(stored.starts_with(dir.path().join("uploads")));
        assert_eq!(std::fs::read(stored).unwrap(), b"%PDF-1.4 stored");
    }
}
