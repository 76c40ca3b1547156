use axum::{
    body::Body,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::{Component, Path as FsPath, PathBuf};

use crate::api::error::ApiError;
use crate::AppState;

pub const DOWNLOADS_PREFIX: &str = "/api/downloads";

/// Characters escaped inside one URL path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Download link for a file under the output directory, or `None` when
/// `path` lies outside it
pub fn download_url(output_dir: &FsPath, path: &FsPath) -> Option<String> {
    let relative = path.strip_prefix(output_dir).ok()?;
    let mut url = DOWNLOADS_PREFIX.to_string();
    for component in relative.components() {
        let Component::Normal(part) = component else {
            return None;
        };
        url.push('/');
        url.extend(utf8_percent_encode(part.to_str()?, SEGMENT));
    }
    Some(url)
}

/// `Content-Disposition` value with an ASCII fallback and an RFC 5987 name
pub fn attachment_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(filename, percent_encoding::NON_ALPHANUMERIC)
    )
}

pub fn content_type_for(path: &FsPath) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("eml") => "message/rfc822",
        Some("zip") => "application/zip",
        Some("txt") => "text/plain; charset=utf-8",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Resolve a requested relative path, refusing anything that would
/// escape the output directory
fn resolve(output_dir: &FsPath, requested: &str) -> Option<PathBuf> {
    let mut path = output_dir.to_path_buf();
    let mut depth = 0;
    for component in FsPath::new(requested).components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    (depth > 0).then_some(path)
}

/// GET /api/downloads/{path..}: fetch a generated draft, archive or report
pub async fn download(
    State(state): State<AppState>,
    Path(requested): Path<String>,
) -> Result<Response, ApiError> {
    let path = resolve(&state.config.storage.output_dir, &requested)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid download path '{}'", requested)))?;

    let data = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::NotFound(format!("File not found: {}", requested)))?;

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download");

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type_for(&path))
        .header("Content-Length", data.len().to_string())
        .header("Content-Disposition", attachment_disposition(filename))
        .body(Body::from(data))
        .map_err(|e| ApiError::InternalError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_url() {
        let out = FsPath::new("/srv/output");
        assert_eq!(
            download_url(out, FsPath::new("/srv/output/batch_1/draft_ACME Q3.eml")).as_deref(),
            Some("/api/downloads/batch_1/draft_ACME%20Q3.eml")
        );
        assert_eq!(download_url(out, FsPath::new("/etc/passwd")), None);
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let out = FsPath::new("/srv/output");
        assert_eq!(
            resolve(out, "batch_1/draft_a.eml"),
            Some(PathBuf::from("/srv/output/batch_1/draft_a.eml"))
        );
        assert_eq!(resolve(out, "../secret.txt"), None);
        assert_eq!(resolve(out, "/etc/passwd"), None);
        assert_eq!(resolve(out, ""), None);
    }

    #[test]
    fn test_attachment_disposition() {
        assert_eq!(
            attachment_disposition("draft_a.eml"),
            "attachment; filename=\"draft_a.eml\"; filename*=UTF-8''draft%5Fa%2Eeml"
        );
        assert!(attachment_disposition("draft_é.eml").starts_with("attachment; filename=\"draft__.eml\""));
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(FsPath::new("a.EML")), "message/rfc822");
        assert_eq!(content_type_for(FsPath::new("a.zip")), "application/zip");
        assert_eq!(content_type_for(FsPath::new("a")), "application/octet-stream");
    }
}
