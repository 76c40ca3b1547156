use axum::extract::Multipart;
use std::collections::HashMap;

use super::error::ApiError;
use crate::extraction::provider::UploadedPdf;

/// A multipart form split into uploaded files and plain text fields.
#[derive(Debug, Default)]
pub struct FormData {
    files: Vec<(String, UploadedPdf)>,
    fields: HashMap<String, String>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let bytes = field.bytes().await?;
                    form.files.push((name, UploadedPdf { filename, bytes }));
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Every file uploaded under `field`, in upload order
    pub fn take_files(&mut self, field: &str) -> Vec<UploadedPdf> {
        let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(name, _)| name == field);
        self.files = rest;
        matching.into_iter().map(|(_, file)| file).collect()
    }

    /// Text field, `None` when missing or blank
    pub fn optional(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Text field that must be present; it may still be empty
    pub fn required(&self, name: &str) -> Result<String, ApiError> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::BadRequest(format!("Missing form field '{}'", name)))
    }
}
