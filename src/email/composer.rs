use async_trait::async_trait;
use mail_builder::headers::raw::Raw;
use mail_builder::MessageBuilder;

use super::draft::{ComposeError, DraftArtifact, DraftRequest};
use crate::extraction::document::DocumentSource;

/// Turns a draft request into an internet message.
/// Implementations produce bytes only; delivery happens elsewhere.
#[async_trait]
pub trait DraftComposer: Send + Sync {
    async fn compose(&self, request: &DraftRequest) -> Result<DraftArtifact, ComposeError>;
}

/// Composes `multipart/mixed` drafts with an HTML body and the PDF attached.
#[derive(Debug, Default, Clone)]
pub struct MimeComposer;

impl MimeComposer {
    pub fn new() -> Self {
        Self
    }

    /// Build an RFC 822 message flagged as unsent so mail clients open it
    /// as an editable draft
    fn build_mime_message(
        &self,
        request: &DraftRequest,
        attachment: &[u8],
    ) -> Result<Vec<u8>, ComposeError> {
        let mut builder = MessageBuilder::new()
            .to(request.recipient_email.as_str())
            .subject(request.subject.as_str())
            .header("X-Unsent", Raw::new("1"))
            .html_body(request.body_html.as_str())
            .attachment(
                "application/pdf",
                request.attachment_name.as_str(),
                attachment,
            );

        match (request.sender_email.as_deref(), request.sender_name.as_deref()) {
            (Some(email), Some(name)) if !email.is_empty() && !name.is_empty() => {
                builder = builder.from((name, email));
            }
            (Some(email), _) if !email.is_empty() => {
                builder = builder.from(email);
            }
            _ => {}
        }

        builder
            .write_to_vec()
            .map_err(ComposeError::Serialization)
    }
}

#[async_trait]
impl DraftComposer for MimeComposer {
    async fn compose(&self, request: &DraftRequest) -> Result<DraftArtifact, ComposeError> {
        if request.recipient_email.trim().is_empty() {
            return Err(ComposeError::MissingRecipient);
        }

        let attachment = request.attachment.read().await.map_err(|e| {
            let path = request.attachment.describe();
            match (&request.attachment, e.kind()) {
                (DocumentSource::ByPath(_), std::io::ErrorKind::NotFound) => {
                    ComposeError::AttachmentNotFound(path)
                }
                _ => ComposeError::AttachmentUnreadable { path, source: e },
            }
        })?;

        let bytes = self.build_mime_message(request, &attachment)?;
        let filename = request.artifact_name();

        tracing::debug!(
            "Composed {} for {} ({} bytes)",
            filename,
            request.recipient_email,
            bytes.len()
        );

        Ok(DraftArtifact { filename, bytes })
    }
}
