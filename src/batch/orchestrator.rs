use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use super::sink::{DeliveryError, DeliveryMode, DraftSink};
use crate::email::composer::DraftComposer;
use crate::email::draft::{CommonFields, DraftRequest};
use crate::extraction::document::ExtractedDocument;

pub const NO_EMAIL_REASON: &str = "no email address found";
pub const UNKNOWN_ERROR_REASON: &str = "unknown error";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftSuccess {
    pub filename: String,
    pub recipient_email: String,
    pub artifact_name: String,
    #[serde(skip)]
    pub stored_at: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftFailure {
    pub filename: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub successful: usize,
    pub failed: usize,
}

/// Outcomes of one batch run, each list in selection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    pub successes: Vec<DraftSuccess>,
    pub failures: Vec<DraftFailure>,
}

impl BatchResult {
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            successful: self.successes.len(),
            failed: self.failures.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    fn fail(&mut self, filename: &str, reason: String) {
        let reason = if reason.trim().is_empty() {
            UNKNOWN_ERROR_REASON.to_string()
        } else {
            reason
        };
        self.failures.push(DraftFailure {
            filename: filename.to_string(),
            reason,
        });
    }
}

/// Drives the composer over a selection, one document at a time.
pub struct BatchOrchestrator<'a> {
    composer: &'a dyn DraftComposer,
    pacing: Duration,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(composer: &'a dyn DraftComposer, pacing: Duration) -> Self {
        Self { composer, pacing }
    }

    /// Compose and deliver a draft for every selected document.
    ///
    /// Each document yields exactly one outcome. Documents without an
    /// address are recorded as failures without invoking the composer, and
    /// a failed document never stops the run. Drafts delivered before a
    /// failure stay delivered.
    ///
    /// Returns an error only when the sink cannot take any more drafts
    /// (a broken archive); the whole batch is then abandoned.
    pub async fn run_batch(
        &self,
        selected: &[ExtractedDocument],
        common: &CommonFields,
        sink: &mut dyn DraftSink,
    ) -> Result<BatchResult, DeliveryError> {
        let mut result = BatchResult::default();
        let paced = sink.mode() == DeliveryMode::Individual && !self.pacing.is_zero();

        tracing::info!(
            "Generating drafts for {} document(s) ({:?} delivery)",
            selected.len(),
            sink.mode()
        );

        for (idx, document) in selected.iter().enumerate() {
            let Some(recipient) = document.recipient() else {
                tracing::warn!("No email found in {}", document.filename);
                result.fail(&document.filename, NO_EMAIL_REASON.to_string());
                continue;
            };

            let request = DraftRequest::for_document(document, recipient, common);

            let artifact = match self.composer.compose(&request).await {
                Ok(artifact) => artifact,
                Err(e) => {
                    tracing::warn!("Error generating draft for {}: {}", document.filename, e);
                    result.fail(&document.filename, e.to_string());
                    continue;
                }
            };

            match sink.deliver(&artifact).await {
                Ok(delivered) => {
                    tracing::info!(
                        "Draft {} generated for {} -> {}",
                        delivered.artifact_name,
                        document.filename,
                        recipient
                    );
                    result.successes.push(DraftSuccess {
                        filename: document.filename.clone(),
                        recipient_email: recipient.to_string(),
                        artifact_name: delivered.artifact_name,
                        stored_at: delivered.stored_at,
                    });
                }
                Err(e) if e.aborts_batch() => {
                    tracing::error!("Aborting batch at {}: {}", document.filename, e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("Error delivering draft for {}: {}", document.filename, e);
                    result.fail(&document.filename, e.to_string());
                    continue;
                }
            }

            // Space out consecutive downloads so none get dropped
            if paced && idx + 1 < selected.len() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        let summary = result.summary();
        tracing::info!(
            "Batch complete: {} successful, {} failed",
            summary.successful,
            summary.failed
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::sink::{ArchiveSink, Delivered, DeliveryMode, DirectorySink};
    use crate::email::composer::MimeComposer;
    use crate::email::draft::{ComposeError, DraftArtifact};
    use crate::extraction::document::DocumentSource;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every request and fails for attachments named `bad*`
    #[derive(Default)]
    struct RecordingComposer {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DraftComposer for RecordingComposer {
        async fn compose(&self, request: &DraftRequest) -> Result<DraftArtifact, ComposeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.attachment_name.clone());
            if request.attachment_name.starts_with("bad") {
                return Err(ComposeError::AttachmentNotFound(request.attachment_name.clone()));
            }
            Ok(DraftArtifact {
                filename: request.artifact_name(),
                bytes: format!("To: {}", request.recipient_email).into_bytes(),
            })
        }
    }

    /// Individual-mode sink that keeps artifacts in memory
    #[derive(Default)]
    struct MemorySink {
        delivered: Vec<DraftArtifact>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl DraftSink for MemorySink {
        fn mode(&self) -> DeliveryMode {
            DeliveryMode::Individual
        }

        async fn deliver(&mut self, artifact: &DraftArtifact) -> Result<Delivered, DeliveryError> {
            if self.fail_on.as_deref() == Some(artifact.filename.as_str()) {
                return Err(DeliveryError::Write {
                    path: artifact.filename.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "download blocked"),
                });
            }
            self.delivered.push(artifact.clone());
            Ok(Delivered {
                artifact_name: artifact.filename.clone(),
                stored_at: None,
            })
        }
    }

    /// Archive sink whose zip breaks on the second entry
    #[derive(Default)]
    struct BrokenArchiveSink {
        written: usize,
    }

    #[async_trait]
    impl DraftSink for BrokenArchiveSink {
        fn mode(&self) -> DeliveryMode {
            DeliveryMode::Archive
        }

        async fn deliver(&mut self, artifact: &DraftArtifact) -> Result<Delivered, DeliveryError> {
            if self.written == 1 {
                return Err(DeliveryError::Archive {
                    path: "drafts.zip".to_string(),
                    source: zip::result::ZipError::Io(std::io::Error::other("disk full")),
                });
            }
            self.written += 1;
            Ok(Delivered {
                artifact_name: artifact.filename.clone(),
                stored_at: None,
            })
        }
    }

    fn doc(name: &str, emails: &[&str]) -> ExtractedDocument {
        ExtractedDocument::new(
            name,
            DocumentSource::ByBlob {
                name: name.to_string(),
                bytes: Bytes::from_static(b"%PDF-1.4 test"),
            },
            emails.iter().map(|e| e.to_string()).collect(),
        )
    }

    fn common() -> CommonFields {
        CommonFields {
            subject: "Statement".to_string(),
            body_html: "<p>Attached</p>".to_string(),
            sender: None,
        }
    }

    #[tokio::test]
    async fn test_every_document_yields_one_outcome_in_order() {
        let composer = RecordingComposer::default();
        let orchestrator = BatchOrchestrator::new(&composer, Duration::ZERO);
        let selected = vec![
            doc("c.pdf", &["c@x.com"]),
            doc("empty.pdf", &[]),
            doc("bad.pdf", &["bad@x.com"]),
            doc("a.pdf", &["a1@x.com", "a2@x.com"]),
        ];

        let mut sink = MemorySink::default();
        let result = orchestrator
            .run_batch(&selected, &common(), &mut sink)
            .await
            .unwrap();

        assert_eq!(result.total(), selected.len());
        let ok: Vec<_> = result.successes.iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(ok, vec!["c.pdf", "a.pdf"]);
        assert_eq!(result.successes[1].recipient_email, "a1@x.com");
        assert_eq!(result.successes[1].artifact_name, "draft_a.eml");

        let failed: Vec<_> = result
            .failures
            .iter()
            .map(|f| (f.filename.as_str(), f.reason.as_str()))
            .collect();
        assert_eq!(
            failed,
            vec![
                ("empty.pdf", NO_EMAIL_REASON),
                ("bad.pdf", "PDF file not found: bad.pdf"),
            ]
        );
        assert_eq!(sink.delivered.len(), 2);
    }

    #[tokio::test]
    async fn test_composer_never_invoked_without_email() {
        let composer = RecordingComposer::default();
        let orchestrator = BatchOrchestrator::new(&composer, Duration::ZERO);
        let selected = vec![doc("none1.pdf", &[]), doc("none2.pdf", &[])];

        let result = orchestrator
            .run_batch(&selected, &common(), &mut MemorySink::default())
            .await
            .unwrap();

        assert_eq!(composer.calls.load(Ordering::SeqCst), 0);
        assert!(result.successes.is_empty());
        assert!(result.failures.iter().all(|f| f.reason == NO_EMAIL_REASON));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_recorded_and_run_continues() {
        let composer = RecordingComposer::default();
        let orchestrator = BatchOrchestrator::new(&composer, Duration::ZERO);
        let selected = vec![doc("a.pdf", &["a@x.com"]), doc("b.pdf", &["b@x.com"])];
        let mut sink = MemorySink {
            fail_on: Some("draft_a.eml".to_string()),
            ..Default::default()
        };

        let result = orchestrator
            .run_batch(&selected, &common(), &mut sink)
            .await
            .unwrap();

        assert_eq!(result.summary(), BatchSummary { successful: 1, failed: 1 });
        assert!(result.failures[0].reason.contains("download blocked"));
        assert_eq!(*composer.seen.lock().unwrap(), vec!["a.pdf", "b.pdf"]);
    }

    #[tokio::test]
    async fn test_rerun_classifies_identically() {
        let composer = RecordingComposer::default();
        let orchestrator = BatchOrchestrator::new(&composer, Duration::ZERO);
        let selected = vec![
            doc("a.pdf", &["a@x.com"]),
            doc("empty.pdf", &[]),
            doc("bad.pdf", &["b@x.com"]),
        ];

        let first = orchestrator
            .run_batch(&selected, &common(), &mut MemorySink::default())
            .await
            .unwrap();
        let second = orchestrator
            .run_batch(&selected, &common(), &mut MemorySink::default())
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_broken_archive_aborts_batch() {
        let composer = RecordingComposer::default();
        let orchestrator = BatchOrchestrator::new(&composer, Duration::ZERO);
        let selected = vec![
            doc("a.pdf", &["a@x.com"]),
            doc("b.pdf", &["b@x.com"]),
            doc("c.pdf", &["c@x.com"]),
        ];

        let err = orchestrator
            .run_batch(&selected, &common(), &mut BrokenArchiveSink::default())
            .await
            .unwrap_err();

        assert!(err.aborts_batch());
        assert_eq!(composer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*composer.seen.lock().unwrap(), vec!["a.pdf", "b.pdf"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_individual_delivery_is_paced() {
        let composer = RecordingComposer::default();
        let orchestrator = BatchOrchestrator::new(&composer, Duration::from_millis(500));
        let selected = vec![
            doc("a.pdf", &["a@x.com"]),
            doc("b.pdf", &["b@x.com"]),
            doc("c.pdf", &["c@x.com"]),
        ];

        let started = tokio::time::Instant::now();
        orchestrator
            .run_batch(&selected, &common(), &mut MemorySink::default())
            .await
            .unwrap();

        // Two gaps between three deliveries, none after the last
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_archive_mode_three_valid_one_without_email() {
        let dir = tempfile::tempdir().unwrap();
        let composer = MimeComposer::new();
        // Pacing is ignored for archives
        let orchestrator = BatchOrchestrator::new(&composer, Duration::from_secs(3600));
        let selected = vec![
            doc("one.pdf", &["one@x.com"]),
            doc("two.pdf", &["two@x.com"]),
            doc("none.pdf", &[]),
            doc("three.pdf", &["three@x.com"]),
        ];

        let mut sink = ArchiveSink::create(dir.path(), "drafts.zip").unwrap();
        let result = orchestrator
            .run_batch(&selected, &common(), &mut sink)
            .await
            .unwrap();
        let archive = sink.finish().await.unwrap();

        assert_eq!(result.summary(), BatchSummary { successful: 3, failed: 1 });
        assert_eq!(archive.entries, 3);

        let zip = zip::ZipArchive::new(std::fs::File::open(&archive.path).unwrap()).unwrap();
        let mut names: Vec<_> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["draft_one.eml", "draft_three.eml", "draft_two.eml"]);
    }

    #[tokio::test]
    async fn test_directory_sink_records_stored_path() {
        let dir = tempfile::tempdir().unwrap();
        let composer = MimeComposer::new();
        let orchestrator = BatchOrchestrator::new(&composer, Duration::ZERO);
        let mut sink = DirectorySink::create(dir.path().join("b1")).await.unwrap();

        let result = orchestrator
            .run_batch(&[doc("inv.pdf", &["a@b.com"])], &common(), &mut sink)
            .await
            .unwrap();

        let stored = result.successes[0].stored_at.clone().unwrap();
        assert_eq!(stored, dir.path().join("b1").join("draft_inv.eml"));
        assert!(stored.exists());
    }
}
