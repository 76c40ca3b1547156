use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::result::ZipError;
use zip::ZipWriter;

use crate::email::draft::DraftArtifact;

/// How generated drafts reach the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// One standalone file per draft, paced
    Individual,
    /// Every draft packed into a single zip
    Archive,
}

impl FromStr for DeliveryMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "individual" => Ok(DeliveryMode::Individual),
            "archive" | "zip" => Ok(DeliveryMode::Archive),
            other => anyhow::bail!("Unknown delivery mode '{}'", other),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write archive {path}: {source}")]
    Archive {
        path: String,
        #[source]
        source: ZipError,
    },
}

impl DeliveryError {
    /// A broken archive cannot hold any further drafts
    pub fn aborts_batch(&self) -> bool {
        matches!(self, DeliveryError::Archive { .. })
    }
}

/// Where a delivered draft ended up
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    /// Name of the file or archive entry actually written
    pub artifact_name: String,
    /// Standalone file on disk; `None` for archive entries
    pub stored_at: Option<PathBuf>,
}

#[async_trait]
pub trait DraftSink: Send {
    fn mode(&self) -> DeliveryMode;

    async fn deliver(&mut self, artifact: &DraftArtifact) -> Result<Delivered, DeliveryError>;
}

/// Writes each draft as its own file inside a per-batch directory.
pub struct DirectorySink {
    dir: PathBuf,
    names: HashSet<String>,
}

impl DirectorySink {
    pub async fn create(dir: PathBuf) -> Result<Self, DeliveryError> {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DeliveryError::Write {
                path: dir.display().to_string(),
                source: e,
            })?;
        Ok(Self {
            dir,
            names: HashSet::new(),
        })
    }
}

#[async_trait]
impl DraftSink for DirectorySink {
    fn mode(&self) -> DeliveryMode {
        DeliveryMode::Individual
    }

    async fn deliver(&mut self, artifact: &DraftArtifact) -> Result<Delivered, DeliveryError> {
        use tokio::io::AsyncWriteExt;

        let name = unique_name(&mut self.names, &artifact.filename);
        let path = self.dir.join(&name);

        // Never replace a draft already written for this batch
        let written = async {
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await?;
            file.write_all(&artifact.bytes).await?;
            file.flush().await
        };
        written.await.map_err(|e| DeliveryError::Write {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(Delivered {
            artifact_name: name,
            stored_at: Some(path),
        })
    }
}

/// A finished archive on disk
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub filename: String,
    pub entries: usize,
}

/// Packs drafts into one deflated zip. Zip writes run on the blocking pool.
pub struct ArchiveSink {
    path: PathBuf,
    filename: String,
    /// `None` only while an entry is being written
    writer: Option<ZipWriter<std::fs::File>>,
    names: HashSet<String>,
}

impl ArchiveSink {
    /// Open a new archive. Fails if `filename` already exists in `output_dir`.
    pub fn create(output_dir: &Path, filename: impl Into<String>) -> Result<Self, DeliveryError> {
        let filename = filename.into();
        let path = output_dir.join(&filename);

        std::fs::create_dir_all(output_dir).map_err(|e| DeliveryError::Write {
            path: output_dir.display().to_string(),
            source: e,
        })?;
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| DeliveryError::Write {
                path: path.display().to_string(),
                source: e,
            })?;

        Ok(Self {
            path,
            filename,
            writer: Some(ZipWriter::new(file)),
            names: HashSet::new(),
        })
    }

    fn archive_error(&self, source: ZipError) -> DeliveryError {
        DeliveryError::Archive {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn take_writer(&mut self) -> Result<ZipWriter<std::fs::File>, DeliveryError> {
        match self.writer.take() {
            Some(writer) => Ok(writer),
            None => Err(self.archive_error(ZipError::Io(std::io::Error::other(
                "archive writer lost after a failed write",
            )))),
        }
    }

    /// Write the central directory and close the archive
    pub async fn finish(mut self) -> Result<ArchiveFile, DeliveryError> {
        let writer = self.take_writer()?;
        let finished = tokio::task::spawn_blocking(move || writer.finish().map(|_| ()))
            .await
            .map_err(|e| ZipError::Io(std::io::Error::other(e)))
            .and_then(|r| r);
        if let Err(e) = finished {
            return Err(self.archive_error(e));
        }

        Ok(ArchiveFile {
            entries: self.names.len(),
            path: self.path,
            filename: self.filename,
        })
    }
}

/// Reserve a name not handed out yet: `draft_a.eml`, then `draft_a_2.eml`, ...
fn unique_name(names: &mut HashSet<String>, filename: &str) -> String {
    let mut candidate = filename.to_string();
    let mut n = 2;
    while names.contains(&candidate) {
        candidate = match filename.rsplit_once('.') {
            Some((stem, ext)) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", filename, n),
        };
        n += 1;
    }
    names.insert(candidate.clone());
    candidate
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated)
}

fn write_entry(
    writer: &mut ZipWriter<std::fs::File>,
    name: &str,
    bytes: &[u8],
) -> Result<(), ZipError> {
    writer.start_file(name, entry_options())?;
    writer.write_all(bytes)?;
    Ok(())
}

#[async_trait]
impl DraftSink for ArchiveSink {
    fn mode(&self) -> DeliveryMode {
        DeliveryMode::Archive
    }

    async fn deliver(&mut self, artifact: &DraftArtifact) -> Result<Delivered, DeliveryError> {
        let name = unique_name(&mut self.names, &artifact.filename);
        let mut writer = self.take_writer()?;
        let entry = name.clone();
        let bytes = artifact.bytes.clone();

        let (writer, written) = tokio::task::spawn_blocking(move || {
            let written = write_entry(&mut writer, &entry, &bytes);
            (writer, written)
        })
        .await
        .map_err(|e| self.archive_error(ZipError::Io(std::io::Error::other(e))))?;
        self.writer = Some(writer);
        written.map_err(|e| self.archive_error(e))?;

        Ok(Delivered {
            artifact_name: name,
            stored_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn artifact(name: &str, body: &str) -> DraftArtifact {
        DraftArtifact {
            filename: name.to_string(),
            bytes: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_delivery_mode_parse() {
        assert_eq!("individual".parse::<DeliveryMode>().unwrap(), DeliveryMode::Individual);
        assert_eq!(" Archive ".parse::<DeliveryMode>().unwrap(), DeliveryMode::Archive);
        assert_eq!("zip".parse::<DeliveryMode>().unwrap(), DeliveryMode::Archive);
        assert!("carrier-pigeon".parse::<DeliveryMode>().is_err());
    }

    #[tokio::test]
    async fn test_directory_sink_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::create(dir.path().join("batch-1")).await.unwrap();

        let delivered = sink.deliver(&artifact("draft_a.eml", "To: a@b.com")).await.unwrap();
        assert_eq!(delivered.artifact_name, "draft_a.eml");
        let stored = delivered.stored_at.unwrap();
        assert_eq!(stored, dir.path().join("batch-1").join("draft_a.eml"));
        assert_eq!(std::fs::read_to_string(stored).unwrap(), "To: a@b.com");
    }

    #[tokio::test]
    async fn test_directory_sink_keeps_colliding_drafts() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::create(dir.path().join("batch-1")).await.unwrap();

        // a.pdf and a.PDF both become draft_a.eml
        let first = sink.deliver(&artifact("draft_a.eml", "To: lower@acme.com")).await.unwrap();
        let second = sink.deliver(&artifact("draft_a.eml", "To: upper@acme.com")).await.unwrap();

        assert_eq!(first.artifact_name, "draft_a.eml");
        assert_eq!(second.artifact_name, "draft_a_2.eml");
        assert_ne!(first.stored_at, second.stored_at);
        assert_eq!(
            std::fs::read_to_string(first.stored_at.unwrap()).unwrap(),
            "To: lower@acme.com"
        );
        assert_eq!(
            std::fs::read_to_string(second.stored_at.unwrap()).unwrap(),
            "To: upper@acme.com"
        );
    }

    #[tokio::test]
    async fn test_archive_sink_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let first = ArchiveSink::create(dir.path(), "drafts.zip").unwrap();

        let err = ArchiveSink::create(dir.path(), "drafts.zip").err().unwrap();
        assert!(matches!(err, DeliveryError::Write { .. }));

        let archive = first.finish().await.unwrap();
        assert_eq!(archive.entries, 0);
    }

    #[test]
    fn test_unique_name_suffixes() {
        let mut names = HashSet::new();
        assert_eq!(unique_name(&mut names, "draft_a.eml"), "draft_a.eml");
        assert_eq!(unique_name(&mut names, "draft_a.eml"), "draft_a_2.eml");
        assert_eq!(unique_name(&mut names, "draft_a.eml"), "draft_a_3.eml");
        assert_eq!(unique_name(&mut names, "notes"), "notes");
        assert_eq!(unique_name(&mut names, "notes"), "notes_2");
    }

    #[tokio::test]
    async fn test_archive_sink_packs_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ArchiveSink::create(dir.path(), "drafts.zip").unwrap();

        sink.deliver(&artifact("draft_a.eml", "first")).await.unwrap();
        let dup = sink.deliver(&artifact("draft_a.eml", "second")).await.unwrap();
        assert_eq!(dup.artifact_name, "draft_a_2.eml");
        assert!(dup.stored_at.is_none());

        let archive = sink.finish().await.unwrap();
        assert_eq!(archive.entries, 2);
        assert_eq!(archive.filename, "drafts.zip");

        let mut zip = zip::ZipArchive::new(std::fs::File::open(&archive.path).unwrap()).unwrap();
        assert_eq!(zip.len(), 2);
        let mut content = String::new();
        zip.by_name("draft_a_2.eml")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "second");
    }
}
