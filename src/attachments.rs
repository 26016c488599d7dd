//! Staging of base64 attachments as temporary files.
//!
//! signal-cli only accepts attachments as file paths, so every payload is
//! decoded, sniffed for its file type and written to a uniquely named file.
//! The files belong to a [`StagedAttachments`] guard and are removed when it
//! is dropped.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, warn};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("invalid base64 attachment: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Unknown file type")]
    UnknownType,

    #[error("failed to write attachment: {0}")]
    Io(#[from] std::io::Error),
}

/// Temporary files handed to one signal-cli call.
#[derive(Debug, Default)]
pub struct StagedAttachments {
    paths: Vec<PathBuf>,
}

impl StagedAttachments {
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Drop for StagedAttachments {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(err) = std::fs::remove_file(path) {
                warn!("Failed to remove attachment {}: {}", path.display(), err);
            }
        }
    }
}

/// Decodes and writes every payload into `dir`, in order.
///
/// On the first failure the files written so far are removed and the error is
/// returned, so callers never see a partial set.
pub async fn stage(dir: &Path, payloads: &[String]) -> Result<StagedAttachments, AttachmentError> {
    let mut staged = StagedAttachments::default();

    for payload in payloads {
        let bytes = STANDARD.decode(payload)?;
        let kind = infer::get(&bytes).ok_or(AttachmentError::UnknownType)?;

        let path = dir.join(format!("{}.{}", Uuid::new_v4(), kind.extension()));
        let mut file = tokio::fs::File::create(&path).await?;
        // Tracked before writing so a failed write still gets cleaned up.
        staged.paths.push(path);

        file.write_all(&bytes).await?;
        file.sync_all().await?;
        debug!("Staged {} ({} bytes)", kind.mime_type(), bytes.len());
    }

    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Smallest PNG signature infer recognizes, plus some trailing data.
    const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];
    const PDF: &[u8] = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n";

    fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_stage_writes_decoded_bytes() {
        let dir = TempDir::new().unwrap();

        let staged = stage(dir.path(), &[encode(PNG), encode(PDF)]).await.unwrap();

        assert_eq!(staged.paths().len(), 2);
        let png = &staged.paths()[0];
        let pdf = &staged.paths()[1];
        assert_eq!(png.extension().unwrap(), "png");
        assert_eq!(pdf.extension().unwrap(), "pdf");
        assert!(png.starts_with(dir.path()));
        assert_eq!(std::fs::read(png).unwrap(), PNG);
        assert_eq!(std::fs::read(pdf).unwrap(), PDF);
    }

    #[tokio::test]
    async fn test_same_payload_gets_distinct_names() {
        let dir = TempDir::new().unwrap();

        let staged = stage(dir.path(), &[encode(PNG), encode(PNG)]).await.unwrap();

        assert_ne!(staged.paths()[0], staged.paths()[1]);
        assert_eq!(entries(dir.path()), 2);
    }

    #[tokio::test]
    async fn test_drop_removes_files() {
        let dir = TempDir::new().unwrap();

        let staged = stage(dir.path(), &[encode(PNG)]).await.unwrap();
        let path = staged.paths()[0].clone();
        assert!(path.exists());

        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_no_payloads() {
        let dir = TempDir::new().unwrap();
        let staged = stage(dir.path(), &[]).await.unwrap();
        assert!(staged.is_empty());
    }

    #[tokio::test]
    async fn test_bad_base64_removes_earlier_files() {
        let dir = TempDir::new().unwrap();

        let err = stage(dir.path(), &[encode(PNG), "not base64!!".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, AttachmentError::Decode(_)));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_unknown_type_removes_earlier_files() {
        let dir = TempDir::new().unwrap();

        let err = stage(dir.path(), &[encode(PDF), encode(b"just some text")])
            .await
            .unwrap_err();

        assert!(matches!(err, AttachmentError::UnknownType));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone");

        let err = stage(&missing, &[encode(PNG)]).await.unwrap_err();
        assert!(matches!(err, AttachmentError::Io(_)));
    }
}
