//! Scratch storage: where uploads wait and outputs land.
//!
//! The root is injected (see [`crate::ConversionConfig::scratch_dir`]) so
//! every test and every process can own an isolated tree:
//!
//! ```text
//! <root>/
//!  ├─ uploads/   document-<millis>-<seq>.<ext>   (removed after conversion)
//!  └─ outputs/   document-<millis>-<seq>.<target ext>
//! ```

use crate::error::ConvertError;
use crate::format::DocumentFormat;
use crate::request::ConversionRequest;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

static UPLOAD_SEQ: AtomicU64 = AtomicU64::new(0);

/// An injected scratch root with `uploads/` and `outputs/` directories.
#[derive(Debug, Clone)]
pub struct ScratchStorage {
    root: PathBuf,
}

impl ScratchStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.root.join("outputs")
    }

    /// Create both directories if they don't exist yet.
    pub async fn ensure(&self) -> Result<(), ConvertError> {
        for dir in [self.uploads_dir(), self.outputs_dir()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| ConvertError::OutputWriteFailed {
                    path: dir.clone(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Collision-free upload path for a file in `format`.
    pub fn upload_path(&self, format: DocumentFormat) -> PathBuf {
        let millis = chrono::Utc::now().timestamp_millis();
        let seq = UPLOAD_SEQ.fetch_add(1, Ordering::Relaxed);
        self.uploads_dir()
            .join(format!("document-{millis}-{seq}.{}", format.extension()))
    }

    /// Store upload bytes under a fresh name and return the path.
    pub async fn stage_upload(
        &self,
        format: DocumentFormat,
        bytes: &[u8],
    ) -> Result<PathBuf, ConvertError> {
        self.ensure().await?;
        let path = self.upload_path(format);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ConvertError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        debug!("Staged upload: {}", path.display());
        Ok(path)
    }

    /// Output path for `input` converted to `target`: same stem, new extension.
    pub fn output_path_for(&self, input: &Path, target: DocumentFormat) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        self.outputs_dir()
            .join(format!("{stem}.{}", target.extension()))
    }

    /// Build a request for an already staged upload.
    pub fn request_for(
        &self,
        source_path: &Path,
        target: DocumentFormat,
    ) -> Result<ConversionRequest, ConvertError> {
        let source_format = DocumentFormat::from_path(source_path).ok_or_else(|| {
            ConvertError::UnsupportedFileType {
                extension: source_path
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            }
        })?;
        Ok(ConversionRequest::new(
            source_path,
            source_format,
            target,
            self.output_path_for(source_path, target),
        ))
    }

    /// Remove files older than `max_age` from `uploads/` and `outputs/`.
    ///
    /// Returns the number of files removed. Individual failures are logged
    /// and skipped.
    pub async fn cleanup_stale(&self, max_age: Duration) -> usize {
        let mut removed = 0;
        for dir in [self.uploads_dir(), self.outputs_dir()] {
            removed += cleanup_dir(&dir, max_age).await;
        }
        removed
    }
}

async fn cleanup_dir(dir: &Path, max_age: Duration) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Skipping cleanup of {}: {}", dir.display(), e);
            return 0;
        }
    };

    let now = SystemTime::now();
    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Error listing {}: {}", dir.display(), e);
                break;
            }
        };
        let path = entry.path();
        let modified = match entry.metadata().await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                warn!("Cannot stat {}: {}", path.display(), e);
                continue;
            }
        };
        let age = now.duration_since(modified).unwrap_or_default();
        if age > max_age {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!("Cleaned up old file: {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn upload_paths_are_unique() {
        let storage = ScratchStorage::new("/scratch");
        let a = storage.upload_path(DocumentFormat::Pdf);
        let b = storage.upload_path(DocumentFormat::Pdf);
        assert_ne!(a, b);
        assert!(a.starts_with("/scratch/uploads"));
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("pdf"));
    }

    #[test]
    fn output_path_keeps_stem() {
        let storage = ScratchStorage::new("/scratch");
        let out = storage.output_path_for(Path::new("/scratch/uploads/document-9-1.pdf"), DocumentFormat::Docx);
        assert_eq!(out, PathBuf::from("/scratch/outputs/document-9-1.docx"));
    }

    #[test]
    fn request_for_infers_source_format() {
        let storage = ScratchStorage::new("/scratch");
        let req = storage
            .request_for(Path::new("/scratch/uploads/a.html"), DocumentFormat::Pdf)
            .unwrap();
        assert_eq!(req.source_format, DocumentFormat::Html);
        assert_eq!(req.output_path, PathBuf::from("/scratch/outputs/a.pdf"));
        assert!(storage
            .request_for(Path::new("/scratch/uploads/a.odt"), DocumentFormat::Pdf)
            .is_err());
    }

    #[tokio::test]
    async fn stage_upload_writes_bytes() {
        let tmp = TempDir::new().unwrap();
        let storage = ScratchStorage::new(tmp.path());
        let path = storage.stage_upload(DocumentFormat::Txt, b"hello").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        assert!(storage.outputs_dir().is_dir());
    }

    #[tokio::test]
    async fn cleanup_stale_respects_age() {
        let tmp = TempDir::new().unwrap();
        let storage = ScratchStorage::new(tmp.path());
        storage.stage_upload(DocumentFormat::Txt, b"fresh").await.unwrap();

        assert_eq!(storage.cleanup_stale(Duration::from_secs(3600)).await, 0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(storage.cleanup_stale(Duration::ZERO).await, 1);
    }
}
