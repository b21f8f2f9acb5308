//! Filesystem recording backend
//!
//! Layout: `<base>/<recording_id>/recording.har`, pretty-printed JSON.
//! Recording IDs may contain `/` to group recordings into nested directories
//! (e.g. `users-suite/list_1f0c9e2a`).

use crate::atomic_writer::write_atomic;
use async_trait::async_trait;
use cassette_core::{Error, RecordingBackend, RecordingDocument, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File name of a recording inside its directory
pub const RECORDING_FILE: &str = "recording.har";

/// Stores each recording as a HAR file below a base directory
#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Validate a recording ID to prevent path traversal
    fn validate_recording_id(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::InvalidRecordingId(
                "Recording ID cannot be empty".into(),
            ));
        }

        if id.len() > 255 {
            return Err(Error::InvalidRecordingId(format!(
                "Recording ID too long: {} chars (max 255)",
                id.len()
            )));
        }

        if id.contains("..") || id.contains('\\') || id.starts_with('/') {
            return Err(Error::InvalidRecordingId(format!(
                "Invalid recording ID '{}': contains path traversal characters",
                id
            )));
        }

        // Each `/`-separated segment: alphanumeric, dash, underscore
        let valid = id.split('/').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        });
        if !valid {
            return Err(Error::InvalidRecordingId(format!(
                "Invalid recording ID '{}': only alphanumeric, dash, underscore and '/' separators allowed",
                id
            )));
        }

        Ok(())
    }

    /// Get the recording file path (with validation)
    fn recording_path(&self, recording_id: &str) -> Result<PathBuf> {
        Self::validate_recording_id(recording_id)?;
        Ok(self.base_path.join(recording_id).join(RECORDING_FILE))
    }

    /// List the IDs of all stored recordings, sorted
    pub async fn list_recordings(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut pending = vec![self.base_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                // file_type() does not follow symlinks
                let file_type = entry.file_type().await?;
                let path = entry.path();

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() && entry.file_name() == RECORDING_FILE {
                    let Some(relative) = dir.strip_prefix(&self.base_path).ok() else {
                        continue;
                    };
                    let id = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/");

                    if Self::validate_recording_id(&id).is_ok() {
                        ids.push(id);
                    } else {
                        tracing::warn!(path = %path.display(), "Skipping recording with invalid ID");
                    }
                }
            }
        }

        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl RecordingBackend for FilesystemBackend {
    async fn find_recording(&self, recording_id: &str) -> Result<Option<RecordingDocument>> {
        let path = self.recording_path(recording_id)?;

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let document = serde_json::from_slice(&data)?;
        tracing::debug!(recording_id = %recording_id, path = %path.display(), "Loaded recording");
        Ok(Some(document))
    }

    async fn save_recording(&self, recording_id: &str, data: &RecordingDocument) -> Result<()> {
        let path = self.recording_path(recording_id)?;
        let json = serde_json::to_vec_pretty(data)?;

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&target, &json))
            .await
            .map_err(|e| Error::Backend(format!("recording writer task failed: {}", e)))??;

        tracing::debug!(
            recording_id = %recording_id,
            path = %path.display(),
            entries = data.log.entries.len(),
            "Saved recording"
        );
        Ok(())
    }

    async fn delete_recording(&self, recording_id: &str) -> Result<()> {
        let path = self.recording_path(recording_id)?;

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        // Nested recordings may still live below this directory
        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir(dir).await;
        }

        tracing::info!(recording_id = %recording_id, "Deleted recording");
        Ok(())
    }
}
