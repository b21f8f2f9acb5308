//! Recording backend trait
//!
//! The persister owns every piece of in-memory state (pending requests and
//! the read cache). A backend only moves [`RecordingDocument`]s to and from
//! durable storage.
//!
//! Implementations:
//! - `InMemoryBackend`: process-local map, mainly for tests
//! - `FilesystemBackend`: one HAR file per recording
//!
//! Every method has a default body that fails with
//! [`Error::NotImplemented`](crate::Error::NotImplemented), so a backend that
//! forgets a hook fails fast at the first call instead of silently dropping
//! data.

use crate::{Error, RecordingDocument, Result};
use async_trait::async_trait;

#[async_trait]
pub trait RecordingBackend: Send + Sync {
    /// Look up a stored recording
    ///
    /// # Returns
    /// `Ok(None)` when no recording exists for `recording_id`.
    async fn find_recording(&self, recording_id: &str) -> Result<Option<RecordingDocument>> {
        let _ = recording_id;
        Err(Error::NotImplemented("find_recording"))
    }

    /// Store a recording, replacing any previous version
    async fn save_recording(&self, recording_id: &str, data: &RecordingDocument) -> Result<()> {
        let _ = (recording_id, data);
        Err(Error::NotImplemented("save_recording"))
    }

    /// Remove a stored recording
    async fn delete_recording(&self, recording_id: &str) -> Result<()> {
        let _ = recording_id;
        Err(Error::NotImplemented("delete_recording"))
    }
}
