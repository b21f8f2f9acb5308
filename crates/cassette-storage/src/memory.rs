//! In-memory recording backend

use async_trait::async_trait;
use cassette_core::{RecordingBackend, RecordingDocument, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local recording store
///
/// Cloning shares the underlying map, so a test can keep a handle to inspect
/// what a persister wrote.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    recordings: Arc<RwLock<HashMap<String, RecordingDocument>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.recordings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.recordings.read().await.is_empty()
    }

    /// Stored recording IDs, sorted
    pub async fn recording_ids(&self) -> Vec<String> {
        let recordings = self.recordings.read().await;
        let mut ids: Vec<String> = recordings.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl RecordingBackend for InMemoryBackend {
    async fn find_recording(&self, recording_id: &str) -> Result<Option<RecordingDocument>> {
        let recordings = self.recordings.read().await;
        Ok(recordings.get(recording_id).cloned())
    }

    async fn save_recording(&self, recording_id: &str, data: &RecordingDocument) -> Result<()> {
        let mut recordings = self.recordings.write().await;
        recordings.insert(recording_id.to_string(), data.clone());
        Ok(())
    }

    async fn delete_recording(&self, recording_id: &str) -> Result<()> {
        let mut recordings = self.recordings.write().await;
        recordings.remove(recording_id);
        Ok(())
    }
}
