//! Read cache of recordings found through the backend
//!
//! Each id carries a generation that every eviction bumps. A lookup reads the
//! generation before going to the backend and only caches its result if no
//! save or delete evicted the id in the meantime.

use cassette_core::RecordingDocument;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    recording: Option<Arc<RecordingDocument>>,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingCache {
    slots: DashMap<String, Slot>,
}

impl RecordingCache {
    pub(crate) fn get(&self, recording_id: &str) -> Option<Arc<RecordingDocument>> {
        self.slots
            .get(recording_id)
            .and_then(|slot| slot.recording.clone())
    }

    pub(crate) fn generation(&self, recording_id: &str) -> u64 {
        self.slots
            .get(recording_id)
            .map_or(0, |slot| slot.generation)
    }

    /// Cache `recording` unless the id was evicted since `generation` was read
    pub(crate) fn insert_if_current(
        &self,
        recording_id: &str,
        generation: u64,
        recording: Arc<RecordingDocument>,
    ) -> bool {
        let mut slot = self.slots.entry(recording_id.to_string()).or_default();
        if slot.generation != generation {
            return false;
        }
        slot.recording = Some(recording);
        true
    }

    pub(crate) fn evict(&self, recording_id: &str) -> bool {
        let mut slot = self.slots.entry(recording_id.to_string()).or_default();
        slot.generation += 1;
        slot.recording.take().is_some()
    }
}
