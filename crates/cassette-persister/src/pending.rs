//! Pending request buffer

use cassette_core::RecordedRequest;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Requests for one recording that have not been persisted yet
///
/// A bucket is only ever created together with its first request, so a
/// bucket in the buffer is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBucket {
    pub name: String,
    pub requests: Vec<RecordedRequest>,
}

impl PendingBucket {
    fn with_request(request: RecordedRequest) -> Self {
        Self {
            name: request.recording_name.clone(),
            requests: vec![request],
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct PendingRequests {
    buckets: DashMap<String, PendingBucket>,
}

impl PendingRequests {
    /// Append a request to its recording's bucket, creating the bucket if needed
    pub(crate) fn push(&self, request: RecordedRequest) {
        match self.buckets.entry(request.recording_id.clone()) {
            Entry::Occupied(mut bucket) => bucket.get_mut().requests.push(request),
            Entry::Vacant(vacant) => {
                tracing::debug!(
                    recording_id = %request.recording_id,
                    recording_name = %request.recording_name,
                    "Created pending bucket"
                );
                vacant.insert(PendingBucket::with_request(request));
            }
        }
    }

    /// Copy of every bucket, sorted by recording ID
    pub(crate) fn snapshot(&self) -> Vec<(String, PendingBucket)> {
        let mut snapshot: Vec<_> = self
            .buckets
            .iter()
            .map(|b| (b.key().clone(), b.value().clone()))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }

    /// Remove the requests captured in `snapshot`
    ///
    /// Requests recorded after the snapshot was taken stay buffered; a bucket
    /// left without requests is removed.
    pub(crate) fn drain(&self, snapshot: &[(String, PendingBucket)]) {
        for (recording_id, flushed) in snapshot {
            if let Entry::Occupied(mut bucket) = self.buckets.entry(recording_id.clone()) {
                let count = flushed.requests.len().min(bucket.get().requests.len());
                bucket.get_mut().requests.drain(..count);
                if bucket.get().requests.is_empty() {
                    bucket.remove();
                }
            }
        }
    }

    pub(crate) fn get(&self, recording_id: &str) -> Option<PendingBucket> {
        self.buckets.get(recording_id).map(|b| b.value().clone())
    }

    pub(crate) fn len(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
