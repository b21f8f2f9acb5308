//! Recording persister
//!
//! The persister sits between the interception layer and a
//! [`RecordingBackend`]. Completed requests are buffered per recording with
//! [`Persister::record_request`] and written out together by
//! [`Persister::persist`], typically once at the end of a test.
//!
//! # Flush semantics
//!
//! A flush is all-or-nothing at the level of the whole call:
//! - every pending request is checked against the failed-request policy
//!   before any backend I/O happens
//! - recordings are flushed concurrently; the first error aborts the call
//! - the pending buffer is only drained after every recording was saved, so
//!   a failed flush can be retried as is
//!
//! Overlapping `persist()` calls are serialized. Requests recorded while a
//! flush is running stay buffered for the next one.
//!
//! # Cache
//!
//! [`Persister::find`] memoizes hits from the backend. Misses are not cached.
//! [`Persister::save`] and [`Persister::delete`] always evict the recording,
//! whatever the backend returned. A lookup that overlaps such an eviction
//! returns what it read but does not cache it.

use crate::cache::RecordingCache;
use crate::pending::{PendingBucket, PendingRequests};
use cassette_core::{
    Entry, Error, HeaderRedactionHook, Log, PersistHook, PersisterConfig, RecordedRequest,
    RecordingBackend, RecordingDocument, Result,
};
use futures::future::try_join_all;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct Persister<B> {
    backend: B,
    config: PersisterConfig,
    hooks: Vec<Arc<dyn PersistHook>>,
    cache: RecordingCache,
    pending: PendingRequests,
    flush_lock: Mutex<()>,
}

impl<B: RecordingBackend> Persister<B> {
    /// Create a persister with the default configuration and no hooks
    pub fn new(backend: B) -> Self {
        Self::builder(backend).build()
    }

    pub fn with_config(backend: B, config: PersisterConfig) -> Self {
        Self::builder(backend).config(config).build()
    }

    pub fn builder(backend: B) -> PersisterBuilder<B> {
        PersisterBuilder::new(backend)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &PersisterConfig {
        &self.config
    }

    /// Buffer a completed request until the next [`persist`](Self::persist)
    ///
    /// # Errors
    /// - `Error::Precondition` if the request has not responded yet
    pub fn record_request(&self, request: RecordedRequest) -> Result<()> {
        if !request.did_respond() {
            return Err(Error::Precondition(format!(
                "cannot record [{}] {} for recording '{}' before it has responded",
                request.method, request.url, request.recording_id
            )));
        }

        self.pending.push(request);
        Ok(())
    }

    /// Flush every pending recording to the backend
    ///
    /// # Errors
    /// - `Error::Policy` if a pending request failed and
    ///   `record_failed_requests` is disabled (nothing is written)
    /// - any backend or hook error, unmodified
    ///
    /// On error the pending buffer is left untouched.
    pub async fn persist(&self) -> Result<()> {
        let _flush = self.flush_lock.lock().await;

        let snapshot = self.pending.snapshot();
        if snapshot.is_empty() {
            return Ok(());
        }

        for (_, bucket) in &snapshot {
            for request in &bucket.requests {
                self.ensure_persistable(request)?;
            }
        }

        let flushes = snapshot
            .iter()
            .map(|(recording_id, bucket)| self.flush_recording(recording_id, bucket));
        try_join_all(flushes).await?;

        self.pending.drain(&snapshot);

        let entries: usize = snapshot.iter().map(|(_, b)| b.requests.len()).sum();
        tracing::info!(
            recordings = snapshot.len(),
            entries = entries,
            "Persisted pending recordings"
        );
        Ok(())
    }

    fn ensure_persistable(&self, request: &RecordedRequest) -> Result<()> {
        if request.is_ok() || self.config.record_failed_requests {
            return Ok(());
        }

        let status = request.status().unwrap_or_default();
        tracing::warn!(
            recording_id = %request.recording_id,
            method = %request.method,
            url = %request.url,
            status = status,
            "Refusing to persist failed request"
        );
        Err(Error::Policy {
            method: request.method.clone(),
            url: request.url.clone(),
            status,
        })
    }

    async fn flush_recording(&self, recording_id: &str, bucket: &PendingBucket) -> Result<()> {
        let existing = self.find(recording_id).await?;
        let mut log = Log::layered(&self.config.creator, &bucket.name, existing.as_deref())?;

        // Entries of one recording are processed in order; a hook may depend
        // on state left by its run on the previous entry.
        let mut entries = Vec::with_capacity(bucket.requests.len());
        for request in &bucket.requests {
            let mut entry = Entry::from_request(request)?;
            for hook in &self.hooks {
                hook.before_persist(&mut entry).await?;
            }
            entries.push(entry);
        }

        log.add_entries(entries);

        tracing::debug!(
            recording_id = %recording_id,
            new_entries = bucket.requests.len(),
            total_entries = log.entries.len(),
            "Saving recording"
        );
        self.save(recording_id, &RecordingDocument { log }).await
    }

    /// Find a recording, serving repeated lookups from the cache
    pub async fn find(&self, recording_id: &str) -> Result<Option<Arc<RecordingDocument>>> {
        if let Some(recording) = self.cache.get(recording_id) {
            tracing::debug!(recording_id = %recording_id, "Recording cache hit");
            return Ok(Some(recording));
        }

        tracing::debug!(recording_id = %recording_id, "Recording cache miss");
        let generation = self.cache.generation(recording_id);
        let found = self.backend.find_recording(recording_id).await?;

        Ok(found.map(|recording| {
            let recording = Arc::new(recording);
            // A save or delete that ran during the lookup made this snapshot stale
            if !self
                .cache
                .insert_if_current(recording_id, generation, Arc::clone(&recording))
            {
                tracing::debug!(recording_id = %recording_id, "Skipped caching stale recording");
            }
            recording
        }))
    }

    /// Save a recording through the backend and evict it from the cache
    pub async fn save(&self, recording_id: &str, data: &RecordingDocument) -> Result<()> {
        let result = self.backend.save_recording(recording_id, data).await;
        self.cache.evict(recording_id);
        result
    }

    /// Delete a recording through the backend and evict it from the cache
    pub async fn delete(&self, recording_id: &str) -> Result<()> {
        let result = self.backend.delete_recording(recording_id).await;
        self.cache.evict(recording_id);
        result
    }

    /// Find the stored entry matching a request's `(id, order)` key
    pub async fn find_entry(&self, request: &RecordedRequest) -> Result<Option<Entry>> {
        let Some(recording) = self.find(&request.recording_id).await? else {
            return Ok(None);
        };

        Ok(recording.log.entry(&request.id, request.order).cloned())
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of recordings with buffered requests
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Copy of the pending bucket for a recording
    pub fn pending_bucket(&self, recording_id: &str) -> Option<PendingBucket> {
        self.pending.get(recording_id)
    }

    pub fn is_cached(&self, recording_id: &str) -> bool {
        self.cache.get(recording_id).is_some()
    }
}

/// Builder for [`Persister`]
pub struct PersisterBuilder<B> {
    backend: B,
    config: PersisterConfig,
    hooks: Vec<Arc<dyn PersistHook>>,
}

impl<B: RecordingBackend> PersisterBuilder<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: PersisterConfig::default(),
            hooks: Vec::new(),
        }
    }

    pub fn config(mut self, config: PersisterConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a hook; hooks run in registration order
    pub fn hook(mut self, hook: impl PersistHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn shared_hook(mut self, hook: Arc<dyn PersistHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Build the persister
    ///
    /// Header redaction from `config.redact_headers` runs before any
    /// registered hook.
    pub fn build(self) -> Persister<B> {
        let mut hooks = self.hooks;
        if !self.config.redact_headers.is_empty() {
            hooks.insert(
                0,
                Arc::new(HeaderRedactionHook::new(&self.config.redact_headers)),
            );
        }

        Persister {
            backend: self.backend,
            config: self.config,
            hooks,
            cache: RecordingCache::default(),
            pending: PendingRequests::default(),
            flush_lock: Mutex::new(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cassette_core::{Creator, FnHook, RecordedResponse};
    use mockall::mock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mock! {
        pub Backend {}

        #[async_trait]
        impl RecordingBackend for Backend {
            async fn find_recording(&self, recording_id: &str) -> Result<Option<RecordingDocument>>;
            async fn save_recording(&self, recording_id: &str, data: &RecordingDocument) -> Result<()>;
            async fn delete_recording(&self, recording_id: &str) -> Result<()>;
        }
    }

    fn create_request(recording_id: &str, id: &str, order: u32, status: u16) -> RecordedRequest {
        RecordedRequest::new(
            recording_id,
            format!("Recording {}", recording_id),
            "GET",
            format!("https://api.example.com/{}", id),
        )
        .with_id(id)
        .with_order(order)
        .respond(RecordedResponse::new(status), 5.0)
    }

    fn create_document(entries: &[(&str, u32)]) -> RecordingDocument {
        let mut log = Log::layered(&Creator::default(), "Stored", None).unwrap();
        log.add_entries(entries.iter().map(|(id, order)| {
            Entry::from_request(&create_request("r1", id, *order, 200)).unwrap()
        }));
        RecordingDocument { log }
    }

    #[test]
    fn test_record_unresponded_request_fails() {
        let persister = Persister::new(MockBackend::new());
        let request = RecordedRequest::new("r1", "Recording", "GET", "https://example.com");

        let err = persister.record_request(request).unwrap_err();

        assert!(matches!(err, Error::Precondition(_)));
        assert!(!persister.has_pending());
    }

    #[test]
    fn test_record_groups_requests_by_recording() {
        let persister = Persister::new(MockBackend::new());
        persister.record_request(create_request("r1", "a", 0, 200)).unwrap();
        persister.record_request(create_request("r1", "a", 1, 200)).unwrap();
        persister.record_request(create_request("r2", "b", 0, 200)).unwrap();

        assert_eq!(persister.pending_len(), 2);
        let bucket = persister.pending_bucket("r1").unwrap();
        assert_eq!(bucket.name, "Recording r1");
        let orders: Vec<_> = bucket.requests.iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_persist_without_pending_makes_no_backend_calls() {
        // Any call on a mock without expectations panics
        let persister = Persister::new(MockBackend::new());
        persister.persist().await.unwrap();
    }

    #[tokio::test]
    async fn test_persist_saves_and_clears_pending() {
        let mut backend = MockBackend::new();
        backend.expect_find_recording().times(1).returning(|_| Ok(None));
        backend
            .expect_save_recording()
            .times(1)
            .returning(|recording_id, data| {
                assert_eq!(recording_id, "r1");
                assert_eq!(data.log.recording_name, "Recording r1");
                assert_eq!(data.log.entries.len(), 2);
                Ok(())
            });

        let persister = Persister::new(backend);
        persister.record_request(create_request("r1", "a", 0, 200)).unwrap();
        persister.record_request(create_request("r1", "a", 1, 201)).unwrap();

        persister.persist().await.unwrap();

        assert!(!persister.has_pending());
        assert!(!persister.is_cached("r1"));
    }

    #[tokio::test]
    async fn test_failed_request_rejected_by_policy() {
        // No expectations: the policy check must run before any backend call
        let persister = Persister::new(MockBackend::new());
        persister.record_request(create_request("r1", "ok", 0, 200)).unwrap();
        persister.record_request(create_request("r1", "boom", 0, 500)).unwrap();

        let err = persister.persist().await.unwrap_err();

        match err {
            Error::Policy { method, url, status } => {
                assert_eq!(method, "GET");
                assert_eq!(url, "https://api.example.com/boom");
                assert_eq!(status, 500);
            }
            other => panic!("expected policy error, got {:?}", other),
        }
        assert_eq!(persister.pending_bucket("r1").unwrap().requests.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_request_allowed_when_configured() {
        let mut backend = MockBackend::new();
        backend.expect_find_recording().returning(|_| Ok(None));
        backend.expect_save_recording().times(1).returning(|_, data| {
            assert_eq!(data.log.entries[0].response.status, 500);
            Ok(())
        });

        let config = PersisterConfig::default().with_record_failed_requests(true);
        let persister = Persister::with_config(backend, config);
        persister.record_request(create_request("r1", "boom", 0, 500)).unwrap();

        persister.persist().await.unwrap();
        assert!(!persister.has_pending());
    }

    #[tokio::test]
    async fn test_backend_error_keeps_pending() {
        let mut backend = MockBackend::new();
        backend
            .expect_find_recording()
            .returning(|_| Err(Error::Backend("connection refused".into())));

        let persister = Persister::new(backend);
        persister.record_request(create_request("r1", "a", 0, 200)).unwrap();

        let err = persister.persist().await.unwrap_err();

        assert!(err.to_string().contains("connection refused"));
        assert_eq!(persister.pending_bucket("r1").unwrap().requests.len(), 1);
    }

    #[tokio::test]
    async fn test_persist_with_unimplemented_backend_fails_fast() {
        struct Unimplemented;

        #[async_trait]
        impl RecordingBackend for Unimplemented {}

        let persister = Persister::new(Unimplemented);
        persister.record_request(create_request("r1", "a", 0, 200)).unwrap();

        let err = persister.persist().await.unwrap_err();
        assert!(matches!(err, Error::NotImplemented("find_recording")));
        assert!(persister.has_pending());
    }

    #[tokio::test]
    async fn test_hooks_run_in_order_per_entry() {
        let mut backend = MockBackend::new();
        backend.expect_find_recording().returning(|_| Ok(None));
        backend.expect_save_recording().times(1).returning(|_, data| {
            let texts: Vec<_> = data
                .log
                .entries
                .iter()
                .map(|e| e.response.content.text.clone().unwrap_or_default())
                .collect();
            assert_eq!(texts, vec!["first:0:second", "first:1:second"]);
            Ok(())
        });

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let persister = Persister::builder(backend)
            .hook(FnHook::new(move |entry: &mut Entry| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                entry.response.content.text = Some(format!("first:{}", n));
                Ok(())
            }))
            .hook(FnHook::new(|entry: &mut Entry| {
                let text = entry.response.content.text.take().unwrap_or_default();
                entry.response.content.text = Some(format!("{}:second", text));
                Ok(())
            }))
            .build();

        persister.record_request(create_request("r1", "a", 0, 200)).unwrap();
        persister.record_request(create_request("r1", "a", 1, 200)).unwrap();
        persister.persist().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_hook_error_aborts_persist() {
        let mut backend = MockBackend::new();
        backend.expect_find_recording().returning(|_| Ok(None));

        let persister = Persister::builder(backend)
            .hook(FnHook::new(|_: &mut Entry| {
                Err(Error::Hook("cannot encrypt".into()))
            }))
            .build();
        persister.record_request(create_request("r1", "a", 0, 200)).unwrap();

        let err = persister.persist().await.unwrap_err();
        assert!(matches!(err, Error::Hook(_)));
        assert!(persister.has_pending());
    }

    #[tokio::test]
    async fn test_redact_headers_from_config() {
        let mut backend = MockBackend::new();
        backend.expect_find_recording().returning(|_| Ok(None));
        backend.expect_save_recording().times(1).returning(|_, data| {
            let headers = &data.log.entries[0].request.headers;
            assert_eq!(headers[0].value, cassette_core::hooks::REDACTED);
            Ok(())
        });

        let config = PersisterConfig::default().with_redact_headers(["authorization"]);
        let persister = Persister::with_config(backend, config);
        persister
            .record_request(
                create_request("r1", "a", 0, 200).with_header("Authorization", "Bearer token"),
            )
            .unwrap();

        persister.persist().await.unwrap();
    }

    #[tokio::test]
    async fn test_find_caches_hits() {
        let mut backend = MockBackend::new();
        backend
            .expect_find_recording()
            .times(1)
            .returning(|_| Ok(Some(create_document(&[("a", 0)]))));

        let persister = Persister::new(backend);

        let first = persister.find("r1").await.unwrap().unwrap();
        let second = persister.find("r1").await.unwrap().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(persister.is_cached("r1"));
    }

    #[tokio::test]
    async fn test_find_does_not_cache_misses() {
        let mut backend = MockBackend::new();
        backend.expect_find_recording().times(2).returning(|_| Ok(None));

        let persister = Persister::new(backend);

        assert!(persister.find("r1").await.unwrap().is_none());
        assert!(persister.find("r1").await.unwrap().is_none());
        assert!(!persister.is_cached("r1"));
    }

    #[tokio::test]
    async fn test_save_evicts_cache() {
        let mut backend = MockBackend::new();
        backend
            .expect_find_recording()
            .times(2)
            .returning(|_| Ok(Some(create_document(&[("a", 0)]))));
        backend.expect_save_recording().times(1).returning(|_, _| Ok(()));

        let persister = Persister::new(backend);

        persister.find("r1").await.unwrap();
        persister.save("r1", &create_document(&[])).await.unwrap();
        assert!(!persister.is_cached("r1"));
        persister.find("r1").await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_save_still_evicts_cache() {
        let mut backend = MockBackend::new();
        backend
            .expect_find_recording()
            .times(1)
            .returning(|_| Ok(Some(create_document(&[]))));
        backend
            .expect_save_recording()
            .times(1)
            .returning(|_, _| Err(Error::Backend("disk full".into())));

        let persister = Persister::new(backend);
        persister.find("r1").await.unwrap();

        let err = persister.save("r1", &create_document(&[])).await.unwrap_err();

        assert!(err.to_string().contains("disk full"));
        assert!(!persister.is_cached("r1"));
    }

    #[tokio::test]
    async fn test_delete_evicts_cache() {
        let mut backend = MockBackend::new();
        backend
            .expect_find_recording()
            .times(1)
            .returning(|_| Ok(Some(create_document(&[]))));
        backend.expect_delete_recording().times(1).returning(|_| Ok(()));

        let persister = Persister::new(backend);
        persister.find("r1").await.unwrap();
        assert!(persister.is_cached("r1"));

        persister.delete("r1").await.unwrap();
        assert!(!persister.is_cached("r1"));
    }

    /// Backend whose lookups pause after reading until `resume` is notified
    struct GatedBackend {
        stored: std::sync::Mutex<RecordingDocument>,
        resume: tokio::sync::Notify,
    }

    #[async_trait]
    impl RecordingBackend for GatedBackend {
        async fn find_recording(&self, _recording_id: &str) -> Result<Option<RecordingDocument>> {
            let snapshot = self.stored.lock().unwrap().clone();
            self.resume.notified().await;
            Ok(Some(snapshot))
        }

        async fn save_recording(&self, _recording_id: &str, data: &RecordingDocument) -> Result<()> {
            *self.stored.lock().unwrap() = data.clone();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_lookup_overlapping_save_is_not_cached() {
        let persister = Persister::new(GatedBackend {
            stored: std::sync::Mutex::new(create_document(&[("a", 0)])),
            resume: tokio::sync::Notify::new(),
        });

        let (stale, saved) = tokio::join!(persister.find("r1"), async {
            let result = persister.save("r1", &create_document(&[("b", 0)])).await;
            persister.backend().resume.notify_one();
            result
        });
        saved.unwrap();

        // The in-flight lookup still returns what it read...
        assert!(stale.unwrap().unwrap().log.entry("a", 0).is_some());
        // ...but must not leave it in the cache
        assert!(!persister.is_cached("r1"));

        persister.backend().resume.notify_one();
        let fresh = persister.find("r1").await.unwrap().unwrap();
        assert!(fresh.log.entry("b", 0).is_some());
        assert!(persister.is_cached("r1"));
    }

    #[tokio::test]
    async fn test_find_entry() {
        let mut backend = MockBackend::new();
        backend
            .expect_find_recording()
            .times(1)
            .returning(|_| Ok(Some(create_document(&[("a", 0)]))));

        let persister = Persister::new(backend);

        let hit = persister
            .find_entry(&create_request("r1", "a", 0, 200))
            .await
            .unwrap();
        assert_eq!(hit.map(|e| e.id), Some("a".to_string()));

        let wrong_order = persister
            .find_entry(&create_request("r1", "a", 1, 200))
            .await
            .unwrap();
        assert!(wrong_order.is_none());

        let wrong_id = persister
            .find_entry(&create_request("r1", "b", 0, 200))
            .await
            .unwrap();
        assert!(wrong_id.is_none());
    }

    #[tokio::test]
    async fn test_find_entry_without_recording() {
        let mut backend = MockBackend::new();
        backend.expect_find_recording().returning(|_| Ok(None));

        let persister = Persister::new(backend);
        let entry = persister
            .find_entry(&create_request("r1", "a", 0, 200))
            .await
            .unwrap();

        assert!(entry.is_none());
    }
}
