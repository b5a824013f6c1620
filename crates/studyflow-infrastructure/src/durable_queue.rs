//! Durable local queue for outbound write commands.
//!
//! Failed submissions land here and are retried by a periodic drain pass.
//! The whole queue is persisted as one JSON array blob; every mutation
//! rewrites the blob atomically. Queuing is a best-effort enhancement: when
//! the blob store itself fails, enqueue degrades to fire-and-forget instead
//! of surfacing an error.

use crate::blob_store::BlobStore;
use crate::remote::RemoteEndpoint;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use studyflow_core::error::Result;
use studyflow_core::queue::{QueueConfig, QueuedCommand};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Blob-store key holding the serialized queue.
pub const QUEUE_KEY: &str = "studyflow_pending_commands";

/// Outcome of processing one entry during a drain pass.
enum PassOutcome {
    /// Delivered or permanently rejected; remove the entry.
    Remove,
    /// Transport failure; replace the entry with its backoff update.
    Retry(QueuedCommand),
}

/// Persistent retry queue with dedupe, age and capacity bounds.
pub struct DurableQueue {
    store: Arc<dyn BlobStore>,
    config: QueueConfig,
    /// Makes `drain` single-flight: an overlapping call is a no-op.
    drain_lock: Mutex<()>,
    /// Serializes load-modify-persist sections so an enqueue landing while
    /// a drain pass is awaiting a remote call cannot be overwritten.
    state_lock: Mutex<()>,
}

impl DurableQueue {
    pub fn new(store: Arc<dyn BlobStore>, config: QueueConfig) -> Self {
        Self {
            store,
            config,
            drain_lock: Mutex::new(()),
            state_lock: Mutex::new(()),
        }
    }

    /// Records a write intent for background retry.
    ///
    /// If `dedupe_key` matches an existing entry, the new intent replaces
    /// that entry's operation and body while resetting its attempt count and
    /// retry eligibility; the original creation time is kept so age-based
    /// eviction still applies to the oldest intent.
    ///
    /// Never returns an error: serialization failures drop the enqueue and
    /// storage failures degrade to fire-and-forget, both debug-logged.
    pub async fn enqueue<B: Serialize>(
        &self,
        operation: &str,
        body: &B,
        dedupe_key: Option<String>,
    ) {
        let body = match serde_json::to_value(body) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("dropping unserializable queue entry for {operation}: {e}");
                return;
            }
        };

        let _state = self.state_lock.lock().await;
        let mut entries = match self.load().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("queue storage unavailable, firing and forgetting: {e}");
                return;
            }
        };

        let now = Utc::now();
        match dedupe_key
            .as_deref()
            .and_then(|key| entries.iter_mut().find(|e| e.dedupe_key.as_deref() == Some(key)))
        {
            Some(existing) => {
                existing.operation = operation.to_string();
                existing.body = body;
                existing.attempts = 0;
                existing.next_retry_at = now;
            }
            None => entries.push(QueuedCommand::new(operation, body, dedupe_key)),
        }

        // Age first, then capacity: stale entries should not crowd out live ones.
        entries.retain(|e| e.age(now) <= self.config.max_age);
        if entries.len() > self.config.max_entries {
            entries.sort_by_key(|e| e.created_at);
            let excess = entries.len() - self.config.max_entries;
            entries.drain(..excess);
        }

        if let Err(e) = self.persist(&entries).await {
            tracing::debug!("failed to persist queue, entry may be lost: {e}");
        }
    }

    /// Retries every eligible entry once.
    ///
    /// Single-flight: if another drain is in progress this returns `Ok(0)`
    /// immediately. Entries are processed sequentially; per entry,
    /// success removes it, a transport failure bumps its attempt count and
    /// linear-capped backoff, and any permanent failure (validation,
    /// not-found, illegal transition) drops it since retrying cannot
    /// succeed. Over-age entries are dropped without a remote call.
    ///
    /// The pass works from a snapshot, so the final rewrite merges its
    /// outcomes into a freshly loaded state by entry id: intents enqueued
    /// while a remote call was in flight survive, and an entry the snapshot
    /// saw that was replaced mid-pass (dedupe) keeps its newer form.
    ///
    /// # Returns
    ///
    /// The number of entries delivered in this pass.
    pub async fn drain(&self, endpoint: &dyn RemoteEndpoint) -> Result<usize> {
        let Ok(_guard) = self.drain_lock.try_lock() else {
            return Ok(0);
        };

        let snapshot = match self.load().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("queue storage unavailable, skipping drain: {e}");
                return Ok(0);
            }
        };
        if snapshot.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut outcomes: HashMap<Uuid, (QueuedCommand, PassOutcome)> = HashMap::new();
        let mut sent = 0usize;

        for entry in snapshot {
            if entry.age(now) > self.config.max_age {
                tracing::debug!("dropping over-age queue entry {}", entry.id);
                outcomes.insert(entry.id, (entry, PassOutcome::Remove));
                continue;
            }
            if entry.next_retry_at > now {
                continue;
            }
            match endpoint.call(&entry.operation, &entry.body).await {
                Ok(_) => {
                    sent += 1;
                    outcomes.insert(entry.id, (entry, PassOutcome::Remove));
                }
                Err(e) if e.is_transport() => {
                    let mut updated = entry.clone();
                    updated.attempts += 1;
                    updated.next_retry_at =
                        Utc::now() + self.config.backoff_for(updated.attempts);
                    outcomes.insert(entry.id, (entry, PassOutcome::Retry(updated)));
                }
                Err(e) => {
                    // Permanent rejection; a retry cannot change the outcome.
                    tracing::warn!(
                        "dropping queue entry {} for {}: {e}",
                        entry.id,
                        entry.operation
                    );
                    outcomes.insert(entry.id, (entry, PassOutcome::Remove));
                }
            }
        }

        let _state = self.state_lock.lock().await;
        let fresh = match self.load().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("queue storage unavailable after drain: {e}");
                return Ok(sent);
            }
        };
        let mut merged = Vec::with_capacity(fresh.len());
        for entry in fresh {
            match outcomes.get(&entry.id) {
                // Only apply a pass outcome to the entry the pass actually
                // saw; a mid-pass dedupe replacement is the newer intent.
                Some((seen, outcome)) if *seen == entry => match outcome {
                    PassOutcome::Remove => {}
                    PassOutcome::Retry(updated) => merged.push(updated.clone()),
                },
                _ => merged.push(entry),
            }
        }

        if let Err(e) = self.persist(&merged).await {
            tracing::debug!("failed to persist queue after drain: {e}");
        }
        if sent > 0 {
            tracing::info!("drained {sent} queued command(s)");
        }
        Ok(sent)
    }

    /// Current queue contents, oldest first by creation time.
    pub async fn pending(&self) -> Result<Vec<QueuedCommand>> {
        self.load().await
    }

    async fn load(&self) -> Result<Vec<QueuedCommand>> {
        match self.store.get(QUEUE_KEY).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => Ok(entries),
                Err(e) => {
                    // A corrupt blob is unrecoverable; start over rather
                    // than wedging every future enqueue.
                    tracing::warn!("discarding corrupt queue blob: {e}");
                    Ok(Vec::new())
                }
            },
            None => Ok(Vec::new()),
        }
    }

    async fn persist(&self, entries: &[QueuedCommand]) -> Result<()> {
        let raw = serde_json::to_string(entries)?;
        self.store.put(QUEUE_KEY, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::{InMemoryBlobStore, UnavailableBlobStore};
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use studyflow_core::error::StudyError;

    /// Endpoint that fails (or succeeds) every call and counts them.
    struct ScriptedEndpoint {
        calls: AtomicUsize,
        fail_with: Option<fn() -> StudyError>,
    }

    impl ScriptedEndpoint {
        fn succeeding() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_with: None,
            }
        }

        fn failing(fail_with: fn() -> StudyError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_with: Some(fail_with),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteEndpoint for ScriptedEndpoint {
        async fn call(&self, _operation: &str, _body: &Value) -> studyflow_core::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(make) => Err(make()),
                None => Ok(json!({"success": true})),
            }
        }
    }

    /// Endpoint that holds each call open before succeeding.
    struct SlowEndpoint {
        delay: std::time::Duration,
    }

    #[async_trait]
    impl RemoteEndpoint for SlowEndpoint {
        async fn call(&self, _operation: &str, _body: &Value) -> studyflow_core::Result<Value> {
            tokio::time::sleep(self.delay).await;
            Ok(json!({"success": true}))
        }
    }

    fn queue() -> (DurableQueue, Arc<InMemoryBlobStore>) {
        let store = Arc::new(InMemoryBlobStore::new());
        let q = DurableQueue::new(store.clone(), QueueConfig::default());
        (q, store)
    }

    /// Plants raw entries in the blob store, bypassing enqueue bookkeeping.
    async fn plant(store: &InMemoryBlobStore, entries: &[QueuedCommand]) {
        store
            .put(QUEUE_KEY, &serde_json::to_string(entries).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn enqueue_then_drain_delivers_and_empties() {
        let (queue, _) = queue();
        queue
            .enqueue("saveResponses", &json!({"sessionId": "s1"}), None)
            .await;
        assert_eq!(queue.pending().await.unwrap().len(), 1);

        let endpoint = ScriptedEndpoint::succeeding();
        assert_eq!(queue.drain(&endpoint).await.unwrap(), 1);
        assert_eq!(endpoint.calls(), 1);
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn enqueue_during_drain_pass_survives_the_rewrite() {
        let store = Arc::new(InMemoryBlobStore::new());
        let queue = Arc::new(DurableQueue::new(store.clone(), QueueConfig::default()));
        queue
            .enqueue("completeSession", &json!({"sessionId": "s1"}), None)
            .await;

        let endpoint = Arc::new(SlowEndpoint {
            delay: std::time::Duration::from_millis(100),
        });
        let pass = tokio::spawn({
            let queue = queue.clone();
            let endpoint = endpoint.clone();
            async move { queue.drain(endpoint.as_ref()).await.unwrap() }
        });

        // Land a new intent while the pass is blocked on the remote call.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        queue
            .enqueue("saveResponses", &json!({"sessionId": "s1"}), None)
            .await;
        assert_eq!(queue.pending().await.unwrap().len(), 2);

        assert_eq!(pass.await.unwrap(), 1);
        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation, "saveResponses");
    }

    #[tokio::test]
    async fn dedupe_key_keeps_only_latest_intent() {
        let (queue, _) = queue();
        queue
            .enqueue("updateMode", &json!({"mode": "text"}), Some("mode:s1".into()))
            .await;
        queue
            .enqueue("updateMode", &json!({"mode": "avatar"}), Some("mode:s1".into()))
            .await;

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].body, json!({"mode": "avatar"}));
        assert_eq!(pending[0].attempts, 0);
    }

    #[tokio::test]
    async fn transport_failure_applies_linear_capped_backoff() {
        let (queue, _) = queue();
        queue.enqueue("saveResponses", &json!({}), None).await;

        let endpoint = ScriptedEndpoint::failing(|| StudyError::transport("down"));
        let config = QueueConfig::default();

        for expected_attempts in 1..=3u32 {
            // Make the entry eligible again regardless of its backoff.
            let mut pending = queue.pending().await.unwrap();
            pending[0].next_retry_at = Utc::now() - Duration::seconds(1);
            plant_into(&queue, &pending).await;

            let before = Utc::now();
            queue.drain(&endpoint).await.unwrap();
            let pending = queue.pending().await.unwrap();
            assert_eq!(pending[0].attempts, expected_attempts);

            let delay = pending[0].next_retry_at - before;
            let expected = config.backoff_for(expected_attempts);
            assert!(delay >= expected - Duration::seconds(1));
            assert!(delay <= expected + Duration::seconds(1));
        }
    }

    async fn plant_into(queue: &DurableQueue, entries: &[QueuedCommand]) {
        queue.persist(entries).await.unwrap();
    }

    #[tokio::test]
    async fn over_age_entry_is_dropped_without_a_remote_call() {
        let (queue, store) = queue();
        let mut stale = QueuedCommand::new("saveResponses", json!({}), None);
        stale.created_at = Utc::now() - Duration::days(8);
        stale.next_retry_at = stale.created_at;
        plant(&store, &[stale]).await;

        let endpoint = ScriptedEndpoint::succeeding();
        assert_eq!(queue.drain(&endpoint).await.unwrap(), 0);
        assert_eq!(endpoint.calls(), 0);
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn capacity_eviction_drops_oldest_first() {
        let store = Arc::new(InMemoryBlobStore::new());
        let config = QueueConfig {
            max_entries: 3,
            ..QueueConfig::default()
        };
        let queue = DurableQueue::new(store.clone(), config);

        let now = Utc::now();
        let aged: Vec<QueuedCommand> = (0..3)
            .map(|i| {
                let mut entry =
                    QueuedCommand::new(format!("op{i}"), json!({"i": i}), None);
                entry.created_at = now - Duration::minutes(10 - i);
                entry
            })
            .collect();
        plant(&store, &aged).await;

        queue.enqueue("op3", &json!({"i": 3}), None).await;

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 3);
        let operations: Vec<&str> = pending.iter().map(|e| e.operation.as_str()).collect();
        assert_eq!(operations, vec!["op1", "op2", "op3"]);
    }

    #[tokio::test]
    async fn permanent_failure_drops_the_entry() {
        let (queue, _) = queue();
        queue.enqueue("saveResponses", &json!({}), None).await;

        let endpoint = ScriptedEndpoint::failing(|| StudyError::validation("malformed"));
        assert_eq!(queue.drain(&endpoint).await.unwrap(), 0);
        assert_eq!(endpoint.calls(), 1);
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn entry_waiting_for_backoff_is_not_retried() {
        let (queue, store) = queue();
        let mut waiting = QueuedCommand::new("saveResponses", json!({}), None);
        waiting.next_retry_at = Utc::now() + Duration::seconds(30);
        plant(&store, &[waiting]).await;

        let endpoint = ScriptedEndpoint::succeeding();
        assert_eq!(queue.drain(&endpoint).await.unwrap(), 0);
        assert_eq!(endpoint.calls(), 0);
        assert_eq!(queue.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_storage_degrades_to_fire_and_forget() {
        let queue = DurableQueue::new(Arc::new(UnavailableBlobStore), QueueConfig::default());
        // Neither call may error.
        queue.enqueue("saveResponses", &json!({}), None).await;
        let endpoint = ScriptedEndpoint::succeeding();
        assert_eq!(queue.drain(&endpoint).await.unwrap(), 0);
        assert_eq!(endpoint.calls(), 0);
    }

    #[tokio::test]
    async fn corrupt_blob_is_discarded_not_fatal() {
        let (queue, store) = queue();
        store.put(QUEUE_KEY, "not json").await.unwrap();
        assert!(queue.pending().await.unwrap().is_empty());
        queue.enqueue("saveResponses", &json!({}), None).await;
        assert_eq!(queue.pending().await.unwrap().len(), 1);
    }
}
