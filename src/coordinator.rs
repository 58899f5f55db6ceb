//! Activation Coordinator
//!
//! Public entry point. Decides, per document, whether the remote engine
//! already has it hot, and otherwise runs the activation protocol exactly once
//! no matter how many callers ask concurrently.
//!
//! Lock order is always tracker, then store. Holding the tracker lock across
//! the cache lookup and the registration is what makes check-then-register
//! atomic.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheRecord, CacheRecordStore, CacheStats, RecordStatus};
use crate::config::Config;
use crate::error::{ActivationError, PersistResult, SetupError};
use crate::inflight::{InFlightTracker, Outcome, SharedOutcome, Ticket};
use crate::persistence::{load_or_create_session_id, FileSlotStore, RecordPersistence, SlotStore};
use crate::remote::{
    Activation, ActivationPath, ActivationProtocol, ByteSource, HttpRemoteEngine, RemoteEngine,
    StaticCredential,
};
use crate::tasks::spawn_sweeper_task;

/// Which protocol path a new run takes.
enum RunKind {
    Full(Arc<dyn ByteSource>),
    Reactivate,
}

// == Activation Coordinator ==
/// Cheap to clone; clones share the same store and tracker.
#[derive(Clone)]
pub struct ActivationCoordinator {
    store: Arc<RwLock<CacheRecordStore>>,
    inflight: Arc<Mutex<InFlightTracker>>,
    protocol: ActivationProtocol,
}

impl ActivationCoordinator {
    pub fn new(store: CacheRecordStore, engine: Arc<dyn RemoteEngine>) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            inflight: Arc::new(Mutex::new(InFlightTracker::new())),
            protocol: ActivationProtocol::new(engine),
        }
    }

    /// File-backed store and HTTP engine as described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, SetupError> {
        let slots: Arc<dyn SlotStore> = Arc::new(FileSlotStore::new(&config.state_dir));
        let session_id = load_or_create_session_id(slots.as_ref())?;
        let store = CacheRecordStore::open(config.ttl(), RecordPersistence::new(slots));

        let engine = HttpRemoteEngine::new(&config.remote_url, config.probe_timeout())?
            .with_session_id(session_id)
            .with_credentials(Arc::new(StaticCredential(config.auth_token.clone())));

        Ok(Self::new(store, Arc::new(engine)))
    }

    // == Ensure Ready ==
    /// Guarantees `document_id` is ready to query on the remote engine.
    ///
    /// Served from the cache when a live record exists (a cached `Error` is
    /// returned as-is until [`reset_status`](Self::reset_status)), joined to
    /// the running activation when there is one, and otherwise runs the full
    /// protocol. `source` is only read if the upload fallback is reached.
    pub async fn ensure_ready(
        &self,
        document_id: &str,
        display_name: &str,
        source: Arc<dyn ByteSource>,
    ) -> Outcome {
        self.coordinate(document_id, display_name, RunKind::Full(source))
            .await
    }

    // == Reactivate ==
    /// Like [`ensure_ready`](Self::ensure_ready), but a new run issues a
    /// single reactivation call with no upload fallback.
    pub async fn reactivate(&self, document_id: &str, display_name: &str) -> Outcome {
        self.coordinate(document_id, display_name, RunKind::Reactivate)
            .await
    }

    async fn coordinate(&self, document_id: &str, display_name: &str, kind: RunKind) -> Outcome {
        // No await between the lookup and the spawn: every registration has
        // a running task and a Loading record.
        let mut inflight = self.inflight.lock().await;
        let mut store = self.store.write().await;

        if let Some(cached) = cached_outcome(&mut store, document_id) {
            return cached;
        }

        if let Some(handle) = inflight.join(document_id) {
            drop(store);
            drop(inflight);
            debug!(document_id, "Joining in-flight activation");
            return handle.await;
        }

        let (tx, rx) = oneshot::channel::<Outcome>();
        let handle: SharedOutcome = rx
            .map(|received| {
                received.unwrap_or_else(|_| {
                    Err(ActivationError::Unknown(
                        "activation task ended without an outcome".to_string(),
                    ))
                })
            })
            .boxed()
            .shared();

        let ticket = match inflight.register(document_id, handle.clone()) {
            Ok(ticket) => ticket,
            Err(existing) => {
                drop(store);
                drop(inflight);
                return existing.await;
            }
        };
        store.put(CacheRecord::loading(document_id, display_name));

        info!(document_id, "Starting activation");
        self.spawn_run(
            ticket,
            tx,
            document_id.to_string(),
            display_name.to_string(),
            kind,
        );
        drop(store);
        drop(inflight);
        handle.await
    }

    fn spawn_run(
        &self,
        ticket: Ticket,
        tx: oneshot::Sender<Outcome>,
        document_id: String,
        display_name: String,
        kind: RunKind,
    ) {
        let protocol = self.protocol.clone();
        let store = self.store.clone();
        let inflight = self.inflight.clone();

        tokio::spawn(async move {
            let run = async {
                match &kind {
                    RunKind::Full(source) => {
                        protocol
                            .activate(&document_id, &display_name, source.as_ref())
                            .await
                    }
                    RunKind::Reactivate => protocol.reactivate(&document_id).await,
                }
            };
            let outcome = AssertUnwindSafe(run)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(ActivationError::Unknown(
                        "activation run panicked".to_string(),
                    ))
                });

            settle(&inflight, &store, &document_id, &display_name, ticket, &outcome).await;
            // Receivers may all have gone away
            let _ = tx.send(outcome);
        });
    }

    // == Invalidate ==
    /// Removes the record for a deleted or replaced document. A running
    /// activation is detached so its outcome is not recorded.
    pub async fn invalidate(&self, document_id: &str) {
        if self.forget(document_id).await {
            info!(document_id, "Invalidated cached document");
        }
    }

    // == Reset Status ==
    /// Removes the record and any in-flight registration so the next
    /// `ensure_ready` starts afresh, e.g. after an `Error`.
    pub async fn reset_status(&self, document_id: &str) {
        if self.forget(document_id).await {
            info!(document_id, "Reset document status");
        }
    }

    async fn forget(&self, document_id: &str) -> bool {
        let mut inflight = self.inflight.lock().await;
        let detached = inflight.revoke(document_id);
        let removed = self.store.write().await.delete(document_id).is_some();
        detached || removed
    }

    /// Removes every record and detaches every running activation.
    pub async fn clear_all(&self) -> usize {
        let mut inflight = self.inflight.lock().await;
        let detached = inflight.revoke_all();
        let removed = self.store.write().await.clear();
        info!(removed, detached, "Cleared document cache");
        removed
    }

    // == Queries ==
    pub async fn is_loaded(&self, document_id: &str) -> bool {
        self.store.write().await.is_loaded(document_id)
    }

    /// True while a `Loading` record exists or a run is registered.
    pub async fn is_loading(&self, document_id: &str) -> bool {
        let inflight = self.inflight.lock().await;
        inflight.contains(document_id) || self.store.write().await.is_loading(document_id)
    }

    /// The live record for `document_id`, if any.
    pub async fn status(&self, document_id: &str) -> Option<CacheRecord> {
        self.store.write().await.get(document_id)
    }

    pub async fn records(&self) -> Vec<CacheRecord> {
        self.store.read().await.records()
    }

    // == Stats ==
    /// Diagnostic counts by status, in-flight runs and serialized size.
    pub async fn stats(&self) -> CacheStats {
        let inflight = self.inflight.lock().await;
        let mut stats = self.store.read().await.stats();
        stats.in_flight = inflight.len();
        stats
    }

    // == Lifecycle ==
    /// Starts the expiry sweeper. Abort the returned handle at shutdown.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        spawn_sweeper_task(self.store.clone(), self.inflight.clone(), interval)
    }

    /// Rewrites the durable slot from memory.
    pub async fn flush(&self) -> PersistResult<usize> {
        self.store.read().await.flush()
    }
}

/// Outcome implied by a live record; `None` when absent or `Loading`.
fn cached_outcome(store: &mut CacheRecordStore, document_id: &str) -> Option<Outcome> {
    let record = store.get(document_id)?;
    match record.status {
        RecordStatus::Loaded => {
            debug!(document_id, "Cache hit");
            let remote_id = record.remote_id.unwrap_or_else(|| document_id.to_string());
            Some(Ok(Activation::new(
                document_id,
                remote_id,
                ActivationPath::CacheHit,
            )))
        }
        RecordStatus::Error => {
            debug!(document_id, "Returning cached failure");
            record.error().map(Err)
        }
        RecordStatus::Loading => None,
    }
}

/// Releases the run's registration and, if it still held it, records the
/// terminal state. Runs before the outcome is delivered to callers.
async fn settle(
    inflight: &Mutex<InFlightTracker>,
    store: &RwLock<CacheRecordStore>,
    document_id: &str,
    display_name: &str,
    ticket: Ticket,
    outcome: &Outcome,
) {
    let mut inflight = inflight.lock().await;
    if !inflight.release(document_id, ticket) {
        debug!(document_id, "Run was detached; discarding its outcome");
        return;
    }

    let record = match outcome {
        Ok(activation) => {
            info!(document_id, path = ?activation.path, "Document ready");
            CacheRecord::loaded(document_id, display_name, activation.remote_id.clone())
        }
        Err(e) => {
            info!(document_id, error = %e, "Activation failed");
            CacheRecord::failed(document_id, display_name, e)
        }
    };
    store.write().await.put(record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::persistence::MemorySlotStore;
    use crate::remote::mock::{Call, ScriptedEngine};
    use crate::remote::InMemorySource;
    use chrono::Utc;
    use futures::future::join_all;

    const TTL: Duration = Duration::from_secs(30 * 60);

    fn coordinator(engine: ScriptedEngine) -> (ActivationCoordinator, Arc<ScriptedEngine>) {
        let engine = Arc::new(engine);
        let coordinator = ActivationCoordinator::new(CacheRecordStore::new(TTL), engine.clone());
        (coordinator, engine)
    }

    fn pdf() -> Arc<dyn ByteSource> {
        Arc::new(InMemorySource(b"%PDF-1.7 body".to_vec()))
    }

    fn slow_engine() -> ScriptedEngine {
        ScriptedEngine {
            delay: Duration::from_millis(100),
            ..ScriptedEngine::new()
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let (coordinator, engine) = coordinator(slow_engine());

        let outcomes = join_all(
            (0..5).map(|_| coordinator.ensure_ready("doc-42", "report.pdf", pdf())),
        )
        .await;

        assert_eq!(engine.count(Call::Upload), 1);
        assert_eq!(engine.count(Call::Health), 1);
        let first = outcomes[0].clone().unwrap();
        assert_eq!(first.remote_id, "doc-42");
        assert!(outcomes.iter().all(|o| o.as_ref() == Ok(&first)));

        let record = coordinator.status("doc-42").await.unwrap();
        assert_eq!(record.status, RecordStatus::Loaded);
        assert!(!coordinator.is_loading("doc-42").await);
    }

    #[tokio::test]
    async fn test_cache_hit_makes_no_calls() {
        let (coordinator, engine) = coordinator(ScriptedEngine::new());

        coordinator.ensure_ready("doc-1", "a.pdf", pdf()).await.unwrap();
        let calls = engine.total_calls();

        let hit = coordinator.ensure_ready("doc-1", "a.pdf", pdf()).await.unwrap();

        assert_eq!(hit.path, ActivationPath::CacheHit);
        assert_eq!(hit.remote_id, "doc-1");
        assert_eq!(engine.total_calls(), calls);
        assert!(coordinator.is_loaded("doc-1").await);
    }

    #[tokio::test]
    async fn test_expired_record_triggers_new_run() {
        let engine = Arc::new(ScriptedEngine::new());
        let mut store = CacheRecordStore::new(TTL);
        store.put(
            CacheRecord::loaded("doc-42", "a.pdf", "doc-42")
                .with_last_activity(Utc::now() - chrono::Duration::minutes(31)),
        );
        let coordinator = ActivationCoordinator::new(store, engine.clone());

        let activation = coordinator.ensure_ready("doc-42", "a.pdf", pdf()).await.unwrap();

        assert_eq!(activation.path, ActivationPath::Uploaded);
        assert_eq!(engine.count(Call::Upload), 1);
    }

    #[tokio::test]
    async fn test_stale_loading_record_is_resumed() {
        let engine = Arc::new(ScriptedEngine::new());
        let mut store = CacheRecordStore::new(TTL);
        store.put(CacheRecord::loading("doc-1", "a.pdf"));
        let coordinator = ActivationCoordinator::new(store, engine.clone());

        assert!(coordinator.is_loading("doc-1").await);
        let activation = coordinator.ensure_ready("doc-1", "a.pdf", pdf()).await.unwrap();

        assert_eq!(activation.path, ActivationPath::Uploaded);
        assert!(coordinator.is_loaded("doc-1").await);
    }

    #[tokio::test]
    async fn test_failure_is_cached_until_reset() {
        let (coordinator, engine) = coordinator(ScriptedEngine {
            healthy: false,
            ..ScriptedEngine::new()
        });

        let first = coordinator.ensure_ready("doc-1", "a.pdf", pdf()).await.unwrap_err();
        let second = coordinator.ensure_ready("doc-1", "a.pdf", pdf()).await.unwrap_err();

        assert_eq!(first.kind(), ErrorKind::NetworkUnavailable);
        assert_eq!(first, second);
        assert_eq!(engine.count(Call::Health), 1);

        let record = coordinator.status("doc-1").await.unwrap();
        assert_eq!(record.status, RecordStatus::Error);
        assert!(record.error_detail.is_some());

        coordinator.reset_status("doc-1").await;
        assert!(coordinator.status("doc-1").await.is_none());
        let _ = coordinator.ensure_ready("doc-1", "a.pdf", pdf()).await;
        assert_eq!(engine.count(Call::Health), 2);
    }

    #[tokio::test]
    async fn test_empty_content_recorded_as_error() {
        let (coordinator, engine) = coordinator(ScriptedEngine::new());

        let err = coordinator
            .ensure_ready("doc-1", "empty.pdf", Arc::new(InMemorySource::default()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::EmptyContent);
        assert_eq!(engine.count(Call::Upload), 0);
        assert_eq!(
            coordinator.status("doc-1").await.unwrap().error_kind,
            Some(ErrorKind::EmptyContent)
        );
    }

    #[tokio::test]
    async fn test_reset_while_in_flight_discards_outcome() {
        let (coordinator, engine) = coordinator(slow_engine());

        let background = coordinator.clone();
        let run = tokio::spawn(async move {
            background.ensure_ready("doc-1", "a.pdf", pdf()).await
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(coordinator.is_loading("doc-1").await);
        coordinator.reset_status("doc-1").await;
        assert!(!coordinator.is_loading("doc-1").await);

        // The detached run still answers its own caller
        let outcome = run.await.unwrap();
        assert!(outcome.is_ok());
        assert_eq!(engine.count(Call::Upload), 1);
        assert!(coordinator.status("doc-1").await.is_none());
    }

    #[tokio::test]
    async fn test_running_activation_has_loading_record() {
        let (coordinator, _engine) = coordinator(slow_engine());

        let background = coordinator.clone();
        let run = tokio::spawn(async move {
            background.ensure_ready("doc-1", "a.pdf", pdf()).await
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(coordinator.inflight.lock().await.contains("doc-1"));
        let record = coordinator.status("doc-1").await.unwrap();
        assert_eq!(record.status, RecordStatus::Loading);
        assert_eq!(coordinator.stats().await.in_flight, 1);

        run.await.unwrap().unwrap();
        assert_eq!(
            coordinator.status("doc-1").await.unwrap().status,
            RecordStatus::Loaded
        );
        assert!(coordinator.inflight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_caller_dropped_while_store_busy_leaves_nothing_behind() {
        let (coordinator, engine) = coordinator(ScriptedEngine::new());

        let reader = coordinator.store.read().await;
        let attempt = tokio::time::timeout(
            Duration::from_millis(20),
            coordinator.ensure_ready("doc-1", "a.pdf", pdf()),
        )
        .await;
        assert!(attempt.is_err(), "Caller should time out behind the reader");
        drop(reader);

        assert!(!coordinator.is_loading("doc-1").await);
        assert!(coordinator.status("doc-1").await.is_none());
        assert_eq!(engine.total_calls(), 0);

        let activation = coordinator.ensure_ready("doc-1", "a.pdf", pdf()).await.unwrap();
        assert_eq!(activation.path, ActivationPath::Uploaded);
        assert_eq!(engine.count(Call::Upload), 1);
    }

    #[tokio::test]
    async fn test_caller_dropped_mid_run_still_records_outcome() {
        let (coordinator, engine) = coordinator(slow_engine());

        let attempt = tokio::time::timeout(
            Duration::from_millis(20),
            coordinator.ensure_ready("doc-1", "a.pdf", pdf()),
        )
        .await;
        assert!(attempt.is_err());
        assert_eq!(
            coordinator.status("doc-1").await.unwrap().status,
            RecordStatus::Loading
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(coordinator.is_loaded("doc-1").await);
        assert!(!coordinator.is_loading("doc-1").await);

        let hit = coordinator.ensure_ready("doc-1", "a.pdf", pdf()).await.unwrap();
        assert_eq!(hit.path, ActivationPath::CacheHit);
        assert_eq!(engine.count(Call::Upload), 1);
    }

    #[tokio::test]
    async fn test_reactivate_path() {
        let (coordinator, engine) = coordinator(ScriptedEngine::new());

        let activation = coordinator.reactivate("doc-1", "a.pdf").await.unwrap();
        assert_eq!(activation.path, ActivationPath::Reactivated);
        assert_eq!(engine.total_calls(), 1);

        // Cache hit afterwards for either entry point
        let hit = coordinator.ensure_ready("doc-1", "a.pdf", pdf()).await.unwrap();
        assert_eq!(hit.path, ActivationPath::CacheHit);
        assert_eq!(engine.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_reactivate_joins_running_activation() {
        let (coordinator, engine) = coordinator(slow_engine());

        let (full, light) = tokio::join!(
            coordinator.ensure_ready("doc-1", "a.pdf", pdf()),
            coordinator.reactivate("doc-1", "a.pdf"),
        );

        assert_eq!(full, light);
        assert_eq!(engine.count(Call::Reactivate), 0);
        assert_eq!(engine.count(Call::Upload), 1);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let (coordinator, _engine) = coordinator(ScriptedEngine::new());

        coordinator.ensure_ready("doc-1", "a.pdf", pdf()).await.unwrap();
        coordinator.ensure_ready("doc-2", "b.pdf", pdf()).await.unwrap();

        coordinator.invalidate("doc-1").await;
        assert!(!coordinator.is_loaded("doc-1").await);
        assert_eq!(coordinator.records().await.len(), 1);

        assert_eq!(coordinator.clear_all().await, 1);
        assert!(coordinator.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_stats_counts_by_status() {
        let (coordinator, _engine) = coordinator(ScriptedEngine::new());

        coordinator.ensure_ready("doc-1", "a.pdf", pdf()).await.unwrap();
        let _ = coordinator
            .ensure_ready("doc-2", "b.pdf", Arc::new(InMemorySource::default()))
            .await;

        let stats = coordinator.stats().await;
        assert_eq!(stats.loaded, 1);
        assert_eq!(stats.errored, 1);
        assert_eq!(stats.loading, 0);
        assert_eq!(stats.in_flight, 0);
        assert!(stats.approx_bytes > 0);
    }

    #[tokio::test]
    async fn test_outcome_survives_restart() {
        let slots = Arc::new(MemorySlotStore::new());
        let engine = Arc::new(ScriptedEngine::new());
        let store = CacheRecordStore::open(TTL, RecordPersistence::new(slots.clone()));
        let coordinator = ActivationCoordinator::new(store, engine.clone());
        coordinator.ensure_ready("doc-1", "a.pdf", pdf()).await.unwrap();
        coordinator.flush().await.unwrap();

        let reopened = CacheRecordStore::open(TTL, RecordPersistence::new(slots));
        let restarted = ActivationCoordinator::new(reopened, engine.clone());
        let calls = engine.total_calls();

        let hit = restarted.ensure_ready("doc-1", "a.pdf", pdf()).await.unwrap();
        assert_eq!(hit.path, ActivationPath::CacheHit);
        assert_eq!(engine.total_calls(), calls);
    }

    #[tokio::test]
    async fn test_sweeper_clears_stale_records() {
        let engine = Arc::new(ScriptedEngine::new());
        let mut store = CacheRecordStore::new(TTL);
        store.put(
            CacheRecord::loaded("old", "a.pdf", "old")
                .with_last_activity(Utc::now() - chrono::Duration::minutes(31)),
        );
        let coordinator = ActivationCoordinator::new(store, engine);

        let handle = coordinator.spawn_sweeper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.abort();

        assert_eq!(coordinator.stats().await.evictions, 1);
        assert!(coordinator.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_doc_42_scenario() {
        let (coordinator, engine) = coordinator(slow_engine());

        let (a, b) = tokio::join!(
            coordinator.ensure_ready("doc-42", "doc-42.pdf", pdf()),
            coordinator.ensure_ready("doc-42", "doc-42.pdf", pdf()),
        );
        assert_eq!(a.clone().unwrap().remote_id, "doc-42");
        assert_eq!(a, b);
        assert_eq!(engine.count(Call::Upload), 1);

        // Thirty-one minutes later
        {
            let mut store = coordinator.store.write().await;
            let aged = store
                .get("doc-42")
                .unwrap()
                .with_last_activity(Utc::now() - chrono::Duration::minutes(31));
            store.put(aged);
            assert!(store.get("doc-42").is_none());
            assert!(store.is_empty());
        }
    }
}
