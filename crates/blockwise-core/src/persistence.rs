//! Document storage and debounced autosave.
//!
//! ## Learning: async-trait
//!
//! Storage is the only asynchronous boundary of the editor. The
//! `DocumentStore` trait uses `#[async_trait]` so it can be used as a trait
//! object (`Arc<dyn DocumentStore>`), which plain `async fn` in traits
//! doesn't allow yet.
//!
//! ## Latest Edit Wins
//!
//! `Autosaver::schedule` aborts the document's pending save task (without
//! awaiting it) and spawns a new one. Each task carries a per-document
//! generation number and checks it under a gate before writing, so a stale
//! task that already woke up can't overwrite a newer state.

use async_trait::async_trait;
use blockwise_model::{DocumentId, DocumentRecord};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, StorageConfig};
use crate::event::{EditorEvent, EventBus};

/// Result type for storage operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Errors raised by a document store.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Document not found: {0}")]
    NotFound(DocumentId),

    #[error("Invalid document: {0}")]
    Invalid(String),

    #[error("Save rejected: {0}")]
    Rejected(String),
}

/// The persistence collaborator.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Loads a document record.
    async fn load(&self, id: DocumentId) -> PersistenceResult<DocumentRecord>;

    /// Persists a document record, replacing any previous version.
    async fn save(&self, record: &DocumentRecord) -> PersistenceResult<()>;
}

// ==================== JSON Files ====================

/// Stores each document as `<directory>/<id>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    directory: PathBuf,
}

impl JsonFileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Creates a store in the configured storage directory.
    pub fn from_config(config: &StorageConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.resolve_directory()?))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the file a document is stored in.
    pub fn path_for(&self, id: DocumentId) -> PathBuf {
        self.directory.join(format!("{id}.json"))
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn load(&self, id: DocumentId) -> PersistenceResult<DocumentRecord> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound(id));
            }
            Err(err) => return Err(err.into()),
        };
        let record: DocumentRecord = serde_json::from_slice(&bytes)?;
        if record.id != id {
            return Err(PersistenceError::Invalid(format!(
                "{} holds document {}",
                path.display(),
                record.id
            )));
        }
        tracing::debug!(%id, path = %path.display(), "loaded document");
        Ok(record)
    }

    /// Writes to a temporary file and renames it over the target, so a
    /// crash mid-write never leaves a truncated document behind.
    async fn save(&self, record: &DocumentRecord) -> PersistenceResult<()> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.path_for(record.id);
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(id = %record.id, path = %path.display(), "saved document");
        Ok(())
    }
}

// ==================== In Memory ====================

/// A store that keeps records in memory.
///
/// Can be switched into a failing mode to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<DocumentId, DocumentRecord>>,
    failing: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following save fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the stored record for `id`.
    pub async fn get(&self, id: DocumentId) -> Option<DocumentRecord> {
        self.records.lock().await.get(&id).cloned()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self, id: DocumentId) -> PersistenceResult<DocumentRecord> {
        self.get(id).await.ok_or(PersistenceError::NotFound(id))
    }

    async fn save(&self, record: &DocumentRecord) -> PersistenceResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Rejected("store is failing".to_string()));
        }
        self.records.lock().await.insert(record.id, record.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ==================== Autosave ====================

/// Save bookkeeping for one document.
#[derive(Default)]
struct Slot {
    generation: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
}

impl Slot {
    /// Invalidates every earlier save of this document and aborts its task.
    fn bump(&mut self) -> u64 {
        if let Some(pending) = self.pending.take() {
            // Not awaited: a cancelled save must never hold up the next edit.
            pending.abort();
        }
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

/// Debounced, latest-edit-wins saver.
///
/// Saves are tracked per document: a new edit only replaces the pending save
/// of the same document, so switching documents never drops the previous
/// one's last edit.
pub struct Autosaver {
    store: Arc<dyn DocumentStore>,
    delay: Duration,
    gate: Arc<Mutex<()>>,
    slots: HashMap<DocumentId, Slot>,
    events: Option<EventBus>,
}

impl Autosaver {
    pub fn new(store: Arc<dyn DocumentStore>, delay: Duration) -> Self {
        Self {
            store,
            delay,
            gate: Arc::new(Mutex::new(())),
            slots: HashMap::new(),
            events: None,
        }
    }

    /// Reports background save results on `bus`.
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Returns true while any scheduled save hasn't completed.
    pub fn is_pending(&self) -> bool {
        self.slots.values().any(Slot::is_pending)
    }

    /// Returns true while a scheduled save of `id` hasn't completed.
    pub fn is_pending_for(&self, id: DocumentId) -> bool {
        self.slots.get(&id).is_some_and(Slot::is_pending)
    }

    /// Schedules `record` to be saved after the quiet period, replacing any
    /// pending save of the same document.
    ///
    /// Outside a Tokio runtime there is nothing to run the timer on, so the
    /// request is dropped with a warning.
    pub fn schedule(&mut self, record: DocumentRecord) {
        let slot = self.slots.entry(record.id).or_default();
        let generation = slot.bump();

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(id = %record.id, "no async runtime, autosave skipped");
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let latest = Arc::clone(&slot.generation);
        let gate = Arc::clone(&self.gate);
        let events = self.events.clone();
        let delay = self.delay;

        slot.pending = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let _guard = gate.lock().await;
            if latest.load(Ordering::SeqCst) != generation {
                tracing::debug!(id = %record.id, "stale autosave skipped");
                return;
            }
            let result = store.save(&record).await;
            report(events.as_ref(), record.id, &result);
        }));
    }

    /// Cancels every pending save.
    pub fn cancel(&mut self) {
        for slot in self.slots.values_mut() {
            slot.bump();
        }
    }

    /// Cancels the pending save of `id`, if any.
    pub fn cancel_document(&mut self, id: DocumentId) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.bump();
        }
    }

    /// Cancels the pending save of `record`'s document and writes it now.
    pub async fn flush(&mut self, record: &DocumentRecord) -> PersistenceResult<()> {
        let slot = self.slots.entry(record.id).or_default();
        let generation = slot.bump();
        let latest = Arc::clone(&slot.generation);

        let _guard = self.gate.lock().await;
        if latest.load(Ordering::SeqCst) != generation {
            return Ok(());
        }
        self.store.save(record).await
    }
}

impl std::fmt::Debug for Autosaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.slots.values().filter(|slot| slot.is_pending()).count();
        f.debug_struct("Autosaver")
            .field("delay", &self.delay)
            .field("documents", &self.slots.len())
            .field("pending", &pending)
            .finish()
    }
}

fn report(events: Option<&EventBus>, id: DocumentId, result: &PersistenceResult<()>) {
    match result {
        Ok(()) => {
            tracing::debug!(%id, "autosaved");
            if let Some(bus) = events {
                bus.emit(EditorEvent::DocumentSaved(id));
            }
        }
        Err(err) => {
            tracing::warn!(%id, error = %err, "autosave failed");
            if let Some(bus) = events {
                bus.emit(EditorEvent::SaveFailed {
                    document: id,
                    reason: err.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwise_model::BlockRepository;

    fn record(title: &str) -> DocumentRecord {
        BlockRepository::new(title).to_record()
    }

    /// A store whose writes take a while, to catch saves in flight.
    #[derive(Default)]
    struct SlowStore {
        written: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DocumentStore for SlowStore {
        async fn load(&self, id: DocumentId) -> PersistenceResult<DocumentRecord> {
            Err(PersistenceError::NotFound(id))
        }

        async fn save(&self, record: &DocumentRecord) -> PersistenceResult<()> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            self.written.lock().unwrap().push(record.title.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("docs"));
        let record = record("Saved");

        store.save(&record).await.unwrap();
        assert!(store.path_for(record.id).exists());
        assert!(!store.path_for(record.id).with_extension("json.tmp").exists());

        let loaded = store.load(record.id).await.unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_json_store_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let id = DocumentId::new();
        assert!(matches!(
            store.load(id).await,
            Err(PersistenceError::NotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let id = DocumentId::new();
        std::fs::write(store.path_for(id), "{ not json").unwrap();
        assert!(matches!(store.load(id).await, Err(PersistenceError::Json(_))));
    }

    #[tokio::test]
    async fn test_memory_store_failure_mode() {
        let store = MemoryStore::new();
        let record = record("Mem");
        store.set_failing(true);
        assert!(store.save(&record).await.is_err());
        assert!(store.get(record.id).await.is_none());

        store.set_failing(false);
        store.save(&record).await.unwrap();
        assert_eq!(store.load(record.id).await.unwrap(), record);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_debounces_to_latest() {
        let store = Arc::new(MemoryStore::new());
        let mut saver = Autosaver::new(store.clone(), Duration::from_millis(1000));
        let mut latest = record("first");

        saver.schedule(latest.clone());
        tokio::time::sleep(Duration::from_millis(300)).await;
        latest.title = "second".to_string();
        saver.schedule(latest.clone());
        assert!(saver.is_pending());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.get(latest.id).await.unwrap().title, "second");
        assert!(!saver.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_saves_of_different_documents_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let mut saver = Autosaver::new(store.clone(), Duration::from_millis(1000));
        let first = record("first");
        let second = record("second");

        saver.schedule(first.clone());
        saver.schedule(second.clone());
        assert!(saver.is_pending_for(first.id));
        assert!(saver.is_pending_for(second.id));

        saver.cancel_document(second.id);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.get(first.id).await.unwrap().title, "first");
        assert!(store.get(second.id).await.is_none());
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_save_is_cancelled() {
        let store = Arc::new(SlowStore::default());
        let mut saver = Autosaver::new(store.clone(), Duration::from_millis(100));

        let mut doc = record("first");
        saver.schedule(doc.clone());
        // Past the debounce: the first save is now in flight.
        tokio::time::sleep(Duration::from_millis(200)).await;
        doc.title = "second".to_string();
        saver.schedule(doc);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*store.written.lock().unwrap(), vec!["second".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_flush() {
        let store = Arc::new(MemoryStore::new());
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let mut saver = Autosaver::new(store.clone(), Duration::from_millis(100)).with_events(bus);

        saver.schedule(record("dropped"));
        saver.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(store.save_count(), 0);

        let kept = record("kept");
        saver.flush(&kept).await.unwrap();
        assert_eq!(store.get(kept.id).await.unwrap().title, "kept");

        saver.schedule(kept.clone());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(events.recv().await.unwrap(), EditorEvent::DocumentSaved(kept.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_failure_is_reported() {
        let store = Arc::new(MemoryStore::new());
        store.set_failing(true);
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let mut saver = Autosaver::new(store.clone(), Duration::from_millis(100)).with_events(bus);

        let doc = record("broken");
        saver.schedule(doc.clone());
        match events.recv().await.unwrap() {
            EditorEvent::SaveFailed { document, .. } => assert_eq!(document, doc.id),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_schedule_without_runtime_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let mut saver = Autosaver::new(store.clone(), Duration::from_millis(10));
        saver.schedule(record("offline"));
        assert!(!saver.is_pending());
        assert_eq!(store.save_count(), 0);
    }
}
