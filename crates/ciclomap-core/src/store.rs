//! DocumentStore trait for the shared real-time collection.
//!
//! Implementations:
//! - `InMemoryDocumentStore` - For testing and the local CLI
//! - Hosted real-time databases plug in behind the same trait
//!
//! The store is addressed by collection path. Listeners receive the complete
//! contents of the collection on subscribe and again after every change.

use async_trait::async_trait;
use rand::Rng;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};
use thiserror::Error;
use tracing::debug;

/// Length of store-assigned document keys.
const AUTO_ID_LEN: usize = 20;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid document data: {0}")]
    InvalidData(String),

    #[error("Store error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Build the shared annotation collection path for an app.
pub fn collection_path(app_id: &str) -> String {
    format!("artifacts/{}/public/data/pontos", app_id)
}

/// A document as delivered in a snapshot, before any parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// Document key (carried out-of-band, never a field)
    pub id: String,
    /// Document fields
    pub data: Value,
}

/// A full snapshot of a collection, or the error the listener got instead.
pub type SnapshotResult = Result<Vec<RawDocument>>;

/// Callback invoked with every snapshot of a subscribed collection.
pub type SnapshotListener = Arc<dyn Fn(SnapshotResult) + Send + Sync>;

/// Handle for an active listener. Stops listening when dropped.
///
/// Follows the disposer pattern: hold this value to keep receiving snapshots,
/// drop it (or call [`remove`](Self::remove)) to stop.
pub struct ListenerRegistration {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ListenerRegistration {
    pub fn new(detach: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Stop listening.
    pub fn remove(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.detach.is_some())
            .finish()
    }
}

/// Path-addressed real-time document store.
///
/// Writes complete asynchronously; their effect becomes visible to listeners
/// through the next snapshot.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Listen to a collection. Fires once with the current contents, then on
    /// every change made by any client.
    fn subscribe(&self, path: &str, listener: SnapshotListener) -> ListenerRegistration;

    /// Add a document and return its store-assigned key.
    async fn add(&self, path: &str, data: Value) -> Result<String>;

    /// Merge `fields` into an existing document.
    async fn update(&self, path: &str, id: &str, fields: Map<String, Value>) -> Result<()>;

    /// Remove a document.
    async fn delete(&self, path: &str, id: &str) -> Result<()>;
}

struct Listener {
    id: usize,
    path: String,
    callback: SnapshotListener,
}

type Listeners = RwLock<Vec<Listener>>;

/// In-memory document store for testing and local sessions.
///
/// Delivers snapshots synchronously on the writing task, after the write has
/// been applied and all internal locks released.
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
    listeners: Arc<Listeners>,
    next_listener_id: AtomicUsize,
    available: AtomicBool,
    writes: AtomicUsize,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_listener_id: AtomicUsize::new(0),
            available: AtomicBool::new(true),
            writes: AtomicUsize::new(0),
        }
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection with existing documents.
    pub fn with_documents(self, path: &str, documents: BTreeMap<String, Value>) -> Self {
        self.collections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_string(), documents);
        self
    }

    /// Insert or replace a document under a known key, notifying listeners.
    ///
    /// Simulates a write made by another client.
    pub fn put_document(&self, path: &str, id: &str, data: Value) {
        self.collections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(path.to_string())
            .or_default()
            .insert(id.to_string(), data);
        self.notify(path);
    }

    /// Current contents of a collection, keyed by document id.
    pub fn documents(&self, path: &str) -> BTreeMap<String, Value> {
        self.collections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    /// Simulate losing (or regaining) the transport. Writes fail while
    /// unavailable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Deliver an error instead of a snapshot to every listener on `path`.
    pub fn fail_listeners(&self, path: &str, error: StoreError) {
        for callback in self.callbacks_for(path) {
            callback(Err(error.clone()));
        }
    }

    /// Number of active listeners on `path`.
    pub fn listener_count(&self, path: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|l| l.path == path)
            .count()
    }

    /// Number of write calls received (successful or not).
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn generate_id() -> String {
        rand::rng()
            .sample_iter(rand::distr::Alphanumeric)
            .take(AUTO_ID_LEN)
            .map(char::from)
            .collect()
    }

    fn snapshot(&self, path: &str) -> Vec<RawDocument> {
        self.collections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| RawDocument {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn callbacks_for(&self, path: &str) -> Vec<SnapshotListener> {
        // Clone the callback list so listeners may subscribe or unsubscribe.
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|l| l.path == path)
            .map(|l| Arc::clone(&l.callback))
            .collect()
    }

    fn notify(&self, path: &str) {
        let callbacks = self.callbacks_for(path);
        if callbacks.is_empty() {
            return;
        }
        let snapshot = self.snapshot(path);
        debug!(
            "Delivering snapshot of {} ({} docs) to {} listener(s)",
            path,
            snapshot.len(),
            callbacks.len()
        );
        for callback in callbacks {
            callback(Ok(snapshot.clone()));
        }
    }

    fn begin_write(&self) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("transport offline".into()))
        }
    }

    fn detach(listeners: &Weak<Listeners>, id: usize) {
        if let Some(listeners) = listeners.upgrade() {
            // Callbacks run on a cloned list, never under this lock.
            listeners
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|l| l.id != id);
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn subscribe(&self, path: &str, listener: SnapshotListener) -> ListenerRegistration {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Listener {
                id,
                path: path.to_string(),
                callback: Arc::clone(&listener),
            });

        listener(Ok(self.snapshot(path)));

        let listeners = Arc::downgrade(&self.listeners);
        ListenerRegistration::new(move || Self::detach(&listeners, id))
    }

    async fn add(&self, path: &str, data: Value) -> Result<String> {
        self.begin_write()?;
        if !data.is_object() {
            return Err(StoreError::InvalidData("document must be an object".into()));
        }

        let id = {
            let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
            let docs = collections.entry(path.to_string()).or_default();
            let mut id = Self::generate_id();
            while docs.contains_key(&id) {
                id = Self::generate_id();
            }
            docs.insert(id.clone(), data);
            id
        };

        self.notify(path);
        Ok(id)
    }

    async fn update(&self, path: &str, id: &str, fields: Map<String, Value>) -> Result<()> {
        self.begin_write()?;
        {
            let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
            let doc = collections
                .get_mut(path)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            let object = doc
                .as_object_mut()
                .ok_or_else(|| StoreError::InvalidData(format!("{} is not an object", id)))?;
            object.extend(fields);
        }

        self.notify(path);
        Ok(())
    }

    async fn delete(&self, path: &str, id: &str) -> Result<()> {
        self.begin_write()?;
        let removed = self
            .collections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(path)
            .and_then(|docs| docs.remove(id));
        if removed.is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }

        self.notify(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    const PATH: &str = "artifacts/test/public/data/pontos";

    fn recording_listener() -> (SnapshotListener, Arc<Mutex<Vec<SnapshotResult>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let listener: SnapshotListener = Arc::new(move |snapshot: SnapshotResult| {
            seen_clone.lock().unwrap().push(snapshot);
        });
        (listener, seen)
    }

    #[test]
    fn test_collection_path() {
        assert_eq!(
            collection_path("ciclomap-android-app"),
            "artifacts/ciclomap-android-app/public/data/pontos"
        );
    }

    #[tokio::test]
    async fn test_subscribe_delivers_initial_and_changes() {
        let store = InMemoryDocumentStore::new();
        let (listener, seen) = recording_listener();

        let _registration = store.subscribe(PATH, listener);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(seen.lock().unwrap()[0].as_ref().unwrap().is_empty());

        let id = store.add(PATH, json!({ "notes": "a" })).await.unwrap();
        assert_eq!(id.len(), AUTO_ID_LEN);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let docs = seen[1].as_ref().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, id);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = InMemoryDocumentStore::new();
        let id = store
            .add(PATH, json!({ "notes": "old", "userId": "u" }))
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("notes".into(), json!("new"));
        store.update(PATH, &id, fields).await.unwrap();

        let doc = &store.documents(PATH)[&id];
        assert_eq!(doc["notes"], "new");
        assert_eq!(doc["userId"], "u");
    }

    #[tokio::test]
    async fn test_missing_documents_fail() {
        let store = InMemoryDocumentStore::new();
        assert_eq!(
            store.update(PATH, "nope", Map::new()).await,
            Err(StoreError::NotFound("nope".into()))
        );
        assert_eq!(
            store.delete(PATH, "nope").await,
            Err(StoreError::NotFound("nope".into()))
        );
    }

    #[tokio::test]
    async fn test_unavailable_rejects_writes() {
        let store = InMemoryDocumentStore::new();
        store.set_available(false);
        assert!(matches!(
            store.add(PATH, json!({})).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.documents(PATH).is_empty());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_dropping_registration_stops_delivery() {
        let store = InMemoryDocumentStore::new();
        let (listener, seen) = recording_listener();

        let registration = store.subscribe(PATH, listener);
        assert_eq!(store.listener_count(PATH), 1);
        drop(registration);
        assert_eq!(store.listener_count(PATH), 0);

        store.add(PATH, json!({})).await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_waits_for_concurrent_readers() {
        let store = InMemoryDocumentStore::new();
        let (listener, _seen) = recording_listener();
        let registration = store.subscribe(PATH, listener);

        let listeners = Arc::clone(&store.listeners);
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let reader = std::thread::spawn(move || {
            let _guard = listeners.read().unwrap();
            locked_tx.send(()).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(100));
        });

        locked_rx.recv().unwrap();
        registration.remove();
        reader.join().unwrap();

        assert_eq!(store.listener_count(PATH), 0);
    }

    #[test]
    fn test_fail_listeners_delivers_error() {
        let store = InMemoryDocumentStore::new();
        let (listener, seen) = recording_listener();
        let _registration = store.subscribe(PATH, listener);

        store.fail_listeners(PATH, StoreError::Unavailable("permission denied".into()));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].is_err());
    }
}
