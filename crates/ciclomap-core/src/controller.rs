//! SyncController: owns the authoritative annotation list.
//!
//! The controller works as follows:
//!
//! 1. `initialize` obtains the session identity and opens exactly one
//!    subscription on the shared collection.
//! 2. Every snapshot the store delivers replaces the whole in-memory list.
//!    Documents that fail to parse are skipped, never the whole batch.
//! 3. Mutations go straight to the store. Their completion only emits an
//!    event; the list changes when the resulting snapshot arrives.
//! 4. Edits and deletes are refused locally unless the session identity is
//!    the annotation's owner.
//!
//! Snapshot application is the only writer of the list, so readers always
//! see the most recently delivered snapshot.

use crate::annotation::{Annotation, AnnotationId, Category, GeoPoint, NewAnnotation};
use crate::config::SyncConfig;
use crate::events::{EventBus, Operation, Subscription, SyncEvent};
use crate::identity::{IdentityAdapter, IdentityProvider};
use crate::projection;
use crate::repository::{AnnotationStore, StoreWriteError};
use crate::store::{DocumentStore, ListenerRegistration, SnapshotListener, SnapshotResult};
use crate::user_id::UserId;

use chrono::Utc;
use futures::lock::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Controller not initialized")]
    NotInitialized,

    #[error("Annotation not found: {0}")]
    NotFound(AnnotationId),

    #[error("Not the owner of annotation {0}")]
    NotOwner(AnnotationId),

    #[error("Cannot add an annotation of unknown category")]
    UnknownCategory,

    #[error(transparent)]
    StoreWrite(#[from] StoreWriteError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Subscribed,
}

/// State shared with the store's snapshot listener.
struct Shared {
    annotations: RwLock<Vec<Annotation>>,
    events: Arc<EventBus>,
    subscribed: AtomicBool,
}

impl Shared {
    fn apply(&self, snapshot: SnapshotResult) {
        let docs = match snapshot {
            Ok(docs) => docs,
            Err(e) => {
                warn!("Snapshot listener error, keeping previous list: {}", e);
                self.events.emit(SyncEvent::SnapshotFailed {
                    error: e.to_string(),
                    timestamp: now_millis(),
                });
                return;
            }
        };

        let mut seen = HashSet::with_capacity(docs.len());
        let mut annotations = Vec::with_capacity(docs.len());
        let mut skipped = 0;
        for raw in &docs {
            match Annotation::from_raw(raw) {
                Ok(annotation) => {
                    if seen.insert(annotation.id.clone()) {
                        annotations.push(annotation);
                    } else {
                        warn!("Skipping duplicate document {}", annotation.id);
                        skipped += 1;
                    }
                }
                Err(e) => {
                    warn!("Skipping malformed document: {}", e);
                    skipped += 1;
                }
            }
        }

        let count = annotations.len();
        *self.annotations.write().unwrap_or_else(|e| e.into_inner()) = annotations;
        debug!("Applied snapshot: {} annotations, {} skipped", count, skipped);

        self.events.emit(SyncEvent::SnapshotApplied {
            count,
            skipped,
            timestamp: now_millis(),
        });
    }
}

/// Synchronizes the shared annotation collection and gates mutations by
/// ownership.
pub struct SyncController {
    identity: IdentityAdapter,
    store: AnnotationStore,
    shared: Arc<Shared>,
    registration: Mutex<Option<ListenerRegistration>>,
}

impl SyncController {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            identity: IdentityAdapter::new(identity),
            store: AnnotationStore::new(store, config.collection_path()),
            shared: Arc::new(Shared {
                annotations: RwLock::new(Vec::new()),
                events: Arc::new(EventBus::new()),
                subscribed: AtomicBool::new(false),
            }),
            registration: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ControllerState {
        if self.shared.subscribed.load(Ordering::SeqCst) {
            ControllerState::Subscribed
        } else {
            ControllerState::Uninitialized
        }
    }

    /// Obtain an identity and subscribe to the collection.
    ///
    /// Idempotent: concurrent or repeated calls open a single subscription.
    pub async fn initialize(&self) {
        let mut registration = self.registration.lock().await;
        if registration.is_some() {
            debug!("Already subscribed to {}", self.store.path());
            return;
        }

        match self.identity.current_identity().await {
            Some(user) => info!("Session identity: {}", user),
            None => warn!("No identity available, new annotations will use a fallback owner"),
        }

        let shared = Arc::clone(&self.shared);
        let listener: SnapshotListener = Arc::new(move |snapshot: SnapshotResult| shared.apply(snapshot));
        *registration = Some(self.store.subscribe(listener));
        self.shared.subscribed.store(true, Ordering::SeqCst);
        info!("Subscribed to {}", self.store.path());
    }

    /// Replace the authoritative list with the contents of a snapshot.
    ///
    /// Called by the subscription; exposed for stores that deliver snapshots
    /// through another channel.
    pub fn on_snapshot(&self, snapshot: SnapshotResult) {
        self.shared.apply(snapshot);
    }

    /// Persist a new annotation owned by the session identity.
    ///
    /// Falls back to a synthesized owner when no identity is available. The
    /// annotation shows up in [`current_annotations`](Self::current_annotations)
    /// once the store's snapshot includes it.
    pub async fn add_annotation(
        &self,
        category: Category,
        notes: impl Into<String>,
        location: GeoPoint,
    ) -> Result<AnnotationId> {
        self.ensure_initialized(Operation::Create)?;
        if category == Category::Unknown {
            return Err(self.reject(Operation::Create, None, SyncError::UnknownCategory));
        }

        let now = Utc::now();
        let owner_id = match self.identity.current_identity().await {
            Some(user) => user,
            None => {
                let fallback = UserId::fallback(now);
                warn!("Identity unavailable, using fallback owner {}", fallback);
                fallback
            }
        };

        let annotation = NewAnnotation {
            category,
            notes: notes.into(),
            location: Some(location),
            owner_id,
            created_at: now,
        };

        match self.store.create(&annotation).await {
            Ok(id) => {
                info!("Created annotation {} ({})", id, category);
                self.shared.events.emit(SyncEvent::AnnotationCreated {
                    id: id.to_string(),
                    timestamp: now_millis(),
                });
                Ok(id)
            }
            Err(e) => Err(self.write_failed(None, e)),
        }
    }

    /// Replace the notes of an annotation the session owns.
    pub async fn edit_annotation(&self, id: &AnnotationId, notes: impl Into<String>) -> Result<()> {
        self.ensure_initialized(Operation::UpdateNotes)?;
        self.authorize(Operation::UpdateNotes, id).await?;

        let notes = notes.into();
        match self.store.update_notes(id, &notes).await {
            Ok(()) => {
                info!("Updated notes of annotation {}", id);
                self.shared.events.emit(SyncEvent::NotesUpdated {
                    id: id.to_string(),
                    timestamp: now_millis(),
                });
                Ok(())
            }
            Err(e) => Err(self.write_failed(Some(id), e)),
        }
    }

    /// Delete an annotation the session owns.
    pub async fn delete_annotation(&self, id: &AnnotationId) -> Result<()> {
        self.ensure_initialized(Operation::Delete)?;
        self.authorize(Operation::Delete, id).await?;

        match self.store.delete(id).await {
            Ok(()) => {
                info!("Deleted annotation {}", id);
                self.shared.events.emit(SyncEvent::AnnotationDeleted {
                    id: id.to_string(),
                    timestamp: now_millis(),
                });
                Ok(())
            }
            Err(e) => Err(self.write_failed(Some(id), e)),
        }
    }

    /// Copy of the authoritative list as of the latest snapshot.
    pub fn current_annotations(&self) -> Vec<Annotation> {
        self.shared
            .annotations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Annotations owned by the session identity (empty without identity).
    pub fn owned_annotations(&self) -> Vec<Annotation> {
        match self.identity.cached_identity() {
            Some(user) => {
                let annotations = self.current_annotations();
                projection::annotations_owned_by(&annotations, &user)
                    .into_iter()
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        }
    }

    /// Session identity, without attempting a sign-in.
    pub fn current_identity(&self) -> Option<UserId> {
        self.identity.cached_identity()
    }

    /// Subscribe to controller events. Drop the handle to unsubscribe.
    pub fn subscribe(&self, callback: impl Fn(SyncEvent) + Send + Sync + 'static) -> Subscription {
        self.shared.events.subscribe(callback)
    }

    fn ensure_initialized(&self, operation: Operation) -> Result<()> {
        if self.state() == ControllerState::Subscribed {
            Ok(())
        } else {
            Err(self.reject(operation, None, SyncError::NotInitialized))
        }
    }

    /// Owner of `id` if it is in the list. The inner `None` marks a record
    /// without an owner.
    fn owner_of(&self, id: &AnnotationId) -> Option<Option<UserId>> {
        self.shared
            .annotations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|a| &a.id == id)
            .map(|a| a.owner_id.clone())
    }

    /// Check that the session identity owns `id`. Nothing reaches the store
    /// when this fails.
    async fn authorize(&self, operation: Operation, id: &AnnotationId) -> Result<UserId> {
        let Some(owner) = self.owner_of(id) else {
            return Err(self.reject(operation, Some(id), SyncError::NotFound(id.clone())));
        };

        match self.identity.current_identity().await {
            Some(user) if owner.as_ref() == Some(&user) => Ok(user),
            _ => Err(self.reject(operation, Some(id), SyncError::NotOwner(id.clone()))),
        }
    }

    fn reject(&self, operation: Operation, id: Option<&AnnotationId>, err: SyncError) -> SyncError {
        warn!("Rejected {:?}: {}", operation, err);
        self.shared.events.emit(SyncEvent::MutationRejected {
            operation,
            id: id.map(|id| id.to_string()),
            reason: err.to_string(),
            timestamp: now_millis(),
        });
        err
    }

    fn write_failed(&self, id: Option<&AnnotationId>, err: StoreWriteError) -> SyncError {
        warn!("Store write failed: {}", err);
        self.shared.events.emit(SyncEvent::MutationFailed {
            operation: err.operation,
            id: id.map(|id| id.to_string()),
            error: err.source.to_string(),
            timestamp: now_millis(),
        });
        err.into()
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
