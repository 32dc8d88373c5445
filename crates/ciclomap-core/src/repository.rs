//! AnnotationStore: the annotation collection on top of a `DocumentStore`.
//!
//! Translates between `Annotation` types and raw documents, and pins every
//! call to the configured collection path.

use crate::annotation::{AnnotationId, NewAnnotation};
use crate::events::Operation;
use crate::store::{DocumentStore, ListenerRegistration, SnapshotListener, StoreError};

use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
#[error("{operation:?} failed: {source}")]
pub struct StoreWriteError {
    pub operation: Operation,
    #[source]
    pub source: StoreError,
}

pub type Result<T> = std::result::Result<T, StoreWriteError>;

/// Typed access to the shared annotation collection.
#[derive(Clone)]
pub struct AnnotationStore {
    store: Arc<dyn DocumentStore>,
    path: String,
}

impl AnnotationStore {
    pub fn new(store: Arc<dyn DocumentStore>, path: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Listen for snapshots of the collection.
    pub fn subscribe(&self, listener: SnapshotListener) -> ListenerRegistration {
        debug!("Subscribing to {}", self.path);
        self.store.subscribe(&self.path, listener)
    }

    /// Persist a new annotation and return the id the store assigned.
    pub async fn create(&self, annotation: &NewAnnotation) -> Result<AnnotationId> {
        let fail = |source| StoreWriteError {
            operation: Operation::Create,
            source,
        };

        let data = serde_json::to_value(annotation.to_document())
            .map_err(|e| fail(StoreError::InvalidData(e.to_string())))?;
        let id = self.store.add(&self.path, data).await.map_err(fail)?;
        AnnotationId::new(id).map_err(|e| fail(StoreError::Other(e.to_string())))
    }

    /// Replace the notes of an annotation, leaving every other field alone.
    pub async fn update_notes(&self, id: &AnnotationId, notes: &str) -> Result<()> {
        let mut fields = Map::new();
        fields.insert("notes".to_string(), Value::String(notes.to_string()));
        self.store
            .update(&self.path, id.as_str(), fields)
            .await
            .map_err(|source| StoreWriteError {
                operation: Operation::UpdateNotes,
                source,
            })
    }

    pub async fn delete(&self, id: &AnnotationId) -> Result<()> {
        self.store
            .delete(&self.path, id.as_str())
            .await
            .map_err(|source| StoreWriteError {
                operation: Operation::Delete,
                source,
            })
    }
}
