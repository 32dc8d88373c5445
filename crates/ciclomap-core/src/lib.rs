//! ciclomap-core: Shared map annotations synchronized through a real-time
//! document store.
//!
//! This crate provides the core functionality for:
//! - Annotation records and their document wire shape
//! - Anonymous identity and the ownership rule for edits/deletes
//! - Subscribing to the shared collection and applying snapshots
//! - View projections (labels, marker glyphs, per-owner lists)
//! - DocumentStore and IdentityProvider trait abstractions

pub mod annotation;
pub mod config;
pub mod controller;
pub mod events;
pub mod identity;
pub mod projection;
pub mod repository;
pub mod store;
pub mod user_id;

pub use annotation::{Annotation, AnnotationId, Category, GeoPoint, NewAnnotation, RecordError};
pub use config::SyncConfig;
pub use controller::{ControllerState, SyncController, SyncError};
pub use events::{EventBus, Operation, Subscription, SyncEvent};
pub use identity::{IdentityAdapter, IdentityError, IdentityProvider, InMemoryIdentityProvider};
pub use repository::{AnnotationStore, StoreWriteError};
pub use store::{DocumentStore, InMemoryDocumentStore, ListenerRegistration, RawDocument, StoreError};
pub use user_id::{UserId, UserIdError};
