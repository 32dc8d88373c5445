//! One client session against the locally persisted collection.

use crate::commands::{self, Command};
use crate::config::{Config, MapConfig};
use crate::state::LocalState;

use anyhow::{Context, Result};
use ciclomap_core::projection;
use ciclomap_core::{
    AnnotationId, GeoPoint, InMemoryDocumentStore, InMemoryIdentityProvider, Subscription,
    SyncController, UserId,
};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

pub struct Session {
    collection: String,
    camera: MapConfig,
    store: Arc<InMemoryDocumentStore>,
    controller: SyncController,
    /// Saved identity to keep while acting as an overriding user
    saved_user: Option<Option<UserId>>,
    notices: Arc<Mutex<Vec<String>>>,
    _events: Subscription,
}

impl Session {
    /// Restore the collection from `state` and subscribe to it.
    ///
    /// `user` overrides the identity saved in `state`. Without either, the
    /// session signs in anonymously.
    pub async fn open(config: &Config, state: LocalState, user: Option<UserId>) -> Self {
        let collection = config.sync.collection_path();
        let store = Arc::new(InMemoryDocumentStore::new().with_documents(&collection, state.documents));
        let saved_user = user.is_some().then(|| state.user_id.clone());
        let identity = match user.or(state.user_id) {
            Some(user) => InMemoryIdentityProvider::signed_in(user),
            None => InMemoryIdentityProvider::new(),
        };

        let controller = SyncController::new(Arc::new(identity), store.clone(), &config.sync);

        let notices = Arc::new(Mutex::new(Vec::new()));
        let notices_clone = Arc::clone(&notices);
        let events = controller.subscribe(move |event| {
            debug!("Event: {:?}", event);
            if let Some(notice) = commands::notice_for(&event) {
                notices_clone
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(notice);
            }
        });

        controller.initialize().await;

        Self {
            collection,
            camera: config.map.clone(),
            store,
            controller,
            saved_user,
            notices,
            _events: events,
        }
    }

    /// Run one command and return its rendered output.
    pub async fn run(&self, command: &Command, format: OutputFormat) -> Result<String> {
        match command {
            Command::List => {
                let annotations = self.controller.current_annotations();
                let identity = self.controller.current_identity();
                let entries = commands::list_entries(&annotations, identity.as_ref());
                render(format, entries.as_slice(), commands::render_list)
            }

            Command::Mine => {
                let identity = self.controller.current_identity();
                let annotations = self.controller.current_annotations();
                let entries = identity
                    .as_ref()
                    .map(|user| projection::profile_view(&annotations, user))
                    .unwrap_or_default();
                render(format, entries.as_slice(), |entries| {
                    commands::render_profile(identity.as_ref(), entries)
                })
            }

            Command::Map => {
                let view = commands::map_view(&self.camera, &self.controller.current_annotations());
                render(format, &view, commands::render_map)
            }

            Command::Categories => {
                let entries = commands::category_entries();
                render(format, entries.as_slice(), commands::render_categories)
            }

            Command::Add {
                category,
                lat,
                lng,
                notes,
            } => {
                let location = GeoPoint::new(*lat, *lng).context("Invalid location")?;
                let result = self
                    .controller
                    .add_annotation(*category, notes.clone(), location)
                    .await;
                self.outcome(result.map(|_| ()))
            }

            Command::Edit { id, notes } => {
                let id = AnnotationId::new(id.clone()).context("Invalid annotation id")?;
                let result = self.controller.edit_annotation(&id, notes.clone()).await;
                self.outcome(result)
            }

            Command::Delete { id } => {
                let id = AnnotationId::new(id.clone()).context("Invalid annotation id")?;
                let result = self.controller.delete_annotation(&id).await;
                self.outcome(result)
            }
        }
    }

    /// Notices emitted so far, oldest first.
    pub fn notices(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Identity and collection contents to persist.
    ///
    /// An identity passed to [`open`](Self::open) as an override is never
    /// persisted; the saved one is kept instead.
    pub fn state(&self) -> LocalState {
        let user_id = match &self.saved_user {
            Some(saved) => saved.clone(),
            None => self.controller.current_identity(),
        };
        LocalState {
            user_id,
            documents: self.store.documents(&self.collection),
        }
    }

    fn outcome(&self, result: ciclomap_core::controller::Result<()>) -> Result<String> {
        let notice = self.notices().pop().unwrap_or_default();
        match result {
            Ok(()) => Ok(notice),
            Err(e) => Err(anyhow::Error::new(e).context(notice)),
        }
    }
}

fn render<T: serde::Serialize + ?Sized>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce(&T) -> String,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text(value)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
    }
}
