//! Synchronization settings.

use crate::store::collection_path;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Application id used to namespace the shared collection
    #[serde(default = "default_app_id")]
    pub app_id: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
        }
    }
}

fn default_app_id() -> String {
    "ciclomap-android-app".to_string()
}

impl SyncConfig {
    /// Path of the shared annotation collection.
    pub fn collection_path(&self) -> String {
        collection_path(&self.app_id)
    }
}
