//! Persistence for the local session.
//!
//! Stores the session identity and the shared collection's documents in a
//! single JSON file, so successive invocations act like one client of the
//! same collection.

use anyhow::{Context, Result};
use ciclomap_core::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Persisted session state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LocalState {
    /// Identity issued to this client, once signed in
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Collection documents keyed by id
    #[serde(default)]
    pub documents: BTreeMap<String, Value>,
}

impl LocalState {
    /// Load state from `path`, or start empty if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No state file at {:?}, starting empty", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {:?}", path))
    }

    /// Write state to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory: {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write state file: {:?}", path))?;
        tracing::debug!("Saved {} documents to {:?}", self.documents.len(), path);
        Ok(())
    }
}
