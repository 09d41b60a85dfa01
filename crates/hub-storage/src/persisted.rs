//! Durable projection of the projects store.

use crate::{KeyValueStore, StorageError, StorageResult};
use agent_service_client::Project;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Namespaced key the projects projection is stored under.
pub const PROJECTS_STORAGE_KEY: &str = "agent-hub:projects";

/// The only slice of client state that survives a reload.
///
/// Being a plain typed record, serializing it can only ever emit these two
/// fields; unknown fields in older blobs are ignored on restore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedProjects {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub current_project: Option<Project>,
}

/// Saves and restores [`PersistedProjects`] through a [`KeyValueStore`].
#[derive(Clone)]
pub struct ProjectPersistence {
    storage: Arc<dyn KeyValueStore>,
    key: String,
}

impl ProjectPersistence {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(storage, PROJECTS_STORAGE_KEY)
    }

    pub fn with_key(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Load the persisted projection.
    ///
    /// A missing or unreadable blob yields the empty projection; a corrupt
    /// blob is logged and ignored rather than blocking startup.
    pub fn restore(&self) -> PersistedProjects {
        match self.try_restore() {
            Ok(Some(state)) => {
                debug!(
                    key = %self.key,
                    projects = state.projects.len(),
                    "Restored persisted projects"
                );
                state
            }
            Ok(None) => PersistedProjects::default(),
            Err(err) => {
                warn!(key = %self.key, "Ignoring persisted projects: {}", err);
                PersistedProjects::default()
            }
        }
    }

    pub fn try_restore(&self) -> StorageResult<Option<PersistedProjects>> {
        let Some(blob) = self.storage.get(&self.key)? else {
            return Ok(None);
        };
        let state = serde_json::from_str(&blob)
            .map_err(|e| StorageError::Encoding(format!("invalid projects blob: {}", e)))?;
        Ok(Some(state))
    }

    pub fn save(&self, state: &PersistedProjects) -> StorageResult<()> {
        let blob =
            serde_json::to_string(state).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(&self.key, &blob)
    }

    pub fn clear(&self) -> StorageResult<bool> {
        self.storage.delete(&self.key)
    }
}
