//! Optimistic stores over the agent service.
//!
//! Every store follows the same write protocol:
//!
//! ```text
//! optimistic  mutate local state synchronously, clear the scope's error
//! remote      obtain a client from the registry, issue the call
//! reconcile   success: overwrite with the server's value
//! revert      failure: reload the canonical list, record the message
//! ```
//!
//! Creates skip the optimistic step because the identifier comes from the
//! server. State lives behind `parking_lot` mutexes that are never held
//! across an `.await`, so each logical step is one synchronous block.

mod error;
mod keyed;
mod locks;
mod projects;
mod providers;
mod sessions;
mod worktrees;

#[cfg(test)]
mod tests;

pub use error::{StoreError, StoreResult};
pub use keyed::{stable_replace, Entity, KeyStatus, KeyedCollection, Snapshot};
pub use locks::{OperationGuard, OperationLockSet};
pub use projects::ProjectsStore;
pub use providers::ProvidersStore;
pub use sessions::SessionsStore;
pub use worktrees::WorktreesStore;

use agent_service_client::Project;
use client_registry::{ClientHandle, ClientRegistry};
use hub_storage::ProjectPersistence;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Dependencies shared by every store, constructed once at startup.
#[derive(Clone)]
pub struct HubContext {
    registry: Arc<ClientRegistry>,
    persistence: Option<ProjectPersistence>,
    /// Root path of every project the projects store knows, by id.
    project_paths: Arc<RwLock<HashMap<String, String>>>,
}

impl HubContext {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self {
            registry,
            persistence: None,
            project_paths: Arc::default(),
        }
    }

    pub fn with_persistence(mut self, persistence: ProjectPersistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn persistence(&self) -> Option<&ProjectPersistence> {
        self.persistence.as_ref()
    }

    /// Root path of `project_id`, once the projects store has seen it.
    pub fn project_path(&self, project_id: &str) -> Option<String> {
        self.project_paths
            .read()
            .get(project_id)
            .filter(|path| !path.trim().is_empty())
            .cloned()
    }

    pub(crate) fn set_project_paths<'a>(&self, projects: impl IntoIterator<Item = &'a Project>) {
        let paths = projects
            .into_iter()
            .map(|p| (p.id.clone(), p.path.clone()))
            .collect();
        *self.project_paths.write() = paths;
    }

    /// Directory a project-scoped call should name.
    ///
    /// An explicit non-blank directory wins, else the project's root path.
    /// `None` only when neither is known.
    pub(crate) fn scope_directory(&self, project_id: &str, directory: Option<&str>) -> Option<String> {
        directory
            .filter(|d| !d.trim().is_empty())
            .map(str::to_string)
            .or_else(|| self.project_path(project_id))
    }

    /// Client for calls scoped to `project_id`, bound to its root path.
    pub(crate) async fn project_client(&self, project_id: &str) -> StoreResult<Arc<ClientHandle>> {
        let path = self.project_path(project_id).unwrap_or_default();
        Ok(self.registry.get_client(project_id, &path).await?)
    }

    /// Client for calls not scoped to a project.
    pub(crate) async fn service_client(&self) -> StoreResult<Arc<ClientHandle>> {
        Ok(self.registry.service_client().await?)
    }
}

/// All stores, wired to one [`HubContext`].
pub struct Hub {
    context: HubContext,
    pub projects: ProjectsStore,
    pub sessions: SessionsStore,
    pub worktrees: WorktreesStore,
    pub providers: ProvidersStore,
}

impl Hub {
    pub fn new(context: HubContext) -> Self {
        Self {
            projects: ProjectsStore::new(context.clone()),
            sessions: SessionsStore::new(context.clone()),
            worktrees: WorktreesStore::new(context.clone()),
            providers: ProvidersStore::new(context.clone()),
            context,
        }
    }

    pub fn context(&self) -> &HubContext {
        &self.context
    }

    /// Force a fresh backend discovery on the next call.
    pub fn reset_connections(&self) {
        self.context.registry.reset();
    }
}
