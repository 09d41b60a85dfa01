//! Worktrees store, keyed by project.
//!
//! Every action runs `ensure_project_initialized` first so the list and
//! status of the project exist before anything reads or writes them.

use crate::error::{StoreError, StoreResult};
use crate::keyed::{KeyedCollection, Snapshot};
use crate::HubContext;
use agent_service_client::{NewWorktree, Worktree, WorktreePatch, DEFAULT_WORKTREE_ID};
use client_registry::ClientHandle;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default)]
struct WorktreesState {
    worktrees: KeyedCollection<Worktree>,
    /// Selected worktree id per project.
    selected: HashMap<String, String>,
}

impl WorktreesState {
    fn ensure_project_initialized(&mut self, project_id: &str) {
        self.worktrees.ensure_key(project_id);
    }
}

pub struct WorktreesStore {
    context: HubContext,
    state: Mutex<WorktreesState>,
}

impl WorktreesStore {
    pub fn new(context: HubContext) -> Self {
        Self {
            context,
            state: Mutex::new(WorktreesState::default()),
        }
    }

    pub fn worktrees(&self, project_id: &str) -> Arc<Vec<Worktree>> {
        self.state.lock().worktrees.list(project_id)
    }

    /// Look up a worktree; `None` or `"default"` means the default worktree.
    pub fn worktree_for(&self, project_id: &str, worktree_id: Option<&str>) -> Option<Worktree> {
        let id = worktree_id.unwrap_or(DEFAULT_WORKTREE_ID);
        self.state.lock().worktrees.find(project_id, id)
    }

    /// The selected worktree of a project, falling back to the default one.
    pub fn current_worktree(&self, project_id: &str) -> Option<Worktree> {
        let selected = self.state.lock().selected.get(project_id).cloned();
        self.worktree_for(project_id, selected.as_deref())
    }

    pub fn is_loading(&self, project_id: &str) -> bool {
        self.state.lock().worktrees.status(project_id).loading
    }

    pub fn error(&self, project_id: &str) -> Option<String> {
        self.state.lock().worktrees.status(project_id).error
    }

    pub fn clear_error(&self, project_id: &str) {
        let mut state = self.state.lock();
        state.ensure_project_initialized(project_id);
        state.worktrees.set_error(project_id, None);
    }

    pub async fn load_worktrees(&self, project_id: &str) {
        {
            let mut state = self.state.lock();
            state.ensure_project_initialized(project_id);
            state.worktrees.set_loading(project_id, true);
        }

        let result = self.fetch(project_id).await;

        let mut state = self.state.lock();
        state.ensure_project_initialized(project_id);
        state.worktrees.set_loading(project_id, false);
        match result {
            Ok(worktrees) => {
                debug!(project_id, count = worktrees.len(), "Loaded worktrees");
                state.worktrees.replace(project_id, worktrees);
                state.worktrees.set_error(project_id, None);
            }
            Err(err) => {
                warn!(project_id, "Failed to load worktrees: {}", err);
                state
                    .worktrees
                    .set_error(project_id, Some(err.message_or("Failed to load worktrees")));
            }
        }
    }

    /// Create a worktree and select it. Failures are recorded and returned.
    pub async fn create_worktree(
        &self,
        project_id: &str,
        body: NewWorktree,
    ) -> StoreResult<Worktree> {
        self.state.lock().ensure_project_initialized(project_id);

        let result = async {
            let handle = self.client(project_id).await?;
            let worktree = handle.client().create_worktree(project_id, &body).await?;
            if worktree.id.is_empty() {
                return Err(StoreError::ValidationFailed(
                    "Worktree created but has no ID".to_string(),
                ));
            }
            Ok(worktree)
        }
        .await;

        let mut state = self.state.lock();
        state.ensure_project_initialized(project_id);
        match result {
            Ok(worktree) => {
                info!(project_id, worktree_id = %worktree.id, "Created worktree");
                state.worktrees.upsert(project_id, worktree.clone());
                state
                    .selected
                    .insert(project_id.to_string(), worktree.id.clone());
                state.worktrees.set_error(project_id, None);
                Ok(worktree)
            }
            Err(err) => {
                warn!(project_id, "Failed to create worktree: {}", err);
                state
                    .worktrees
                    .set_error(project_id, Some(err.message_or("Failed to create worktree")));
                Err(err)
            }
        }
    }

    /// Optimistically patch a listed worktree; unknown ids make no remote call.
    pub async fn update_worktree(&self, project_id: &str, worktree_id: &str, patch: WorktreePatch) {
        let snapshot = {
            let mut state = self.state.lock();
            state.ensure_project_initialized(project_id);
            if state.worktrees.find(project_id, worktree_id).is_none() {
                debug!(project_id, worktree_id, "Ignoring update of unknown worktree");
                return;
            }
            let snapshot = state.worktrees.snapshot(project_id);
            state
                .worktrees
                .update_entity(project_id, worktree_id, |w| patch.apply_to(w));
            state.worktrees.set_error(project_id, None);
            snapshot
        };

        let result = async {
            let handle = self.client(project_id).await?;
            Ok::<_, StoreError>(
                handle
                    .client()
                    .update_worktree(project_id, worktree_id, &patch)
                    .await?,
            )
        }
        .await;

        match result {
            Ok(worktree) => {
                debug!(project_id, worktree_id, "Worktree updated");
                self.state
                    .lock()
                    .worktrees
                    .update_entity(project_id, worktree_id, |w| *w = worktree);
            }
            Err(err) => {
                warn!(project_id, worktree_id, "Failed to update worktree: {}", err);
                self.revert(
                    project_id,
                    snapshot,
                    err.message_or("Failed to update worktree"),
                )
                .await;
            }
        }
    }

    /// Optimistically remove a worktree. A removed selection falls back to the default.
    pub async fn remove_worktree(&self, project_id: &str, worktree_id: &str) {
        let (snapshot, previous_selection) = {
            let mut state = self.state.lock();
            state.ensure_project_initialized(project_id);
            if state.worktrees.find(project_id, worktree_id).is_none() {
                debug!(project_id, worktree_id, "Ignoring removal of unknown worktree");
                return;
            }
            let snapshot = state.worktrees.snapshot(project_id);
            let previous_selection = state.selected.get(project_id).cloned();
            state.worktrees.remove_entity(project_id, worktree_id);
            if previous_selection.as_deref() == Some(worktree_id) {
                state.selected.remove(project_id);
            }
            state.worktrees.set_error(project_id, None);
            (snapshot, previous_selection)
        };

        let result = async {
            let handle = self.client(project_id).await?;
            Ok::<_, StoreError>(
                handle
                    .client()
                    .delete_worktree(project_id, worktree_id)
                    .await?,
            )
        }
        .await;

        match result {
            Ok(()) => info!(project_id, worktree_id, "Removed worktree"),
            Err(err) => {
                warn!(project_id, worktree_id, "Failed to remove worktree: {}", err);
                self.revert(
                    project_id,
                    snapshot,
                    err.message_or("Failed to remove worktree"),
                )
                .await;
                if let Some(previous) = previous_selection {
                    self.state
                        .lock()
                        .selected
                        .insert(project_id.to_string(), previous);
                }
            }
        }
    }

    /// Select a worktree; `None` or an unknown id selects the default.
    pub fn select_worktree(&self, project_id: &str, worktree_id: Option<&str>) -> Option<Worktree> {
        {
            let mut state = self.state.lock();
            state.ensure_project_initialized(project_id);
            let known = worktree_id.filter(|id| state.worktrees.find(project_id, id).is_some());
            match known {
                Some(id) => {
                    state.selected.insert(project_id.to_string(), id.to_string());
                }
                None => {
                    state.selected.remove(project_id);
                }
            }
        }
        self.current_worktree(project_id)
    }

    async fn revert(&self, project_id: &str, snapshot: Snapshot<Worktree>, message: String) {
        let canonical = self.fetch(project_id).await;
        if let Err(err) = &canonical {
            warn!(project_id, "Canonical reload failed, restoring snapshot: {}", err);
        }
        let mut state = self.state.lock();
        state.worktrees.revert(project_id, canonical, snapshot);
        state.ensure_project_initialized(project_id);
        state.worktrees.set_error(project_id, Some(message));
    }

    async fn fetch(&self, project_id: &str) -> StoreResult<Vec<Worktree>> {
        let handle = self.client(project_id).await?;
        Ok(handle.client().list_worktrees(project_id).await?)
    }

    async fn client(&self, project_id: &str) -> StoreResult<Arc<ClientHandle>> {
        self.context.project_client(project_id).await
    }
}
