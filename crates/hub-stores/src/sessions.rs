//! Sessions store, keyed by context.
//!
//! Sessions live under `project_id::path` keys. The bare `project_id` key
//! holds the aggregate view for call sites that only know the project; it
//! is never edited directly and is rebuilt from every `project_id::*` list
//! after each write to one of them.
//!
//! A write without a directory targets the project's root path. While that
//! path is unknown it lands in the reserved `project_id::` context, which
//! still feeds the aggregate.

use crate::error::{StoreError, StoreResult};
use crate::keyed::{KeyedCollection, Snapshot};
use crate::HubContext;
use agent_service_client::{NewSession, Session, SessionPatch};
use context_key_resolver::{aggregate_prefix, context_key, ContextKey};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default)]
struct SessionsState {
    sessions: KeyedCollection<Session>,
    current: Option<Session>,
    error: Option<String>,
    create_loading: bool,
}

/// Where a write lands and which directory its remote call names.
struct Scope {
    key: String,
    directory: Option<String>,
}

impl Scope {
    /// Scope of an existing context key.
    fn of_key(key: String) -> Self {
        let directory = ContextKey::parse(&key)
            .path
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        Self { key, directory }
    }

    fn directory(&self) -> Option<&str> {
        self.directory.as_deref()
    }
}

impl SessionsState {
    /// Rebuild the aggregate of the project owning `key`.
    fn sync_aggregate(&mut self, key: &str) {
        let project_id = ContextKey::parse(key).project_id.to_string();
        self.rebuild_aggregate(&project_id);
    }

    /// The worktree context of `project_id` currently listing `session_id`.
    fn locate(&self, project_id: &str, session_id: &str) -> Option<String> {
        self.sessions
            .keys_with_prefix(&aggregate_prefix(project_id))
            .into_iter()
            .find(|key| self.sessions.find(key, session_id).is_some())
    }

    fn rebuild_aggregate(&mut self, project_id: &str) {
        let merged = self
            .sessions
            .concat_with_prefix(&aggregate_prefix(project_id));
        self.sessions.replace(project_id, merged);
    }

    fn update_session(&mut self, key: &str, id: &str, f: impl Fn(&mut Session)) {
        self.sessions.update_entity(key, id, &f);
        if let Some(current) = self.current.as_mut().filter(|s| s.id == id) {
            f(current);
        }
        self.sync_aggregate(key);
    }
}

pub struct SessionsStore {
    context: HubContext,
    state: Mutex<SessionsState>,
}

impl SessionsStore {
    pub fn new(context: HubContext) -> Self {
        Self {
            context,
            state: Mutex::new(SessionsState::default()),
        }
    }

    // =========================================================================
    // Selectors
    // =========================================================================

    /// Sessions of one context; `None` reads the project aggregate.
    pub fn sessions(&self, project_id: &str, directory: Option<&str>) -> Arc<Vec<Session>> {
        self.state
            .lock()
            .sessions
            .list(&context_key(project_id, directory))
    }

    pub fn has_context(&self, project_id: &str, directory: Option<&str>) -> bool {
        self.state
            .lock()
            .sessions
            .contains_key(&context_key(project_id, directory))
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state.lock().current.clone()
    }

    /// Whether the context is loading; `None` asks about any context of the project.
    pub fn is_loading(&self, project_id: &str, directory: Option<&str>) -> bool {
        let state = self.state.lock();
        match directory.filter(|d| !d.trim().is_empty()) {
            Some(directory) => {
                state
                    .sessions
                    .status(&context_key(project_id, Some(directory)))
                    .loading
            }
            None => state
                .sessions
                .keys_with_prefix(&aggregate_prefix(project_id))
                .iter()
                .any(|key| state.sessions.status(key).loading),
        }
    }

    pub fn create_loading(&self) -> bool {
        self.state.lock().create_loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn clear_error(&self) {
        self.state.lock().error = None;
    }

    // =========================================================================
    // Actions
    // =========================================================================

    pub async fn load_sessions(&self, project_id: &str, directory: Option<&str>) {
        let scope = self.scope(project_id, directory);
        let key = scope.key.as_str();
        self.state.lock().sessions.set_loading(key, true);

        let result = self.fetch(project_id, &scope).await;

        let mut state = self.state.lock();
        state.sessions.set_loading(key, false);
        match result {
            Ok(sessions) => {
                debug!(key = %key, count = sessions.len(), "Loaded sessions");
                state.sessions.replace(key, sessions);
                state.error = None;
                state.sync_aggregate(key);
            }
            Err(err) => {
                warn!(key = %key, "Failed to load sessions: {}", err);
                state.error = Some(err.message_or("Failed to load sessions"));
            }
        }
    }

    /// Create a session and select it. Failures are recorded and returned.
    pub async fn create_session(
        &self,
        project_id: &str,
        directory: Option<&str>,
        title: Option<&str>,
    ) -> StoreResult<Session> {
        let scope = self.scope(project_id, directory);
        let key = scope.key.as_str();
        self.state.lock().create_loading = true;

        let body = NewSession {
            title: title.map(str::to_string),
        };
        let result = async {
            let handle = self.context.project_client(project_id).await?;
            let session = handle
                .client()
                .create_session(scope.directory(), &body)
                .await?;
            if session.id.is_empty() {
                return Err(StoreError::ValidationFailed(
                    "Session created but has no ID".to_string(),
                ));
            }
            Ok(session)
        }
        .await;

        let mut state = self.state.lock();
        state.create_loading = false;
        match result {
            Ok(session) => {
                info!(key = %key, session_id = %session.id, "Created session");
                state.sessions.ensure_key(key);
                state.sessions.upsert(key, session.clone());
                state.current = Some(session.clone());
                state.error = None;
                state.sync_aggregate(key);
                Ok(session)
            }
            Err(err) => {
                warn!(key = %key, "Failed to create session: {}", err);
                state.error = Some(err.message_or("Failed to create session"));
                Err(err)
            }
        }
    }

    /// Optimistically patch a session. A session that is neither listed in
    /// the context nor selected is left alone without a remote call.
    ///
    /// Without a directory the session is looked up across the project's
    /// contexts.
    pub async fn update_session(
        &self,
        project_id: &str,
        directory: Option<&str>,
        session_id: &str,
        patch: SessionPatch,
    ) {
        let (scope, snapshot, previous_current) = {
            let mut state = self.state.lock();
            let scope = self.owning_scope(&state, project_id, directory, session_id);
            let key = scope.key.as_str();
            let listed = state.sessions.find(key, session_id).is_some();
            let selected = state.current.as_ref().is_some_and(|s| s.id == session_id);
            if !listed && !selected {
                debug!(key = %key, session_id, "Ignoring update of unknown session");
                return;
            }
            let snapshot = state.sessions.snapshot(key);
            let previous_current = state.current.clone();
            state.update_session(key, session_id, |s| patch.apply_to(s));
            state.error = None;
            (scope, snapshot, previous_current)
        };
        let key = scope.key.as_str();

        let result = async {
            let handle = self.context.project_client(project_id).await?;
            Ok::<_, StoreError>(
                handle
                    .client()
                    .update_session(session_id, scope.directory(), &patch)
                    .await?,
            )
        }
        .await;

        match result {
            Ok(session) => {
                debug!(key = %key, session_id, "Session updated");
                self.state
                    .lock()
                    .update_session(key, session_id, |s| *s = session.clone());
            }
            Err(err) => {
                warn!(key = %key, session_id, "Failed to update session: {}", err);
                self.revert(
                    project_id,
                    &scope,
                    snapshot,
                    previous_current,
                    err.message_or("Failed to update session"),
                )
                .await;
            }
        }
    }

    /// Optimistically delete a session, deselecting it if current.
    ///
    /// Without a directory the session is looked up across the project's
    /// contexts.
    pub async fn delete_session(&self, project_id: &str, directory: Option<&str>, session_id: &str) {
        let (scope, snapshot, previous_current) = {
            let mut state = self.state.lock();
            let scope = self.owning_scope(&state, project_id, directory, session_id);
            let key = scope.key.as_str();
            if state.sessions.find(key, session_id).is_none() {
                debug!(key = %key, session_id, "Ignoring delete of unknown session");
                return;
            }
            let snapshot = state.sessions.snapshot(key);
            let previous_current = state.current.clone();
            state.sessions.remove_entity(key, session_id);
            if state.current.as_ref().is_some_and(|s| s.id == session_id) {
                state.current = None;
            }
            state.error = None;
            state.sync_aggregate(key);
            (scope, snapshot, previous_current)
        };
        let key = scope.key.as_str();

        let result = async {
            let handle = self.context.project_client(project_id).await?;
            Ok::<_, StoreError>(
                handle
                    .client()
                    .delete_session(session_id, scope.directory())
                    .await?,
            )
        }
        .await;

        match result {
            Ok(()) => info!(key = %key, session_id, "Deleted session"),
            Err(err) => {
                warn!(key = %key, session_id, "Failed to delete session: {}", err);
                self.revert(
                    project_id,
                    &scope,
                    snapshot,
                    previous_current,
                    err.message_or("Failed to delete session"),
                )
                .await;
            }
        }
    }

    /// Select a session listed in the context, or clear the selection.
    pub fn select_session(
        &self,
        project_id: &str,
        directory: Option<&str>,
        session_id: Option<&str>,
    ) -> Option<Session> {
        let key = context_key(project_id, directory);
        let mut state = self.state.lock();
        let selected = session_id.and_then(|id| state.sessions.find(&key, id));
        state.current = selected.clone();
        selected
    }

    /// Drop a context's cached list, rebuilding the aggregate it fed.
    /// `None` drops every context of the project.
    pub fn forget_context(&self, project_id: &str, directory: Option<&str>) {
        let mut state = self.state.lock();
        let keys = match directory.filter(|d| !d.trim().is_empty()) {
            Some(directory) => vec![context_key(project_id, Some(directory))],
            None => state
                .sessions
                .keys_with_prefix(&aggregate_prefix(project_id)),
        };
        for key in &keys {
            state.sessions.remove_key(key);
        }
        state.rebuild_aggregate(project_id);
    }

    /// Recompute the `project_id` aggregate from its worktree contexts.
    ///
    /// With no worktree contexts the aggregate is an empty list, not absent.
    pub fn rebuild_aggregate(&self, project_id: &str) {
        self.state.lock().rebuild_aggregate(project_id);
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn revert(
        &self,
        project_id: &str,
        scope: &Scope,
        snapshot: Snapshot<Session>,
        previous_current: Option<Session>,
        message: String,
    ) {
        let key = scope.key.as_str();
        let canonical = self.fetch(project_id, scope).await;
        if let Err(err) = &canonical {
            warn!(key = %key, "Canonical reload failed, restoring snapshot: {}", err);
        }
        let reloaded = canonical.is_ok();

        let mut state = self.state.lock();
        state.sessions.revert(key, canonical, snapshot);
        let current = if reloaded {
            previous_current.map(|previous| {
                state
                    .sessions
                    .find(key, &previous.id)
                    .unwrap_or(previous)
            })
        } else {
            previous_current
        };
        state.current = current;
        state.error = Some(message);
        state.sync_aggregate(key);
    }

    async fn fetch(&self, project_id: &str, scope: &Scope) -> StoreResult<Vec<Session>> {
        let handle = self.context.project_client(project_id).await?;
        Ok(handle.client().list_sessions(scope.directory()).await?)
    }

    /// Context a directory-less or explicit write targets.
    fn scope(&self, project_id: &str, directory: Option<&str>) -> Scope {
        match self.context.scope_directory(project_id, directory) {
            Some(directory) => Scope {
                key: context_key(project_id, Some(&directory)),
                directory: Some(directory),
            },
            None => Scope {
                key: aggregate_prefix(project_id),
                directory: None,
            },
        }
    }

    /// Context holding `session_id` when no directory is given.
    fn owning_scope(
        &self,
        state: &SessionsState,
        project_id: &str,
        directory: Option<&str>,
        session_id: &str,
    ) -> Scope {
        if directory.is_some_and(|d| !d.trim().is_empty()) {
            return self.scope(project_id, directory);
        }
        match state.locate(project_id, session_id) {
            Some(key) => Scope::of_key(key),
            None => self.scope(project_id, None),
        }
    }
}
