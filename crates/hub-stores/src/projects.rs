//! Projects store: the project list, the current selection, and the
//! lifecycle of each project's agent instance.
//!
//! Start and stop run under the [`OperationLockSet`]; a request for a project
//! whose lifecycle call is still outstanding is dropped.

use crate::error::{StoreError, StoreResult};
use crate::keyed::{KeyedCollection, Snapshot};
use crate::locks::OperationLockSet;
use crate::HubContext;
use agent_service_client::{Instance, InstanceStatus, NewProject, Project, ProjectPatch};
use chrono::Utc;
use client_registry::ClientHandle;
use futures_util::future::join_all;
use hub_storage::PersistedProjects;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The store keeps a single list under this key.
const ALL: &str = "projects";

#[derive(Default)]
struct ProjectsState {
    projects: KeyedCollection<Project>,
    current: Option<Project>,
    instance_errors: HashMap<String, String>,
}

impl ProjectsState {
    /// A project known either from the list or as the current selection.
    fn lookup(&self, id: &str) -> Option<Project> {
        self.projects
            .find(ALL, id)
            .or_else(|| self.current.clone().filter(|p| p.id == id))
    }

    /// Apply `f` to the listed project and, if selected, the current project.
    fn update_project(&mut self, id: &str, f: impl Fn(&mut Project)) {
        self.projects.update_entity(ALL, id, &f);
        if let Some(current) = self.current.as_mut().filter(|p| p.id == id) {
            f(current);
        }
    }

    fn set_instance(&mut self, id: &str, instance: Option<Instance>) {
        self.update_project(id, |p| p.instance = instance.clone());
    }

    fn set_instance_status(&mut self, id: &str, status: InstanceStatus) {
        self.update_project(id, |p| {
            if let Some(instance) = p.instance.as_mut() {
                instance.status = status;
            }
        });
    }

    fn persisted(&self) -> PersistedProjects {
        PersistedProjects {
            projects: self.projects.list(ALL).as_ref().clone(),
            current_project: self.current.clone(),
        }
    }
}

pub struct ProjectsStore {
    context: HubContext,
    state: Mutex<ProjectsState>,
    locks: OperationLockSet,
}

impl ProjectsStore {
    /// Build the store, restoring the persisted list and selection if any.
    pub fn new(context: HubContext) -> Self {
        let mut state = ProjectsState::default();
        state.projects.ensure_key(ALL);
        if let Some(persistence) = context.persistence() {
            let restored = persistence.restore();
            state.projects.replace(ALL, restored.projects);
            state.current = restored.current_project;
        }
        let store = Self {
            context,
            state: Mutex::new(state),
            locks: OperationLockSet::new(),
        };
        let snapshot = store.state.lock().persisted();
        store.publish_paths(&snapshot);
        store
    }

    // =========================================================================
    // Selectors
    // =========================================================================

    pub fn projects(&self) -> Arc<Vec<Project>> {
        self.state.lock().projects.list(ALL)
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        self.state.lock().lookup(id)
    }

    pub fn current_project(&self) -> Option<Project> {
        self.state.lock().current.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().projects.status(ALL).loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().projects.status(ALL).error
    }

    pub fn instance_error(&self, id: &str) -> Option<String> {
        self.state.lock().instance_errors.get(id).cloned()
    }

    /// Whether a start or stop is outstanding for `id`.
    pub fn is_operation_pending(&self, id: &str) -> bool {
        self.locks.is_locked(id)
    }

    pub fn clear_error(&self) {
        self.state.lock().projects.set_error(ALL, None);
    }

    pub fn clear_instance_error(&self, id: &str) {
        self.state.lock().instance_errors.remove(id);
    }

    // =========================================================================
    // List and selection
    // =========================================================================

    pub async fn load_projects(&self) {
        self.state.lock().projects.set_loading(ALL, true);
        let result = self.fetch_projects().await;
        {
            let mut state = self.state.lock();
            state.projects.set_loading(ALL, false);
            match result {
                Ok(projects) => {
                    debug!(count = projects.len(), "Loaded projects");
                    state.projects.replace(ALL, projects);
                    state.projects.set_error(ALL, None);
                    let current = state
                        .current
                        .as_ref()
                        .and_then(|p| state.projects.find(ALL, &p.id));
                    state.current = current;
                }
                Err(err) => {
                    warn!("Failed to load projects: {}", err);
                    state
                        .projects
                        .set_error(ALL, Some(err.message_or("Failed to load projects")));
                    return;
                }
            }
        }
        self.publish();
    }

    /// Select `id` and stamp its `last_opened`. An unknown id clears the selection.
    pub fn select_project(&self, id: &str) -> Option<Project> {
        let selected = {
            let mut state = self.state.lock();
            if state.projects.find(ALL, id).is_some() {
                let now = Utc::now().timestamp_millis();
                state.update_project(id, |p| p.last_opened = Some(now));
                state.current = state.projects.find(ALL, id);
            } else {
                debug!(project_id = id, "Clearing selection for unknown project");
                state.current = None;
            }
            state.current.clone()
        };
        self.publish();
        selected
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Create a project and select it. Failures are recorded and returned.
    pub async fn create_project(&self, body: NewProject) -> StoreResult<Project> {
        let result = self.create_remote(&body).await;
        match result {
            Ok(project) => {
                {
                    let mut state = self.state.lock();
                    state.projects.upsert(ALL, project.clone());
                    state.current = Some(project.clone());
                    state.projects.set_error(ALL, None);
                }
                info!(project_id = %project.id, name = %project.name, "Created project");
                self.publish();
                Ok(project)
            }
            Err(err) => {
                warn!(name = %body.name, "Failed to create project: {}", err);
                self.state
                    .lock()
                    .projects
                    .set_error(ALL, Some(err.message_or("Failed to create project")));
                Err(err)
            }
        }
    }

    async fn create_remote(&self, body: &NewProject) -> StoreResult<Project> {
        let handle = self.context.service_client().await?;
        let project = handle.client().create_project(body).await?;
        if project.id.is_empty() {
            return Err(StoreError::ValidationFailed(
                "Project created but has no ID".to_string(),
            ));
        }
        Ok(project)
    }

    /// Optimistically patch a project. A project that is neither listed nor
    /// selected is left alone without a remote call.
    pub async fn update_project(&self, id: &str, patch: ProjectPatch) {
        let (target, snapshot, previous_current) = {
            let mut state = self.state.lock();
            let Some(target) = state.lookup(id) else {
                debug!(project_id = id, "Ignoring update of unknown project");
                return;
            };
            let snapshot = state.projects.snapshot(ALL);
            let previous_current = state.current.clone();
            state.update_project(id, |p| patch.apply_to(p));
            state.projects.set_error(ALL, None);
            (target, snapshot, previous_current)
        };

        let result = async {
            let handle = self.client_for(&target).await?;
            Ok::<_, StoreError>(handle.client().update_project(id, &patch).await?)
        }
        .await;

        match result {
            Ok(project) => {
                debug!(project_id = id, "Project updated");
                self.state
                    .lock()
                    .update_project(id, |p| *p = project.clone());
            }
            Err(err) => {
                warn!(project_id = id, "Failed to update project: {}", err);
                self.revert(snapshot, previous_current, err.message_or("Update failed"))
                    .await;
            }
        }
        self.publish();
    }

    /// Optimistically remove a project, deselecting it if current.
    pub async fn remove_project(&self, id: &str) {
        let (target, snapshot, previous_current) = {
            let mut state = self.state.lock();
            let Some(target) = state.lookup(id) else {
                debug!(project_id = id, "Ignoring removal of unknown project");
                return;
            };
            let snapshot = state.projects.snapshot(ALL);
            let previous_current = state.current.clone();
            state.projects.remove_entity(ALL, id);
            if state.current.as_ref().is_some_and(|p| p.id == id) {
                state.current = None;
            }
            state.instance_errors.remove(id);
            state.projects.set_error(ALL, None);
            (target, snapshot, previous_current)
        };

        let result = async {
            let handle = self.client_for(&target).await?;
            Ok::<_, StoreError>(handle.client().delete_project(id).await?)
        }
        .await;

        match result {
            Ok(()) => info!(project_id = id, "Removed project"),
            Err(err) => {
                warn!(project_id = id, "Failed to remove project: {}", err);
                self.revert(
                    snapshot,
                    previous_current,
                    err.message_or("Failed to remove project"),
                )
                .await;
            }
        }
        self.publish();
    }

    /// Replace local state with the server's list after a failed write.
    async fn revert(
        &self,
        snapshot: Snapshot<Project>,
        previous_current: Option<Project>,
        message: String,
    ) {
        let canonical = self.fetch_projects().await;
        if let Err(err) = &canonical {
            warn!("Canonical reload failed, restoring snapshot: {}", err);
        }
        let reloaded = canonical.is_ok();

        let mut state = self.state.lock();
        state.projects.revert(ALL, canonical, snapshot);
        let current = if reloaded {
            previous_current.and_then(|p| state.projects.find(ALL, &p.id))
        } else {
            previous_current
        };
        state.current = current;
        state.projects.set_error(ALL, Some(message));
    }

    // =========================================================================
    // Instance lifecycle
    // =========================================================================

    pub async fn start_instance(&self, id: &str) {
        match self.start_locked(id).await {
            Ok(()) => {}
            Err(StoreError::ConcurrencyRejected(_)) => {
                debug!(project_id = id, "Start dropped, operation in progress");
            }
            Err(err) => {
                self.state
                    .lock()
                    .projects
                    .set_error(ALL, Some(err.message_or("Failed to start instance")));
            }
        }
    }

    pub async fn stop_instance(&self, id: &str) {
        match self.stop_locked(id).await {
            Ok(()) => {}
            Err(StoreError::ConcurrencyRejected(_)) => {
                debug!(project_id = id, "Stop dropped, operation in progress");
            }
            Err(err) => {
                self.state
                    .lock()
                    .projects
                    .set_error(ALL, Some(err.message_or("Failed to stop instance")));
            }
        }
    }

    async fn start_locked(&self, id: &str) -> StoreResult<()> {
        let _guard = self.locks.try_acquire(id)?;
        let project = {
            let mut state = self.state.lock();
            let Some(project) = state.lookup(id) else {
                debug!(project_id = id, "Ignoring start of unknown project");
                return Ok(());
            };
            let active = project.instance.as_ref().is_some_and(|i| {
                matches!(i.status, InstanceStatus::Starting | InstanceStatus::Running)
            });
            if active {
                debug!(project_id = id, "Instance already starting or running");
                return Ok(());
            }
            let placeholder = Instance {
                id: project
                    .instance
                    .as_ref()
                    .map(|i| i.id.clone())
                    .unwrap_or_default(),
                port: project.instance.as_ref().map(|i| i.port).unwrap_or(0),
                status: InstanceStatus::Starting,
                started_at: Utc::now().timestamp_millis(),
            };
            state.set_instance(id, Some(placeholder));
            state.instance_errors.remove(id);
            project
        };

        let result = async {
            let handle = self.client_for(&project).await?;
            Ok::<_, StoreError>(handle.client().start_instance(id).await?)
        }
        .await;

        let outcome = {
            let mut state = self.state.lock();
            match result {
                Ok(instance) => {
                    info!(project_id = id, port = instance.port, "Instance started");
                    state.set_instance(id, Some(instance));
                    Ok(())
                }
                Err(err) => {
                    warn!(project_id = id, "Failed to start instance: {}", err);
                    state.set_instance_status(id, InstanceStatus::Error);
                    state
                        .instance_errors
                        .insert(id.to_string(), err.message_or("Failed to start instance"));
                    Err(err)
                }
            }
        };
        self.publish();
        outcome
    }

    async fn stop_locked(&self, id: &str) -> StoreResult<()> {
        let _guard = self.locks.try_acquire(id)?;
        let project = {
            let mut state = self.state.lock();
            let Some(project) = state.lookup(id) else {
                debug!(project_id = id, "Ignoring stop of unknown project");
                return Ok(());
            };
            state.set_instance_status(id, InstanceStatus::Stopped);
            state.instance_errors.remove(id);
            project
        };

        let result = async {
            let handle = self.client_for(&project).await?;
            Ok::<_, StoreError>(handle.client().stop_instance(id).await?)
        }
        .await;

        let outcome = match result {
            Ok(()) => {
                info!(project_id = id, "Instance stopped");
                self.state.lock().set_instance(id, None);
                Ok(())
            }
            Err(err) => {
                warn!(project_id = id, "Failed to stop instance: {}", err);
                self.state
                    .lock()
                    .instance_errors
                    .insert(id.to_string(), err.message_or("Failed to stop instance"));
                if let Err(refresh_err) = self.refresh_status_of(&project).await {
                    warn!(project_id = id, "Status refresh after failed stop: {}", refresh_err);
                }
                Err(err)
            }
        };
        self.publish();
        outcome
    }

    /// Read the instance record of `id` from the server.
    ///
    /// Skipped while a lifecycle call for it is outstanding.
    pub async fn refresh_instance_status(&self, id: &str) {
        if self.locks.is_locked(id) {
            debug!(project_id = id, "Skipping status refresh, operation in progress");
            return;
        }
        let Some(project) = self.project(id) else {
            return;
        };
        match self.refresh_status_of(&project).await {
            Ok(()) => {
                self.state.lock().instance_errors.remove(id);
            }
            Err(err) => {
                warn!(project_id = id, "Failed to refresh instance status: {}", err);
                self.state.lock().instance_errors.insert(
                    id.to_string(),
                    err.message_or("Failed to refresh instance status"),
                );
            }
        }
        self.publish();
    }

    async fn refresh_status_of(&self, project: &Project) -> StoreResult<()> {
        let handle = self.client_for(project).await?;
        let instance = handle.client().instance_status(&project.id).await?;
        self.state.lock().set_instance(&project.id, instance);
        Ok(())
    }

    /// Refresh every listed project. Each failure only touches its own project.
    pub async fn refresh_all_instance_statuses(&self) {
        let ids: Vec<String> = self.projects().iter().map(|p| p.id.clone()).collect();
        join_all(ids.iter().map(|id| self.refresh_instance_status(id))).await;
    }

    /// Stop every running instance. Returns how many stops succeeded.
    pub async fn stop_all_instances(&self) -> usize {
        let running: Vec<String> = self
            .projects()
            .iter()
            .filter(|p| {
                p.instance
                    .as_ref()
                    .is_some_and(|i| i.status == InstanceStatus::Running)
            })
            .map(|p| p.id.clone())
            .collect();
        info!(count = running.len(), "Stopping running instances");

        let results = join_all(running.iter().map(|id| self.stop_locked(id))).await;
        results.iter().filter(|result| result.is_ok()).count()
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn fetch_projects(&self) -> StoreResult<Vec<Project>> {
        let handle = self.context.service_client().await?;
        Ok(handle.client().list_projects().await?)
    }

    async fn client_for(&self, project: &Project) -> StoreResult<Arc<ClientHandle>> {
        self.context.project_client(&project.id).await
    }

    fn publish_paths(&self, snapshot: &PersistedProjects) {
        self.context.set_project_paths(
            snapshot
                .projects
                .iter()
                .chain(snapshot.current_project.iter()),
        );
    }

    /// Share project paths with the other stores and save the projection.
    fn publish(&self) {
        let snapshot = self.state.lock().persisted();
        self.publish_paths(&snapshot);
        let Some(persistence) = self.context.persistence() else {
            return;
        };
        if let Err(err) = persistence.save(&snapshot) {
            warn!("Failed to persist projects: {}", err);
        }
    }
}
