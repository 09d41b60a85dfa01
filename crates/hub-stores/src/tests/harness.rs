//! Scripted agent service shared by the store tests.

use crate::{Hub, HubContext};
use agent_service_client::{
    AgentError, AgentResult, AgentService, Instance, InstanceStatus, NewProject, NewSession,
    NewWorktree, Project, ProjectPatch, ProviderCatalog, Session, SessionPatch, SessionTime,
    Worktree, WorktreePatch,
};
use async_trait::async_trait;
use client_registry::{
    AddressDiscovery, ClientFactory, ClientRegistry, RegistryError, RegistryResult,
};
use hub_storage::{KeyValueStore, MemoryStorage, ProjectPersistence};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Default)]
struct MockState {
    projects: Vec<Project>,
    /// Sessions by directory; `""` is the service's own default directory.
    sessions: HashMap<String, Vec<Session>>,
    worktrees: HashMap<String, Vec<Worktree>>,
    instances: HashMap<String, Instance>,
    catalog: ProviderCatalog,
    /// (operation, argument filter, message)
    failures: Vec<(&'static str, Option<String>, String)>,
    calls: Vec<(&'static str, String)>,
    created_session: Option<Session>,
    next_id: usize,
    /// Project path of every handle the factory built, in order.
    bindings: Vec<String>,
}

/// In-memory agent service that records calls and can fail or block them.
///
/// Like the real service it trims names and titles, so reconciled values
/// can differ from the optimistic ones.
#[derive(Default)]
pub struct MockAgent {
    state: Mutex<MockState>,
    gates: Mutex<HashMap<&'static str, Arc<Semaphore>>>,
}

impl MockAgent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed_project(&self, id: &str, name: &str, status: Option<InstanceStatus>) {
        let mut state = self.state.lock();
        state.projects.push(Project {
            id: id.to_string(),
            name: name.to_string(),
            path: format!("/src/{}", id),
            last_opened: None,
            instance: None,
        });
        if let Some(status) = status {
            state
                .instances
                .insert(id.to_string(), instance(id, status));
        }
    }

    pub fn seed_session(&self, directory: &str, id: &str, title: &str) {
        let session = Session {
            id: id.to_string(),
            project_id: String::new(),
            directory: directory.to_string(),
            title: title.to_string(),
            version: "1".to_string(),
            time: SessionTime {
                created: 1,
                updated: 1,
            },
        };
        self.state
            .lock()
            .sessions
            .entry(directory.to_string())
            .or_default()
            .push(session);
    }

    pub fn seed_worktree(&self, project_id: &str, id: &str, title: &str) {
        self.state
            .lock()
            .worktrees
            .entry(project_id.to_string())
            .or_default()
            .push(Worktree {
                id: id.to_string(),
                path: format!("/src/{}/{}", project_id, id),
                title: title.to_string(),
            });
    }

    pub fn set_catalog(&self, catalog: ProviderCatalog) {
        self.state.lock().catalog = catalog;
    }

    /// Answer every create_session call with `session` verbatim.
    pub fn set_created_session(&self, session: Session) {
        self.state.lock().created_session = Some(session);
    }

    /// Make `op` fail with `message` until cleared.
    pub fn fail(&self, op: &'static str, message: &str) {
        self.state
            .lock()
            .failures
            .push((op, None, message.to_string()));
    }

    /// Make `op` fail only when called for `arg`.
    pub fn fail_for(&self, op: &'static str, arg: &str, message: &str) {
        self.state
            .lock()
            .failures
            .push((op, Some(arg.to_string()), message.to_string()));
    }

    pub fn clear_failure(&self, op: &'static str) {
        self.state.lock().failures.retain(|(o, _, _)| *o != op);
    }

    pub fn calls_to(&self, op: &str) -> usize {
        self.state.lock().calls.iter().filter(|(o, _)| *o == op).count()
    }

    pub fn call_args(&self, op: &str) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|(o, _)| *o == op)
            .map(|(_, arg)| arg.clone())
            .collect()
    }

    pub fn bindings(&self) -> Vec<String> {
        self.state.lock().bindings.clone()
    }

    /// Block `op` until [`MockAgent::release`] hands out permits.
    pub fn hold(&self, op: &'static str) {
        self.gates.lock().insert(op, Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, op: &'static str, calls: usize) {
        if let Some(gate) = self.gates.lock().get(op) {
            gate.add_permits(calls);
        }
    }

    async fn enter(&self, op: &'static str, arg: &str) -> AgentResult<()> {
        self.state.lock().calls.push((op, arg.to_string()));
        let gate = self.gates.lock().get(op).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        let state = self.state.lock();
        let failure = state
            .failures
            .iter()
            .find(|(o, filter, _)| *o == op && filter.as_deref().map_or(true, |f| f == arg));
        match failure {
            Some((_, _, message)) => Err(AgentError::Status {
                status: 500,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state.lock();
        state.next_id += 1;
        format!("{}{}", prefix, state.next_id)
    }
}

pub fn instance(project_id: &str, status: InstanceStatus) -> Instance {
    Instance {
        id: format!("inst-{}", project_id),
        port: 4100,
        status,
        started_at: 1,
    }
}

fn not_found(what: &str) -> AgentError {
    AgentError::Status {
        status: 404,
        message: format!("{} not found", what),
    }
}

#[async_trait]
impl AgentService for MockAgent {
    async fn list_projects(&self) -> AgentResult<Vec<Project>> {
        self.enter("list_projects", "").await?;
        let state = self.state.lock();
        Ok(state
            .projects
            .iter()
            .cloned()
            .map(|mut p| {
                p.instance = state.instances.get(&p.id).cloned();
                p
            })
            .collect())
    }

    async fn create_project(&self, body: &NewProject) -> AgentResult<Project> {
        self.enter("create_project", &body.name).await?;
        let project = Project {
            id: self.next_id("p"),
            name: body.name.trim().to_string(),
            path: body.path.clone(),
            last_opened: None,
            instance: None,
        };
        self.state.lock().projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(&self, project_id: &str, body: &ProjectPatch) -> AgentResult<Project> {
        self.enter("update_project", project_id).await?;
        let mut state = self.state.lock();
        let project = state
            .projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| not_found("Project"))?;
        body.apply_to(project);
        project.name = project.name.trim().to_string();
        Ok(project.clone())
    }

    async fn delete_project(&self, project_id: &str) -> AgentResult<()> {
        self.enter("delete_project", project_id).await?;
        self.state.lock().projects.retain(|p| p.id != project_id);
        Ok(())
    }

    async fn start_instance(&self, project_id: &str) -> AgentResult<Instance> {
        self.enter("start_instance", project_id).await?;
        let started = instance(project_id, InstanceStatus::Running);
        self.state
            .lock()
            .instances
            .insert(project_id.to_string(), started.clone());
        Ok(started)
    }

    async fn stop_instance(&self, project_id: &str) -> AgentResult<()> {
        self.enter("stop_instance", project_id).await?;
        self.state.lock().instances.remove(project_id);
        Ok(())
    }

    async fn instance_status(&self, project_id: &str) -> AgentResult<Option<Instance>> {
        self.enter("instance_status", project_id).await?;
        Ok(self.state.lock().instances.get(project_id).cloned())
    }

    async fn list_sessions(&self, directory: Option<&str>) -> AgentResult<Vec<Session>> {
        let directory = directory.unwrap_or_default();
        self.enter("list_sessions", directory).await?;
        Ok(self
            .state
            .lock()
            .sessions
            .get(directory)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_session(
        &self,
        directory: Option<&str>,
        body: &NewSession,
    ) -> AgentResult<Session> {
        let directory = directory.unwrap_or_default();
        self.enter("create_session", directory).await?;
        if let Some(session) = self.state.lock().created_session.clone() {
            return Ok(session);
        }
        let session = Session {
            id: self.next_id("s"),
            project_id: String::new(),
            directory: directory.to_string(),
            title: body
                .title
                .as_deref()
                .map(str::trim)
                .unwrap_or("Untitled")
                .to_string(),
            version: "1".to_string(),
            time: SessionTime {
                created: 2,
                updated: 2,
            },
        };
        self.state
            .lock()
            .sessions
            .entry(directory.to_string())
            .or_default()
            .push(session.clone());
        Ok(session)
    }

    async fn update_session(
        &self,
        session_id: &str,
        directory: Option<&str>,
        body: &SessionPatch,
    ) -> AgentResult<Session> {
        let directory = directory.unwrap_or_default();
        self.enter("update_session", session_id).await?;
        let mut state = self.state.lock();
        let session = state
            .sessions
            .get_mut(directory)
            .and_then(|list| list.iter_mut().find(|s| s.id == session_id))
            .ok_or_else(|| not_found("Session"))?;
        body.apply_to(session);
        session.title = session.title.trim().to_string();
        session.time.updated += 1;
        Ok(session.clone())
    }

    async fn delete_session(&self, session_id: &str, directory: Option<&str>) -> AgentResult<()> {
        let directory = directory.unwrap_or_default();
        self.enter("delete_session", session_id).await?;
        if let Some(list) = self.state.lock().sessions.get_mut(directory) {
            list.retain(|s| s.id != session_id);
        }
        Ok(())
    }

    async fn list_worktrees(&self, project_id: &str) -> AgentResult<Vec<Worktree>> {
        self.enter("list_worktrees", project_id).await?;
        Ok(self
            .state
            .lock()
            .worktrees
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_worktree(
        &self,
        project_id: &str,
        body: &NewWorktree,
    ) -> AgentResult<Worktree> {
        self.enter("create_worktree", project_id).await?;
        let id = self.next_id("w");
        let worktree = Worktree {
            path: format!("/src/{}/{}", project_id, id),
            id,
            title: body.title.trim().to_string(),
        };
        self.state
            .lock()
            .worktrees
            .entry(project_id.to_string())
            .or_default()
            .push(worktree.clone());
        Ok(worktree)
    }

    async fn update_worktree(
        &self,
        project_id: &str,
        worktree_id: &str,
        body: &WorktreePatch,
    ) -> AgentResult<Worktree> {
        self.enter("update_worktree", worktree_id).await?;
        let mut state = self.state.lock();
        let worktree = state
            .worktrees
            .get_mut(project_id)
            .and_then(|list| list.iter_mut().find(|w| w.id == worktree_id))
            .ok_or_else(|| not_found("Worktree"))?;
        body.apply_to(worktree);
        worktree.title = worktree.title.trim().to_string();
        Ok(worktree.clone())
    }

    async fn delete_worktree(&self, project_id: &str, worktree_id: &str) -> AgentResult<()> {
        self.enter("delete_worktree", worktree_id).await?;
        if let Some(list) = self.state.lock().worktrees.get_mut(project_id) {
            list.retain(|w| w.id != worktree_id);
        }
        Ok(())
    }

    async fn providers(&self, directory: Option<&str>) -> AgentResult<ProviderCatalog> {
        self.enter("providers", directory.unwrap_or_default()).await?;
        Ok(self.state.lock().catalog.clone())
    }
}

/// A handle onto the shared [`MockAgent`] bound to one project path.
///
/// Session and provider calls without a directory use the bound path, the
/// same way [`agent_service_client::HttpAgentClient`] does.
struct BoundAgent {
    agent: Arc<MockAgent>,
    project_path: String,
}

impl BoundAgent {
    fn directory<'a>(&'a self, directory: Option<&'a str>) -> Option<&'a str> {
        directory
            .filter(|d| !d.is_empty())
            .or_else(|| Some(self.project_path.as_str()).filter(|p| !p.is_empty()))
    }
}

#[async_trait]
impl AgentService for BoundAgent {
    async fn list_projects(&self) -> AgentResult<Vec<Project>> {
        self.agent.list_projects().await
    }

    async fn create_project(&self, body: &NewProject) -> AgentResult<Project> {
        self.agent.create_project(body).await
    }

    async fn update_project(&self, project_id: &str, body: &ProjectPatch) -> AgentResult<Project> {
        self.agent.update_project(project_id, body).await
    }

    async fn delete_project(&self, project_id: &str) -> AgentResult<()> {
        self.agent.delete_project(project_id).await
    }

    async fn start_instance(&self, project_id: &str) -> AgentResult<Instance> {
        self.agent.start_instance(project_id).await
    }

    async fn stop_instance(&self, project_id: &str) -> AgentResult<()> {
        self.agent.stop_instance(project_id).await
    }

    async fn instance_status(&self, project_id: &str) -> AgentResult<Option<Instance>> {
        self.agent.instance_status(project_id).await
    }

    async fn list_sessions(&self, directory: Option<&str>) -> AgentResult<Vec<Session>> {
        self.agent.list_sessions(self.directory(directory)).await
    }

    async fn create_session(
        &self,
        directory: Option<&str>,
        body: &NewSession,
    ) -> AgentResult<Session> {
        self.agent.create_session(self.directory(directory), body).await
    }

    async fn update_session(
        &self,
        session_id: &str,
        directory: Option<&str>,
        body: &SessionPatch,
    ) -> AgentResult<Session> {
        self.agent
            .update_session(session_id, self.directory(directory), body)
            .await
    }

    async fn delete_session(&self, session_id: &str, directory: Option<&str>) -> AgentResult<()> {
        self.agent
            .delete_session(session_id, self.directory(directory))
            .await
    }

    async fn list_worktrees(&self, project_id: &str) -> AgentResult<Vec<Worktree>> {
        self.agent.list_worktrees(project_id).await
    }

    async fn create_worktree(
        &self,
        project_id: &str,
        body: &NewWorktree,
    ) -> AgentResult<Worktree> {
        self.agent.create_worktree(project_id, body).await
    }

    async fn update_worktree(
        &self,
        project_id: &str,
        worktree_id: &str,
        body: &WorktreePatch,
    ) -> AgentResult<Worktree> {
        self.agent
            .update_worktree(project_id, worktree_id, body)
            .await
    }

    async fn delete_worktree(&self, project_id: &str, worktree_id: &str) -> AgentResult<()> {
        self.agent.delete_worktree(project_id, worktree_id).await
    }

    async fn providers(&self, directory: Option<&str>) -> AgentResult<ProviderCatalog> {
        self.agent.providers(self.directory(directory)).await
    }
}

/// Binds handles onto one shared [`MockAgent`], recording each bound path.
pub struct MockFactory {
    agent: Arc<MockAgent>,
}

impl MockFactory {
    pub fn new(agent: Arc<MockAgent>) -> Self {
        Self { agent }
    }
}

impl ClientFactory for MockFactory {
    fn connect(&self, _base_url: &str, project_path: &str) -> AgentResult<Arc<dyn AgentService>> {
        self.agent
            .state
            .lock()
            .bindings
            .push(project_path.to_string());
        Ok(Arc::new(BoundAgent {
            agent: self.agent.clone(),
            project_path: project_path.to_string(),
        }))
    }
}

/// Discovery that always answers the same way.
pub struct StaticDiscovery {
    result: RegistryResult<String>,
}

impl StaticDiscovery {
    pub fn ok() -> Self {
        Self {
            result: Ok("http://127.0.0.1:4096".to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(RegistryError::BackendUnreachable(message.to_string())),
        }
    }
}

#[async_trait]
impl AddressDiscovery for StaticDiscovery {
    async fn discover(&self) -> RegistryResult<String> {
        self.result.clone()
    }
}

pub fn context(agent: &Arc<MockAgent>) -> HubContext {
    let registry = ClientRegistry::new(
        Arc::new(StaticDiscovery::ok()),
        Arc::new(MockFactory::new(agent.clone())),
    );
    HubContext::new(Arc::new(registry))
}

pub fn hub(agent: &Arc<MockAgent>) -> Hub {
    Hub::new(context(agent))
}

/// Hub persisting projects into `storage`.
pub fn hub_with_storage(agent: &Arc<MockAgent>, storage: Arc<MemoryStorage>) -> Hub {
    let storage: Arc<dyn KeyValueStore> = storage;
    Hub::new(context(agent).with_persistence(ProjectPersistence::new(storage)))
}

/// Hub whose discovery always fails.
pub fn unreachable_hub(agent: &Arc<MockAgent>, message: &str) -> Hub {
    let registry = ClientRegistry::new(
        Arc::new(StaticDiscovery::failing(message)),
        Arc::new(MockFactory::new(agent.clone())),
    );
    Hub::new(HubContext::new(Arc::new(registry)))
}
