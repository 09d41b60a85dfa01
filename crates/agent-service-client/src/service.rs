//! The RPC seam every store talks through.

use crate::error::AgentResult;
use crate::types::{
    Instance, NewProject, NewSession, NewWorktree, Project, ProjectPatch, ProviderCatalog,
    Session, SessionPatch, Worktree, WorktreePatch,
};
use async_trait::async_trait;

/// Remote agent service, as seen by one client handle.
///
/// Session and provider calls take an optional `directory` that scopes them
/// to a worktree; `None` means the handle's own project path.
#[async_trait]
pub trait AgentService: Send + Sync {
    async fn list_projects(&self) -> AgentResult<Vec<Project>>;
    async fn create_project(&self, body: &NewProject) -> AgentResult<Project>;
    async fn update_project(&self, project_id: &str, body: &ProjectPatch) -> AgentResult<Project>;
    async fn delete_project(&self, project_id: &str) -> AgentResult<()>;

    async fn start_instance(&self, project_id: &str) -> AgentResult<Instance>;
    async fn stop_instance(&self, project_id: &str) -> AgentResult<()>;
    /// `None` when the project has no instance.
    async fn instance_status(&self, project_id: &str) -> AgentResult<Option<Instance>>;

    async fn list_sessions(&self, directory: Option<&str>) -> AgentResult<Vec<Session>>;
    async fn create_session(
        &self,
        directory: Option<&str>,
        body: &NewSession,
    ) -> AgentResult<Session>;
    async fn update_session(
        &self,
        session_id: &str,
        directory: Option<&str>,
        body: &SessionPatch,
    ) -> AgentResult<Session>;
    async fn delete_session(&self, session_id: &str, directory: Option<&str>) -> AgentResult<()>;

    async fn list_worktrees(&self, project_id: &str) -> AgentResult<Vec<Worktree>>;
    async fn create_worktree(&self, project_id: &str, body: &NewWorktree)
        -> AgentResult<Worktree>;
    async fn update_worktree(
        &self,
        project_id: &str,
        worktree_id: &str,
        body: &WorktreePatch,
    ) -> AgentResult<Worktree>;
    async fn delete_worktree(&self, project_id: &str, worktree_id: &str) -> AgentResult<()>;

    /// `config.providers` query.
    async fn providers(&self, directory: Option<&str>) -> AgentResult<ProviderCatalog>;
}
