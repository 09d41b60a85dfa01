//! HTTP implementation of [`AgentService`].

use crate::error::{AgentError, AgentResult};
use crate::service::AgentService;
use crate::types::{
    Instance, NewProject, NewSession, NewWorktree, Project, ProjectPatch, ProviderCatalog,
    Session, SessionPatch, Worktree, WorktreePatch,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};
use url::Url;

/// Agent service client bound to one backend address and project path.
#[derive(Clone)]
pub struct HttpAgentClient {
    http_client: reqwest::Client,
    base_url: Url,
    project_path: String,
}

impl HttpAgentClient {
    /// Create a client for `base_url`.
    ///
    /// `project_path` is sent as the `directory` query of session and
    /// provider calls that do not name one explicitly.
    pub fn new(
        http_client: reqwest::Client,
        base_url: &str,
        project_path: impl Into<String>,
    ) -> AgentResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AgentError::Config(format!("invalid base url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AgentError::Config(format!(
                "base url {} cannot carry a path",
                base_url
            )));
        }
        Ok(Self {
            http_client,
            base_url,
            project_path: project_path.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn project_path(&self) -> &str {
        &self.project_path
    }

    /// Build `base_url/segment/segment...` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Resolve the `directory` query value for a scoped call.
    fn directory<'a>(&'a self, directory: Option<&'a str>) -> Option<&'a str> {
        directory
            .filter(|d| !d.is_empty())
            .or_else(|| Some(self.project_path.as_str()).filter(|p| !p.is_empty()))
    }

    fn scoped(&self, mut url: Url, directory: Option<&str>) -> Url {
        if let Some(directory) = self.directory(directory) {
            url.query_pairs_mut().append_pair("directory", directory);
        }
        url
    }

    // =========================================================================
    // HTTP helpers
    // =========================================================================

    async fn get<T: DeserializeOwned>(&self, url: Url) -> AgentResult<T> {
        debug!(%url, "GET");
        let response = self.http_client.get(url).send().await?;
        Self::decode(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> AgentResult<T> {
        debug!(%url, "POST");
        let response = self.http_client.post(url).json(body).send().await?;
        Self::decode(response).await
    }

    async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> AgentResult<T> {
        debug!(%url, "PATCH");
        let response = self.http_client.patch(url).json(body).send().await?;
        Self::decode(response).await
    }

    async fn delete(&self, url: Url) -> AgentResult<()> {
        debug!(%url, "DELETE");
        let response = self.http_client.delete(url).send().await?;
        Self::check(response).await.map(|_| ())
    }

    async fn check(response: reqwest::Response) -> AgentResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), "Agent service request failed: {}", body);
        Err(AgentError::Status {
            status: status.as_u16(),
            message: extract_error_message(&body),
        })
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> AgentResult<T> {
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Pull a human-readable message out of an error response body.
///
/// Understands `{"error": "..."}`, `{"error": {"message": "..."}}`,
/// `{"message": "..."}` and `{"data": {"message": "..."}}`; anything else
/// is returned as trimmed text.
pub fn extract_error_message(body: &str) -> String {
    let trimmed = body.trim();
    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return trimmed.to_string();
    };

    let candidates = [
        value.get("error").and_then(|v| v.as_str()),
        value
            .get("error")
            .and_then(|v| v.get("message"))
            .and_then(|v| v.as_str()),
        value.get("message").and_then(|v| v.as_str()),
        value
            .get("data")
            .and_then(|v| v.get("message"))
            .and_then(|v| v.as_str()),
    ];

    let message = candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|m| !m.is_empty())
        .map(String::from)
        .unwrap_or_default();
    message
}

#[async_trait]
impl AgentService for HttpAgentClient {
    async fn list_projects(&self) -> AgentResult<Vec<Project>> {
        self.get(self.endpoint(&["project"])).await
    }

    async fn create_project(&self, body: &NewProject) -> AgentResult<Project> {
        self.post(self.endpoint(&["project"]), body).await
    }

    async fn update_project(&self, project_id: &str, body: &ProjectPatch) -> AgentResult<Project> {
        self.patch(self.endpoint(&["project", project_id]), body).await
    }

    async fn delete_project(&self, project_id: &str) -> AgentResult<()> {
        self.delete(self.endpoint(&["project", project_id])).await
    }

    async fn start_instance(&self, project_id: &str) -> AgentResult<Instance> {
        self.post(
            self.endpoint(&["project", project_id, "instance"]),
            &serde_json::json!({}),
        )
        .await
    }

    async fn stop_instance(&self, project_id: &str) -> AgentResult<()> {
        self.delete(self.endpoint(&["project", project_id, "instance"]))
            .await
    }

    async fn instance_status(&self, project_id: &str) -> AgentResult<Option<Instance>> {
        match self
            .get(self.endpoint(&["project", project_id, "instance"]))
            .await
        {
            Err(AgentError::Status { status: 404, .. }) => Ok(None),
            other => other,
        }
    }

    async fn list_sessions(&self, directory: Option<&str>) -> AgentResult<Vec<Session>> {
        self.get(self.scoped(self.endpoint(&["session"]), directory))
            .await
    }

    async fn create_session(
        &self,
        directory: Option<&str>,
        body: &NewSession,
    ) -> AgentResult<Session> {
        self.post(self.scoped(self.endpoint(&["session"]), directory), body)
            .await
    }

    async fn update_session(
        &self,
        session_id: &str,
        directory: Option<&str>,
        body: &SessionPatch,
    ) -> AgentResult<Session> {
        self.patch(
            self.scoped(self.endpoint(&["session", session_id]), directory),
            body,
        )
        .await
    }

    async fn delete_session(&self, session_id: &str, directory: Option<&str>) -> AgentResult<()> {
        self.delete(self.scoped(self.endpoint(&["session", session_id]), directory))
            .await
    }

    async fn list_worktrees(&self, project_id: &str) -> AgentResult<Vec<Worktree>> {
        self.get(self.endpoint(&["project", project_id, "worktree"]))
            .await
    }

    async fn create_worktree(
        &self,
        project_id: &str,
        body: &NewWorktree,
    ) -> AgentResult<Worktree> {
        self.post(self.endpoint(&["project", project_id, "worktree"]), body)
            .await
    }

    async fn update_worktree(
        &self,
        project_id: &str,
        worktree_id: &str,
        body: &WorktreePatch,
    ) -> AgentResult<Worktree> {
        self.patch(
            self.endpoint(&["project", project_id, "worktree", worktree_id]),
            body,
        )
        .await
    }

    async fn delete_worktree(&self, project_id: &str, worktree_id: &str) -> AgentResult<()> {
        self.delete(self.endpoint(&["project", project_id, "worktree", worktree_id]))
            .await
    }

    async fn providers(&self, directory: Option<&str>) -> AgentResult<ProviderCatalog> {
        self.get(self.scoped(self.endpoint(&["config", "providers"]), directory))
            .await
    }
}

impl std::fmt::Debug for HttpAgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAgentClient")
            .field("base_url", &self.base_url.as_str())
            .field("project_path", &self.project_path)
            .finish_non_exhaustive()
    }
}
