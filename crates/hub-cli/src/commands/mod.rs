//! CLI command implementations.
//!
//! Commands drive the stores exactly as a UI would: the store records
//! failures in its error state, and the command turns a recorded error
//! into a non-zero exit.

mod projects;
mod providers;
mod sessions;
mod worktrees;

pub use projects::{
    projects_create, projects_list, projects_remove, projects_select, projects_start,
    projects_status, projects_stop, projects_stop_all,
};
pub use providers::providers_show;
pub use sessions::{sessions_create, sessions_delete, sessions_list, sessions_rename};
pub use worktrees::{worktrees_create, worktrees_list, worktrees_remove};

use agent_service_client::Project;
use anyhow::Result;
use hub_stores::Hub;

/// Fail with the store's recorded error, if any.
fn check(error: Option<String>) -> Result<()> {
    match error {
        Some(message) => anyhow::bail!(message),
        None => Ok(()),
    }
}

/// Load projects and return `id`.
async fn require_project(hub: &Hub, id: &str) -> Result<Project> {
    hub.projects.load_projects().await;
    check(hub.projects.error())?;
    hub.projects
        .project(id)
        .ok_or_else(|| anyhow::anyhow!("Project not found: {}", id))
}
