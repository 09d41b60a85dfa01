//! Worktree commands.

use super::{check, require_project};
use crate::output::{self, OutputFormat};
use agent_service_client::NewWorktree;
use anyhow::Result;
use hub_stores::Hub;

pub async fn worktrees_list(hub: &Hub, project_id: &str, format: &OutputFormat) -> Result<()> {
    require_project(hub, project_id).await?;
    hub.worktrees.load_worktrees(project_id).await;
    check(hub.worktrees.error(project_id))?;

    let worktrees = hub.worktrees.worktrees(project_id);
    match format {
        OutputFormat::Json => output::print_json(worktrees.as_slice())?,
        OutputFormat::Text => {
            if worktrees.is_empty() {
                println!("No worktrees found");
                return Ok(());
            }
            println!("  {:<24} {:<24} {}", "ID", "Title", "Path");
            output::print_divider(90);
            for worktree in worktrees.iter() {
                let marker = if worktree.is_default() { "*" } else { " " };
                println!(
                    "{} {:<24} {:<24} {}",
                    marker, worktree.id, worktree.title, worktree.path
                );
            }
        }
    }
    Ok(())
}

pub async fn worktrees_create(
    hub: &Hub,
    project_id: &str,
    title: &str,
    branch: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    require_project(hub, project_id).await?;
    let worktree = hub
        .worktrees
        .create_worktree(
            project_id,
            NewWorktree {
                title: title.to_string(),
                branch: branch.map(str::to_string),
            },
        )
        .await?;
    match format {
        OutputFormat::Json => output::print_json(&worktree),
        OutputFormat::Text => {
            println!("Created worktree {}", worktree.id);
            output::print_row("Title", &worktree.title);
            output::print_row("Path", &worktree.path);
            Ok(())
        }
    }
}

pub async fn worktrees_remove(
    hub: &Hub,
    project_id: &str,
    worktree_id: &str,
    format: &OutputFormat,
) -> Result<()> {
    require_project(hub, project_id).await?;
    hub.worktrees.load_worktrees(project_id).await;
    check(hub.worktrees.error(project_id))?;
    if hub.worktrees.worktree_for(project_id, Some(worktree_id)).is_none() {
        anyhow::bail!("Worktree not found: {}", worktree_id);
    }
    hub.worktrees.remove_worktree(project_id, worktree_id).await;
    check(hub.worktrees.error(project_id))?;
    output::print_success(&format!("Removed worktree {}", worktree_id), format);
    Ok(())
}
