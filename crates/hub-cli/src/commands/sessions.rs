//! Session commands.
//!
//! Without `--directory` a command is scoped to the project's own path.

use super::{check, require_project};
use crate::output::{self, OutputFormat};
use agent_service_client::SessionPatch;
use anyhow::Result;
use hub_stores::Hub;

async fn resolve_directory(hub: &Hub, project_id: &str, directory: Option<&str>) -> Result<String> {
    let project = require_project(hub, project_id).await?;
    Ok(directory.map(str::to_string).unwrap_or(project.path))
}

pub async fn sessions_list(
    hub: &Hub,
    project_id: &str,
    directory: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let directory = resolve_directory(hub, project_id, directory).await?;
    hub.sessions.load_sessions(project_id, Some(&directory)).await;
    check(hub.sessions.error())?;

    let sessions = hub.sessions.sessions(project_id, Some(&directory));
    match format {
        OutputFormat::Json => output::print_json(sessions.as_slice())?,
        OutputFormat::Text => {
            if sessions.is_empty() {
                println!("No sessions found");
                return Ok(());
            }
            println!("{:<32} {:<40} {}", "ID", "Title", "Updated");
            output::print_divider(90);
            for session in sessions.iter() {
                println!(
                    "{:<32} {:<40} {}",
                    session.id,
                    session.title,
                    output::format_millis(Some(session.time.updated))
                );
            }
        }
    }
    Ok(())
}

pub async fn sessions_create(
    hub: &Hub,
    project_id: &str,
    directory: Option<&str>,
    title: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let directory = resolve_directory(hub, project_id, directory).await?;
    let session = hub
        .sessions
        .create_session(project_id, Some(&directory), title)
        .await?;
    match format {
        OutputFormat::Json => output::print_json(&session),
        OutputFormat::Text => {
            println!("Created session {}", session.id);
            output::print_row("Title", &session.title);
            output::print_row("Directory", &session.directory);
            Ok(())
        }
    }
}

pub async fn sessions_rename(
    hub: &Hub,
    project_id: &str,
    directory: Option<&str>,
    session_id: &str,
    title: &str,
    format: &OutputFormat,
) -> Result<()> {
    let directory = resolve_directory(hub, project_id, directory).await?;
    hub.sessions.load_sessions(project_id, Some(&directory)).await;
    check(hub.sessions.error())?;
    hub.sessions
        .update_session(
            project_id,
            Some(&directory),
            session_id,
            SessionPatch {
                title: Some(title.to_string()),
            },
        )
        .await;
    check(hub.sessions.error())?;
    output::print_success(&format!("Renamed session {}", session_id), format);
    Ok(())
}

pub async fn sessions_delete(
    hub: &Hub,
    project_id: &str,
    directory: Option<&str>,
    session_id: &str,
    format: &OutputFormat,
) -> Result<()> {
    let directory = resolve_directory(hub, project_id, directory).await?;
    hub.sessions.load_sessions(project_id, Some(&directory)).await;
    check(hub.sessions.error())?;
    if !hub
        .sessions
        .sessions(project_id, Some(&directory))
        .iter()
        .any(|s| s.id == session_id)
    {
        anyhow::bail!("Session not found: {}", session_id);
    }
    hub.sessions
        .delete_session(project_id, Some(&directory), session_id)
        .await;
    check(hub.sessions.error())?;
    output::print_success(&format!("Deleted session {}", session_id), format);
    Ok(())
}
