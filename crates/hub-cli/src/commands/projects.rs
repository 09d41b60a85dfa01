//! Project and instance commands.

use super::{check, require_project};
use crate::output::{self, OutputFormat};
use agent_service_client::{NewProject, Project};
use anyhow::Result;
use hub_stores::Hub;

fn instance_label(project: &Project) -> String {
    project
        .instance
        .as_ref()
        .map(|i| format!("{} :{}", i.status, i.port))
        .unwrap_or_else(|| "-".to_string())
}

fn print_projects(hub: &Hub, format: &OutputFormat) -> Result<()> {
    let projects = hub.projects.projects();
    match format {
        OutputFormat::Json => output::print_json(projects.as_slice())?,
        OutputFormat::Text => {
            if projects.is_empty() {
                println!("No projects found");
                return Ok(());
            }
            let current = hub.projects.current_project().map(|p| p.id);
            println!(
                "  {:<24} {:<24} {:<18} {:<16} {}",
                "ID", "Name", "Instance", "Last Opened", "Path"
            );
            output::print_divider(110);
            for project in projects.iter() {
                let marker = if current.as_deref() == Some(project.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {:<24} {:<24} {:<18} {:<16} {}",
                    marker,
                    project.id,
                    project.name,
                    instance_label(project),
                    output::format_millis(project.last_opened),
                    project.path
                );
                if let Some(error) = hub.projects.instance_error(&project.id) {
                    println!("    error: {}", error);
                }
            }
        }
    }
    Ok(())
}

pub async fn projects_list(hub: &Hub, format: &OutputFormat) -> Result<()> {
    hub.projects.load_projects().await;
    check(hub.projects.error())?;
    print_projects(hub, format)
}

pub async fn projects_create(hub: &Hub, name: &str, path: &str, format: &OutputFormat) -> Result<()> {
    let project = hub
        .projects
        .create_project(NewProject {
            name: name.to_string(),
            path: path.to_string(),
        })
        .await?;
    match format {
        OutputFormat::Json => output::print_json(&project),
        OutputFormat::Text => {
            println!("Created project {}", project.id);
            output::print_row("Name", &project.name);
            output::print_row("Path", &project.path);
            Ok(())
        }
    }
}

pub async fn projects_remove(hub: &Hub, id: &str, format: &OutputFormat) -> Result<()> {
    require_project(hub, id).await?;
    hub.projects.remove_project(id).await;
    check(hub.projects.error())?;
    output::print_success(&format!("Removed project {}", id), format);
    Ok(())
}

pub async fn projects_select(hub: &Hub, id: &str, format: &OutputFormat) -> Result<()> {
    require_project(hub, id).await?;
    let project = hub
        .projects
        .select_project(id)
        .ok_or_else(|| anyhow::anyhow!("Project not found: {}", id))?;
    output::print_success(&format!("Selected project {}", project.name), format);
    Ok(())
}

pub async fn projects_start(hub: &Hub, id: &str, format: &OutputFormat) -> Result<()> {
    require_project(hub, id).await?;
    hub.projects.start_instance(id).await;
    check(hub.projects.error())?;
    let project = hub
        .projects
        .project(id)
        .ok_or_else(|| anyhow::anyhow!("Project not found: {}", id))?;
    output::print_success(
        &format!("Instance for {}: {}", project.name, instance_label(&project)),
        format,
    );
    Ok(())
}

pub async fn projects_stop(hub: &Hub, id: &str, format: &OutputFormat) -> Result<()> {
    require_project(hub, id).await?;
    hub.projects.stop_instance(id).await;
    check(hub.projects.error())?;
    output::print_success(&format!("Stopped instance for {}", id), format);
    Ok(())
}

pub async fn projects_stop_all(hub: &Hub, format: &OutputFormat) -> Result<()> {
    hub.projects.load_projects().await;
    check(hub.projects.error())?;
    let stopped = hub.projects.stop_all_instances().await;
    output::print_success(&format!("Stopped {} instance(s)", stopped), format);
    let failures: Vec<_> = hub
        .projects
        .projects()
        .iter()
        .filter_map(|p| hub.projects.instance_error(&p.id).map(|e| (p.id.clone(), e)))
        .collect();
    if !failures.is_empty() {
        for (id, error) in &failures {
            eprintln!("{}: {}", id, error);
        }
        anyhow::bail!("{} instance(s) failed to stop", failures.len());
    }
    Ok(())
}

/// Refresh one project's instance status, or every project's.
pub async fn projects_status(hub: &Hub, id: Option<&str>, format: &OutputFormat) -> Result<()> {
    hub.projects.load_projects().await;
    check(hub.projects.error())?;
    match id {
        Some(id) => {
            if hub.projects.project(id).is_none() {
                anyhow::bail!("Project not found: {}", id);
            }
            hub.projects.refresh_instance_status(id).await;
        }
        None => hub.projects.refresh_all_instance_statuses().await,
    }
    print_projects(hub, format)
}
