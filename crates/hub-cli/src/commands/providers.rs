//! Provider catalog command.

use super::{check, require_project};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use hub_stores::Hub;

pub async fn providers_show(
    hub: &Hub,
    project_id: &str,
    directory: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let project = require_project(hub, project_id).await?;
    let directory = directory.map(str::to_string).unwrap_or(project.path);
    hub.providers.load_providers(project_id, Some(&directory)).await;
    check(hub.providers.error())?;

    let catalog = hub
        .providers
        .catalog(project_id, Some(&directory))
        .ok_or_else(|| anyhow::anyhow!("No provider catalog for {}", project_id))?;
    match format {
        OutputFormat::Json => output::print_json(catalog.as_ref())?,
        OutputFormat::Text => {
            for provider in &catalog.providers {
                let default = hub
                    .providers
                    .default_model(project_id, Some(&directory), &provider.id);
                println!("{} ({})", provider.name, provider.id);
                for (model_id, model) in &provider.models {
                    let marker = if default.as_deref() == Some(model_id.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    println!("  {} {:<32} {}", marker, model_id, model.name);
                }
            }
        }
    }
    Ok(())
}
