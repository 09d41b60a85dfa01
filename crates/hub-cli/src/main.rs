//! agent-hub: drive projects, sessions, worktrees and providers from a terminal.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_registry::{ClientRegistry, HttpClientFactory, HttpDiscovery};
use hub_config_and_utils::{init_logging, Config, Paths};
use hub_storage::{FileStorage, ProjectPersistence};
use hub_stores::{Hub, HubContext};
use output::OutputFormat;
use std::sync::Arc;
use tracing::debug;

#[derive(Parser)]
#[command(name = "agent-hub")]
#[command(about = "Manage coding-agent projects, sessions and worktrees")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Discovery endpoint returning the agent service address
    #[arg(long, global = true)]
    discovery_url: Option<String>,

    /// Mirror logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects and their instances
    Projects {
        #[command(subcommand)]
        command: ProjectsCommands,
    },
    /// Manage sessions of a project directory
    Sessions {
        #[command(subcommand)]
        command: SessionsCommands,
    },
    /// Manage worktrees of a project
    Worktrees {
        #[command(subcommand)]
        command: WorktreesCommands,
    },
    /// Show the provider catalog of a project directory
    Providers {
        #[arg(long)]
        project: String,
        #[arg(long)]
        directory: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProjectsCommands {
    /// List projects
    List,
    /// Create a project
    Create { name: String, path: String },
    /// Remove a project
    Remove { id: String },
    /// Mark a project as current
    Select { id: String },
    /// Start a project's instance
    Start { id: String },
    /// Stop a project's instance
    Stop { id: String },
    /// Stop every running instance
    StopAll,
    /// Refresh instance status of one project, or all
    Status { id: Option<String> },
}

#[derive(Subcommand)]
enum SessionsCommands {
    /// List sessions
    List {
        #[arg(long)]
        project: String,
        #[arg(long)]
        directory: Option<String>,
    },
    /// Create a session
    Create {
        #[arg(long)]
        project: String,
        #[arg(long)]
        directory: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Rename a session
    Rename {
        id: String,
        title: String,
        #[arg(long)]
        project: String,
        #[arg(long)]
        directory: Option<String>,
    },
    /// Delete a session
    Delete {
        id: String,
        #[arg(long)]
        project: String,
        #[arg(long)]
        directory: Option<String>,
    },
}

#[derive(Subcommand)]
enum WorktreesCommands {
    /// List worktrees
    List { project: String },
    /// Create a worktree
    Create {
        project: String,
        title: String,
        #[arg(long)]
        branch: Option<String>,
    },
    /// Remove a worktree
    Remove { project: String, id: String },
}

fn build_hub(cli: &Cli) -> Result<Hub> {
    let paths = Paths::new()?;
    let mut config = Config::load(&paths)?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(url) = &cli.discovery_url {
        config.discovery_url = url.clone();
    }

    init_logging("hub-cli", &config.log_level, &paths, cli.verbose)?;

    let discovery_url = config.discovery_url()?;
    debug!(discovery_url = %discovery_url, "Building hub");

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("Failed to build HTTP client")?;
    let registry = ClientRegistry::new(
        Arc::new(HttpDiscovery::new(http.clone(), discovery_url.as_str())),
        Arc::new(HttpClientFactory::new(http)),
    );
    let persistence = ProjectPersistence::new(Arc::new(FileStorage::new(paths.state_file())));
    let context = HubContext::new(Arc::new(registry)).with_persistence(persistence);
    Ok(Hub::new(context))
}

async fn run(cli: Cli) -> Result<()> {
    let hub = build_hub(&cli)?;
    let format = &cli.format;

    match cli.command {
        Commands::Projects { command } => match command {
            ProjectsCommands::List => commands::projects_list(&hub, format).await,
            ProjectsCommands::Create { name, path } => {
                commands::projects_create(&hub, &name, &path, format).await
            }
            ProjectsCommands::Remove { id } => commands::projects_remove(&hub, &id, format).await,
            ProjectsCommands::Select { id } => commands::projects_select(&hub, &id, format).await,
            ProjectsCommands::Start { id } => commands::projects_start(&hub, &id, format).await,
            ProjectsCommands::Stop { id } => commands::projects_stop(&hub, &id, format).await,
            ProjectsCommands::StopAll => commands::projects_stop_all(&hub, format).await,
            ProjectsCommands::Status { id } => {
                commands::projects_status(&hub, id.as_deref(), format).await
            }
        },
        Commands::Sessions { command } => match command {
            SessionsCommands::List { project, directory } => {
                commands::sessions_list(&hub, &project, directory.as_deref(), format).await
            }
            SessionsCommands::Create {
                project,
                directory,
                title,
            } => {
                commands::sessions_create(
                    &hub,
                    &project,
                    directory.as_deref(),
                    title.as_deref(),
                    format,
                )
                .await
            }
            SessionsCommands::Rename {
                id,
                title,
                project,
                directory,
            } => {
                commands::sessions_rename(&hub, &project, directory.as_deref(), &id, &title, format)
                    .await
            }
            SessionsCommands::Delete {
                id,
                project,
                directory,
            } => commands::sessions_delete(&hub, &project, directory.as_deref(), &id, format).await,
        },
        Commands::Worktrees { command } => match command {
            WorktreesCommands::List { project } => {
                commands::worktrees_list(&hub, &project, format).await
            }
            WorktreesCommands::Create {
                project,
                title,
                branch,
            } => {
                commands::worktrees_create(&hub, &project, &title, branch.as_deref(), format).await
            }
            WorktreesCommands::Remove { project, id } => {
                commands::worktrees_remove(&hub, &project, &id, format).await
            }
        },
        Commands::Providers { project, directory } => {
            commands::providers_show(&hub, &project, directory.as_deref(), format).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
