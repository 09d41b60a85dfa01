//! Agent service client for the hub.
//!
//! The remote agent service is treated as an opaque RPC endpoint. This
//! crate pins down the seam ([`AgentService`]), the typed records crossing
//! it, and provides the HTTP implementation used in production.
//!
//! # Architecture
//!
//! ```text
//! hub-stores → client-registry → Arc<dyn AgentService> → HttpAgentClient → agent service
//! ```

mod client;
mod error;
mod service;
mod types;

pub use client::{extract_error_message, HttpAgentClient};
pub use error::{AgentError, AgentResult};
pub use service::AgentService;
pub use types::{
    Instance, InstanceStatus, Model, NewProject, NewSession, NewWorktree, Project, ProjectPatch,
    Provider, ProviderCatalog, Session, SessionPatch, SessionTime, Worktree, WorktreePatch,
    DEFAULT_WORKTREE_ID,
};
