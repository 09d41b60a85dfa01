//! Wire records exchanged with the agent service.
//!
//! Identifiers default to the empty string when the service omits them so a
//! malformed create response can be detected by the caller instead of
//! failing deserialization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of the primary working tree of every project.
pub const DEFAULT_WORKTREE_ID: &str = "default";

/// A project managed by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub path: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_opened: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<Instance>,
}

/// Running agent instance embedded in its project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub port: u16,
    pub status: InstanceStatus,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub started_at: i64,
}

/// Lifecycle state of an [`Instance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Starting,
    Running,
    Stopped,
    Error,
}

impl InstanceStatus {
    /// Whether `self -> next` is a legal transition for an existing record.
    ///
    /// Starting an instance replaces the record rather than transitioning it,
    /// so `* -> Starting` is not listed here.
    pub fn can_transition_to(self, next: InstanceStatus) -> bool {
        matches!(
            (self, next),
            (Self::Starting, Self::Running)
                | (Self::Starting, Self::Error)
                | (Self::Running, Self::Stopped)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a project create call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub path: String,
}

/// Partial project update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_opened: Option<i64>,
}

impl ProjectPatch {
    pub fn apply_to(&self, project: &mut Project) {
        if let Some(name) = &self.name {
            project.name = name.clone();
        }
        if let Some(path) = &self.path {
            project.path = path.clone();
        }
        if let Some(last_opened) = self.last_opened {
            project.last_opened = Some(last_opened);
        }
    }
}

/// An isolated working tree of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worktree {
    #[serde(default)]
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub title: String,
}

impl Worktree {
    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_WORKTREE_ID
    }
}

/// Body of a worktree create call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorktree {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorktreePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl WorktreePatch {
    pub fn apply_to(&self, worktree: &mut Worktree) {
        if let Some(title) = &self.title {
            worktree.title = title.clone();
        }
    }
}

/// A chat session bound to one (project, worktree path) context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub time: SessionTime,
}

/// Session timestamps in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTime {
    pub created: i64,
    pub updated: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SessionPatch {
    pub fn apply_to(&self, session: &mut Session) {
        if let Some(title) = &self.title {
            session.title = title.clone();
        }
    }
}

/// Provider/model catalog answered by `config.providers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderCatalog {
    #[serde(default)]
    pub providers: Vec<Provider>,
    /// Default model identifier per provider identifier.
    #[serde(default)]
    pub default: BTreeMap<String, String>,
}

impl ProviderCatalog {
    pub fn provider(&self, provider_id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == provider_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub models: BTreeMap<String, Model>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_uses_camel_case_fields() {
        let project: Project = serde_json::from_str(
            r#"{"id":"p1","name":"Hub","path":"/src/hub","lastOpened":42,
                "instance":{"id":"i1","port":4100,"status":"running","startedAt":7}}"#,
        )
        .unwrap();
        assert_eq!(project.last_opened, Some(42));
        let instance = project.instance.unwrap();
        assert_eq!(instance.status, InstanceStatus::Running);
        assert_eq!(instance.started_at, 7);
    }

    #[test]
    fn missing_id_deserializes_as_empty() {
        let session: Session = serde_json::from_str(r#"{"title":"Untitled"}"#).unwrap();
        assert!(session.id.is_empty());
        assert_eq!(session.title, "Untitled");
    }

    #[test]
    fn instance_status_transitions() {
        use InstanceStatus::*;
        assert!(Starting.can_transition_to(Running));
        assert!(Starting.can_transition_to(Error));
        assert!(Running.can_transition_to(Stopped));
        assert!(!Stopped.can_transition_to(Running));
        assert!(!Error.can_transition_to(Stopped));
        assert!(!Running.can_transition_to(Starting));
    }

    #[test]
    fn patch_leaves_absent_fields_untouched() {
        let mut project = Project {
            id: "p1".into(),
            name: "Old".into(),
            path: "/src/old".into(),
            last_opened: None,
            instance: None,
        };
        ProjectPatch {
            name: Some("New".into()),
            ..Default::default()
        }
        .apply_to(&mut project);
        assert_eq!(project.name, "New");
        assert_eq!(project.path, "/src/old");
    }

    #[test]
    fn empty_patch_serializes_to_empty_object() {
        assert_eq!(serde_json::to_string(&ProjectPatch::default()).unwrap(), "{}");
    }

    #[test]
    fn provider_catalog_shape() {
        let catalog: ProviderCatalog = serde_json::from_str(
            r#"{"providers":[{"id":"anthropic","name":"Anthropic",
                 "models":{"sonnet":{"name":"Sonnet"}}}],
                "default":{"anthropic":"sonnet"}}"#,
        )
        .unwrap();
        let provider = catalog.provider("anthropic").unwrap();
        assert_eq!(provider.models["sonnet"].name, "Sonnet");
        assert_eq!(catalog.default["anthropic"], "sonnet");
    }
}
