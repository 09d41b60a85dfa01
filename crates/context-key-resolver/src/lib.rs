//! Canonical cache keys for project/worktree contexts.
//!
//! The agent service reports worktree paths in whatever form the caller
//! handed it, and different call sites hand it different forms
//! (`C:\repo\wt\`, `C:/repo/wt`, `/repo/wt/`). Every per-context cache in
//! the hub is keyed through [`context_key`] so that equivalent paths land
//! on the same entry.
//!
//! Key shapes:
//!
//! ```text
//! project_id                      no worktree path given
//! project_id::normalized/path     worktree-scoped context
//! ```

/// Separator between the project identifier and the normalized path.
pub const KEY_SEPARATOR: &str = "::";

/// Normalize a worktree path for use inside a context key.
///
/// Backslashes become forward slashes and trailing slashes are trimmed.
/// A path consisting only of separators collapses to `/`.
pub fn normalize(path: &str) -> String {
    let forward = path.replace('\\', "/");
    let trimmed = forward.trim_end_matches('/');
    if trimmed.is_empty() && !forward.is_empty() {
        return "/".to_string();
    }
    trimmed.to_string()
}

/// Build the cache key for a project and optional worktree path.
///
/// Empty or whitespace-only paths are treated as absent.
pub fn context_key(project_id: &str, path: Option<&str>) -> String {
    match path.filter(|p| !p.trim().is_empty()) {
        Some(path) => format!("{}{}{}", project_id, KEY_SEPARATOR, normalize(path)),
        None => project_id.to_string(),
    }
}

/// Prefix shared by every worktree-scoped key of a project.
pub fn aggregate_prefix(project_id: &str) -> String {
    format!("{}{}", project_id, KEY_SEPARATOR)
}

/// A context key split back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextKey<'a> {
    pub project_id: &'a str,
    pub path: Option<&'a str>,
}

impl<'a> ContextKey<'a> {
    /// Split a key produced by [`context_key`].
    pub fn parse(key: &'a str) -> Self {
        match key.split_once(KEY_SEPARATOR) {
            Some((project_id, path)) => Self {
                project_id,
                path: Some(path),
            },
            None => Self {
                project_id: key,
                path: None,
            },
        }
    }

    /// Whether this key addresses a single worktree rather than the project aggregate.
    pub fn is_composite(&self) -> bool {
        self.path.is_some()
    }
}
