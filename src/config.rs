//! Session-wide configuration the Session Coordinator reads: which storage
//! layout to persist into, and the "shouldn't-process" path predicate.

use std::path::Path;

/// Where persisted annotation logs live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageLayout {
    /// `<workspace>/.tabd/log/<relative/path>/...`
    Repository,
    /// `<home>/.tabd/workspaces/<sanitized-workspace-path>/log/<relative/path>/...`
    HomeDirectory,
    /// Experimental: one git-notes ref per file, attached to the head commit.
    VcsNotes,
}

/// Session-wide configuration. Changing any of these fields (via
/// `Coordinator::on_storage_config_change`) drops every cached
/// `SessionFileState`, since cached state may reference the old layout's
/// save path.
#[derive(Debug, Clone)]
pub struct Config {
    pub layout: StorageLayout,
    pub workspace_root: Option<String>,
}

impl Config {
    pub fn new(layout: StorageLayout, workspace_root: Option<String>) -> Self {
        Config { layout, workspace_root }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config { layout: StorageLayout::Repository, workspace_root: None }
    }
}

/// Any file whose basename begins with `.`, or that lies under a directory
/// component beginning with `.`, is excluded from tracking.
pub fn is_tracked_path(path: &str) -> bool {
    let path = Path::new(path);
    !path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path_is_tracked() {
        assert!(is_tracked_path("src/main.rs"));
    }

    #[test]
    fn dotfile_basename_is_excluded() {
        assert!(!is_tracked_path("src/.env"));
    }

    #[test]
    fn dotdir_component_is_excluded() {
        assert!(!is_tracked_path(".git/config"));
        assert!(!is_tracked_path("src/.vscode/settings.json"));
    }
}
