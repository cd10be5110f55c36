//! Name filtering for directory targets.
//!
//! Editors and package managers produce a steady stream of irrelevant
//! notifications (swap files, backups, dependency installs). Those names are
//! dropped silently before they reach the coalescer.

use std::path::{Component, Path};

use crate::target::TargetKind;

/// Directory names that hold third-party dependencies.
const DEPENDENCY_DIRS: &[&str] = &["node_modules", "bower_components", "jspm_packages", "vendor"];

/// Per-target relevance rules.
#[derive(Clone, Debug)]
pub struct FilterPolicy {
    extensions: Option<Vec<String>>,
}

impl FilterPolicy {
    /// Build the policy for a validated target.
    pub fn for_kind(kind: &TargetKind) -> Self {
        let extensions = match kind {
            TargetKind::File => None,
            TargetKind::Directory { extensions } => Some(extensions.clone()),
        };
        Self { extensions }
    }

    /// Check a name relative to a directory target.
    ///
    /// File targets accept every name: the file itself is always of interest.
    pub fn accepts(&self, relative: &Path) -> bool {
        let Some(extensions) = &self.extensions else {
            return true;
        };

        if is_ignored(relative) {
            return false;
        }

        let name = relative.to_string_lossy();
        extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }
}

/// Returns true for hidden, temporary and dependency paths.
pub fn is_ignored(relative: &Path) -> bool {
    let ignored_component = relative.components().any(|component| match component {
        Component::Normal(part) => {
            let part = part.to_string_lossy();
            part.starts_with('.') || DEPENDENCY_DIRS.iter().any(|dir| *dir == part)
        }
        _ => false,
    });
    if ignored_component {
        return true;
    }

    let Some(file_name) = relative.file_name() else {
        return false;
    };
    let file_name = file_name.to_string_lossy();
    file_name.ends_with('~') || file_name.contains(".tmp")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html_policy() -> FilterPolicy {
        FilterPolicy::for_kind(&TargetKind::Directory {
            extensions: vec![".html".to_owned(), ".ejs".to_owned()],
        })
    }

    #[test]
    fn test_matching_extension_accepted() {
        let policy = html_policy();

        assert!(policy.accepts(Path::new("index.html")));
        assert!(policy.accepts(Path::new("partials/header.ejs")));
    }

    #[test]
    fn test_other_extension_rejected() {
        let policy = html_policy();

        assert!(!policy.accepts(Path::new("notes.txt")));
        assert!(!policy.accepts(Path::new("index.html.bak")));
    }

    #[test]
    fn test_hidden_names_rejected() {
        let policy = html_policy();

        assert!(!policy.accepts(Path::new(".index.html")));
        assert!(!policy.accepts(Path::new(".cache/index.html")));
    }

    #[test]
    fn test_temporary_names_rejected() {
        assert!(is_ignored(Path::new("index.html~")));
        assert!(is_ignored(Path::new("index.tmp.html")));
        assert!(is_ignored(Path::new("index.html.tmp")));
        assert!(!html_policy().accepts(Path::new("index.tmp.html")));
    }

    #[test]
    fn test_dependency_dirs_rejected() {
        let policy = html_policy();

        assert!(!policy.accepts(Path::new("node_modules/pkg/index.html")));
        assert!(!policy.accepts(Path::new("site/vendor/index.html")));
        assert!(policy.accepts(Path::new("vendors/index.html")));
    }

    #[test]
    fn test_file_policy_accepts_everything() {
        let policy = FilterPolicy::for_kind(&TargetKind::File);

        assert!(policy.accepts(Path::new("style.css")));
        assert!(policy.accepts(Path::new(".style.css")));
    }

    #[test]
    fn test_suffix_without_dot() {
        let policy = FilterPolicy::for_kind(&TargetKind::Directory {
            extensions: vec!["html".to_owned()],
        });

        assert!(policy.accepts(Path::new("index.html")));
        assert!(!policy.accepts(Path::new("index.htm")));
    }
}
