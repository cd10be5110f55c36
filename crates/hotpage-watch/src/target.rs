//! Watch target configuration and validation.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigurationError;

/// A configured file or directory to monitor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchTarget {
    /// Path to the file or directory.
    pub path: PathBuf,
    /// Name suffixes that count as relevant inside a directory target.
    ///
    /// Required (and non-empty) for directories, ignored for files.
    pub extensions: Option<Vec<String>>,
}

impl WatchTarget {
    /// Watch a single file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            extensions: None,
        }
    }

    /// Watch a directory tree, keeping only names with one of `extensions`.
    pub fn directory<I, E>(path: impl Into<PathBuf>, extensions: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<String>,
    {
        Self {
            path: path.into(),
            extensions: Some(extensions.into_iter().map(Into::into).collect()),
        }
    }
}

/// Resolved shape of a validated target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetKind {
    /// A single file; every notification for it is relevant.
    File,
    /// A directory watched recursively.
    Directory {
        /// Required name suffixes.
        extensions: Vec<String>,
    },
}

/// A watch target that passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedTarget {
    /// Path as configured, used in log messages.
    pub configured: PathBuf,
    /// Canonical path when it could be resolved, otherwise the configured path.
    pub root: PathBuf,
    /// File or directory.
    pub kind: TargetKind,
}

impl ValidatedTarget {
    /// Returns true for directory targets.
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, TargetKind::Directory { .. })
    }
}

/// Validate every configured target before any watcher starts.
///
/// A path that cannot be inspected is treated as a file target: it never
/// needs extensions, and the failure surfaces later when arming. Exact
/// duplicates are collapsed onto their first occurrence.
///
/// # Errors
///
/// Returns [`ConfigurationError`] for the first directory without a usable
/// extension list.
pub fn validate_targets(targets: &[WatchTarget]) -> Result<Vec<ValidatedTarget>, ConfigurationError> {
    let mut validated: Vec<ValidatedTarget> = Vec::with_capacity(targets.len());

    for target in targets {
        let target = validate_target(target)?;

        if validated
            .iter()
            .any(|existing| existing.root == target.root && existing.kind == target.kind)
        {
            tracing::debug!(path = %target.configured.display(), "Skipping duplicate watch target");
            continue;
        }

        validated.push(target);
    }

    Ok(validated)
}

fn validate_target(target: &WatchTarget) -> Result<ValidatedTarget, ConfigurationError> {
    let is_directory = fs::metadata(&target.path).is_ok_and(|m| m.is_dir());
    let root = fs::canonicalize(&target.path).unwrap_or_else(|_| target.path.clone());

    let kind = if is_directory {
        let extensions = match &target.extensions {
            Some(extensions) if !extensions.is_empty() => extensions.clone(),
            _ => {
                return Err(ConfigurationError::MissingExtensions {
                    path: target.path.clone(),
                });
            }
        };
        if extensions.iter().any(String::is_empty) {
            return Err(ConfigurationError::EmptyExtension {
                path: target.path.clone(),
            });
        }
        TargetKind::Directory { extensions }
    } else {
        TargetKind::File
    };

    Ok(ValidatedTarget {
        configured: target.path.clone(),
        root,
        kind,
    })
}

/// Returns the name of `path` relative to `root`, if it lies beneath it.
pub(crate) fn relative_name(root: &Path, path: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(root).ok()?;
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(relative.to_path_buf())
}
