//! OS-level change sources, one per watch target.

use std::path::{Path, PathBuf};

use chrono::Utc;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::WatchArmingError;
use crate::event::{ChangeEvent, ChangeKind};
use crate::filter::FilterPolicy;
use crate::target::{ValidatedTarget, relative_name};

/// A live watcher for one target.
///
/// Dropping it stops the underlying notify watcher.
pub struct PathWatcher {
    target: ValidatedTarget,
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for PathWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathWatcher")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl PathWatcher {
    /// Arm a watcher for `target`, forwarding relevant changes to `sink`.
    ///
    /// Directories are watched recursively. A file target watches its parent
    /// directory non-recursively and keeps only notifications for the file,
    /// so editors that save by renaming a temporary file stay observed.
    ///
    /// `sink` runs on the notify backend thread and must not block for long.
    ///
    /// # Errors
    ///
    /// Returns [`WatchArmingError`] if the backend cannot be created or the
    /// path cannot be watched.
    pub fn arm<F>(target: ValidatedTarget, sink: F) -> Result<Self, WatchArmingError>
    where
        F: Fn(ChangeEvent) + Send + 'static,
    {
        let arming_error = |source| WatchArmingError {
            path: target.configured.clone(),
            source,
        };

        let (watch_path, mode) = Self::watch_root(&target).map_err(arming_error)?;

        let callback_target = target.clone();
        let policy = FilterPolicy::for_kind(&target.kind);
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    for change in Self::translate(&callback_target, &policy, &event) {
                        sink(change);
                    }
                }
                Err(e) => {
                    tracing::debug!(path = %callback_target.configured.display(), error = %e, "Watch backend error");
                }
            }
        })
        .map_err(arming_error)?;

        watcher.watch(&watch_path, mode).map_err(arming_error)?;

        tracing::debug!(
            path = %target.configured.display(),
            watching = %watch_path.display(),
            recursive = matches!(mode, RecursiveMode::Recursive),
            "Watcher armed"
        );

        Ok(Self {
            target,
            _watcher: watcher,
        })
    }

    /// The target this watcher observes.
    pub fn target(&self) -> &ValidatedTarget {
        &self.target
    }

    fn watch_root(target: &ValidatedTarget) -> Result<(PathBuf, RecursiveMode), notify::Error> {
        if target.is_directory() {
            return Ok((target.root.clone(), RecursiveMode::Recursive));
        }

        // The file must exist at arming time, like any other watched path.
        if !target.root.exists() {
            return Err(notify::Error::path_not_found().add_path(target.root.clone()));
        }
        let parent = match target.root.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok((parent, RecursiveMode::NonRecursive))
    }

    /// Translate one raw notification into zero or more change events.
    ///
    /// Notifications without a resolvable name, names outside the target and
    /// names rejected by the filter policy are dropped without logging.
    pub fn translate(
        target: &ValidatedTarget,
        policy: &FilterPolicy,
        event: &Event,
    ) -> Vec<ChangeEvent> {
        let Some(kind) = ChangeKind::from_notify(&event.kind) else {
            return Vec::new();
        };

        event
            .paths
            .iter()
            .filter_map(|path| {
                let changed_name = Self::changed_name(target, path)?;
                if !policy.accepts(&changed_name) {
                    return None;
                }

                // A rename away or an atomic replace still in flight leaves no file behind.
                let kind = if kind == ChangeKind::Changed && !path.exists() {
                    ChangeKind::Removed
                } else {
                    kind
                };

                Some(ChangeEvent {
                    target_path: target.configured.clone(),
                    changed_name,
                    full_path: path.clone(),
                    kind,
                    timestamp: Utc::now(),
                })
            })
            .collect()
    }

    fn changed_name(target: &ValidatedTarget, path: &Path) -> Option<PathBuf> {
        if target.is_directory() {
            return relative_name(&target.root, path);
        }

        if path != target.root {
            return None;
        }
        target.root.file_name().map(PathBuf::from)
    }
}

/// Arm every target, collecting failures instead of stopping at the first.
///
/// A target that fails to arm is disabled; the others keep running.
pub fn arm_all<F>(
    targets: Vec<ValidatedTarget>,
    sink: F,
) -> (Vec<PathWatcher>, Vec<WatchArmingError>)
where
    F: Fn(ChangeEvent) + Clone + Send + 'static,
{
    let mut watchers = Vec::with_capacity(targets.len());
    let mut failures = Vec::new();

    for target in targets {
        match PathWatcher::arm(target, sink.clone()) {
            Ok(watcher) => watchers.push(watcher),
            Err(e) => failures.push(e),
        }
    }

    (watchers, failures)
}
