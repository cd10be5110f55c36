//! Normalized change events.
//!
//! Every raw notify notification that survives filtering becomes a
//! [`ChangeEvent`], independent of the platform backend that produced it.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use notify::EventKind;
use notify::event::{AccessKind, AccessMode};

/// What happened to the changed name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// Created, written or renamed into place.
    Changed,
    /// No longer present.
    Removed,
    /// The backend could not tell (e.g. rescan notifications).
    Unknown,
}

impl ChangeKind {
    /// Map a notify event kind, or `None` for notifications that are not changes.
    pub fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) | EventKind::Modify(_) => Some(Self::Changed),
            // inotify reports a finished write as close-after-write
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(Self::Changed),
            EventKind::Access(_) => None,
            EventKind::Remove(_) => Some(Self::Removed),
            EventKind::Any | EventKind::Other => Some(Self::Unknown),
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Changed => "changed",
            Self::Removed => "removed",
            Self::Unknown => "unknown",
        })
    }
}

/// A relevant change under one watch target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Target path, as configured.
    pub target_path: PathBuf,
    /// Changed name, relative to the target for directories.
    pub changed_name: PathBuf,
    /// Full path of the changed file.
    pub full_path: PathBuf,
    /// Kind of change.
    pub kind: ChangeKind,
    /// When the notification was translated.
    pub timestamp: DateTime<Utc>,
}
