//! Error types for watch target validation and arming.

use std::path::PathBuf;

/// Invalid watch configuration.
///
/// Returned synchronously before any watcher is armed. Indicates a
/// programmer mistake in the list of watch targets.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// A directory target was configured without extensions.
    #[error("Extensions must be provided for directory: {}", path.display())]
    MissingExtensions {
        /// Offending target path, as configured.
        path: PathBuf,
    },
    /// A directory target lists an empty extension, which would match every name.
    #[error("Empty extension configured for directory: {}", path.display())]
    EmptyExtension {
        /// Offending target path, as configured.
        path: PathBuf,
    },
}

/// A single target's watcher could not be started.
///
/// Scoped to one target: the caller logs it and keeps the other targets running.
#[derive(Debug, thiserror::Error)]
#[error("Error watching path {}: {source}", path.display())]
pub struct WatchArmingError {
    /// Target path, as configured.
    pub path: PathBuf,
    /// Underlying notify failure.
    #[source]
    pub source: notify::Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_extensions_names_path() {
        let err = ConfigurationError::MissingExtensions {
            path: PathBuf::from("./views"),
        };

        assert_eq!(
            err.to_string(),
            "Extensions must be provided for directory: ./views"
        );
    }

    #[test]
    fn test_arming_error_keeps_source() {
        let err = WatchArmingError {
            path: PathBuf::from("/missing"),
            source: notify::Error::path_not_found(),
        };

        assert!(err.to_string().starts_with("Error watching path /missing"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
