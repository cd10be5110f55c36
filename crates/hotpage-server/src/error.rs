//! Error types for the development server.

use hotpage_watch::ConfigurationError;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid live reload setup, e.g. a directory target without extensions.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Host and port do not form a socket address.
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] std::net::AddrParseError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
