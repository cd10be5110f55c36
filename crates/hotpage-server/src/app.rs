//! Router construction.
//!
//! Builds the host router of the development server: an optional index
//! document at `/` and the static directory as fallback.

use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

use crate::ServerConfig;

/// Create the host router, before live reload is installed.
pub(crate) fn create_router(config: &ServerConfig) -> Router {
    let mut router = Router::new();

    if let Some(index) = &config.index {
        router = router.route_service("/", ServeFile::new(index));
    }

    if let Some(static_dir) = &config.static_dir {
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    router
}
