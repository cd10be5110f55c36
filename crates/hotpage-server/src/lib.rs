//! Live reload for axum development servers.
//!
//! Watches template and asset files, and tells every open browser tab to
//! reload when one of them changes. HTML responses get a small bootstrap
//! script that opens the reload channel.
//!
//! # Quick Start
//!
//! ```ignore
//! use axum::Router;
//! use axum::routing::get;
//! use hotpage_server::{LiveReloadOptions, WatchTarget, setup};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Host routes first: setup wraps the routes registered so far.
//!     let router = Router::new().route("/", get(index));
//!
//!     let setup = setup(
//!         router,
//!         &[
//!             WatchTarget::file("public/style.css"),
//!             WatchTarget::directory("views", [".html"]),
//!         ],
//!         LiveReloadOptions::default(),
//!     )
//!     .unwrap();
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
//!     // Watchers run as long as the router does
//!     axum::serve(listener, setup.router).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum router
//!                        │
//!                        ├─► host routes ──► ResponseInjector (HTML only)
//!                        │
//!                        └─► GET /hotpage-reload ──► ClientRegistry
//!                                                        ▲
//!                      notify ──► ChangePipeline ────────┘
//! ```
//!
//! The feature is inert when `HOTPAGE_ENV=production`.

mod app;
mod error;
mod live_reload;
mod middleware;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use tower_http::trace::TraceLayer;

pub use error::ServerError;
pub use hotpage_watch::{ConfigurationError, WatchArmingError, WatchTarget};
pub use live_reload::{
    BootstrapConfig, BroadcastReport, ClientEvent, ClientRegistry, ClientState, ConnectedClient,
    DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL, DEFAULT_RETRY_DELAY, DeliveryError, ENV_VAR,
    LiveReload, LiveReloadOptions, Mode, RELOAD_PATH, Registration, ReloadMessage, Setup,
    Transport, setup,
};
pub use middleware::inject::ResponseInjector;

/// Development server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory served at `/`.
    pub static_dir: Option<PathBuf>,
    /// Document served for `/`.
    pub index: Option<PathBuf>,
    /// Install live reload.
    pub live_reload_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 3000,
            static_dir: None,
            index: None,
            live_reload_enabled: true,
        }
    }
}

/// Run the development server.
///
/// Serves the configured files, installs live reload for `targets` and
/// runs until Ctrl-C.
///
/// # Errors
///
/// Returns an error if a watch target is misconfigured or the server fails
/// to start.
pub async fn run_server(
    config: ServerConfig,
    targets: Vec<WatchTarget>,
    options: LiveReloadOptions,
) -> Result<(), ServerError> {
    let router = app::create_router(&config);

    let router = if config.live_reload_enabled {
        setup(router, &targets, options)?.router
    } else {
        router
    };
    let app = router.layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
    tracing::info!(address = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

/// Create server configuration from hotpage config.
#[must_use]
pub fn server_config_from_config(config: &hotpage_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        static_dir: config.server.static_dir.clone(),
        index: config.server.index.clone(),
        live_reload_enabled: config.live_reload.enabled,
    }
}

/// Create live reload options from hotpage config.
///
/// The deployment mode is left to `HOTPAGE_ENV`.
#[must_use]
pub fn live_reload_options_from_config(config: &hotpage_config::Config) -> LiveReloadOptions {
    let live_reload = &config.live_reload;
    LiveReloadOptions {
        quiet: live_reload.quiet,
        transport: live_reload.transport,
        debounce: live_reload.debounce(),
        poll_interval: live_reload.poll_interval(),
        retry_delay: live_reload.retry_delay(),
        max_retries: live_reload.max_retries,
        content_check: live_reload.content_check,
        mode: None,
    }
}

/// Watch targets from the `[[watch]]` entries of hotpage config.
#[must_use]
pub fn watch_targets_from_config(config: &hotpage_config::Config) -> Vec<WatchTarget> {
    config
        .watch
        .iter()
        .map(|entry| WatchTarget {
            path: entry.path.clone(),
            extensions: entry.extensions.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use hotpage_config::{Config, WatchEntry};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_server_config_from_config() {
        let mut config = Config::default();
        config.server.port = 8080;
        config.server.static_dir = Some(PathBuf::from("/site/public"));
        config.live_reload.enabled = false;

        let server = server_config_from_config(&config);

        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 8080);
        assert_eq!(server.static_dir, Some(PathBuf::from("/site/public")));
        assert!(server.index.is_none());
        assert!(!server.live_reload_enabled);
    }

    #[test]
    fn test_live_reload_options_from_config() {
        let mut config = Config::default();
        config.live_reload.quiet = true;
        config.live_reload.transport = Transport::Poll;
        config.live_reload.debounce_ms = 75;
        config.live_reload.content_check = true;

        let options = live_reload_options_from_config(&config);

        assert!(options.quiet);
        assert_eq!(options.transport, Transport::Poll);
        assert_eq!(options.debounce, Duration::from_millis(75));
        assert_eq!(options.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(options.retry_delay, DEFAULT_RETRY_DELAY);
        assert_eq!(options.max_retries, DEFAULT_MAX_RETRIES);
        assert!(options.content_check);
        assert_eq!(options.mode, None);
    }

    #[test]
    fn test_watch_targets_from_config() {
        let mut config = Config::default();
        config.watch = vec![
            WatchEntry {
                path: PathBuf::from("/site/public/style.css"),
                extensions: None,
            },
            WatchEntry {
                path: PathBuf::from("/site/views"),
                extensions: Some(vec![".html".to_owned()]),
            },
        ];

        let targets = watch_targets_from_config(&config);

        assert_eq!(
            targets,
            vec![
                WatchTarget::file("/site/public/style.css"),
                WatchTarget::directory("/site/views", [".html"]),
            ]
        );
    }
}
