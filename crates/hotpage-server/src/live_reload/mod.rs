//! Live reload installation.
//!
//! [`setup`] wires the whole feature into a host router:
//!
//! ```text
//! notify ──► PathWatcher ──mpsc──► ChangePipeline ──► ClientRegistry
//!                                                      │
//!                         GET /hotpage-reload ◄────────┘ (SSE or long poll)
//!
//! host routes ──► ResponseInjector ──► HTML with bootstrap script
//! ```
//!
//! The watchers and the pipeline of one call live as long as the returned
//! router or [`LiveReload`] handle, whichever goes last. Separate calls never
//! share clients or watchers.

mod bootstrap;
mod pipeline;
mod registry;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tokio::task::JoinHandle;

use hotpage_watch::{
    ChangeCoalescer, ConfigurationError, DEFAULT_DEBOUNCE, PathWatcher, WatchArmingError,
    WatchTarget, arm_all, validate_targets,
};

pub(crate) use bootstrap::SCRIPT_OPEN;
pub use bootstrap::{BootstrapConfig, ClientEvent, ClientState};
pub use registry::{
    BroadcastReport, ClientRegistry, ConnectedClient, DeliveryError, Registration, ReloadMessage,
};
pub use transport::Transport;

use crate::middleware::inject::{ResponseInjector, inject_script};
use pipeline::ChangePipeline;
use transport::{ReloadState, reload_handler};

/// Path of the reload endpoint.
pub const RELOAD_PATH: &str = "/hotpage-reload";

/// Environment variable selecting the deployment mode.
pub const ENV_VAR: &str = "HOTPAGE_ENV";

/// Default longest hold of a poll request.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default delay before the browser reconnects.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Default number of consecutive failures before the browser gives up.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Deployment mode, gating the whole feature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Live reload active.
    #[default]
    Development,
    /// Live reload inert.
    Production,
}

impl Mode {
    /// Read the mode from `HOTPAGE_ENV`.
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(ENV_VAR).ok().as_deref())
    }

    /// Interpret an environment value; only `production` disables the feature.
    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(value) if value.trim().eq_ignore_ascii_case("production") => Self::Production,
            _ => Self::Development,
        }
    }
}

/// Live reload options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveReloadOptions {
    /// Suppress change and arming logs.
    pub quiet: bool,
    /// Reload channel transport.
    pub transport: Transport,
    /// Coalescing window for change bursts.
    pub debounce: Duration,
    /// Longest hold of a poll request; zero holds until the next reload.
    pub poll_interval: Duration,
    /// Delay before the browser reconnects after a failure.
    pub retry_delay: Duration,
    /// Consecutive failures after which the browser stops reconnecting.
    pub max_retries: u32,
    /// Skip changes that leave the file bytes identical.
    pub content_check: bool,
    /// Deployment mode; `None` reads [`ENV_VAR`].
    pub mode: Option<Mode>,
}

impl Default for LiveReloadOptions {
    fn default() -> Self {
        Self {
            quiet: false,
            transport: Transport::default(),
            debounce: DEFAULT_DEBOUNCE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            content_check: false,
            mode: None,
        }
    }
}

impl LiveReloadOptions {
    fn poll_hold(&self) -> Option<Duration> {
        (!self.poll_interval.is_zero()).then_some(self.poll_interval)
    }

    fn bootstrap(&self) -> BootstrapConfig {
        BootstrapConfig {
            endpoint: RELOAD_PATH.to_owned(),
            transport: self.transport,
            retry_delay: self.retry_delay,
            max_retries: self.max_retries,
        }
    }
}

/// Result of [`setup`].
pub struct Setup<S = ()> {
    /// The host router, with live reload installed in development mode.
    pub router: Router<S>,
    /// Running live reload, `None` in production mode.
    pub live_reload: Option<LiveReload>,
}

/// Watchers and change pipeline of one installation.
///
/// Shared by the reload route and [`LiveReload`]; the pipeline task is
/// aborted and the watchers stop when the last owner is dropped.
#[derive(Debug)]
pub(crate) struct Installation {
    watchers: Vec<PathWatcher>,
    pipeline: JoinHandle<()>,
}

impl Drop for Installation {
    fn drop(&mut self) {
        self.pipeline.abort();
    }
}

/// Handle on a running installation.
///
/// Live reload keeps running while either this handle or the router from
/// [`setup`] is alive. Once both are gone, connected browsers see their
/// channel fail and retry until they give up.
pub struct LiveReload {
    registry: ClientRegistry,
    installation: Arc<Installation>,
    arming_failures: Vec<WatchArmingError>,
}

impl std::fmt::Debug for LiveReload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveReload")
            .field("registry", &self.registry)
            .field("watchers", &self.installation.watchers)
            .field("arming_failures", &self.arming_failures.len())
            .finish_non_exhaustive()
    }
}

impl LiveReload {
    /// Connected browser sessions.
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Armed watchers, one per target that could be watched.
    pub fn watchers(&self) -> &[PathWatcher] {
        &self.installation.watchers
    }

    /// Targets that could not be watched.
    pub fn arming_failures(&self) -> &[WatchArmingError] {
        &self.arming_failures
    }
}

/// Install live reload on `router`.
///
/// Adds `GET /hotpage-reload` and wraps every route registered so far with
/// the script injector, so host routes (including the fallback) must be in
/// place before calling this. Must be called inside a Tokio runtime.
///
/// In production mode the router is returned untouched and nothing is
/// validated or armed. Targets that cannot be watched are reported and
/// skipped; the remaining targets stay live.
///
/// # Errors
///
/// Returns [`ConfigurationError`] if a directory target lacks extensions.
/// Nothing is armed or registered in that case.
pub fn setup<S>(
    router: Router<S>,
    targets: &[WatchTarget],
    options: LiveReloadOptions,
) -> Result<Setup<S>, ConfigurationError>
where
    S: Clone + Send + Sync + 'static,
{
    let mode = options.mode.unwrap_or_else(Mode::from_env);
    if mode == Mode::Production {
        tracing::debug!("Production mode, live reload disabled");
        return Ok(Setup {
            router,
            live_reload: None,
        });
    }

    let targets = validate_targets(targets)?;
    let registry = ClientRegistry::new();

    let (tx, rx) = pipeline::channel();
    let (watchers, arming_failures) = arm_all(targets, pipeline::sink(tx));
    if !options.quiet {
        for failure in &arming_failures {
            tracing::warn!(error = %failure, "Watch target disabled");
        }
    }

    let pipeline = ChangePipeline::new(
        ChangeCoalescer::new(options.debounce),
        registry.clone(),
        options.quiet,
        options.content_check,
    );
    let installation = Arc::new(Installation {
        watchers,
        pipeline: tokio::spawn(pipeline.run(rx)),
    });

    let reload_state = ReloadState {
        registry: registry.clone(),
        transport: options.transport,
        poll_hold: options.poll_hold(),
        _installation: Some(Arc::clone(&installation)),
    };
    let injector = ResponseInjector::new(options.bootstrap().render());

    let router = router
        .route(RELOAD_PATH, get(reload_handler).with_state(reload_state))
        .layer(axum::middleware::from_fn_with_state(injector, inject_script));

    tracing::info!(
        watching = installation.watchers.len(),
        failed = arming_failures.len(),
        transport = ?options.transport,
        "Live reload enabled"
    );

    Ok(Setup {
        router,
        live_reload: Some(LiveReload {
            registry,
            installation,
            arming_failures,
        }),
    })
}
