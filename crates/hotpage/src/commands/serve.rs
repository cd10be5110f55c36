//! `hotpage serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use hotpage_config::{CliSettings, Config, Transport};
use hotpage_server::{
    ENV_VAR, Mode, RELOAD_PATH, live_reload_options_from_config, run_server,
    server_config_from_config, watch_targets_from_config,
};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover hotpage.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory served at / (overrides config).
    #[arg(short, long)]
    static_dir: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Reload channel transport: push or poll (overrides config).
    #[arg(long)]
    transport: Option<Transport>,

    /// Do not log file changes.
    #[arg(short, long)]
    quiet: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable live reload (default: enabled).
    #[arg(long)]
    live_reload: Option<bool>,

    /// Disable live reload.
    #[arg(long, conflicts_with = "live_reload")]
    no_live_reload: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = self.cli_settings();
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        tracing::debug!(path = ?config.config_path, watch = config.watch.len(), "Configuration loaded");

        output.highlight(&format!(
            "Starting server on http://{}:{}",
            config.server.host, config.server.port
        ));
        if let Some(path) = &config.config_path {
            output.info(&format!("Config: {}", path.display()));
        }
        match &config.server.static_dir {
            Some(static_dir) => output.info(&format!("Static directory: {}", static_dir.display())),
            None => output.info("Static directory: none"),
        }
        if let Some(index) = &config.server.index {
            output.info(&format!("Index: {}", index.display()));
        }

        if !config.live_reload.enabled {
            output.info("Live reload: disabled");
        } else if Mode::from_env() == Mode::Production {
            output.info(&format!("Live reload: disabled ({ENV_VAR}=production)"));
        } else {
            output.info(&format!(
                "Live reload: {} transport on {RELOAD_PATH}",
                config.live_reload.transport
            ));
            if config.watch.is_empty() {
                output.warning("No [[watch]] entries configured, nothing will trigger a reload");
            }
            for entry in &config.watch {
                match &entry.extensions {
                    Some(extensions) => output.info(&format!(
                        "Watching: {} ({})",
                        entry.path.display(),
                        extensions.join(", ")
                    )),
                    None => output.info(&format!("Watching: {}", entry.path.display())),
                }
            }
        }

        run_server(
            server_config_from_config(&config),
            watch_targets_from_config(&config),
            live_reload_options_from_config(&config),
        )
        .await?;

        Ok(())
    }

    /// Build CLI settings from args.
    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            host: self.host.clone(),
            port: self.port,
            static_dir: self.static_dir.clone(),
            live_reload_enabled: self.resolve_live_reload_enabled(),
            quiet: self.quiet.then_some(true),
            transport: self.transport,
        }
    }

    /// Resolve `live_reload_enabled` from --live-reload/--no-live-reload flags.
    fn resolve_live_reload_enabled(&self) -> Option<bool> {
        self.no_live_reload.then_some(false).or(self.live_reload)
    }
}
