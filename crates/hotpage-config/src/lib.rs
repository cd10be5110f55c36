//! Configuration management for hotpage.
//!
//! Parses `hotpage.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override the static files directory.
    pub static_dir: Option<PathBuf>,
    /// Override live reload enabled flag.
    pub live_reload_enabled: Option<bool>,
    /// Override live reload quiet flag.
    pub quiet: Option<bool>,
    /// Override the reload channel transport.
    pub transport: Option<Transport>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "hotpage.toml";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Live reload configuration.
    pub live_reload: LiveReloadConfig,
    /// Watched files and directories (`[[watch]]` entries).
    pub watch: Vec<WatchEntry>,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Directory served at `/`.
    pub static_dir: Option<PathBuf>,
    /// Document served for `/`, taking precedence over the static directory.
    pub index: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 3000,
            static_dir: None,
            index: None,
        }
    }
}

/// How the reload channel reaches the browser.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Server-sent event stream.
    #[default]
    Push,
    /// Long-poll request held until the next reload.
    Poll,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Push => "push",
            Self::Poll => "poll",
        })
    }
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "push" => Ok(Self::Push),
            "poll" => Ok(Self::Poll),
            _ => Err(ConfigError::Validation(format!(
                "unknown transport '{s}', expected 'push' or 'poll'"
            ))),
        }
    }
}

/// Live reload configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveReloadConfig {
    /// Whether live reload is enabled.
    pub enabled: bool,
    /// Suppress change and arming logs.
    pub quiet: bool,
    /// Reload channel transport.
    pub transport: Transport,
    /// Coalescing window in milliseconds.
    pub debounce_ms: u64,
    /// Longest hold of a poll request in milliseconds; 0 holds until reload.
    pub poll_interval_ms: u64,
    /// Browser reconnect delay in milliseconds.
    pub retry_delay_ms: u64,
    /// Consecutive failures after which the browser stops reconnecting.
    pub max_retries: u32,
    /// Suppress reloads for files whose content did not change.
    pub content_check: bool,
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quiet: false,
            transport: Transport::Push,
            debounce_ms: 50,
            poll_interval_ms: 30_000,
            retry_delay_ms: 1000,
            max_retries: 10,
            content_check: false,
        }
    }
}

impl LiveReloadConfig {
    /// Coalescing window.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Longest hold of a poll request.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Browser reconnect delay.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// One `[[watch]]` entry.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct WatchEntry {
    /// File or directory to watch.
    pub path: PathBuf,
    /// Name suffixes to react to; required for directories.
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a numeric field to be positive.
fn require_positive(value: u64, field: &str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `hotpage.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(static_dir) = &settings.static_dir {
            self.server.static_dir = Some(static_dir.clone());
        }
        if let Some(enabled) = settings.live_reload_enabled {
            self.live_reload.enabled = enabled;
        }
        if let Some(quiet) = settings.quiet {
            self.live_reload.quiet = quiet;
        }
        if let Some(transport) = settings.transport {
            self.live_reload.transport = transport;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file and after CLI settings
    /// are applied.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_live_reload()?;
        self.validate_watch()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        // Port 0 lets the OS pick, which leaves the browser nowhere to go
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        Ok(())
    }

    fn validate_live_reload(&self) -> Result<(), ConfigError> {
        let live_reload = &self.live_reload;
        require_positive(live_reload.debounce_ms, "live_reload.debounce_ms")?;
        require_positive(live_reload.retry_delay_ms, "live_reload.retry_delay_ms")?;
        require_positive(
            u64::from(live_reload.max_retries),
            "live_reload.max_retries",
        )?;
        Ok(())
    }

    fn validate_watch(&self) -> Result<(), ConfigError> {
        for entry in &self.watch {
            if entry.path.as_os_str().is_empty() {
                return Err(ConfigError::Validation(
                    "watch.path cannot be empty".to_owned(),
                ));
            }
        }
        Ok(())
    }

    /// Resolve relative paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: &mut PathBuf| *path = config_dir.join(&*path);

        if let Some(static_dir) = self.server.static_dir.as_mut() {
            resolve(static_dir);
        }
        if let Some(index) = self.server.index.as_mut() {
            resolve(index);
        }
        for entry in &mut self.watch {
            if !entry.path.as_os_str().is_empty() {
                resolve(&mut entry.path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert!(config.server.static_dir.is_none());
        assert!(config.live_reload.enabled);
        assert!(!config.live_reload.quiet);
        assert_eq!(config.live_reload.transport, Transport::Push);
        assert_eq!(config.live_reload.debounce(), Duration::from_millis(50));
        assert_eq!(config.live_reload.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.live_reload.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.live_reload.max_retries, 10);
        assert!(config.watch.is_empty());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.watch.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "0.0.0.0"
port = 8080
static_dir = "public"
index = "views/hello-world.html"

[live_reload]
quiet = true
transport = "poll"
debounce_ms = 100
poll_interval_ms = 0
content_check = true

[[watch]]
path = "public/style.css"

[[watch]]
path = "views"
extensions = [".html"]
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.static_dir, Some(PathBuf::from("public")));
        assert!(config.live_reload.quiet);
        assert_eq!(config.live_reload.transport, Transport::Poll);
        assert_eq!(config.live_reload.debounce_ms, 100);
        assert!(config.live_reload.poll_interval().is_zero());
        assert!(config.live_reload.content_check);
        assert_eq!(
            config.watch,
            vec![
                WatchEntry {
                    path: PathBuf::from("public/style.css"),
                    extensions: None,
                },
                WatchEntry {
                    path: PathBuf::from("views"),
                    extensions: Some(vec![".html".to_owned()]),
                },
            ]
        );
    }

    #[test]
    fn test_parse_unknown_transport_fails() {
        let toml = r#"
[live_reload]
transport = "websocket"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_transport_from_str() {
        assert_eq!("push".parse::<Transport>().unwrap(), Transport::Push);
        assert_eq!("POLL".parse::<Transport>().unwrap(), Transport::Poll);
        assert!("sse".parse::<Transport>().is_err());
        assert_eq!(Transport::Poll.to_string(), "poll");
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[server]
static_dir = "public"
index = "views/index.html"

[[watch]]
path = "views"
extensions = [".html"]

[[watch]]
path = "/abs/style.css"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(
            config.server.static_dir,
            Some(PathBuf::from("/project/public"))
        );
        assert_eq!(
            config.server.index,
            Some(PathBuf::from("/project/views/index.html"))
        );
        assert_eq!(config.watch[0].path, PathBuf::from("/project/views"));
        // Absolute paths are kept
        assert_eq!(config.watch[1].path, PathBuf::from("/abs/style.css"));
    }

    #[test]
    fn test_apply_cli_settings_host() {
        let mut config = Config::default();
        let overrides = CliSettings {
            host: Some("0.0.0.0".to_owned()),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000); // Unchanged
    }

    #[test]
    fn test_apply_cli_settings_live_reload() {
        let mut config = Config::default();
        let overrides = CliSettings {
            live_reload_enabled: Some(false),
            quiet: Some(true),
            transport: Some(Transport::Poll),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert!(!config.live_reload.enabled);
        assert!(config.live_reload.quiet);
        assert_eq!(config.live_reload.transport, Transport::Poll);
    }

    #[test]
    fn test_apply_cli_settings_multiple() {
        let mut config = Config::default();
        let overrides = CliSettings {
            port: Some(9000),
            static_dir: Some(PathBuf::from("site")),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.static_dir, Some(PathBuf::from("site")));
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default();

        config.apply_cli_settings(&CliSettings::default());

        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.live_reload.enabled);
    }

    #[test]
    fn test_validate_default_config_passes() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_server_host_empty() {
        let mut config = Config::default();
        config.server.host = String::new();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.host"));
    }

    #[test]
    fn test_validate_server_port_zero() {
        let mut config = Config::default();
        config.server.port = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_validate_debounce_zero() {
        let mut config = Config::default();
        config.live_reload.debounce_ms = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("live_reload.debounce_ms"));
    }

    #[test]
    fn test_validate_max_retries_zero() {
        let mut config = Config::default();
        config.live_reload.max_retries = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("live_reload.max_retries"));
    }

    #[test]
    fn test_validate_zero_poll_interval_allowed() {
        let mut config = Config::default();
        config.live_reload.poll_interval_ms = 0;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_watch_path() {
        let mut config = Config::default();
        config.watch.push(WatchEntry {
            path: PathBuf::new(),
            extensions: None,
        });

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("watch.path"));
    }

    #[test]
    fn test_load_explicit_path_not_found() {
        let result = Config::load(Some(Path::new("/nonexistent/hotpage.toml")), None);

        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_from_file_resolves_relative_to_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &config_path,
            r#"
[server]
static_dir = "public"

[[watch]]
path = "views"
extensions = [".html"]
"#,
        )
        .unwrap();

        let config = Config::load(Some(&config_path), None).unwrap();

        assert_eq!(config.config_path, Some(config_path));
        assert_eq!(
            config.server.static_dir,
            Some(temp_dir.path().join("public"))
        );
        assert_eq!(config.watch[0].path, temp_dir.path().join("views"));
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(&config_path, "[server\nport = ").unwrap();

        let result = Config::load(Some(&config_path), None);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_cli_settings_are_validated() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(&config_path, "").unwrap();
        let overrides = CliSettings {
            host: Some(String::new()),
            ..Default::default()
        };

        let result = Config::load(Some(&config_path), Some(&overrides));

        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
