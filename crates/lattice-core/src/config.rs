//! Configuration loading and typed config structures for the Lattice server.
//!
//! The configuration lives in `lattice-config.yaml` (the path can be changed
//! with `LATTICE_CONFIG`). Every field has a default, so a missing file or an
//! empty document yields a working server. After parsing, the historical
//! environment variables are applied on top:
//!
//! - `LISTEN_HOST` overrides `server.host`
//! - `LISTEN_PORT` overrides `server.port`
//! - `ITERATION_TIME_STEP` overrides `simulation.tick_interval_ms`
//!
//! Bad values never abort startup. They are logged and replaced with the
//! default.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "LATTICE_CONFIG";

/// Configuration file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "lattice-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LatticeConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Tick scheduling.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Resource limits for world creation.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LatticeConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load from the configured path, falling back to defaults (plus
    /// environment overrides) when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
        let path = Path::new(&path);
        if path.exists() {
            return Self::from_file(path);
        }
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_without_env(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a YAML string without consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse_without_env(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.sanitize();
        Ok(config)
    }

    /// Apply `LISTEN_HOST`, `LISTEN_PORT` and `ITERATION_TIME_STEP`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("LISTEN_HOST") {
            self.server.host = host;
        }
        if let Some(raw) = lookup("LISTEN_PORT") {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(e) => {
                    warn!(value = %raw, error = %e, "LISTEN_PORT is not a valid port, ignoring");
                }
            }
        }
        if let Some(raw) = lookup("ITERATION_TIME_STEP") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.simulation.tick_interval_ms = ms,
                Err(e) => {
                    warn!(value = %raw, error = %e, "ITERATION_TIME_STEP is not a number, ignoring");
                }
            }
        }
        self.sanitize();
    }

    /// Replace unusable values with their defaults.
    fn sanitize(&mut self) {
        if self.server.host.trim().is_empty() {
            warn!("server.host is empty, using {}", default_host());
            self.server.host = default_host();
        }
        if self.server.port == 0 {
            warn!("server.port is 0, using {}", default_port());
            self.server.port = default_port();
        }
        if self.simulation.tick_interval_ms == 0 {
            warn!(
                "simulation.tick_interval_ms is 0, using {}",
                default_tick_interval_ms()
            );
            self.simulation.tick_interval_ms = default_tick_interval_ms();
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Address to bind. `::` listens on every interface.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl SimulationConfig {
    /// The tick interval as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Limits applied when clients create worlds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LimitsConfig {
    /// Largest `width * height` a new world may have. `0` disables the
    /// check.
    #[serde(default = "default_max_world_cells")]
    pub max_world_cells: u64,
}

impl LimitsConfig {
    /// Whether a `width x height` world is within the limit.
    pub fn allows(&self, width: u32, height: u32) -> bool {
        self.max_world_cells == 0 || u64::from(width).saturating_mul(u64::from(height)) <= self.max_world_cells
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_world_cells: default_max_world_cells(),
        }
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "::".to_owned()
}

const fn default_port() -> u16 {
    8080
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_max_world_cells() -> u64 {
    16_777_216
}

fn default_log_level() -> String {
    "info".to_owned()
}
