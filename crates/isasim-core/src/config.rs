//! Configuration loading and typed config structures for the simulator.
//!
//! Values come from three layers, lowest precedence first: built-in
//! defaults, an optional YAML file named by `ISASIM_CONFIG`, and
//! individual environment variables. [`SimulatorConfig::load`] applies all
//! three and validates the result.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Environment variable naming an optional YAML config file.
pub const CONFIG_PATH_VAR: &str = "ISASIM_CONFIG";

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

    /// An environment variable held a value that could not be parsed.
    #[error("invalid {name}: {message}")]
    Env {
        /// The variable name.
        name: String,
        /// Why the value was rejected.
        message: String,
    },

    /// A value parsed but is outside its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulator configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulatorConfig {
    /// Listen address.
    #[serde(default)]
    pub server: ListenConfig,

    /// Stream pacing and control latency.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Event table generation.
    #[serde(default)]
    pub events: EventTableConfig,
}

impl SimulatorConfig {
    /// Load configuration from defaults, the optional YAML file named by
    /// [`CONFIG_PATH_VAR`], and environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, an
    /// override cannot be parsed, or the result fails [`validate`](Self::validate).
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    ///
    /// Recognised variables: `HOST`, `PORT`, `TICK_INTERVAL_MS`,
    /// `RESPONSE_DELAY_MS`, `ERROR_PROBABILITY`, `EVENT_SEED`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if a present variable does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_var(&lookup, "PORT")? {
            self.server.port = port;
        }
        if let Some(ms) = parse_var(&lookup, "TICK_INTERVAL_MS")? {
            self.stream.tick_interval_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "RESPONSE_DELAY_MS")? {
            self.stream.response_delay_ms = ms;
        }
        if let Some(p) = parse_var(&lookup, "ERROR_PROBABILITY")? {
            self.events.error_probability = p;
        }
        if let Some(seed) = parse_var(&lookup, "EVENT_SEED")? {
            self.events.seed = Some(seed);
        }
        Ok(())
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero tick interval or an
    /// error probability outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "stream.tick_interval_ms must be at least 1".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&self.events.error_probability) {
            return Err(ConfigError::Invalid(format!(
                "events.error_probability must be within [0, 1], got {}",
                self.events.error_probability
            )));
        }
        Ok(())
    }
}

/// Parse an optional variable, mapping parse failures to [`ConfigError::Env`].
fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Env {
                name: name.to_owned(),
                message: format!("{e}"),
            })
        })
        .transpose()
}

/// Listen address configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Stream pacing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamConfig {
    /// Milliseconds between timer ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Artificial latency before control endpoints reply. 0 disables it.
    #[serde(default = "default_response_delay_ms")]
    pub response_delay_ms: u64,
}

impl StreamConfig {
    /// Tick period as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Control endpoint latency as a [`Duration`].
    pub const fn response_delay(&self) -> Duration {
        Duration::from_millis(self.response_delay_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            response_delay_ms: default_response_delay_ms(),
        }
    }
}

/// Event table generation configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventTableConfig {
    /// Chance that any single event is a fault instead of progress.
    /// Fault injection is off by default.
    #[serde(default)]
    pub error_probability: f64,

    /// Fixed RNG seed. When unset the table differs on every start.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    900
}

const fn default_tick_interval_ms() -> u64 {
    2_000
}

const fn default_response_delay_ms() -> u64 {
    2_000
}
