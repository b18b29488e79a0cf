//! Configuration file handling.
//!
//! Settings live in an INI file, by default at
//! `~/.config/mapbench/config.ini`:
//!
//! ```ini
//! [service]
//! backend = memory
//! endpoint = https://compute.example.com
//! project = my-project
//! timeout_secs = 30
//! max_elements = 5000
//!
//! [benchmark]
//! poll_interval_secs = 5
//! cache_bust = true
//! cache_bust_dataset = NASA/ORNL/DAYMET
//! cache_bust_limit = 5000
//!
//! [logging]
//! level = info
//! ```
//!
//! A missing file means defaults. The `MAPBENCH_TOKEN` environment variable
//! takes precedence over `service.token`.

mod keys;

pub use keys::ConfigKey;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::client::MAX_LITERAL_ELEMENTS;
use crate::job::{JobWatcher, DEFAULT_POLL_INTERVAL};
use crate::probe::{CacheBustProbe, DEFAULT_PROBE_DATASET};

/// Environment variable overriding `service.token`.
pub const TOKEN_ENV: &str = "MAPBENCH_TOKEN";

/// Default HTTP timeout for the REST backend.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors from loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("No config directory available on this platform")]
    NoConfigDir,
}

/// Which compute backend to run against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    /// The in-process reference backend over the demo catalog.
    #[default]
    Memory,
    /// A REST compute service.
    Rest,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Rest => "rest",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "rest" => Ok(Backend::Rest),
            other => Err(format!("unknown backend '{}' (expected memory or rest)", other)),
        }
    }
}

/// `[service]` section.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceSettings {
    pub backend: Backend,
    pub endpoint: Option<String>,
    pub project: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: u64,
    /// Provider cap on literal results.
    pub max_elements: usize,
    /// Simulated round-trip latency for the memory backend.
    pub latency_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            endpoint: None,
            project: None,
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_elements: MAX_LITERAL_ELEMENTS,
            latency_ms: 0,
        }
    }
}

/// `[benchmark]` section.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkSettings {
    pub poll_interval_secs: u64,
    /// Unset means wait as long as the job takes.
    pub max_wait_secs: Option<u64>,
    pub cache_bust: bool,
    pub cache_bust_dataset: String,
    pub cache_bust_limit: usize,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            max_wait_secs: None,
            cache_bust: true,
            cache_bust_dataset: DEFAULT_PROBE_DATASET.to_string(),
            cache_bust_limit: MAX_LITERAL_ELEMENTS,
        }
    }
}

/// `[logging]` section.
#[derive(Clone, Debug, PartialEq)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` overrides it.
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Contents of the configuration file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigFile {
    pub service: ServiceSettings,
    pub benchmark: BenchmarkSettings,
    pub logging: LoggingSettings,
}

/// Default location of the configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mapbench")
        .join("config.ini")
}

impl ConfigFile {
    /// Loads from the default path, applying the environment override.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Loads from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            Self::from_ini(&ini)?
        } else {
            Self::default()
        };
        Ok(config.with_token_override(std::env::var(TOKEN_ENV).ok()))
    }

    /// Writes to the default path, creating its directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.to_ini().write_to_file(path).map_err(write_err)
    }

    /// Replaces the token when `token` is a non-empty value.
    pub fn with_token_override(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.service.token = Some(token);
        }
        self
    }

    /// Checks values that parse but cannot be run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: ConfigKey, reason: &str| ConfigError::InvalidValue {
            key: key.name(),
            value: key.get(self),
            reason: reason.to_string(),
        };

        if self.benchmark.poll_interval_secs == 0 {
            return Err(invalid(ConfigKey::PollIntervalSecs, "must be greater than zero"));
        }
        if self.service.max_elements == 0 {
            return Err(invalid(ConfigKey::MaxElements, "must be greater than zero"));
        }
        if self.service.timeout_secs == 0 {
            return Err(invalid(ConfigKey::TimeoutSecs, "must be greater than zero"));
        }
        if self.service.backend == Backend::Rest {
            if self.service.endpoint.is_none() {
                return Err(invalid(ConfigKey::Endpoint, "required for the rest backend"));
            }
            if self.service.project.is_none() {
                return Err(invalid(ConfigKey::Project, "required for the rest backend"));
            }
        }
        Ok(())
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|section| section.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section())).set(key.key_name(), value);
            }
        }
        ini
    }
}

/// Runtime benchmark settings, resolved from a [`ConfigFile`] or built
/// directly.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchConfig {
    poll_interval: Duration,
    max_wait: Option<Duration>,
    cache_bust: bool,
    probe_dataset: String,
    probe_limit: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::from(&ConfigFile::default())
    }
}

impl From<&ConfigFile> for BenchConfig {
    fn from(config: &ConfigFile) -> Self {
        let bench = &config.benchmark;
        Self {
            poll_interval: Duration::from_secs(bench.poll_interval_secs),
            max_wait: bench.max_wait_secs.map(Duration::from_secs),
            cache_bust: bench.cache_bust,
            probe_dataset: bench.cache_bust_dataset.clone(),
            probe_limit: bench.cache_bust_limit.min(config.service.max_elements),
        }
    }
}

impl BenchConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_cache_bust(mut self, enabled: bool) -> Self {
        self.cache_bust = enabled;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait
    }

    pub fn cache_bust(&self) -> bool {
        self.cache_bust
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: ConfigKey::PollIntervalSecs.name(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Watcher polling at the configured interval. Call [`validate`](Self::validate) first.
    pub fn watcher(&self) -> JobWatcher {
        let watcher = JobWatcher::new(self.poll_interval);
        match self.max_wait {
            Some(max_wait) => watcher.with_max_wait(max_wait),
            None => watcher,
        }
    }

    /// The cache-bust probe, or `None` when disabled.
    pub fn probe(&self) -> Option<CacheBustProbe> {
        self.cache_bust
            .then(|| CacheBustProbe::new(self.probe_dataset.clone(), self.probe_limit))
    }
}
