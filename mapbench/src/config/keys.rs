//! Addressable configuration keys (`section.key`).

use std::path::PathBuf;
use std::str::FromStr;

use super::{Backend, ConfigError, ConfigFile};

/// One setting in the configuration file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    Backend,
    Endpoint,
    Project,
    Token,
    TimeoutSecs,
    MaxElements,
    LatencyMs,
    PollIntervalSecs,
    MaxWaitSecs,
    CacheBust,
    CacheBustDataset,
    CacheBustLimit,
    LogLevel,
    LogFile,
}

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::Backend,
            ConfigKey::Endpoint,
            ConfigKey::Project,
            ConfigKey::Token,
            ConfigKey::TimeoutSecs,
            ConfigKey::MaxElements,
            ConfigKey::LatencyMs,
            ConfigKey::PollIntervalSecs,
            ConfigKey::MaxWaitSecs,
            ConfigKey::CacheBust,
            ConfigKey::CacheBustDataset,
            ConfigKey::CacheBustLimit,
            ConfigKey::LogLevel,
            ConfigKey::LogFile,
        ]
    }

    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::Backend
            | ConfigKey::Endpoint
            | ConfigKey::Project
            | ConfigKey::Token
            | ConfigKey::TimeoutSecs
            | ConfigKey::MaxElements
            | ConfigKey::LatencyMs => "service",
            ConfigKey::PollIntervalSecs
            | ConfigKey::MaxWaitSecs
            | ConfigKey::CacheBust
            | ConfigKey::CacheBustDataset
            | ConfigKey::CacheBustLimit => "benchmark",
            ConfigKey::LogLevel | ConfigKey::LogFile => "logging",
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::Backend => "backend",
            ConfigKey::Endpoint => "endpoint",
            ConfigKey::Project => "project",
            ConfigKey::Token => "token",
            ConfigKey::TimeoutSecs => "timeout_secs",
            ConfigKey::MaxElements => "max_elements",
            ConfigKey::LatencyMs => "latency_ms",
            ConfigKey::PollIntervalSecs => "poll_interval_secs",
            ConfigKey::MaxWaitSecs => "max_wait_secs",
            ConfigKey::CacheBust => "cache_bust",
            ConfigKey::CacheBustDataset => "cache_bust_dataset",
            ConfigKey::CacheBustLimit => "cache_bust_limit",
            ConfigKey::LogLevel => "level",
            ConfigKey::LogFile => "file",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as written to the file; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        let service = &config.service;
        let bench = &config.benchmark;
        match self {
            ConfigKey::Backend => service.backend.to_string(),
            ConfigKey::Endpoint => service.endpoint.clone().unwrap_or_default(),
            ConfigKey::Project => service.project.clone().unwrap_or_default(),
            ConfigKey::Token => service.token.clone().unwrap_or_default(),
            ConfigKey::TimeoutSecs => service.timeout_secs.to_string(),
            ConfigKey::MaxElements => service.max_elements.to_string(),
            ConfigKey::LatencyMs => service.latency_ms.to_string(),
            ConfigKey::PollIntervalSecs => bench.poll_interval_secs.to_string(),
            ConfigKey::MaxWaitSecs => bench.max_wait_secs.map(|s| s.to_string()).unwrap_or_default(),
            ConfigKey::CacheBust => bench.cache_bust.to_string(),
            ConfigKey::CacheBustDataset => bench.cache_bust_dataset.clone(),
            ConfigKey::CacheBustLimit => bench.cache_bust_limit.to_string(),
            ConfigKey::LogLevel => config.logging.level.clone(),
            ConfigKey::LogFile => config
                .logging
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Parses `value` into `config`. An empty value clears optional keys.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let service = &mut config.service;
        let bench = &mut config.benchmark;
        match self {
            ConfigKey::Backend => service.backend = self.parse::<Backend>(value)?,
            ConfigKey::Endpoint => service.endpoint = optional(value),
            ConfigKey::Project => service.project = optional(value),
            ConfigKey::Token => service.token = optional(value),
            ConfigKey::TimeoutSecs => service.timeout_secs = self.parse(value)?,
            ConfigKey::MaxElements => service.max_elements = self.parse(value)?,
            ConfigKey::LatencyMs => service.latency_ms = self.parse(value)?,
            ConfigKey::PollIntervalSecs => bench.poll_interval_secs = self.parse(value)?,
            ConfigKey::MaxWaitSecs => {
                bench.max_wait_secs = match value {
                    "" => None,
                    v => Some(self.parse(v)?),
                }
            }
            ConfigKey::CacheBust => bench.cache_bust = self.parse_bool(value)?,
            ConfigKey::CacheBustDataset => bench.cache_bust_dataset = value.to_string(),
            ConfigKey::CacheBustLimit => bench.cache_bust_limit = self.parse(value)?,
            ConfigKey::LogLevel => config.logging.level = value.to_string(),
            ConfigKey::LogFile => config.logging.file = optional(value).map(PathBuf::from),
        }
        Ok(())
    }

    fn parse<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        value.parse().map_err(|e: T::Err| self.invalid(value, e.to_string()))
    }

    fn parse_bool(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid(value, "expected true or false".to_string())),
        }
    }

    fn invalid(&self, value: &str, reason: String) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason,
        }
    }
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}
