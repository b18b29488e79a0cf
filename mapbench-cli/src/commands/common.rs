//! Options shared by `run` and `compare`, and backend construction.

use std::time::Duration;

use clap::Args;
use mapbench::bench::Harness;
use mapbench::client::{Catalog, ComputeClient, InMemoryClient, ReqwestClient, RestClient, RestConfig};
use mapbench::config::{Backend, BenchConfig, ConfigFile};
use tracing::info;

use crate::error::CliError;

/// Trial options; each overrides the matching config file setting.
#[derive(Debug, Clone, Default, Args)]
pub struct TrialArgs {
    /// Compute backend: memory or rest
    #[arg(long)]
    pub backend: Option<Backend>,

    /// Seconds between export status polls
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Give up on an export after this many seconds
    #[arg(long, value_name = "SECS")]
    pub max_wait: Option<u64>,

    /// Skip the cache-bust probe before each trial
    #[arg(long)]
    pub no_cache_bust: bool,
}

impl TrialArgs {
    /// Applies the command-line overrides to a loaded config.
    pub fn apply(&self, mut config: ConfigFile) -> ConfigFile {
        if let Some(backend) = self.backend {
            config.service.backend = backend;
        }
        if let Some(secs) = self.poll_interval {
            config.benchmark.poll_interval_secs = secs;
        }
        if let Some(secs) = self.max_wait {
            config.benchmark.max_wait_secs = Some(secs);
        }
        if self.no_cache_bust {
            config.benchmark.cache_bust = false;
        }
        config
    }
}

/// Creates the compute client selected by `config`.
pub fn build_client(config: &ConfigFile) -> Result<Box<dyn ComputeClient>, CliError> {
    let service = &config.service;
    match service.backend {
        Backend::Memory => Ok(Box::new(
            InMemoryClient::new(Catalog::demo())
                .with_latency(Duration::from_millis(service.latency_ms))
                .with_max_elements(service.max_elements),
        )),
        Backend::Rest => {
            let (Some(endpoint), Some(project)) = (&service.endpoint, &service.project) else {
                return Err(CliError::Config(
                    "The rest backend needs service.endpoint and service.project. \
                     Set them with 'mapbench config init' and edit the file."
                        .to_string(),
                ));
            };
            let mut rest = RestConfig::new(endpoint.as_str(), project.as_str())
                .with_max_elements(service.max_elements);
            if let Some(token) = &service.token {
                rest = rest.with_token(token.as_str());
            }
            let http = ReqwestClient::with_timeout(service.timeout_secs)?;
            Ok(Box::new(RestClient::new(http, rest)))
        }
    }
}

/// Validates `config` and builds a harness over the selected backend.
pub fn build_harness(config: &ConfigFile) -> Result<Harness<Box<dyn ComputeClient>>, CliError> {
    config.validate()?;
    let bench = BenchConfig::from(config);
    bench.validate()?;

    let client = build_client(config)?;
    info!(
        backend = client.name(),
        poll_interval_secs = bench.poll_interval().as_secs(),
        cache_bust = bench.cache_bust(),
        "Harness ready"
    );

    let harness = Harness::new(client, bench.watcher());
    Ok(match bench.probe() {
        Some(probe) => harness.with_probe(probe),
        None => harness.without_probe(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply() {
        let args = TrialArgs {
            backend: Some(Backend::Rest),
            poll_interval: Some(2),
            max_wait: Some(30),
            no_cache_bust: true,
        };
        let config = args.apply(ConfigFile::default());
        assert_eq!(config.service.backend, Backend::Rest);
        assert_eq!(config.benchmark.poll_interval_secs, 2);
        assert_eq!(config.benchmark.max_wait_secs, Some(30));
        assert!(!config.benchmark.cache_bust);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let config = TrialArgs::default().apply(ConfigFile::default());
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = TrialArgs {
            poll_interval: Some(0),
            ..TrialArgs::default()
        }
        .apply(ConfigFile::default());
        assert!(matches!(build_harness(&config), Err(CliError::ConfigFile(_))));
    }

    #[test]
    fn test_memory_backend() {
        let client = build_client(&ConfigFile::default()).unwrap();
        assert_eq!(client.name(), "in-memory");
    }
}
