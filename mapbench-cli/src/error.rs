//! CLI error type.

use mapbench::bench::BenchError;
use mapbench::client::ClientError;
use mapbench::config::ConfigError;
use mapbench::logging::LoggingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("Client setup failed: {0}")]
    Client(#[from] ClientError),

    #[error("Trial failed: {0}")]
    Bench(#[from] BenchError),
}
