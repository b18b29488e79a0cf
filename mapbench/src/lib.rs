//! mapbench - batch versus iterative request benchmarking
//!
//! Measures how much faster a remote geospatial compute service answers when
//! a per-element computation is shipped once as a server-side `map` instead
//! of being driven from a client-side loop that issues one blocking request
//! per element.
//!
//! The pieces:
//!
//! - [`expr`] - the closed expression language sent to the service
//! - [`client`] - the [`ComputeClient`](client::ComputeClient) facade with
//!   REST, in-memory and request-counting implementations
//! - [`variant`] - iterative and mapped runners for the same transform
//! - [`job`] - export jobs and the polling [`JobWatcher`](job::JobWatcher)
//! - [`probe`] - the cache-bust probe run before each trial
//! - [`bench`] - the timing [`Harness`](bench::Harness)
//! - [`scenario`] - the built-in workloads
//! - [`config`] and [`logging`] - INI configuration and tracing setup

pub mod bench;
pub mod client;
pub mod config;
pub mod expr;
pub mod geometry;
pub mod job;
pub mod logging;
pub mod probe;
pub mod record;
pub mod request;
pub mod scenario;
pub mod variant;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
