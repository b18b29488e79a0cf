//! Remote compute service abstraction.
//!
//! [`ComputeClient`] is the facade every variant runner talks to. It is
//! deliberately small: evaluate an expression synchronously, submit an
//! export, and poll a job. Everything else (`length`, `fetch_all`,
//! `submit_map`, `submit_flat_map`) is derived from `evaluate` by default.
//!
//! # Backends
//!
//! - [`RestClient`] - JSON over HTTP via an injectable [`HttpClient`]
//! - [`InMemoryClient`] - local reference evaluator over a [`Catalog`] of
//!   synthetic rasters, for tests and offline demos
//! - [`CountingClient`] - decorator counting requests per category
//!
//! # Example
//!
//! ```
//! use mapbench::client::{Catalog, ComputeClient, InMemoryClient};
//! use mapbench::expr::Expr;
//!
//! let client = InMemoryClient::new(Catalog::demo());
//! let n = client.length(&Expr::dataset("NASA/ORNL/DAYMET").limit(10)).unwrap();
//! assert_eq!(n, 10);
//! ```

mod counting;
mod error;
mod http;
pub mod memory;
mod rest;

pub use counting::{CountingClient, RequestCounts};
pub use error::ClientError;
pub use http::{HttpClient, ReqwestClient};
pub use memory::{Catalog, Grid, Image, InMemoryClient, JobScript};
pub use rest::{RestClient, RestConfig};

#[cfg(test)]
pub use http::tests::MockHttpClient;

use std::sync::Arc;

use crate::expr::{Expr, Value};
use crate::job::{ExportRequest, JobHandle, JobStatus};

/// Provider cap on the number of elements a literal result may hold.
pub const MAX_LITERAL_ELEMENTS: usize = 5000;

/// Longest numeric sequence a service will enumerate.
pub const MAX_SEQUENCE: usize = 10_000_000;

/// Values of the inclusive sequence from `start` to `end` by `step`.
///
/// An empty range (end before start for a positive step) yields no values.
/// A zero or non-finite step, non-finite bounds and sequences longer than
/// [`MAX_SEQUENCE`] are rejected as malformed.
pub(crate) fn sequence_values(start: f64, end: f64, step: f64) -> Result<Vec<f64>, ClientError> {
    if step == 0.0 || !step.is_finite() || !start.is_finite() || !end.is_finite() {
        return Err(ClientError::malformed("sequence expects a finite, non-zero step"));
    }
    let span = ((end - start) / step).floor();
    if span >= MAX_SEQUENCE as f64 {
        return Err(ClientError::malformed(format!(
            "sequence longer than {} elements",
            MAX_SEQUENCE
        )));
    }
    let count = if span < 0.0 { 0 } else { span as usize + 1 };
    Ok((0..count).map(|i| start + i as f64 * step).collect())
}

/// Synchronous, blocking client for a remote compute service.
///
/// Each method call is one round trip to the service.
pub trait ComputeClient: Send + Sync {
    /// Human-readable backend name for logs and reports.
    fn name(&self) -> &str;

    /// Evaluates an expression and returns its materialized value.
    ///
    /// Fails with [`ClientError::ResultTooLarge`] if the value would hold
    /// more elements than the provider allows.
    fn evaluate(&self, expr: &Expr) -> Result<Value, ClientError>;

    /// Submits a table export and returns its handle immediately.
    fn start_export(&self, request: &ExportRequest) -> Result<JobHandle, ClientError>;

    /// Returns the current status of a job.
    fn job_status(&self, job: &JobHandle) -> Result<JobStatus, ClientError>;

    /// Returns the number of elements in a collection.
    fn length(&self, collection: &Expr) -> Result<usize, ClientError> {
        let value = self.evaluate(&collection.clone().length())?;
        match value.as_number() {
            Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as usize),
            _ => Err(ClientError::Decode(format!(
                "expected a count, got {}",
                value.kind()
            ))),
        }
    }

    /// Fetches every element of a collection as a literal list.
    ///
    /// Never truncates: collections beyond the provider cap surface
    /// [`ClientError::ResultTooLarge`].
    fn fetch_all(&self, collection: &Expr) -> Result<Vec<Value>, ClientError> {
        match self.evaluate(collection)? {
            Value::List(items) => Ok(items),
            Value::Features(features) => Ok(features.into_iter().map(Value::Dictionary).collect()),
            other => Err(ClientError::Decode(format!(
                "expected a collection, got {}",
                other.kind()
            ))),
        }
    }

    /// Applies `body` to every element of `collection` server-side in a
    /// single request.
    fn submit_map(&self, collection: &Expr, body: &Expr) -> Result<Value, ClientError> {
        self.evaluate(&collection.clone().map(body.clone()))
    }

    /// Like [`submit_map`](Self::submit_map) for a body that yields a
    /// feature collection per element: the per-element outputs are
    /// flattened server-side, so the provider cap applies to the total
    /// number of records.
    fn submit_flat_map(&self, collection: &Expr, body: &Expr) -> Result<Value, ClientError> {
        self.evaluate(&collection.clone().map(body.clone()).flatten())
    }
}

impl<T: ComputeClient + ?Sized> ComputeClient for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn evaluate(&self, expr: &Expr) -> Result<Value, ClientError> {
        (**self).evaluate(expr)
    }

    fn start_export(&self, request: &ExportRequest) -> Result<JobHandle, ClientError> {
        (**self).start_export(request)
    }

    fn job_status(&self, job: &JobHandle) -> Result<JobStatus, ClientError> {
        (**self).job_status(job)
    }

    fn length(&self, collection: &Expr) -> Result<usize, ClientError> {
        (**self).length(collection)
    }

    fn fetch_all(&self, collection: &Expr) -> Result<Vec<Value>, ClientError> {
        (**self).fetch_all(collection)
    }

    fn submit_map(&self, collection: &Expr, body: &Expr) -> Result<Value, ClientError> {
        (**self).submit_map(collection, body)
    }

    fn submit_flat_map(&self, collection: &Expr, body: &Expr) -> Result<Value, ClientError> {
        (**self).submit_flat_map(collection, body)
    }
}

impl<T: ComputeClient + ?Sized> ComputeClient for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn evaluate(&self, expr: &Expr) -> Result<Value, ClientError> {
        (**self).evaluate(expr)
    }

    fn start_export(&self, request: &ExportRequest) -> Result<JobHandle, ClientError> {
        (**self).start_export(request)
    }

    fn job_status(&self, job: &JobHandle) -> Result<JobStatus, ClientError> {
        (**self).job_status(job)
    }

    fn length(&self, collection: &Expr) -> Result<usize, ClientError> {
        (**self).length(collection)
    }

    fn fetch_all(&self, collection: &Expr) -> Result<Vec<Value>, ClientError> {
        (**self).fetch_all(collection)
    }

    fn submit_map(&self, collection: &Expr, body: &Expr) -> Result<Value, ClientError> {
        (**self).submit_map(collection, body)
    }

    fn submit_flat_map(&self, collection: &Expr, body: &Expr) -> Result<Value, ClientError> {
        (**self).submit_flat_map(collection, body)
    }
}
