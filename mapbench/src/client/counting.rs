//! Request-counting decorator.
//!
//! Wraps any [`ComputeClient`] and counts round trips per category using
//! lock-free atomic counters. The harness snapshots the counters before and
//! after a trial to report how many requests each variant issued.
//!
//! ```text
//! Variant ─────► CountingClient ─────► inner client
//!                (atomic counters)
//!                      │
//!                      └──► RequestCounts (point-in-time copy)
//! ```

use std::fmt;
use std::ops::Sub;
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::ClientError;
use super::ComputeClient;
use crate::expr::{Expr, Value};
use crate::job::{ExportRequest, JobHandle, JobStatus};

/// Point-in-time copy of the request counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestCounts {
    /// Synchronous evaluations (including length queries and literal fetches).
    pub evaluations: u64,
    /// Server-side map submissions.
    pub maps: u64,
    /// Export submissions.
    pub exports: u64,
    /// Job status polls.
    pub status_polls: u64,
}

impl RequestCounts {
    /// Total round trips across all categories.
    pub fn total(&self) -> u64 {
        self.evaluations + self.maps + self.exports + self.status_polls
    }
}

impl Sub for RequestCounts {
    type Output = RequestCounts;

    fn sub(self, earlier: RequestCounts) -> RequestCounts {
        RequestCounts {
            evaluations: self.evaluations.saturating_sub(earlier.evaluations),
            maps: self.maps.saturating_sub(earlier.maps),
            exports: self.exports.saturating_sub(earlier.exports),
            status_polls: self.status_polls.saturating_sub(earlier.status_polls),
        }
    }
}

impl fmt::Display for RequestCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests ({} evaluate, {} map, {} export, {} poll)",
            self.total(),
            self.evaluations,
            self.maps,
            self.exports,
            self.status_polls
        )
    }
}

/// A [`ComputeClient`] decorator that counts requests.
pub struct CountingClient<C> {
    inner: C,
    evaluations: AtomicU64,
    maps: AtomicU64,
    exports: AtomicU64,
    status_polls: AtomicU64,
}

impl<C: ComputeClient> CountingClient<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            evaluations: AtomicU64::new(0),
            maps: AtomicU64::new(0),
            exports: AtomicU64::new(0),
            status_polls: AtomicU64::new(0),
        }
    }

    /// Borrow the wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Take a snapshot of the counters.
    pub fn snapshot(&self) -> RequestCounts {
        RequestCounts {
            evaluations: self.evaluations.load(Ordering::Relaxed),
            maps: self.maps.load(Ordering::Relaxed),
            exports: self.exports.load(Ordering::Relaxed),
            status_polls: self.status_polls.load(Ordering::Relaxed),
        }
    }
}

impl<C: ComputeClient> ComputeClient for CountingClient<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn evaluate(&self, expr: &Expr) -> Result<Value, ClientError> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.inner.evaluate(expr)
    }

    fn start_export(&self, request: &ExportRequest) -> Result<JobHandle, ClientError> {
        self.exports.fetch_add(1, Ordering::Relaxed);
        self.inner.start_export(request)
    }

    fn job_status(&self, job: &JobHandle) -> Result<JobStatus, ClientError> {
        self.status_polls.fetch_add(1, Ordering::Relaxed);
        self.inner.job_status(job)
    }

    fn length(&self, collection: &Expr) -> Result<usize, ClientError> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.inner.length(collection)
    }

    fn fetch_all(&self, collection: &Expr) -> Result<Vec<Value>, ClientError> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.inner.fetch_all(collection)
    }

    fn submit_map(&self, collection: &Expr, body: &Expr) -> Result<Value, ClientError> {
        self.maps.fetch_add(1, Ordering::Relaxed);
        self.inner.submit_map(collection, body)
    }

    fn submit_flat_map(&self, collection: &Expr, body: &Expr) -> Result<Value, ClientError> {
        self.maps.fetch_add(1, Ordering::Relaxed);
        self.inner.submit_flat_map(collection, body)
    }
}
