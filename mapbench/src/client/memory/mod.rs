//! In-process reference backend.
//!
//! [`InMemoryClient`] evaluates expressions against a [`Catalog`] of small
//! synthetic rasters. It honours the same contract as a remote service:
//! literal results are capped, exports run as jobs that must be polled, and
//! each call can be given an artificial round-trip latency so that request
//! counts show up in wall-clock time.
//!
//! An optional response cache (moka, weighted by element count) mimics a
//! provider that serves repeated identical requests from cache.

mod catalog;
mod eval;
mod raster;

pub use catalog::{demo, Catalog};
pub use raster::{date_millis, Band, Grid, Image};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use moka::sync::Cache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use self::eval::Evaluator;
use super::error::ClientError;
use super::{ComputeClient, MAX_LITERAL_ELEMENTS};
use crate::expr::{Expr, Value};
use crate::job::{ExportFormat, ExportRequest, JobHandle, JobState, JobStatus};
use crate::record::ResultSet;

/// How many status polls an export spends in each non-terminal state.
///
/// The default reports `Active` on the first poll and the terminal state on
/// the second.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobScript {
    /// Polls answered with `Submitted`.
    pub queued_polls: u32,
    /// Polls answered with `Active` after the queued ones.
    pub active_polls: u32,
}

impl Default for JobScript {
    fn default() -> Self {
        Self {
            queued_polls: 0,
            active_polls: 1,
        }
    }
}

impl JobScript {
    fn state_at(&self, poll: u32, succeeded: bool) -> JobState {
        if poll <= self.queued_polls {
            JobState::Submitted
        } else if poll <= self.queued_polls + self.active_polls {
            JobState::Active
        } else if succeeded {
            JobState::Completed
        } else {
            JobState::Failed
        }
    }
}

/// Request and cache counters for an [`InMemoryClient`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

struct ExportJob {
    polls: u32,
    format: ExportFormat,
    outcome: Result<ResultSet, String>,
}

/// Reference [`ComputeClient`] over an in-process catalog.
pub struct InMemoryClient {
    catalog: Catalog,
    latency: Duration,
    max_elements: usize,
    script: JobScript,
    cache: Option<Cache<String, Arc<Value>>>,
    jobs: Mutex<HashMap<String, ExportJob>>,
    next_job: AtomicU64,
    requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl InMemoryClient {
    /// Creates a client with no latency, no cache and the default element cap.
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            latency: Duration::ZERO,
            max_elements: MAX_LITERAL_ELEMENTS,
            script: JobScript::default(),
            cache: None,
            jobs: Mutex::new(HashMap::new()),
            next_job: AtomicU64::new(1),
            requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    /// Simulated round-trip time added to every request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Enables a response cache holding up to `capacity` result elements.
    pub fn with_cache(mut self, capacity: u64) -> Self {
        self.cache = Some(
            Cache::builder()
                .weigher(|_key: &String, value: &Arc<Value>| -> u32 {
                    value.element_count().min(u32::MAX as usize) as u32
                })
                .max_capacity(capacity)
                .build(),
        );
        self
    }

    pub fn with_max_elements(mut self, max_elements: usize) -> Self {
        self.max_elements = max_elements;
        self
    }

    pub fn with_job_script(mut self, script: JobScript) -> Self {
        self.script = script;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }

    /// The table written by a successful export, if the job exists and succeeded.
    pub fn exported_table(&self, job: &JobHandle) -> Option<ResultSet> {
        self.jobs
            .lock()
            .get(job.id())
            .and_then(|j| j.outcome.as_ref().ok().cloned())
    }

    /// The file a successful export wrote, rendered in the requested format.
    pub fn exported_file(&self, job: &JobHandle) -> Option<String> {
        let jobs = self.jobs.lock();
        let job = jobs.get(job.id())?;
        match (job.format, &job.outcome) {
            (ExportFormat::Csv, Ok(table)) => Some(table.to_csv()),
            _ => None,
        }
    }

    fn round_trip(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
    }

    fn compute(&self, expr: &Expr) -> Result<Value, ClientError> {
        Evaluator::new(&self.catalog)
            .eval(expr, None)?
            .into_value(self.max_elements)
    }

    fn export(&self, request: &ExportRequest) -> Result<ResultSet, String> {
        if request.format != ExportFormat::Csv {
            return Err(format!(
                "{} export is not supported, only CSV",
                request.format.as_str()
            ));
        }
        let collection = &request.collection;
        let value = Evaluator::new(&self.catalog)
            .eval(collection, None)
            .and_then(|datum| datum.into_value(usize::MAX))
            .map_err(|e| e.to_string())?;
        let kind = value.kind();
        value
            .into_records()
            .ok_or_else(|| format!("cannot export {} as a table", kind))
    }
}

impl ComputeClient for InMemoryClient {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn evaluate(&self, expr: &Expr) -> Result<Value, ClientError> {
        self.round_trip();

        let Some(cache) = &self.cache else {
            return self.compute(expr);
        };
        let key = serde_json::to_string(expr)
            .map_err(|e| ClientError::malformed(format!("Failed to encode expression: {}", e)))?;
        if let Some(hit) = cache.get(&key) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            trace!(nodes = expr.node_count(), "Response cache hit");
            return Ok((*hit).clone());
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);

        let value = self.compute(expr)?;
        cache.insert(key, Arc::new(value.clone()));
        Ok(value)
    }

    fn start_export(&self, request: &ExportRequest) -> Result<JobHandle, ClientError> {
        self.round_trip();

        let id = format!(
            "operations/{}-{}",
            request.description,
            self.next_job.fetch_add(1, Ordering::Relaxed)
        );
        let outcome = self.export(request);
        match &outcome {
            Ok(table) => debug!(job = %id, rows = table.len(), format = request.format.as_str(), "Export accepted"),
            Err(message) => debug!(job = %id, error = %message, "Export will fail"),
        }
        self.jobs
            .lock()
            .insert(
                id.clone(),
                ExportJob {
                    polls: 0,
                    format: request.format,
                    outcome,
                },
            );
        Ok(JobHandle::new(id))
    }

    fn job_status(&self, job: &JobHandle) -> Result<JobStatus, ClientError> {
        self.round_trip();

        let mut jobs = self.jobs.lock();
        let record = jobs
            .get_mut(job.id())
            .ok_or_else(|| ClientError::UnknownJob(job.id().to_string()))?;
        record.polls += 1;

        let state = self.script.state_at(record.polls, record.outcome.is_ok());
        trace!(job = %job, poll = record.polls, state = %state, "Job polled");
        Ok(match (&record.outcome, state) {
            (Err(message), JobState::Failed) => JobStatus::failed(message.clone()),
            _ => JobStatus::new(state),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Reducer;
    use crate::geometry::Geometry;

    fn client() -> InMemoryClient {
        InMemoryClient::new(Catalog::demo())
    }

    #[test]
    fn test_fetch_all_beyond_cap_fails() {
        let client = client();
        let err = client
            .fetch_all(&Expr::sequence(1.0, 6000.0, 1.0))
            .unwrap_err();
        assert_eq!(err, ClientError::ResultTooLarge { limit: 5000 });
    }

    #[test]
    fn test_fetch_all_at_cap_succeeds() {
        let client = client();
        let items = client.fetch_all(&Expr::sequence(1.0, 5000.0, 1.0)).unwrap();
        assert_eq!(items.len(), 5000);
    }

    #[test]
    fn test_cache_hits_on_repeat() {
        let client = client().with_cache(10_000);
        let expr = Expr::dataset(demo::DAYMET).limit(100);
        client.evaluate(&expr).unwrap();
        client.evaluate(&expr).unwrap();
        client.evaluate(&Expr::dataset(demo::DAYMET).limit(99)).unwrap();

        let stats = client.stats();
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 2);
    }

    #[test]
    fn test_export_job_lifecycle() {
        let client = client();
        let points = vec![Geometry::point(-107.1, 39.1)];
        let collection = Expr::dataset(demo::LANDSAT_SCENES)
            .limit(3)
            .map(Expr::Arg.select(["B4"]).sample_points(points, 30.0))
            .flatten();
        let job = client
            .start_export(&ExportRequest::new(collection, "mapTest"))
            .unwrap();

        assert_eq!(client.job_status(&job).unwrap().state, JobState::Active);
        assert_eq!(client.job_status(&job).unwrap().state, JobState::Completed);
        assert_eq!(client.job_status(&job).unwrap().state, JobState::Completed);
        assert_eq!(client.exported_table(&job).unwrap().len(), 3);

        let csv = client.exported_file(&job).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("source_id,timestamp,B4"));
        assert_eq!(lines.count(), 3);
    }

    #[test]
    fn test_export_format_other_than_csv_fails() {
        let client = client();
        let collection = Expr::dataset(demo::DAYMET)
            .limit(2)
            .map(Expr::Arg.reduce_region(Reducer::Mean, None, 30.0));
        let request = ExportRequest::new(collection, "geo").with_format(ExportFormat::GeoJson);
        let job = client.start_export(&request).unwrap();

        assert_eq!(client.job_status(&job).unwrap().state, JobState::Active);
        let status = client.job_status(&job).unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert!(status.error.unwrap().contains("GeoJSON"));
        assert!(client.exported_file(&job).is_none());
    }

    #[test]
    fn test_export_failure_reported_on_terminal_poll() {
        let client = client().with_job_script(JobScript {
            queued_polls: 1,
            active_polls: 0,
        });
        let bad = Expr::dataset(demo::DAYMET).reduce_region(Reducer::Mean, None, 30.0);
        let job = client.start_export(&ExportRequest::new(bad, "bad")).unwrap();

        assert_eq!(client.job_status(&job).unwrap().state, JobState::Submitted);
        let status = client.job_status(&job).unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert!(status.error.is_some());
        assert!(client.exported_table(&job).is_none());
    }

    #[test]
    fn test_unknown_job() {
        let err = client().job_status(&JobHandle::new("operations/x")).unwrap_err();
        assert!(matches!(err, ClientError::UnknownJob(_)));
    }

    #[test]
    fn test_job_script_states() {
        let script = JobScript {
            queued_polls: 2,
            active_polls: 1,
        };
        assert_eq!(script.state_at(1, true), JobState::Submitted);
        assert_eq!(script.state_at(2, true), JobState::Submitted);
        assert_eq!(script.state_at(3, true), JobState::Active);
        assert_eq!(script.state_at(4, true), JobState::Completed);
        assert_eq!(script.state_at(4, false), JobState::Failed);
    }
}
