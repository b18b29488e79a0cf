//! Errors that abort a benchmark trial.

use std::time::Duration;

use thiserror::Error;

use crate::client::ClientError;
use crate::job::JobHandle;

/// Result type for harness operations.
pub type BenchResult<T> = Result<T, BenchError>;

/// Errors that can occur while running a trial.
///
/// Nothing is retried; the first error ends the trial.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BenchError {
    /// The compute service rejected or failed a request.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// An export job reached the `Failed` state.
    #[error("Job {job} failed: {message}")]
    JobFailed { job: JobHandle, message: String },

    /// An export job was still running when the wait limit ran out.
    #[error("Job {job} did not finish within {}s", waited.as_secs())]
    WaitTimeout { job: JobHandle, waited: Duration },
}
