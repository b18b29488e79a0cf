//! Blocking wait loop for export jobs.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{JobHandle, JobState, JobStatus};
use crate::bench::BenchError;
use crate::client::ComputeClient;

/// Default interval between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Blocks the calling thread between polls.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by [`std::thread::sleep`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for Arc<S> {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Outcome of waiting for a job to reach a terminal state.
#[derive(Clone, Debug, PartialEq)]
pub struct JobWait {
    /// The terminal status.
    pub status: JobStatus,
    /// Number of status checks issued.
    pub polls: u32,
    /// Time spent waiting: the slept intervals, or the wall-clock time when
    /// status checks made it longer.
    pub waited: Duration,
}

/// Polls a job at a fixed interval until it completes or fails.
///
/// Each iteration sleeps one interval and then checks the status, so a job
/// that finishes after `k` intervals is polled exactly `k` times. With a
/// `max_wait`, the watcher stops before any sleep that would take the wait,
/// measured on the wall clock, past the cap.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use mapbench::client::{Catalog, ComputeClient, InMemoryClient};
/// use mapbench::expr::Expr;
/// use mapbench::job::{ExportRequest, JobWatcher};
///
/// let client = InMemoryClient::new(Catalog::demo());
/// let job = client
///     .start_export(&ExportRequest::new(Expr::merge(vec![]), "empty"))
///     .unwrap();
/// let wait = JobWatcher::new(Duration::from_secs(5))
///     .with_max_wait(Duration::from_secs(600))
///     .wait(&client, &job)
///     .unwrap();
/// println!("{} after {} polls", wait.status.state, wait.polls);
/// ```
pub struct JobWatcher {
    interval: Duration,
    max_wait: Option<Duration>,
    sleeper: Box<dyn Sleeper>,
}

impl JobWatcher {
    /// Creates a watcher that sleeps `interval` between polls and never gives up.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero; configuration rejects a zero interval
    /// before a watcher is built.
    pub fn new(interval: Duration) -> Self {
        assert!(!interval.is_zero(), "poll interval must be non-zero");
        Self {
            interval,
            max_wait: None,
            sleeper: Box::new(ThreadSleeper),
        }
    }

    /// Gives up before a sleep that would take the wait past `max_wait`.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait
    }

    /// Blocks until `job` is terminal.
    ///
    /// Returns the terminal status whether the job completed or failed.
    /// Client errors abort the wait immediately.
    pub fn wait(&self, client: &dyn ComputeClient, job: &JobHandle) -> Result<JobWait, BenchError> {
        let started = Instant::now();
        let mut polls = 0;
        let mut slept = Duration::ZERO;
        let mut last = JobState::Submitted;

        loop {
            let waited = slept.max(started.elapsed());
            if let Some(max_wait) = self.max_wait {
                if waited + self.interval > max_wait {
                    warn!(job = %job, waited_secs = waited.as_secs_f64(), "Gave up waiting for job");
                    return Err(BenchError::WaitTimeout {
                        job: job.clone(),
                        waited,
                    });
                }
            }

            self.sleeper.sleep(self.interval);
            slept += self.interval;

            let status = client.job_status(job)?;
            polls += 1;

            if !last.can_transition_to(status.state) {
                warn!(job = %job, from = %last, to = %status.state, "Unexpected job state transition");
            }
            last = status.state;
            debug!(job = %job, poll = polls, state = %status.state, "Job status");

            if status.state.is_terminal() {
                return Ok(JobWait {
                    status,
                    polls,
                    waited: slept.max(started.elapsed()),
                });
            }
        }
    }
}
