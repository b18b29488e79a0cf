//! Benchmark harness.
//!
//! A trial runs one variant end to end:
//!
//! ```text
//! probe (untimed) ──► start clock ──► variant.run ──► wait for export ──► stop clock
//! ```
//!
//! The wait is part of the measured time, since an export is only useful
//! once it has finished. Requests are counted through a [`CountingClient`],
//! so each report carries the number of round trips the variant issued.

mod error;

pub use error::{BenchError, BenchResult};

use std::fmt;
use std::time::{Duration, Instant};

use tracing::info;

use crate::client::{ComputeClient, CountingClient, RequestCounts};
use crate::job::{JobHandle, JobState, JobWait, JobWatcher};
use crate::probe::CacheBustProbe;
use crate::record::ResultSet;
use crate::variant::{Strategy, Variant, VariantOutcome};

/// What a trial ended with.
#[derive(Clone, Debug, PartialEq)]
pub enum TrialOutcome {
    /// Records collected by the variant.
    Results(ResultSet),
    /// An export that reached a terminal state.
    Exported { job: JobHandle, wait: JobWait },
}

/// Timing and request counts for one trial.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialReport {
    pub variant: String,
    pub strategy: Strategy,
    /// Wall-clock time from just after the probe to the end of the wait.
    pub elapsed: Duration,
    /// Requests issued by the variant and the wait loop (probe excluded).
    pub requests: RequestCounts,
    pub outcome: TrialOutcome,
}

impl TrialReport {
    pub fn results(&self) -> Option<&ResultSet> {
        match &self.outcome {
            TrialOutcome::Results(results) => Some(results),
            TrialOutcome::Exported { .. } => None,
        }
    }

    /// Terminal job state, for export trials.
    pub fn final_state(&self) -> Option<JobState> {
        match &self.outcome {
            TrialOutcome::Results(_) => None,
            TrialOutcome::Exported { wait, .. } => Some(wait.status.state),
        }
    }
}

impl fmt::Display for TrialReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {:.3}s, {}",
            self.variant,
            self.strategy,
            self.elapsed.as_secs_f64(),
            self.requests
        )?;
        match &self.outcome {
            TrialOutcome::Results(results) => write!(f, ", {} records", results.len()),
            TrialOutcome::Exported { job, wait } => {
                write!(f, ", job {} {} after {} polls", job, wait.status.state, wait.polls)
            }
        }
    }
}

/// An iterative and a mapped trial of the same computation.
#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    pub iterative: TrialReport,
    pub mapped: TrialReport,
}

impl Comparison {
    /// Iterative time divided by mapped time.
    pub fn speedup(&self) -> f64 {
        let mapped = self.mapped.elapsed.as_secs_f64();
        if mapped == 0.0 {
            return f64::INFINITY;
        }
        self.iterative.elapsed.as_secs_f64() / mapped
    }

    /// Whether both trials produced the same records, ignoring order and
    /// provider-assigned identity. `None` when either trial exported.
    pub fn results_agree(&self) -> Option<bool> {
        match (self.iterative.results(), self.mapped.results()) {
            (Some(a), Some(b)) => Some(a.equivalent(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.iterative)?;
        writeln!(f, "{}", self.mapped)?;
        write!(f, "speedup: {:.2}x", self.speedup())?;
        if let Some(agree) = self.results_agree() {
            write!(f, ", results {}", if agree { "agree" } else { "differ" })?;
        }
        Ok(())
    }
}

/// Runs timed trials against a compute client.
pub struct Harness<C> {
    client: CountingClient<C>,
    watcher: JobWatcher,
    probe: Option<CacheBustProbe>,
}

impl<C: ComputeClient> Harness<C> {
    /// Creates a harness with the default cache-bust probe.
    pub fn new(client: C, watcher: JobWatcher) -> Self {
        Self {
            client: CountingClient::new(client),
            watcher,
            probe: Some(CacheBustProbe::default()),
        }
    }

    pub fn with_probe(mut self, probe: CacheBustProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Skips the cache-bust probe before each trial.
    pub fn without_probe(mut self) -> Self {
        self.probe = None;
        self
    }

    pub fn client(&self) -> &CountingClient<C> {
        &self.client
    }

    pub fn watcher(&self) -> &JobWatcher {
        &self.watcher
    }

    /// Runs the probe, then times one run of `variant`.
    ///
    /// A submitted export is waited on before the clock stops. An export
    /// that ends `Failed` fails the trial with [`BenchError::JobFailed`].
    pub fn run_trial(&self, variant: &dyn Variant) -> BenchResult<TrialReport> {
        if let Some(probe) = &self.probe {
            probe.run(&self.client)?;
        }

        info!(variant = variant.name(), strategy = %variant.strategy(), "Starting trial");
        let before = self.client.snapshot();
        let start = Instant::now();

        let outcome = match variant.run(&self.client)? {
            VariantOutcome::Results(results) => TrialOutcome::Results(results),
            VariantOutcome::Export(job) => {
                let wait = self.watcher.wait(&self.client, &job)?;
                if wait.status.state == JobState::Failed {
                    return Err(BenchError::JobFailed {
                        message: wait
                            .status
                            .error
                            .clone()
                            .unwrap_or_else(|| "no error reported".to_string()),
                        job,
                    });
                }
                TrialOutcome::Exported { job, wait }
            }
        };

        let report = TrialReport {
            variant: variant.name().to_string(),
            strategy: variant.strategy(),
            elapsed: start.elapsed(),
            requests: self.client.snapshot() - before,
            outcome,
        };
        info!(
            variant = %report.variant,
            elapsed_ms = report.elapsed.as_millis() as u64,
            requests = report.requests.total(),
            "Trial finished"
        );
        Ok(report)
    }

    /// Runs the iterative variant, then the mapped one, each with its own probe.
    pub fn compare(&self, iterative: &dyn Variant, mapped: &dyn Variant) -> BenchResult<Comparison> {
        let iterative = self.run_trial(iterative)?;
        let mapped = self.run_trial(mapped)?;
        Ok(Comparison { iterative, mapped })
    }
}
