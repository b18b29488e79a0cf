//! Asynchronous export jobs.
//!
//! An export materializes a feature collection to durable storage on the
//! service side. Submitting one returns a [`JobHandle`]; the job then moves
//! through its lifecycle independently of the client:
//!
//! ```text
//! Submitted ──► Active ──┬──► Completed
//!                        └──► Failed
//! ```
//!
//! `Completed` and `Failed` are terminal. The [`JobWatcher`] polls a handle
//! at a fixed interval until the job reaches one of them.

mod watcher;

pub use watcher::{JobWait, JobWatcher, Sleeper, ThreadSleeper, DEFAULT_POLL_INTERVAL};

#[cfg(test)]
pub(crate) use watcher::tests::RecordingSleeper;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::expr::Expr;

/// Lifecycle state of an export job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted by the service but not yet running.
    Submitted,
    /// Running.
    Active,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl JobState {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Returns true if the lifecycle allows moving from `self` to `next`.
    ///
    /// Staying in the same state is always allowed; nothing leaves a
    /// terminal state.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (a, b) if *a == b => true,
            (Submitted, Active | Completed | Failed) => true,
            (Active, Completed | Failed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Submitted => "SUBMITTED",
            JobState::Active => "ACTIVE",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    /// Parses the state names used by common batch services. Cancellation
    /// is initiated service-side only and is reported as `Failed`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SUBMITTED" | "PENDING" | "READY" | "UNSUBMITTED" => Ok(JobState::Submitted),
            "ACTIVE" | "RUNNING" | "CANCELLING" | "CANCEL_REQUESTED" => Ok(JobState::Active),
            "COMPLETED" | "SUCCEEDED" => Ok(JobState::Completed),
            "FAILED" | "CANCELLED" => Ok(JobState::Failed),
            other => Err(format!("unknown job state '{}'", other)),
        }
    }
}

/// Reference to a submitted job.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    id: String,
}

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// A status report for a job.
#[derive(Clone, Debug, PartialEq)]
pub struct JobStatus {
    pub state: JobState,
    /// Error message reported by the service for failed jobs.
    pub error: Option<String>,
}

impl JobStatus {
    pub fn new(state: JobState) -> Self {
        Self { state, error: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            error: Some(message.into()),
        }
    }
}

/// Output table format for an export.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    #[default]
    Csv,
    GeoJson,
    Kml,
    Shp,
    TfRecord,
}

impl ExportFormat {
    /// Format name as understood by export endpoints.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::GeoJson => "GeoJSON",
            ExportFormat::Kml => "KML",
            ExportFormat::Shp => "SHP",
            ExportFormat::TfRecord => "TFRecord",
        }
    }
}

/// Request to export a feature collection as a table.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportRequest {
    /// The feature collection to materialize.
    pub collection: Expr,
    /// Task description; also used as the output file name.
    pub description: String,
    pub format: ExportFormat,
}

impl ExportRequest {
    pub fn new(collection: Expr, description: impl Into<String>) -> Self {
        Self {
            collection,
            description: description.into(),
            format: ExportFormat::default(),
        }
    }

    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Submitted.is_terminal());
        assert!(!JobState::Active.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn test_transitions() {
        assert!(JobState::Submitted.can_transition_to(JobState::Active));
        assert!(JobState::Active.can_transition_to(JobState::Completed));
        assert!(JobState::Active.can_transition_to(JobState::Failed));
        assert!(JobState::Active.can_transition_to(JobState::Active));
        assert!(!JobState::Active.can_transition_to(JobState::Submitted));
        assert!(!JobState::Completed.can_transition_to(JobState::Active));
        assert!(!JobState::Failed.can_transition_to(JobState::Completed));
    }

    #[test]
    fn test_parse_service_states() {
        assert_eq!("RUNNING".parse::<JobState>(), Ok(JobState::Active));
        assert_eq!("ready".parse::<JobState>(), Ok(JobState::Submitted));
        assert_eq!("SUCCEEDED".parse::<JobState>(), Ok(JobState::Completed));
        assert_eq!("CANCELLED".parse::<JobState>(), Ok(JobState::Failed));
        assert!("EXPLODED".parse::<JobState>().is_err());
    }

    #[test]
    fn test_export_request_defaults_to_csv() {
        let request = ExportRequest::new(Expr::dataset("A"), "forTest");
        assert_eq!(request.format, ExportFormat::Csv);
        assert_eq!(request.format.as_str(), "CSV");
        let request = request.with_format(ExportFormat::GeoJson);
        assert_eq!(request.format.as_str(), "GeoJSON");
    }
}
