//! Variant runners.
//!
//! A variant is one way of computing the same result set:
//!
//! - [`IterativeVariant`] loops over the elements on the client and issues a
//!   blocking request per element (and per output of that element).
//! - [`MappedVariant`] ships a single `map` expression and lets the service
//!   apply the per-element transform.
//!
//! Both deliver their output to a [`Sink`]: either collected as a literal
//! [`ResultSet`] or exported as a table, in which case the runner returns the
//! job handle without waiting.
//!
//! # Example
//!
//! ```
//! use mapbench::client::{Catalog, InMemoryClient};
//! use mapbench::expr::{Expr, Reducer};
//! use mapbench::variant::{
//!     ElementSource, IterativeVariant, MappedVariant, Transform, Variant, VariantOutcome,
//! };
//!
//! let client = InMemoryClient::new(Catalog::demo());
//! let days = Expr::dataset("NASA/ORNL/DAYMET").limit(3);
//! let transform = Transform::Reduce(Expr::Arg.select(["prcp"]).reduce_region(
//!     Reducer::Mean,
//!     None,
//!     30.0,
//! ));
//!
//! let iterative = IterativeVariant::from_transform(
//!     "loop",
//!     ElementSource::Remote(days.clone()),
//!     transform.clone(),
//! );
//! let mapped = MappedVariant::new("map", days, transform);
//!
//! let (a, b) = match (iterative.run(&client).unwrap(), mapped.run(&client).unwrap()) {
//!     (VariantOutcome::Results(a), VariantOutcome::Results(b)) => (a, b),
//!     _ => unreachable!(),
//! };
//! assert!(a.equivalent(&b));
//! ```

mod iterative;
mod mapped;

pub use iterative::{ElementBuilder, IterativeVariant};
pub use mapped::MappedVariant;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::client::{ClientError, ComputeClient};
use crate::expr::{Expr, Value};
use crate::geometry::Geometry;
use crate::job::{ExportFormat, ExportRequest, JobHandle};
use crate::record::ResultSet;

/// How a variant distributes work between client and service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One request per element, issued from a client-side loop.
    Iterative,
    /// One request for the whole collection, mapped server-side.
    Mapped,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Iterative => "iterative",
            Strategy::Mapped => "mapped",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "iterative" | "loop" => Ok(Strategy::Iterative),
            "mapped" | "map" => Ok(Strategy::Mapped),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

/// Where a variant's output goes.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Sink {
    /// Fetch the output as a literal result set.
    #[default]
    Collect,
    /// Export the output as a table; the runner returns the job handle.
    Export {
        description: String,
        format: ExportFormat,
    },
}

impl Sink {
    /// Export sink writing CSV.
    pub fn csv(description: impl Into<String>) -> Self {
        Sink::Export {
            description: description.into(),
            format: ExportFormat::Csv,
        }
    }

    fn export_request(&self, collection: Expr) -> Option<ExportRequest> {
        match self {
            Sink::Collect => None,
            Sink::Export {
                description,
                format,
            } => Some(ExportRequest::new(collection, description.clone()).with_format(*format)),
        }
    }
}

/// What a variant run produced.
#[derive(Clone, Debug, PartialEq)]
pub enum VariantOutcome {
    /// Records in element order.
    Results(ResultSet),
    /// A submitted export job, not yet waited on.
    Export(JobHandle),
}

/// One element of an iteration, as seen by a per-element builder.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    /// A value of a client-side numeric range.
    Number(f64),
    /// A reference to the `i`-th element of a remote collection.
    Remote(Expr),
}

impl Element {
    /// The element as an expression.
    pub fn to_expr(&self) -> Expr {
        match self {
            Element::Number(n) => Expr::number(*n),
            Element::Remote(expr) => expr.clone(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Element::Number(n) => Some(*n),
            Element::Remote(_) => None,
        }
    }
}

/// The elements a variant iterates over.
#[derive(Clone, Debug, PartialEq)]
pub enum ElementSource {
    /// Inclusive numeric range built on the client. Enumerating it needs no
    /// request.
    Range { start: f64, end: f64, step: f64 },
    /// A collection held by the service. Its length costs one request.
    Remote(Expr),
}

impl ElementSource {
    pub fn range(start: f64, end: f64, step: f64) -> Self {
        ElementSource::Range { start, end, step }
    }

    /// The same elements as a service-side collection.
    pub fn collection(&self) -> Expr {
        match self {
            ElementSource::Range { start, end, step } => Expr::sequence(*start, *end, *step),
            ElementSource::Remote(expr) => expr.clone(),
        }
    }

}

/// A per-element transform that both strategies can run.
#[derive(Clone, Debug, PartialEq)]
pub enum Transform {
    /// One output per element: `body` with the element bound to `Arg`.
    Reduce(Expr),
    /// Prepare each element, then sample the prepared image at every point.
    /// One-to-many: produces up to `points.len()` records per element.
    SamplePoints {
        prepare: Expr,
        points: Vec<Geometry>,
        scale: f64,
    },
}

impl Transform {
    /// Requests an iterative runner issues for one element.
    pub fn per_element(&self, element: &Expr) -> Vec<Expr> {
        match self {
            Transform::Reduce(body) => vec![body.bind(element)],
            Transform::SamplePoints {
                prepare,
                points,
                scale,
            } => {
                let image = prepare.bind(element);
                points
                    .iter()
                    .map(|point| image.clone().sample(point.clone(), *scale))
                    .collect()
            }
        }
    }

    /// Body shipped to the service by the mapped runner.
    pub fn mapped_body(&self) -> Expr {
        match self {
            Transform::Reduce(body) => body.clone(),
            Transform::SamplePoints {
                prepare,
                points,
                scale,
            } => prepare.clone().sample_points(points.clone(), *scale),
        }
    }

    /// True if an element may yield more than one record.
    pub fn is_one_to_many(&self) -> bool {
        matches!(self, Transform::SamplePoints { .. })
    }

    /// Requests issued per element by the iterative runner.
    pub fn outputs_per_element(&self) -> usize {
        match self {
            Transform::Reduce(_) => 1,
            Transform::SamplePoints { points, .. } => points.len(),
        }
    }
}

/// A runnable variant.
///
/// Implementations issue every request through the given client and must not
/// retry: the first error ends the run.
pub trait Variant: Send + Sync {
    /// Short name for logs and reports.
    fn name(&self) -> &str;

    fn strategy(&self) -> Strategy;

    /// Runs the variant once.
    fn run(&self, client: &dyn ComputeClient) -> Result<VariantOutcome, ClientError>;
}

/// Converts an evaluated value into records.
pub(crate) fn into_records(value: Value) -> Result<ResultSet, ClientError> {
    let kind = value.kind();
    value
        .into_records()
        .ok_or_else(|| ClientError::Decode(format!("expected records, got {}", kind)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::sequence_values;

    fn range_values(source: &ElementSource) -> Result<Vec<f64>, ClientError> {
        match source {
            ElementSource::Range { start, end, step } => sequence_values(*start, *end, *step),
            ElementSource::Remote(_) => panic!("not a range: {:?}", source),
        }
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("mapped".parse::<Strategy>().unwrap(), Strategy::Mapped);
        assert_eq!("Iterative".parse::<Strategy>().unwrap(), Strategy::Iterative);
        assert!("batch".parse::<Strategy>().is_err());
        assert_eq!(Strategy::Mapped.to_string(), "mapped");
    }

    #[test]
    fn test_range_values_match_sequence() {
        let source = ElementSource::range(0.0, 365.0, 5.0);
        let values = range_values(&source).unwrap();
        assert_eq!(values.len(), 74);
        assert_eq!(values[73], 365.0);
        assert_eq!(source.collection(), Expr::sequence(0.0, 365.0, 5.0));
    }

    #[test]
    fn test_range_values_rejected_like_sequence() {
        for (start, end, step) in [
            (0.0, 10.0, 0.0),
            (0.0, 10.0, f64::NAN),
            (0.0, f64::INFINITY, 1.0),
            (0.0, 1e9, 1.0),
        ] {
            let err = range_values(&ElementSource::range(start, end, step)).unwrap_err();
            assert!(matches!(err, ClientError::MalformedQuery(_)), "{:?}", err);
        }
        let empty = range_values(&ElementSource::range(0.0, -1.0, 1.0)).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_sample_points_transform() {
        let transform = Transform::SamplePoints {
            prepare: Expr::Arg.select(["B4"]),
            points: vec![Geometry::point(0.0, 0.0), Geometry::point(1.0, 1.0)],
            scale: 30.0,
        };
        let requests = transform.per_element(&Expr::dataset("A").get(4));
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| !r.contains_arg()));
        assert!(transform.is_one_to_many());
        assert_eq!(transform.outputs_per_element(), 2);

        match transform.mapped_body() {
            Expr::SamplePoints { points, .. } => assert_eq!(points.len(), 2),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_export_request_from_sink() {
        assert!(Sink::Collect.export_request(Expr::dataset("A")).is_none());
        let request = Sink::csv("forTest").export_request(Expr::dataset("A")).unwrap();
        assert_eq!(request.description, "forTest");
        assert_eq!(request.format, ExportFormat::Csv);
    }
}
