//! Serializable expression trees describing remote computations.
//!
//! The compute service cannot run host-language closures, so every request
//! is expressed as an [`Expr`]: a tree built from a small, closed set of
//! primitives. A per-element transform is an expression that refers to the
//! current element through [`Expr::Arg`]; the iterative runner substitutes a
//! concrete element with [`Expr::bind`] before each request, while the mapped
//! runner ships the unbound body to the service once.
//!
//! # Example
//!
//! ```
//! use mapbench::expr::{Expr, Reducer};
//! use mapbench::geometry::Geometry;
//!
//! let region = Geometry::rectangle(-107.0, 38.8, -106.8, 39.0);
//! let body = Expr::Arg
//!     .normalized_difference("B4", "B3")
//!     .clip(region.clone())
//!     .reduce_region(Reducer::Mean, Some(region), 30.0);
//!
//! let scenes = Expr::dataset("LANDSAT/LT5_L1T").limit(365);
//! let mapped = scenes.clone().map(body.clone());
//! let first = body.bind(&scenes.get(0));
//! assert!(!first.contains_arg());
//! assert!(!mapped.contains_arg());
//! ```

mod value;

pub use value::{ImageInfo, Value};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;

/// Statistic computed by a region reduction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    Mean,
    Median,
    Sum,
    Min,
    Max,
    Count,
}

impl Reducer {
    /// Applies the reducer to a set of pixel values.
    ///
    /// Returns `None` for an empty input, except for `Count` which is zero.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return match self {
                Reducer::Count => Some(0.0),
                _ => None,
            };
        }
        let n = values.len() as f64;
        match self {
            Reducer::Mean => Some(values.iter().sum::<f64>() / n),
            Reducer::Sum => Some(values.iter().sum()),
            Reducer::Min => values.iter().copied().reduce(f64::min),
            Reducer::Max => values.iter().copied().reduce(f64::max),
            Reducer::Count => Some(n),
            Reducer::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    Some((sorted[mid - 1] + sorted[mid]) / 2.0)
                } else {
                    Some(sorted[mid])
                }
            }
        }
    }

    /// Lower-case name, as used in config and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Reducer::Mean => "mean",
            Reducer::Median => "median",
            Reducer::Sum => "sum",
            Reducer::Min => "min",
            Reducer::Max => "max",
            Reducer::Count => "count",
        }
    }
}

/// Calendar unit for [`Expr::DateAdvance`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateUnit {
    Day,
    Year,
}

/// A node in a remote computation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    // ---- scalars -----------------------------------------------------------
    /// The element currently being mapped over.
    Arg,
    Number {
        value: f64,
    },
    Add {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Multiply {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Date {
        value: NaiveDate,
    },
    /// Moves a date by a whole number of days or years.
    DateAdvance {
        date: Box<Expr>,
        amount: Box<Expr>,
        unit: DateUnit,
    },

    // ---- collections -------------------------------------------------------
    /// Inclusive numeric range `start, start+step, ..., <= end`.
    Sequence {
        start: f64,
        end: f64,
        step: f64,
    },
    /// A named image collection held by the service.
    Dataset {
        id: String,
    },
    Get {
        collection: Box<Expr>,
        index: usize,
    },
    Length {
        collection: Box<Expr>,
    },
    Limit {
        collection: Box<Expr>,
        max: usize,
    },
    /// Applies `body` to every element server-side. `Arg` inside the body
    /// refers to the element.
    Map {
        collection: Box<Expr>,
        body: Box<Expr>,
    },
    /// Concatenates a collection of feature collections.
    Flatten {
        collection: Box<Expr>,
    },
    /// Concatenates independently built feature collections.
    Merge {
        items: Vec<Expr>,
    },

    // ---- filters -----------------------------------------------------------
    /// Keeps images acquired in `[start, end)`.
    FilterDate {
        collection: Box<Expr>,
        start: Box<Expr>,
        end: Box<Expr>,
    },
    FilterBounds {
        collection: Box<Expr>,
        geometry: Geometry,
    },
    /// Keeps images whose numeric property equals `value`.
    FilterMetadata {
        collection: Box<Expr>,
        property: String,
        value: f64,
    },
    /// Keeps images whose numeric property equals any of `values`.
    FilterIn {
        collection: Box<Expr>,
        property: String,
        values: Vec<f64>,
    },

    // ---- images ------------------------------------------------------------
    /// Band selection on an image or every image of a collection.
    Select {
        input: Box<Expr>,
        bands: Vec<String>,
    },
    Median {
        collection: Box<Expr>,
    },
    Sum {
        collection: Box<Expr>,
    },
    Clip {
        image: Box<Expr>,
        geometry: Geometry,
    },
    /// `(first - second) / (first + second)` as a band named `nd`.
    NormalizedDifference {
        image: Box<Expr>,
        first: String,
        second: String,
    },
    Rename {
        image: Box<Expr>,
        names: Vec<String>,
    },
    AddBands {
        image: Box<Expr>,
        other: Box<Expr>,
    },
    /// A constant band holding one of the image's properties.
    Metadata {
        image: Box<Expr>,
        property: String,
    },
    /// A constant image, broadcast against whatever it is combined with.
    Constant {
        value: f64,
    },
    BitwiseNot {
        image: Box<Expr>,
    },
    BitwiseAnd {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// The image's current mask as a 0/1 image.
    MaskOf {
        image: Box<Expr>,
    },
    UpdateMask {
        image: Box<Expr>,
        mask: Box<Expr>,
    },

    // ---- reductions & sampling ---------------------------------------------
    ReduceRegion {
        image: Box<Expr>,
        reducer: Reducer,
        geometry: Option<Geometry>,
        scale: f64,
    },
    /// Samples the pixel under a point, producing zero or one feature.
    Sample {
        image: Box<Expr>,
        geometry: Geometry,
        scale: f64,
    },
    /// Samples the pixel under each point, in point order.
    SamplePoints {
        image: Box<Expr>,
        points: Vec<Geometry>,
        scale: f64,
    },
}

impl Expr {
    // =========================================================================
    // Leaf constructors
    // =========================================================================

    pub fn number(value: f64) -> Self {
        Expr::Number { value }
    }

    pub fn date(value: NaiveDate) -> Self {
        Expr::Date { value }
    }

    pub fn dataset(id: impl Into<String>) -> Self {
        Expr::Dataset { id: id.into() }
    }

    pub fn sequence(start: f64, end: f64, step: f64) -> Self {
        Expr::Sequence { start, end, step }
    }

    pub fn constant(value: f64) -> Self {
        Expr::Constant { value }
    }

    pub fn merge(items: Vec<Expr>) -> Self {
        Expr::Merge { items }
    }

    // =========================================================================
    // Chained constructors
    // =========================================================================

    pub fn add(self, rhs: Expr) -> Self {
        Expr::Add {
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    pub fn multiply(self, rhs: Expr) -> Self {
        Expr::Multiply {
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    pub fn advance(self, amount: Expr, unit: DateUnit) -> Self {
        Expr::DateAdvance {
            date: Box::new(self),
            amount: Box::new(amount),
            unit,
        }
    }

    pub fn get(self, index: usize) -> Self {
        Expr::Get {
            collection: Box::new(self),
            index,
        }
    }

    pub fn length(self) -> Self {
        Expr::Length {
            collection: Box::new(self),
        }
    }

    pub fn limit(self, max: usize) -> Self {
        Expr::Limit {
            collection: Box::new(self),
            max,
        }
    }

    pub fn map(self, body: Expr) -> Self {
        Expr::Map {
            collection: Box::new(self),
            body: Box::new(body),
        }
    }

    pub fn flatten(self) -> Self {
        Expr::Flatten {
            collection: Box::new(self),
        }
    }

    pub fn filter_date(self, start: Expr, end: Expr) -> Self {
        Expr::FilterDate {
            collection: Box::new(self),
            start: Box::new(start),
            end: Box::new(end),
        }
    }

    pub fn filter_bounds(self, geometry: Geometry) -> Self {
        Expr::FilterBounds {
            collection: Box::new(self),
            geometry,
        }
    }

    pub fn filter_metadata(self, property: impl Into<String>, value: f64) -> Self {
        Expr::FilterMetadata {
            collection: Box::new(self),
            property: property.into(),
            value,
        }
    }

    pub fn filter_in(self, property: impl Into<String>, values: Vec<f64>) -> Self {
        Expr::FilterIn {
            collection: Box::new(self),
            property: property.into(),
            values,
        }
    }

    pub fn select<S: Into<String>>(self, bands: impl IntoIterator<Item = S>) -> Self {
        Expr::Select {
            input: Box::new(self),
            bands: bands.into_iter().map(Into::into).collect(),
        }
    }

    pub fn median(self) -> Self {
        Expr::Median {
            collection: Box::new(self),
        }
    }

    pub fn sum(self) -> Self {
        Expr::Sum {
            collection: Box::new(self),
        }
    }

    pub fn clip(self, geometry: Geometry) -> Self {
        Expr::Clip {
            image: Box::new(self),
            geometry,
        }
    }

    pub fn normalized_difference(self, first: impl Into<String>, second: impl Into<String>) -> Self {
        Expr::NormalizedDifference {
            image: Box::new(self),
            first: first.into(),
            second: second.into(),
        }
    }

    pub fn rename<S: Into<String>>(self, names: impl IntoIterator<Item = S>) -> Self {
        Expr::Rename {
            image: Box::new(self),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add_bands(self, other: Expr) -> Self {
        Expr::AddBands {
            image: Box::new(self),
            other: Box::new(other),
        }
    }

    pub fn metadata(self, property: impl Into<String>) -> Self {
        Expr::Metadata {
            image: Box::new(self),
            property: property.into(),
        }
    }

    pub fn bitwise_not(self) -> Self {
        Expr::BitwiseNot {
            image: Box::new(self),
        }
    }

    pub fn bitwise_and(self, rhs: Expr) -> Self {
        Expr::BitwiseAnd {
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    pub fn and(self, rhs: Expr) -> Self {
        Expr::And {
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    pub fn mask_of(self) -> Self {
        Expr::MaskOf {
            image: Box::new(self),
        }
    }

    pub fn update_mask(self, mask: Expr) -> Self {
        Expr::UpdateMask {
            image: Box::new(self),
            mask: Box::new(mask),
        }
    }

    pub fn reduce_region(self, reducer: Reducer, geometry: Option<Geometry>, scale: f64) -> Self {
        Expr::ReduceRegion {
            image: Box::new(self),
            reducer,
            geometry,
            scale,
        }
    }

    pub fn sample(self, geometry: Geometry, scale: f64) -> Self {
        Expr::Sample {
            image: Box::new(self),
            geometry,
            scale,
        }
    }

    pub fn sample_points(self, points: Vec<Geometry>, scale: f64) -> Self {
        Expr::SamplePoints {
            image: Box::new(self),
            points,
            scale,
        }
    }

    // =========================================================================
    // Tree operations
    // =========================================================================

    /// Substitutes `arg` for every free [`Expr::Arg`].
    ///
    /// `Arg` nodes inside a nested [`Expr::Map`] body are bound by that map
    /// and are left untouched.
    pub fn bind(&self, arg: &Expr) -> Expr {
        let mut bound = self.clone();
        bound.substitute(arg);
        bound
    }

    fn substitute(&mut self, arg: &Expr) {
        if matches!(self, Expr::Arg) {
            *self = arg.clone();
            return;
        }
        for child in self.children_mut() {
            child.substitute(arg);
        }
    }

    /// Returns true if the expression has a free [`Expr::Arg`].
    pub fn contains_arg(&self) -> bool {
        match self {
            Expr::Arg => true,
            _ => self.children().iter().any(|c| c.contains_arg()),
        }
    }

    /// Total number of nodes, including nested map bodies.
    pub fn node_count(&self) -> usize {
        let body = match self {
            Expr::Map { body, .. } => body.node_count(),
            _ => 0,
        };
        1 + body + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Direct children in scope of the current element (map bodies excluded).
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Arg
            | Expr::Number { .. }
            | Expr::Date { .. }
            | Expr::Sequence { .. }
            | Expr::Dataset { .. }
            | Expr::Constant { .. } => Vec::new(),
            Expr::Add { lhs, rhs }
            | Expr::Multiply { lhs, rhs }
            | Expr::BitwiseAnd { lhs, rhs }
            | Expr::And { lhs, rhs } => vec![lhs.as_ref(), rhs.as_ref()],
            Expr::DateAdvance { date, amount, .. } => vec![date.as_ref(), amount.as_ref()],
            Expr::Get { collection, .. }
            | Expr::Length { collection }
            | Expr::Limit { collection, .. }
            | Expr::Map { collection, .. }
            | Expr::Flatten { collection }
            | Expr::FilterBounds { collection, .. }
            | Expr::FilterMetadata { collection, .. }
            | Expr::FilterIn { collection, .. }
            | Expr::Median { collection }
            | Expr::Sum { collection } => vec![collection.as_ref()],
            Expr::Merge { items } => items.iter().collect(),
            Expr::FilterDate {
                collection,
                start,
                end,
            } => vec![collection.as_ref(), start.as_ref(), end.as_ref()],
            Expr::Select { input, .. } => vec![input.as_ref()],
            Expr::Clip { image, .. }
            | Expr::NormalizedDifference { image, .. }
            | Expr::Rename { image, .. }
            | Expr::Metadata { image, .. }
            | Expr::BitwiseNot { image }
            | Expr::MaskOf { image }
            | Expr::ReduceRegion { image, .. }
            | Expr::Sample { image, .. }
            | Expr::SamplePoints { image, .. } => vec![image.as_ref()],
            Expr::AddBands { image, other } => vec![image.as_ref(), other.as_ref()],
            Expr::UpdateMask { image, mask } => vec![image.as_ref(), mask.as_ref()],
        }
    }

    fn children_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Expr::Arg
            | Expr::Number { .. }
            | Expr::Date { .. }
            | Expr::Sequence { .. }
            | Expr::Dataset { .. }
            | Expr::Constant { .. } => Vec::new(),
            Expr::Add { lhs, rhs }
            | Expr::Multiply { lhs, rhs }
            | Expr::BitwiseAnd { lhs, rhs }
            | Expr::And { lhs, rhs } => vec![lhs.as_mut(), rhs.as_mut()],
            Expr::DateAdvance { date, amount, .. } => vec![date.as_mut(), amount.as_mut()],
            Expr::Get { collection, .. }
            | Expr::Length { collection }
            | Expr::Limit { collection, .. }
            | Expr::Map { collection, .. }
            | Expr::Flatten { collection }
            | Expr::FilterBounds { collection, .. }
            | Expr::FilterMetadata { collection, .. }
            | Expr::FilterIn { collection, .. }
            | Expr::Median { collection }
            | Expr::Sum { collection } => vec![collection.as_mut()],
            Expr::Merge { items } => items.iter_mut().collect(),
            Expr::FilterDate {
                collection,
                start,
                end,
            } => vec![collection.as_mut(), start.as_mut(), end.as_mut()],
            Expr::Select { input, .. } => vec![input.as_mut()],
            Expr::Clip { image, .. }
            | Expr::NormalizedDifference { image, .. }
            | Expr::Rename { image, .. }
            | Expr::Metadata { image, .. }
            | Expr::BitwiseNot { image }
            | Expr::MaskOf { image }
            | Expr::ReduceRegion { image, .. }
            | Expr::Sample { image, .. }
            | Expr::SamplePoints { image, .. } => vec![image.as_mut()],
            Expr::AddBands { image, other } => vec![image.as_mut(), other.as_mut()],
            Expr::UpdateMask { image, mask } => vec![image.as_mut(), mask.as_mut()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reducer_apply() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(Reducer::Mean.apply(&values), Some(2.5));
        assert_eq!(Reducer::Median.apply(&values), Some(2.5));
        assert_eq!(Reducer::Median.apply(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(Reducer::Sum.apply(&values), Some(10.0));
        assert_eq!(Reducer::Min.apply(&values), Some(1.0));
        assert_eq!(Reducer::Max.apply(&values), Some(4.0));
        assert_eq!(Reducer::Count.apply(&values), Some(4.0));
    }

    #[test]
    fn test_reducer_empty_input() {
        assert_eq!(Reducer::Mean.apply(&[]), None);
        assert_eq!(Reducer::Count.apply(&[]), Some(0.0));
    }

    #[test]
    fn test_bind_replaces_free_args() {
        let body = Expr::Arg.multiply(Expr::number(5.0)).add(Expr::Arg);
        let bound = body.bind(&Expr::number(2.0));
        assert_eq!(
            bound,
            Expr::number(2.0)
                .multiply(Expr::number(5.0))
                .add(Expr::number(2.0))
        );
        assert!(!bound.contains_arg());
    }

    #[test]
    fn test_bind_leaves_nested_map_body_alone() {
        let inner = Expr::sequence(0.0, 3.0, 1.0).map(Expr::Arg.add(Expr::number(1.0)));
        let body = Expr::Arg.add(Expr::number(1.0)).add(inner.clone().length());
        let bound = body.bind(&Expr::number(7.0));

        match bound {
            Expr::Add { rhs, .. } => assert_eq!(*rhs, inner.length()),
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn test_bind_reaches_map_collection() {
        let body = Expr::Arg.map(Expr::Arg);
        let bound = body.bind(&Expr::dataset("A"));
        assert_eq!(bound, Expr::dataset("A").map(Expr::Arg));
    }

    #[test]
    fn test_node_count_includes_map_body() {
        let expr = Expr::dataset("A").map(Expr::Arg.median());
        assert_eq!(expr.node_count(), 4);
        assert_eq!(Expr::merge(vec![Expr::Arg, Expr::Arg]).node_count(), 3);
    }

    #[test]
    fn test_serde_round_trip_tagged() {
        let expr = Expr::dataset("NASA/ORNL/DAYMET")
            .select(["prcp"])
            .filter_date(
                Expr::date(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()),
                Expr::date(NaiveDate::from_ymd_opt(2000, 1, 6).unwrap()),
            )
            .sum()
            .reduce_region(Reducer::Mean, None, 30.0);

        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["op"], "reduce_region");
        assert_eq!(json["reducer"], "mean");
        assert_eq!(json["image"]["op"], "sum");

        let back: Expr = serde_json::from_value(json).unwrap();
        assert_eq!(back, expr);
    }
}
