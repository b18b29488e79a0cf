//! Materialized results of evaluating an expression.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::record::{ResultRecord, ResultSet};

/// Metadata describing an image, as returned when an image (or a
/// collection of images) is fetched as a literal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub bands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_start: Option<i64>,
}

/// A value returned by the compute service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Number(f64),
    Date(NaiveDate),
    /// A single record, e.g. the output of a region reduction.
    Dictionary(ResultRecord),
    /// A feature collection, e.g. the output of point sampling.
    Features(Vec<ResultRecord>),
    Image(ImageInfo),
    List(Vec<Value>),
}

impl Value {
    /// Number of elements a literal of this value materializes. Records of
    /// nested feature collections count individually.
    pub fn element_count(&self) -> usize {
        match self {
            Value::Features(features) => features.len(),
            Value::List(items) => items.iter().map(Value::element_count).sum(),
            _ => 1,
        }
    }

    /// Returns the number if this is a numeric value.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Number(_) => "number",
            Value::Date(_) => "date",
            Value::Dictionary(_) => "dictionary",
            Value::Features(_) => "features",
            Value::Image(_) => "image",
            Value::List(_) => "list",
        }
    }

    /// Flattens the value into result records, preserving order.
    ///
    /// Dictionaries yield one record, feature collections yield their
    /// features, and lists are flattened recursively. Returns `None` if the
    /// value contains anything other than records.
    pub fn into_records(self) -> Option<ResultSet> {
        let mut out = ResultSet::default();
        if self.collect_records(&mut out) {
            Some(out)
        } else {
            None
        }
    }

    fn collect_records(self, out: &mut ResultSet) -> bool {
        match self {
            Value::Dictionary(record) => {
                out.push(record);
                true
            }
            Value::Features(features) => {
                out.extend(features);
                true
            }
            Value::List(items) => items.into_iter().all(|item| item.collect_records(out)),
            _ => false,
        }
    }
}
