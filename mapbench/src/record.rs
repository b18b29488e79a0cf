//! Result records returned by the compute service.
//!
//! A [`ResultRecord`] is one row of output: a reduction over a region or a
//! sample at a point. Records produced inside a server-side map are tagged
//! by the service with the mapped element's identifier and acquisition time;
//! records produced by evaluating one element at a time are not. That
//! difference is expected, so comparisons between variants go through
//! [`ResultRecord::normalized`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// A mapping from band or statistic name to a value (null when no pixels contributed).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Band/statistic values keyed by name.
    pub values: BTreeMap<String, Option<f64>>,

    /// Provider-assigned identifier of the element that produced this record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,

    /// Provider-assigned acquisition time (milliseconds since the Unix epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ResultRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value to the record.
    pub fn with_value(mut self, name: impl Into<String>, value: Option<f64>) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Tags the record with its source element.
    pub fn with_source(mut self, source_id: Option<String>, timestamp: Option<i64>) -> Self {
        self.source_id = source_id;
        self.timestamp = timestamp;
        self
    }

    /// Returns the value for a name, or `None` if absent or null.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied().flatten()
    }

    /// Returns a copy with provider-assigned identity removed.
    pub fn normalized(&self) -> Self {
        Self {
            values: self.values.clone(),
            source_id: None,
            timestamp: None,
        }
    }

    /// Stable textual key of the values, used for order-insensitive
    /// comparison. Keeps NaN distinct from a null value.
    fn canonical_key(&self) -> String {
        format!("{:?}", self.values)
    }
}

/// An ordered sequence of result records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    records: Vec<ResultRecord>,
}

impl ResultSet {
    /// Creates a result set from records, preserving their order.
    pub fn new(records: Vec<ResultRecord>) -> Self {
        Self { records }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Borrow the records in order.
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// Consume the set, returning the records in order.
    pub fn into_records(self) -> Vec<ResultRecord> {
        self.records
    }

    /// Iterate over the records in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ResultRecord> {
        self.records.iter()
    }

    /// Append one record.
    pub fn push(&mut self, record: ResultRecord) {
        self.records.push(record);
    }

    /// Returns a copy with provider-assigned identity removed from every record.
    pub fn normalized(&self) -> Self {
        self.records.iter().map(ResultRecord::normalized).collect()
    }

    /// Returns true if both sets hold the same records, ignoring order and
    /// provider-assigned identity.
    pub fn equivalent(&self, other: &ResultSet) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut ours: Vec<String> = self.records.iter().map(|r| r.canonical_key()).collect();
        let mut theirs: Vec<String> = other.records.iter().map(|r| r.canonical_key()).collect();
        ours.sort();
        theirs.sort();
        ours == theirs
    }

    /// Renders the records as CSV with a `source_id,timestamp` prefix and
    /// the union of value names (sorted) as the remaining columns.
    pub fn to_csv(&self) -> String {
        let columns: BTreeSet<&str> = self
            .records
            .iter()
            .flat_map(|r| r.values.keys().map(String::as_str))
            .collect();

        let mut out = String::from("source_id,timestamp");
        for column in &columns {
            out.push(',');
            out.push_str(column);
        }
        out.push('\n');

        for record in &self.records {
            out.push_str(record.source_id.as_deref().unwrap_or(""));
            out.push(',');
            if let Some(ts) = record.timestamp {
                let _ = write!(out, "{}", ts);
            }
            for column in &columns {
                out.push(',');
                if let Some(v) = record.get(column) {
                    let _ = write!(out, "{}", v);
                }
            }
            out.push('\n');
        }
        out
    }
}

impl FromIterator<ResultRecord> for ResultSet {
    fn from_iter<T: IntoIterator<Item = ResultRecord>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ResultSet {
    type Item = ResultRecord;
    type IntoIter = std::vec::IntoIter<ResultRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl Extend<ResultRecord> for ResultSet {
    fn extend<T: IntoIterator<Item = ResultRecord>>(&mut self, iter: T) {
        self.records.extend(iter);
    }
}
