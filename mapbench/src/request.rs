//! Immutable request specifications.
//!
//! A [`RequestSpec`] bundles the date window, region, bands, reducer and scale
//! of one computation. The iterative variants construct a fresh spec on every
//! iteration; the mapped variants capture one and parameterize the window
//! inside the expression instead.

use chrono::{Days, NaiveDate};

use crate::expr::{Expr, Reducer};
use crate::geometry::Geometry;

/// Default sampling/reduction scale in metres (Landsat resolution).
pub const DEFAULT_SCALE: f64 = 30.0;

/// Half-open date window `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Creates a window. Returns `None` if `end` precedes `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// The calendar year `year`.
    pub fn year(year: i32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
        Self::new(start, end)
    }

    /// `days` days starting at `start`.
    pub fn days_from(start: NaiveDate, days: u64) -> Option<Self> {
        let end = start.checked_add_days(Days::new(days))?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Returns true if `date` falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

/// Description of one computation against an image collection.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSpec {
    dates: DateRange,
    region: Geometry,
    bands: Vec<String>,
    reducer: Reducer,
    scale: f64,
}

impl RequestSpec {
    /// Creates a spec reducing all bands with the mean at [`DEFAULT_SCALE`].
    pub fn new(dates: DateRange, region: Geometry) -> Self {
        Self {
            dates,
            region,
            bands: Vec::new(),
            reducer: Reducer::Mean,
            scale: DEFAULT_SCALE,
        }
    }

    /// Restricts the computation to the given bands.
    pub fn with_bands<S: Into<String>>(mut self, bands: impl IntoIterator<Item = S>) -> Self {
        self.bands = bands.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the reducer.
    pub fn with_reducer(mut self, reducer: Reducer) -> Self {
        self.reducer = reducer;
        self
    }

    /// Sets the scale in metres.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn dates(&self) -> DateRange {
        self.dates
    }

    pub fn region(&self) -> &Geometry {
        &self.region
    }

    pub fn bands(&self) -> &[String] {
        &self.bands
    }

    pub fn reducer(&self) -> Reducer {
        self.reducer
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Applies the band selection and date window to a collection.
    pub fn filter(&self, collection: Expr) -> Expr {
        let selected = if self.bands.is_empty() {
            collection
        } else {
            collection.select(self.bands.iter().cloned())
        };
        selected.filter_date(Expr::date(self.dates.start), Expr::date(self.dates.end))
    }

    /// Clips an image to the region and reduces it.
    pub fn reduce(&self, image: Expr) -> Expr {
        image
            .clip(self.region.clone())
            .reduce_region(self.reducer, Some(self.region.clone()), self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        assert!(DateRange::new(ymd(2000, 2, 1), ymd(2000, 1, 1)).is_none());
        assert!(DateRange::new(ymd(2000, 1, 1), ymd(2000, 1, 1)).is_some());
    }

    #[test]
    fn test_year_is_half_open() {
        let range = DateRange::year(1984).unwrap();
        assert!(range.contains(ymd(1984, 1, 1)));
        assert!(range.contains(ymd(1984, 12, 31)));
        assert!(!range.contains(ymd(1985, 1, 1)));
    }

    #[test]
    fn test_days_from() {
        let range = DateRange::days_from(ymd(2000, 12, 30), 5).unwrap();
        assert_eq!(range.end(), ymd(2001, 1, 4));
    }

    #[test]
    fn test_spec_defaults_and_builder() {
        let region = Geometry::rectangle(0.0, 0.0, 1.0, 1.0);
        let spec = RequestSpec::new(DateRange::year(2000).unwrap(), region.clone());
        assert_eq!(spec.reducer(), Reducer::Mean);
        assert_eq!(spec.scale(), DEFAULT_SCALE);
        assert!(spec.bands().is_empty());

        let spec = spec
            .with_bands(["prcp"])
            .with_reducer(Reducer::Max)
            .with_scale(1000.0);
        assert_eq!(spec.bands(), ["prcp".to_string()]);
        assert_eq!(spec.reducer(), Reducer::Max);
        assert_eq!(spec.region(), &region);
    }

    #[test]
    fn test_filter_skips_select_without_bands() {
        let region = Geometry::rectangle(0.0, 0.0, 1.0, 1.0);
        let spec = RequestSpec::new(DateRange::year(2000).unwrap(), region);
        match spec.filter(Expr::dataset("A")) {
            Expr::FilterDate { collection, .. } => assert_eq!(*collection, Expr::dataset("A")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_reduce_builds_clip_then_reduce() {
        let region = Geometry::rectangle(0.0, 0.0, 1.0, 1.0);
        let spec = RequestSpec::new(DateRange::year(2000).unwrap(), region.clone());
        let expected = Expr::Arg
            .clip(region.clone())
            .reduce_region(Reducer::Mean, Some(region), 30.0);
        assert_eq!(spec.reduce(Expr::Arg), expected);
    }
}
