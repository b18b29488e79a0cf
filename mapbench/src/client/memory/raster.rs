//! Small georeferenced rasters held by the in-memory backend.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::expr::ImageInfo;
use crate::geometry::Bounds;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Milliseconds since the Unix epoch at midnight UTC of `date`.
pub fn date_millis(date: NaiveDate) -> i64 {
    date.signed_duration_since(NaiveDate::default()).num_days() * MILLIS_PER_DAY
}

/// North-up pixel grid in lon/lat degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid {
    pub west: f64,
    pub north: f64,
    /// Pixel edge length in degrees.
    pub pixel_size: f64,
    pub width: usize,
    pub height: usize,
}

impl Grid {
    pub fn new(west: f64, north: f64, pixel_size: f64, width: usize, height: usize) -> Self {
        Self {
            west,
            north,
            pixel_size,
            width,
            height,
        }
    }

    /// A grid with no pixels.
    pub fn empty() -> Self {
        Self::new(0.0, 0.0, 1.0, 0, 0)
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lon/lat of the centre of pixel `index` (row-major).
    pub fn pixel_center(&self, index: usize) -> (f64, f64) {
        let row = index / self.width.max(1);
        let col = index % self.width.max(1);
        (
            self.west + (col as f64 + 0.5) * self.pixel_size,
            self.north - (row as f64 + 0.5) * self.pixel_size,
        )
    }

    /// Index of the pixel containing a location, if it lies on the grid.
    pub fn pixel_at(&self, lon: f64, lat: f64) -> Option<usize> {
        let col = ((lon - self.west) / self.pixel_size).floor();
        let row = ((self.north - lat) / self.pixel_size).floor();
        if col < 0.0 || row < 0.0 || col >= self.width as f64 || row >= self.height as f64 {
            return None;
        }
        Some(row as usize * self.width + col as usize)
    }

    /// `(west, south, east, north)` of the grid.
    pub fn bounds(&self) -> Bounds {
        (
            self.west,
            self.north - self.height as f64 * self.pixel_size,
            self.west + self.width as f64 * self.pixel_size,
            self.north,
        )
    }
}

/// One named band of pixel values.
#[derive(Clone, Debug, PartialEq)]
pub struct Band {
    pub name: String,
    pub pixels: Vec<f64>,
}

/// A multi-band image with a single shared mask.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub id: Option<String>,
    /// Acquisition time in milliseconds since the Unix epoch.
    pub time_start: Option<i64>,
    pub properties: BTreeMap<String, f64>,
    pub grid: Grid,
    pub bands: Vec<Band>,
    /// `true` where the pixel is valid.
    pub mask: Vec<bool>,
}

impl Image {
    /// Creates an image with no bands and every pixel valid.
    pub fn new(grid: Grid) -> Self {
        Self {
            id: None,
            time_start: None,
            properties: BTreeMap::new(),
            grid,
            bands: Vec::new(),
            mask: vec![true; grid.len()],
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the acquisition time to midnight UTC of `date`.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.time_start = Some(date_millis(date));
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: f64) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Appends a band.
    ///
    /// # Panics
    ///
    /// Panics if `pixels` does not match the grid size.
    pub fn with_band(mut self, name: impl Into<String>, pixels: Vec<f64>) -> Self {
        assert_eq!(
            pixels.len(),
            self.grid.len(),
            "band size must match the grid"
        );
        self.bands.push(Band {
            name: name.into(),
            pixels,
        });
        self
    }

    /// Replaces the mask.
    ///
    /// # Panics
    ///
    /// Panics if `mask` does not match the grid size.
    pub fn with_mask(mut self, mask: Vec<bool>) -> Self {
        assert_eq!(mask.len(), self.grid.len(), "mask size must match the grid");
        self.mask = mask;
        self
    }

    pub fn band(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name == name)
    }

    pub fn band_names(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.name.clone()).collect()
    }

    /// Looks up a numeric property. `system:time_start` resolves to the
    /// acquisition time.
    pub fn property(&self, name: &str) -> Option<f64> {
        match name {
            "system:time_start" => self.time_start.map(|t| t as f64),
            _ => self.properties.get(name).copied(),
        }
    }

    /// Copy of the metadata with a new set of bands and mask.
    pub(crate) fn derive(&self, bands: Vec<Band>, mask: Vec<bool>) -> Image {
        Image {
            id: self.id.clone(),
            time_start: self.time_start,
            properties: self.properties.clone(),
            grid: self.grid,
            bands,
            mask,
        }
    }

    pub fn info(&self) -> ImageInfo {
        ImageInfo {
            id: self.id.clone(),
            bands: self.band_names(),
            time_start: self.time_start,
        }
    }
}
