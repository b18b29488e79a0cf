//! Named image collections served by the in-memory backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate};

use super::raster::{Grid, Image};

/// Dataset ids and grid shared by the demo catalog and the default scenarios.
pub mod demo {
    /// 32-day NDVI composites, 1984-2011.
    pub const NDVI_32DAY: &str = "LANDSAT/LT5_L1T_32DAY_NDVI";
    /// Daily precipitation/temperature grids for 2000.
    pub const DAYMET: &str = "NASA/ORNL/DAYMET";
    /// Raw Landsat 5 scenes (B3, B4), 1999-2001.
    pub const LANDSAT_SCENES: &str = "LANDSAT/LT5_L1T";
    /// Landsat 5 surface reflectance with a QA band, 1995-2005.
    pub const SURFACE_REFLECTANCE: &str = "LEDAPS/LT5_L1T_SR";

    /// West edge of the demo grid (degrees).
    pub const WEST: f64 = -107.2;
    /// North edge of the demo grid (degrees).
    pub const NORTH: f64 = 39.2;
    /// Pixel size of the demo grid (degrees).
    pub const PIXEL_SIZE: f64 = 0.05;
    /// Demo grid width and height in pixels.
    pub const SIZE: usize = 8;

    /// QA bits flagging cloud; pixels with both set are masked.
    pub const CLOUD_BITS: i64 = 0x6000;
}

/// Collection of named datasets.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    datasets: BTreeMap<String, Vec<Arc<Image>>>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a dataset.
    pub fn with_dataset(mut self, id: impl Into<String>, images: Vec<Image>) -> Self {
        self.insert(id, images);
        self
    }

    /// Adds (or replaces) a dataset.
    pub fn insert(&mut self, id: impl Into<String>, images: Vec<Image>) {
        self.datasets
            .insert(id.into(), images.into_iter().map(Arc::new).collect());
    }

    /// Returns the images of a dataset in insertion order.
    pub fn get(&self, id: &str) -> Option<&[Arc<Image>]> {
        self.datasets.get(id).map(Vec::as_slice)
    }

    /// Dataset ids in sorted order.
    pub fn dataset_ids(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    /// Synthetic catalog covering the datasets used by the built-in scenarios.
    ///
    /// All datasets share one 8×8 grid of 0.05° pixels over the East River
    /// watershed. Values are deterministic functions of date and pixel, so
    /// repeated runs give identical results.
    pub fn demo() -> Self {
        Self::new()
            .with_dataset(demo::NDVI_32DAY, ndvi_composites())
            .with_dataset(demo::DAYMET, daymet())
            .with_dataset(demo::LANDSAT_SCENES, landsat_scenes())
            .with_dataset(demo::SURFACE_REFLECTANCE, surface_reflectance())
    }
}

fn demo_grid() -> Grid {
    Grid::new(
        demo::WEST,
        demo::NORTH,
        demo::PIXEL_SIZE,
        demo::SIZE,
        demo::SIZE,
    )
}

/// Dates from `start` every `step` days, strictly before `end`.
fn dates(start: NaiveDate, end: NaiveDate, step: u64) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut date = start;
    while date < end {
        out.push(date);
        match date.checked_add_days(Days::new(step)) {
            Some(next) => date = next,
            None => break,
        }
    }
    out
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

/// 0 in winter, 1 in mid-summer.
fn seasonal(date: NaiveDate) -> f64 {
    let phase = std::f64::consts::PI * date.ordinal0() as f64 / 365.0;
    phase.sin().powi(2)
}

fn pixels(f: impl Fn(usize) -> f64) -> Vec<f64> {
    (0..demo::SIZE * demo::SIZE).map(f).collect()
}

fn ndvi_composites() -> Vec<Image> {
    dates(ymd(1984, 1, 1), ymd(2012, 1, 1), 32)
        .into_iter()
        .map(|date| {
            let trend = (date.year() - 1984) as f64 * 0.002;
            let season = seasonal(date);
            Image::new(demo_grid())
                .with_id(format!("{}", date.format("%Y%m%d")))
                .with_date(date)
                .with_band(
                    "NDVI",
                    pixels(|i| 0.15 + 0.5 * season + trend + (i % 7) as f64 * 0.01),
                )
        })
        .collect()
}

fn daymet() -> Vec<Image> {
    dates(ymd(2000, 1, 1), ymd(2001, 1, 1), 1)
        .into_iter()
        .map(|date| {
            let day = date.ordinal0() as usize;
            Image::new(demo_grid())
                .with_id(format!("{}", date.format("%Y%m%d")))
                .with_date(date)
                .with_band("prcp", pixels(|i| ((day * 7 + i * 3) % 11) as f64 * 0.5))
                .with_band("tmax", pixels(|i| -5.0 + 25.0 * seasonal(date) + (i % 5) as f64))
        })
        .collect()
}

fn landsat_scenes() -> Vec<Image> {
    dates(ymd(1999, 1, 1), ymd(2002, 1, 1), 16)
        .into_iter()
        .map(|date| {
            let season = seasonal(date);
            Image::new(demo_grid())
                .with_id(format!("LT50350331{}", date.format("%Y%j")))
                .with_date(date)
                .with_property("WRS_PATH", 35.0)
                .with_property("WRS_ROW", 33.0)
                .with_band("B3", pixels(|i| 40.0 + (i % 9) as f64 * 2.0))
                .with_band("B4", pixels(|i| 50.0 + 60.0 * season + (i % 4) as f64 * 3.0))
        })
        .collect()
}

fn surface_reflectance() -> Vec<Image> {
    let mut images = Vec::new();
    for (path, row) in [(34, 33), (35, 33), (35, 34), (36, 33)] {
        for (n, date) in dates(ymd(1995, 1, 1), ymd(2006, 1, 1), 16)
            .into_iter()
            .enumerate()
        {
            let season = seasonal(date);
            images.push(
                Image::new(demo_grid())
                    .with_id(format!("LT5{:03}{:03}_{}", path, row, date.format("%Y%m%d")))
                    .with_date(date)
                    .with_property("WRS_PATH", path as f64)
                    .with_property("WRS_ROW", row as f64)
                    .with_band("B3", pixels(|i| 300.0 + (i % 6) as f64 * 25.0))
                    .with_band("B4", pixels(|i| 900.0 + 1500.0 * season + (i % 3) as f64 * 40.0))
                    .with_band(
                        "QA",
                        pixels(|i| {
                            if (n + i) % 9 == 0 {
                                demo::CLOUD_BITS as f64
                            } else {
                                0.0
                            }
                        }),
                    ),
            );
        }
    }
    images
}
