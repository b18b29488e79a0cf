//! Built-in benchmark scenarios.
//!
//! Each scenario builds the same computation twice: once as a client-side
//! loop and once as a server-side map. Everything a scenario needs (region,
//! sample points, dataset ids, dates) comes from a [`ScenarioContext`], so the
//! same scenarios run against the demo catalog or a real service.
//!
//! | Scenario | Elements | Per element |
//! |---|---|---|
//! | `yearly-composite` | 28 years | median NDVI composite, region mean |
//! | `precip-aggregate` | 74 five-day windows | precipitation sum, region mean |
//! | `scene-ndvi` | one year of scenes | NDVI, region mean |
//! | `sampled-export` | 11 years of scenes | cloud-masked NDVI sampled at every point, exported |

use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};

use crate::client::memory::demo;
use crate::expr::{DateUnit, Expr, Reducer};
use crate::geometry::Geometry;
use crate::job::ExportFormat;
use crate::request::{DateRange, RequestSpec, DEFAULT_SCALE};
use crate::variant::{Element, ElementSource, IterativeVariant, MappedVariant, Sink, Transform};

/// QA bits that flag a pixel as cloudy when both are set.
pub const CLOUD_QA_BITS: f64 = 0x6000 as f64;

/// Inputs shared by all scenarios.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioContext {
    /// Watershed the reductions are clipped to.
    pub region: Geometry,
    /// Sample locations for the export scenario.
    pub points: Vec<Geometry>,
    /// Nominal scale in meters for reductions and sampling.
    pub scale: f64,
    pub ndvi_composites: String,
    pub precipitation: String,
    pub scenes: String,
    pub surface_reflectance: String,
    /// First year of the composite series.
    pub first_year: i32,
    /// Number of yearly composites.
    pub years: u32,
    /// Start of the precipitation year.
    pub precip_start: NaiveDate,
    /// Year whose scenes are reduced by `scene-ndvi`.
    pub scene_year: i32,
    /// Date window for `sampled-export` (end exclusive).
    pub export_dates: (NaiveDate, NaiveDate),
    /// WRS paths kept by `sampled-export`.
    pub wrs_paths: Vec<f64>,
    pub wrs_row: f64,
    pub export_format: ExportFormat,
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

impl Default for ScenarioContext {
    fn default() -> Self {
        Self {
            region: Geometry::polygon(vec![
                [-107.12, 38.86],
                [-106.86, 38.90],
                [-106.84, 39.12],
                [-107.00, 39.17],
                [-107.15, 39.05],
            ]),
            points: vec![
                Geometry::point(-107.01, 39.01),
                Geometry::point(-106.94, 38.96),
                Geometry::point(-107.06, 39.09),
                Geometry::point(-106.89, 39.04),
                Geometry::point(-107.09, 38.97),
            ],
            scale: DEFAULT_SCALE,
            ndvi_composites: demo::NDVI_32DAY.to_string(),
            precipitation: demo::DAYMET.to_string(),
            scenes: demo::LANDSAT_SCENES.to_string(),
            surface_reflectance: demo::SURFACE_REFLECTANCE.to_string(),
            first_year: 1984,
            years: 28,
            precip_start: ymd(2000, 1, 1),
            scene_year: 2000,
            export_dates: (ymd(1995, 1, 1), ymd(2005, 12, 31)),
            wrs_paths: vec![35.0, 34.0],
            wrs_row: 33.0,
            export_format: ExportFormat::Csv,
        }
    }
}

/// An iterative/mapped pair computing the same thing.
#[derive(Clone, Debug)]
pub struct ScenarioVariants {
    pub iterative: IterativeVariant,
    pub mapped: MappedVariant,
}

/// A built-in scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scenario {
    YearlyComposite,
    PrecipAggregate,
    SceneNdvi,
    SampledExport,
}

impl Scenario {
    pub fn all() -> [Scenario; 4] {
        [
            Scenario::YearlyComposite,
            Scenario::PrecipAggregate,
            Scenario::SceneNdvi,
            Scenario::SampledExport,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::YearlyComposite => "yearly-composite",
            Scenario::PrecipAggregate => "precip-aggregate",
            Scenario::SceneNdvi => "scene-ndvi",
            Scenario::SampledExport => "sampled-export",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Scenario::YearlyComposite => "Yearly median NDVI composites reduced to the region mean",
            Scenario::PrecipAggregate => "Five-day precipitation sums reduced to the region mean",
            Scenario::SceneNdvi => "Per-scene NDVI region mean over one year of scenes",
            Scenario::SampledExport => "Cloud-masked NDVI sampled at points, exported as a table",
        }
    }

    /// Builds both variants from `ctx`.
    pub fn build(&self, ctx: &ScenarioContext) -> ScenarioVariants {
        match self {
            Scenario::YearlyComposite => yearly_composite(ctx),
            Scenario::PrecipAggregate => precip_aggregate(ctx),
            Scenario::SceneNdvi => scene_ndvi(ctx),
            Scenario::SampledExport => sampled_export(ctx),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::all()
            .into_iter()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Scenario::all().iter().map(|s| s.name()).collect();
                format!("unknown scenario '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

fn region_mean(ctx: &ScenarioContext, image: Expr) -> Expr {
    image
        .clip(ctx.region.clone())
        .reduce_region(Reducer::Mean, Some(ctx.region.clone()), ctx.scale)
}

fn yearly_composite(ctx: &ScenarioContext) -> ScenarioVariants {
    // Inclusive offsets 0..years; an empty sequence when years is zero.
    let last = f64::from(ctx.years) - 1.0;

    let loop_ctx = ctx.clone();
    let iterative = IterativeVariant::new(
        "yearly-composite",
        ElementSource::range(0.0, last, 1.0),
        move |element: &Element| {
            let offset = element.as_number().unwrap_or_default() as i32;
            DateRange::year(loop_ctx.first_year + offset)
                .map(|dates| {
                    let spec = RequestSpec::new(dates, loop_ctx.region.clone())
                        .with_scale(loop_ctx.scale);
                    spec.reduce(spec.filter(Expr::dataset(loop_ctx.ndvi_composites.as_str())).median())
                })
                .into_iter()
                .collect()
        },
    );

    let origin = Expr::date(ymd(ctx.first_year, 1, 1));
    let body = Expr::dataset(ctx.ndvi_composites.as_str())
        .filter_date(
            origin.clone().advance(Expr::Arg, DateUnit::Year),
            origin.advance(Expr::Arg.add(Expr::number(1.0)), DateUnit::Year),
        )
        .median();
    let mapped = MappedVariant::new(
        "yearly-composite",
        Expr::sequence(0.0, last, 1.0),
        Transform::Reduce(region_mean(ctx, body)),
    );

    ScenarioVariants { iterative, mapped }
}

fn precip_aggregate(ctx: &ScenarioContext) -> ScenarioVariants {
    const WINDOW_DAYS: u64 = 5;
    const YEAR_DAYS: f64 = 365.0;

    let loop_ctx = ctx.clone();
    let iterative = IterativeVariant::new(
        "precip-aggregate",
        ElementSource::range(0.0, YEAR_DAYS, WINDOW_DAYS as f64),
        move |element: &Element| {
            let offset = element.as_number().unwrap_or_default() as u64;
            loop_ctx
                .precip_start
                .checked_add_days(Days::new(offset))
                .and_then(|start| DateRange::days_from(start, WINDOW_DAYS))
                .map(|dates| {
                    let spec = RequestSpec::new(dates, loop_ctx.region.clone())
                        .with_bands(["prcp"])
                        .with_scale(loop_ctx.scale);
                    spec.reduce(spec.filter(Expr::dataset(loop_ctx.precipitation.as_str())).sum())
                })
                .into_iter()
                .collect()
        },
    );

    let window = Expr::number(WINDOW_DAYS as f64);
    let start = Expr::date(ctx.precip_start).advance(Expr::Arg.multiply(window.clone()), DateUnit::Day);
    let end = start.clone().advance(window, DateUnit::Day);
    let body = Expr::dataset(ctx.precipitation.as_str())
        .select(["prcp"])
        .filter_date(start, end)
        .sum();
    let steps = (YEAR_DAYS / WINDOW_DAYS as f64).floor();
    let mapped = MappedVariant::new(
        "precip-aggregate",
        Expr::sequence(0.0, steps, 1.0),
        Transform::Reduce(region_mean(ctx, body)),
    );

    ScenarioVariants { iterative, mapped }
}

/// Scenes of one year over the region, capped at 365 like a `toList(365)`.
fn scene_collection(ctx: &ScenarioContext) -> Expr {
    Expr::dataset(ctx.scenes.as_str())
        .filter_date(
            Expr::date(ymd(ctx.scene_year, 1, 1)),
            Expr::date(ymd(ctx.scene_year, 12, 31)),
        )
        .filter_bounds(ctx.region.clone())
        .limit(365)
}

fn scene_ndvi(ctx: &ScenarioContext) -> ScenarioVariants {
    let collection = scene_collection(ctx);
    let transform = Transform::Reduce(region_mean(ctx, Expr::Arg.normalized_difference("B4", "B3")));

    ScenarioVariants {
        iterative: IterativeVariant::from_transform(
            "scene-ndvi",
            ElementSource::Remote(collection.clone()),
            transform.clone(),
        ),
        mapped: MappedVariant::new("scene-ndvi", collection, transform),
    }
}

/// Masks pixels whose QA band has both cloud bits set.
pub fn mask_clouds(image: Expr) -> Expr {
    let clear = image
        .clone()
        .select(["QA"])
        .bitwise_not()
        .bitwise_and(Expr::constant(CLOUD_QA_BITS));
    image.clone().update_mask(image.mask_of().and(clear))
}

/// Cloud-masked NDVI (band `NDVI`) plus the acquisition time as a band.
pub fn masked_ndvi(image: Expr, region: &Geometry) -> Expr {
    let masked = mask_clouds(image).clip(region.clone());
    masked
        .clone()
        .normalized_difference("B4", "B3")
        .rename(["NDVI"])
        .add_bands(masked.metadata("system:time_start"))
}

fn surface_reflectance(ctx: &ScenarioContext) -> Expr {
    let (start, end) = ctx.export_dates;
    Expr::dataset(ctx.surface_reflectance.as_str())
        .select(["B3", "B4", "QA"])
        .filter_date(Expr::date(start), Expr::date(end))
        .filter_in("WRS_PATH", ctx.wrs_paths.clone())
        .filter_metadata("WRS_ROW", ctx.wrs_row)
}

fn sampled_export(ctx: &ScenarioContext) -> ScenarioVariants {
    let transform = Transform::SamplePoints {
        prepare: masked_ndvi(Expr::Arg, &ctx.region),
        points: ctx.points.clone(),
        scale: ctx.scale,
    };
    let sink = |description: &str| Sink::Export {
        description: description.to_string(),
        format: ctx.export_format,
    };

    ScenarioVariants {
        iterative: IterativeVariant::from_transform(
            "sampled-export",
            ElementSource::Remote(surface_reflectance(ctx).limit(5000)),
            transform.clone(),
        )
        .with_sink(sink("forTest")),
        mapped: MappedVariant::new("sampled-export", surface_reflectance(ctx), transform)
            .with_sink(sink("mapTest")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in Scenario::all() {
            assert_eq!(scenario.name().parse::<Scenario>().unwrap(), scenario);
        }
        let err = "nope".parse::<Scenario>().unwrap_err();
        assert!(err.contains("yearly-composite"));
    }

    #[test]
    fn test_mapped_bodies_have_free_arg() {
        let ctx = ScenarioContext::default();
        for scenario in Scenario::all() {
            let variants = scenario.build(&ctx);
            assert!(variants.mapped.transform().mapped_body().contains_arg());
            assert!(!variants.mapped.collection().contains_arg());
        }
    }

    #[test]
    fn test_sampled_export_uses_export_sinks() {
        let variants = Scenario::SampledExport.build(&ScenarioContext::default());
        assert!(matches!(variants.iterative.sink(), Sink::Export { description, .. } if description == "forTest"));
        assert!(matches!(variants.mapped.sink(), Sink::Export { description, .. } if description == "mapTest"));
    }

    #[test]
    fn test_zero_years_builds_no_composites() {
        use crate::client::{Catalog, CountingClient, InMemoryClient};
        use crate::variant::{Variant, VariantOutcome};

        let ctx = ScenarioContext {
            years: 0,
            ..ScenarioContext::default()
        };
        let variants = Scenario::YearlyComposite.build(&ctx);
        let client = CountingClient::new(InMemoryClient::new(Catalog::demo()));

        for variant in [&variants.iterative as &dyn Variant, &variants.mapped] {
            match variant.run(&client).unwrap() {
                VariantOutcome::Results(results) => assert!(results.is_empty()),
                other => panic!("unexpected: {:?}", other),
            }
        }
        // Only the mapped runner talks to the service.
        assert_eq!(client.snapshot().total(), 1);
    }

    #[test]
    fn test_precip_windows_line_up() {
        let variants = Scenario::PrecipAggregate.build(&ScenarioContext::default());
        assert_eq!(
            variants.iterative.source(),
            &ElementSource::range(0.0, 365.0, 5.0)
        );
        assert_eq!(variants.mapped.collection(), &Expr::sequence(0.0, 73.0, 1.0));
    }

    #[test]
    fn test_demo_points_lie_in_region() {
        let ctx = ScenarioContext::default();
        for point in &ctx.points {
            if let Geometry::Point { lon, lat } = point {
                assert!(ctx.region.contains(*lon, *lat), "{:?}", point);
            }
        }
    }
}
