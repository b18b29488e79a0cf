//! Reference evaluator for [`Expr`] trees.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{Days, Months, NaiveDate};

use super::catalog::Catalog;
use super::raster::{date_millis, Band, Grid, Image};
use crate::client::{sequence_values, ClientError};
use crate::expr::{DateUnit, Expr, Reducer, Value};
use crate::geometry::Geometry;
use crate::record::ResultRecord;

type EvalResult<T> = Result<T, ClientError>;

/// An evaluated (but not yet materialized) expression.
///
/// Images stay behind `Arc` so filtering and indexing a collection only
/// bumps reference counts.
#[derive(Clone, Debug)]
pub(crate) enum Datum {
    Number(f64),
    Date(NaiveDate),
    Image(Arc<Image>),
    Images(Vec<Arc<Image>>),
    List(Vec<Datum>),
    Dictionary(ResultRecord),
    Features(Vec<ResultRecord>),
}

impl Datum {
    fn kind(&self) -> &'static str {
        match self {
            Datum::Number(_) => "number",
            Datum::Date(_) => "date",
            Datum::Image(_) => "image",
            Datum::Images(_) => "image collection",
            Datum::List(_) => "list",
            Datum::Dictionary(_) => "dictionary",
            Datum::Features(_) => "feature collection",
        }
    }

    fn len(&self) -> Option<usize> {
        match self {
            Datum::Images(images) => Some(images.len()),
            Datum::List(items) => Some(items.len()),
            Datum::Features(features) => Some(features.len()),
            _ => None,
        }
    }

    /// Elements the materialized literal holds, counting the records of
    /// nested feature collections individually.
    fn element_count(&self) -> usize {
        match self {
            Datum::Images(images) => images.len(),
            Datum::List(items) => items.iter().map(Datum::element_count).sum(),
            Datum::Features(features) => features.len(),
            _ => 1,
        }
    }

    /// Materializes the datum, failing if it holds more than `cap` elements.
    pub(crate) fn into_value(self, cap: usize) -> Result<Value, ClientError> {
        if self.element_count() > cap {
            return Err(ClientError::ResultTooLarge { limit: cap });
        }
        Ok(self.materialize())
    }

    fn materialize(self) -> Value {
        match self {
            Datum::Number(n) => Value::Number(n),
            Datum::Date(d) => Value::Date(d),
            Datum::Image(image) => Value::Image(image.info()),
            Datum::Images(images) => {
                Value::List(images.iter().map(|i| Value::Image(i.info())).collect())
            }
            Datum::List(items) => Value::List(items.into_iter().map(Datum::materialize).collect()),
            Datum::Dictionary(record) => Value::Dictionary(record),
            Datum::Features(features) => Value::Features(features),
        }
    }
}

fn unexpected(op: &str, expected: &str, got: &Datum) -> ClientError {
    ClientError::malformed(format!(
        "{} expects {}, got {}",
        op,
        expected,
        got.kind()
    ))
}

/// Walks an expression tree against a catalog.
///
/// Arg-free collections indexed by [`Expr::Get`] are evaluated once per
/// request and shared, since a client-side loop repeats the same collection
/// in every element it references.
pub(crate) struct Evaluator<'a> {
    catalog: &'a Catalog,
    shared: RefCell<HashMap<String, Rc<Datum>>>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            shared: RefCell::new(HashMap::new()),
        }
    }

    /// Evaluates `expr`; `arg` is the element bound to [`Expr::Arg`], if any.
    pub(crate) fn eval(&self, expr: &Expr, arg: Option<&Datum>) -> EvalResult<Datum> {
        match expr {
            Expr::Arg => arg
                .cloned()
                .ok_or_else(|| ClientError::malformed("arg used outside of a map body")),
            Expr::Number { value } | Expr::Constant { value } => Ok(Datum::Number(*value)),
            Expr::Date { value } => Ok(Datum::Date(*value)),
            Expr::Add { lhs, rhs } => self.binary(lhs, rhs, arg, |a, b| a + b),
            Expr::Multiply { lhs, rhs } => self.binary(lhs, rhs, arg, |a, b| a * b),
            Expr::BitwiseAnd { lhs, rhs } => {
                self.binary(lhs, rhs, arg, |a, b| ((a as i64) & (b as i64)) as f64)
            }
            Expr::And { lhs, rhs } => self.binary(lhs, rhs, arg, |a, b| {
                if a != 0.0 && b != 0.0 {
                    1.0
                } else {
                    0.0
                }
            }),
            Expr::DateAdvance { date, amount, unit } => {
                let date = self.date(date, arg)?;
                let amount = self.number(amount, arg)?;
                advance(date, amount, *unit).map(Datum::Date)
            }

            Expr::Sequence { start, end, step } => sequence(*start, *end, *step),
            Expr::Dataset { id } => self
                .catalog
                .get(id)
                .map(|images| Datum::Images(images.to_vec()))
                .ok_or_else(|| ClientError::malformed(format!("Unknown dataset '{}'", id))),
            Expr::Get { collection, index } => {
                let collection = self.shared(collection, arg)?;
                get(&collection, *index)
            }
            Expr::Length { collection } => {
                let collection = self.eval(collection, arg)?;
                collection
                    .len()
                    .map(|n| Datum::Number(n as f64))
                    .ok_or_else(|| unexpected("length", "a collection", &collection))
            }
            Expr::Limit { collection, max } => match self.eval(collection, arg)? {
                Datum::Images(mut images) => {
                    images.truncate(*max);
                    Ok(Datum::Images(images))
                }
                Datum::List(mut items) => {
                    items.truncate(*max);
                    Ok(Datum::List(items))
                }
                Datum::Features(mut features) => {
                    features.truncate(*max);
                    Ok(Datum::Features(features))
                }
                other => Err(unexpected("limit", "a collection", &other)),
            },
            Expr::Map { collection, body } => {
                let collection = self.eval(collection, arg)?;
                self.map(collection, body)
            }
            Expr::Flatten { collection } => {
                let collection = self.eval(collection, arg)?;
                Ok(Datum::Features(features(collection, "flatten")?))
            }
            Expr::Merge { items } => {
                let mut merged = Vec::new();
                for item in items {
                    merged.extend(features(self.eval(item, arg)?, "merge")?);
                }
                Ok(Datum::Features(merged))
            }

            Expr::FilterDate {
                collection,
                start,
                end,
            } => {
                let start = date_millis(self.date(start, arg)?);
                let end = date_millis(self.date(end, arg)?);
                self.filter(collection, arg, "filter_date", |image| {
                    image.time_start.is_some_and(|t| t >= start && t < end)
                })
            }
            Expr::FilterBounds {
                collection,
                geometry,
            } => self.filter(collection, arg, "filter_bounds", |image| {
                geometry.intersects_bounds(image.grid.bounds())
            }),
            Expr::FilterMetadata {
                collection,
                property,
                value,
            } => self.filter(collection, arg, "filter_metadata", |image| {
                image.property(property) == Some(*value)
            }),
            Expr::FilterIn {
                collection,
                property,
                values,
            } => self.filter(collection, arg, "filter_in", |image| {
                image
                    .property(property)
                    .is_some_and(|p| values.contains(&p))
            }),

            Expr::Select { input, bands } => match self.eval(input, arg)? {
                Datum::Image(image) => Ok(Datum::Image(Arc::new(select(&image, bands)?))),
                Datum::Images(images) => images
                    .iter()
                    .map(|image| select(image, bands).map(Arc::new))
                    .collect::<EvalResult<Vec<_>>>()
                    .map(Datum::Images),
                other => Err(unexpected("select", "an image", &other)),
            },
            Expr::Median { collection } => {
                let images = self.images(collection, arg, "median")?;
                composite(&images, Reducer::Median).map(|i| Datum::Image(Arc::new(i)))
            }
            Expr::Sum { collection } => {
                let images = self.images(collection, arg, "sum")?;
                composite(&images, Reducer::Sum).map(|i| Datum::Image(Arc::new(i)))
            }
            Expr::Clip { image, geometry } => {
                let image = self.image(image, arg, "clip")?;
                let mask = image
                    .mask
                    .iter()
                    .enumerate()
                    .map(|(i, valid)| {
                        let (lon, lat) = image.grid.pixel_center(i);
                        *valid && geometry.contains(lon, lat)
                    })
                    .collect();
                Ok(Datum::Image(Arc::new(image.derive(image.bands.clone(), mask))))
            }
            Expr::NormalizedDifference {
                image,
                first,
                second,
            } => {
                let image = self.image(image, arg, "normalized_difference")?;
                normalized_difference(&image, first, second).map(|i| Datum::Image(Arc::new(i)))
            }
            Expr::Rename { image, names } => {
                let image = self.image(image, arg, "rename")?;
                if names.len() != image.bands.len() {
                    return Err(ClientError::malformed(format!(
                        "rename expects {} names, got {}",
                        image.bands.len(),
                        names.len()
                    )));
                }
                let bands = image
                    .bands
                    .iter()
                    .zip(names)
                    .map(|(band, name)| Band {
                        name: name.clone(),
                        pixels: band.pixels.clone(),
                    })
                    .collect();
                Ok(Datum::Image(Arc::new(image.derive(bands, image.mask.clone()))))
            }
            Expr::AddBands { image, other } => {
                let image = self.image(image, arg, "add_bands")?;
                let other = self.image(other, arg, "add_bands")?;
                if image.grid != other.grid {
                    return Err(ClientError::malformed("add_bands expects matching grids"));
                }
                let mut bands = image.bands.clone();
                bands.extend(other.bands.iter().cloned());
                let mask = image
                    .mask
                    .iter()
                    .zip(&other.mask)
                    .map(|(a, b)| *a && *b)
                    .collect();
                Ok(Datum::Image(Arc::new(image.derive(bands, mask))))
            }
            Expr::Metadata { image, property } => {
                let image = self.image(image, arg, "metadata")?;
                let value = image.property(property).ok_or_else(|| {
                    ClientError::malformed(format!("Image has no property '{}'", property))
                })?;
                let band = Band {
                    name: property.clone(),
                    pixels: vec![value; image.grid.len()],
                };
                Ok(Datum::Image(Arc::new(
                    image.derive(vec![band], vec![true; image.grid.len()]),
                )))
            }
            Expr::BitwiseNot { image } => match self.eval(image, arg)? {
                Datum::Number(n) => Ok(Datum::Number(!(n as i64) as f64)),
                Datum::Image(image) => Ok(Datum::Image(Arc::new(map_pixels(&image, |v| {
                    !(v as i64) as f64
                })))),
                other => Err(unexpected("bitwise_not", "an image", &other)),
            },
            Expr::MaskOf { image } => {
                let image = self.image(image, arg, "mask_of")?;
                let band = Band {
                    name: "mask".to_string(),
                    pixels: image.mask.iter().map(|m| if *m { 1.0 } else { 0.0 }).collect(),
                };
                Ok(Datum::Image(Arc::new(
                    image.derive(vec![band], vec![true; image.grid.len()]),
                )))
            }
            Expr::UpdateMask { image, mask } => {
                let image = self.image(image, arg, "update_mask")?;
                let mask = self.image(mask, arg, "update_mask")?;
                let first = mask
                    .bands
                    .first()
                    .ok_or_else(|| ClientError::malformed("update_mask expects a mask band"))?;
                if image.grid != mask.grid {
                    return Err(ClientError::malformed("update_mask expects matching grids"));
                }
                let updated = image
                    .mask
                    .iter()
                    .zip(&mask.mask)
                    .zip(&first.pixels)
                    .map(|((a, b), v)| *a && *b && *v != 0.0)
                    .collect();
                Ok(Datum::Image(Arc::new(image.derive(image.bands.clone(), updated))))
            }

            Expr::ReduceRegion {
                image,
                reducer,
                geometry,
                scale,
            } => {
                check_scale(*scale)?;
                let image = self.image(image, arg, "reduce_region")?;
                Ok(Datum::Dictionary(reduce_region(
                    &image,
                    *reducer,
                    geometry.as_ref(),
                )))
            }
            Expr::Sample {
                image,
                geometry,
                scale,
            } => {
                check_scale(*scale)?;
                let image = self.image(image, arg, "sample")?;
                Ok(Datum::Features(sample(&image, geometry)?.into_iter().collect()))
            }
            Expr::SamplePoints {
                image,
                points,
                scale,
            } => {
                check_scale(*scale)?;
                let image = self.image(image, arg, "sample_points")?;
                let mut features = Vec::new();
                for point in points {
                    features.extend(sample(&image, point)?);
                }
                Ok(Datum::Features(features))
            }
        }
    }

    fn shared(&self, expr: &Expr, arg: Option<&Datum>) -> EvalResult<Rc<Datum>> {
        if expr.contains_arg() {
            return self.eval(expr, arg).map(Rc::new);
        }
        let key = serde_json::to_string(expr)
            .map_err(|e| ClientError::malformed(format!("Failed to encode expression: {}", e)))?;
        if let Some(datum) = self.shared.borrow().get(&key) {
            return Ok(Rc::clone(datum));
        }
        let datum = Rc::new(self.eval(expr, arg)?);
        self.shared.borrow_mut().insert(key, Rc::clone(&datum));
        Ok(datum)
    }

    fn map(&self, collection: Datum, body: &Expr) -> EvalResult<Datum> {
        let elements: Vec<Datum> = match collection {
            Datum::Images(images) => images.into_iter().map(Datum::Image).collect(),
            Datum::List(items) => items,
            Datum::Features(features) => features.into_iter().map(Datum::Dictionary).collect(),
            other => return Err(unexpected("map", "a collection", &other)),
        };

        let mut results = Vec::with_capacity(elements.len());
        for element in &elements {
            let result = self.eval(body, Some(element))?;
            results.push(match element {
                Datum::Image(image) => tag(result, image),
                _ => result,
            });
        }

        if !results.is_empty() && results.iter().all(|r| matches!(r, Datum::Image(_))) {
            let images = results
                .into_iter()
                .filter_map(|r| match r {
                    Datum::Image(image) => Some(image),
                    _ => None,
                })
                .collect();
            return Ok(Datum::Images(images));
        }
        Ok(Datum::List(results))
    }

    fn filter(
        &self,
        collection: &Expr,
        arg: Option<&Datum>,
        op: &str,
        keep: impl Fn(&Image) -> bool,
    ) -> EvalResult<Datum> {
        let images = self.images(collection, arg, op)?;
        Ok(Datum::Images(
            images.into_iter().filter(|image| keep(image)).collect(),
        ))
    }

    fn binary(
        &self,
        lhs: &Expr,
        rhs: &Expr,
        arg: Option<&Datum>,
        f: impl Fn(f64, f64) -> f64,
    ) -> EvalResult<Datum> {
        let lhs = self.eval(lhs, arg)?;
        let rhs = self.eval(rhs, arg)?;
        match (&lhs, &rhs) {
            (Datum::Number(a), Datum::Number(b)) => Ok(Datum::Number(f(*a, *b))),
            (Datum::Image(image), Datum::Number(b)) => {
                Ok(Datum::Image(Arc::new(map_pixels(image, |v| f(v, *b)))))
            }
            (Datum::Number(a), Datum::Image(image)) => {
                Ok(Datum::Image(Arc::new(map_pixels(image, |v| f(*a, v)))))
            }
            (Datum::Image(a), Datum::Image(b)) => zip_images(a, b, f).map(|i| Datum::Image(Arc::new(i))),
            _ => Err(ClientError::malformed(format!(
                "cannot combine {} with {}",
                lhs.kind(),
                rhs.kind()
            ))),
        }
    }

    fn number(&self, expr: &Expr, arg: Option<&Datum>) -> EvalResult<f64> {
        match self.eval(expr, arg)? {
            Datum::Number(n) => Ok(n),
            other => Err(unexpected("operation", "a number", &other)),
        }
    }

    fn date(&self, expr: &Expr, arg: Option<&Datum>) -> EvalResult<NaiveDate> {
        match self.eval(expr, arg)? {
            Datum::Date(d) => Ok(d),
            other => Err(unexpected("operation", "a date", &other)),
        }
    }

    fn image(&self, expr: &Expr, arg: Option<&Datum>, op: &str) -> EvalResult<Arc<Image>> {
        match self.eval(expr, arg)? {
            Datum::Image(image) => Ok(image),
            other => Err(unexpected(op, "an image", &other)),
        }
    }

    fn images(&self, expr: &Expr, arg: Option<&Datum>, op: &str) -> EvalResult<Vec<Arc<Image>>> {
        match self.eval(expr, arg)? {
            Datum::Images(images) => Ok(images),
            other => Err(unexpected(op, "an image collection", &other)),
        }
    }
}

/// Records produced from an image carry its id and acquisition time.
fn tag(result: Datum, image: &Image) -> Datum {
    let source = |r: ResultRecord| r.with_source(image.id.clone(), image.time_start);
    match result {
        Datum::Dictionary(record) => Datum::Dictionary(source(record)),
        Datum::Features(features) => Datum::Features(features.into_iter().map(source).collect()),
        other => other,
    }
}

fn features(datum: Datum, op: &str) -> EvalResult<Vec<ResultRecord>> {
    match datum {
        Datum::Features(features) => Ok(features),
        Datum::Dictionary(record) => Ok(vec![record]),
        Datum::List(items) => {
            let mut out = Vec::new();
            for item in items {
                out.extend(features(item, op)?);
            }
            Ok(out)
        }
        other => Err(unexpected(op, "features", &other)),
    }
}

fn get(collection: &Datum, index: usize) -> EvalResult<Datum> {
    let len = collection
        .len()
        .ok_or_else(|| unexpected("get", "a collection", collection))?;
    if index >= len {
        return Err(ClientError::malformed(format!(
            "index {} out of range for collection of {}",
            index, len
        )));
    }
    Ok(match collection {
        Datum::Images(images) => Datum::Image(Arc::clone(&images[index])),
        Datum::List(items) => items[index].clone(),
        Datum::Features(features) => Datum::Dictionary(features[index].clone()),
        other => other.clone(),
    })
}

fn sequence(start: f64, end: f64, step: f64) -> EvalResult<Datum> {
    Ok(Datum::List(
        sequence_values(start, end, step)?
            .into_iter()
            .map(Datum::Number)
            .collect(),
    ))
}

fn advance(date: NaiveDate, amount: f64, unit: DateUnit) -> EvalResult<NaiveDate> {
    if amount.fract() != 0.0 {
        return Err(ClientError::malformed(format!(
            "date advance expects a whole amount, got {}",
            amount
        )));
    }
    let magnitude = amount.abs() as u64;
    let forward = amount >= 0.0;
    let moved = match unit {
        DateUnit::Day if forward => date.checked_add_days(Days::new(magnitude)),
        DateUnit::Day => date.checked_sub_days(Days::new(magnitude)),
        DateUnit::Year => magnitude
            .checked_mul(12)
            .and_then(|months| u32::try_from(months).ok())
            .and_then(|months| {
                if forward {
                    date.checked_add_months(Months::new(months))
                } else {
                    date.checked_sub_months(Months::new(months))
                }
            }),
    };
    moved.ok_or_else(|| ClientError::malformed("date advance out of range"))
}

fn check_scale(scale: f64) -> EvalResult<()> {
    if scale > 0.0 && scale.is_finite() {
        Ok(())
    } else {
        Err(ClientError::malformed(format!(
            "scale must be positive, got {}",
            scale
        )))
    }
}

fn select(image: &Image, names: &[String]) -> EvalResult<Image> {
    let bands = names
        .iter()
        .map(|name| {
            image
                .band(name)
                .cloned()
                .ok_or_else(|| ClientError::malformed(format!("Band '{}' not found", name)))
        })
        .collect::<EvalResult<Vec<_>>>()?;
    Ok(image.derive(bands, image.mask.clone()))
}

/// Pixelwise composite over the valid pixels of every image.
fn composite(images: &[Arc<Image>], reducer: Reducer) -> EvalResult<Image> {
    let Some(first) = images.first() else {
        return Ok(Image::new(Grid::empty()));
    };
    if images.iter().any(|i| i.grid != first.grid) {
        return Err(ClientError::malformed("composite expects matching grids"));
    }

    let n = first.grid.len();
    let mut bands = Vec::with_capacity(first.bands.len());
    let mut mask = vec![false; n];
    let mut stack = Vec::with_capacity(images.len());

    for band in &first.bands {
        let sources = images
            .iter()
            .map(|image| {
                image.band(&band.name).map(|b| (b, &image.mask)).ok_or_else(|| {
                    ClientError::malformed(format!("Band '{}' not found", band.name))
                })
            })
            .collect::<EvalResult<Vec<_>>>()?;

        let mut pixels = vec![0.0; n];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            stack.clear();
            stack.extend(
                sources
                    .iter()
                    .filter(|(_, mask)| mask[i])
                    .map(|(b, _)| b.pixels[i]),
            );
            if let Some(value) = reducer.apply(&stack) {
                *pixel = value;
                mask[i] = true;
            }
        }
        bands.push(Band {
            name: band.name.clone(),
            pixels,
        });
    }

    let mut out = Image::new(first.grid).with_mask(mask);
    out.bands = bands;
    Ok(out)
}

fn normalized_difference(image: &Image, first: &str, second: &str) -> EvalResult<Image> {
    let band = |name: &str| {
        image
            .band(name)
            .ok_or_else(|| ClientError::malformed(format!("Band '{}' not found", name)))
    };
    let (a, b) = (band(first)?, band(second)?);
    let mut mask = image.mask.clone();
    let pixels = a
        .pixels
        .iter()
        .zip(&b.pixels)
        .zip(mask.iter_mut())
        .map(|((a, b), valid)| {
            let total = a + b;
            if total == 0.0 {
                *valid = false;
                0.0
            } else {
                (a - b) / total
            }
        })
        .collect();
    Ok(image.derive(
        vec![Band {
            name: "nd".to_string(),
            pixels,
        }],
        mask,
    ))
}

fn map_pixels(image: &Image, f: impl Fn(f64) -> f64) -> Image {
    let bands = image
        .bands
        .iter()
        .map(|band| Band {
            name: band.name.clone(),
            pixels: band.pixels.iter().map(|v| f(*v)).collect(),
        })
        .collect();
    image.derive(bands, image.mask.clone())
}

/// Band-wise combination. A single-band operand is broadcast against every
/// band of the other; output band names come from the multi-band side.
fn zip_images(a: &Image, b: &Image, f: impl Fn(f64, f64) -> f64) -> EvalResult<Image> {
    if a.grid != b.grid {
        return Err(ClientError::malformed("cannot combine images on different grids"));
    }
    let pairs: Vec<(&Band, &Band, &str)> = match (a.bands.len(), b.bands.len()) {
        (_, 1) => a.bands.iter().map(|x| (x, &b.bands[0], x.name.as_str())).collect(),
        (1, _) => b.bands.iter().map(|y| (&a.bands[0], y, y.name.as_str())).collect(),
        (m, n) if m == n => a
            .bands
            .iter()
            .zip(&b.bands)
            .map(|(x, y)| (x, y, x.name.as_str()))
            .collect(),
        (m, n) => {
            return Err(ClientError::malformed(format!(
                "cannot combine images with {} and {} bands",
                m, n
            )))
        }
    };

    let bands = pairs
        .into_iter()
        .map(|(x, y, name)| Band {
            name: name.to_string(),
            pixels: x.pixels.iter().zip(&y.pixels).map(|(p, q)| f(*p, *q)).collect(),
        })
        .collect();
    let mask = a.mask.iter().zip(&b.mask).map(|(p, q)| *p && *q).collect();
    Ok(a.derive(bands, mask))
}

fn reduce_region(image: &Image, reducer: Reducer, region: Option<&Geometry>) -> ResultRecord {
    let pixels: Vec<usize> = (0..image.grid.len())
        .filter(|&i| image.mask[i])
        .filter(|&i| {
            region.map_or(true, |g| {
                let (lon, lat) = image.grid.pixel_center(i);
                g.contains(lon, lat)
            })
        })
        .collect();

    let mut values = Vec::with_capacity(pixels.len());
    let mut record = ResultRecord::new();
    for band in &image.bands {
        values.clear();
        values.extend(pixels.iter().map(|&i| band.pixels[i]));
        record = record.with_value(band.name.clone(), reducer.apply(&values));
    }
    record
}

/// Zero or one feature holding every band at the pixel under `point`.
fn sample(image: &Image, point: &Geometry) -> EvalResult<Option<ResultRecord>> {
    let Geometry::Point { lon, lat } = point else {
        return Err(ClientError::malformed("sample expects a point geometry"));
    };
    let Some(index) = image.grid.pixel_at(*lon, *lat) else {
        return Ok(None);
    };
    if !image.mask[index] {
        return Ok(None);
    }
    Ok(Some(image.bands.iter().fold(ResultRecord::new(), |record, band| {
        record.with_value(band.name.clone(), Some(band.pixels[index]))
    })))
}
