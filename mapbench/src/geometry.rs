//! Geometries used to clip, filter and sample imagery.
//!
//! All coordinates are WGS84 longitude/latitude in degrees. Only the handful
//! of shapes the benchmark scenarios need are modelled: sample points,
//! axis-aligned rectangles and simple (non self-intersecting) polygons.

use serde::{Deserialize, Serialize};

/// A spatial region or location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    /// A single location.
    Point { lon: f64, lat: f64 },

    /// An axis-aligned bounding box.
    Rectangle {
        west: f64,
        south: f64,
        east: f64,
        north: f64,
    },

    /// A closed ring of `[lon, lat]` vertices. The closing vertex is implied.
    Polygon { ring: Vec<[f64; 2]> },
}

/// Bounding box as `(west, south, east, north)`.
pub type Bounds = (f64, f64, f64, f64);

impl Geometry {
    /// Creates a point geometry.
    pub fn point(lon: f64, lat: f64) -> Self {
        Geometry::Point { lon, lat }
    }

    /// Creates a rectangle from its corner coordinates.
    pub fn rectangle(west: f64, south: f64, east: f64, north: f64) -> Self {
        Geometry::Rectangle {
            west,
            south,
            east,
            north,
        }
    }

    /// Creates a polygon from its outer ring.
    pub fn polygon(ring: Vec<[f64; 2]>) -> Self {
        Geometry::Polygon { ring }
    }

    /// Returns the bounding box of the geometry.
    pub fn bounds(&self) -> Bounds {
        match self {
            Geometry::Point { lon, lat } => (*lon, *lat, *lon, *lat),
            Geometry::Rectangle {
                west,
                south,
                east,
                north,
            } => (*west, *south, *east, *north),
            Geometry::Polygon { ring } => ring.iter().fold(
                (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
                |(w, s, e, n), [lon, lat]| (w.min(*lon), s.min(*lat), e.max(*lon), n.max(*lat)),
            ),
        }
    }

    /// Returns true if the location lies inside (or on the edge of) this geometry.
    ///
    /// A point geometry only contains its own exact location.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        match self {
            Geometry::Point { lon: px, lat: py } => *px == lon && *py == lat,
            Geometry::Rectangle {
                west,
                south,
                east,
                north,
            } => lon >= *west && lon <= *east && lat >= *south && lat <= *north,
            Geometry::Polygon { ring } => polygon_contains(ring, lon, lat),
        }
    }

    /// Returns true if the bounding boxes of the two regions overlap.
    pub fn intersects_bounds(&self, other: Bounds) -> bool {
        let (w, s, e, n) = self.bounds();
        let (ow, os, oe, on) = other;
        w <= oe && e >= ow && s <= on && n >= os
    }
}

/// Even-odd ray casting test.
fn polygon_contains(ring: &[[f64; 2]], lon: f64, lat: f64) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Geometry {
        Geometry::polygon(vec![[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]])
    }

    #[test]
    fn test_rectangle_contains_edges() {
        let rect = Geometry::rectangle(-107.0, 38.8, -106.8, 39.0);
        assert!(rect.contains(-106.9, 38.9));
        assert!(rect.contains(-107.0, 38.8));
        assert!(!rect.contains(-106.7, 38.9));
    }

    #[test]
    fn test_polygon_contains() {
        let tri = triangle();
        assert!(tri.contains(1.0, 1.0));
        assert!(!tri.contains(3.0, 3.0));
        assert!(!tri.contains(-1.0, 1.0));
    }

    #[test]
    fn test_degenerate_polygon_contains_nothing() {
        let line = Geometry::polygon(vec![[0.0, 0.0], [1.0, 1.0]]);
        assert!(!line.contains(0.5, 0.5));
    }

    #[test]
    fn test_polygon_bounds() {
        assert_eq!(triangle().bounds(), (0.0, 0.0, 4.0, 4.0));
    }

    #[test]
    fn test_intersects_bounds() {
        let rect = Geometry::rectangle(0.0, 0.0, 1.0, 1.0);
        assert!(rect.intersects_bounds((0.5, 0.5, 2.0, 2.0)));
        assert!(!rect.intersects_bounds((1.5, 1.5, 2.0, 2.0)));
        assert!(Geometry::point(0.5, 0.5).intersects_bounds((0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&Geometry::point(1.0, 2.0)).unwrap();
        assert_eq!(json, r#"{"type":"point","lon":1.0,"lat":2.0}"#);
    }
}
