//! Value types shared by the engine and both backends.

use crate::compute::geometry;
use crate::error::{CensusError, Result};
use geo::{Coord, Geometry, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in lon/lat degrees.
///
/// Unlike `geo::Rect`, construction never reorders corners; use
/// [`BoundingBox::try_new`] when the corners come from a caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create a box, rejecting non-finite or inverted corners.
    ///
    /// # Examples
    ///
    /// ```
    /// use censusdb::BoundingBox;
    ///
    /// assert!(BoundingBox::try_new(-75.0, 39.0, -74.0, 40.0).is_ok());
    /// assert!(BoundingBox::try_new(-74.0, 39.0, -75.0, 40.0).is_err());
    /// ```
    pub fn try_new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        crate::compute::validation::validate_bbox(min_x, min_y, max_x, max_y)?;
        Ok(Self::new(min_x, min_y, max_x, max_y))
    }

    pub fn min(&self) -> Coord {
        Coord {
            x: self.min_x,
            y: self.min_y,
        }
    }

    pub fn max(&self) -> Coord {
        Coord {
            x: self.max_x,
            y: self.max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when `other` lies entirely inside this box, edges included.
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.min_x >= self.min_x
            && other.min_y >= self.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    /// True when the boxes share at least one point, edges included.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(self.min(), self.max())
    }

    /// The box as a closed, counter-clockwise polygon.
    pub fn to_polygon(&self) -> Polygon {
        self.to_rect().to_polygon()
    }
}

impl From<Rect> for BoundingBox {
    fn from(rect: Rect) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// Full attribute row for one geographic unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitRow {
    pub id: String,
    pub lon: f64,
    pub lat: f64,
    pub bbox: BoundingBox,
    #[serde(serialize_with = "geometry::serialize_geojson")]
    pub boundary: Geometry,
    pub area: f64,
    /// Only populated for blocks.
    pub housing_units: Option<i64>,
    pub population: Option<i64>,
}

impl UnitRow {
    pub fn centroid(&self) -> Point {
        Point::new(self.lon, self.lat)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopRow {
    pub id: String,
    pub population: Option<i64>,
}

/// A unit's population together with its representative point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRefPopRow {
    pub id: String,
    pub population: Option<i64>,
    pub lon: f64,
    pub lat: f64,
}

impl GeoRefPopRow {
    pub fn centroid(&self) -> Point {
        Point::new(self.lon, self.lat)
    }
}

/// A unit's full boundary, returned for visualisation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitBoundary {
    pub id: String,
    #[serde(serialize_with = "geometry::serialize_geojson")]
    pub boundary: Geometry,
}

/// Distance units accepted for query buffering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    Meters,
    Kilometers,
    Miles,
    Feet,
    Degrees,
}

/// Metres covered by one degree of latitude.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

impl DistanceUnit {
    /// Convert `value` in this unit to degrees.
    pub fn to_degrees(self, value: f64) -> f64 {
        let meters = match self {
            DistanceUnit::Degrees => return value,
            DistanceUnit::Meters => value,
            DistanceUnit::Kilometers => value * 1_000.0,
            DistanceUnit::Miles => value * 1_609.344,
            DistanceUnit::Feet => value * 0.3048,
        };
        meters / METERS_PER_DEGREE
    }
}

impl std::str::FromStr for DistanceUnit {
    type Err = CensusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "meter" | "meters" | "metre" | "metres" => Ok(DistanceUnit::Meters),
            "km" | "kilometer" | "kilometers" | "kilometre" | "kilometres" => {
                Ok(DistanceUnit::Kilometers)
            }
            "mi" | "mile" | "miles" => Ok(DistanceUnit::Miles),
            "ft" | "foot" | "feet" => Ok(DistanceUnit::Feet),
            "deg" | "degree" | "degrees" => Ok(DistanceUnit::Degrees),
            other => Err(CensusError::InvalidInput(format!(
                "unknown distance unit: {}",
                other
            ))),
        }
    }
}

/// Outward expansion applied to a query geometry before it is used.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Buffer {
    pub distance: f64,
    pub unit: DistanceUnit,
}

impl Buffer {
    pub fn new(distance: f64, unit: DistanceUnit) -> Self {
        Self { distance, unit }
    }

    /// The buffer distance in the coordinate units of the data (degrees).
    pub fn degrees(&self) -> f64 {
        self.unit.to_degrees(self.distance)
    }
}
