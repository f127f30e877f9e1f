//! Geometry model: decoding GeoJSON into `geo` types, bounding boxes, and the
//! centroid containment test used to refine spatial candidates.

use crate::error::{CensusError, Result};
use crate::types::BoundingBox;
use geo::{Buffer as _, Contains, Coord, CoordsIter, Geometry, LineString, MultiPolygon, Point, Polygon};
use geojson::Value;
use serde::{Serialize, Serializer};

/// Smallest valid ring: three distinct corners plus the closing coordinate.
const MIN_RING_LEN: usize = 4;

/// Decode a GeoJSON geometry into a polygonal `geo::Geometry`.
///
/// Accepts `Polygon`, `MultiPolygon` and `GeometryCollection` (whose members
/// must themselves be polygonal). Rings must be closed and hold at least four
/// positions; every position needs two finite values (extra ordinates are
/// ignored). Self-intersection is not checked.
///
/// # Examples
///
/// ```
/// use censusdb::compute::geometry::{bounding_box, decode_str};
///
/// let geom = decode_str(
///     r#"{"type":"Polygon","coordinates":[[[0,0],[2,0],[2,1],[0,1],[0,0]]]}"#,
/// )?;
/// let bbox = bounding_box(&geom)?;
/// assert_eq!((bbox.max_x, bbox.max_y), (2.0, 1.0));
/// # Ok::<(), censusdb::CensusError>(())
/// ```
pub fn decode(raw: &geojson::Geometry) -> Result<Geometry> {
    decode_value(&raw.value)
}

/// Parse a GeoJSON geometry document and [`decode`] it.
pub fn decode_str(raw: &str) -> Result<Geometry> {
    let geom: geojson::Geometry = serde_json::from_str(raw)?;
    decode(&geom)
}

fn decode_value(value: &Value) -> Result<Geometry> {
    match value {
        Value::Polygon(rings) => Ok(Geometry::Polygon(decode_polygon(rings)?)),
        Value::MultiPolygon(polygons) => {
            let polygons = polygons
                .iter()
                .map(|rings| decode_polygon(rings))
                .collect::<Result<Vec<_>>>()?;
            Ok(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
        }
        Value::GeometryCollection(members) => {
            let members = members
                .iter()
                .map(decode)
                .collect::<Result<Vec<_>>>()?;
            Ok(Geometry::GeometryCollection(geo::GeometryCollection(members)))
        }
        other => Err(CensusError::MalformedGeometry(format!(
            "unsupported geometry type: {}",
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn decode_polygon(rings: &[Vec<Vec<f64>>]) -> Result<Polygon> {
    let mut rings = rings.iter().enumerate().map(|(idx, ring)| decode_ring(idx, ring));
    let Some(exterior) = rings.next().transpose()? else {
        return Ok(Polygon::new(LineString::new(Vec::new()), Vec::new()));
    };
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn decode_ring(ring_idx: usize, positions: &[Vec<f64>]) -> Result<LineString> {
    if positions.len() < MIN_RING_LEN {
        return Err(CensusError::MalformedGeometry(format!(
            "ring {} has {} positions, need at least {}",
            ring_idx,
            positions.len(),
            MIN_RING_LEN
        )));
    }

    let coords = positions
        .iter()
        .enumerate()
        .map(|(idx, position)| match position.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
            [_, _, ..] => Err(CensusError::MalformedGeometry(format!(
                "ring {} position {} is not finite",
                ring_idx, idx
            ))),
            _ => Err(CensusError::MalformedGeometry(format!(
                "ring {} position {} has {} values, need 2",
                ring_idx,
                idx,
                position.len()
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    if coords.first() != coords.last() {
        return Err(CensusError::MalformedGeometry(format!(
            "ring {} is not closed",
            ring_idx
        )));
    }

    Ok(LineString::new(coords))
}

/// Encode a geometry as a GeoJSON geometry object.
pub fn encode(geometry: &Geometry) -> geojson::Geometry {
    geojson::Geometry::new(Value::from(geometry))
}

/// Encode a geometry as a GeoJSON string.
pub fn encode_string(geometry: &Geometry) -> Result<String> {
    Ok(serde_json::to_string(&encode(geometry))?)
}

pub(crate) fn serialize_geojson<S: Serializer>(
    geometry: &Geometry,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    encode(geometry).serialize(serializer)
}

/// Bounding box of every coordinate in `geometry`, holes and all parts
/// included, computed in one pass.
///
/// Fails with [`CensusError::EmptyGeometry`] when there are no coordinates
/// rather than returning a degenerate box.
pub fn bounding_box(geometry: &Geometry) -> Result<BoundingBox> {
    geometry
        .coords_iter()
        .fold(None, |acc: Option<BoundingBox>, c| {
            Some(match acc {
                None => BoundingBox::new(c.x, c.y, c.x, c.y),
                Some(b) => BoundingBox::new(
                    b.min_x.min(c.x),
                    b.min_y.min(c.y),
                    b.max_x.max(c.x),
                    b.max_y.max(c.y),
                ),
            })
        })
        .ok_or(CensusError::EmptyGeometry)
}

/// Whether `point` lies strictly inside `geometry`.
///
/// Holes are excluded and points on a boundary are outside. A collection
/// contains the point when any member does.
pub fn contains(geometry: &Geometry, point: &Point) -> bool {
    match geometry {
        Geometry::Polygon(polygon) => polygon.contains(point),
        Geometry::MultiPolygon(multi) => multi.0.iter().any(|p| p.contains(point)),
        Geometry::GeometryCollection(collection) => {
            collection.0.iter().any(|member| contains(member, point))
        }
        Geometry::Rect(rect) => rect.contains(point),
        Geometry::Triangle(triangle) => triangle.contains(point),
        _ => false,
    }
}

/// Expand `geometry` outward by `distance` coordinate units.
///
/// Every polygonal part is buffered together, so overlapping parts merge.
pub fn buffer(geometry: &Geometry, distance: f64) -> Result<Geometry> {
    crate::compute::validation::validate_buffer_distance(distance)?;

    let mut parts = Vec::new();
    collect_polygons(geometry, &mut parts);
    if parts.iter().all(|p| p.exterior().0.is_empty()) {
        return Err(CensusError::EmptyGeometry);
    }

    let buffered = MultiPolygon::new(parts).buffer(distance);
    log::debug!(
        "buffered geometry by {} degrees into {} polygon(s)",
        distance,
        buffered.0.len()
    );
    Ok(Geometry::MultiPolygon(buffered))
}

fn collect_polygons(geometry: &Geometry, out: &mut Vec<Polygon>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p.clone()),
        Geometry::MultiPolygon(mp) => out.extend(mp.0.iter().cloned()),
        Geometry::GeometryCollection(gc) => {
            for member in &gc.0 {
                collect_polygons(member, out);
            }
        }
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        _ => {}
    }
}
