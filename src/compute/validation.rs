//! Validation for caller-supplied coordinates, boxes, buffers and paging.

use crate::error::{CensusError, Result};
use geo::Point;

/// Validates a 2D point has valid longitude and latitude.
///
/// Longitude: [-180.0, 180.0], Latitude: [-90.0, 90.0]
///
/// # Examples
///
/// ```
/// use censusdb::compute::validation::validate_geographic_point;
/// use geo::Point;
///
/// assert!(validate_geographic_point(&Point::new(-118.24, 34.05)).is_ok());
/// assert!(validate_geographic_point(&Point::new(200.0, 40.0)).is_err());
/// assert!(validate_geographic_point(&Point::new(-74.0, 95.0)).is_err());
/// ```
pub fn validate_geographic_point(point: &Point) -> Result<()> {
    let (x, y) = (point.x(), point.y());

    if !x.is_finite() {
        return Err(CensusError::InvalidInput(format!(
            "Longitude must be finite, got: {}",
            x
        )));
    }

    if !y.is_finite() {
        return Err(CensusError::InvalidInput(format!(
            "Latitude must be finite, got: {}",
            y
        )));
    }

    if !(-180.0..=180.0).contains(&x) {
        return Err(CensusError::InvalidInput(format!(
            "Longitude out of range [-180.0, 180.0]: {}",
            x
        )));
    }

    if !(-90.0..=90.0).contains(&y) {
        return Err(CensusError::InvalidInput(format!(
            "Latitude out of range [-90.0, 90.0]: {}",
            y
        )));
    }

    Ok(())
}

/// Validates a query bounding box.
///
/// Both corners must be valid geographic points and `min <= max` on each
/// axis. A zero-width box is allowed.
///
/// # Examples
///
/// ```
/// use censusdb::compute::validation::validate_bbox;
///
/// assert!(validate_bbox(-10.0, -10.0, 10.0, 10.0).is_ok());
/// assert!(validate_bbox(10.0, -10.0, -10.0, 10.0).is_err()); // min > max
/// ```
pub fn validate_bbox(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<()> {
    validate_geographic_point(&Point::new(min_lon, min_lat))?;
    validate_geographic_point(&Point::new(max_lon, max_lat))?;

    if min_lon > max_lon {
        return Err(CensusError::InvalidInput(format!(
            "min_lon ({}) must be <= max_lon ({})",
            min_lon, max_lon
        )));
    }
    if min_lat > max_lat {
        return Err(CensusError::InvalidInput(format!(
            "min_lat ({}) must be <= max_lat ({})",
            min_lat, max_lat
        )));
    }

    Ok(())
}

/// Validates a buffer distance expressed in degrees.
pub fn validate_buffer_distance(distance: f64) -> Result<()> {
    if !distance.is_finite() {
        return Err(CensusError::InvalidInput(format!(
            "Buffer distance must be finite, got: {}",
            distance
        )));
    }
    if distance <= 0.0 {
        return Err(CensusError::InvalidInput(format!(
            "Buffer distance must be positive, got: {}",
            distance
        )));
    }
    // Half the globe already covers every unit.
    if distance > 180.0 {
        return Err(CensusError::InvalidInput(format!(
            "Buffer distance {} degrees exceeds 180 degrees",
            distance
        )));
    }
    Ok(())
}

/// Converts paging arguments into the signed integers SQL drivers bind.
pub fn validate_pagination(limit: usize, offset: usize) -> Result<(i64, i64)> {
    let limit = i64::try_from(limit)
        .map_err(|_| CensusError::InvalidInput(format!("limit too large: {}", limit)))?;
    let offset = i64::try_from(offset)
        .map_err(|_| CensusError::InvalidInput(format!("offset too large: {}", offset)))?;
    Ok((limit, offset))
}
