//! Core query engine for censusdb.
//!
//! This module defines [`CensusDb`], which turns caller requests into
//! backend calls: it parses code patterns, decodes and buffers query
//! geometries, and refines spatial candidates when the backend cannot.

use crate::builder::DBBuilder;
use crate::category::Category;
use crate::compute::geometry;
use crate::compute::pattern::CodePatterns;
use crate::compute::population;
use crate::compute::validation::validate_bbox;
use crate::config::Config;
use crate::error::Result;
use crate::storage::{
    BoundarySelection, SpatialCapability, SpatialQuery, StorageBackend, StorageStats,
};
use crate::types::{BoundingBox, Buffer, GeoRefPopRow, PopRow, UnitBoundary, UnitRow};
use geo::Geometry;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Spatial and attribute queries over one census dataset.
///
/// `CensusDb` is cheap to clone and every clone shares the same backend, so
/// a single instance can serve many threads at once. Each operation borrows
/// at most one pooled connection and gives it back before returning.
///
/// # Examples
///
/// ```no_run
/// use censusdb::{Category, CensusDb};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let db = CensusDb::open_sqlite("census.sqlite")?;
///
/// // First page of county codes
/// let counties = db.get_ids(Category::County, Some(100), 0)?;
///
/// // Every tract in Los Angeles county plus one tract in Orange county
/// let rows = db.get_row_data(Category::Tract, "06037*, 06059001101", 0)?;
///
/// // People living in tracts whose centroid lies inside a polygon
/// let polygon: geojson::Geometry = serde_json::from_str(
///     r#"{"type":"Polygon","coordinates":
///         [[[-118.5,33.9],[-118.1,33.9],[-118.1,34.2],[-118.5,34.2],[-118.5,33.9]]]}"#,
/// )?;
/// let people = db.get_pop_total_by_geometry(Category::Tract, &polygon, None)?;
/// # let _ = (counties, rows, people);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CensusDb {
    inner: Arc<DbInner>,
}

struct DbInner {
    backend: Box<dyn StorageBackend>,
    config: Config,
}

impl std::fmt::Debug for CensusDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CensusDb")
            .field("backend", &self.inner.backend.name())
            .field("capability", &self.capability())
            .finish()
    }
}

impl CensusDb {
    /// Wrap an already opened backend.
    pub fn new(backend: impl StorageBackend + 'static, config: Config) -> Self {
        Self::from_boxed(Box::new(backend), config)
    }

    pub(crate) fn from_boxed(backend: Box<dyn StorageBackend>, config: Config) -> Self {
        log::info!(
            "census engine ready on {} backend ({:?})",
            backend.name(),
            backend.capability()
        );
        Self {
            inner: Arc::new(DbInner { backend, config }),
        }
    }

    /// Open a SQLite dataset with the default configuration.
    pub fn open_sqlite(path: impl AsRef<Path>) -> Result<Self> {
        DBBuilder::new().sqlite(path.as_ref()).build()
    }

    pub fn builder() -> DBBuilder {
        DBBuilder::new()
    }

    pub fn capability(&self) -> SpatialCapability {
        self.inner.backend.capability()
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn stats(&self) -> StorageStats {
        self.inner.backend.stats()
    }

    fn backend(&self) -> &dyn StorageBackend {
        self.inner.backend.as_ref()
    }

    /// Codes of `category` in ascending order.
    ///
    /// `limit` falls back to [`Config::default_id_limit`].
    pub fn get_ids(
        &self,
        category: Category,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<String>> {
        let limit = limit.unwrap_or(self.inner.config.default_id_limit);
        let ids = self.backend().ids(category, limit, offset)?;
        log::debug!(
            "get_ids {} limit={} offset={} -> {}",
            category,
            limit,
            offset,
            ids.len()
        );
        Ok(ids)
    }

    /// Full attribute rows for a comma separated pattern list.
    ///
    /// Results are concatenated in pattern order and capped at
    /// [`Config::row_limit`] rows in total. `offset` applies to the first
    /// pattern only. A unit matched by two patterns is returned twice.
    pub fn get_row_data(
        &self,
        category: Category,
        patterns: &str,
        offset: usize,
    ) -> Result<Vec<UnitRow>> {
        let patterns = CodePatterns::parse(patterns)?;
        let rows = self.backend().rows_matching(
            category,
            &patterns,
            self.inner.config.row_limit,
            offset,
        )?;
        log::debug!(
            "get_row_data {} {} pattern(s) offset={} -> {}",
            category,
            patterns.len(),
            offset,
            rows.len()
        );
        Ok(rows)
    }

    /// Populations for a comma separated pattern list, uncapped.
    pub fn get_pop_data(&self, category: Category, patterns: &str) -> Result<Vec<PopRow>> {
        let patterns = CodePatterns::parse(patterns)?;
        let rows = self.backend().pop_matching(category, &patterns)?;
        log::debug!(
            "get_pop_data {} {} pattern(s) -> {}",
            category,
            patterns.len(),
            rows.len()
        );
        Ok(rows)
    }

    /// Units selected by a query geometry, with population and centroid.
    ///
    /// On an emulated backend a unit is selected when its box passes the
    /// configured [`BoxMatch`](crate::config::BoxMatch) rule, its centroid
    /// lies inside the (buffered) query geometry and its population is
    /// non-zero. A native backend selects units whose boundary intersects
    /// the query, and its answer is used as is.
    pub fn get_row_by_geometry(
        &self,
        category: Category,
        geometry: &geojson::Geometry,
        buffer: Option<Buffer>,
    ) -> Result<Vec<GeoRefPopRow>> {
        let query_geometry = prepare_geometry(geometry, buffer)?;
        self.select(category, &query_geometry)
    }

    /// Full boundaries of the units [`get_row_by_geometry`] would select.
    ///
    /// [`get_row_by_geometry`]: CensusDb::get_row_by_geometry
    pub fn get_intersected_geometries(
        &self,
        category: Category,
        geometry: &geojson::Geometry,
        buffer: Option<Buffer>,
    ) -> Result<Vec<UnitBoundary>> {
        let started = Instant::now();
        let query_geometry = prepare_geometry(geometry, buffer)?;
        let query = SpatialQuery {
            geometry: &query_geometry,
            bbox: geometry::bounding_box(&query_geometry)?,
        };

        let boundaries = match self.capability() {
            SpatialCapability::Native => self
                .backend()
                .boundaries(category, BoundarySelection::Matching(query))?,
            SpatialCapability::Emulated => {
                let ids: Vec<String> = self
                    .refined_candidates(category, &query)?
                    .into_iter()
                    .map(|row| row.id)
                    .collect();
                self.backend()
                    .boundaries(category, BoundarySelection::Ids(&ids))?
            }
        };

        log::debug!(
            "get_intersected_geometries {} -> {} in {:?}",
            category,
            boundaries.len(),
            started.elapsed()
        );
        Ok(boundaries)
    }

    /// Total population of the units [`get_row_by_geometry`] would select.
    ///
    /// [`get_row_by_geometry`]: CensusDb::get_row_by_geometry
    pub fn get_pop_total_by_geometry(
        &self,
        category: Category,
        geometry: &geojson::Geometry,
        buffer: Option<Buffer>,
    ) -> Result<i64> {
        let rows = self.get_row_by_geometry(category, geometry, buffer)?;
        Ok(population::total(&rows))
    }

    /// Units selected by an axis-aligned box, treated as a query polygon.
    pub fn get_row_by_bbox(
        &self,
        category: Category,
        bbox: BoundingBox,
    ) -> Result<Vec<GeoRefPopRow>> {
        validate_bbox(bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y)?;
        self.select(category, &Geometry::Polygon(bbox.to_polygon()))
    }

    pub fn get_pop_total_by_bbox(&self, category: Category, bbox: BoundingBox) -> Result<i64> {
        let rows = self.get_row_by_bbox(category, bbox)?;
        Ok(population::total(&rows))
    }

    fn select(&self, category: Category, query_geometry: &Geometry) -> Result<Vec<GeoRefPopRow>> {
        let started = Instant::now();
        let query = SpatialQuery {
            geometry: query_geometry,
            bbox: geometry::bounding_box(query_geometry)?,
        };

        let rows = match self.capability() {
            SpatialCapability::Native => self.backend().candidates(category, &query)?,
            SpatialCapability::Emulated => self.refined_candidates(category, &query)?,
        };

        log::debug!(
            "spatial select {} -> {} in {:?}",
            category,
            rows.len(),
            started.elapsed()
        );
        Ok(rows)
    }

    /// Box candidates whose centroid lies inside the query geometry.
    fn refined_candidates(
        &self,
        category: Category,
        query: &SpatialQuery<'_>,
    ) -> Result<Vec<GeoRefPopRow>> {
        let mut rows = self.backend().candidates(category, query)?;
        let candidates = rows.len();
        rows.retain(|row| geometry::contains(query.geometry, &row.centroid()));
        log::debug!(
            "{} box candidates, {} after centroid refinement",
            candidates,
            rows.len()
        );
        Ok(rows)
    }
}

/// Decode the caller's geometry and apply the optional buffer.
fn prepare_geometry(raw: &geojson::Geometry, buffer: Option<Buffer>) -> Result<Geometry> {
    let decoded = geometry::decode(raw)?;
    // Rejects geometries without coordinates before any buffering.
    geometry::bounding_box(&decoded)?;
    match buffer {
        Some(buffer) => geometry::buffer(&decoded, buffer.degrees()),
        None => Ok(decoded),
    }
}
