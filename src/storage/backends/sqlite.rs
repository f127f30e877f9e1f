//! Emulated spatial backend over a read-only SQLite file.
//!
//! SQLite has no geometry type here, so boundaries are stored as GeoJSON
//! text and spatial candidates come from the in-process bounding-box index
//! loaded out of the `v_*` artifacts when the backend opens.

use crate::category::{Category, CategoryMap};
use crate::compute::geometry;
use crate::compute::pattern::{CodePatterns, Dialect};
use crate::compute::validation::validate_pagination;
use crate::config::{BoxMatch, Config};
use crate::error::{CensusError, Result};
use crate::spatial_index::{BoxIndex, BoxIndexEntry, BoxIndexSet};
use crate::storage::pool::{ConnectionPool, Connector, PooledConnection};
use crate::storage::{
    BoundarySelection, SpatialCapability, SpatialQuery, StorageBackend, StorageStats,
    order_by_ids,
};
use crate::types::{BoundingBox, GeoRefPopRow, PopRow, UnitBoundary, UnitRow};
use rusqlite::{Connection, OpenFlags, Row, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Ids bound per `IN (...)` statement when fetching boundaries.
const ID_BATCH: usize = 500;

const UNIT_COLUMNS: &str = "geo_id, clon, clat, minX, minY, maxX, maxY, geometry, area, housing, pop";

pub(crate) struct SqliteConnector {
    path: PathBuf,
}

impl Connector for SqliteConnector {
    type Connection = Connection;

    fn connect(&self) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        Connection::open_with_flags(&self.path, flags).map_err(|e| {
            CensusError::BackendUnavailable(format!("{}: {}", self.path.display(), e))
        })
    }
}

/// Read-only SQLite backend with an in-process bounding-box index.
pub struct SqliteBackend {
    pool: ConnectionPool<SqliteConnector>,
    indexes: BoxIndexSet,
    box_match: BoxMatch,
}

impl SqliteBackend {
    /// Open the database at `path` and load every category's box index.
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let started = Instant::now();
        let pool = ConnectionPool::open(SqliteConnector { path: path.clone() }, &config.pool)?;

        let indexes = {
            let conn = pool.get()?;
            CategoryMap::try_from_fn(|category| load_index(&conn, category))?
        };
        let indexes = BoxIndexSet::new(indexes);

        log::info!(
            "opened {} with {} indexed units in {:?}",
            path.display(),
            indexes.total_entries(),
            started.elapsed()
        );

        Ok(Self {
            pool,
            indexes,
            box_match: config.box_match,
        })
    }

    pub(crate) fn connection(&self) -> Result<PooledConnection<'_, SqliteConnector>> {
        self.pool.get()
    }

    fn fetch_boundaries(&self, category: Category, ids: &[String]) -> Result<Vec<UnitBoundary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.connection()?;
        let table = category.tables().table;
        let mut rows = Vec::with_capacity(ids.len());

        for batch in ids.chunks(ID_BATCH) {
            let placeholders = vec!["?"; batch.len()].join(", ");
            let sql = format!(
                "SELECT geo_id, geometry FROM {} WHERE geo_id IN ({})",
                table, placeholders
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let raw = stmt
                .query_map(params_from_iter(batch.iter()), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for (id, text) in raw {
                let boundary = decode_stored(&id, &text)?;
                rows.push(UnitBoundary { id, boundary });
            }
        }

        Ok(order_by_ids(ids, rows))
    }
}

/// Load one category's index entries.
///
/// The `v_*` artifact decides which units are indexed, but boxes, centroids
/// and populations come from the primary table. An `rtree` artifact stores
/// coordinates as 32-bit floats rounded outward, which would push a unit's
/// box past a query equal to its own box.
fn load_index(conn: &Connection, category: Category) -> Result<BoxIndex> {
    let names = category.tables();
    let sql = format!(
        "SELECT t.geo_id, t.minX, t.minY, t.maxX, t.maxY, t.clon, t.clat, t.pop \
         FROM {index} AS i JOIN {table} AS t ON t.geo_id = i.geo_id",
        index = names.index,
        table = names.table
    );
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map([], |row| {
            Ok(BoxIndexEntry {
                id: row.get(0)?,
                bbox: BoundingBox::new(row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?),
                lon: row.get(5)?,
                lat: row.get(6)?,
                population: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    log::debug!("loaded {} {} index entries", entries.len(), category);
    Ok(BoxIndex::build(entries))
}

/// Typed columns of one attribute row, before the boundary is decoded.
struct RawUnit {
    id: String,
    lon: f64,
    lat: f64,
    bbox: BoundingBox,
    geometry: String,
    area: f64,
    housing: Option<i64>,
    pop: Option<i64>,
}

impl RawUnit {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            lon: row.get(1)?,
            lat: row.get(2)?,
            bbox: BoundingBox::new(row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?),
            geometry: row.get(7)?,
            area: row.get(8)?,
            housing: row.get(9)?,
            pop: row.get(10)?,
        })
    }

    fn decode(self) -> Result<UnitRow> {
        let boundary = decode_stored(&self.id, &self.geometry)?;
        Ok(UnitRow {
            id: self.id,
            lon: self.lon,
            lat: self.lat,
            bbox: self.bbox,
            boundary,
            area: self.area,
            housing_units: self.housing,
            population: self.pop,
        })
    }
}

/// Stored boundaries that fail to decode are a data problem, not bad input.
fn decode_stored(id: &str, text: &str) -> Result<geo::Geometry> {
    geometry::decode_str(text)
        .map_err(|e| CensusError::InvalidRow(format!("boundary of {}: {}", id, e)))
}

impl StorageBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn capability(&self) -> SpatialCapability {
        SpatialCapability::Emulated
    }

    fn ids(&self, category: Category, limit: usize, offset: usize) -> Result<Vec<String>> {
        let (limit, offset) = validate_pagination(limit, offset)?;
        let conn = self.connection()?;
        let sql = format!(
            "SELECT geo_id FROM {} ORDER BY geo_id ASC LIMIT ?1 OFFSET ?2",
            category.tables().table
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let ids = stmt
            .query_map(params![limit, offset], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    fn rows_matching(
        &self,
        category: Category,
        patterns: &CodePatterns,
        cap: usize,
        offset: usize,
    ) -> Result<Vec<UnitRow>> {
        let conn = self.connection()?;
        let table = category.tables().table;
        patterns.collect_capped(cap, offset, |pattern, limit, offset| {
            let (limit, offset) = validate_pagination(limit, offset)?;
            let predicate = pattern.predicate(Dialect::Sqlite);
            let sql = format!(
                "SELECT {} FROM {} WHERE geo_id {} ?1 ORDER BY geo_id LIMIT ?2 OFFSET ?3",
                UNIT_COLUMNS, table, predicate.operator
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let raw = stmt
                .query_map(params![predicate.value, limit, offset], RawUnit::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            raw.into_iter().map(RawUnit::decode).collect()
        })
    }

    fn pop_matching(&self, category: Category, patterns: &CodePatterns) -> Result<Vec<PopRow>> {
        let conn = self.connection()?;
        let table = category.tables().table;
        patterns.collect_all(|pattern| {
            let predicate = pattern.predicate(Dialect::Sqlite);
            let sql = format!(
                "SELECT geo_id, pop FROM {} WHERE geo_id {} ?1 ORDER BY geo_id",
                table, predicate.operator
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt
                .query_map(params![predicate.value], |row| {
                    Ok(PopRow {
                        id: row.get(0)?,
                        population: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn candidates(
        &self,
        category: Category,
        query: &SpatialQuery<'_>,
    ) -> Result<Vec<GeoRefPopRow>> {
        Ok(self
            .indexes
            .get(category)
            .range_query(&query.bbox, self.box_match))
    }

    fn boundaries(
        &self,
        category: Category,
        selection: BoundarySelection<'_>,
    ) -> Result<Vec<UnitBoundary>> {
        match selection {
            BoundarySelection::Ids(ids) => self.fetch_boundaries(category, ids),
            BoundarySelection::Matching(query) => {
                let ids: Vec<String> = self
                    .candidates(category, &query)?
                    .into_iter()
                    .map(|row| row.id)
                    .collect();
                self.fetch_boundaries(category, &ids)
            }
        }
    }

    fn stats(&self) -> StorageStats {
        let (connections, idle_connections) = self.pool.state();
        StorageStats {
            connections,
            idle_connections,
            indexed_units: self.indexes.total_entries(),
        }
    }
}
