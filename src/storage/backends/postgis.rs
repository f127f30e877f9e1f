//! Native spatial backend over PostgreSQL with PostGIS.
//!
//! The database evaluates `ST_Intersects` itself, so its spatial answers
//! are final and the engine does not refine them.

use crate::category::Category;
use crate::compute::geometry;
use crate::compute::pattern::{CodePatterns, Dialect};
use crate::compute::validation::validate_pagination;
use crate::config::Config;
use crate::error::{CensusError, Result};
use crate::storage::pool::{ConnectionPool, Connector, PooledConnection};
use crate::storage::{
    BoundarySelection, SpatialCapability, SpatialQuery, StorageBackend, StorageStats,
    order_by_ids,
};
use crate::types::{BoundingBox, GeoRefPopRow, PopRow, UnitBoundary, UnitRow};
use postgres::types::FromSql;
use postgres::{Client, NoTls, Row};

const UNIT_COLUMNS: &str = "geo_id, clon::float8 AS clon, clat::float8 AS clat, \
     ST_XMin(geog) AS min_x, ST_YMin(geog) AS min_y, ST_XMax(geog) AS max_x, ST_YMax(geog) AS max_y, \
     ST_AsGeoJSON(geog) AS geometry, area::float8 AS area, housing::bigint AS housing, pop::bigint AS pop";

pub(crate) struct PostgresConnector {
    config: postgres::Config,
}

impl Connector for PostgresConnector {
    type Connection = Client;

    fn connect(&self) -> Result<Client> {
        self.config
            .connect(NoTls)
            .map_err(|e| CensusError::BackendUnavailable(e.to_string()))
    }

    fn is_broken(&self, conn: &mut Client) -> bool {
        conn.is_closed()
    }
}

/// PostGIS backend. Geometry predicates run in the database.
pub struct PostgisBackend {
    pool: ConnectionPool<PostgresConnector>,
    srid: i32,
}

impl PostgisBackend {
    /// Connect using a libpq-style connection string or URL.
    pub fn connect(url: &str, config: &Config) -> Result<Self> {
        let pg_config: postgres::Config = url
            .parse()
            .map_err(|e: postgres::Error| CensusError::Config(e.to_string()))?;
        let pool = ConnectionPool::open(PostgresConnector { config: pg_config }, &config.pool)?;

        log::info!(
            "connected to PostGIS (pool size {}, srid {})",
            config.pool.max_size,
            config.srid
        );

        Ok(Self {
            pool,
            srid: config.srid,
        })
    }

    fn connection(&self) -> Result<PooledConnection<'_, PostgresConnector>> {
        self.pool.get()
    }

    fn query_geometry(query: &SpatialQuery<'_>) -> Result<String> {
        geometry::encode_string(query.geometry)
    }
}

fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<T> {
    row.try_get(name)
        .map_err(|e| CensusError::InvalidRow(format!("column {}: {}", name, e)))
}

fn decode_stored(id: &str, text: &str) -> Result<geo::Geometry> {
    geometry::decode_str(text)
        .map_err(|e| CensusError::InvalidRow(format!("boundary of {}: {}", id, e)))
}

fn unit_row(row: &Row) -> Result<UnitRow> {
    let id: String = column(row, "geo_id")?;
    let text: String = column(row, "geometry")?;
    let boundary = decode_stored(&id, &text)?;
    Ok(UnitRow {
        lon: column(row, "clon")?,
        lat: column(row, "clat")?,
        bbox: BoundingBox::new(
            column(row, "min_x")?,
            column(row, "min_y")?,
            column(row, "max_x")?,
            column(row, "max_y")?,
        ),
        boundary,
        area: column(row, "area")?,
        housing_units: column(row, "housing")?,
        population: column(row, "pop")?,
        id,
    })
}

fn boundary_row(row: &Row) -> Result<UnitBoundary> {
    let id: String = column(row, "geo_id")?;
    let text: String = column(row, "geometry")?;
    let boundary = decode_stored(&id, &text)?;
    Ok(UnitBoundary { id, boundary })
}

impl StorageBackend for PostgisBackend {
    fn name(&self) -> &'static str {
        "postgis"
    }

    fn capability(&self) -> SpatialCapability {
        SpatialCapability::Native
    }

    fn ids(&self, category: Category, limit: usize, offset: usize) -> Result<Vec<String>> {
        let (limit, offset) = validate_pagination(limit, offset)?;
        let mut conn = self.connection()?;
        let sql = format!(
            "SELECT geo_id FROM {} ORDER BY geo_id ASC LIMIT $1 OFFSET $2",
            category.tables().table
        );
        let rows = conn.query(sql.as_str(), &[&limit, &offset])?;
        rows.iter().map(|row| column(row, "geo_id")).collect()
    }

    fn rows_matching(
        &self,
        category: Category,
        patterns: &CodePatterns,
        cap: usize,
        offset: usize,
    ) -> Result<Vec<UnitRow>> {
        let mut conn = self.connection()?;
        let table = category.tables().table;
        patterns.collect_capped(cap, offset, |pattern, limit, offset| {
            let (limit, offset) = validate_pagination(limit, offset)?;
            let predicate = pattern.predicate(Dialect::Postgres);
            let sql = format!(
                "SELECT {} FROM {} WHERE geo_id {} $1 ORDER BY geo_id LIMIT $2 OFFSET $3",
                UNIT_COLUMNS, table, predicate.operator
            );
            let rows = conn.query(sql.as_str(), &[&predicate.value, &limit, &offset])?;
            rows.iter().map(unit_row).collect()
        })
    }

    fn pop_matching(&self, category: Category, patterns: &CodePatterns) -> Result<Vec<PopRow>> {
        let mut conn = self.connection()?;
        let table = category.tables().table;
        patterns.collect_all(|pattern| {
            let predicate = pattern.predicate(Dialect::Postgres);
            let sql = format!(
                "SELECT geo_id, pop::bigint AS pop FROM {} WHERE geo_id {} $1 ORDER BY geo_id",
                table, predicate.operator
            );
            let rows = conn.query(sql.as_str(), &[&predicate.value])?;
            rows.iter()
                .map(|row| {
                    Ok(PopRow {
                        id: column(row, "geo_id")?,
                        population: column(row, "pop")?,
                    })
                })
                .collect()
        })
    }

    fn candidates(
        &self,
        category: Category,
        query: &SpatialQuery<'_>,
    ) -> Result<Vec<GeoRefPopRow>> {
        let text = Self::query_geometry(query)?;
        let mut conn = self.connection()?;
        let sql = format!(
            "SELECT geo_id, pop::bigint AS pop, clon::float8 AS clon, clat::float8 AS clat \
             FROM {} WHERE ST_Intersects(geog, ST_SetSRID(ST_GeomFromGeoJSON($1), $2)) \
             ORDER BY geo_id",
            category.tables().table
        );
        let rows = conn.query(sql.as_str(), &[&text, &self.srid])?;
        rows.iter()
            .map(|row| {
                Ok(GeoRefPopRow {
                    id: column(row, "geo_id")?,
                    population: column(row, "pop")?,
                    lon: column(row, "clon")?,
                    lat: column(row, "clat")?,
                })
            })
            .collect()
    }

    fn boundaries(
        &self,
        category: Category,
        selection: BoundarySelection<'_>,
    ) -> Result<Vec<UnitBoundary>> {
        let table = category.tables().table;
        match selection {
            BoundarySelection::Ids(ids) => {
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                let mut conn = self.connection()?;
                let sql = format!(
                    "SELECT geo_id, ST_AsGeoJSON(geog) AS geometry FROM {} WHERE geo_id = ANY($1)",
                    table
                );
                let rows = conn.query(sql.as_str(), &[&ids])?;
                let boundaries = rows.iter().map(boundary_row).collect::<Result<Vec<_>>>()?;
                Ok(order_by_ids(ids, boundaries))
            }
            BoundarySelection::Matching(query) => {
                let text = Self::query_geometry(&query)?;
                let mut conn = self.connection()?;
                let sql = format!(
                    "SELECT geo_id, ST_AsGeoJSON(geog) AS geometry FROM {} \
                     WHERE ST_Intersects(geog, ST_SetSRID(ST_GeomFromGeoJSON($1), $2)) \
                     ORDER BY geo_id",
                    table
                );
                let rows = conn.query(sql.as_str(), &[&text, &self.srid])?;
                rows.iter().map(boundary_row).collect()
            }
        }
    }

    fn stats(&self) -> StorageStats {
        let (connections, idle_connections) = self.pool.state();
        StorageStats {
            connections,
            idle_connections,
            indexed_units: 0,
        }
    }
}
