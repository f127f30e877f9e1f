//! Storage backend implementations.
//!
//! This module provides the backends censusdb can open:
//! - `SqliteBackend`: read-only SQLite file with an in-process bounding-box index
//! - `PostgisBackend`: PostgreSQL with PostGIS geometry (requires `postgres` feature)

#[cfg(feature = "postgres")]
mod postgis;
mod sqlite;

#[cfg(feature = "postgres")]
pub use postgis::PostgisBackend;
pub use sqlite::SqliteBackend;
