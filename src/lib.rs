//! Spatial and attribute queries over a hierarchy of census geographies.
//!
//! ```no_run
//! use censusdb::{BoundingBox, Category, CensusDb};
//!
//! let db = CensusDb::open_sqlite("census.sqlite")?;
//!
//! let tracts = db.get_pop_data(Category::Tract, "0610*")?;
//! let people = db.get_pop_total_by_bbox(
//!     Category::Tract,
//!     BoundingBox::try_new(-124.4, 32.5, -114.1, 42.0)?,
//! )?;
//! # let _ = (tracts, people);
//! # Ok::<(), censusdb::CensusError>(())
//! ```

pub mod builder;
pub mod category;
pub mod compute;
pub mod config;
pub mod db;
pub mod error;
pub mod spatial_index;
pub mod storage;
pub mod types;

pub use builder::DBBuilder;
pub use category::{Category, CategoryMap, TableNames};
pub use config::{BoxMatch, Config, PoolConfig};
pub use db::CensusDb;
pub use error::{CensusError, ErrorKind, Result};

pub use geo::{Geometry, Point, Polygon};

pub use compute::pattern::{CodePattern, CodePatterns};
pub use compute::population::{parent_code, rollup, total};

pub use types::{
    BoundingBox, Buffer, DistanceUnit, GeoRefPopRow, PopRow, UnitBoundary, UnitRow,
};

pub use storage::backends::SqliteBackend;
#[cfg(feature = "postgres")]
pub use storage::backends::PostgisBackend;
pub use storage::{SpatialCapability, StorageBackend, StorageStats};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{CensusDb, CensusError, DBBuilder, Result};

    pub use crate::{BoundingBox, Buffer, Category, DistanceUnit};

    pub use crate::{BoxMatch, Config};

    pub use crate::{SpatialCapability, StorageBackend};

    pub use geo::{Geometry, Point, Polygon};

    pub use std::time::Duration;
}
