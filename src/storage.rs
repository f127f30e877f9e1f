//! Storage backend abstraction for censusdb
//!
//! A backend owns a connection pool to one persisted census dataset and
//! answers the low-level questions the engine asks of it. Whether the
//! backend can evaluate geometry predicates itself is reported through
//! [`SpatialCapability`]; the engine decides from that alone whether
//! candidates still need refining.

use crate::category::Category;
use crate::compute::pattern::CodePatterns;
use crate::error::Result;
use crate::types::{BoundingBox, GeoRefPopRow, PopRow, UnitBoundary, UnitRow};
use geo::Geometry;

pub mod backends;
pub(crate) mod pool;

/// How much of the spatial work a backend does on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialCapability {
    /// The backend evaluates true geometry intersection itself. Its
    /// results are final.
    Native,
    /// The backend only narrows candidates by bounding box. Results must
    /// be refined by the engine.
    Emulated,
}

/// A decoded (and possibly buffered) query geometry with its bounding box.
#[derive(Debug, Clone, Copy)]
pub struct SpatialQuery<'a> {
    pub geometry: &'a Geometry,
    pub bbox: BoundingBox,
}

/// Which boundaries to fetch.
#[derive(Debug, Clone, Copy)]
pub enum BoundarySelection<'a> {
    /// Exactly these ids, returned in the given order. Unknown ids are
    /// skipped.
    Ids(&'a [String]),
    /// Every unit the backend itself considers a match for the query.
    Matching(SpatialQuery<'a>),
}

/// Trait for storage backend implementations
///
/// Every method that touches the database acquires one pooled connection
/// and releases it before returning, on success and on failure alike.
/// Implementations must be shareable between threads.
pub trait StorageBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn capability(&self) -> SpatialCapability;

    /// Codes of one category in ascending order.
    fn ids(&self, category: Category, limit: usize, offset: usize) -> Result<Vec<String>>;

    /// Full rows matching each pattern in turn, ordered by code within a
    /// pattern, following [`CodePatterns::collect_capped`] for `cap` and
    /// `offset`.
    fn rows_matching(
        &self,
        category: Category,
        patterns: &CodePatterns,
        cap: usize,
        offset: usize,
    ) -> Result<Vec<UnitRow>>;

    /// Populations of every unit matching each pattern in turn.
    fn pop_matching(&self, category: Category, patterns: &CodePatterns) -> Result<Vec<PopRow>>;

    /// Units relevant to a spatial query, ordered by code.
    ///
    /// A [`SpatialCapability::Native`] backend returns exactly the units
    /// whose geometry intersects the query. An emulated backend returns
    /// bounding-box candidates.
    fn candidates(&self, category: Category, query: &SpatialQuery<'_>)
    -> Result<Vec<GeoRefPopRow>>;

    fn boundaries(
        &self,
        category: Category,
        selection: BoundarySelection<'_>,
    ) -> Result<Vec<UnitBoundary>>;

    fn stats(&self) -> StorageStats;
}

/// Storage backend statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Connections currently open in the pool.
    pub connections: u32,
    /// Open connections not checked out by a query.
    pub idle_connections: u32,
    /// Units held in the in-process bounding-box index. Always zero for
    /// native backends.
    pub indexed_units: usize,
}

/// Restore the caller's id order after an unordered batch fetch.
pub(crate) fn order_by_ids(ids: &[String], rows: Vec<UnitBoundary>) -> Vec<UnitBoundary> {
    let mut by_id: rustc_hash::FxHashMap<String, UnitBoundary> = rows
        .into_iter()
        .map(|row| (row.id.clone(), row))
        .collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn boundary(id: &str) -> UnitBoundary {
        UnitBoundary {
            id: id.to_string(),
            boundary: Geometry::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]),
        }
    }

    #[test]
    fn test_order_by_ids() {
        let ids = vec!["c".to_string(), "a".to_string(), "missing".to_string(), "b".to_string()];
        let rows = vec![boundary("a"), boundary("b"), boundary("c")];
        let ordered: Vec<String> = order_by_ids(&ids, rows).into_iter().map(|b| b.id).collect();
        assert_eq!(ordered, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_order_by_ids_collapses_repeats() {
        let ids = vec!["a".to_string(), "a".to_string()];
        let ordered = order_by_ids(&ids, vec![boundary("a")]);
        assert_eq!(ordered.len(), 1);
    }
}
