//! Bounding-box index for backends without native spatial support.
//!
//! One R*-tree per category holds every unit's box together with its
//! centroid and population. The trees are bulk-loaded once when the backend
//! opens and are never mutated afterwards, so they are shared between
//! concurrent queries without locking.

use crate::category::{Category, CategoryMap};
use crate::config::BoxMatch;
use crate::types::{BoundingBox, GeoRefPopRow};
use rstar::{AABB, RTree, RTreeObject};
use std::fmt;

/// One unit's entry in the bounding-box index.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxIndexEntry {
    pub id: String,
    pub bbox: BoundingBox,
    pub lon: f64,
    pub lat: f64,
    pub population: Option<i64>,
}

impl BoxIndexEntry {
    /// Entries without people are left out of range results.
    fn is_populated(&self) -> bool {
        self.population.unwrap_or(0) != 0
    }

    fn to_row(&self) -> GeoRefPopRow {
        GeoRefPopRow {
            id: self.id.clone(),
            population: self.population,
            lon: self.lon,
            lat: self.lat,
        }
    }
}

impl RTreeObject for BoxIndexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        envelope(&self.bbox)
    }
}

fn envelope(bbox: &BoundingBox) -> AABB<[f64; 2]> {
    AABB::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y])
}

/// Immutable R*-tree over one category's unit boxes.
#[derive(Default)]
pub struct BoxIndex {
    tree: RTree<BoxIndexEntry>,
}

impl fmt::Debug for BoxIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxIndex").field("len", &self.len()).finish()
    }
}

impl BoxIndex {
    /// Bulk-load an index from its entries.
    pub fn build(entries: Vec<BoxIndexEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Populated entries whose box satisfies `rule` against `query`, sorted by id.
    ///
    /// With [`BoxMatch::Contained`] an entry qualifies only when
    /// `entry.min >= query.min` and `entry.max <= query.max` on both axes,
    /// so units straddling the query edge are not returned.
    pub fn range_query(&self, query: &BoundingBox, rule: BoxMatch) -> Vec<GeoRefPopRow> {
        let envelope = envelope(query);
        let mut rows: Vec<GeoRefPopRow> = match rule {
            BoxMatch::Contained => self
                .tree
                .locate_in_envelope(&envelope)
                .filter(|e| e.is_populated())
                .map(BoxIndexEntry::to_row)
                .collect(),
            BoxMatch::Intersecting => self
                .tree
                .locate_in_envelope_intersecting(&envelope)
                .filter(|e| e.is_populated())
                .map(BoxIndexEntry::to_row)
                .collect(),
        };
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows
    }
}

/// The per-category indexes of one emulated backend.
#[derive(Debug, Default)]
pub struct BoxIndexSet {
    indexes: CategoryMap<BoxIndex>,
}

impl BoxIndexSet {
    pub fn new(indexes: CategoryMap<BoxIndex>) -> Self {
        Self { indexes }
    }

    pub fn get(&self, category: Category) -> &BoxIndex {
        &self.indexes[category]
    }

    pub fn total_entries(&self) -> usize {
        self.indexes.iter().map(|(_, idx)| idx.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, bbox: BoundingBox, population: Option<i64>) -> BoxIndexEntry {
        BoxIndexEntry {
            id: id.to_string(),
            lon: (bbox.min_x + bbox.max_x) / 2.0,
            lat: (bbox.min_y + bbox.max_y) / 2.0,
            bbox,
            population,
        }
    }

    fn sample() -> BoxIndex {
        BoxIndex::build(vec![
            entry("b", BoundingBox::new(1.0, 1.0, 2.0, 2.0), Some(10)),
            entry("a", BoundingBox::new(0.0, 0.0, 1.0, 1.0), Some(5)),
            entry("straddle", BoundingBox::new(2.5, 2.5, 4.0, 4.0), Some(7)),
            entry("empty", BoundingBox::new(0.2, 0.2, 0.4, 0.4), Some(0)),
            entry("unknown", BoundingBox::new(0.5, 0.5, 0.6, 0.6), None),
            entry("far", BoundingBox::new(50.0, 50.0, 51.0, 51.0), Some(1)),
        ])
    }

    fn ids(rows: &[GeoRefPopRow]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_contained_rule_excludes_straddling_boxes() {
        let index = sample();
        let rows = index.range_query(&BoundingBox::new(0.0, 0.0, 3.0, 3.0), BoxMatch::Contained);
        assert_eq!(ids(&rows), vec!["a", "b"]);
    }

    #[test]
    fn test_intersecting_rule_includes_straddling_boxes() {
        let index = sample();
        let rows =
            index.range_query(&BoundingBox::new(0.0, 0.0, 3.0, 3.0), BoxMatch::Intersecting);
        assert_eq!(ids(&rows), vec!["a", "b", "straddle"]);
    }

    #[test]
    fn test_exact_box_is_contained() {
        let index = sample();
        let rows = index.range_query(&BoundingBox::new(1.0, 1.0, 2.0, 2.0), BoxMatch::Contained);
        assert_eq!(ids(&rows), vec!["b"]);
    }

    #[test]
    fn test_unpopulated_entries_are_skipped() {
        let index = sample();
        let rows = index.range_query(&BoundingBox::new(-1.0, -1.0, 1.0, 1.0), BoxMatch::Contained);
        assert_eq!(ids(&rows), vec!["a"]);
        assert_eq!(index.len(), 6);
    }

    #[test]
    fn test_disjoint_query() {
        let index = sample();
        let rows =
            index.range_query(&BoundingBox::new(10.0, 10.0, 20.0, 20.0), BoxMatch::Intersecting);
        assert!(rows.is_empty());
        assert!(BoxIndex::default().is_empty());
    }

    #[test]
    fn test_index_set() {
        let mut map: CategoryMap<BoxIndex> = CategoryMap::default();
        map[Category::Tract] = sample();
        let set = BoxIndexSet::new(map);
        assert_eq!(set.get(Category::Tract).len(), 6);
        assert!(set.get(Category::State).is_empty());
        assert_eq!(set.total_entries(), 6);
    }
}
