//! Population folds and code hierarchy helpers.

use crate::category::Category;
use crate::types::{GeoRefPopRow, PopRow, UnitRow};
use std::collections::BTreeMap;

/// Anything that carries an optional population count.
pub trait HasPopulation {
    fn population(&self) -> Option<i64>;
}

impl HasPopulation for PopRow {
    fn population(&self) -> Option<i64> {
        self.population
    }
}

impl HasPopulation for GeoRefPopRow {
    fn population(&self) -> Option<i64> {
        self.population
    }
}

impl HasPopulation for UnitRow {
    fn population(&self) -> Option<i64> {
        self.population
    }
}

/// Sum of populations, treating missing values as zero.
///
/// # Examples
///
/// ```
/// use censusdb::compute::population::total;
/// use censusdb::PopRow;
///
/// let rows = vec![
///     PopRow { id: "06".into(), population: Some(10) },
///     PopRow { id: "36".into(), population: None },
/// ];
/// assert_eq!(total(&rows), 10);
/// ```
pub fn total<'a, R, I>(rows: I) -> i64
where
    R: HasPopulation + 'a,
    I: IntoIterator<Item = &'a R>,
{
    rows.into_iter()
        .map(|row| row.population().unwrap_or(0))
        .sum()
}

/// The code of `id`'s ancestor at `parent`, or `None` if `id` is shorter
/// than a code at that tier.
///
/// The caller is responsible for knowing which tier `id` belongs to.
pub fn parent_code(id: &str, parent: Category) -> Option<&str> {
    id.get(..parent.code_len())
}

/// Aggregate populations under their ancestor at `parent`.
///
/// Rows whose code is too short to have such an ancestor are skipped.
pub fn rollup<'a, R, I>(rows: I, parent: Category) -> BTreeMap<String, i64>
where
    R: HasPopulation + AsRef<str> + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let mut totals = BTreeMap::new();
    for row in rows {
        if let Some(code) = parent_code(row.as_ref(), parent) {
            *totals.entry(code.to_string()).or_insert(0) += row.population().unwrap_or(0);
        }
    }
    totals
}

impl AsRef<str> for PopRow {
    fn as_ref(&self) -> &str {
        &self.id
    }
}

impl AsRef<str> for GeoRefPopRow {
    fn as_ref(&self) -> &str {
        &self.id
    }
}

impl AsRef<str> for UnitRow {
    fn as_ref(&self) -> &str {
        &self.id
    }
}
