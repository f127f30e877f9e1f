//! Category registry: the closed set of geographic tiers and where each one
//! lives in storage.

use crate::error::CensusError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// One tier of the census hierarchy, ordered from coarsest to finest.
///
/// `Category::State < Category::Block`; comparison follows the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    State,
    County,
    Tract,
    BlockGroup,
    Block,
}

/// Storage identifiers for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableNames {
    /// Primary attribute table.
    pub table: &'static str,
    /// Auxiliary bounding-box artifact read by the emulated backend.
    pub index: &'static str,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::State,
        Category::County,
        Category::Tract,
        Category::BlockGroup,
        Category::Block,
    ];

    /// Storage identifiers for this category. Total over the enum.
    pub const fn tables(self) -> TableNames {
        match self {
            Category::State => TableNames {
                table: "states",
                index: "v_states",
            },
            Category::County => TableNames {
                table: "counties",
                index: "v_counties",
            },
            Category::Tract => TableNames {
                table: "tracts",
                index: "v_tracts",
            },
            Category::BlockGroup => TableNames {
                table: "block_groups",
                index: "v_block_groups",
            },
            Category::Block => TableNames {
                table: "blocks",
                index: "v_blocks",
            },
        }
    }

    /// Length of a full hierarchical code at this tier (2/5/11/12/15).
    pub const fn code_len(self) -> usize {
        match self {
            Category::State => 2,
            Category::County => 5,
            Category::Tract => 11,
            Category::BlockGroup => 12,
            Category::Block => 15,
        }
    }

    /// Next coarser tier, if any.
    pub const fn parent(self) -> Option<Category> {
        match self {
            Category::State => None,
            Category::County => Some(Category::State),
            Category::Tract => Some(Category::County),
            Category::BlockGroup => Some(Category::Tract),
            Category::Block => Some(Category::BlockGroup),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Category::State => "state",
            Category::County => "county",
            Category::Tract => "tract",
            Category::BlockGroup => "block_group",
            Category::Block => "block",
        }
    }

    const fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CensusError;

    /// Accepts the singular names used by the request layer as well as the
    /// table names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "state" | "states" => Ok(Category::State),
            "county" | "counties" => Ok(Category::County),
            "tract" | "tracts" => Ok(Category::Tract),
            "block_group" | "block_groups" | "block-group" | "blockgroup" => {
                Ok(Category::BlockGroup)
            }
            "block" | "blocks" => Ok(Category::Block),
            _ => Err(CensusError::UnknownCategory(s.to_string())),
        }
    }
}

/// Fixed-size table keyed by [`Category`].
#[derive(Debug, Clone, Default)]
pub struct CategoryMap<T>([T; 5]);

impl<T> CategoryMap<T> {
    /// Build a map by evaluating `f` once per category.
    pub fn from_fn(mut f: impl FnMut(Category) -> T) -> Self {
        CategoryMap(Category::ALL.map(&mut f))
    }

    /// Fallible variant of [`CategoryMap::from_fn`]; stops at the first error.
    pub fn try_from_fn<E>(mut f: impl FnMut(Category) -> Result<T, E>) -> Result<Self, E> {
        let [a, b, c, d, e] = Category::ALL;
        Ok(CategoryMap([f(a)?, f(b)?, f(c)?, f(d)?, f(e)?]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &T)> {
        Category::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T> Index<Category> for CategoryMap<T> {
    type Output = T;

    fn index(&self, category: Category) -> &T {
        &self.0[category.slot()]
    }
}

impl<T> IndexMut<Category> for CategoryMap<T> {
    fn index_mut(&mut self, category: Category) -> &mut T {
        &mut self.0[category.slot()]
    }
}
