#![allow(dead_code)]

//! Shared SQLite fixtures for the integration tests.
//!
//! The standard dataset has 3 states, 10 counties and 50 tracts laid out on
//! a grid, plus a couple of block groups and blocks under the first tract.
//! Every unit is an axis-aligned rectangle whose centroid is its centre.
//! Tract populations are fixed, a few tracts are empty or unknown, and
//! coarser populations are rolled up from the tracts.

use censusdb::{BoundingBox, Category, CensusDb, Config, PopRow, rollup};
use rusqlite::{Connection, params};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// One unit as written to the fixture database.
#[derive(Debug, Clone)]
pub struct FixtureUnit {
    pub category: Category,
    pub id: String,
    pub bbox: BoundingBox,
    pub population: Option<i64>,
    pub housing: Option<i64>,
    /// GeoJSON text stored in the `geometry` column.
    pub geometry: String,
}

impl FixtureUnit {
    pub fn rect(category: Category, id: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            category,
            id: id.into(),
            geometry: rect_geojson(&bbox),
            bbox,
            population: None,
            housing: None,
        }
    }

    pub fn with_population(mut self, population: Option<i64>) -> Self {
        self.population = population;
        self
    }

    pub fn lon(&self) -> f64 {
        (self.bbox.min_x + self.bbox.max_x) / 2.0
    }

    pub fn lat(&self) -> f64 {
        (self.bbox.min_y + self.bbox.max_y) / 2.0
    }
}

pub fn rect_geojson(b: &BoundingBox) -> String {
    format!(
        r#"{{"type":"Polygon","coordinates":[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]}}"#,
        x0 = b.min_x,
        y0 = b.min_y,
        x1 = b.max_x,
        y1 = b.max_y
    )
}

pub fn rect_polygon(b: &BoundingBox) -> geojson::Geometry {
    serde_json::from_str(&rect_geojson(b)).unwrap()
}

/// Write `units` into a fresh database at `path` with every table and
/// index artifact present, even when a category has no units.
pub fn write_dataset(path: &Path, units: &[FixtureUnit]) {
    let conn = Connection::open(path).unwrap();
    for category in Category::ALL {
        let names = category.tables();
        conn.execute_batch(&format!(
            "CREATE TABLE {table} (
                geo_id TEXT PRIMARY KEY,
                clat REAL NOT NULL,
                clon REAL NOT NULL,
                minX REAL NOT NULL,
                minY REAL NOT NULL,
                maxX REAL NOT NULL,
                maxY REAL NOT NULL,
                geometry TEXT NOT NULL,
                area REAL,
                housing INTEGER,
                pop INTEGER
            );
            CREATE TABLE {index} (
                geo_id TEXT NOT NULL,
                minX REAL NOT NULL,
                maxX REAL NOT NULL,
                minY REAL NOT NULL,
                maxY REAL NOT NULL,
                pop INTEGER,
                clon REAL NOT NULL,
                clat REAL NOT NULL
            );",
            table = names.table,
            index = names.index
        ))
        .unwrap();
    }

    for unit in units {
        let names = unit.category.tables();
        let b = unit.bbox;
        conn.execute(
            &format!(
                "INSERT INTO {} (geo_id, clat, clon, minX, minY, maxX, maxY, geometry, area, housing, pop)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                names.table
            ),
            params![
                unit.id,
                unit.lat(),
                unit.lon(),
                b.min_x,
                b.min_y,
                b.max_x,
                b.max_y,
                unit.geometry,
                b.width() * b.height(),
                unit.housing,
                unit.population
            ],
        )
        .unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (geo_id, minX, maxX, minY, maxY, pop, clon, clat)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                names.index
            ),
            params![
                unit.id,
                b.min_x,
                b.max_x,
                b.min_y,
                b.max_y,
                unit.population,
                unit.lon(),
                unit.lat()
            ],
        )
        .unwrap();
    }
}

/// The 3 state / 10 county / 50 tract dataset, written to a temp dir.
pub struct CensusFixture {
    _dir: TempDir,
    pub path: PathBuf,
    pub units: Vec<FixtureUnit>,
}

/// (state code, west edge, number of counties)
const STATES: [(&str, f64, usize); 3] = [("01", 0.0, 4), ("02", 20.0, 3), ("04", 40.0, 3)];
const STATE_SIZE: f64 = 10.0;
const TRACTS_PER_COUNTY: usize = 5;

/// Population of the `k`-th tract in the dataset.
pub fn tract_population(k: usize) -> Option<i64> {
    match k {
        17 => None,
        k if k % 9 == 4 => Some(0),
        k => Some((k as i64 + 1) * 100 + 37),
    }
}

pub fn census_fixture() -> CensusFixture {
    let mut tracts = Vec::new();
    let mut counties = Vec::new();
    let mut states = Vec::new();

    for (state, west, county_count) in STATES {
        let state_box = BoundingBox::new(west, 0.0, west + STATE_SIZE, STATE_SIZE);
        states.push(FixtureUnit::rect(Category::State, state, state_box));

        let county_width = STATE_SIZE / county_count as f64;
        for c in 0..county_count {
            let county = format!("{}{:03}", state, 2 * c + 1);
            let x0 = west + county_width * c as f64;
            let x1 = west + county_width * (c + 1) as f64;
            counties.push(FixtureUnit::rect(
                Category::County,
                county.clone(),
                BoundingBox::new(x0, 0.0, x1, STATE_SIZE),
            ));

            let tract_height = STATE_SIZE / TRACTS_PER_COUNTY as f64;
            for t in 0..TRACTS_PER_COUNTY {
                let y0 = tract_height * t as f64;
                let y1 = tract_height * (t + 1) as f64;
                let k = tracts.len();
                tracts.push(
                    FixtureUnit::rect(
                        Category::Tract,
                        format!("{}{:04}00", county, t + 1),
                        BoundingBox::new(x0, y0, x1, y1),
                    )
                    .with_population(tract_population(k)),
                );
            }
        }
    }

    let tract_pops: Vec<PopRow> = tracts
        .iter()
        .map(|t| PopRow {
            id: t.id.clone(),
            population: t.population,
        })
        .collect();
    let by_county = rollup(&tract_pops, Category::County);
    let by_state = rollup(&tract_pops, Category::State);
    for county in &mut counties {
        county.population = by_county.get(&county.id).copied();
    }
    for state in &mut states {
        state.population = by_state.get(&state.id).copied();
    }

    // A split boundary and a few blocks under the first tract.
    let first = tracts[0].bbox;
    let mid_y = (first.min_y + first.max_y) / 2.0;
    let mut block_groups = vec![
        FixtureUnit::rect(
            Category::BlockGroup,
            "010010001001",
            BoundingBox::new(first.min_x, first.min_y, first.max_x, mid_y),
        )
        .with_population(Some(60)),
        FixtureUnit::rect(
            Category::BlockGroup,
            "010010001002",
            BoundingBox::new(first.min_x, mid_y, first.max_x, first.max_y),
        )
        .with_population(Some(77)),
    ];
    block_groups[1].geometry = format!(
        r#"{{"type":"MultiPolygon","coordinates":[{}]}}"#,
        rect_geojson(&block_groups[1].bbox)
            .trim_start_matches(r#"{"type":"Polygon","coordinates":"#)
            .trim_end_matches('}')
    );

    let mut blocks = Vec::new();
    for (i, housing) in [12, 0, 31, 5].into_iter().enumerate() {
        let x0 = first.min_x + i as f64 * 0.25;
        let mut block = FixtureUnit::rect(
            Category::Block,
            format!("010010001001{:03}", i + 1),
            BoundingBox::new(x0, first.min_y, x0 + 0.25, first.min_y + 0.5),
        )
        .with_population(Some(housing * 2));
        block.housing = Some(housing);
        blocks.push(block);
    }

    let mut units = states;
    units.extend(counties);
    units.extend(tracts);
    units.extend(block_groups);
    units.extend(blocks);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("census.sqlite");
    write_dataset(&path, &units);

    CensusFixture {
        _dir: dir,
        path,
        units,
    }
}

impl CensusFixture {
    pub fn open(&self) -> CensusDb {
        self.open_with(Config::default())
    }

    pub fn open_with(&self, config: Config) -> CensusDb {
        init_logging();
        CensusDb::builder()
            .sqlite(&self.path)
            .config(config)
            .build()
            .unwrap()
    }

    pub fn units_of(&self, category: Category) -> Vec<&FixtureUnit> {
        self.units.iter().filter(|u| u.category == category).collect()
    }

    pub fn unit(&self, id: &str) -> &FixtureUnit {
        self.units.iter().find(|u| u.id == id).unwrap()
    }

    /// Sorted ids of `category` starting with `prefix`.
    pub fn ids_with_prefix(&self, category: Category, prefix: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .units_of(category)
            .into_iter()
            .filter(|u| u.id.starts_with(prefix))
            .map(|u| u.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn state_extent(&self, state: &str) -> BoundingBox {
        self.unit(state).bbox
    }

    /// Externally known population of a state, summed straight from the tracts.
    pub fn state_total(&self, state: &str) -> i64 {
        self.units_of(Category::Tract)
            .into_iter()
            .filter(|t| t.id.starts_with(state))
            .map(|t| t.population.unwrap_or(0))
            .sum()
    }

    pub fn populations(&self, category: Category) -> BTreeMap<String, Option<i64>> {
        self.units_of(category)
            .into_iter()
            .map(|u| (u.id.clone(), u.population))
            .collect()
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
