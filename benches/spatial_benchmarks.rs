use censusdb::compute::geometry;
use censusdb::spatial_index::{BoxIndex, BoxIndexEntry};
use censusdb::{BoundingBox, BoxMatch, Buffer, Category, CensusDb, DistanceUnit};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rusqlite::{Connection, params};
use std::path::Path;

const CELL: f64 = 0.05;

/// `side * side` tract cells starting at (-100, 30), one tenth of them empty.
fn grid_entries(side: usize) -> Vec<BoxIndexEntry> {
    let mut entries = Vec::with_capacity(side * side);
    for row in 0..side {
        for col in 0..side {
            let k = row * side + col;
            let min_x = -100.0 + col as f64 * CELL;
            let min_y = 30.0 + row as f64 * CELL;
            entries.push(BoxIndexEntry {
                id: format!("48{:03}{:06}", row % 1000, col * 100 + row % 100),
                bbox: BoundingBox::new(min_x, min_y, min_x + CELL, min_y + CELL),
                lon: min_x + CELL / 2.0,
                lat: min_y + CELL / 2.0,
                population: if k % 10 == 0 { Some(0) } else { Some(k as i64 % 4000) },
            });
        }
    }
    entries
}

fn write_tracts(path: &Path, entries: &[BoxIndexEntry]) {
    let mut conn = Connection::open(path).unwrap();
    for category in Category::ALL {
        let names = category.tables();
        conn.execute_batch(&format!(
            "CREATE TABLE {} (geo_id TEXT PRIMARY KEY, clat REAL, clon REAL,
                minX REAL, minY REAL, maxX REAL, maxY REAL, geometry TEXT,
                area REAL, housing INTEGER, pop INTEGER);
             CREATE TABLE {} (geo_id TEXT, minX REAL, maxX REAL, minY REAL,
                maxY REAL, pop INTEGER, clon REAL, clat REAL);",
            names.table, names.index
        ))
        .unwrap();
    }

    let tx = conn.transaction().unwrap();
    for e in entries {
        let b = e.bbox;
        let boundary = geometry::encode_string(&geo::Geometry::Polygon(b.to_polygon())).unwrap();
        tx.execute(
            "INSERT OR IGNORE INTO tracts VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10)",
            params![e.id, e.lat, e.lon, b.min_x, b.min_y, b.max_x, b.max_y, boundary, CELL * CELL, e.population],
        )
        .unwrap();
        tx.execute(
            "INSERT INTO v_tracts VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![e.id, b.min_x, b.max_x, b.min_y, b.max_y, e.population, e.lon, e.lat],
        )
        .unwrap();
    }
    tx.commit().unwrap();
}

fn benchmark_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("box_index");

    for side in [50, 200] {
        let entries = grid_entries(side);
        group.bench_with_input(BenchmarkId::new("bulk_load", side * side), &entries, |b, e| {
            b.iter(|| BoxIndex::build(black_box(e.clone())))
        });
    }

    let index = BoxIndex::build(grid_entries(200));
    for span in [0.5, 2.0, 8.0] {
        let query = BoundingBox::new(-99.0, 31.0, -99.0 + span, 31.0 + span);
        group.bench_with_input(BenchmarkId::new("contained", span), &query, |b, q| {
            b.iter(|| index.range_query(black_box(q), BoxMatch::Contained))
        });
        group.bench_with_input(BenchmarkId::new("intersecting", span), &query, |b, q| {
            b.iter(|| index.range_query(black_box(q), BoxMatch::Intersecting))
        });
    }

    group.finish();
}

fn benchmark_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("sqlite_queries");
    group.sample_size(20);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.sqlite");
    write_tracts(&path, &grid_entries(100));
    let db = CensusDb::open_sqlite(&path).unwrap();

    let bbox = BoundingBox::new(-99.0, 31.0, -98.0, 32.0);
    group.bench_function("pop_total_by_bbox", |b| {
        b.iter(|| db.get_pop_total_by_bbox(Category::Tract, black_box(bbox)).unwrap())
    });

    let query = geometry::encode(&geo::Geometry::Polygon(bbox.to_polygon()));
    group.bench_function("intersected_geometries", |b| {
        b.iter(|| {
            db.get_intersected_geometries(Category::Tract, black_box(&query), None)
                .unwrap()
        })
    });

    let buffer = Buffer::new(5.0, DistanceUnit::Kilometers);
    group.bench_function("buffered_rows", |b| {
        b.iter(|| {
            db.get_row_by_geometry(Category::Tract, black_box(&query), Some(buffer))
                .unwrap()
        })
    });

    group.bench_function("pop_data_prefix", |b| {
        b.iter(|| db.get_pop_data(Category::Tract, black_box("48001*,48050*")).unwrap())
    });

    group.finish();
}

criterion_group!(benches, benchmark_index, benchmark_queries);
criterion_main!(benches);
