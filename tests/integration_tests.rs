use approx::assert_relative_eq;
use geo::{Coord, LineString, MapCoords, polygon};
use grid_weights::geometry::{rectangle, regular_grid};
use grid_weights::prelude::*;
use grid_weights::{CandidateTable, conservative_weights};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn lat_lon_grid(nx: usize, ny: usize, extent: f64) -> LabeledGeometries<usize> {
    LabeledGeometries::new(
        regular_grid(0.0, 0.0, extent, extent, nx, ny),
        vec![
            Dimension::new("lat", (0..ny).collect()),
            Dimension::new("lon", (0..nx).collect()),
        ],
    )
    .unwrap()
}

#[test]
fn test_end_to_end_conservative_regrid() {
    init_logging();

    let source = lat_lon_grid(6, 6, 3.0);
    let target = lat_lon_grid(4, 4, 3.0);
    let algorithms = Algorithms::by_variable(
        &["air_temperature", "precipitation"],
        [("air_temperature", "conservative")],
        Some("conservative"),
    )
    .unwrap();
    let config = RegridConfig::default();

    let index = create_index(&source, None, &config).unwrap();
    let cells = index.query(&target, &algorithms);
    let weights = weights(&source, &target, &cells, &config).unwrap();

    assert_eq!(weights.len(), 1);
    assert_eq!(weights.source_dims(), &["source_lat".to_string(), "source_lon".to_string()]);
    assert_eq!(weights.target_dims(), &["target_lat".to_string(), "target_lon".to_string()]);

    let table = weights.table("conservative").unwrap();
    assert!(table.failures().is_empty());
    for coverage in table.coverages() {
        assert_relative_eq!(coverage, 1.0, epsilon = 1e-9);
    }
}

#[test]
fn test_coverage_never_exceeds_one() {
    init_logging();

    // Skewed, non-aligned source and target cells.
    let source: GeometryCollection = (0..5)
        .flat_map(|j| {
            (0..5).map(move |i| {
                let (x, y) = (i as f64 * 0.8, j as f64 * 0.8);
                polygon![
                    (x: x, y: y),
                    (x: x + 0.8, y: y + 0.1),
                    (x: x + 0.8, y: y + 0.9),
                    (x: x, y: y + 0.8),
                ]
            })
        })
        .collect();
    let target = regular_grid(0.3, 0.3, 3.7, 3.7, 7, 5);

    let index = SpatialIndex::build(&source).unwrap();
    let candidates = index.query(target.polygons(), QueryMode::Overlaps);
    let table = conservative_weights(&source, &target, &candidates, &RegridConfig::default())
        .unwrap();

    for t in 0..target.len() {
        assert!(table.coverage(t) <= 1.0 + 1e-9, "target {} over-covered", t);
    }
    assert!(table.iter().all(|entry| entry.weight >= 1e-9));
}

/// `n` by `n` quads over `[0, n]^2` built on a shared, deterministically
/// jittered vertex lattice. Boundary vertices only move along the boundary,
/// so the quads tile the square exactly.
fn jittered_quads(n: usize) -> GeometryCollection {
    let vertex = move |i: usize, j: usize| {
        let (x, y) = (i as f64, j as f64);
        let phase = x * 12.9898 + y * 78.233;
        let dx = if i > 0 && i < n { 0.25 * phase.sin() } else { 0.0 };
        let dy = if j > 0 && j < n { 0.25 * (1.7 * phase).cos() } else { 0.0 };
        (x + dx, y + dy)
    };

    (0..n)
        .flat_map(|j| {
            (0..n).map(move |i| {
                let corners = vec![
                    vertex(i, j),
                    vertex(i + 1, j),
                    vertex(i + 1, j + 1),
                    vertex(i, j + 1),
                ];
                Polygon::new(LineString::from(corners), vec![])
            })
        })
        .collect()
}

fn assert_full_coverage(source: &GeometryCollection, target: &GeometryCollection) {
    let index = SpatialIndex::build(source).unwrap();
    let candidates = index.query(target.polygons(), QueryMode::Overlaps);
    let table = conservative_weights(source, target, &candidates, &RegridConfig::default())
        .unwrap();

    assert!(table.failures().is_empty());
    for t in 0..target.len() {
        let coverage = table.coverage(t);
        assert!(
            (coverage - 1.0).abs() <= 1e-9,
            "target {} coverage {} differs from 1 by {:e}",
            t,
            coverage,
            coverage - 1.0
        );
    }
}

#[test]
fn test_jittered_quads_cover_targets_exactly() {
    init_logging();

    let source = jittered_quads(30);
    let target = regular_grid(0.0, 0.0, 30.0, 30.0, 17, 13);
    assert_full_coverage(&source, &target);
}

#[test]
fn test_projected_offset_grids_cover_targets_exactly() {
    init_logging();

    let (x0, y0) = (500_000.0, 4_000_000.0);
    let source = regular_grid(x0, y0, x0 + 6.0, y0 + 6.0, 30, 30);
    let target = regular_grid(x0, y0, x0 + 6.0, y0 + 6.0, 17, 13);
    assert_full_coverage(&source, &target);

    let shifted: GeometryCollection = jittered_quads(30)
        .iter()
        .map(|cell| cell.map_coords(|c| Coord { x: c.x * 0.2 + x0, y: c.y * 0.2 + y0 }))
        .collect();
    assert_full_coverage(&shifted, &target);
}

#[test]
fn test_identical_collections_map_onto_themselves() {
    init_logging();

    // Cells separated by gaps, so no bounding boxes touch.
    let cells: GeometryCollection = (0..4)
        .flat_map(|j| {
            (0..4).map(move |i| {
                let (x, y) = (i as f64 * 2.0, j as f64 * 2.0);
                rectangle(x, y, x + 1.0, y + 1.0)
            })
        })
        .collect();

    let index = SpatialIndex::build(&cells).unwrap();
    let candidates = index.query(cells.polygons(), QueryMode::Overlaps);
    for t in 0..cells.len() {
        assert_eq!(candidates.candidates(t), &[t]);
    }

    let table = conservative_weights(&cells, &cells, &candidates, &RegridConfig::default())
        .unwrap();
    assert_eq!(table.len(), cells.len());
    for t in 0..cells.len() {
        assert_relative_eq!(table.get(t, t).unwrap(), 1.0, epsilon = 1e-12);
    }
}

#[test]
fn test_unit_square_halves() {
    let source = GeometryCollection::new(vec![
        rectangle(0.0, 0.0, 0.5, 1.0),
        rectangle(0.5, 0.0, 1.0, 1.0),
    ]);
    let target = GeometryCollection::new(vec![rectangle(0.0, 0.0, 1.0, 1.0)]);

    let candidates = SpatialIndex::build(&source)
        .unwrap()
        .query(target.polygons(), QueryMode::Overlaps);
    let table = conservative_weights(&source, &target, &candidates, &RegridConfig::default())
        .unwrap();

    assert_eq!(table.len(), 2);
    assert_relative_eq!(table.get(0, 0).unwrap(), 0.5, epsilon = 1e-12);
    assert_relative_eq!(table.get(1, 0).unwrap(), 0.5, epsilon = 1e-12);
    assert_relative_eq!(table.coverage(0), 1.0, epsilon = 1e-12);
}

#[test]
fn test_target_outside_source_has_no_rows() {
    let source = regular_grid(0.0, 0.0, 2.0, 2.0, 2, 2);
    let target = GeometryCollection::new(vec![
        rectangle(0.0, 0.0, 1.0, 1.0),
        rectangle(10.0, 10.0, 11.0, 11.0),
    ]);

    let candidates = SpatialIndex::build(&source)
        .unwrap()
        .query(target.polygons(), QueryMode::Overlaps);
    assert!(candidates.candidates(1).is_empty());

    let table = conservative_weights(&source, &target, &candidates, &RegridConfig::default())
        .unwrap();
    assert!(table.for_target(1).is_empty());
    assert_eq!(table.coverage(1), 0.0);
    assert!(table.failures().is_empty());
}

#[test]
fn test_csr_round_trip_feeds_weights() {
    let source = regular_grid(0.0, 0.0, 2.0, 2.0, 2, 2);
    let target = regular_grid(0.0, 0.0, 2.0, 2.0, 1, 1);

    let (indptr, indices) = CandidateTable::new(QueryMode::Overlaps, vec![vec![0, 1, 2, 3]]).to_csr();
    assert_eq!(indptr, vec![0, 4]);

    let candidates = CandidateTable::from_csr(QueryMode::Overlaps, &indptr, &indices).unwrap();
    let table = conservative_weights(&source, &target, &candidates, &RegridConfig::default())
        .unwrap();
    assert_relative_eq!(table.coverage(0), 1.0, epsilon = 1e-12);
}

#[test]
fn test_algorithm_options_drive_regrid() {
    init_logging();

    let options = grid_weights::AlgorithmOptions::from_json(
        r#"{ "algorithms": { "conservative": ["tas"] }, "default": "conservative" }"#,
    )
    .unwrap();
    let algorithms = Algorithms::from_options(&["tas", "orog"], &options).unwrap();
    assert_eq!(algorithms.unique(), vec![Algorithm::Conservative]);

    let source = lat_lon_grid(2, 2, 1.0);
    let target = LabeledGeometries::flat("cell", regular_grid(0.0, 0.0, 1.0, 1.0, 1, 1));
    let config = RegridConfig::from_json(r#"{ "parallel": false }"#).unwrap();

    let index = create_index(&source, None, &config).unwrap();
    let cells = index.query(&target, &algorithms);
    assert_eq!(cells.dims(), vec!["target_cell", "source_lat", "source_lon"]);

    let weights = weights(&source, &target, &cells, &config).unwrap();
    let table = weights.get(Algorithm::Conservative).unwrap();
    assert_eq!(table.for_target(0).len(), 4);
}
