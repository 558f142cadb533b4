use approx::assert_relative_eq;
use geo::{LineString, polygon};
use grid_weights::geometry::{rectangle, regular_grid};
use grid_weights::prelude::*;
use grid_weights::{CandidateTable, GridWeightsError, conservative_weights};

#[test]
fn test_empty_source_collection() {
    let source = GeometryCollection::default();
    let target = regular_grid(0.0, 0.0, 1.0, 1.0, 2, 2);

    let index = SpatialIndex::build(&source).unwrap();
    assert!(index.is_empty());
    assert!(index.envelope().is_none());

    let candidates = index.query(target.polygons(), QueryMode::Overlaps);
    assert_eq!(candidates.len(), 4);
    assert_eq!(candidates.total_candidates(), 0);

    let table = conservative_weights(&source, &target, &candidates, &RegridConfig::default())
        .unwrap();
    assert!(table.is_empty());
}

#[test]
fn test_empty_target_collection() {
    let source = regular_grid(0.0, 0.0, 1.0, 1.0, 2, 2);
    let target = GeometryCollection::default();

    let candidates = SpatialIndex::build(&source)
        .unwrap()
        .query(target.polygons(), QueryMode::Overlaps);
    assert!(candidates.is_empty());

    let table = conservative_weights(&source, &target, &candidates, &RegridConfig::default())
        .unwrap();
    assert_eq!(table.targets(), 0);
}

#[test]
fn test_source_with_hole() {
    let ring = |x0: f64, y0: f64, x1: f64, y1: f64| -> LineString<f64> {
        rectangle(x0, y0, x1, y1).exterior().clone()
    };
    let source = GeometryCollection::new(vec![Polygon::new(
        ring(0.0, 0.0, 2.0, 2.0),
        vec![ring(0.5, 0.5, 1.5, 1.5)],
    )]);
    let target = GeometryCollection::new(vec![rectangle(0.0, 0.0, 2.0, 2.0)]);

    let candidates = SpatialIndex::build(&source)
        .unwrap()
        .query(target.polygons(), QueryMode::Overlaps);
    let table = conservative_weights(&source, &target, &candidates, &RegridConfig::default())
        .unwrap();
    assert_relative_eq!(table.get(0, 0).unwrap(), 0.75, epsilon = 1e-12);
}

#[test]
fn test_strict_mode_reports_degenerate_target() {
    let source = regular_grid(0.0, 0.0, 2.0, 2.0, 2, 2);
    let flat: Polygon<f64> = polygon![(x: 0.0, y: 0.5), (x: 1.0, y: 0.5), (x: 2.0, y: 0.5)];
    let target = GeometryCollection::new(vec![rectangle(0.0, 0.0, 1.0, 1.0), flat]);

    let candidates = all_to_all(source.len(), target.len());

    let lenient = conservative_weights(&source, &target, &candidates, &RegridConfig::default())
        .unwrap();
    assert_eq!(lenient.failures().len(), 1);
    assert_eq!(lenient.failures()[0].0, 1);
    assert!(lenient.for_target(1).is_empty());

    let strict = RegridConfig::default().with_strict(true);
    let err = conservative_weights(&source, &target, &candidates, &strict).unwrap_err();
    assert!(matches!(err, GridWeightsError::DegenerateTarget { id: 1 }));
}

#[test]
fn test_overflowing_area_yields_no_weights() {
    let huge = rectangle(0.0, 0.0, 1e200, 1e200);
    let source = GeometryCollection::new(vec![huge.clone(), huge.clone()]);
    let target = GeometryCollection::new(vec![huge.clone(), huge]);
    let candidates = all_to_all(source.len(), target.len());

    let table = conservative_weights(&source, &target, &candidates, &RegridConfig::default())
        .unwrap();
    assert!(table.is_empty());
    assert!(table.iter().all(|entry| entry.weight.is_finite()));
    assert_eq!(table.failures().len(), 2);
    assert!(matches!(
        table.failures()[0].1,
        GridWeightsError::MalformedGeometry { id: 0, .. }
    ));

    let strict = RegridConfig::default().with_strict(true);
    let err = conservative_weights(&source, &target, &candidates, &strict).unwrap_err();
    assert!(err.is_geometry_error());
}

#[test]
fn test_touching_cells_produce_no_weight() {
    let source = GeometryCollection::new(vec![rectangle(1.0, 0.0, 2.0, 1.0)]);
    let target = GeometryCollection::new(vec![rectangle(0.0, 0.0, 1.0, 1.0)]);

    let candidates = SpatialIndex::build(&source)
        .unwrap()
        .query(target.polygons(), QueryMode::Overlaps);
    assert_eq!(candidates.candidates(0), &[0]);

    let table = conservative_weights(&source, &target, &candidates, &RegridConfig::default())
        .unwrap();
    assert!(table.is_empty());
}

#[test]
fn test_invalid_configuration_rejected() {
    let source = regular_grid(0.0, 0.0, 1.0, 1.0, 1, 1);
    let candidates = SpatialIndex::build(&source)
        .unwrap()
        .query(source.polygons(), QueryMode::Overlaps);
    let config = RegridConfig::default().with_epsilon(-1.0);

    assert!(conservative_weights(&source, &source, &candidates, &config).is_err());
}

fn all_to_all(sources: usize, targets: usize) -> CandidateTable {
    CandidateTable::new(QueryMode::Overlaps, vec![(0..sources).collect(); targets])
}
