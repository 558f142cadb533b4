use geo::polygon;
use grid_weights::geometry::{rectangle, regular_grid};
use grid_weights::prelude::*;
use grid_weights::{CandidateTable, GridWeightsError};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn plans(total: usize) -> Vec<PartitionPlan> {
    vec![
        PartitionPlan::single(total),
        PartitionPlan::uniform(total, 1).unwrap(),
        PartitionPlan::uniform(total, 7).unwrap(),
        PartitionPlan::uniform(total, total + 3).unwrap(),
        PartitionPlan::new(vec![0, total / 3, 0, total - total / 3], total).unwrap(),
    ]
}

fn assert_same_sets(expected: &CandidateTable, actual: &CandidateTable) {
    assert_eq!(expected.len(), actual.len());
    for t in 0..expected.len() {
        let mut a = expected.candidates(t).to_vec();
        let mut b = actual.candidates(t).to_vec();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b, "target {} differs", t);
    }
}

#[test]
fn test_partitioned_matches_single_for_every_plan() {
    init_logging();

    let source = regular_grid(0.0, 0.0, 10.0, 10.0, 10, 10);
    let target = regular_grid(0.25, 0.25, 9.75, 9.75, 6, 4);
    let single = SpatialIndex::build(&source).unwrap();

    for mode in QueryMode::ALL {
        let expected = single.query(target.polygons(), mode);
        for plan in plans(source.len()) {
            for parallel in [true, false] {
                let config = RegridConfig::default().with_parallel(parallel);
                let index = PartitionedIndex::build(&source, &plan, &config).unwrap();
                let actual = index.query(target.polygons(), mode);
                assert_same_sets(&expected, &actual);
            }
        }
    }
}

#[test]
fn test_merge_keeps_partition_then_build_order() {
    let source = regular_grid(0.0, 0.0, 4.0, 1.0, 4, 1);
    let target = GeometryCollection::new(vec![rectangle(0.5, 0.2, 3.5, 0.8)]);
    let plan = PartitionPlan::new(vec![2, 2], 4).unwrap();

    let index = PartitionedIndex::build(&source, &plan, &RegridConfig::default()).unwrap();
    let table = index.query(target.polygons(), QueryMode::Overlaps);
    assert_eq!(table.candidates(0), &[0, 1, 2, 3]);
}

#[test]
fn test_query_is_deterministic() {
    let source = regular_grid(-5.0, -5.0, 5.0, 5.0, 20, 20);
    let target = regular_grid(-4.9, -4.9, 4.9, 4.9, 9, 9);
    let plan = PartitionPlan::uniform(source.len(), 37).unwrap();
    let index = PartitionedIndex::build(&source, &plan, &RegridConfig::default()).unwrap();

    let first = index.query(target.polygons(), QueryMode::Overlaps);
    for _ in 0..5 {
        assert_eq!(index.query(target.polygons(), QueryMode::Overlaps), first);
    }
}

#[test]
fn test_lenient_build_skips_failed_partition() {
    init_logging();

    let mut cells: Vec<Polygon<f64>> = regular_grid(0.0, 0.0, 4.0, 1.0, 4, 1).polygons().to_vec();
    cells[3] = polygon![(x: 3.0, y: 0.0), (x: 4.0, y: 0.0)];
    let source = GeometryCollection::new(cells);
    let plan = PartitionPlan::new(vec![2, 2], 4).unwrap();
    let target = GeometryCollection::new(vec![rectangle(0.0, 0.0, 4.0, 1.0)]);

    let index = PartitionedIndex::build(&source, &plan, &RegridConfig::default()).unwrap();
    assert!(!index.is_complete());
    let failures = index.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, 1);
    assert!(matches!(
        failures[0].1,
        GridWeightsError::PartitionBuildFailure { partition: 1, .. }
    ));

    let table = index.query(target.polygons(), QueryMode::Overlaps);
    assert_eq!(table.candidates(0), &[0, 1]);

    let strict = RegridConfig::default().with_strict(true);
    match PartitionedIndex::build(&source, &plan, &strict) {
        Err(GridWeightsError::PartitionBuildFailure { partition, source }) => {
            assert_eq!(partition, 1);
            assert!(matches!(*source, GridWeightsError::MalformedGeometry { id: 3, .. }));
        }
        other => panic!("expected partition failure, got {:?}", other),
    }
}

#[test]
fn test_cancellation_discards_partial_results() {
    let source = regular_grid(0.0, 0.0, 8.0, 8.0, 8, 8);
    let target = regular_grid(0.0, 0.0, 8.0, 8.0, 2, 2);
    let plan = PartitionPlan::uniform(source.len(), 8).unwrap();
    let config = RegridConfig::default();

    let token = CancellationToken::new();
    let index = PartitionedIndex::build_with_cancel(&source, &plan, &config, &token).unwrap();
    assert!(index.query_with_cancel(target.polygons(), QueryMode::Overlaps, &token).is_ok());

    token.cancel();
    assert!(matches!(
        index.query_with_cancel(target.polygons(), QueryMode::Overlaps, &token),
        Err(GridWeightsError::Cancelled)
    ));
    assert!(matches!(
        PartitionedIndex::build_with_cancel(&source, &plan, &config, &token),
        Err(GridWeightsError::Cancelled)
    ));
}
