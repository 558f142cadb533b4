//! Labeled regridding facade: index the source grid, query it with the
//! target grid for every mode the configured algorithms need, then compute
//! one weight table per algorithm.
//!
//! ```rust
//! use grid_weights::geometry::regular_grid;
//! use grid_weights::regrid::{create_index, weights};
//! use grid_weights::{Algorithms, LabeledGeometries, RegridConfig};
//!
//! let source = LabeledGeometries::flat("cell", regular_grid(0.0, 0.0, 2.0, 2.0, 2, 2));
//! let target = LabeledGeometries::flat("cell", regular_grid(0.0, 0.0, 2.0, 2.0, 1, 1));
//! let algorithms = Algorithms::new([("tas", "conservative")])?;
//! let config = RegridConfig::default();
//!
//! let index = create_index(&source, None, &config)?;
//! let cells = index.query(&target, &algorithms);
//! let weights = weights(&source, &target, &cells, &config)?;
//!
//! let table = weights.table("conservative").unwrap();
//! assert_eq!(table.len(), 4);
//! assert!((table.coverage(0) - 1.0).abs() < 1e-12);
//! assert_eq!(weights.source_dims(), &["source_cell".to_string()]);
//! # Ok::<(), grid_weights::GridWeightsError>(())
//! ```

use crate::algorithms::{Algorithm, Algorithms};
use crate::cancel::CancellationToken;
use crate::compute::overlap::WeightTable;
use crate::compute::spatial::{CandidateTable, PartitionPlan, PartitionedIndex, QueryMode, SpatialIndex};
use crate::error::{GridWeightsError, Result};
use crate::labeled::LabeledGeometries;
use grid_weights_types::config::RegridConfig;
use indexmap::IndexMap;

pub const SOURCE_PREFIX: &str = "source";
pub const TARGET_PREFIX: &str = "target";

#[derive(Debug)]
enum IndexKind {
    Single(SpatialIndex),
    Partitioned(PartitionedIndex),
}

/// A spatial index over a labeled source grid.
#[derive(Debug)]
pub struct RegridIndex {
    index: IndexKind,
    source_dims: Vec<String>,
}

/// Index the source grid.
///
/// Without a plan a single R-tree covers the whole grid; with one, each
/// partition gets its own index (see [`PartitionedIndex::build`] for how
/// `config.strict` treats partition failures).
pub fn create_index<L>(
    source: &LabeledGeometries<L>,
    plan: Option<PartitionPlan>,
    config: &RegridConfig,
) -> Result<RegridIndex> {
    create_index_with_cancel(source, plan, config, &CancellationToken::new())
}

pub fn create_index_with_cancel<L>(
    source: &LabeledGeometries<L>,
    plan: Option<PartitionPlan>,
    config: &RegridConfig,
    token: &CancellationToken,
) -> Result<RegridIndex> {
    let collection = source.collection();
    let index = match plan {
        Some(plan) => IndexKind::Partitioned(PartitionedIndex::build_with_cancel(
            collection, &plan, config, token,
        )?),
        None => {
            if token.is_cancelled() {
                return Err(GridWeightsError::Cancelled);
            }
            let index = SpatialIndex::build(collection)?;
            log::info!("Built spatial index: {} cells", index.len());
            IndexKind::Single(index)
        }
    };

    Ok(RegridIndex {
        index,
        source_dims: source.prefixed(SOURCE_PREFIX),
    })
}

impl RegridIndex {
    /// Prefixed source dimension names, e.g. `source_lat`.
    pub fn source_dims(&self) -> &[String] {
        &self.source_dims
    }

    pub fn is_partitioned(&self) -> bool {
        matches!(self.index, IndexKind::Partitioned(_))
    }

    /// Number of indexed source cells.
    pub fn len(&self) -> usize {
        match &self.index {
            IndexKind::Single(index) => index.len(),
            IndexKind::Partitioned(index) => index.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn query_mode(&self, target: &[geo::Polygon<f64>], mode: QueryMode) -> CandidateTable {
        match &self.index {
            IndexKind::Single(index) => index.query(target, mode),
            IndexKind::Partitioned(index) => index.query(target, mode),
        }
    }

    /// Query once per distinct indexing mode of `algorithms`.
    pub fn query<L>(&self, target: &LabeledGeometries<L>, algorithms: &Algorithms) -> IndexedCells {
        let polygons = target.collection().polygons();
        let candidates = algorithms
            .indexing_modes()
            .into_iter()
            .map(|mode| (mode, self.query_mode(polygons, mode)))
            .collect();

        IndexedCells {
            candidates,
            algorithms: algorithms.unique(),
            source_dims: self.source_dims.clone(),
            target_dims: target.prefixed(TARGET_PREFIX),
        }
    }

    /// Like [`RegridIndex::query`], returning `Cancelled` once `token` is set.
    pub fn query_with_cancel<L>(
        &self,
        target: &LabeledGeometries<L>,
        algorithms: &Algorithms,
        token: &CancellationToken,
    ) -> Result<IndexedCells> {
        let polygons = target.collection().polygons();
        let mut candidates = IndexMap::new();
        for mode in algorithms.indexing_modes() {
            let table = match &self.index {
                IndexKind::Single(index) => {
                    if token.is_cancelled() {
                        return Err(GridWeightsError::Cancelled);
                    }
                    index.query(polygons, mode)
                }
                IndexKind::Partitioned(index) => index.query_with_cancel(polygons, mode, token)?,
            };
            candidates.insert(mode, table);
        }

        if token.is_cancelled() {
            return Err(GridWeightsError::Cancelled);
        }

        Ok(IndexedCells {
            candidates,
            algorithms: algorithms.unique(),
            source_dims: self.source_dims.clone(),
            target_dims: target.prefixed(TARGET_PREFIX),
        })
    }
}

/// Candidate tables for one target grid, keyed by query mode, plus the
/// algorithms they were gathered for.
#[derive(Debug, Clone)]
pub struct IndexedCells {
    candidates: IndexMap<QueryMode, CandidateTable>,
    algorithms: Vec<Algorithm>,
    source_dims: Vec<String>,
    target_dims: Vec<String>,
}

impl IndexedCells {
    pub fn candidates(&self, mode: QueryMode) -> Option<&CandidateTable> {
        self.candidates.get(&mode)
    }

    pub fn modes(&self) -> impl Iterator<Item = QueryMode> + '_ {
        self.candidates.keys().copied()
    }

    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    pub fn source_dims(&self) -> &[String] {
        &self.source_dims
    }

    pub fn target_dims(&self) -> &[String] {
        &self.target_dims
    }

    /// Target dimensions followed by source dimensions.
    pub fn dims(&self) -> Vec<&str> {
        self.target_dims
            .iter()
            .chain(&self.source_dims)
            .map(String::as_str)
            .collect()
    }
}

/// One weight table per algorithm.
#[derive(Debug)]
pub struct Weights {
    tables: IndexMap<Algorithm, WeightTable>,
    source_dims: Vec<String>,
    target_dims: Vec<String>,
}

impl Weights {
    pub fn get(&self, algorithm: Algorithm) -> Option<&WeightTable> {
        self.tables.get(&algorithm)
    }

    /// Table of the algorithm registered under `name`.
    pub fn table(&self, name: &str) -> Option<&WeightTable> {
        Algorithm::from_name(name).and_then(|algorithm| self.get(algorithm))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Algorithm, &WeightTable)> {
        self.tables.iter().map(|(algorithm, table)| (*algorithm, table))
    }

    pub fn algorithms(&self) -> Vec<Algorithm> {
        self.tables.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn source_dims(&self) -> &[String] {
        &self.source_dims
    }

    pub fn target_dims(&self) -> &[String] {
        &self.target_dims
    }
}

/// Compute the weights of every algorithm recorded in `cells`.
///
/// # Errors
///
/// - `InvalidInput` if `cells` was not produced from these grids or lacks the
///   candidates an algorithm needs
/// - any error of the algorithm itself (e.g. a strict-mode geometry failure)
pub fn weights<S, T>(
    source: &LabeledGeometries<S>,
    target: &LabeledGeometries<T>,
    cells: &IndexedCells,
    config: &RegridConfig,
) -> Result<Weights> {
    if cells.source_dims != source.prefixed(SOURCE_PREFIX)
        || cells.target_dims != target.prefixed(TARGET_PREFIX)
    {
        return Err(GridWeightsError::InvalidInput(format!(
            "indexed cells have dimensions {:?}, grids have {:?} and {:?}",
            cells.dims(),
            target.prefixed(TARGET_PREFIX),
            source.prefixed(SOURCE_PREFIX)
        )));
    }

    let mut tables = IndexMap::with_capacity(cells.algorithms.len());
    for &algorithm in &cells.algorithms {
        let mode = algorithm.indexing_mode();
        let candidates = cells.candidates(mode).ok_or_else(|| {
            GridWeightsError::InvalidInput(format!(
                "no '{}' candidates for algorithm {}",
                mode, algorithm
            ))
        })?;

        let table = algorithm.compute(source.collection(), target.collection(), candidates, config)?;
        log::info!(
            "Computed {} weights: {} entries, {} failed targets",
            algorithm,
            table.len(),
            table.failures().len()
        );
        tables.insert(algorithm, table);
    }

    Ok(Weights {
        tables,
        source_dims: cells.source_dims.clone(),
        target_dims: cells.target_dims.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::regular_grid;
    use approx::assert_relative_eq;
    use grid_weights_types::labels::Dimension;

    fn grid(nx: usize, ny: usize) -> LabeledGeometries<usize> {
        LabeledGeometries::new(
            regular_grid(0.0, 0.0, 4.0, 4.0, nx, ny),
            vec![
                Dimension::new("y", (0..ny).collect()),
                Dimension::new("x", (0..nx).collect()),
            ],
        )
        .unwrap()
    }

    fn conservative() -> Algorithms {
        Algorithms::new([("tas", "conservative")]).unwrap()
    }

    #[test]
    fn test_query_gathers_modes_and_dims() {
        let source = grid(4, 4);
        let target = grid(2, 2);
        let index = create_index(&source, None, &RegridConfig::default()).unwrap();
        assert!(!index.is_partitioned());

        let cells = index.query(&target, &conservative());
        assert_eq!(cells.modes().collect::<Vec<_>>(), vec![QueryMode::Overlaps]);
        assert_eq!(cells.algorithms(), &[Algorithm::Conservative]);
        assert_eq!(cells.dims(), vec!["target_y", "target_x", "source_y", "source_x"]);

        let table = cells.candidates(QueryMode::Overlaps).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.candidates(0), &[0, 1, 2, 4, 5, 6, 8, 9, 10]);
    }

    #[test]
    fn test_weights_per_algorithm() {
        let source = grid(4, 4);
        let target = grid(2, 2);
        let config = RegridConfig::default();
        let index = create_index(&source, None, &config).unwrap();
        let cells = index.query(&target, &conservative());

        let weights = weights(&source, &target, &cells, &config).unwrap();
        assert_eq!(weights.algorithms(), vec![Algorithm::Conservative]);
        assert_eq!(weights.source_dims(), &["source_y".to_string(), "source_x".to_string()]);

        let table = weights.get(Algorithm::Conservative).unwrap();
        for t in 0..target.len() {
            assert_relative_eq!(table.coverage(t), 1.0, epsilon = 1e-12);
            assert_eq!(table.for_target(t).len(), 4);
        }
        assert_relative_eq!(table.get(5, 0).unwrap(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_partitioned_index_matches_single() {
        let source = grid(4, 4);
        let target = grid(3, 3);
        let config = RegridConfig::default();
        let single = create_index(&source, None, &config).unwrap();
        let plan = PartitionPlan::new(vec![5, 0, 7, 4], 16).unwrap();
        let partitioned = create_index(&source, Some(plan), &config).unwrap();
        assert!(partitioned.is_partitioned());
        assert_eq!(partitioned.len(), 16);

        let a = single.query(&target, &conservative());
        let b = partitioned.query(&target, &conservative());
        assert_eq!(
            a.candidates(QueryMode::Overlaps),
            b.candidates(QueryMode::Overlaps)
        );
    }

    #[test]
    fn test_weights_rejects_foreign_cells() {
        let source = grid(4, 4);
        let target = grid(2, 2);
        let other = LabeledGeometries::flat("cell", regular_grid(0.0, 0.0, 4.0, 4.0, 2, 2));
        let config = RegridConfig::default();
        let cells = create_index(&source, None, &config)
            .unwrap()
            .query(&target, &conservative());

        let err = weights(&source, &other, &cells, &config).unwrap_err();
        assert!(matches!(err, GridWeightsError::InvalidInput(_)));
    }

    #[test]
    fn test_cancelled_query() {
        let source = grid(4, 4);
        let target = grid(2, 2);
        let config = RegridConfig::default();
        let token = CancellationToken::new();
        let index = create_index_with_cancel(&source, None, &config, &token).unwrap();

        token.cancel();
        assert!(matches!(
            index.query_with_cancel(&target, &conservative(), &token),
            Err(GridWeightsError::Cancelled)
        ));
        assert!(matches!(
            create_index_with_cancel(&source, None, &config, &token),
            Err(GridWeightsError::Cancelled)
        ));
    }
}
