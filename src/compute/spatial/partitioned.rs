//! Fan-out index over a source collection split into contiguous partitions.
//!
//! Large source grids arrive from the caller's partitioned-array layer as
//! chunks. Each chunk gets its own [`SpatialIndex`]; builds and queries run
//! per partition on the rayon thread pool and meet at a single ordered merge.
//!
//! ## Merge order
//!
//! ```text
//! plan:        [ p0: ids 0..4 ][ p1: ids 4..6 ][ p2: ids 6..9 ]
//! target t:      p0 -> [1, 3]    p1 -> [0]       p2 -> [2]
//! merged row:    [1, 3, 4, 8]
//! ```
//!
//! Rows are concatenated in ascending partition order and local ids shifted
//! by each partition's offset. Area sums downstream are order-sensitive, so
//! this order is fixed for a given plan regardless of which worker finishes
//! first.

use super::candidates::{CandidateTable, QueryMode};
use super::rtree::{IndexedCell, SpatialIndex};
use crate::cancel::CancellationToken;
use crate::error::{GridWeightsError, Result};
use crate::geometry::{GeometryCollection, bounding_box};
use geo::Polygon;
use grid_weights_types::config::RegridConfig;
use rayon::prelude::*;
use rstar::PointDistance;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Sizes of the contiguous id ranges a collection is split into.
///
/// Partitions cover the collection with no gaps or overlaps: partition `i`
/// starts where partition `i - 1` ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionPlan {
    sizes: Vec<usize>,
}

impl PartitionPlan {
    /// Plan from explicit chunk sizes, which must sum to `total`.
    pub fn new(sizes: Vec<usize>, total: usize) -> Result<Self> {
        let covered: usize = sizes.iter().sum();
        if covered != total {
            return Err(GridWeightsError::InvalidPartitionPlan(format!(
                "partition sizes cover {} ids, collection has {}",
                covered, total
            )));
        }
        Ok(Self { sizes })
    }

    /// Chunks of `chunk_size` ids, the last one possibly shorter.
    ///
    /// # Examples
    ///
    /// ```
    /// use grid_weights::compute::spatial::PartitionPlan;
    ///
    /// let plan = PartitionPlan::uniform(10, 4).unwrap();
    /// assert_eq!(plan.sizes(), &[4, 4, 2]);
    /// assert_eq!(plan.ranges(), vec![0..4, 4..8, 8..10]);
    /// ```
    pub fn uniform(total: usize, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(GridWeightsError::InvalidPartitionPlan(
                "chunk size must be positive".to_string(),
            ));
        }

        let mut sizes = vec![chunk_size; total / chunk_size];
        if total % chunk_size != 0 {
            sizes.push(total % chunk_size);
        }
        Ok(Self { sizes })
    }

    /// One partition covering everything.
    pub fn single(total: usize) -> Self {
        Self { sizes: vec![total] }
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Number of ids covered.
    pub fn total(&self) -> usize {
        self.sizes.iter().sum()
    }

    pub fn ranges(&self) -> Vec<Range<usize>> {
        let mut offset = 0;
        self.sizes
            .iter()
            .map(|&size| {
                let range = offset..offset + size;
                offset += size;
                range
            })
            .collect()
    }
}

#[derive(Debug)]
enum PartitionSlot {
    Built(SpatialIndex),
    Failed(GridWeightsError),
}

/// One [`SpatialIndex`] per partition of a source collection.
#[derive(Debug)]
pub struct PartitionedIndex {
    collection: GeometryCollection,
    plan: PartitionPlan,
    slots: Vec<PartitionSlot>,
    parallel: bool,
}

impl PartitionedIndex {
    /// Build one index per partition.
    ///
    /// With `config.strict` unset, a partition that fails to build is
    /// recorded as a `PartitionBuildFailure` and contributes no candidates;
    /// with it set, the failure of the lowest-numbered failed partition is
    /// returned.
    pub fn build(
        collection: &GeometryCollection,
        plan: &PartitionPlan,
        config: &RegridConfig,
    ) -> Result<Self> {
        Self::build_with_cancel(collection, plan, config, &CancellationToken::new())
    }

    /// Like [`PartitionedIndex::build`], abandoning the build with `Cancelled`
    /// once `token` is set.
    pub fn build_with_cancel(
        collection: &GeometryCollection,
        plan: &PartitionPlan,
        config: &RegridConfig,
        token: &CancellationToken,
    ) -> Result<Self> {
        if plan.total() != collection.len() {
            return Err(GridWeightsError::InvalidPartitionPlan(format!(
                "plan covers {} ids, collection has {}",
                plan.total(),
                collection.len()
            )));
        }

        let build_one = |range: Range<usize>| -> Option<Result<SpatialIndex>> {
            if token.is_cancelled() {
                return None;
            }
            Some(SpatialIndex::build_partition(collection, range))
        };

        let results: Vec<_> = if config.parallel {
            plan.ranges().into_par_iter().map(build_one).collect()
        } else {
            plan.ranges().into_iter().map(build_one).collect()
        };

        if token.is_cancelled() {
            log::debug!("Partitioned index build cancelled");
            return Err(GridWeightsError::Cancelled);
        }

        let mut slots = Vec::with_capacity(results.len());
        for (partition, result) in results.into_iter().enumerate() {
            match result {
                Some(Ok(index)) => slots.push(PartitionSlot::Built(index)),
                Some(Err(err)) => {
                    let failure = GridWeightsError::PartitionBuildFailure {
                        partition,
                        source: Box::new(err),
                    };
                    if config.strict {
                        return Err(failure);
                    }
                    log::warn!("Skipping partition: {}", failure);
                    slots.push(PartitionSlot::Failed(failure));
                }
                None => return Err(GridWeightsError::Cancelled),
            }
        }

        let index = Self {
            collection: collection.clone(),
            plan: plan.clone(),
            slots,
            parallel: config.parallel,
        };
        log::info!(
            "Built partitioned index: {} cells in {} partitions ({} failed)",
            index.len(),
            index.plan.len(),
            index.failures().len()
        );
        Ok(index)
    }

    /// Number of cells in the source collection.
    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    pub fn plan(&self) -> &PartitionPlan {
        &self.plan
    }

    pub fn collection(&self) -> &GeometryCollection {
        &self.collection
    }

    /// Per-partition indexes in partition order; `None` for failed ones.
    pub fn partitions(&self) -> impl Iterator<Item = Option<&SpatialIndex>> {
        self.slots.iter().map(|slot| match slot {
            PartitionSlot::Built(index) => Some(index),
            PartitionSlot::Failed(_) => None,
        })
    }

    /// Recorded build failures as `(partition, error)`.
    pub fn failures(&self) -> Vec<(usize, &GridWeightsError)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(partition, slot)| match slot {
                PartitionSlot::Failed(err) => Some((partition, err)),
                PartitionSlot::Built(_) => None,
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }

    /// Query every built partition and merge the rows in partition order.
    pub fn query(&self, polygons: &[Polygon<f64>], mode: QueryMode) -> CandidateTable {
        let indexes: Vec<&SpatialIndex> = self.partitions().flatten().collect();
        let query_one =
            |index: &SpatialIndex| (index.offset(), index.query_local(polygons, mode));

        let parts: Vec<_> = if self.parallel {
            indexes.into_par_iter().map(query_one).collect()
        } else {
            indexes.into_iter().map(query_one).collect()
        };
        self.finish(polygons, CandidateTable::merge_partitions(mode, polygons.len(), parts))
    }

    /// Like [`PartitionedIndex::query`], returning `Cancelled` once `token` is
    /// set. Partitions already queried are discarded.
    pub fn query_with_cancel(
        &self,
        polygons: &[Polygon<f64>],
        mode: QueryMode,
        token: &CancellationToken,
    ) -> Result<CandidateTable> {
        let indexes: Vec<&SpatialIndex> = self.partitions().flatten().collect();
        let query_one = |index: &SpatialIndex| -> Option<(usize, Vec<Vec<usize>>)> {
            if token.is_cancelled() {
                return None;
            }
            Some((index.offset(), index.query_local(polygons, mode)))
        };

        let parts: Vec<_> = if self.parallel {
            indexes.into_par_iter().map(query_one).collect()
        } else {
            indexes.into_iter().map(query_one).collect()
        };

        match parts.into_iter().collect::<Option<Vec<_>>>() {
            Some(parts) if !token.is_cancelled() => Ok(self.finish(
                polygons,
                CandidateTable::merge_partitions(mode, polygons.len(), parts),
            )),
            _ => Err(GridWeightsError::Cancelled),
        }
    }
}

impl PartitionedIndex {
    fn finish(&self, polygons: &[Polygon<f64>], table: CandidateTable) -> CandidateTable {
        match table.mode() {
            QueryMode::Nearest => self.nearest_overall(polygons, table),
            QueryMode::Overlaps | QueryMode::Contains => table,
        }
    }

    /// Each partition reports its own nearest cells; only those at the
    /// minimum distance across all partitions survive the merge.
    fn nearest_overall(&self, polygons: &[Polygon<f64>], table: CandidateTable) -> CandidateTable {
        let rows = table
            .into_rows()
            .into_iter()
            .zip(polygons)
            .enumerate()
            .map(|(t, (row, polygon))| {
                if row.len() < 2 {
                    return row;
                }
                let Ok(query) = bounding_box(t, polygon) else {
                    return Vec::new();
                };
                let center = query.center();
                let point = [center.x(), center.y()];

                let distances: Vec<f64> = row
                    .iter()
                    .map(|&id| {
                        bounding_box(id, &self.collection[id])
                            .map_or(f64::INFINITY, |bbox| IndexedCell::new(id, &bbox).distance_2(&point))
                    })
                    .collect();
                let best = distances.iter().copied().fold(f64::INFINITY, f64::min);

                row.into_iter()
                    .zip(distances)
                    .filter(|(_, distance)| *distance <= best)
                    .map(|(id, _)| id)
                    .collect()
            })
            .collect();
        CandidateTable::new(QueryMode::Nearest, rows)
    }
}
