//! Bulk-loaded R-tree over the bounding boxes of one geometry collection.
//!
//! The index is the broad phase of regridding: it answers "which source cells
//! might touch this target cell" using bounding boxes only, in
//! O(log n + k) per query. It never computes exact polygon intersections, so
//! its answers are a superset of the true overlaps.
//!
//! ## Partition-local ids
//!
//! An index covers a contiguous id range `[offset, offset + len)` of its
//! collection. Internally cells are stored with partition-local ids
//! (`global - offset`); [`SpatialIndex::query`] translates them back to global
//! ids, [`SpatialIndex::query_local`] does not. An index built over a whole
//! collection has offset 0, so both agree.
//!
//! ## Example
//!
//! ```rust
//! use grid_weights::compute::spatial::{QueryMode, SpatialIndex};
//! use grid_weights::geometry::{rectangle, regular_grid};
//!
//! let source = regular_grid(0.0, 0.0, 4.0, 4.0, 4, 4);
//! let index = SpatialIndex::build(&source)?;
//!
//! let target = vec![rectangle(0.5, 0.5, 1.5, 1.5)];
//! let table = index.query(&target, QueryMode::Overlaps);
//! assert_eq!(table.candidates(0), &[0, 1, 4, 5]);
//! # Ok::<(), grid_weights::GridWeightsError>(())
//! ```

use super::candidates::{CandidateTable, QueryMode};
use crate::error::{GridWeightsError, Result};
use crate::geometry::{GeometryCollection, bounding_box};
use geo::Polygon;
use grid_weights_types::bbox::BoundingBox;
use rstar::{AABB, PointDistance, RTree, RTreeObject};
use std::ops::Range;

/// One cell's bounding box as stored in the R-tree.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedCell {
    /// Partition-local id
    pub id: usize,
    envelope: AABB<[f64; 2]>,
}

impl IndexedCell {
    pub fn new(id: usize, bbox: &BoundingBox) -> Self {
        let (min, max) = bbox.corners();
        Self {
            id,
            envelope: AABB::from_corners(min, max),
        }
    }
}

impl RTreeObject for IndexedCell {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for IndexedCell {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.envelope.distance_2(point)
    }
}

/// Read-only spatial index over one collection or one partition of it.
#[derive(Debug)]
pub struct SpatialIndex {
    collection: GeometryCollection,
    range: Range<usize>,
    tree: RTree<IndexedCell>,
}

impl SpatialIndex {
    /// Build an index over a whole collection.
    ///
    /// # Errors
    ///
    /// `MalformedGeometry` for the first polygon that fails validation.
    pub fn build(collection: &GeometryCollection) -> Result<Self> {
        Self::build_partition(collection, 0..collection.len())
    }

    /// Build an index over the id range `range` of `collection`.
    ///
    /// Errors name global ids.
    pub fn build_partition(collection: &GeometryCollection, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > collection.len() {
            return Err(GridWeightsError::InvalidPartitionPlan(format!(
                "range {:?} outside collection of {} cells",
                range,
                collection.len()
            )));
        }

        let cells = range
            .clone()
            .map(|id| {
                let bbox = bounding_box(id, &collection[id])?;
                Ok(IndexedCell::new(id - range.start, &bbox))
            })
            .collect::<Result<Vec<_>>>()?;

        let tree = RTree::bulk_load(cells);
        log::debug!(
            "Built spatial index over ids {}..{} ({} cells)",
            range.start,
            range.end,
            tree.size()
        );

        Ok(Self {
            collection: collection.clone(),
            range,
            tree,
        })
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// First global id covered by this index.
    pub fn offset(&self) -> usize {
        self.range.start
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// The collection the index was built over.
    pub fn collection(&self) -> &GeometryCollection {
        &self.collection
    }

    /// Box covering every indexed cell, `None` for an empty index.
    pub fn envelope(&self) -> Option<BoundingBox> {
        if self.is_empty() {
            return None;
        }
        let envelope = self.tree.root().envelope();
        let (min, max) = (envelope.lower(), envelope.upper());
        Some(BoundingBox::new(min[0], min[1], max[0], max[1]))
    }

    /// Candidates for each query polygon, with global source ids.
    ///
    /// Rows follow the order of `polygons`; ids within a row are ascending.
    /// Malformed query polygons and query polygons with a degenerate bounding
    /// box get an empty row.
    pub fn query(&self, polygons: &[Polygon<f64>], mode: QueryMode) -> CandidateTable {
        let rows = self.query_local(polygons, mode);
        CandidateTable::merge_partitions(mode, polygons.len(), [(self.offset(), rows)])
    }

    /// Like [`SpatialIndex::query`], but rows hold partition-local ids.
    pub fn query_local(&self, polygons: &[Polygon<f64>], mode: QueryMode) -> Vec<Vec<usize>> {
        polygons
            .iter()
            .enumerate()
            .map(|(id, polygon)| match bounding_box(id, polygon) {
                Ok(bbox) => self.candidates_for(&bbox, mode),
                Err(err) => {
                    log::debug!("Skipping query polygon: {}", err);
                    Vec::new()
                }
            })
            .collect()
    }

    /// Partition-local candidates for a single query box.
    pub fn candidates_for(&self, bbox: &BoundingBox, mode: QueryMode) -> Vec<usize> {
        if bbox.is_degenerate() {
            log::debug!("Skipping degenerate query box {:?}", bbox.corners());
            return Vec::new();
        }

        let (min, max) = bbox.corners();
        let query = AABB::from_corners(min, max);

        let mut ids: Vec<usize> = match mode {
            QueryMode::Overlaps => self
                .tree
                .locate_in_envelope_intersecting(&query)
                .map(|cell| cell.id)
                .collect(),
            QueryMode::Contains => self
                .tree
                .locate_in_envelope(&query)
                .map(|cell| cell.id)
                .collect(),
            QueryMode::Nearest => {
                let center = bbox.center();
                let mut nearest = self
                    .tree
                    .nearest_neighbor_iter_with_distance_2(&[center.x(), center.y()]);
                match nearest.next() {
                    Some((first, best)) => std::iter::once(first.id)
                        .chain(
                            nearest
                                .take_while(|(_, distance)| *distance <= best)
                                .map(|(cell, _)| cell.id),
                        )
                        .collect(),
                    None => Vec::new(),
                }
            }
        };

        // Tree traversal order is an implementation detail of rstar; build
        // order is the documented order.
        ids.sort_unstable();
        ids
    }
}
