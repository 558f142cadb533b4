//! Compute layer: broad-phase indexing and narrow-phase overlap weights.
//!
//! This module separates the geometric work from algorithm configuration and
//! the labeled-grid facade. It provides:
//! - Bounding-box R-tree indexes, single and partitioned
//! - Candidate tables produced by index queries
//! - Polygon clipping in f64 and conservative weight tables
//!
//! Nothing here knows about variables or dimension labels; callers address
//! cells by their integer ids.

mod clip;
pub mod overlap;
pub mod spatial;

pub use overlap::{WeightEntry, WeightTable, conservative_weights};
pub use spatial::{
    CandidateTable, PartitionPlan, PartitionedIndex, QueryMode, SpatialIndex,
};
