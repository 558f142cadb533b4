//! Broad-phase spatial indexing.

pub mod candidates;
pub mod partitioned;
pub mod rtree;

pub use candidates::{CandidateTable, QueryMode};
pub use partitioned::{PartitionPlan, PartitionedIndex};
pub use rtree::{IndexedCell, SpatialIndex};
