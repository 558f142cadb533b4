//! Spatial indexing and conservative overlap weights for regridding between
//! irregular polygonal grids.
//!
//! ```rust
//! use grid_weights::compute::spatial::{QueryMode, SpatialIndex};
//! use grid_weights::compute::conservative_weights;
//! use grid_weights::geometry::{rectangle, GeometryCollection};
//! use grid_weights::RegridConfig;
//!
//! let source = GeometryCollection::new(vec![
//!     rectangle(0.0, 0.0, 0.5, 1.0),
//!     rectangle(0.5, 0.0, 1.0, 1.0),
//! ]);
//! let target = GeometryCollection::new(vec![rectangle(0.0, 0.0, 1.0, 1.0)]);
//!
//! let index = SpatialIndex::build(&source)?;
//! let candidates = index.query(target.polygons(), QueryMode::Overlaps);
//! let weights = conservative_weights(&source, &target, &candidates, &RegridConfig::default())?;
//!
//! assert!((weights.get(0, 0).unwrap() - 0.5).abs() < 1e-12);
//! assert!((weights.coverage(0) - 1.0).abs() < 1e-12);
//! # Ok::<(), grid_weights::GridWeightsError>(())
//! ```

pub mod algorithms;
pub mod cancel;
pub mod compute;
pub mod error;
pub mod geometry;
pub mod labeled;
pub mod regrid;

pub use algorithms::{Algorithm, AlgorithmOptions, Algorithms, VariableList};
pub use cancel::CancellationToken;
pub use error::{GridWeightsError, Result};
pub use geometry::GeometryCollection;
pub use labeled::LabeledGeometries;
pub use regrid::{IndexedCells, RegridIndex, Weights, create_index, weights};

pub use compute::{
    CandidateTable, PartitionPlan, PartitionedIndex, QueryMode, SpatialIndex, WeightEntry,
    WeightTable, conservative_weights,
};

pub use grid_weights_types::bbox::BoundingBox;
pub use grid_weights_types::config::RegridConfig;
pub use grid_weights_types::labels::Dimension;

pub use geo::{Polygon, Rect};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{GridWeightsError, Result};

    pub use geo::{Polygon, Rect};

    pub use crate::{Algorithm, Algorithms, RegridConfig};

    pub use crate::{GeometryCollection, LabeledGeometries, Dimension};

    pub use crate::{PartitionPlan, PartitionedIndex, QueryMode, SpatialIndex};

    pub use crate::{CancellationToken, WeightTable, create_index, weights};
}
