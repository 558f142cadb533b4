//! Error types for index construction, weight computation and algorithm
//! configuration.

use thiserror::Error;

/// Errors surfaced by grid-weights operations.
///
/// Geometry errors carry the identifier of the offending cell and are local
/// to it. Configuration errors are raised eagerly, before any index or weight
/// work starts.
#[derive(Debug, Error)]
pub enum GridWeightsError {
    /// A polygon is structurally invalid (fewer than three distinct vertices,
    /// non-finite coordinates).
    #[error("malformed geometry at id {id}: {reason}")]
    MalformedGeometry { id: usize, reason: String },

    /// A target polygon has zero area, so no weight can be derived for it.
    #[error("degenerate target at id {id}: zero area")]
    DegenerateTarget { id: usize },

    #[error("unknown algorithms: {}", .0.join(", "))]
    UnknownAlgorithm(Vec<String>),

    #[error("variables {} appear more than once", .0.join(", "))]
    DuplicateVariableAssignment(Vec<String>),

    #[error("no configuration for {} and no default set", .0.join(", "))]
    MissingConfiguration(Vec<String>),

    /// One partition of a partitioned index failed to build.
    #[error("failed to build index for partition {partition}: {source}")]
    PartitionBuildFailure {
        partition: usize,
        #[source]
        source: Box<GridWeightsError>,
    },

    #[error("invalid partition plan: {0}")]
    InvalidPartitionPlan(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl GridWeightsError {
    pub(crate) fn malformed(id: usize, reason: impl Into<String>) -> Self {
        Self::MalformedGeometry {
            id,
            reason: reason.into(),
        }
    }

    /// True for errors tied to a single cell rather than to the whole call.
    pub fn is_geometry_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedGeometry { .. } | Self::DegenerateTarget { .. }
        )
    }
}

impl From<serde_json::Error> for GridWeightsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(feature = "toml")]
impl From<toml::de::Error> for GridWeightsError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GridWeightsError>;
