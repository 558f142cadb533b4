//! Geometry collections annotated with the caller's grid dimensions.
//!
//! A regridding caller usually thinks of cells as positions on a labeled
//! N-dimensional grid (`lat` x `lon`, or a single unstructured `cell`
//! dimension). [`LabeledGeometries`] pairs a flat [`GeometryCollection`] with
//! that layout so results can be reported against labels instead of raw ids.

use crate::error::{GridWeightsError, Result};
use crate::geometry::GeometryCollection;
use grid_weights_types::labels::{self, Dimension};

/// A collection of cell polygons laid out row-major over named dimensions.
///
/// Invariant: the product of the dimension lengths equals the number of
/// polygons.
///
/// ```rust
/// use grid_weights::{Dimension, LabeledGeometries};
/// use grid_weights::geometry::regular_grid;
///
/// let cells = regular_grid(0.0, 0.0, 3.0, 2.0, 3, 2);
/// let grid = LabeledGeometries::new(
///     cells,
///     vec![
///         Dimension::new("y", vec![0.5, 1.5]),
///         Dimension::new("x", vec![0.5, 1.5, 2.5]),
///     ],
/// )?;
///
/// assert_eq!(grid.shape(), vec![2, 3]);
/// assert_eq!(grid.id_of(&[1.5, 0.5]), Some(3));
/// assert_eq!(grid.prefixed("target"), vec!["target_y", "target_x"]);
/// # Ok::<(), grid_weights::GridWeightsError>(())
/// ```
#[derive(Debug, Clone)]
pub struct LabeledGeometries<L> {
    collection: GeometryCollection,
    dimensions: Vec<Dimension<L>>,
}

impl<L> LabeledGeometries<L> {
    pub fn new(
        collection: impl Into<GeometryCollection>,
        dimensions: Vec<Dimension<L>>,
    ) -> Result<Self> {
        let collection = collection.into();
        let shape: Vec<usize> = dimensions.iter().map(Dimension::len).collect();

        if dimensions.is_empty() || labels::size(&shape) != collection.len() {
            return Err(GridWeightsError::InvalidInput(format!(
                "dimension shape {:?} does not match {} geometries",
                shape,
                collection.len()
            )));
        }

        Ok(Self {
            collection,
            dimensions,
        })
    }

    pub fn collection(&self) -> &GeometryCollection {
        &self.collection
    }

    pub fn dimensions(&self) -> &[Dimension<L>] {
        &self.dimensions
    }

    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.dimensions.iter().map(Dimension::len).collect()
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    /// Grid position of a cell id.
    pub fn unravel(&self, id: usize) -> Option<Vec<usize>> {
        labels::unravel(&self.shape(), id)
    }

    /// Labels of a cell id, one per dimension.
    pub fn labels_of(&self, id: usize) -> Option<Vec<&L>> {
        let index = self.unravel(id)?;
        Some(
            self.dimensions
                .iter()
                .zip(index)
                .map(|(dimension, position)| &dimension.labels[position])
                .collect(),
        )
    }

    /// Dimension names with a `{prefix}_` prefix, in dimension order.
    pub fn prefixed(&self, prefix: &str) -> Vec<String> {
        self.dimensions
            .iter()
            .map(|dimension| dimension.prefixed_name(prefix))
            .collect()
    }
}

impl<L: PartialEq> LabeledGeometries<L> {
    /// Cell id at the given labels, one per dimension.
    pub fn id_of(&self, labels: &[L]) -> Option<usize> {
        if labels.len() != self.dimensions.len() {
            return None;
        }

        let index = self
            .dimensions
            .iter()
            .zip(labels)
            .map(|(dimension, label)| dimension.labels.iter().position(|l| l == label))
            .collect::<Option<Vec<_>>>()?;
        labels::ravel(&self.shape(), &index)
    }
}

impl LabeledGeometries<usize> {
    /// A single unstructured dimension labeled by cell id.
    pub fn flat(name: impl Into<String>, collection: impl Into<GeometryCollection>) -> Self {
        let collection = collection.into();
        let labels = (0..collection.len()).collect();
        Self {
            collection,
            dimensions: vec![Dimension::new(name, labels)],
        }
    }
}
