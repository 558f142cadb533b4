//! Dimension metadata for mapping flat cell identifiers onto an N-dimensional
//! grid layout.
//!
//! Cells are laid out in row-major (C) order: the last dimension varies
//! fastest. A grid of shape `[2, 3]` has ids `0..6`, with id `4` at `[1, 1]`.

use serde::{Deserialize, Serialize};

/// A named grid dimension with one label per position along it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension<L> {
    pub name: String,
    pub labels: Vec<L>,
}

impl<L> Dimension<L> {
    pub fn new(name: impl Into<String>, labels: Vec<L>) -> Self {
        Self {
            name: name.into(),
            labels,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The dimension name with a `{prefix}_` prefix, e.g. `target_lat`.
    pub fn prefixed_name(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.name)
    }
}

/// Number of cells in a grid of the given shape. An empty shape is a scalar
/// grid holding one cell.
pub fn size(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Flatten an N-dimensional index into a cell id.
///
/// Returns `None` if the index rank differs from the shape or any component
/// is out of bounds.
///
/// # Examples
///
/// ```
/// use grid_weights_types::labels::ravel;
///
/// assert_eq!(ravel(&[2, 3], &[1, 1]), Some(4));
/// assert_eq!(ravel(&[2, 3], &[2, 0]), None);
/// ```
pub fn ravel(shape: &[usize], index: &[usize]) -> Option<usize> {
    if shape.len() != index.len() {
        return None;
    }

    let mut flat = 0usize;
    for (&extent, &position) in shape.iter().zip(index) {
        if position >= extent {
            return None;
        }
        flat = flat * extent + position;
    }
    Some(flat)
}

/// Expand a cell id into its N-dimensional index. Inverse of [`ravel`].
pub fn unravel(shape: &[usize], mut flat: usize) -> Option<Vec<usize>> {
    if flat >= size(shape) {
        return None;
    }

    let mut index = vec![0; shape.len()];
    for (slot, &extent) in index.iter_mut().zip(shape).rev() {
        *slot = flat % extent;
        flat /= extent;
    }
    Some(index)
}
