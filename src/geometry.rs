//! Polygon validation, orientation normalization, bounding boxes and areas.
//!
//! Every function takes the cell identifier alongside the polygon so that
//! failures name the offending cell. Orientation is normalized (exterior ring
//! counter-clockwise, holes clockwise) before any area or clipping work, so
//! the winding of caller-supplied polygons never changes a result.

use crate::error::{GridWeightsError, Result};
use geo::algorithm::orient::{Direction, Orient};
use geo::{Area, BoundingRect, Coord, LineString, Polygon};
use grid_weights_types::bbox::BoundingBox;
use rustc_hash::FxHashSet;
use std::ops::Index;
use std::sync::Arc;

/// Minimum number of distinct vertices in an exterior ring.
pub const MIN_RING_VERTICES: usize = 3;

fn ring_vertices(ring: &LineString<f64>) -> &[Coord<f64>] {
    let coords = ring.0.as_slice();
    match (coords.first(), coords.last()) {
        (Some(first), Some(last)) if coords.len() > 1 && first == last => {
            &coords[..coords.len() - 1]
        }
        _ => coords,
    }
}

fn distinct_vertices(ring: &LineString<f64>) -> usize {
    ring_vertices(ring)
        .iter()
        .map(|c| (c.x.to_bits(), c.y.to_bits()))
        .collect::<FxHashSet<_>>()
        .len()
}

/// Validates the structural preconditions of a cell polygon.
///
/// # Examples
///
/// ```
/// use grid_weights::geometry::validate;
/// use geo::polygon;
///
/// let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
/// assert!(validate(0, &square).is_ok());
///
/// let sliver = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 0.0, y: 0.0)];
/// assert!(validate(1, &sliver).is_err());
/// ```
pub fn validate(id: usize, polygon: &Polygon<f64>) -> Result<()> {
    let distinct = distinct_vertices(polygon.exterior());
    if distinct < MIN_RING_VERTICES {
        return Err(GridWeightsError::malformed(
            id,
            format!(
                "exterior ring has {} distinct vertices, need at least {}",
                distinct, MIN_RING_VERTICES
            ),
        ));
    }

    let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
    for (ring_idx, ring) in rings.enumerate() {
        if let Some(coord) = ring.coords().find(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(GridWeightsError::malformed(
                id,
                format!(
                    "ring {} has non-finite coordinate ({}, {})",
                    ring_idx, coord.x, coord.y
                ),
            ));
        }
    }

    Ok(())
}

/// Returns the polygon with canonical orientation: exterior ring
/// counter-clockwise, interior rings clockwise. The represented shape is
/// unchanged.
pub fn normalize(id: usize, polygon: &Polygon<f64>) -> Result<Polygon<f64>> {
    validate(id, polygon)?;
    Ok(polygon.orient(Direction::Default))
}

/// Axis-aligned bounding box of a valid polygon.
pub fn bounding_box(id: usize, polygon: &Polygon<f64>) -> Result<BoundingBox> {
    validate(id, polygon)?;
    polygon
        .bounding_rect()
        .map(BoundingBox::from_rect)
        .ok_or_else(|| GridWeightsError::malformed(id, "polygon has no extent"))
}

/// Planar area of a polygon, holes subtracted.
///
/// Computed with the signed shoelace formula on the normalized polygon, so
/// the result is non-negative regardless of input winding. Zero-area rings
/// (e.g. collinear vertices) yield `0.0` rather than an error.
pub fn area(id: usize, polygon: &Polygon<f64>) -> Result<f64> {
    let normalized = normalize(id, polygon)?;
    Ok(normalized.signed_area().max(0.0))
}

/// An immutable, ordered collection of cell polygons.
///
/// A cell's identifier is its 0-based position. Clones share the underlying
/// storage, so indexes and worker threads can hold the collection without
/// copying it.
#[derive(Debug, Clone, Default)]
pub struct GeometryCollection {
    polygons: Arc<[Polygon<f64>]>,
}

impl GeometryCollection {
    pub fn new(polygons: Vec<Polygon<f64>>) -> Self {
        Self {
            polygons: polygons.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Polygon<f64>> {
        self.polygons.get(id)
    }

    pub fn polygons(&self) -> &[Polygon<f64>] {
        &self.polygons
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Polygon<f64>> + DoubleEndedIterator {
        self.polygons.iter()
    }

    /// Validates every polygon, failing on the first malformed id.
    pub fn validate(&self) -> Result<()> {
        self.polygons
            .iter()
            .enumerate()
            .try_for_each(|(id, polygon)| validate(id, polygon))
    }

    /// Copy of the collection with every polygon oriented counter-clockwise.
    pub fn normalized(&self) -> Result<Self> {
        self.polygons
            .iter()
            .enumerate()
            .map(|(id, polygon)| normalize(id, polygon))
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    /// Bounding boxes for every cell, in id order.
    pub fn bounding_boxes(&self) -> Result<Vec<BoundingBox>> {
        self.polygons
            .iter()
            .enumerate()
            .map(|(id, polygon)| bounding_box(id, polygon))
            .collect()
    }

    /// Box covering the whole collection, `None` when empty.
    pub fn envelope(&self) -> Result<Option<BoundingBox>> {
        Ok(self
            .bounding_boxes()?
            .into_iter()
            .reduce(|acc, bbox| acc.merge(&bbox)))
    }
}

impl Index<usize> for GeometryCollection {
    type Output = Polygon<f64>;

    fn index(&self, id: usize) -> &Self::Output {
        &self.polygons[id]
    }
}

impl From<Vec<Polygon<f64>>> for GeometryCollection {
    fn from(polygons: Vec<Polygon<f64>>) -> Self {
        Self::new(polygons)
    }
}

impl FromIterator<Polygon<f64>> for GeometryCollection {
    fn from_iter<T: IntoIterator<Item = Polygon<f64>>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Axis-aligned rectangle polygon, counter-clockwise. Handy for regular
/// grids and tests.
pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            (min_x, min_y),
            (max_x, min_y),
            (max_x, max_y),
            (min_x, max_y),
        ]),
        vec![],
    )
}

/// Cell edges `min, ..., max`; the last edge is `max` exactly.
fn grid_edges(min: f64, max: f64, n: usize) -> Vec<f64> {
    let step = (max - min) / n as f64;
    (0..=n)
        .map(|i| if i == n { max } else { min + i as f64 * step })
        .collect()
}

/// Regular `nx` by `ny` grid of rectangular cells covering
/// `[min_x, max_x] x [min_y, max_y]`, in row-major order (x varies fastest).
///
/// Neighbouring cells share bit-identical edge coordinates.
pub fn regular_grid(
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    nx: usize,
    ny: usize,
) -> GeometryCollection {
    let xs = grid_edges(min_x, max_x, nx);
    let ys = grid_edges(min_y, max_y, ny);

    (0..ny)
        .flat_map(|j| {
            let (xs, ys) = (&xs, &ys);
            (0..nx).map(move |i| rectangle(xs[i], ys[j], xs[i + 1], ys[j + 1]))
        })
        .collect()
}
