use geo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// A 2D axis-aligned bounding box.
///
/// Used only for broad-phase filtering; it is never a proxy for the exact
/// overlap of the polygon it was derived from. This is a wrapper around
/// `geo::Rect` with the relations the spatial index needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// The underlying geometric rectangle
    pub rect: Rect,
}

impl BoundingBox {
    /// Create a new bounding box from minimum and maximum coordinates.
    ///
    /// Swapped corners are reordered by `geo::Rect`.
    ///
    /// # Examples
    ///
    /// ```
    /// use grid_weights_types::bbox::BoundingBox;
    ///
    /// let bbox = BoundingBox::new(-10.0, -5.0, 10.0, 5.0);
    /// assert_eq!(bbox.width(), 20.0);
    /// ```
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            rect: Rect::new(
                geo::coord! { x: min_x, y: min_y },
                geo::coord! { x: max_x, y: max_y },
            ),
        }
    }

    /// Create a bounding box from a `geo::Rect`.
    pub fn from_rect(rect: Rect) -> Self {
        Self { rect }
    }

    pub fn min_x(&self) -> f64 {
        self.rect.min().x
    }

    pub fn min_y(&self) -> f64 {
        self.rect.min().y
    }

    pub fn max_x(&self) -> f64 {
        self.rect.max().x
    }

    pub fn max_y(&self) -> f64 {
        self.rect.max().y
    }

    /// Corners as `[x, y]` arrays, the layout `rstar` envelopes use.
    pub fn corners(&self) -> ([f64; 2], [f64; 2]) {
        (
            [self.min_x(), self.min_y()],
            [self.max_x(), self.max_y()],
        )
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x() + self.max_x()) / 2.0,
            (self.min_y() + self.max_y()) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x() - self.min_x()
    }

    pub fn height(&self) -> f64 {
        self.max_y() - self.min_y()
    }

    /// A box is degenerate when any coordinate is non-finite or it has zero
    /// width or height. Degenerate query boxes never produce candidates.
    pub fn is_degenerate(&self) -> bool {
        let finite = [self.min_x(), self.min_y(), self.max_x(), self.max_y()]
            .iter()
            .all(|v| v.is_finite());

        !finite || self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Check if this bounding box intersects another. Shared edges count.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.max_x() < other.min_x()
            || self.min_x() > other.max_x()
            || self.max_y() < other.min_y()
            || self.min_y() > other.max_y())
    }

    /// Smallest box covering both boxes.
    pub fn merge(&self, other: &BoundingBox) -> Self {
        Self::new(
            self.min_x().min(other.min_x()),
            self.min_y().min(other.min_y()),
            self.max_x().max(other.max_x()),
            self.max_y().max(other.max_y()),
        )
    }
}
