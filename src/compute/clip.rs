//! Overlap areas by convex decomposition and Sutherland-Hodgman clipping.
//!
//! A target cell is ear-cut into triangles once. Every candidate source
//! ring is then clipped against each triangle, and the shoelace areas of the
//! clipped rings are summed. Sutherland-Hodgman is exact in area for a
//! non-convex subject as long as the clip region is convex; disjoint pieces
//! come out joined by zero-area bridges along the triangle edges.
//!
//! All coordinates are shifted to the target's lower-left corner first. Grid
//! cells in projected coordinates (e.g. `x ~ 5e5`) are small relative to
//! their position, and shoelace sums over absolute coordinates would lose
//! most of their significant digits to cancellation.

use geo::{Coord, LineString, MapCoords, Polygon, TriangulateEarcut};
use grid_weights_types::bbox::BoundingBox;

struct Piece {
    vertices: [Coord<f64>; 3],
    bbox: BoundingBox,
}

/// A target cell decomposed into counter-clockwise triangles in local
/// coordinates.
pub(crate) struct TargetPieces {
    origin: Coord<f64>,
    pieces: Vec<Piece>,
    area: f64,
}

fn cross(o: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Shoelace area of an open ring, orientation ignored.
fn ring_area(ring: &[Coord<f64>]) -> f64 {
    let Some(&last) = ring.last() else {
        return 0.0;
    };
    let mut previous = last;
    let mut twice = 0.0;
    for &current in ring {
        twice += previous.x * current.y - current.x * previous.y;
        previous = current;
    }
    (twice / 2.0).abs()
}

fn bbox_of(coords: &[Coord<f64>]) -> Option<BoundingBox> {
    let first = coords.first()?;
    let (mut min, mut max) = (*first, *first);
    for c in coords {
        min.x = min.x.min(c.x);
        min.y = min.y.min(c.y);
        max.x = max.x.max(c.x);
        max.y = max.y.max(c.y);
    }
    Some(BoundingBox::new(min.x, min.y, max.x, max.y))
}

/// Ring vertices without the closing duplicate, shifted by `-origin`.
fn local_ring(ring: &LineString<f64>, origin: Coord<f64>) -> Vec<Coord<f64>> {
    let coords = ring.0.as_slice();
    let open = match (coords.first(), coords.last()) {
        (Some(first), Some(last)) if coords.len() > 1 && first == last => {
            &coords[..coords.len() - 1]
        }
        _ => coords,
    };
    open.iter().map(|&c| c - origin).collect()
}

/// Clip `subject` against the half-planes left of each edge of a
/// counter-clockwise triangle.
fn clip_to_triangle(subject: &[Coord<f64>], triangle: &[Coord<f64>; 3]) -> Vec<Coord<f64>> {
    let mut output = subject.to_vec();
    for k in 0..3 {
        let Some(&last) = output.last() else {
            break;
        };
        let (a, b) = (triangle[k], triangle[(k + 1) % 3]);
        let input = std::mem::take(&mut output);

        let mut previous = last;
        let mut previous_side = cross(a, b, previous);
        for &current in &input {
            let side = cross(a, b, current);
            if side >= 0.0 {
                if previous_side < 0.0 {
                    output.push(crossing(previous, current, previous_side, side));
                }
                output.push(current);
            } else if previous_side >= 0.0 {
                output.push(crossing(previous, current, previous_side, side));
            }
            previous = current;
            previous_side = side;
        }
    }
    output
}

/// Point where segment `p -> q` crosses the clip line, given the signed
/// distances (scaled) of its endpoints. The signs of `dp` and `dq` differ.
fn crossing(p: Coord<f64>, q: Coord<f64>, dp: f64, dq: f64) -> Coord<f64> {
    let t = dp / (dp - dq);
    p + (q - p) * t
}

impl TargetPieces {
    /// Decompose a normalized target polygon. Interior rings are honoured by
    /// the triangulation.
    pub(crate) fn new(target: &Polygon<f64>) -> Self {
        let origin = bbox_of(&target.exterior().0)
            .map(|bbox| Coord {
                x: bbox.min_x(),
                y: bbox.min_y(),
            })
            .unwrap_or(Coord { x: 0.0, y: 0.0 });

        let local = target.map_coords(|c| c - origin);
        let mut area = 0.0;
        let pieces = local
            .earcut_triangles()
            .into_iter()
            .filter_map(|triangle| {
                let [a, b, c] = triangle.to_array();
                let twice = cross(a, b, c);
                if twice == 0.0 {
                    return None;
                }
                area += twice.abs() / 2.0;
                let vertices = if twice > 0.0 { [a, b, c] } else { [a, c, b] };
                let bbox = bbox_of(&vertices)?;
                Some(Piece { vertices, bbox })
            })
            .collect();

        Self {
            origin,
            pieces,
            area,
        }
    }

    /// Target area as the sum of its triangles.
    pub(crate) fn area(&self) -> f64 {
        self.area
    }

    /// Area of `source ∩ target`. `source` must be oriented (see
    /// [`crate::geometry::normalize`]) so its holes lie inside its exterior.
    pub(crate) fn overlap_area(&self, source: &Polygon<f64>) -> f64 {
        let exterior = local_ring(source.exterior(), self.origin);
        let Some(source_bbox) = bbox_of(&exterior) else {
            return 0.0;
        };
        let holes: Vec<Vec<Coord<f64>>> = source
            .interiors()
            .iter()
            .map(|ring| local_ring(ring, self.origin))
            .collect();

        let mut total = 0.0;
        for piece in &self.pieces {
            if !piece.bbox.intersects(&source_bbox) {
                continue;
            }
            let mut overlap = ring_area(&clip_to_triangle(&exterior, &piece.vertices));
            for hole in &holes {
                overlap -= ring_area(&clip_to_triangle(hole, &piece.vertices));
            }
            total += overlap.max(0.0);
        }
        total
    }
}
