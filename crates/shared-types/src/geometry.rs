//! Geometry queries over selections
//!
//! Free functions dispatching on the selection kind. Oriented shapes
//! (linear, rectangular, elliptical) rotate by `angle` about `start`.

use crate::selections::{Axis, Point2, SelectionDescriptor, SelectionShape};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Distance under which a point counts as lying on a zero-area shape
const ON_SHAPE_TOLERANCE: f64 = 1e-9;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point2,
    pub max: Point2,
}

impl Rect {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point2>) -> Option<Rect> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut rect = Rect {
            min: *first,
            max: *first,
        };
        for p in iter {
            rect.min = [rect.min[0].min(p[0]), rect.min[1].min(p[1])];
            rect.max = [rect.max[0].max(p[0]), rect.max[1].max(p[1])];
        }
        Some(rect)
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    pub fn contains(&self, p: Point2) -> bool {
        p[0] >= self.min[0] && p[0] <= self.max[0] && p[1] >= self.min[1] && p[1] <= self.max[1]
    }
}

fn rotate(v: Point2, angle: f64) -> Point2 {
    let (s, c) = angle.sin_cos();
    [c * v[0] - s * v[1], s * v[0] + c * v[1]]
}

fn add(a: Point2, b: Point2) -> Point2 {
    [a[0] + b[0], a[1] + b[1]]
}

fn sub(a: Point2, b: Point2) -> Point2 {
    [a[0] - b[0], a[1] - b[1]]
}

/// Coordinates of `p` in the frame anchored at `origin` rotated by `angle`
fn to_local(origin: Point2, angle: f64, p: Point2) -> Point2 {
    rotate(sub(p, origin), -angle)
}

fn distance_to_segment(p: Point2, a: Point2, b: Point2) -> f64 {
    let ab = sub(b, a);
    let ap = sub(p, a);
    let len2 = ab[0] * ab[0] + ab[1] * ab[1];
    let t = if len2 == 0.0 {
        0.0
    } else {
        ((ap[0] * ab[0] + ap[1] * ab[1]) / len2).clamp(0.0, 1.0)
    };
    let closest = [a[0] + t * ab[0], a[1] + t * ab[1]];
    let d = sub(p, closest);
    d[0].hypot(d[1])
}

/// Even-odd rule
fn polygon_contains(points: &[Point2], p: Point2) -> bool {
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (pi, pj) = (points[i], points[j]);
        if (pi[1] > p[1]) != (pj[1] > p[1]) {
            let x = pi[0] + (p[1] - pi[1]) * (pj[0] - pi[0]) / (pj[1] - pi[1]);
            if p[0] < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn on_polyline(points: &[Point2], p: Point2) -> bool {
    if points.len() == 1 {
        return distance_to_segment(p, points[0], points[0]) <= ON_SHAPE_TOLERANCE;
    }
    points
        .windows(2)
        .any(|w| distance_to_segment(p, w[0], w[1]) <= ON_SHAPE_TOLERANCE)
}

/// Corner points of a rectangular selection, anticlockwise from `start`
pub fn rectangle_corners(start: Point2, lengths: [f64; 2], angle: f64) -> [Point2; 4] {
    [
        start,
        add(start, rotate([lengths[0], 0.0], angle)),
        add(start, rotate(lengths, angle)),
        add(start, rotate([0.0, lengths[1]], angle)),
    ]
}

/// Point at the far end of the selection from `start`
pub fn end_point(selection: &SelectionDescriptor) -> Point2 {
    let start = selection.start;
    match &selection.shape {
        SelectionShape::Point => start,
        SelectionShape::Axial { length, dimension } => match dimension {
            Axis::X => [start[0] + length, start[1]],
            Axis::Y => [start[0], start[1] + length],
        },
        SelectionShape::Linear { length, angle } => add(start, rotate([*length, 0.0], *angle)),
        SelectionShape::Rectangular { lengths, angle } => add(start, rotate(*lengths, *angle)),
        SelectionShape::Polygonal { points, .. } => points.last().copied().unwrap_or(start),
        SelectionShape::Circular { radius } => [start[0] + radius, start[1]],
        SelectionShape::Elliptical { semi_axes, angle } => {
            add(start, rotate([semi_axes[0], 0.0], *angle))
        }
        SelectionShape::Sectorial { radii, angles } => {
            add(start, rotate([radii[1], 0.0], angles[1]))
        }
    }
}

/// Axis-aligned box enclosing the selection
///
/// Axial selections are unbounded across their dimension. Sectorial
/// selections report the box of their outer circle.
pub fn bounding_box(selection: &SelectionDescriptor) -> Rect {
    let start = selection.start;
    let centred = |hx: f64, hy: f64| Rect {
        min: [start[0] - hx, start[1] - hy],
        max: [start[0] + hx, start[1] + hy],
    };
    let spanning = |a: Point2, b: Point2| Rect {
        min: [a[0].min(b[0]), a[1].min(b[1])],
        max: [a[0].max(b[0]), a[1].max(b[1])],
    };

    match &selection.shape {
        SelectionShape::Point => Rect {
            min: start,
            max: start,
        },
        SelectionShape::Axial { dimension, .. } => {
            let end = end_point(selection);
            let mut rect = spanning(start, end);
            let other = match dimension {
                Axis::X => 1,
                Axis::Y => 0,
            };
            rect.min[other] = f64::NEG_INFINITY;
            rect.max[other] = f64::INFINITY;
            rect
        }
        SelectionShape::Linear { .. } => spanning(start, end_point(selection)),
        SelectionShape::Rectangular { lengths, angle } => {
            let corners = rectangle_corners(start, *lengths, *angle);
            Rect::from_points(corners.iter()).unwrap_or_else(|| spanning(start, start))
        }
        SelectionShape::Polygonal { points, .. } => {
            Rect::from_points(points.iter()).unwrap_or_else(|| spanning(start, start))
        }
        SelectionShape::Circular { radius } => centred(*radius, *radius),
        SelectionShape::Elliptical { semi_axes, angle } => {
            let (s, c) = angle.sin_cos();
            let [a, b] = *semi_axes;
            let hx = ((a * c).powi(2) + (b * s).powi(2)).sqrt();
            let hy = ((a * s).powi(2) + (b * c).powi(2)).sqrt();
            centred(hx, hy)
        }
        SelectionShape::Sectorial { radii, .. } => centred(radii[1], radii[1]),
    }
}

/// Whether `p` lies inside (or, for zero-area shapes, on) the selection
pub fn contains(selection: &SelectionDescriptor, p: Point2) -> bool {
    let start = selection.start;
    match &selection.shape {
        SelectionShape::Point => distance_to_segment(p, start, start) <= ON_SHAPE_TOLERANCE,
        SelectionShape::Axial { dimension, .. } => {
            let end = end_point(selection);
            let d = dimension.index();
            let (lo, hi) = (start[d].min(end[d]), start[d].max(end[d]));
            p[d] >= lo && p[d] <= hi
        }
        SelectionShape::Linear { .. } => {
            distance_to_segment(p, start, end_point(selection)) <= ON_SHAPE_TOLERANCE
        }
        SelectionShape::Rectangular { lengths, angle } => {
            let local = to_local(start, *angle, p);
            local[0] >= 0.0 && local[0] <= lengths[0] && local[1] >= 0.0 && local[1] <= lengths[1]
        }
        SelectionShape::Polygonal { points, closed } => {
            if *closed && points.len() >= 3 {
                polygon_contains(points, p)
            } else {
                on_polyline(points, p)
            }
        }
        SelectionShape::Circular { radius } => {
            let d = sub(p, start);
            d[0].hypot(d[1]) <= *radius
        }
        SelectionShape::Elliptical { semi_axes, angle } => {
            let [a, b] = *semi_axes;
            if a == 0.0 || b == 0.0 {
                return false;
            }
            let local = to_local(start, *angle, p);
            (local[0] / a).powi(2) + (local[1] / b).powi(2) <= 1.0
        }
        SelectionShape::Sectorial { radii, angles } => {
            let d = sub(p, start);
            let r = d[0].hypot(d[1]);
            if r < radii[0] || r > radii[1] {
                return false;
            }
            let sweep = angles[1] - angles[0];
            if sweep.abs() >= TAU {
                return true;
            }
            let theta = d[1].atan2(d[0]);
            (theta - angles[0]).rem_euclid(TAU) <= sweep.rem_euclid(TAU)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn selection(start: Point2, shape: SelectionShape) -> SelectionDescriptor {
        SelectionDescriptor::new("00000001", start, shape).unwrap()
    }

    fn close(a: Point2, b: Point2) -> bool {
        (a[0] - b[0]).abs() < 1e-9 && (a[1] - b[1]).abs() < 1e-9
    }

    #[test]
    fn test_rectangle_contains() {
        let rect = selection(
            [1.0, 1.0],
            SelectionShape::Rectangular {
                lengths: [2.0, 1.0],
                angle: 0.0,
            },
        );
        assert!(contains(&rect, [2.0, 1.5]));
        assert!(contains(&rect, [3.0, 2.0]));
        assert!(!contains(&rect, [3.5, 1.5]));
        assert!(!contains(&rect, [0.5, 1.5]));
    }

    #[test]
    fn test_rotated_rectangle() {
        let rect = selection(
            [0.0, 0.0],
            SelectionShape::Rectangular {
                lengths: [2.0, 1.0],
                angle: FRAC_PI_2,
            },
        );
        // rotated a quarter turn the long side runs up the y axis
        assert!(contains(&rect, [-0.5, 1.5]));
        assert!(!contains(&rect, [1.5, 0.5]));
        assert!(close(end_point(&rect), [-1.0, 2.0]));

        let bbox = bounding_box(&rect);
        assert!(close(bbox.min, [-1.0, 0.0]));
        assert!(close(bbox.max, [0.0, 2.0]));
    }

    #[test]
    fn test_polygon_contains() {
        let square = selection(
            [0.0, 0.0],
            SelectionShape::Polygonal {
                points: vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]],
                closed: true,
            },
        );
        assert!(contains(&square, [2.0, 2.0]));
        assert!(!contains(&square, [5.0, 2.0]));

        let bbox = bounding_box(&square);
        assert_eq!(bbox.width(), 4.0);
        assert_eq!(bbox.height(), 4.0);

        let polyline = selection(
            [0.0, 0.0],
            SelectionShape::Polygonal {
                points: vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0]],
                closed: false,
            },
        );
        assert!(contains(&polyline, [2.0, 0.0]));
        assert!(!contains(&polyline, [2.0, 2.0]));
        assert_eq!(end_point(&polyline), [4.0, 4.0]);
    }

    #[test]
    fn test_axial_selection() {
        let band = selection(
            [2.0, 0.0],
            SelectionShape::Axial {
                length: 3.0,
                dimension: Axis::X,
            },
        );
        assert!(contains(&band, [4.0, 1e6]));
        assert!(!contains(&band, [6.0, 0.0]));

        let bbox = bounding_box(&band);
        assert_eq!(bbox.min[0], 2.0);
        assert_eq!(bbox.max[0], 5.0);
        assert_eq!(bbox.min[1], f64::NEG_INFINITY);
    }

    #[test]
    fn test_linear_and_point() {
        let line = selection(
            [0.0, 0.0],
            SelectionShape::Linear {
                length: 2.0,
                angle: 0.0,
            },
        );
        assert!(contains(&line, [1.0, 0.0]));
        assert!(!contains(&line, [1.0, 0.1]));

        let point = selection([3.0, 4.0], SelectionShape::Point);
        assert!(contains(&point, [3.0, 4.0]));
        assert_eq!(bounding_box(&point).width(), 0.0);
    }

    #[test]
    fn test_circle_and_ellipse() {
        let circle = selection([0.0, 0.0], SelectionShape::Circular { radius: 1.0 });
        assert!(contains(&circle, [0.6, 0.6]));
        assert!(!contains(&circle, [0.8, 0.8]));

        let ellipse = selection(
            [0.0, 0.0],
            SelectionShape::Elliptical {
                semi_axes: [2.0, 1.0],
                angle: FRAC_PI_2,
            },
        );
        assert!(contains(&ellipse, [0.0, 1.9]));
        assert!(!contains(&ellipse, [1.9, 0.0]));
        let bbox = bounding_box(&ellipse);
        assert!(close(bbox.max, [1.0, 2.0]));
    }

    #[test]
    fn test_sector() {
        let sector = selection(
            [0.0, 0.0],
            SelectionShape::Sectorial {
                radii: [1.0, 2.0],
                angles: [0.0, FRAC_PI_2],
            },
        );
        assert!(contains(&sector, [1.0, 1.0]));
        assert!(!contains(&sector, [-1.0, 1.0]));
        assert!(!contains(&sector, [0.5, 0.5]));
    }
}
