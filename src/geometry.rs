//! Planar contour geometry in patient millimetres.
//!
//! Points are in-plane coordinates of the slice they belong to: `x` is the
//! patient position projected on the row cosine, `y` projected on the column
//! cosine. For an axial slice these are the patient x and y.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

/// Minimum number of distinct vertices of a renderable polygon.
pub const MIN_POLYGON_VERTICES: usize = 3;

/// Vertices closer than this are treated as the same point.
pub const POINT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn lerp(self, other: Point2, t: f64) -> Point2 {
        Point2::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Implicitly closed ring: the last vertex connects back to the first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    points: Vec<Point2>,
}

impl Polygon {
    /// Builds a ring, dropping consecutive duplicates and an explicit
    /// closing vertex.
    pub fn new(points: Vec<Point2>) -> Self {
        let mut ring: Vec<Point2> = Vec::with_capacity(points.len());
        for point in points {
            if ring
                .last()
                .is_none_or(|last| !point.is_finite() || last.distance(point) > POINT_EPSILON)
            {
                ring.push(point);
            }
        }
        while ring.len() > 1
            && ring[0].distance(ring[ring.len() - 1]) <= POINT_EPSILON
        {
            ring.pop();
        }
        Self { points: ring }
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// At least three distinct finite vertices.
    pub fn is_valid(&self) -> bool {
        self.points.len() >= MIN_POLYGON_VERTICES && self.points.iter().all(|p| p.is_finite())
    }

    /// Shoelace area, positive for counter-clockwise rings.
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        if n < MIN_POLYGON_VERTICES {
            return 0.0;
        }
        let mut twice = 0.0;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            twice += a.x * b.y - b.x * a.y;
        }
        twice / 2.0
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Even-odd ray cast towards +x. An edge is crossed when one endpoint is
    /// strictly above the point and the other at or below it.
    pub fn contains(&self, point: Point2) -> bool {
        let n = self.points.len();
        if n < MIN_POLYGON_VERTICES {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let pi = self.points[i];
            let pj = self.points[j];
            if (pi.y > point.y) != (pj.y > point.y)
                && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// `(min, max)` corners, `None` for an empty ring.
    pub fn bounds(&self) -> Option<(Point2, Point2)> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (
                Point2::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point2::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }
}

/// True iff `point` is inside an odd number of `polygons`.
pub fn point_in_polygons(polygons: &[Polygon], point: Point2) -> bool {
    polygons.iter().filter(|polygon| polygon.contains(point)).count() % 2 == 1
}

/// Vertex count for a disk of `radius`: at least `min_segments`, and enough
/// that no edge is longer than `max_chord`.
pub fn disk_segments(radius: f64, min_segments: usize, max_chord: f64) -> usize {
    let by_chord = if max_chord > 0.0 && radius.is_finite() {
        (TAU * radius / max_chord).ceil() as usize
    } else {
        0
    };
    by_chord.clamp(min_segments, 256.max(min_segments))
}

/// Counter-clockwise regular polygon with all vertices at `radius` from
/// `center`.
pub fn regular_polygon(center: Point2, radius: f64, segments: usize) -> Polygon {
    let segments = segments.max(MIN_POLYGON_VERTICES);
    Polygon::new(
        (0..segments)
            .map(|i| {
                let angle = TAU * i as f64 / segments as f64;
                Point2::new(
                    center.x + radius * angle.cos(),
                    center.y + radius * angle.sin(),
                )
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Polygon {
        Polygon::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ])
    }

    #[test]
    fn test_point_in_unit_square() {
        let square = unit_square();
        assert!(square.contains(Point2::new(0.5, 0.5)));
        assert!(!square.contains(Point2::new(2.0, 2.0)));
        assert!(!square.contains(Point2::new(-0.5, 0.5)));
    }

    #[test]
    fn test_edge_points_are_stable() {
        let square = unit_square();
        for point in [
            Point2::new(0.5, 0.0),
            Point2::new(0.5, 1.0),
            Point2::new(0.0, 0.5),
            Point2::new(1.0, 0.5),
            Point2::new(0.0, 0.0),
        ] {
            let first = square.contains(point);
            for _ in 0..10 {
                assert_eq!(square.contains(point), first);
            }
        }
        // Half-open rule: bottom and left edges inside, top and right outside.
        assert!(square.contains(Point2::new(0.5, 0.0)));
        assert!(square.contains(Point2::new(0.0, 0.5)));
        assert!(!square.contains(Point2::new(0.5, 1.0)));
        assert!(!square.contains(Point2::new(1.0, 0.5)));
    }

    #[test]
    fn test_ring_normalisation() {
        let ring = Polygon::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 0.0),
        ]);
        assert_eq!(ring.len(), 3);
        assert!(ring.is_valid());
        assert_eq!(ring.area(), 2.0);
        assert!(!Polygon::new(vec![Point2::new(1.0, 1.0); 5]).is_valid());
    }

    #[test]
    fn test_even_odd_across_polygons() {
        let outer = Polygon::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ]);
        let hole = Polygon::new(vec![
            Point2::new(4.0, 4.0),
            Point2::new(6.0, 4.0),
            Point2::new(6.0, 6.0),
            Point2::new(4.0, 6.0),
        ]);
        let polygons = [outer, hole];
        assert!(point_in_polygons(&polygons, Point2::new(1.0, 1.0)));
        assert!(!point_in_polygons(&polygons, Point2::new(5.0, 5.0)));
        assert!(!point_in_polygons(&polygons, Point2::new(20.0, 5.0)));
    }

    #[test]
    fn test_regular_polygon() {
        let center = Point2::new(10.0, 10.0);
        let segments = disk_segments(2.0, 12, 1.0);
        assert!(segments >= 12);
        let disk = regular_polygon(center, 2.0, segments);
        assert_eq!(disk.len(), segments);
        assert!(disk.signed_area() > 0.0);
        for p in disk.points() {
            assert!((p.distance(center) - 2.0).abs() < 1e-9);
        }
        assert_eq!(disk_segments(0.5, 12, 1.0), 12);
        assert_eq!(disk_segments(1e9, 12, 1.0), 256);
    }
}
