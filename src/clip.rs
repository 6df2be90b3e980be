//! Boolean operations on even-odd polygon sets, backed by `geo`.
//!
//! A contour's polygons are interpreted with the even-odd rule, so they are
//! first folded into a single non-overlapping `MultiPolygon` by repeated
//! symmetric difference. Results are flattened back to plain rings: every
//! exterior and every hole becomes one polygon, which describes the same
//! region under the even-odd rule.

use std::panic::{self, AssertUnwindSafe};

use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon};
use thiserror::Error;

use crate::geometry::{Point2, Polygon};

/// Largest vertex magnitude (mm) handed to the clipper. Its predicates lose
/// the precision they need well before `f64` overflows.
pub const MAX_COORDINATE: f64 = 1e7;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClipError {
    #[error("Polygon boolean operation failed: {0}")]
    Numeric(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    Union,
    Difference,
}

fn to_geo_polygon(polygon: &Polygon) -> Result<geo::Polygon<f64>, ClipError> {
    let coords = polygon
        .points()
        .iter()
        .map(|p| {
            if p.x.abs() <= MAX_COORDINATE && p.y.abs() <= MAX_COORDINATE {
                Ok(Coord { x: p.x, y: p.y })
            } else {
                Err(ClipError::Numeric(format!(
                    "vertex ({:e}, {:e}) out of range",
                    p.x, p.y
                )))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(geo::Polygon::new(LineString::new(coords), vec![]))
}

fn ring_to_polygon(ring: &LineString<f64>) -> Polygon {
    Polygon::new(ring.coords().map(|c| Point2::new(c.x, c.y)).collect())
}

/// Runs a `geo` operation, turning a panic inside the clipper into an error.
fn guarded<F>(operation: F) -> Result<MultiPolygon<f64>, ClipError>
where
    F: FnOnce() -> MultiPolygon<f64>,
{
    let result = panic::catch_unwind(AssertUnwindSafe(operation)).map_err(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "clipper panicked".to_string());
        ClipError::Numeric(reason)
    })?;
    let finite = result
        .0
        .iter()
        .flat_map(|polygon| {
            std::iter::once(polygon.exterior()).chain(polygon.interiors().iter())
        })
        .flat_map(|ring| ring.coords())
        .all(|c| c.x.is_finite() && c.y.is_finite());
    if finite {
        Ok(result)
    } else {
        Err(ClipError::Numeric("non-finite output vertex".to_string()))
    }
}

/// Region covered by `polygons` under the even-odd rule. Invalid rings are
/// skipped.
pub fn to_region(polygons: &[Polygon]) -> Result<MultiPolygon<f64>, ClipError> {
    let mut region = MultiPolygon::new(vec![]);
    for polygon in polygons.iter().filter(|p| p.is_valid()) {
        let piece = MultiPolygon::new(vec![to_geo_polygon(polygon)?]);
        region = if region.0.is_empty() {
            piece
        } else {
            let current = region;
            guarded(|| current.xor(&piece))?
        };
    }
    Ok(region)
}

/// Union of possibly overlapping simple polygons.
pub fn union_all(pieces: &[Polygon]) -> Result<MultiPolygon<f64>, ClipError> {
    let mut region = MultiPolygon::new(vec![]);
    for polygon in pieces.iter().filter(|p| p.is_valid()) {
        let piece = MultiPolygon::new(vec![to_geo_polygon(polygon)?]);
        region = if region.0.is_empty() {
            piece
        } else {
            let current = region;
            guarded(|| current.union(&piece))?
        };
    }
    Ok(region)
}

/// Flattens a region to even-odd rings, dropping degenerate ones.
pub fn to_polygons(region: &MultiPolygon<f64>) -> Vec<Polygon> {
    region
        .0
        .iter()
        .flat_map(|polygon| {
            std::iter::once(polygon.exterior()).chain(polygon.interiors().iter())
        })
        .map(ring_to_polygon)
        .filter(|polygon| polygon.is_valid() && polygon.area() > 0.0)
        .collect()
}

pub fn region_area(region: &MultiPolygon<f64>) -> f64 {
    region.unsigned_area()
}

/// Applies `op` between the even-odd region of `existing` and `tool`.
pub fn apply(
    existing: &[Polygon],
    tool: &MultiPolygon<f64>,
    op: BooleanOp,
) -> Result<Vec<Polygon>, ClipError> {
    let subject = to_region(existing)?;
    let result = match op {
        BooleanOp::Union if subject.0.is_empty() => tool.clone(),
        BooleanOp::Difference if subject.0.is_empty() => subject,
        BooleanOp::Union => guarded(|| subject.union(tool))?,
        BooleanOp::Difference => guarded(|| subject.difference(tool))?,
    };
    Ok(to_polygons(&result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point_in_polygons;

    fn square(x0: f64, y0: f64, size: f64) -> Polygon {
        Polygon::new(vec![
            Point2::new(x0, y0),
            Point2::new(x0 + size, y0),
            Point2::new(x0 + size, y0 + size),
            Point2::new(x0, y0 + size),
        ])
    }

    fn area_of(polygons: &[Polygon]) -> f64 {
        region_area(&to_region(polygons).unwrap())
    }

    #[test]
    fn test_union_of_overlapping_squares() {
        let tool = union_all(&[square(5.0, 0.0, 10.0)]).unwrap();
        let merged = apply(&[square(0.0, 0.0, 10.0)], &tool, BooleanOp::Union).unwrap();
        assert_eq!(merged.len(), 1);
        assert!((area_of(&merged) - 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_difference_punches_hole() {
        let tool = union_all(&[square(4.0, 4.0, 2.0)]).unwrap();
        let result = apply(&[square(0.0, 0.0, 10.0)], &tool, BooleanOp::Difference).unwrap();
        assert_eq!(result.len(), 2);
        assert!((area_of(&result) - 96.0).abs() < 1e-6);
        assert!(!point_in_polygons(&result, Point2::new(5.0, 5.0)));
        assert!(point_in_polygons(&result, Point2::new(1.0, 1.0)));
    }

    #[test]
    fn test_difference_on_empty_is_empty() {
        let tool = union_all(&[square(0.0, 0.0, 1.0)]).unwrap();
        assert!(apply(&[], &tool, BooleanOp::Difference).unwrap().is_empty());
    }

    #[test]
    fn test_even_odd_region() {
        // Nested squares describe a ring-shaped region.
        let polygons = [square(0.0, 0.0, 10.0), square(2.0, 2.0, 6.0)];
        assert!((area_of(&polygons) - 64.0).abs() < 1e-6);
    }

    #[test]
    fn test_union_all_disjoint() {
        let region = union_all(&[square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)]).unwrap();
        assert_eq!(to_polygons(&region).len(), 2);
        assert!((region_area(&region) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_rings_are_skipped() {
        let bad = Polygon::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(f64::NAN, 0.0),
            Point2::new(1.0, 1.0),
        ]);
        assert!(union_all(&[bad]).unwrap().0.is_empty());
    }

    #[test]
    fn test_clipper_panic_becomes_error() {
        let result = guarded(|| panic!("sweep line lost its place"));
        assert_eq!(
            result,
            Err(ClipError::Numeric("sweep line lost its place".to_string()))
        );
    }

    #[test]
    fn test_non_finite_output_is_rejected() {
        let result = guarded(|| {
            let ring = LineString::from(vec![(0.0, 0.0), (f64::NAN, 1.0), (1.0, 1.0), (0.0, 0.0)]);
            MultiPolygon::new(vec![geo::Polygon::new(ring, vec![])])
        });
        assert_eq!(
            result,
            Err(ClipError::Numeric("non-finite output vertex".to_string()))
        );
    }

    #[test]
    fn test_out_of_range_vertices_are_rejected() {
        let huge = square(-1e12, -1e12, 2e12);
        assert!(matches!(to_region(&[huge.clone()]), Err(ClipError::Numeric(_))));
        let tool = union_all(&[square(0.0, 0.0, 1.0)]).unwrap();
        assert!(apply(&[huge.clone()], &tool, BooleanOp::Union).is_err());
        assert!(union_all(&[square(0.0, 0.0, 1.0), huge]).is_err());
        assert!(to_region(&[square(-1e6, -1e6, 2e6)]).is_ok());
    }
}
