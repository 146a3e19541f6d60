//! Polygon boolean operations and offsets.
//!
//! Thin wrappers over `geo-clipper`. Coordinates are handed to clipper in
//! millimetres with a precision factor of 1000 (1 µm); results come back as
//! canonical expolygons (counter-clockwise contours, clockwise holes).
//! Clipper evaluates paths with the non-zero fill rule.

use crate::geometry::{ExPolygon, ExPolygons, Point, Polygon};
use crate::{scale, unscale, CoordF};
use geo::{Coord as GeoCoord, LineString, MultiPolygon, Polygon as GeoPolygon};
use geo_clipper::{Clipper, EndType, JoinType};

const CLIPPER_FACTOR: f64 = 1000.0;

/// Join type for offset corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetJoinType {
    Square,
    #[default]
    Round,
    Miter,
}

impl From<OffsetJoinType> for JoinType {
    fn from(jt: OffsetJoinType) -> Self {
        match jt {
            OffsetJoinType::Square => JoinType::Square,
            OffsetJoinType::Round => JoinType::Round(0.25),
            OffsetJoinType::Miter => JoinType::Miter(2.0),
        }
    }
}

fn ring_to_geo(points: &[Point]) -> LineString<f64> {
    let mut ring: Vec<GeoCoord<f64>> = points
        .iter()
        .map(|p| GeoCoord {
            x: unscale(p.x),
            y: unscale(p.y),
        })
        .collect();
    if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
        if first != last {
            ring.push(*first);
        }
    }
    LineString::new(ring)
}

fn geo_to_ring(line: &LineString<f64>) -> Polygon {
    let mut points: Vec<Point> = line
        .coords()
        .map(|c| Point::new(scale(c.x), scale(c.y)))
        .collect();
    // Our polygons are implicitly closed.
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    Polygon::from_points(points)
}

fn expolygon_to_geo(expoly: &ExPolygon) -> GeoPolygon<f64> {
    GeoPolygon::new(
        ring_to_geo(expoly.contour.points()),
        expoly.holes.iter().map(|h| ring_to_geo(h.points())).collect(),
    )
}

fn expolygons_to_geo(expolys: &[ExPolygon]) -> MultiPolygon<f64> {
    MultiPolygon::new(expolys.iter().map(expolygon_to_geo).collect())
}

fn polygons_to_geo(polys: &[Polygon]) -> MultiPolygon<f64> {
    MultiPolygon::new(
        polys
            .iter()
            .map(|p| GeoPolygon::new(ring_to_geo(p.points()), vec![]))
            .collect(),
    )
}

fn geo_to_expolygons(multi: &MultiPolygon<f64>) -> ExPolygons {
    multi
        .0
        .iter()
        .map(|poly| {
            let mut ex = ExPolygon::with_holes(
                geo_to_ring(poly.exterior()),
                poly.interiors().iter().map(geo_to_ring).collect(),
            );
            ex.make_canonical();
            ex
        })
        .filter(|ex| ex.contour.is_valid())
        .collect()
}

fn empty() -> MultiPolygon<f64> {
    MultiPolygon::new(vec![])
}

/// Union of two polygon sets.
pub fn union(subject: &[ExPolygon], clip: &[ExPolygon]) -> ExPolygons {
    if subject.is_empty() && clip.is_empty() {
        return vec![];
    }
    let result = expolygons_to_geo(subject).union(&expolygons_to_geo(clip), CLIPPER_FACTOR);
    geo_to_expolygons(&result)
}

/// Merge a set of possibly overlapping expolygons into disjoint ones.
pub fn union_ex(expolygons: &[ExPolygon]) -> ExPolygons {
    if expolygons.is_empty() {
        return vec![];
    }
    let result = expolygons_to_geo(expolygons).union(&empty(), CLIPPER_FACTOR);
    geo_to_expolygons(&result)
}

/// Build expolygons from loose rings with the non-zero fill rule.
///
/// A clockwise ring inside a counter-clockwise one becomes a hole; rings of
/// the same orientation merge.
pub fn union_polygons(polygons: &[Polygon]) -> ExPolygons {
    if polygons.is_empty() {
        return vec![];
    }
    let result = polygons_to_geo(polygons).union(&empty(), CLIPPER_FACTOR);
    geo_to_expolygons(&result)
}

pub fn intersection(subject: &[ExPolygon], clip: &[ExPolygon]) -> ExPolygons {
    if subject.is_empty() || clip.is_empty() {
        return vec![];
    }
    let result =
        expolygons_to_geo(subject).intersection(&expolygons_to_geo(clip), CLIPPER_FACTOR);
    geo_to_expolygons(&result)
}

/// `subject` minus `clip`.
pub fn difference(subject: &[ExPolygon], clip: &[ExPolygon]) -> ExPolygons {
    if subject.is_empty() {
        return vec![];
    }
    if clip.is_empty() {
        return subject.to_vec();
    }
    let result = expolygons_to_geo(subject).difference(&expolygons_to_geo(clip), CLIPPER_FACTOR);
    geo_to_expolygons(&result)
}

/// Offset one expolygon by `delta` mm; positive grows, negative shrinks.
pub fn offset_expolygon(
    expolygon: &ExPolygon,
    delta: CoordF,
    join_type: OffsetJoinType,
) -> ExPolygons {
    let result = expolygon_to_geo(expolygon).offset(
        delta,
        join_type.into(),
        EndType::ClosedPolygon,
        CLIPPER_FACTOR,
    );
    geo_to_expolygons(&result)
}

/// Offset a polygon set by `delta` mm; positive grows, negative shrinks.
pub fn offset_expolygons(
    expolygons: &[ExPolygon],
    delta: CoordF,
    join_type: OffsetJoinType,
) -> ExPolygons {
    if expolygons.is_empty() {
        return vec![];
    }
    let result = expolygons_to_geo(expolygons).offset(
        delta,
        join_type.into(),
        EndType::ClosedPolygon,
        CLIPPER_FACTOR,
    );
    geo_to_expolygons(&result)
}

/// Morphological closing: grow by `radius` mm and shrink back. Gaps and
/// cracks narrower than twice the radius disappear.
pub fn closing_ex(expolygons: &[ExPolygon], radius: CoordF) -> ExPolygons {
    if radius <= 0.0 || expolygons.is_empty() {
        return expolygons.to_vec();
    }
    let grown = offset_expolygons(expolygons, radius, OffsetJoinType::Miter);
    offset_expolygons(&grown, -radius, OffsetJoinType::Miter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::expolygons_area;

    fn square(x: f64, y: f64, size: f64) -> ExPolygon {
        ExPolygon::new(Polygon::rectangle(
            Point::new_scale(x, y),
            Point::new_scale(x + size, y + size),
        ))
    }

    fn area_mm2(ex: &[ExPolygon]) -> f64 {
        expolygons_area(ex) / (crate::SCALING_FACTOR * crate::SCALING_FACTOR)
    }

    #[test]
    fn test_union_overlapping() {
        let result = union_ex(&[square(0.0, 0.0, 10.0), square(5.0, 0.0, 10.0)]);
        assert_eq!(result.len(), 1);
        assert!((area_mm2(&result) - 150.0).abs() < 1e-6);
        assert!(result[0].is_canonical());
    }

    #[test]
    fn test_difference_makes_hole() {
        let result = difference(&[square(0.0, 0.0, 10.0)], &[square(2.0, 2.0, 2.0)]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].holes.len(), 1);
        assert!((area_mm2(&result) - 96.0).abs() < 1e-6);
        assert!(result[0].is_canonical());
    }

    #[test]
    fn test_intersection() {
        let result = intersection(&[square(0.0, 0.0, 10.0)], &[square(5.0, 5.0, 10.0)]);
        assert!((area_mm2(&result) - 25.0).abs() < 1e-6);
        assert!(intersection(&[square(0.0, 0.0, 1.0)], &[]).is_empty());
    }

    #[test]
    fn test_offset_sign_convention() {
        let sq = square(0.0, 0.0, 10.0);
        let grown = offset_expolygons(&[sq.clone()], 1.0, OffsetJoinType::Miter);
        let shrunk = offset_expolygons(&[sq], -1.0, OffsetJoinType::Miter);
        assert!((area_mm2(&grown) - 144.0).abs() < 1e-3);
        assert!((area_mm2(&shrunk) - 64.0).abs() < 1e-3);
    }

    #[test]
    fn test_union_polygons_nonzero_holes() {
        let outer = Polygon::rectangle(Point::new_scale(0.0, 0.0), Point::new_scale(10.0, 10.0));
        let inner =
            Polygon::rectangle(Point::new_scale(3.0, 3.0), Point::new_scale(7.0, 7.0)).reversed();
        let result = union_polygons(&[outer, inner]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].holes.len(), 1);
        assert!((area_mm2(&result) - 84.0).abs() < 1e-6);
    }

    #[test]
    fn test_closing_heals_crack() {
        // Two squares separated by a 2 µm crack.
        let a = square(0.0, 0.0, 5.0);
        let b = square(5.002, 0.0, 5.0);
        let closed = closing_ex(&[a.clone(), b.clone()], 0.005);
        assert_eq!(closed.len(), 1);
        assert_eq!(closing_ex(&[a.clone(), b], 0.0).len(), 2);
        assert_eq!(closing_ex(&[a.clone()], 0.0), vec![a]);
    }
}
