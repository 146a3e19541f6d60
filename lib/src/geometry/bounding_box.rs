//! Axis-aligned bounding boxes.
//!
//! [`BoundingBox`] works on scaled 2D points (slice footprints), [`BoundingBox3F`]
//! on unscaled mesh coordinates.

use super::{Point, Point3F};
use crate::{Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 2D axis-aligned bounding box with scaled integer coordinates.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
    defined: bool,
}

impl BoundingBox {
    /// Create a new empty (undefined) bounding box.
    #[inline]
    pub fn new() -> Self {
        Self {
            min: Point::new(Coord::MAX, Coord::MAX),
            max: Point::new(Coord::MIN, Coord::MIN),
            defined: false,
        }
    }

    #[inline]
    pub fn from_points_minmax(min: Point, max: Point) -> Self {
        Self {
            min,
            max,
            defined: true,
        }
    }

    pub fn from_points(points: &[Point]) -> Self {
        let mut bb = Self::new();
        for p in points {
            bb.merge_point(*p);
        }
        bb
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        self.defined
    }

    pub fn merge_point(&mut self, p: Point) {
        if self.defined {
            self.min.x = self.min.x.min(p.x);
            self.min.y = self.min.y.min(p.y);
            self.max.x = self.max.x.max(p.x);
            self.max.y = self.max.y.max(p.y);
        } else {
            self.min = p;
            self.max = p;
            self.defined = true;
        }
    }

    pub fn merge(&mut self, other: &BoundingBox) {
        if other.defined {
            self.merge_point(other.min);
            self.merge_point(other.max);
        }
    }

    #[inline]
    pub fn width(&self) -> Coord {
        if self.defined {
            self.max.x - self.min.x
        } else {
            0
        }
    }

    #[inline]
    pub fn height(&self) -> Coord {
        if self.defined {
            self.max.y - self.min.y
        } else {
            0
        }
    }
}

impl fmt::Debug for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.defined {
            write!(f, "BoundingBox({:?} - {:?})", self.min, self.max)
        } else {
            write!(f, "BoundingBox(undefined)")
        }
    }
}

/// A 3D axis-aligned bounding box with floating-point coordinates (in mm).
#[derive(Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox3F {
    pub min: Point3F,
    pub max: Point3F,
    defined: bool,
}

impl BoundingBox3F {
    #[inline]
    pub fn new() -> Self {
        Self {
            min: Point3F::new(CoordF::MAX, CoordF::MAX, CoordF::MAX),
            max: Point3F::new(CoordF::MIN, CoordF::MIN, CoordF::MIN),
            defined: false,
        }
    }

    #[inline]
    pub fn from_points_minmax(min: Point3F, max: Point3F) -> Self {
        Self {
            min,
            max,
            defined: true,
        }
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        self.defined
    }

    pub fn merge_point(&mut self, p: Point3F) {
        if self.defined {
            self.min.x = self.min.x.min(p.x);
            self.min.y = self.min.y.min(p.y);
            self.min.z = self.min.z.min(p.z);
            self.max.x = self.max.x.max(p.x);
            self.max.y = self.max.y.max(p.y);
            self.max.z = self.max.z.max(p.z);
        } else {
            self.min = p;
            self.max = p;
            self.defined = true;
        }
    }

    pub fn merge(&mut self, other: &BoundingBox3F) {
        if other.defined {
            self.merge_point(other.min);
            self.merge_point(other.max);
        }
    }

    pub fn size(&self) -> Point3F {
        if self.defined {
            self.max - self.min
        } else {
            Point3F::zero()
        }
    }

    pub fn center(&self) -> Point3F {
        (self.min + self.max) * 0.5
    }

    /// XY footprint in scaled coordinates.
    pub fn to_2d_scaled(&self) -> BoundingBox {
        if !self.defined {
            return BoundingBox::new();
        }
        BoundingBox::from_points_minmax(self.min.to_2d_scaled(), self.max.to_2d_scaled())
    }
}

impl fmt::Debug for BoundingBox3F {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.defined {
            write!(f, "BoundingBox3F({} - {})", self.min, self.max)
        } else {
            write!(f, "BoundingBox3F(undefined)")
        }
    }
}

impl fmt::Display for BoundingBox3F {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} - {}]", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_merge() {
        let mut bb = BoundingBox::new();
        assert!(!bb.is_defined());
        bb.merge_point(Point::new(10, -5));
        bb.merge_point(Point::new(-3, 7));
        assert_eq!(bb.min, Point::new(-3, -5));
        assert_eq!(bb.max, Point::new(10, 7));
        assert_eq!(bb.width(), 13);
        assert_eq!(bb.height(), 12);
    }

    #[test]
    fn test_bbox3_merge_undefined_is_noop() {
        let mut bb = BoundingBox3F::from_points_minmax(
            Point3F::new(0.0, 0.0, 0.0),
            Point3F::new(1.0, 2.0, 3.0),
        );
        bb.merge(&BoundingBox3F::new());
        assert_eq!(bb.max, Point3F::new(1.0, 2.0, 3.0));
        assert_eq!(bb.size(), Point3F::new(1.0, 2.0, 3.0));
    }
}
