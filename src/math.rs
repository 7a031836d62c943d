//! Mathematical structs and functions.

use cgmath::prelude::*;
use cgmath::{Point2, Vector2};

/// A 2D point
pub type Point2d = Point2<f64>;

/// A 2D vector
pub type Vector2d = Vector2<f64>;

/// An oriented rectangle, used for vehicle footprints.
#[derive(Clone, Copy, Debug)]
pub struct OrientedRect {
    /// The centre of the rectangle.
    pub centre: Point2d,
    /// A unit vector along the rectangle's long axis.
    pub axis: Vector2d,
    /// Half the extent along `axis`.
    pub half_len: f64,
    /// Half the extent across `axis`.
    pub half_wid: f64,
}

impl OrientedRect {
    /// The four corners of the rectangle.
    pub fn corners(&self) -> [Point2d; 4] {
        let lat = rot90(self.axis);
        let l = self.half_len * self.axis;
        let w = self.half_wid * lat;
        [
            self.centre + l + w,
            self.centre + l - w,
            self.centre - l - w,
            self.centre - l + w,
        ]
    }

    /// The axis-aligned bounds of the rectangle as `(min, max)` points.
    pub fn bounds(&self) -> (Point2d, Point2d) {
        let cs = self.corners();
        let mut min = cs[0];
        let mut max = cs[0];
        for c in &cs[1..] {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }
        (min, max)
    }

    /// Returns true if the rectangle overlaps the axis-aligned box `(min, max)`.
    ///
    /// Separating-axis test over the box axes and the rectangle axes.
    pub fn intersects_aabb(&self, min: Point2d, max: Point2d) -> bool {
        let (bmin, bmax) = self.bounds();
        if bmax.x <= min.x || max.x <= bmin.x || bmax.y <= min.y || max.y <= bmin.y {
            return false;
        }
        let box_corners = [
            Point2d::new(min.x, min.y),
            Point2d::new(max.x, min.y),
            Point2d::new(max.x, max.y),
            Point2d::new(min.x, max.y),
        ];
        for (axis, half) in [(self.axis, self.half_len), (rot90(self.axis), self.half_wid)] {
            let centre_proj = axis.dot(self.centre.to_vec());
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for c in box_corners {
                let p = axis.dot(c.to_vec());
                lo = lo.min(p);
                hi = hi.max(p);
            }
            if hi <= centre_proj - half || centre_proj + half <= lo {
                return false;
            }
        }
        true
    }
}

/// Rotates a vector 90 degrees counter-clockwise.
pub fn rot90(v: Vector2d) -> Vector2d {
    Vector2d::new(-v.y, v.x)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn axis_aligned_footprint() {
        let rect = OrientedRect {
            centre: Point2d::new(5.0, 5.0),
            axis: Vector2d::new(1.0, 0.0),
            half_len: 2.0,
            half_wid: 1.0,
        };
        assert!(rect.intersects_aabb(Point2d::new(6.0, 5.0), Point2d::new(8.0, 7.0)));
        assert!(!rect.intersects_aabb(Point2d::new(7.5, 5.0), Point2d::new(9.0, 7.0)));
        assert!(!rect.intersects_aabb(Point2d::new(5.0, 6.5), Point2d::new(8.0, 9.0)));
    }

    #[test]
    fn rotated_footprint() {
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let rect = OrientedRect {
            centre: Point2d::new(0.0, 0.0),
            axis: Vector2d::new(s, s),
            half_len: 2.0,
            half_wid: 0.5,
        };
        // A box near the corner of the AABB but outside the rotated rectangle.
        assert!(!rect.intersects_aabb(Point2d::new(-1.5, 1.0), Point2d::new(-1.0, 1.5)));
        // A box straddling the long axis.
        assert!(rect.intersects_aabb(Point2d::new(0.5, 0.5), Point2d::new(1.5, 1.5)));
    }
}
