// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bounding volumes used for shadow caster culling and projection fitting.

use super::{clamp, Mat3, Mat4, Vec3};

/// Shapes that can be projected onto an arbitrary direction.
pub trait AxisProjection {
    /// Returns the `(min, max)` interval of `dir · p` over every point `p` of
    /// the shape. `dir` is expected to be normalized.
    fn project_on_axis(&self, dir: Vec3) -> (f32, f32);
}

/// Represents an Axis-Aligned Bounding Box (AABB).
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Aabb {
    /// The corner of the box with the smallest coordinates on all axes.
    pub min: Vec3,
    /// The corner of the box with the largest coordinates on all axes.
    pub max: Vec3,
}

impl Aabb {
    /// An empty box, the neutral element of [`Aabb::merge`].
    pub const INVALID: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Creates a new `Aabb` from two corners in any order.
    #[inline]
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Creates an `Aabb` from a center point and its half-extents.
    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let h = half_extents.abs();
        Self {
            min: center - h,
            max: center + h,
        }
    }

    /// The smallest box containing all `points`, or `INVALID` for an empty slice.
    pub fn from_points(points: &[Vec3]) -> Self {
        points.iter().fold(Self::INVALID, |acc, p| acc.with_point(*p))
    }

    /// `true` when `min <= max` on every axis.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// The center point of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half the size of the box on each axis.
    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Returns a copy grown to include `p`.
    #[inline]
    pub fn with_point(self, p: Vec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    /// Returns the union of two boxes.
    #[inline]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::INVALID
    }
}

impl AxisProjection for Aabb {
    fn project_on_axis(&self, dir: Vec3) -> (f32, f32) {
        let d = dir.dot(self.center());
        let r = self.half_extents().dot(dir.abs());
        (d - r, d + r)
    }
}

/// An oriented bounding box: a center, half sizes along each local axis and
/// the local axes themselves (forward, left, up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obb {
    /// World-space center.
    pub center: Vec3,
    /// Half sizes along `axis.forward()`, `axis.left()` and `axis.up()`.
    pub extents: Vec3,
    /// Orthonormal local basis.
    pub axis: Mat3,
}

impl Obb {
    /// Creates a new box.
    pub fn new(center: Vec3, extents: Vec3, axis: Mat3) -> Self {
        Self {
            center,
            extents,
            axis,
        }
    }

    /// Wraps an axis-aligned box.
    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self::new(aabb.center(), aabb.half_extents(), Mat3::IDENTITY)
    }

    /// Places a local-space box into world space using `world`.
    ///
    /// Scale baked into `world` is moved into the extents so the axes stay
    /// unit length.
    pub fn from_aabb_transform(aabb: &Aabb, world: &Mat4) -> Self {
        let cols = [
            world.cols[0].truncate(),
            world.cols[1].truncate(),
            world.cols[2].truncate(),
        ];
        let scale = Vec3::new(cols[0].length(), cols[1].length(), cols[2].length());
        let half = aabb.half_extents();
        Self::new(
            world.transform_point(aabb.center()),
            half * scale,
            Mat3::from_cols(
                cols[0].normalize(),
                cols[1].normalize(),
                cols[2].normalize(),
            ),
        )
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let mut out = [Vec3::ZERO; 8];
        for (i, p) in out.iter_mut().enumerate() {
            let sx = if i & 1 == 0 { -1.0 } else { 1.0 };
            let sy = if i & 2 == 0 { -1.0 } else { 1.0 };
            let sz = if i & 4 == 0 { -1.0 } else { 1.0 };
            *p = self.center
                + self.axis
                    * Vec3::new(
                        sx * self.extents.x,
                        sy * self.extents.y,
                        sz * self.extents.z,
                    );
        }
        out
    }

    /// Normalized bounds of `shape` in this box's local space.
    ///
    /// Each axis of the returned box holds `(projection - center) / extent`
    /// clamped to `[-1, 1]`; index 0 is forward, 1 is left and 2 is up.
    pub fn projection_bounds<S: AxisProjection + ?Sized>(&self, shape: &S) -> Aabb {
        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for i in 0..3 {
            let dir = self.axis.cols[i];
            let (lo, hi) = shape.project_on_axis(dir);
            let c = self.center.dot(dir);
            let e = self.extents[i];
            min[i] = clamp((lo - c) / e, -1.0, 1.0);
            max[i] = clamp((hi - c) / e, -1.0, 1.0);
        }
        Aabb {
            min: Vec3::new(min[0], min[1], min[2]),
            max: Vec3::new(max[0], max[1], max[2]),
        }
    }
}

impl AxisProjection for Obb {
    fn project_on_axis(&self, dir: Vec3) -> (f32, f32) {
        let d = dir.dot(self.center);
        let r = self.extents.x * dir.dot(self.axis.cols[0]).abs()
            + self.extents.y * dir.dot(self.axis.cols[1]).abs()
            + self.extents.z * dir.dot(self.axis.cols[2]).abs();
        (d - r, d + r)
    }
}

/// A bounding sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// World-space center.
    pub center: Vec3,
    /// Radius, never negative.
    pub radius: f32,
}

impl Sphere {
    /// Creates a new sphere.
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

impl AxisProjection for Sphere {
    fn project_on_axis(&self, dir: Vec3) -> (f32, f32) {
        let d = dir.dot(self.center);
        (d - self.radius, d + self.radius)
    }
}

/// A plane `normal · p = dist`. Points with a positive signed distance are
/// on the outside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal pointing to the outside half-space.
    pub normal: Vec3,
    /// Distance from the origin along `normal`.
    pub dist: f32,
}

impl Plane {
    /// Plane through three points, normal given by `(b - a) × (c - a)`.
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Self {
        let normal = (b - a).cross(c - a).normalize();
        Self {
            normal,
            dist: normal.dot(a),
        }
    }

    /// Signed distance of `p` to the plane.
    #[inline]
    pub fn distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.dist
    }

    /// The same plane facing the other way.
    #[inline]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            dist: -self.dist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_aabb_projection_on_diagonal() {
        let aabb = Aabb::from_min_max(Vec3::new(-1.0, -1.0, -1.0), Vec3::ONE);
        let (lo, hi) = aabb.project_on_axis(Vec3::new(1.0, 1.0, 0.0).normalize());
        assert_abs_diff_eq!(lo, -2.0_f32.sqrt(), epsilon = 1e-5);
        assert_abs_diff_eq!(hi, 2.0_f32.sqrt(), epsilon = 1e-5);
    }

    #[test]
    fn test_aabb_merge_with_invalid_is_identity() {
        let a = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        assert_eq!(Aabb::INVALID.merge(&a), a);
        assert!(!Aabb::INVALID.is_valid());
        assert_eq!(Aabb::from_points(&a.corners()), a);
    }

    #[test]
    fn test_obb_from_transform_moves_scale_into_extents() {
        let aabb = Aabb::from_min_max(Vec3::new(-1.0, -1.0, -1.0), Vec3::ONE);
        let mut world = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
        world.cols[1] = world.cols[1] * 3.0;
        let obb = Obb::from_aabb_transform(&aabb, &world);
        assert_eq!(obb.center, Vec3::new(5.0, 0.0, 0.0));
        assert_abs_diff_eq!(obb.extents.y, 3.0);
        assert_abs_diff_eq!(obb.axis.left().length(), 1.0);
    }

    #[test]
    fn test_projection_bounds_are_normalized_and_clamped() {
        let light = Obb::new(Vec3::ZERO, Vec3::new(10.0, 4.0, 2.0), Mat3::IDENTITY);
        let inside = Sphere::new(Vec3::new(0.0, 2.0, 0.0), 1.0);
        let b = light.projection_bounds(&inside);
        assert_abs_diff_eq!(b.min.y, 0.25);
        assert_abs_diff_eq!(b.max.y, 0.75);
        assert_abs_diff_eq!(b.min.z, -0.5);

        let outside = Sphere::new(Vec3::new(0.0, 100.0, 0.0), 1.0);
        let b = light.projection_bounds(&outside);
        assert_eq!(b.min.y, 1.0);
        assert_eq!(b.max.y, 1.0);
    }

    #[test]
    fn test_plane_signed_distance() {
        let p = Plane::from_points(Vec3::ZERO, Vec3::X, Vec3::Y);
        assert_eq!(p.normal, Vec3::Z);
        assert_abs_diff_eq!(p.distance(Vec3::new(3.0, 3.0, 2.0)), 2.0);
        assert_abs_diff_eq!(p.flipped().distance(Vec3::new(3.0, 3.0, 2.0)), -2.0);
    }
}
