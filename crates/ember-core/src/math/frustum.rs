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

//! A pyramidal view volume described in its own local frame.
//!
//! A [`Frustum`] starts at `origin`, looks along `axis.forward()` and spans
//! `[near, far]` along that axis. `left` and `up` are the half sizes of the far
//! plane, so the half size at any distance `d` is `left * d / far`.

use super::{clamp, degrees_to_radians, Aabb, AxisProjection, Mat3, Obb, Plane, Sphere, Vec3};
use super::EPSILON;

/// A perspective view volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Apex of the pyramid.
    pub origin: Vec3,
    /// Orientation (forward, left, up).
    pub axis: Mat3,
    /// Distance to the near plane.
    pub near: f32,
    /// Distance to the far plane.
    pub far: f32,
    /// Half width of the far plane.
    pub left: f32,
    /// Half height of the far plane.
    pub up: f32,
}

impl Frustum {
    /// Creates a frustum from its raw parameters.
    pub fn new(origin: Vec3, axis: Mat3, near: f32, far: f32, left: f32, up: f32) -> Self {
        Self {
            origin,
            axis,
            near,
            far,
            left,
            up,
        }
    }

    /// Creates a frustum from horizontal and vertical field of view in degrees.
    pub fn from_fov(
        origin: Vec3,
        axis: Mat3,
        x_fov_deg: f32,
        y_fov_deg: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let left = far * degrees_to_radians(x_fov_deg * 0.5).tan();
        let up = far * degrees_to_radians(y_fov_deg * 0.5).tan();
        Self::new(origin, axis, near, far, left, up)
    }

    /// Moves the near plane, keeping the pyramid slope.
    #[inline]
    pub fn move_near(&mut self, near: f32) {
        self.near = near;
    }

    /// Moves the far plane, rescaling `left` and `up` so the slope is kept.
    pub fn move_far(&mut self, far: f32) {
        let scale = far / self.far;
        self.left *= scale;
        self.up *= scale;
        self.far = far;
    }

    /// The four near corners followed by the four far corners.
    pub fn corners(&self) -> [Vec3; 8] {
        let fwd = self.axis.forward();
        let l = self.axis.left();
        let u = self.axis.up();
        let near_scale = self.near / self.far;
        let mut out = [Vec3::ZERO; 8];
        for (i, p) in out.iter_mut().enumerate() {
            let (dist, scale) = if i < 4 {
                (self.near, near_scale)
            } else {
                (self.far, 1.0)
            };
            let sl = if i & 1 == 0 { 1.0 } else { -1.0 };
            let su = if i & 2 == 0 { 1.0 } else { -1.0 };
            *p = self.origin
                + fwd * dist
                + l * (sl * self.left * scale)
                + u * (su * self.up * scale);
        }
        out
    }

    /// The six bounding planes, normals pointing outwards.
    pub fn planes(&self) -> [Plane; 6] {
        let fwd = self.axis.forward();
        let c = self.corners();
        let inside = self.origin + fwd * ((self.near + self.far) * 0.5);
        let side = |a: Vec3, b: Vec3| {
            let p = Plane::from_points(self.origin, a, b);
            if p.distance(inside) > 0.0 {
                p.flipped()
            } else {
                p
            }
        };
        [
            Plane {
                normal: -fwd,
                dist: -(fwd.dot(self.origin) + self.near),
            },
            Plane {
                normal: fwd,
                dist: fwd.dot(self.origin) + self.far,
            },
            side(c[4], c[6]),
            side(c[5], c[7]),
            side(c[4], c[5]),
            side(c[6], c[7]),
        ]
    }

    /// `true` when every point lies outside one of the planes.
    ///
    /// The test is conservative: some sets outside the volume are kept.
    pub fn cull_points(&self, points: &[Vec3]) -> bool {
        self.planes()
            .iter()
            .any(|plane| points.iter().all(|p| plane.distance(*p) > 0.0))
    }

    /// Conservative box culling.
    pub fn cull_aabb(&self, aabb: &Aabb) -> bool {
        !aabb.is_valid() || self.cull_points(&aabb.corners())
    }

    /// Conservative oriented box culling.
    pub fn cull_obb(&self, obb: &Obb) -> bool {
        self.cull_points(&obb.corners())
    }

    /// Conservative culling of another frustum.
    pub fn cull_frustum(&self, other: &Frustum) -> bool {
        self.cull_points(&other.corners())
    }

    /// The smallest sphere centered on the forward axis that holds the frustum.
    pub fn to_minimum_sphere(&self) -> Sphere {
        let u = self.up / self.far;
        let r = self.left / self.far;
        let k = u * u + r * r;
        let s = (self.near + self.far) * 0.5 * (1.0 + k);
        let (dist, radius) = if s >= self.far {
            (self.far, self.far * k.sqrt())
        } else {
            let diff = 1.0 - s / self.far;
            (s, self.far * (diff * diff + k).sqrt())
        };
        Sphere::new(self.origin + self.axis.forward() * dist, radius)
    }

    /// Perspective bounds of `points` in this frustum's `[-1, 1]` left/up
    /// space. Index 0 holds the forward distance range.
    ///
    /// A point at or behind the apex widens the bounds to the full range.
    pub fn projection_bounds(&self, points: &[Vec3]) -> Aabb {
        let fwd = self.axis.forward();
        let l = self.axis.left();
        let u = self.axis.up();
        let mut bounds = Aabb::INVALID;
        for p in points {
            let rel = *p - self.origin;
            let d = fwd.dot(rel);
            if d <= EPSILON {
                bounds = bounds
                    .with_point(Vec3::new(d, -1.0, -1.0))
                    .with_point(Vec3::new(d, 1.0, 1.0));
                continue;
            }
            let x = l.dot(rel) / d * self.far / self.left;
            let y = u.dot(rel) / d * self.far / self.up;
            bounds = bounds.with_point(Vec3::new(d, clamp(x, -1.0, 1.0), clamp(y, -1.0, 1.0)));
        }
        bounds
    }
}

impl AxisProjection for Frustum {
    fn project_on_axis(&self, dir: Vec3) -> (f32, f32) {
        self.corners()
            .iter()
            .map(|p| dir.dot(*p))
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), d| {
                (lo.min(d), hi.max(d))
            })
    }
}

/// Splits `[near, far]` into `count` slices with a blend of logarithmic and
/// uniform distribution weighted by `lambda`.
///
/// Returns `count + 1` distances, the first being `near` and the last `far`.
///
/// # Examples
///
/// ```
/// use ember_core::math::compute_split_distances;
/// let d = compute_split_distances(1.0, 9.0, 0.0, 2);
/// assert_eq!(d, vec![1.0, 5.0, 9.0]);
/// ```
pub fn compute_split_distances(near: f32, far: f32, lambda: f32, count: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(count + 1);
    out.push(near);
    for i in 1..count {
        let f = i as f32 / count as f32;
        let log = if near <= 0.0 {
            0.0
        } else {
            near * (far / near).powf(f)
        };
        let uni = near + (far - near) * f;
        out.push(log * lambda + uni * (1.0 - lambda));
    }
    out.push(far);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn camera() -> Frustum {
        Frustum::from_fov(Vec3::ZERO, Mat3::IDENTITY, 90.0, 90.0, 1.0, 100.0)
    }

    #[test]
    fn test_from_fov_sizes_far_plane() {
        let f = camera();
        assert_abs_diff_eq!(f.left, 100.0, epsilon = 1e-3);
        assert_abs_diff_eq!(f.up, 100.0, epsilon = 1e-3);
    }

    #[test]
    fn test_move_far_keeps_slope() {
        let mut f = camera();
        f.move_far(50.0);
        assert_abs_diff_eq!(f.left, 50.0, epsilon = 1e-3);
        assert_eq!(f.far, 50.0);
    }

    #[test]
    fn test_culling() {
        let f = camera();
        let ahead = Aabb::from_center_half_extents(Vec3::new(10.0, 0.0, 0.0), Vec3::ONE);
        let behind = Aabb::from_center_half_extents(Vec3::new(-10.0, 0.0, 0.0), Vec3::ONE);
        let beyond = Aabb::from_center_half_extents(Vec3::new(200.0, 0.0, 0.0), Vec3::ONE);
        let aside = Aabb::from_center_half_extents(Vec3::new(10.0, 40.0, 0.0), Vec3::ONE);
        assert!(!f.cull_aabb(&ahead));
        assert!(f.cull_aabb(&behind));
        assert!(f.cull_aabb(&beyond));
        assert!(f.cull_aabb(&aside));
        assert!(f.cull_aabb(&Aabb::INVALID));
    }

    #[test]
    fn test_minimum_sphere_contains_corners() {
        for f in [camera(), Frustum::new(Vec3::ONE, Mat3::IDENTITY, 5.0, 6.0, 1.0, 1.0)] {
            let s = f.to_minimum_sphere();
            for c in f.corners() {
                assert!((c - s.center).length() <= s.radius + 1e-3);
            }
        }
    }

    #[test]
    fn test_projection_bounds_of_centered_box() {
        let f = camera();
        let aabb = Aabb::from_center_half_extents(Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.0, 5.0, 2.5));
        let b = f.projection_bounds(&aabb.corners());
        assert_abs_diff_eq!(b.max.y, 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(b.min.z, -0.25, epsilon = 1e-5);
    }

    #[test]
    fn test_split_distances() {
        let d = compute_split_distances(0.1, 150.0, 0.9, 4);
        assert_eq!(d.len(), 5);
        assert_eq!(d[0], 0.1);
        assert_eq!(d[4], 150.0);
        assert!(d.windows(2).all(|w| w[0] < w[1]));

        let log_only = compute_split_distances(1.0, 100.0, 1.0, 2);
        assert_abs_diff_eq!(log_only[1], 10.0, epsilon = 1e-4);
    }
}
