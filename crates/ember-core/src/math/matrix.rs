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

//! Defines the `Mat3` and `Mat4` types and the projection builders used by the
//! shadow scheduler.
//!
//! Orientation convention: a `Mat3` used as an axis stores the world-space
//! **forward**, **left** and **up** vectors in `cols[0]`, `cols[1]` and
//! `cols[2]`. Clip space follows the GL convention (`z` in `[-1, 1]`) and view
//! space looks down `-z`.

use super::{degrees_to_radians, Vec3, Vec4, EPSILON};
use std::ops::Mul;

// --- Mat3 ---

/// A 3x3 column-major matrix, used as an orientation basis.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Mat3 {
    /// The columns of the matrix. `cols[0]` is the first column, and so on.
    pub cols: [Vec3; 3],
}

impl Mat3 {
    /// Forward along X, left along Y, up along Z.
    pub const IDENTITY: Self = Self {
        cols: [Vec3::X, Vec3::Y, Vec3::Z],
    };

    /// Creates a new matrix from three column vectors.
    #[inline]
    pub fn from_cols(c0: Vec3, c1: Vec3, c2: Vec3) -> Self {
        Self { cols: [c0, c1, c2] }
    }

    /// Builds a right-handed basis from a forward and an up vector.
    ///
    /// The left vector is `up × forward`.
    #[inline]
    pub fn from_forward_up(forward: Vec3, up: Vec3) -> Self {
        Self::from_cols(forward, up.cross(forward), up)
    }

    /// The forward axis.
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.cols[0]
    }

    /// The left axis.
    #[inline]
    pub fn left(&self) -> Vec3 {
        self.cols[1]
    }

    /// The up axis.
    #[inline]
    pub fn up(&self) -> Vec3 {
        self.cols[2]
    }

    /// Returns the transpose of the matrix.
    #[inline]
    pub fn transpose(&self) -> Self {
        let [a, b, c] = self.cols;
        Self::from_cols(
            Vec3::new(a.x, b.x, c.x),
            Vec3::new(a.y, b.y, c.y),
            Vec3::new(a.z, b.z, c.z),
        )
    }
}

impl Default for Mat3 {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Vec3> for Mat3 {
    type Output = Vec3;
    /// Maps a local `(forward, left, up)` coordinate to world space.
    #[inline]
    fn mul(self, rhs: Vec3) -> Vec3 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z
    }
}

// --- Mat4 ---

/// A 4x4 column-major matrix for transforms, views and projections.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix. `cols[0]` is the first column, and so on.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The 4x4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [Vec4::X, Vec4::Y, Vec4::Z, Vec4::W],
    };

    /// A 4x4 matrix with all elements set to 0.
    pub const ZERO: Self = Self {
        cols: [Vec4::ZERO; 4],
    };

    /// Maps clip space `[-1, 1]³` into texture space `[0, 1]³`.
    pub const TEXTURE_SCALE_BIAS: Self = Self {
        cols: [
            Vec4::new(0.5, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 0.5, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 0.5, 0.0),
            Vec4::new(0.5, 0.5, 0.5, 1.0),
        ],
    };

    /// Creates a new matrix from four column vectors.
    #[inline]
    pub fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Creates a new matrix from four row vectors.
    #[inline]
    pub fn from_rows(r0: Vec4, r1: Vec4, r2: Vec4, r3: Vec4) -> Self {
        Self::from_cols(r0, r1, r2, r3).transpose()
    }

    /// Returns a row of the matrix as a `Vec4`.
    #[inline]
    pub fn get_row(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.cols[0].get(index),
            self.cols[1].get(index),
            self.cols[2].get(index),
            self.cols[3].get(index),
        )
    }

    /// Returns the element at `row`, `col`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.cols[col].get(row)
    }

    /// Creates a translation matrix.
    #[inline]
    pub fn from_translation(v: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[3] = Vec4::from_vec3(v, 1.0);
        m
    }

    /// Creates a world matrix placing a local basis `axis` at `origin`.
    #[inline]
    pub fn from_axis_origin(axis: &Mat3, origin: Vec3) -> Self {
        Self::from_cols(
            Vec4::from_vec3(axis.cols[0], 0.0),
            Vec4::from_vec3(axis.cols[1], 0.0),
            Vec4::from_vec3(axis.cols[2], 0.0),
            Vec4::from_vec3(origin, 1.0),
        )
    }

    /// Builds the view matrix of an observer at `origin` oriented by `axis`.
    ///
    /// View-space `x` points right (`-left`), `y` up and `-z` forward.
    pub fn light_view(origin: Vec3, axis: &Mat3) -> Self {
        let (fwd, left, up) = (axis.forward(), axis.left(), axis.up());
        Self::from_rows(
            Vec4::from_vec3(-left, left.dot(origin)),
            Vec4::from_vec3(up, -up.dot(origin)),
            Vec4::from_vec3(-fwd, fwd.dot(origin)),
            Vec4::W,
        )
    }

    /// Perspective projection from horizontal and vertical field of view in degrees.
    pub fn perspective_fov(x_fov_deg: f32, y_fov_deg: f32, z_near: f32, z_far: f32) -> Self {
        let x_max = z_near * degrees_to_radians(x_fov_deg * 0.5).tan();
        let y_max = z_near * degrees_to_radians(y_fov_deg * 0.5).tan();
        let depth = z_far - z_near;

        Self::from_rows(
            Vec4::new(z_near / x_max, 0.0, 0.0, 0.0),
            Vec4::new(0.0, z_near / y_max, 0.0, 0.0),
            Vec4::new(
                0.0,
                0.0,
                -(z_far + z_near) / depth,
                -2.0 * z_far * z_near / depth,
            ),
            Vec4::new(0.0, 0.0, -1.0, 0.0),
        )
    }

    /// Orthographic projection of a box with half sizes `x_size`, `y_size`
    /// between `z_near` and `z_far`.
    pub fn orthographic_extents(x_size: f32, y_size: f32, z_near: f32, z_far: f32) -> Self {
        let depth = z_far - z_near;
        Self::from_rows(
            Vec4::new(1.0 / x_size, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0 / y_size, 0.0, 0.0),
            Vec4::new(0.0, 0.0, -2.0 / depth, -(z_far + z_near) / depth),
            Vec4::W,
        )
    }

    /// 2D scale-bias that remaps `[xmin, xmax] × [ymin, ymax]` onto `[-1, 1]²`.
    ///
    /// Returns `None` when the rectangle has no area.
    pub fn crop_2d(xmin: f32, xmax: f32, ymin: f32, ymax: f32) -> Option<Self> {
        let dx = xmax - xmin;
        let dy = ymax - ymin;
        if !(dx >= EPSILON && dy >= EPSILON) {
            return None;
        }
        Some(Self::from_rows(
            Vec4::new(2.0 / dx, 0.0, 0.0, -(xmax + xmin) / dx),
            Vec4::new(0.0, 2.0 / dy, 0.0, -(ymax + ymin) / dy),
            Vec4::Z,
            Vec4::W,
        ))
    }

    /// Returns the transpose of the matrix, where rows and columns are swapped.
    #[inline]
    pub fn transpose(&self) -> Self {
        Self::from_cols(
            self.get_row(0),
            self.get_row(1),
            self.get_row(2),
            self.get_row(3),
        )
    }

    /// Transforms a point (`w = 1`) without perspective division.
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        (*self * Vec4::from_vec3(p, 1.0)).truncate()
    }

    /// Inverse of a matrix made of rotation, scale and translation only.
    ///
    /// Returns `None` when the 3x3 part is singular.
    pub fn affine_inverse(&self) -> Option<Self> {
        let a = self.cols[0].truncate();
        let b = self.cols[1].truncate();
        let c = self.cols[2].truncate();
        let t = self.cols[3].truncate();

        let bc = b.cross(c);
        let det = a.dot(bc);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let r0 = bc * inv_det;
        let r1 = c.cross(a) * inv_det;
        let r2 = a.cross(b) * inv_det;

        Some(Self::from_rows(
            Vec4::from_vec3(r0, -r0.dot(t)),
            Vec4::from_vec3(r1, -r1.dot(t)),
            Vec4::from_vec3(r2, -r2.dot(t)),
            Vec4::W,
        ))
    }

    /// Returns the 16 elements in column-major order.
    #[inline]
    pub fn to_cols_array(&self) -> [f32; 16] {
        let mut out = [0.0; 16];
        for (i, col) in self.cols.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&col.to_array());
        }
        out
    }
}

impl Default for Mat4 {
    /// Returns the 4x4 identity matrix.
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Mat4> for Mat4 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Mat4) -> Self {
        Self::from_cols(
            self * rhs.cols[0],
            self * rhs.cols[1],
            self * rhs.cols[2],
            self * rhs.cols[3],
        )
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;
    /// Transforms a `Vec4` by this matrix.
    #[inline]
    fn mul(self, rhs: Vec4) -> Vec4 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z + self.cols[3] * rhs.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn clip(m: &Mat4, p: Vec3) -> Vec3 {
        let v = *m * Vec4::from_vec3(p, 1.0);
        v.truncate() / v.w
    }

    #[test]
    fn test_light_view_looks_down_negative_z() {
        let origin = Vec3::new(10.0, 2.0, -3.0);
        let view = Mat4::light_view(origin, &Mat3::IDENTITY);

        assert_eq!(view.transform_point(origin), Vec3::ZERO);
        let ahead = view.transform_point(origin + Vec3::X * 5.0);
        assert_abs_diff_eq!(ahead.z, -5.0);
        let to_the_left = view.transform_point(origin + Vec3::Y);
        assert_abs_diff_eq!(to_the_left.x, -1.0);
        let above = view.transform_point(origin + Vec3::Z);
        assert_abs_diff_eq!(above.y, 1.0);
    }

    #[test]
    fn test_perspective_maps_near_and_far_planes() {
        let proj = Mat4::perspective_fov(90.0, 90.0, 1.0, 100.0);
        let near = clip(&proj, Vec3::new(0.0, 0.0, -1.0));
        let far = clip(&proj, Vec3::new(0.0, 0.0, -100.0));
        assert_abs_diff_eq!(near.z, -1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(far.z, 1.0, epsilon = 1e-4);

        // 90 degrees: the frustum edge at depth d sits at x = d.
        let edge = clip(&proj, Vec3::new(10.0, 0.0, -10.0));
        assert_abs_diff_eq!(edge.x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_orthographic_maps_depth_range() {
        let proj = Mat4::orthographic_extents(4.0, 2.0, 1.0, 9.0);
        assert_abs_diff_eq!(clip(&proj, Vec3::new(0.0, 0.0, -1.0)).z, -1.0);
        assert_abs_diff_eq!(clip(&proj, Vec3::new(0.0, 0.0, -9.0)).z, 1.0);
        assert_abs_diff_eq!(clip(&proj, Vec3::new(4.0, 2.0, -5.0)).x, 1.0);
        assert_abs_diff_eq!(clip(&proj, Vec3::new(4.0, 2.0, -5.0)).y, 1.0);
    }

    #[test]
    fn test_crop_2d_remaps_rectangle_to_ndc() {
        let crop = Mat4::crop_2d(-0.5, 0.25, 0.0, 1.0).expect("rectangle with area");
        let lo = clip(&crop, Vec3::new(-0.5, 0.0, 0.3));
        let hi = clip(&crop, Vec3::new(0.25, 1.0, 0.3));
        assert_abs_diff_eq!(lo.x, -1.0);
        assert_abs_diff_eq!(lo.y, -1.0);
        assert_abs_diff_eq!(hi.x, 1.0);
        assert_abs_diff_eq!(hi.y, 1.0);
        assert_abs_diff_eq!(hi.z, 0.3);
    }

    #[test]
    fn test_crop_2d_rejects_flat_rectangles() {
        assert!(Mat4::crop_2d(1.0, 1.0, -1.0, 1.0).is_none());
        assert!(Mat4::crop_2d(-1.0, 1.0, 0.5, 0.5).is_none());
        assert!(Mat4::crop_2d(0.5, -0.5, -1.0, 1.0).is_none());
        assert!(Mat4::crop_2d(f32::NAN, 1.0, -1.0, 1.0).is_none());
    }

    #[test]
    fn test_texture_scale_bias() {
        let p = Mat4::TEXTURE_SCALE_BIAS.transform_point(Vec3::new(-1.0, 1.0, 0.0));
        assert_eq!(p, Vec3::new(0.0, 1.0, 0.5));
    }

    #[test]
    fn test_affine_inverse_round_trip() {
        let axis = Mat3::from_forward_up(Vec3::Y, Vec3::Z);
        let mut world = Mat4::from_axis_origin(&axis, Vec3::new(3.0, -1.0, 2.0));
        world.cols[0] = world.cols[0] * 2.0;
        let inv = world.affine_inverse().expect("invertible");
        let p = Vec3::new(0.5, 4.0, -2.0);
        let back = inv.transform_point(world.transform_point(p));
        assert_abs_diff_eq!(back.x, p.x, epsilon = 1e-5);
        assert_abs_diff_eq!(back.y, p.y, epsilon = 1e-5);
        assert_abs_diff_eq!(back.z, p.z, epsilon = 1e-5);

        assert!(Mat4::ZERO.affine_inverse().is_none());
    }

    #[test]
    fn test_from_rows_matches_get() {
        let m = Mat4::from_rows(
            Vec4::new(1.0, 2.0, 3.0, 4.0),
            Vec4::new(5.0, 6.0, 7.0, 8.0),
            Vec4::new(9.0, 10.0, 11.0, 12.0),
            Vec4::new(13.0, 14.0, 15.0, 16.0),
        );
        assert_eq!(m.get(2, 3), 12.0);
        assert_eq!(m.get(3, 2), 15.0);
        assert_eq!(m.to_cols_array()[1], 5.0);
    }
}
