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

//! Light-space fitting of shadow projections.
//!
//! Near/far ranges are fitted to the shadow casters and the view frustum
//! along the light direction. Crop matrices then tighten the 2D extent of the
//! projection to the region both visible and covered by a caster. Every
//! function returns `None` when the fitted volume is empty, in which case the
//! light casts no shadow this frame.

use ember_core::math::{Aabb, AxisProjection, Frustum, Mat4, Obb, Sphere, Vec2, Vec3};

/// Depth padding applied in front of perspective shadow casters.
const PERSPECTIVE_NEAR_PADDING: f32 = 4.0;

/// Narrowest crop accepted, in normalized light-space units.
const MIN_CROP_EXTENT: f32 = 1e-4;

/// A rectangle in the `[-1, 1]` light-space plane, already mapped to shadow
/// map `x` (minus left) and `y` (up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    /// Left edge.
    pub xmin: f32,
    /// Right edge.
    pub xmax: f32,
    /// Bottom edge.
    pub ymin: f32,
    /// Top edge.
    pub ymax: f32,
}

impl CropRect {
    /// Maps normalized light-space bounds (index 1 left, index 2 up) to a
    /// shadow map rectangle.
    pub fn from_light_bounds(bounds: &Aabb) -> Self {
        Self {
            xmin: -bounds.max.y,
            xmax: -bounds.min.y,
            ymin: bounds.min.z,
            ymax: bounds.max.z,
        }
    }

    /// The scale-bias matrix remapping this rectangle onto the full map, or
    /// `None` for a rectangle without area.
    pub fn to_matrix(self) -> Option<Mat4> {
        Mat4::crop_2d(self.xmin, self.xmax, self.ymin, self.ymax)
    }
}

/// Intersects the left/up ranges of two light-space bounds.
fn intersect_left_up(caster: &Aabb, view: &Aabb) -> Option<Aabb> {
    let mut bounds = *caster;
    bounds.min.y = caster.min.y.max(view.min.y);
    bounds.max.y = caster.max.y.min(view.max.y);
    bounds.min.z = caster.min.z.max(view.min.z);
    bounds.max.z = caster.max.z.min(view.max.z);

    let width = bounds.max.y - bounds.min.y;
    let height = bounds.max.z - bounds.min.z;
    if !(width >= MIN_CROP_EXTENT && height >= MIN_CROP_EXTENT) {
        None
    } else {
        Some(bounds)
    }
}

/// Near and far distances of an orthographic light box.
///
/// `light_obb` is the light volume, looking along its forward axis from
/// `origin`. The far distance never exceeds the box depth.
pub fn near_far_obb(
    origin: Vec3,
    light_obb: &Obb,
    caster_aabb: &Aabb,
    view_frustum: &Frustum,
) -> Option<(f32, f32)> {
    if !caster_aabb.is_valid() {
        return None;
    }

    let dir = light_obb.axis.forward();
    let light_far = light_obb.extents.x * 2.0;
    let (caster_min, caster_max) = caster_aabb.project_on_axis(dir);
    let (_, view_max) = view_frustum.project_on_axis(dir);
    let offset = dir.dot(origin);

    let near = caster_min - offset;
    let far = (caster_max.max(view_max) - offset).min(light_far);

    if far <= 0.0 || near >= far {
        None
    } else {
        Some((near, far))
    }
}

/// Near and far distances of a perspective light frustum.
///
/// The result stays within the light frustum's own range.
pub fn near_far_frustum(
    light_frustum: &Frustum,
    caster_aabb: &Aabb,
    view_frustum: &Frustum,
) -> Option<(f32, f32)> {
    if !caster_aabb.is_valid() {
        return None;
    }

    let dir = light_frustum.axis.forward();
    let (caster_min, caster_max) = caster_aabb.project_on_axis(dir);
    let (_, view_max) = view_frustum.project_on_axis(dir);
    let offset = dir.dot(light_frustum.origin);

    let near = light_frustum
        .near
        .max(caster_min - offset - PERSPECTIVE_NEAR_PADDING);
    let far = light_frustum.far.min(caster_max.max(view_max) - offset);

    if far <= light_frustum.near || near >= far {
        None
    } else {
        Some((near, far))
    }
}

/// Snaps the lower corner of `rect` to multiples of `align` world units and
/// resizes it to exactly `shadow_map_size` steps, so the crop moves in whole
/// texels as the camera moves.
///
/// `size` is the world size of the full `[-1, 1]` range on each axis.
pub fn align_projection_bounds(rect: CropRect, size: Vec2, align: f32, shadow_map_size: f32) -> CropRect {
    let xmin = ((rect.xmin + 1.0) * 0.5 * size.x / align).floor();
    let ymin = ((rect.ymin + 1.0) * 0.5 * size.y / align).floor();
    let xmax = xmin + shadow_map_size;
    let ymax = ymin + shadow_map_size;

    let ax = align / size.x;
    let ay = align / size.y;

    CropRect {
        xmin: xmin * ax * 2.0 - 1.0,
        xmax: xmax * ax * 2.0 - 1.0,
        ymin: ymin * ay * 2.0 - 1.0,
        ymax: ymax * ay * 2.0 - 1.0,
    }
}

/// Crops an orthographic light box to the part of `caster_obb` seen by
/// `view_frustum`.
pub fn crop_obb(light_obb: &Obb, caster_obb: &Obb, view_frustum: &Frustum) -> Option<Mat4> {
    let view_bounds = light_obb.projection_bounds(view_frustum);
    let caster_bounds = light_obb.projection_bounds(caster_obb);
    let bounds = intersect_left_up(&caster_bounds, &view_bounds)?;
    CropRect::from_light_bounds(&bounds).to_matrix()
}

/// Crops an orthographic light box to a view sphere.
///
/// With `align` set to the shadow map resolution, the crop is snapped to
/// whole texels of the sphere diameter.
pub fn crop_sphere(light_obb: &Obb, view_sphere: &Sphere, align: Option<f32>) -> Option<Mat4> {
    if view_sphere.radius <= 0.0 {
        return None;
    }

    let bounds = light_obb.projection_bounds(view_sphere);
    let mut rect = CropRect::from_light_bounds(&bounds);

    if let Some(shadow_map_size) = align {
        let length_per_texel = view_sphere.radius * 2.0 / shadow_map_size;
        let size = Vec2::new(light_obb.extents.y, light_obb.extents.z) * 2.0;
        rect = align_projection_bounds(rect, size, length_per_texel, shadow_map_size);
    }

    rect.to_matrix()
}

/// Crops a perspective light frustum to the part of `caster_obb` seen by
/// `view_frustum`.
pub fn crop_frustum(light_frustum: &Frustum, caster_obb: &Obb, view_frustum: &Frustum) -> Option<Mat4> {
    let view_bounds = light_frustum.projection_bounds(&view_frustum.corners());
    let caster_bounds = light_frustum.projection_bounds(&caster_obb.corners());
    let bounds = intersect_left_up(&caster_bounds, &view_bounds)?;
    CropRect::from_light_bounds(&bounds).to_matrix()
}

/// Crops a perspective light frustum to the view frustum alone.
pub fn crop_frustum_to_view(light_frustum: &Frustum, view_frustum: &Frustum) -> Option<Mat4> {
    let bounds = light_frustum.projection_bounds(&view_frustum.corners());
    CropRect::from_light_bounds(&bounds).to_matrix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ember_core::math::{Mat3, Vec4};

    fn light_box() -> Obb {
        Obb::new(Vec3::ZERO, Vec3::splat(10.0), Mat3::IDENTITY)
    }

    fn forward_view(origin: Vec3) -> Frustum {
        Frustum::new(origin, Mat3::IDENTITY, 1.0, 5.0, 1.0, 1.0)
    }

    #[test]
    fn test_near_far_obb_fits_casters_and_view() {
        let light = Obb::new(Vec3::ZERO, Vec3::new(10.0, 5.0, 5.0), Mat3::IDENTITY);
        let casters = Aabb::from_min_max(Vec3::new(-2.0, -1.0, -1.0), Vec3::new(2.0, 1.0, 1.0));
        let (near, far) = near_far_obb(Vec3::new(-10.0, 0.0, 0.0), &light, &casters, &forward_view(Vec3::ZERO))
            .expect("casters in front of the light");
        assert_abs_diff_eq!(near, 8.0, epsilon = 1e-4);
        assert_abs_diff_eq!(far, 15.0, epsilon = 1e-4);
    }

    #[test]
    fn test_near_far_obb_rejects_everything_behind_the_light() {
        let casters = Aabb::from_min_max(Vec3::new(-5.0, -1.0, -1.0), Vec3::new(-3.0, 1.0, 1.0));
        let view = Frustum::new(
            Vec3::ZERO,
            Mat3::from_forward_up(-Vec3::X, Vec3::Z),
            1.0,
            5.0,
            1.0,
            1.0,
        );
        assert!(near_far_obb(Vec3::ZERO, &light_box(), &casters, &view).is_none());
    }

    #[test]
    fn test_near_far_rejects_missing_casters() {
        let view = forward_view(Vec3::ZERO);
        assert!(near_far_obb(Vec3::ZERO, &light_box(), &Aabb::INVALID, &view).is_none());
        let spot = Frustum::new(Vec3::ZERO, Mat3::IDENTITY, 0.1, 10.0, 5.0, 5.0);
        assert!(near_far_frustum(&spot, &Aabb::INVALID, &view).is_none());
    }

    #[test]
    fn test_near_far_frustum_rejects_casters_outside_both_volumes() {
        let spot = Frustum::new(Vec3::ZERO, Mat3::IDENTITY, 0.1, 10.0, 5.0, 5.0);
        let casters = Aabb::from_min_max(Vec3::new(-20.0, -1.0, -1.0), Vec3::new(-15.0, 1.0, 1.0));
        let view = Frustum::new(
            Vec3::ZERO,
            Mat3::from_forward_up(-Vec3::X, Vec3::Z),
            0.1,
            5.0,
            2.0,
            2.0,
        );
        assert!(near_far_frustum(&spot, &casters, &view).is_none());
    }

    #[test]
    fn test_near_far_frustum_clamps_to_light_range() {
        let spot = Frustum::new(Vec3::ZERO, Mat3::IDENTITY, 0.5, 10.0, 5.0, 5.0);
        let casters = Aabb::from_min_max(Vec3::new(2.0, -1.0, -1.0), Vec3::new(30.0, 1.0, 1.0));
        let (near, far) = near_far_frustum(&spot, &casters, &forward_view(Vec3::ZERO)).expect("visible casters");
        assert_abs_diff_eq!(near, 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(far, 10.0, epsilon = 1e-4);
    }

    #[test]
    fn test_crop_obb_rejects_disjoint_caster_and_view() {
        let caster = Obb::new(Vec3::new(0.0, 9.0, 0.0), Vec3::ONE, Mat3::IDENTITY);
        let view = forward_view(Vec3::new(0.0, -8.0, 0.0));
        assert!(crop_obb(&light_box(), &caster, &view).is_none());
    }

    #[test]
    fn test_crop_obb_rejects_caster_beside_the_light_box() {
        // Clamping flattens the caster onto the box side, leaving no area.
        let caster = Obb::new(Vec3::new(0.0, 50.0, 0.0), Vec3::ONE, Mat3::IDENTITY);
        let view = Frustum::new(Vec3::new(-20.0, 0.0, 0.0), Mat3::IDENTITY, 1.0, 40.0, 40.0, 40.0);
        assert!(crop_obb(&light_box(), &caster, &view).is_none());
    }

    #[test]
    fn test_crop_obb_maps_overlap_to_full_range() {
        let caster = Obb::new(Vec3::new(0.0, 9.0, 0.0), Vec3::ONE, Mat3::IDENTITY);
        let view = forward_view(Vec3::new(0.0, 8.5, 0.0));
        let crop = crop_obb(&light_box(), &caster, &view).expect("overlapping bounds");

        // The overlap spans left [0.8, 0.95] and up [-0.1, 0.1].
        let low = crop * Vec4::new(-0.95, -0.1, 0.0, 1.0);
        let high = crop * Vec4::new(-0.8, 0.1, 0.0, 1.0);
        assert_abs_diff_eq!(low.x, -1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(low.y, -1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(high.x, 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(high.y, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_crop_frustum_rejects_disjoint_caster_and_view() {
        let spot = Frustum::new(Vec3::ZERO, Mat3::IDENTITY, 1.0, 10.0, 5.0, 5.0);
        let caster = Obb::new(Vec3::new(5.0, 4.0, 0.0), Vec3::splat(0.5), Mat3::IDENTITY);
        let view = Frustum::new(Vec3::new(0.0, -4.0, 0.0), Mat3::IDENTITY, 1.0, 5.0, 0.5, 0.5);
        assert!(crop_frustum(&spot, &caster, &view).is_none());
    }

    #[test]
    fn test_align_projection_bounds_snaps_to_texels() {
        let full = CropRect {
            xmin: -1.0,
            xmax: 1.0,
            ymin: -1.0,
            ymax: 1.0,
        };
        let aligned = align_projection_bounds(full, Vec2::new(8.0, 8.0), 0.5, 16.0);
        assert_abs_diff_eq!(aligned.xmin, -1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(aligned.xmax, 1.0, epsilon = 1e-5);

        let shifted = CropRect { xmin: -0.8, ..full };
        let aligned = align_projection_bounds(shifted, Vec2::new(8.0, 8.0), 0.5, 16.0);
        assert_abs_diff_eq!(aligned.xmin, -0.875, epsilon = 1e-5);
        assert_abs_diff_eq!(aligned.xmax, 1.125, epsilon = 1e-5);
        assert_abs_diff_eq!(aligned.ymin, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_crop_sphere_rejects_degenerate_sphere() {
        let sphere = Sphere::new(Vec3::ZERO, 0.0);
        assert!(crop_sphere(&light_box(), &sphere, None).is_none());
        assert!(crop_sphere(&light_box(), &Sphere::new(Vec3::ZERO, 2.0), Some(1024.0)).is_some());
    }
}
