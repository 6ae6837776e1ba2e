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

//! Point light shadows rendered into the virtual shadow cube map.
//!
//! The six faces share one 2D atlas laid out as three columns and two rows.
//! Face `f` lives in column `f / 2` and row `f % 2`.

use super::{is_shadow_caster, ShadowScheduler};
use crate::render_lane::batch::{Batch, FlushKind};
use crate::render_lane::context::BackEndContext;
use crate::render_lane::passes::{walk_surfaces, SurfaceWalk};
use ember_core::math::{Frustum, Mat3, Mat4, Obb, Vec2, Vec3, Vec4, FRAC_PI_4};
use ember_core::renderer::api::{
    ClearFlags, DrawSurf, RenderFrame, RenderTarget, StateBits, VisibleLight,
};
use ember_core::renderer::{Rect, RenderDevice};
use std::sync::Arc;

/// Number of cube faces.
pub const CUBE_FACES: usize = 6;

/// Orientation of cube face `face`, in +X, -X, +Y, -Y, +Z, -Z order.
pub fn face_axis(face: usize) -> Mat3 {
    let (forward, up) = match face {
        0 => (Vec3::X, -Vec3::Y),
        1 => (-Vec3::X, -Vec3::Y),
        2 => (Vec3::Y, Vec3::Z),
        3 => (-Vec3::Y, -Vec3::Z),
        4 => (Vec3::Z, -Vec3::Y),
        _ => (-Vec3::Z, -Vec3::Y),
    };
    Mat3::from_forward_up(forward, up)
}

/// Pixel rectangle of cube face `face` inside the atlas `target`.
pub fn face_rect(target: &RenderTarget, face: usize) -> Rect {
    let w = (target.width / 3) as i32;
    let h = (target.height / 2) as i32;
    Rect::new(w * (face >> 1) as i32, h * (face & 1) as i32, w, h)
}

fn is_face_caster(surf: &DrawSurf, light_frustum: &Frustum) -> bool {
    if !is_shadow_caster(surf) || light_frustum.cull_obb(&surf.object.world_obb) {
        return false;
    }
    if surf.object.is_skinned() {
        return true;
    }
    let sub_mesh_obb = Obb::from_aabb_transform(&surf.sub_mesh.aabb, &surf.object.world);
    !light_frustum.cull_obb(&sub_mesh_obb)
}

fn begin_face(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    face: usize,
    clear: bool,
) {
    let target = ctx.targets.vscm;
    device.begin_render_target(target.id, 0);
    let rect = face_rect(&target, face);
    device.set_viewport(rect);
    ctx.set_scissor(device, rect);
    if clear {
        device.set_state_bits(StateBits::DEPTH_WRITE);
        device.clear(ClearFlags::DEPTH, Vec4::ZERO, 1.0);
    }
}

impl ShadowScheduler {
    /// Renders one cube face of `light`. Returns `true` if a caster was drawn.
    ///
    /// A face left empty is cleared once and then skipped until something
    /// draws into it again.
    #[allow(clippy::too_many_arguments)]
    fn cube_face_pass(
        &mut self,
        ctx: &mut BackEndContext,
        device: &mut dyn RenderDevice,
        batch: &mut Batch,
        frame: &RenderFrame,
        light: &Arc<VisibleLight>,
        face: usize,
        light_frustum: &Frustum,
        force_clear: bool,
    ) -> bool {
        let view = Mat4::light_view(light.origin, &light_frustum.axis);
        let cleared = &mut self.cube_cleared[face];

        let drawn = walk_surfaces(
            ctx,
            device,
            batch,
            frame.surfs_at(&light.shadow_caster_surfs),
            &SurfaceWalk::light(FlushKind::Shadow, view),
            |surf| is_face_caster(surf, light_frustum),
            |ctx, device| {
                begin_face(ctx, device, face, !*cleared);
                *cleared = false;
            },
        );

        if drawn {
            device.end_render_target();
        } else if force_clear && !*cleared {
            begin_face(ctx, device, face, true);
            device.end_render_target();
            *cleared = true;
        }

        drawn
    }

    /// Renders the six faces of a point light's shadow cube map.
    pub(super) fn cube_shadow_pass(
        &mut self,
        ctx: &mut BackEndContext,
        device: &mut dyn RenderDevice,
        batch: &mut Batch,
        frame: &RenderFrame,
        light: &Arc<VisibleLight>,
    ) {
        let z_near = ctx.settings.shadow_cube_map_z_near;
        let z_far = light.max_radius();
        if z_far <= z_near {
            log::trace!("Light {} is smaller than the cube map near plane", light.index);
            return;
        }

        ctx.shadow.projection_depth = Vec2::new(
            -z_far * z_near / (z_far - z_near),
            z_far / (z_far - z_near),
        );

        let fov = ctx.settings.vscm_biased_fov;
        let projection = Mat4::perspective_fov(fov, fov, z_near, z_far);
        let size = z_far * FRAC_PI_4.tan();

        let prev_projection = ctx.projection_matrix;
        let prev_view_projection = ctx.view_projection_matrix;
        let prev_scissor = ctx.scissor();
        ctx.projection_matrix = projection;
        ctx.shadow.projection = projection;

        for face in 0..CUBE_FACES {
            let light_frustum =
                Frustum::new(light.origin, face_axis(face), z_near, z_far, size, size);
            if ctx.camera.frustum.cull_frustum(&light_frustum) {
                continue;
            }

            let view = Mat4::light_view(light.origin, &light_frustum.axis);
            ctx.view_projection_matrix = projection * view;

            device.set_depth_bias(light.shadow_offset_factor, light.shadow_offset_units);
            if self.cube_face_pass(ctx, device, batch, frame, light, face, &light_frustum, true) {
                ctx.counter.shadow_map_draws += 1;
            }
            device.set_depth_bias(0.0, 0.0);
        }

        ctx.projection_matrix = prev_projection;
        ctx.view_projection_matrix = prev_view_projection;
        ctx.set_scissor(device, prev_scissor);
        device.set_viewport(ctx.camera.render_rect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ember_core::renderer::api::{RenderTargetId, TextureId};

    #[test]
    fn face_axes_are_orthonormal_and_distinct() {
        let mut forwards = Vec::new();
        for face in 0..CUBE_FACES {
            let axis = face_axis(face);
            assert_relative_eq!(axis.forward().dot(axis.up()), 0.0);
            assert_relative_eq!(axis.forward().length(), 1.0);
            forwards.push(axis.forward());
        }
        let sum = forwards.iter().fold(Vec3::ZERO, |acc, v| acc + *v);
        assert_relative_eq!(sum.length(), 0.0);
    }

    #[test]
    fn faces_tile_the_atlas() {
        let target = RenderTarget {
            id: RenderTargetId(1),
            depth_texture: TextureId(1),
            width: 768,
            height: 512,
        };
        assert_eq!(face_rect(&target, 0), Rect::new(0, 0, 256, 256));
        assert_eq!(face_rect(&target, 1), Rect::new(0, 256, 256, 256));
        assert_eq!(face_rect(&target, 4), Rect::new(512, 0, 256, 256));
        assert_eq!(face_rect(&target, 5), Rect::new(512, 256, 256, 256));
    }
}
