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

//! Shadow map scheduling.
//!
//! [`ShadowScheduler::shadow_pass`] picks a projection per light kind, fits
//! it to the shadow casters and the view, then renders the casters into the
//! shadow map. Point lights render a virtual cube map, spot lights one
//! perspective map and directional lights either one orthographic map or,
//! for the primary light, a set of cascades refreshed at a throttled rate.
//!
//! A projection that fits to nothing (no caster in view, empty crop, inverted
//! near/far range) is not an error: the light is lit without shadows this
//! frame.

mod cube;
pub mod projection;
pub mod throttle;

pub use self::cube::{face_axis, face_rect, CUBE_FACES};
pub use self::throttle::CascadeThrottle;

use self::projection::{
    crop_frustum, crop_frustum_to_view, crop_obb, crop_sphere, near_far_frustum, near_far_obb,
};
use crate::render_lane::batch::{Batch, FlushKind};
use crate::render_lane::context::{BackEndContext, MAX_CASCADES};
use crate::render_lane::passes::{walk_surfaces, SurfaceWalk};
use ember_core::math::{
    compute_split_distances, radians_to_degrees, unit_to_cm, Frustum, Mat4, Obb, Vec4,
};
use ember_core::renderer::api::{
    ClearFlags, DrawSurf, LightKind, MaterialFlags, MaterialSort, RenderFrame, StateBits,
    ViewFlags, VisibleLight,
};
use ember_core::renderer::{Rect, RenderDevice};
use std::sync::Arc;

/// `true` if `surf` is drawn into shadow maps.
pub(crate) fn is_shadow_caster(surf: &DrawSurf) -> bool {
    let material = &surf.material;
    surf.is_shadow_visible()
        && surf.object.casts_shadows()
        && !material.flags.contains(MaterialFlags::NO_SHADOW)
        && (matches!(material.sort, MaterialSort::Opaque | MaterialSort::AlphaTest)
            || material.flags.contains(MaterialFlags::FORCE_SHADOW))
}

/// Renders shadow maps and keeps the state that survives across frames: the
/// cascade update accumulators and which cube faces are known to be clear.
#[derive(Debug, Default)]
pub struct ShadowScheduler {
    throttle: CascadeThrottle,
    cube_cleared: [bool; CUBE_FACES],
}

impl ShadowScheduler {
    /// Creates a scheduler with nothing cached.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cascade update accumulators.
    pub fn throttle(&self) -> &CascadeThrottle {
        &self.throttle
    }

    /// Forgets every cached shadow map, so the next frame redraws them all.
    pub fn invalidate(&mut self) {
        self.throttle.reset();
        self.cube_cleared = [false; CUBE_FACES];
    }

    /// `true` if `light` should render a shadow map in the current view.
    pub fn is_enabled(ctx: &BackEndContext, light: &VisibleLight) -> bool {
        ctx.settings.shadows
            && light.casts_shadows()
            && ctx.camera.flags.contains(ViewFlags::SHADOWS)
    }

    /// Renders the shadow map of `light`, leaving the projection in
    /// `ctx.shadow` for the lit pass that follows.
    pub fn shadow_pass(
        &mut self,
        ctx: &mut BackEndContext,
        device: &mut dyn RenderDevice,
        batch: &mut Batch,
        frame: &RenderFrame,
        light: &Arc<VisibleLight>,
    ) {
        match light.kind {
            LightKind::Point => self.cube_shadow_pass(ctx, device, batch, frame, light),
            LightKind::Spot => self.projected_shadow_pass(ctx, device, batch, frame, light),
            LightKind::Directional if light.is_primary() && ctx.settings.csm_count > 1 => {
                self.cascaded_shadow_pass(ctx, device, batch, frame, light)
            }
            LightKind::Directional => {
                self.orthogonal_shadow_pass(ctx, device, batch, frame, light)
            }
        }
    }

    /// Draws the casters of `light` into layer `cascade` of the shadow map,
    /// using `ctx.shadow.projection`. Returns `true` if a caster was drawn.
    fn shadow_map_pass(
        &mut self,
        ctx: &mut BackEndContext,
        device: &mut dyn RenderDevice,
        batch: &mut Batch,
        frame: &RenderFrame,
        light: &Arc<VisibleLight>,
        cascade: usize,
        force_clear: bool,
    ) -> bool {
        batch.set_current_light(Some(light));
        device.set_depth_bias(ctx.shadow.offset_factor, ctx.shadow.offset_units);

        let prev_projection = ctx.projection_matrix;
        let prev_view_projection = ctx.view_projection_matrix;
        ctx.projection_matrix = ctx.shadow.projection;
        ctx.view_projection_matrix = ctx.shadow.projection * light.view_matrix;

        let target = ctx.targets.shadow_map;
        let mut prev_scissor = ctx.scissor();
        let mut begin_layer = |ctx: &mut BackEndContext, device: &mut dyn RenderDevice| {
            device.begin_render_target(target.id, cascade as u32);
            device.set_viewport(target.rect());
            prev_scissor = ctx.scissor();
            ctx.set_scissor(device, Rect::EMPTY);
            device.set_state_bits(StateBits::DEPTH_WRITE);
            device.clear(ClearFlags::DEPTH, Vec4::ZERO, 1.0);
        };

        let drawn = walk_surfaces(
            ctx,
            device,
            batch,
            frame.surfs_at(&light.shadow_caster_surfs),
            &SurfaceWalk::light(FlushKind::Shadow, light.view_matrix),
            is_shadow_caster,
            &mut begin_layer,
        );

        if drawn || force_clear {
            if !drawn {
                begin_layer(ctx, device);
            }
            device.end_render_target();
            ctx.set_scissor(device, prev_scissor);
            device.set_viewport(ctx.camera.render_rect);
        }

        ctx.projection_matrix = prev_projection;
        ctx.view_projection_matrix = prev_view_projection;
        device.set_depth_bias(0.0, 0.0);
        batch.set_current_light(None);

        drawn
    }

    /// One orthographic shadow map covering the whole light box.
    fn orthogonal_shadow_pass(
        &mut self,
        ctx: &mut BackEndContext,
        device: &mut dyn RenderDevice,
        batch: &mut Batch,
        frame: &RenderFrame,
        light: &Arc<VisibleLight>,
    ) {
        ctx.shadow.view_proj_scale_bias[0] = Mat4::ZERO;
        ctx.shadow.offset_factor = light.shadow_offset_factor;
        ctx.shadow.offset_units = light.shadow_offset_units;

        let Some((near, far)) = near_far_obb(
            light.origin,
            &light.world_obb,
            &light.shadow_caster_aabb,
            &ctx.camera.frustum,
        ) else {
            log::trace!("Light {} has no shadow caster in range", light.index);
            return;
        };

        let extents = light.world_obb.extents;
        let mut projection = Mat4::orthographic_extents(extents.y, extents.z, near, far);

        if ctx.settings.optimized_shadow_projection == 2 {
            let obb = fitted_obb(light, near, far);
            let caster_obb = Obb::from_aabb(&light.shadow_caster_aabb);
            let Some(crop) = crop_obb(&obb, &caster_obb, &ctx.camera.frustum) else {
                log::trace!("Light {} shadow crop is empty", light.index);
                return;
            };
            projection = crop * projection;
        }

        ctx.shadow.projection = projection;
        ctx.shadow.filter_size[0] = ctx.settings.shadow_map_filter_size;
        ctx.shadow.view_proj_scale_bias[0] =
            Mat4::TEXTURE_SCALE_BIAS * projection * light.view_matrix;

        if self.shadow_map_pass(ctx, device, batch, frame, light, 0, false) {
            ctx.counter.shadow_map_draws += 1;
        }
    }

    /// One perspective shadow map through the spot light frustum.
    fn projected_shadow_pass(
        &mut self,
        ctx: &mut BackEndContext,
        device: &mut dyn RenderDevice,
        batch: &mut Batch,
        frame: &RenderFrame,
        light: &Arc<VisibleLight>,
    ) {
        ctx.shadow.view_proj_scale_bias[0] = Mat4::ZERO;
        ctx.shadow.offset_factor = light.shadow_offset_factor;
        ctx.shadow.offset_units = light.shadow_offset_units;

        let light_frustum = &light.world_frustum;
        let Some((near, far)) =
            near_far_frustum(light_frustum, &light.shadow_caster_aabb, &ctx.camera.frustum)
        else {
            log::trace!("Light {} has no shadow caster in range", light.index);
            return;
        };

        let fov_x = radians_to_degrees((light_frustum.left / light_frustum.far).atan()) * 2.0;
        let fov_y = radians_to_degrees((light_frustum.up / light_frustum.far).atan()) * 2.0;
        let mut projection = Mat4::perspective_fov(fov_x, fov_y, near, far);

        let mut fitted = *light_frustum;
        fitted.move_far(far);
        fitted.move_near(near);
        match ctx.settings.optimized_shadow_projection {
            2 => {
                let caster_obb = Obb::from_aabb(&light.shadow_caster_aabb);
                let Some(crop) = crop_frustum(&fitted, &caster_obb, &ctx.camera.frustum) else {
                    log::trace!("Light {} shadow crop is empty", light.index);
                    return;
                };
                projection = crop * projection;
            }
            1 => {
                let Some(crop) = crop_frustum_to_view(&fitted, &ctx.camera.frustum) else {
                    log::trace!("Light {} shadow crop is empty", light.index);
                    return;
                };
                projection = crop * projection;
            }
            _ => {}
        }

        ctx.shadow.projection = projection;
        ctx.shadow.filter_size[0] = ctx.settings.shadow_map_filter_size;
        ctx.shadow.view_proj_scale_bias[0] =
            Mat4::TEXTURE_SCALE_BIAS * projection * light.view_matrix;

        if self.shadow_map_pass(ctx, device, batch, frame, light, 0, false) {
            ctx.counter.shadow_map_draws += 1;
        }
    }

    /// Renders cascade `cascade` covering `split`. Returns `true` if a caster
    /// was drawn.
    #[allow(clippy::too_many_arguments)]
    fn cascade_shadow_pass(
        &mut self,
        ctx: &mut BackEndContext,
        device: &mut dyn RenderDevice,
        batch: &mut Batch,
        frame: &RenderFrame,
        light: &Arc<VisibleLight>,
        cascade: usize,
        split: &Frustum,
        force_clear: bool,
    ) -> bool {
        ctx.shadow.view_proj_scale_bias[cascade] = Mat4::ZERO;

        if split.cull_aabb(&light.lit_aabb) {
            return false;
        }

        ctx.shadow.offset_factor = ctx.settings.csm_offset_factors[cascade];
        ctx.shadow.offset_units = ctx.settings.csm_offset_units[cascade];

        let Some((near, far)) =
            near_far_obb(light.origin, &light.world_obb, &light.shadow_caster_aabb, split)
        else {
            log::trace!("Light {} cascade {} has no caster in range", light.index, cascade);
            return false;
        };

        let extents = light.world_obb.extents;
        let mut projection = Mat4::orthographic_extents(extents.y, extents.z, near, far);
        let filter_size = ctx.settings.shadow_map_filter_size;
        ctx.shadow.filter_size[cascade] = filter_size;

        if ctx.settings.optimized_shadow_projection > 0 {
            let obb = fitted_obb(light, near, far);
            let crop = if ctx.settings.optimized_shadow_projection == 2 {
                let caster_obb = Obb::from_aabb(&light.shadow_caster_aabb);
                crop_obb(&obb, &caster_obb, split)
            } else {
                let sphere = split.to_minimum_sphere();
                let map_size = ctx.settings.shadow_map_size as f32;
                ctx.shadow.filter_size[cascade] =
                    (filter_size * map_size / unit_to_cm(sphere.radius * 2.0)).max(1.0);
                let align = ctx.settings.shadow_map_crop_align.then_some(map_size);
                crop_sphere(&obb, &sphere, align)
            };
            let Some(crop) = crop else {
                log::trace!("Light {} cascade {} crop is empty", light.index, cascade);
                return false;
            };
            projection = crop * projection;
        }

        ctx.shadow.projection = projection;
        ctx.shadow.view_proj_scale_bias[cascade] =
            Mat4::TEXTURE_SCALE_BIAS * projection * light.view_matrix;

        self.shadow_map_pass(ctx, device, batch, frame, light, cascade, force_clear)
    }

    /// Cascaded shadow maps of the primary directional light.
    ///
    /// Splits are recomputed every frame, but each cascade is only redrawn
    /// when its throttle accumulator says so. Cascades not redrawn keep the
    /// map and projection of their last update.
    fn cascaded_shadow_pass(
        &mut self,
        ctx: &mut BackEndContext,
        device: &mut dyn RenderDevice,
        batch: &mut Batch,
        frame: &RenderFrame,
        light: &Arc<VisibleLight>,
    ) {
        let count = ctx.cascade_count();
        let near = ctx.camera.frustum.near;
        let far = ctx.settings.csm_max_distance;
        let distances = compute_split_distances(near, far, ctx.settings.csm_split_lambda, count);

        if ctx.settings.csm_selection_method == 0 {
            let p = ctx.projection_matrix;
            for (csm_far, &d) in ctx.shadow.csm_far.iter_mut().zip(&distances[1..]) {
                *csm_far = (p.get(2, 2) * -d + p.get(2, 3)) / d * 0.5 + 0.5;
            }
        }

        let render = self.throttle.advance_frame(
            &distances,
            ctx.settings.csm_update_ratio,
            ctx.settings.csm_non_cached_distance,
        );

        for cascade in (0..count.min(MAX_CASCADES)).filter(|&i| render[i]) {
            let mut split = ctx.camera.frustum;
            let mut split_near = distances[cascade];
            if ctx.settings.csm_blend && cascade > 0 {
                split_near -= distances[cascade] - distances[cascade - 1];
            }
            split.move_near(split_near);
            split.move_far(distances[cascade + 1]);

            if self.cascade_shadow_pass(ctx, device, batch, frame, light, cascade, &split, true) {
                ctx.counter.shadow_map_draws += 1;
            }
        }

        ctx.shadow.csm_distances = distances;
    }
}

/// The light box shrunk along its forward axis to `[near, far]`.
fn fitted_obb(light: &VisibleLight, near: f32, far: f32) -> Obb {
    let mut obb = light.world_obb;
    obb.center = light.origin + light.axis.forward() * ((far + near) * 0.5);
    obb.extents.x = (far - near) * 0.5;
    obb
}
