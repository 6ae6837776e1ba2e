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

//! Pass drivers: the loops that walk the sorted surface list and feed the batch.
//!
//! Every driver is a thin filter around [`walk_surfaces`], the shared
//! change-detection loop. Surfaces arrive sorted so that mergeable ones are
//! adjacent; the walk flushes only when the object, the geometry or the
//! material changes in a way instancing cannot absorb.

use super::batch::{Batch, FlushKind};
use super::context::BackEndContext;
use super::debug_prims::DebugPrimitives;
use super::shadow::ShadowScheduler;
use ember_core::math::{Mat4, Vec4};
use ember_core::renderer::api::{
    ClearFlags, DrawSurf, DrawSurfFlags, Material, MaterialFlags, MaterialSort, ObjectFlags,
    RenderFrame, StateBits, SubMesh, ViewFlags, VisibleLight, VisibleObject,
};
use ember_core::renderer::{Rect, RenderDevice};
use std::sync::Arc;

/// Depth range squeezed onto objects drawn over the rest of the scene.
const DEPTH_HACK_RANGE: f32 = 0.1;

/// The space per-object matrices are computed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectSpace {
    /// The current camera: the context's view and projection.
    Camera,
    /// A light view; the projection is the context's current one.
    Light(Mat4),
}

/// How a walk submits the surfaces it accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceWalk {
    /// The flush routine of the batches.
    pub kind: FlushKind,
    /// Where per-object matrices come from.
    pub space: ObjectSpace,
    /// Honor the depth-hack flag of objects.
    pub depth_hack: bool,
}

impl SurfaceWalk {
    /// A walk seen from the camera.
    pub fn camera(kind: FlushKind) -> Self {
        Self {
            kind,
            space: ObjectSpace::Camera,
            depth_hack: true,
        }
    }

    /// A walk seen from a light with view matrix `view`.
    pub fn light(kind: FlushKind, view: Mat4) -> Self {
        Self {
            kind,
            space: ObjectSpace::Light(view),
            depth_hack: false,
        }
    }

    fn load_object(&self, ctx: &mut BackEndContext, object: &VisibleObject) {
        let view = match self.space {
            ObjectSpace::Camera => ctx.view_matrix,
            ObjectSpace::Light(view) => view,
        };
        ctx.model_view_matrix = view * object.world;
        ctx.model_view_projection_matrix = ctx.projection_matrix * ctx.model_view_matrix;
    }
}

fn is_same<T>(prev: Option<&Arc<T>>, next: &Arc<T>) -> bool {
    prev.is_some_and(|prev| Arc::ptr_eq(prev, next))
}

/// Walks `surfs` in order and submits every surface accepted by `filter`.
///
/// `on_first_draw` runs once, right before the first accepted surface, so
/// drivers can bind their target lazily. Returns `true` if any surface was
/// submitted.
pub fn walk_surfaces<'a, I, F, G>(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    surfs: I,
    walk: &SurfaceWalk,
    mut filter: F,
    mut on_first_draw: G,
) -> bool
where
    I: IntoIterator<Item = &'a DrawSurf>,
    F: FnMut(&DrawSurf) -> bool,
    G: FnMut(&mut BackEndContext, &mut dyn RenderDevice),
{
    let mut prev_object: Option<&'a Arc<VisibleObject>> = None;
    let mut prev_sub_mesh: Option<&'a Arc<SubMesh>> = None;
    let mut prev_material: Option<&'a Arc<Material>> = None;
    let mut prev_depth_hack = false;
    let instancing = batch.instancing_enabled();

    for surf in surfs {
        if !filter(surf) {
            continue;
        }
        if prev_material.is_none() {
            on_first_draw(ctx, device);
        }

        let use_instancing = instancing && surf.use_instancing();
        let different_object = !is_same(prev_object, &surf.object);
        // Consecutive dynamic meshes are left to the batch, which extends the
        // index range when they are contiguous.
        let different_sub_mesh = prev_sub_mesh.is_none_or(|prev| {
            let dynamic_run = !use_instancing && prev.is_dynamic() && surf.sub_mesh.is_dynamic();
            !dynamic_run && !surf.sub_mesh.is_shared(prev)
        });
        let different_material = !is_same(prev_material, &surf.material);
        let different_instance = !use_instancing
            || different_material
            || different_sub_mesh
            || prev_object.is_none_or(|prev| {
                prev.flags != surf.object.flags || prev.layer != surf.object.layer
            });

        if different_object || different_sub_mesh || different_material {
            if prev_material.is_some() && different_instance {
                batch.flush(ctx, device);
            }

            batch.begin(
                walk.kind,
                &surf.material,
                surf.material_registers.as_ref(),
                &surf.object,
            );
            prev_sub_mesh = Some(&surf.sub_mesh);
            prev_material = Some(&surf.material);

            if different_object {
                prev_object = Some(&surf.object);
                walk.load_object(ctx, &surf.object);

                if walk.depth_hack {
                    let depth_hack = surf.object.flags.contains(ObjectFlags::DEPTH_HACK);
                    if depth_hack != prev_depth_hack {
                        let far = if depth_hack { DEPTH_HACK_RANGE } else { 1.0 };
                        device.set_depth_range(0.0, far);
                        prev_depth_hack = depth_hack;
                    }
                }
            }
        }

        if use_instancing {
            batch.add_instance(ctx, device, surf);
        }
        batch.draw_sub_mesh(ctx, device, &surf.sub_mesh);
    }

    if prev_material.is_some() {
        batch.flush(ctx, device);
    }
    if prev_depth_hack {
        device.set_depth_range(0.0, 1.0);
    }

    prev_material.is_some()
}

fn no_setup(_: &mut BackEndContext, _: &mut dyn RenderDevice) {}

/// Writes object ids into the selection buffer.
pub fn selection_pass(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    surfs: &[DrawSurf],
) {
    batch.set_current_light(None);
    walk_surfaces(
        ctx,
        device,
        batch,
        surfs,
        &SurfaceWalk::camera(FlushKind::Selection),
        |surf| {
            surf.is_ambient_visible()
                && !surf.flags.contains(DrawSurfFlags::SKIP_SELECTION)
                && !surf.object.flags.contains(ObjectFlags::SKIP_SELECTION)
                && surf.material.sort != MaterialSort::Sky
        },
        no_setup,
    );
}

/// Draws sky surfaces, used behind wireframes when textures are off.
pub fn background_pass(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    surfs: &[DrawSurf],
) {
    batch.set_current_light(None);
    walk_surfaces(
        ctx,
        device,
        batch,
        surfs,
        &SurfaceWalk::camera(FlushKind::Background),
        |surf| surf.is_ambient_visible() && surf.material.is_sky_surface(),
        no_setup,
    );
}

/// Lays down the depth of opaque lit surfaces for early depth rejection.
pub fn depth_pre_pass(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    surfs: &[DrawSurf],
) {
    batch.set_current_light(None);
    walk_surfaces(
        ctx,
        device,
        batch,
        surfs,
        &SurfaceWalk::camera(FlushKind::Depth),
        |surf| {
            surf.is_ambient_visible()
                && surf.material.is_lit_surface()
                && surf.material.sort == MaterialSort::Opaque
        },
        no_setup,
    );
}

/// Draws the depth of opaque occluders.
pub fn occluder_pass(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    surfs: &[DrawSurf],
) -> bool {
    batch.set_current_light(None);
    walk_surfaces(
        ctx,
        device,
        batch,
        surfs,
        &SurfaceWalk::camera(FlushKind::Occluder),
        |surf| {
            surf.is_ambient_visible()
                && surf.material.sort == MaterialSort::Opaque
                && surf.object.flags.contains(ObjectFlags::OCCLUDER)
        },
        no_setup,
    )
}

fn is_base_surface(surf: &DrawSurf) -> bool {
    surf.is_ambient_visible()
        && surf.material.is_lit_surface()
        && !surf.material.is_sky_surface()
        && !surf.material.flags.contains(MaterialFlags::REFRACTION)
}

/// Ambient lighting of lit surfaces, plus the primary light when there is one.
pub fn base_pass(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    surfs: &[DrawSurf],
    primary_light: Option<&Arc<VisibleLight>>,
) {
    batch.set_current_light(primary_light);
    walk_surfaces(
        ctx,
        device,
        batch,
        surfs,
        &SurfaceWalk::camera(FlushKind::Base),
        is_base_surface,
        no_setup,
    );
    batch.set_current_light(None);
}

/// Adds the contribution of `light` to the surfaces it lights.
pub fn lit_pass(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    frame: &RenderFrame,
    light: &Arc<VisibleLight>,
) {
    batch.set_current_light(Some(light));
    walk_surfaces(
        ctx,
        device,
        batch,
        frame.surfs_at(&light.lit_surfs),
        &SurfaceWalk::camera(FlushKind::Lit),
        |surf| {
            surf.is_ambient_visible()
                && surf.material.is_lit_surface()
                && matches!(
                    surf.material.sort,
                    MaterialSort::Opaque | MaterialSort::AlphaTest | MaterialSort::Translucent
                )
        },
        no_setup,
    );
    batch.set_current_light(None);
}

/// Shadow and light interaction of every light but the primary one.
///
/// Each light first renders its shadow map, then adds its lighting inside
/// its scissor rectangle.
pub fn additive_pass(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    shadows: &mut ShadowScheduler,
    frame: &RenderFrame,
) {
    let primary = frame.primary_light();

    for light in &frame.lights {
        if primary.is_some_and(|primary| Arc::ptr_eq(primary, light)) {
            continue;
        }
        if !light.occlusion_visible {
            log::trace!("Light {} is occluded, skipping", light.index);
            continue;
        }

        if ShadowScheduler::is_enabled(ctx, light) {
            shadows.shadow_pass(ctx, device, batch, frame, light);
        }

        let prev_scissor = ctx.scissor();
        if !light.scissor_rect.is_empty() {
            ctx.set_scissor(device, light.scissor_rect);
        }
        lit_pass(ctx, device, batch, frame, light);
        ctx.set_scissor(device, prev_scissor);
    }
}

/// Wireframe overlay.
///
/// Without `force`, only surfaces flagged to show their wires are drawn.
pub fn tris_pass(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    surfs: &[DrawSurf],
    force: bool,
) {
    batch.set_current_light(None);
    walk_surfaces(
        ctx,
        device,
        batch,
        surfs,
        &SurfaceWalk::camera(FlushKind::Wire),
        |surf| {
            (force || surf.flags.contains(DrawSurfFlags::SHOW_WIRES))
                && surf.material.sort != MaterialSort::Sky
        },
        no_setup,
    );
}

/// Surfaces without lighting: unlit and blended materials.
pub fn unlit_pass(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    surfs: &[DrawSurf],
) {
    batch.set_current_light(None);
    walk_surfaces(
        ctx,
        device,
        batch,
        surfs,
        &SurfaceWalk::camera(FlushKind::Unlit),
        |surf| {
            surf.is_ambient_visible()
                && !surf.material.is_lit_surface()
                && !surf.material.is_sky_surface()
                && !surf.material.flags.contains(MaterialFlags::REFRACTION)
        },
        no_setup,
    );
}

/// Screen-space velocity of moving and skinned objects.
///
/// The velocity buffer is cleared on the first draw, or on its own when
/// nothing moved.
pub fn velocity_pass(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    surfs: &[DrawSurf],
) {
    let target = ctx.targets.velocity;
    let begin_target = |ctx: &mut BackEndContext, device: &mut dyn RenderDevice| {
        device.begin_render_target(target.id, 0);
        device.set_viewport(target.rect());
        ctx.set_scissor(device, target.rect());
        device.set_state_bits(StateBits::COLOR_WRITE | StateBits::ALPHA_WRITE | StateBits::DEPTH_WRITE);
        device.clear(ClearFlags::COLOR | ClearFlags::DEPTH, Vec4::W, 1.0);
    };

    batch.set_current_light(None);
    let drawn = walk_surfaces(
        ctx,
        device,
        batch,
        surfs,
        &SurfaceWalk::camera(FlushKind::Velocity),
        |surf| {
            surf.is_ambient_visible()
                && surf.material.sort != MaterialSort::Sky
                && (surf.object.is_skinned() || surf.object.has_moved())
        },
        &begin_target,
    );

    if !drawn {
        begin_target(ctx, device);
    }
    device.end_render_target();
    ctx.restore_view_rect(device);
}

/// Surfaces that read back the rendered scene, such as refraction.
pub fn final_pass(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    surfs: &[DrawSurf],
) {
    batch.set_current_light(None);
    walk_surfaces(
        ctx,
        device,
        batch,
        surfs,
        &SurfaceWalk::camera(FlushKind::Final),
        |surf| {
            surf.is_ambient_visible()
                && surf.material.sort != MaterialSort::Sky
                && surf.material.flags.contains(MaterialFlags::REFRACTION)
        },
        no_setup,
    );
}

/// 2D interface surfaces, drawn in submission order.
pub fn gui_pass(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    surfs: &[DrawSurf],
) {
    batch.set_current_light(None);
    walk_surfaces(
        ctx,
        device,
        batch,
        surfs,
        &SurfaceWalk::camera(FlushKind::Gui),
        |_| true,
        no_setup,
    );
}

/// Draws a 3D view: selection buffer, shadows, lighting, overlays and debug
/// primitives, in that order.
pub fn draw_view(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    shadows: &mut ShadowScheduler,
    debug_prims: &DebugPrimitives,
    frame: &RenderFrame,
) {
    ctx.set_camera(&frame.view);
    ctx.instance_cache = frame.instance_cache;

    let view_flags = frame.view.flags;
    let surfs = frame.draw_surfs.as_slice();
    let render_rect = frame.view.render_rect;

    if view_flags.contains(ViewFlags::SELECTION) {
        let target = ctx.targets.selection;
        device.begin_render_target(target.id, 0);
        ctx.restore_view_rect(device);
        device.set_depth_range(0.0, 1.0);
        device.set_state_bits(StateBits::DEPTH_WRITE | StateBits::COLOR_WRITE | StateBits::ALPHA_WRITE);
        device.clear(ClearFlags::COLOR | ClearFlags::DEPTH, Vec4::ONE, 1.0);
        selection_pass(ctx, device, batch, surfs);
        device.end_render_target();
    }

    device.set_viewport(render_rect);
    ctx.set_scissor(device, render_rect);
    device.set_depth_range(0.0, 1.0);
    device.set_state_bits(StateBits::DEPTH_WRITE | StateBits::COLOR_WRITE | StateBits::ALPHA_WRITE);
    device.clear(ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL, Vec4::W, 1.0);

    if view_flags.contains(ViewFlags::TEXTURED_MODE) {
        let primary = frame.primary_light();
        if let Some(light) = primary.filter(|light| ShadowScheduler::is_enabled(ctx, light)) {
            shadows.shadow_pass(ctx, device, batch, frame, light);
        }

        if ctx.settings.use_depth_pre_pass {
            depth_pre_pass(ctx, device, batch, surfs);
        }
        base_pass(ctx, device, batch, surfs, primary);
        additive_pass(ctx, device, batch, shadows, frame);
        tris_pass(ctx, device, batch, surfs, false);
        unlit_pass(ctx, device, batch, surfs);
        if ctx.settings.motion_blur {
            velocity_pass(ctx, device, batch, surfs);
        }
        final_pass(ctx, device, batch, surfs);
    }

    if view_flags.contains(ViewFlags::WIREFRAME_MODE) {
        if !view_flags.contains(ViewFlags::TEXTURED_MODE) {
            background_pass(ctx, device, batch, surfs);
        }
        tris_pass(ctx, device, batch, surfs, true);
    }

    if view_flags.contains(ViewFlags::DEBUG_PRIMS) {
        debug_prims.draw(ctx, device);
    }

    ctx.set_scissor(device, Rect::EMPTY);
}

/// Draws a 2D view over `screen_rect`. Does nothing without surfaces.
pub fn draw_2d_view(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    surfs: &[DrawSurf],
    screen_rect: Rect,
) {
    if surfs.is_empty() {
        return;
    }

    device.set_viewport(screen_rect);
    ctx.set_scissor(device, screen_rect);
    device.set_depth_range(0.0, 0.0);

    gui_pass(ctx, device, batch, surfs);

    ctx.set_scissor(device, Rect::EMPTY);
}

/// Renders opaque occluders of `frame` into the depth of `target`.
pub fn draw_occlusion_map(
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    batch: &mut Batch,
    frame: &RenderFrame,
    target: ember_core::renderer::api::RenderTarget,
) -> bool {
    ctx.set_camera(&frame.view);
    ctx.instance_cache = frame.instance_cache;

    device.begin_render_target(target.id, 0);
    device.set_viewport(target.rect());
    ctx.set_scissor(device, target.rect());
    device.set_state_bits(StateBits::DEPTH_WRITE | StateBits::COLOR_WRITE);
    device.clear(ClearFlags::COLOR | ClearFlags::DEPTH, Vec4::ONE, 1.0);

    let drawn = occluder_pass(ctx, device, batch, &frame.draw_surfs);

    device.end_render_target();
    ctx.restore_view_rect(device);
    drawn
}
