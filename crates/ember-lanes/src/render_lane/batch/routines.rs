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

//! Render routines: shader selection, constant upload and the draw call.
//!
//! Each routine picks the shader of its pass, walks the variant links, binds
//! the constants the program reads and ends with [`draw_primitives`].

use super::constants::ShaderBinder;
use super::shader_select::{select, Variants};
use super::{BatchDraw, FlushKind, INDIRECT_COMMAND_SIZE};
use crate::render_lane::context::BackEndContext;
use ember_core::math::color::srgb_to_linear_rgba;
use ember_core::math::{Vec3, Vec4};
use ember_core::renderer::api::{
    BufferKind, BuiltinConstant, BuiltinSampler, ConstantValue, ObjectFlags, Shader, Topology,
    VertexColorMode, ViewFlags, VisibleLight,
};
use ember_core::renderer::RenderDevice;
use std::sync::Arc;

/// Which direct light shader family a lit routine draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DirectLitMode {
    /// Ambient plus the primary light, base pass.
    AmbientDirect,
    /// Environment probes plus the primary light, base pass.
    IndirectDirect,
    /// One additional light, added over the base pass.
    Interaction,
}

/// The pass shader when the material has one, `fallback` otherwise.
fn pass_shader(draw: &BatchDraw<'_>, fallback: &Arc<Shader>) -> (Arc<Shader>, bool) {
    match &draw.material.pass().shader {
        Some(shader) => (shader.clone(), true),
        None => (fallback.clone(), false),
    }
}

fn registers<'a>(draw: &'a BatchDraw<'_>) -> Option<&'a [f32]> {
    draw.batch.material_registers.as_deref()
}

/// Flat color, used by wireframes.
pub(super) fn render_color(
    draw: &BatchDraw<'_>,
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    color: Vec4,
) {
    let shader = select(&ctx.shaders.constant_color, draw, ctx, Variants::SKIN_INSTANCING);
    {
        let mut binder = ShaderBinder::bind(device, shader);
        binder.matrices(ctx);
        binder.entity(draw, ctx);
        binder.set_named("color", ConstantValue::Vec4(color));
    }
    draw_primitives(draw, ctx, device);
}

/// Object id, used by the selection buffer.
pub(super) fn render_selection(
    draw: &BatchDraw<'_>,
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    id: Vec3,
) {
    let pass = draw.material.pass();
    let shader = select(&ctx.shaders.selection_id, draw, ctx, Variants::PERFORATED_SKIN);
    {
        let mut binder = ShaderBinder::bind(device, shader);
        binder.matrices(ctx);
        binder.entity(draw, ctx);
        if pass.is_alpha_cutoff() {
            let albedo = pass.albedo_texture().unwrap_or(ctx.textures.white);
            binder.texture(BuiltinSampler::AlbedoMap, albedo);
            binder.texture_matrix(pass);
            binder.set(BuiltinConstant::PerforatedAlpha, ConstantValue::Float(pass.cutoff_alpha));
        }
        binder.set_named("id", ConstantValue::Vec3(id));
    }
    draw_primitives(draw, ctx, device);
}

/// Depth only: pre-pass, occluders and shadow maps.
pub(super) fn render_depth(
    draw: &BatchDraw<'_>,
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
) {
    let pass = draw.material.pass();
    let shader = select(&ctx.shaders.depth, draw, ctx, Variants::ALL);
    {
        let mut binder = ShaderBinder::bind(device, shader);
        binder.matrices(ctx);
        binder.entity(draw, ctx);
        if pass.is_alpha_cutoff() {
            let albedo = pass.albedo_texture().unwrap_or(ctx.textures.white);
            binder.texture(BuiltinSampler::AlbedoMap, albedo);
            binder.material(pass, registers(draw));
        }
    }
    draw_primitives(draw, ctx, device);
}

/// Screen-space velocity from the previous and current object transforms.
pub(super) fn render_velocity(
    draw: &BatchDraw<'_>,
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
) {
    let pass = draw.material.pass();
    let shader = select(&ctx.shaders.object_motion_blur, draw, ctx, Variants::PERFORATED_SKIN);
    {
        let mut binder = ShaderBinder::bind(device, shader);
        binder.matrices(ctx);
        binder.entity(draw, ctx);
        binder.set_mat4(
            BuiltinConstant::PrevModelViewProjectionMatrix,
            ctx.camera.view_projection * draw.object.prev_world,
            true,
        );
        binder.set_named(
            "shutterSpeed",
            ConstantValue::Float(ctx.settings.motion_blur_shutter_speed / ctx.frame_time),
        );
        binder.named_texture("depthMap", ctx.textures.screen_depth);
        if pass.is_alpha_cutoff() {
            let albedo = pass.albedo_texture().unwrap_or(ctx.textures.white);
            binder.texture(BuiltinSampler::AlbedoMap, albedo);
            binder.texture_matrix(pass);
            binder.set(BuiltinConstant::PerforatedAlpha, ConstantValue::Float(pass.cutoff_alpha));
        }
    }
    draw_primitives(draw, ctx, device);
}

fn render_standard(
    draw: &BatchDraw<'_>,
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    ambient_scale: f32,
) {
    let pass = draw.material.pass();
    let (base, custom) = pass_shader(draw, &ctx.shaders.standard_default);
    let shader = select(&base, draw, ctx, Variants::ALL);
    {
        let mut binder = ShaderBinder::bind(device, shader);
        if custom {
            binder.shader_properties(pass);
        } else {
            let albedo = pass.texture.unwrap_or(ctx.textures.white);
            binder.texture(BuiltinSampler::AlbedoMap, albedo);
        }
        binder.set_named("ambientScale", ConstantValue::Float(ambient_scale));
        binder.matrices(ctx);
        binder.entity(draw, ctx);
        binder.material(pass, registers(draw));
        binder.set(BuiltinConstant::ViewOrigin, ConstantValue::Vec3(ctx.camera.origin));
    }
    draw_primitives(draw, ctx, device);
}

/// The material's own shader, or the default surface at full ambient.
pub(super) fn render_generic(
    draw: &BatchDraw<'_>,
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
) {
    render_standard(draw, ctx, device, 1.0);
}

/// Ambient term only, scaled by `scale`.
pub(super) fn render_ambient(
    draw: &BatchDraw<'_>,
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    scale: f32,
) {
    render_standard(draw, ctx, device, scale);
}

/// Environment probe lighting.
pub(super) fn render_indirect_lit(
    draw: &BatchDraw<'_>,
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    ambient_scale: f32,
) {
    let pass = draw.material.pass();
    let custom = pass.shader.as_ref().and_then(|s| s.indirect_lit_version()).cloned();
    let is_custom = custom.is_some();
    let base = custom.unwrap_or_else(|| ctx.shaders.standard_default_indirect_lit.clone());
    let shader = select(&base, draw, ctx, Variants::ALL);
    {
        let mut binder = ShaderBinder::bind(device, shader);
        if is_custom {
            binder.shader_properties(pass);
        } else {
            let albedo = pass.albedo_texture().unwrap_or(ctx.textures.white);
            binder.texture(BuiltinSampler::AlbedoMap, albedo);
        }
        binder.set_named("ambientScale", ConstantValue::Float(ambient_scale));
        binder.matrices(ctx);
        binder.entity(draw, ctx);
        binder.material(pass, registers(draw));
        binder.set(BuiltinConstant::ViewOrigin, ConstantValue::Vec3(ctx.camera.origin));
        binder.probes(ctx, draw.object);
        binder.texture(BuiltinSampler::PrefilteredDfgMap, ctx.textures.prefiltered_dfg);
    }
    draw_primitives(draw, ctx, device);
}

/// `true` if the object samples the shadow map of `light` in this view.
fn receives_shadow(draw: &BatchDraw<'_>, ctx: &BackEndContext, light: &VisibleLight) -> bool {
    ctx.settings.shadows
        && ctx.camera.flags.contains(ViewFlags::SHADOWS)
        && light.casts_shadows()
        && draw.object.flags.contains(ObjectFlags::RECEIVE_SHADOWS)
}

/// Direct lighting of `light`, optionally on top of ambient or probes.
pub(super) fn render_direct_lit(
    draw: &BatchDraw<'_>,
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    light: &VisibleLight,
    mode: DirectLitMode,
    ambient_scale: f32,
) {
    let pass = draw.material.pass();
    let (custom, fallback) = match mode {
        DirectLitMode::AmbientDirect | DirectLitMode::Interaction => (
            pass.shader.as_ref().and_then(|s| s.direct_lit_version()).cloned(),
            &ctx.shaders.standard_default_direct_lit,
        ),
        DirectLitMode::IndirectDirect => (
            pass.shader
                .as_ref()
                .and_then(|s| s.indirect_lit_direct_lit_version())
                .cloned(),
            &ctx.shaders.standard_default_indirect_lit_direct_lit,
        ),
    };
    let is_custom = custom.is_some();
    let mut base = custom.unwrap_or_else(|| fallback.clone());

    let mut use_shadow_map = false;
    if receives_shadow(draw, ctx, light) {
        if let Some(shadowed) = base.shadow_version(light.kind).cloned() {
            base = shadowed;
            use_shadow_map = true;
        }
    }

    let variants = match mode {
        DirectLitMode::Interaction => Variants::SKIN_INSTANCING,
        _ => Variants::ALL,
    };
    let shader = select(&base, draw, ctx, variants);
    let ambient_scale = match mode {
        DirectLitMode::Interaction => 0.0,
        _ => ambient_scale,
    };

    {
        let mut binder = ShaderBinder::bind(device, shader);
        if is_custom {
            binder.shader_properties(pass);
        } else {
            let albedo = pass.albedo_texture().unwrap_or(ctx.textures.white);
            binder.texture(BuiltinSampler::AlbedoMap, albedo);
        }
        binder.set_named("ambientScale", ConstantValue::Float(ambient_scale));
        binder.matrices(ctx);
        binder.entity(draw, ctx);
        binder.material(pass, registers(draw));
        binder.set(BuiltinConstant::ViewOrigin, ConstantValue::Vec3(ctx.camera.origin));
        if mode == DirectLitMode::IndirectDirect {
            binder.probes(ctx, draw.object);
            binder.texture(BuiltinSampler::PrefilteredDfgMap, ctx.textures.prefiltered_dfg);
        }
        binder.lighting(ctx, light, use_shadow_map);
    }
    draw_primitives(draw, ctx, device);
}

/// Base pass: ambient or probes, plus the primary light when there is one.
pub(super) fn render_base(
    draw: &BatchDraw<'_>,
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    ambient_scale: f32,
) {
    let indirect = ctx.settings.indirect_lit && draw.object.env_probes[0].is_some();

    match (indirect, draw.light) {
        (false, None) => render_ambient(draw, ctx, device, ambient_scale),
        (true, None) => render_indirect_lit(draw, ctx, device, ambient_scale),
        (false, Some(light)) => render_direct_lit(
            draw,
            ctx,
            device,
            light,
            DirectLitMode::AmbientDirect,
            ambient_scale,
        ),
        (true, Some(light)) => render_direct_lit(
            draw,
            ctx,
            device,
            light,
            DirectLitMode::IndirectDirect,
            ambient_scale,
        ),
    }
}

/// One additional light added over the base pass.
pub(super) fn render_light_interaction(
    draw: &BatchDraw<'_>,
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    light: &VisibleLight,
) {
    render_direct_lit(draw, ctx, device, light, DirectLitMode::Interaction, 0.0);
}

/// Fog volume seen through the surface.
pub(super) fn render_fog_light(
    draw: &BatchDraw<'_>,
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    light: &VisibleLight,
) {
    let shader = select(&ctx.shaders.fog_light, draw, ctx, Variants::SKIN_INSTANCING);
    // The camera is outside the volume when it lies behind the fog plane.
    let enter = (light.origin - ctx.camera.origin).dot(light.axis.forward()) < 0.0;
    let (fog_map, fog_enter_map) = if enter {
        (ctx.textures.fog, ctx.textures.white)
    } else {
        (ctx.textures.white, ctx.textures.fog_enter)
    };
    let projection = light.material.pass().texture.unwrap_or(ctx.textures.white);

    {
        let mut binder = ShaderBinder::bind(device, shader);
        binder.matrices(ctx);
        binder.entity(draw, ctx);
        binder.set_mat4(
            BuiltinConstant::LightTextureMatrix,
            light.view_proj_scale_bias * draw.object.world,
            true,
        );
        binder.set_named("fogColor", ConstantValue::Vec3(light.color));
        binder.named_texture("fogMap", fog_map);
        binder.named_texture("fogEnterMap", fog_enter_map);
        binder.named_texture("fogProjectionMap", projection);
    }
    draw_primitives(draw, ctx, device);
}

/// Blend light color projected over the surface.
pub(super) fn render_blend_light(
    draw: &BatchDraw<'_>,
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
    light: &VisibleLight,
) {
    let shader = select(&ctx.shaders.blend_light, draw, ctx, Variants::SKIN_INSTANCING);
    let projection = light.material.pass().texture.unwrap_or(ctx.textures.white);

    {
        let mut binder = ShaderBinder::bind(device, shader);
        let color = Vec4::from_vec3(light.color, 1.0);
        let color = if binder.is_srgb_write_enabled() {
            srgb_to_linear_rgba(color)
        } else {
            color
        };
        binder.matrices(ctx);
        binder.entity(draw, ctx);
        binder.set_named("blendColor", ConstantValue::Vec4(color));
        binder.set_mat4(
            BuiltinConstant::LightTextureMatrix,
            light.view_proj_scale_bias * draw.object.world,
            true,
        );
        binder.named_texture("blendProjectionMap", projection);
    }
    draw_primitives(draw, ctx, device);
}

/// 2D interface elements.
pub(super) fn render_gui(
    draw: &BatchDraw<'_>,
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
) {
    let pass = draw.material.pass();
    let (shader, custom) = pass_shader(draw, &ctx.shaders.unlit);
    {
        let mut binder = ShaderBinder::bind(device, shader);
        if custom {
            binder.shader_properties(pass);
        } else {
            let albedo = pass.texture.unwrap_or(ctx.textures.white);
            binder.texture(BuiltinSampler::AlbedoMap, albedo);
            binder.set(BuiltinConstant::Intensity, ConstantValue::Float(1.0));
        }
        binder.matrices(ctx);
        binder.texture_matrix(pass);
        binder.set(
            BuiltinConstant::ConstantColor,
            ConstantValue::Vec4(pass.color_for(draw.object.owner_color)),
        );
        binder.vertex_color(VertexColorMode::Modulate);
    }
    draw_primitives(draw, ctx, device);
}

/// Issues the one draw call of the batch and updates the frame counters.
pub(super) fn draw_primitives(
    draw: &BatchDraw<'_>,
    ctx: &mut BackEndContext,
    device: &mut dyn RenderDevice,
) {
    let batch = draw.batch;
    let Some(start_index) = batch.start_index else {
        return;
    };

    device.bind_buffer(BufferKind::Index, batch.index_buffer);

    let count = if ctx.settings.single_triangle {
        batch.num_indexes.min(3)
    } else {
        batch.num_indexes
    };

    if !batch.indirect_commands.is_empty() {
        device.multi_draw_elements_indirect(
            Topology::TriangleList,
            0,
            batch.indirect_commands.len() as u32,
            INDIRECT_COMMAND_SIZE,
        );
    } else if batch.num_instances > 0 {
        device.draw_elements_instanced(
            Topology::TriangleList,
            start_index,
            count,
            batch.num_instances,
        );
    } else {
        device.draw_elements(Topology::TriangleList, start_index, count);
    }

    let instances = batch.num_instances.max(1);
    let counter = &mut ctx.counter;
    counter.draw_calls += 1;
    counter.draw_indexes += count * instances;
    counter.draw_verts += batch.num_verts * instances;

    if batch.kind == FlushKind::Shadow {
        counter.shadow_draw_calls += 1;
        counter.shadow_draw_indexes += count * instances;
        counter.shadow_draw_verts += batch.num_verts * instances;
    }
}
