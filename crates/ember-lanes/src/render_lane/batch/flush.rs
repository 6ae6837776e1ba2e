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

//! Flush routines: the fixed-function state and vertex input of each pass.
//!
//! Every routine computes the state bits of its pass from the material pass,
//! selects the vertex layout and hands over to a render routine in
//! [`super::routines`]. The routines are reached through one table indexed by
//! [`FlushKind`].

use super::routines;
use super::shader_select::gpu_skinning_tier;
use super::BatchDraw;
use crate::render_lane::context::BackEndContext;
use ember_core::math::{Vec3, Vec4};
use ember_core::renderer::api::{
    BufferKind, CullType, MaterialKind, MaterialSort, RenderingMode, StateBits,
    VertexColorMode, VertexFormat, VertexLayout, ViewFlags, WireframeMode,
};
use ember_core::renderer::RenderDevice;

/// The pass a batch is drawn for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushKind {
    /// Object ids into the selection buffer.
    Selection,
    /// Sky surfaces behind the wireframe view.
    Background,
    /// Depth pre-pass.
    Depth,
    /// Occlusion buffer.
    Occluder,
    /// Shadow map depth.
    Shadow,
    /// Ambient lighting plus the primary light.
    Base,
    /// Surfaces without lighting.
    Unlit,
    /// One additional light.
    Lit,
    /// Screen-space velocity.
    Velocity,
    /// Surfaces reading the rendered scene.
    Final,
    /// Wireframe overlay.
    Wire,
    /// 2D interface.
    Gui,
}

type FlushRoutine = fn(&BatchDraw<'_>, &mut BackEndContext, &mut dyn RenderDevice);

/// One row of the flush table.
pub(super) struct FlushEntry {
    pub name: &'static str,
    pub routine: FlushRoutine,
    /// Materials with polygon offset are biased in this pass.
    pub polygon_offset: bool,
}

const FLUSH_TABLE: [FlushEntry; 12] = [
    FlushEntry {
        name: "selection",
        routine: flush_selection,
        polygon_offset: true,
    },
    FlushEntry {
        name: "background",
        routine: flush_background,
        polygon_offset: true,
    },
    FlushEntry {
        name: "depth",
        routine: flush_depth,
        polygon_offset: true,
    },
    FlushEntry {
        name: "occluder",
        routine: flush_depth,
        polygon_offset: true,
    },
    FlushEntry {
        name: "shadow",
        routine: flush_depth,
        polygon_offset: false,
    },
    FlushEntry {
        name: "base",
        routine: flush_base,
        polygon_offset: true,
    },
    FlushEntry {
        name: "unlit",
        routine: flush_unlit,
        polygon_offset: true,
    },
    FlushEntry {
        name: "lit",
        routine: flush_lit,
        polygon_offset: true,
    },
    FlushEntry {
        name: "velocity",
        routine: flush_velocity,
        polygon_offset: true,
    },
    FlushEntry {
        name: "final",
        routine: flush_final,
        polygon_offset: true,
    },
    FlushEntry {
        name: "wire",
        routine: flush_wire,
        polygon_offset: true,
    },
    FlushEntry {
        name: "gui",
        routine: flush_gui,
        polygon_offset: true,
    },
];

impl FlushKind {
    pub(super) fn entry(self) -> &'static FlushEntry {
        &FLUSH_TABLE[self as usize]
    }
}

/// Selects the vertex input of the accumulated geometry.
///
/// Stream 0 holds the vertices, stream 1 the skinning weights of GPU skinned
/// meshes and the last stream the instance rows of indirect draws.
fn set_vertex_format(
    draw: &BatchDraw<'_>,
    ctx: &BackEndContext,
    device: &mut dyn RenderDevice,
    layout: VertexLayout,
) {
    let batch = draw.batch;
    let vertex_size = draw.sub_mesh.vertex_size();
    let skinning_tier = gpu_skinning_tier(ctx, draw.sub_mesh);
    let instanced = !batch.indirect_commands.is_empty();

    device.set_vertex_format(VertexFormat {
        layout,
        skinning_tier,
        instanced,
    });
    device.bind_buffer(BufferKind::Vertex, batch.vertex_buffer);
    device.set_stream_source(0, batch.vertex_buffer, batch.vertex_offset, vertex_size);

    let mut stream = 1;
    if skinning_tier.is_some() {
        device.set_stream_source(
            stream,
            batch.vertex_buffer,
            batch.vertex_offset + vertex_size * batch.num_verts,
            draw.sub_mesh.vertex_weight_size(),
        );
        stream += 1;
    }

    if instanced {
        if let Some(cache) = ctx.instance_cache {
            device.set_stream_source(
                stream,
                cache.buffer,
                cache.offset,
                ctx.settings.instance_buffer_offset_alignment,
            );
        }
    }
}

fn lit_layout(mode: VertexColorMode) -> VertexLayout {
    if mode == VertexColorMode::Ignore {
        VertexLayout::XyzStNT
    } else {
        VertexLayout::XyzStColorNT
    }
}

fn depth_layout(draw: &BatchDraw<'_>) -> VertexLayout {
    if draw.material.pass().is_alpha_cutoff() {
        VertexLayout::XyzSt
    } else {
        VertexLayout::Xyz
    }
}

/// Encodes an object index into an 8-bit-per-channel color.
pub(crate) fn selection_color(index: u32) -> Vec3 {
    Vec3::new(
        (index & 0xff) as f32 / 255.0,
        ((index >> 8) & 0xff) as f32 / 255.0,
        ((index >> 16) & 0xff) as f32 / 255.0,
    )
}

fn flush_selection(draw: &BatchDraw<'_>, ctx: &mut BackEndContext, device: &mut dyn RenderDevice) {
    let pass = draw.material.pass();

    device.set_cull_face(pass.cull);
    set_vertex_format(draw, ctx, device, depth_layout(draw));

    let mut bits = (pass.state_bits | StateBits::DEPTH_WRITE | StateBits::COLOR_WRITE)
        .without_blend()
        .with_depth_func(StateBits::DF_LEQUAL);

    let wireframe = ctx.camera.flags.contains(ViewFlags::WIREFRAME_MODE);
    if wireframe {
        bits |= StateBits::PM_WIREFRAME;
        device.set_line_width(8.0);
    }
    device.set_state_bits(bits);

    routines::render_selection(draw, ctx, device, selection_color(draw.object.index));

    if wireframe {
        device.set_line_width(1.0);
    }
}

fn flush_background(draw: &BatchDraw<'_>, ctx: &mut BackEndContext, device: &mut dyn RenderDevice) {
    let pass = draw.material.pass();

    device.set_cull_face(pass.cull);
    set_vertex_format(draw, ctx, device, VertexLayout::XyzSt);
    device.set_state_bits(pass.state_bits.with_depth_func(StateBits::DF_EQUAL));

    routines::render_generic(draw, ctx, device);
}

fn flush_depth(draw: &BatchDraw<'_>, ctx: &mut BackEndContext, device: &mut dyn RenderDevice) {
    let pass = draw.material.pass();
    if !pass.state_bits.contains(StateBits::DEPTH_WRITE) || pass.state_bits.has_blend() {
        return;
    }

    device.set_cull_face(pass.cull);
    set_vertex_format(draw, ctx, device, depth_layout(draw));
    device.set_state_bits(StateBits::DEPTH_WRITE | StateBits::DF_LEQUAL);

    routines::render_depth(draw, ctx, device);
}

fn flush_base(draw: &BatchDraw<'_>, ctx: &mut BackEndContext, device: &mut dyn RenderDevice) {
    let pass = draw.material.pass();

    device.set_cull_face(pass.cull);
    set_vertex_format(draw, ctx, device, lit_layout(pass.vertex_color_mode));

    // Opaque surfaces already laid down their depth in the pre-pass.
    let bits = if ctx.settings.use_depth_pre_pass && pass.rendering_mode == RenderingMode::Opaque {
        (pass.state_bits - StateBits::DEPTH_WRITE).with_depth_func(StateBits::DF_EQUAL)
    } else {
        pass.state_bits.with_depth_func(StateBits::DF_LEQUAL)
    };
    device.set_state_bits(bits);

    let ambient_scale = ctx.settings.ambient_scale;
    routines::render_base(draw, ctx, device, ambient_scale);
}

fn flush_lit(draw: &BatchDraw<'_>, ctx: &mut BackEndContext, device: &mut dyn RenderDevice) {
    if !draw.material.is_lit_surface() {
        return;
    }
    let Some(light) = draw.light else {
        return;
    };
    let pass = draw.material.pass();

    device.set_cull_face(pass.cull);
    set_vertex_format(draw, ctx, device, lit_layout(pass.vertex_color_mode));

    let bits = (pass.state_bits - StateBits::DEPTH_WRITE)
        .without_blend()
        .with_depth_func(StateBits::DF_EQUAL);

    match light.material.kind {
        MaterialKind::FogLight => {
            device.set_state_bits(
                bits | StateBits::BS_SRC_ALPHA | StateBits::BD_ONE_MINUS_SRC_ALPHA,
            );
            routines::render_fog_light(draw, ctx, device, light);
        }
        MaterialKind::BlendLight => {
            device.set_state_bits(
                bits | StateBits::BS_SRC_ALPHA | StateBits::BD_ONE_MINUS_SRC_ALPHA,
            );
            routines::render_blend_light(draw, ctx, device, light);
        }
        _ => {
            let depth_func = if draw.material.sort == MaterialSort::Translucent {
                StateBits::DF_LEQUAL
            } else {
                StateBits::DF_EQUAL
            };
            device.set_state_bits(
                (bits | StateBits::BS_ONE | StateBits::BD_ONE).with_depth_func(depth_func),
            );
            routines::render_light_interaction(draw, ctx, device, light);
        }
    }
}

fn flush_unlit(draw: &BatchDraw<'_>, ctx: &mut BackEndContext, device: &mut dyn RenderDevice) {
    let pass = draw.material.pass();

    device.set_cull_face(pass.cull);
    set_vertex_format(draw, ctx, device, VertexLayout::XyzStColor);
    device.set_state_bits(pass.state_bits.with_depth_func(StateBits::DF_LEQUAL));

    routines::render_generic(draw, ctx, device);
}

fn flush_final(draw: &BatchDraw<'_>, ctx: &mut BackEndContext, device: &mut dyn RenderDevice) {
    let pass = draw.material.pass();

    device.set_cull_face(pass.cull);
    set_vertex_format(draw, ctx, device, VertexLayout::XyzStNT);
    device.set_state_bits(pass.state_bits.with_depth_func(StateBits::DF_LEQUAL));

    routines::render_generic(draw, ctx, device);
}

/// The wireframe mode of an object: the forced setting first, then the
/// view's, then the object's own.
pub(crate) fn wireframe_mode(ctx: &BackEndContext, object_mode: WireframeMode) -> WireframeMode {
    [ctx.settings.show_wireframe, ctx.camera.wireframe_mode, object_mode]
        .into_iter()
        .find(|mode| *mode != WireframeMode::None)
        .unwrap_or(WireframeMode::VisibleFront)
}

fn flush_wire(draw: &BatchDraw<'_>, ctx: &mut BackEndContext, device: &mut dyn RenderDevice) {
    let pass = draw.material.pass();
    let color: Vec4 = draw.object.wireframe_color;

    set_vertex_format(draw, ctx, device, VertexLayout::Xyz);

    let blend = if color.w < 1.0 {
        StateBits::BS_SRC_ALPHA | StateBits::BD_ONE_MINUS_SRC_ALPHA
    } else {
        StateBits::empty()
    };

    match wireframe_mode(ctx, draw.object.wireframe_mode) {
        WireframeMode::VisibleFront | WireframeMode::None => {
            device.set_cull_face(pass.cull);
            device.set_state_bits(
                StateBits::COLOR_WRITE | StateBits::DF_LEQUAL | StateBits::PM_WIREFRAME | blend,
            );
            device.set_depth_bias(-0.5, -2.0);
            routines::render_color(draw, ctx, device, color);
            device.set_depth_bias(0.0, 0.0);
        }
        mode => {
            let cull = if mode == WireframeMode::AllFrontAndBack {
                CullType::None
            } else {
                pass.cull
            };
            device.set_cull_face(cull);
            device.set_state_bits(
                StateBits::COLOR_WRITE | StateBits::DF_ALWAYS | StateBits::PM_WIREFRAME | blend,
            );
            routines::render_color(draw, ctx, device, color);
        }
    }
}

fn flush_velocity(draw: &BatchDraw<'_>, ctx: &mut BackEndContext, device: &mut dyn RenderDevice) {
    let pass = draw.material.pass();

    device.set_cull_face(pass.cull);
    set_vertex_format(draw, ctx, device, VertexLayout::XyzNormal);
    device.set_state_bits(
        (pass.state_bits & (StateBits::COLOR_WRITE | StateBits::ALPHA_WRITE))
            | StateBits::DEPTH_WRITE
            | StateBits::DF_LEQUAL,
    );

    routines::render_velocity(draw, ctx, device);
}

fn flush_gui(draw: &BatchDraw<'_>, ctx: &mut BackEndContext, device: &mut dyn RenderDevice) {
    let pass = draw.material.pass();

    device.set_cull_face(CullType::None);
    set_vertex_format(draw, ctx, device, VertexLayout::XyzStColor);
    device.set_state_bits(
        (pass.state_bits - StateBits::DEPTH_WRITE).with_depth_func(StateBits::DF_LEQUAL),
    );

    routines::render_gui(draw, ctx, device);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_kinds() {
        let kinds = [
            (FlushKind::Selection, "selection"),
            (FlushKind::Background, "background"),
            (FlushKind::Depth, "depth"),
            (FlushKind::Occluder, "occluder"),
            (FlushKind::Shadow, "shadow"),
            (FlushKind::Base, "base"),
            (FlushKind::Unlit, "unlit"),
            (FlushKind::Lit, "lit"),
            (FlushKind::Velocity, "velocity"),
            (FlushKind::Final, "final"),
            (FlushKind::Wire, "wire"),
            (FlushKind::Gui, "gui"),
        ];
        for (kind, name) in kinds {
            assert_eq!(kind.entry().name, name);
        }
        assert!(!FlushKind::Shadow.entry().polygon_offset);
    }

    #[test]
    fn test_selection_color_packs_index_bytes() {
        let c = selection_color(0x03_02_01);
        assert_eq!(c, Vec3::new(1.0 / 255.0, 2.0 / 255.0, 3.0 / 255.0));
        assert_eq!(selection_color(0), Vec3::ZERO);
    }
}
