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

//! Immediate-mode debug geometry: lines, triangles and points drawn on top of
//! the view with a per-vertex color.

use super::context::BackEndContext;
use bytemuck::{Pod, Zeroable};
use ember_core::math::{Vec3, Vec4};
use ember_core::renderer::api::{
    BufferId, BufferKind, BufferUsage, BuiltinConstant, ConstantKey, ConstantValue, CullType,
    StateBits, Topology, VertexFormat, VertexLayout,
};
use ember_core::renderer::{RenderDevice, ResourceError};

/// Maximum number of primitives alive at once.
pub const MAX_DEBUG_PRIMS: usize = 16384;
/// Maximum number of vertices alive at once.
pub const MAX_DEBUG_VERTS: usize = 65536;
/// Maximum number of vertices merged into one draw.
pub const MAX_MERGED_VERTS: usize = 32768;

/// One vertex as uploaded to the stream buffer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct DebugVert {
    /// Position.
    pub xyz: [f32; 3],
    /// Packed RGBA8 color, red in the lowest byte.
    pub color: u32,
}

/// Size in bytes of a [`DebugVert`].
pub const DEBUG_VERT_SIZE: u32 = std::mem::size_of::<DebugVert>() as u32;

/// A reserved primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugPrim {
    /// Primitive assembly.
    pub topology: Topology,
    /// First vertex in the shared vertex list.
    pub first_vert: usize,
    /// Number of vertices.
    pub num_verts: usize,
    /// Linear color with alpha.
    pub color: Vec4,
    /// Width of lines, in pixels.
    pub line_width: f32,
    /// Draws both faces.
    pub two_sided: bool,
    /// Tests against scene depth.
    pub depth_test: bool,
    /// Time after which [`DebugPrimitives::clear`] drops the primitive.
    pub life_time: f32,
}

impl DebugPrim {
    fn is_translucent(&self) -> bool {
        self.color.w < 1.0
    }

    fn is_line(&self) -> bool {
        matches!(
            self.topology,
            Topology::LineList | Topology::LineStrip | Topology::LineLoop
        )
    }

    /// `true` if `next` can be appended to the same draw as `self`.
    fn can_merge(&self, next: &DebugPrim) -> bool {
        self.topology == next.topology
            && matches!(self.topology, Topology::LineList | Topology::TriangleList)
            && self.is_translucent() == next.is_translucent()
            && (!self.is_line() || self.line_width == next.line_width)
            && self.two_sided == next.two_sided
            && self.depth_test == next.depth_test
    }
}

/// Packs a linear `[0, 1]` color into RGBA8.
pub fn pack_color(color: Vec4) -> u32 {
    let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
    byte(color.x) | byte(color.y) << 8 | byte(color.z) << 16 | byte(color.w) << 24
}

/// The debug primitive buffer.
#[derive(Debug)]
pub struct DebugPrimitives {
    prims: Vec<DebugPrim>,
    verts: Vec<Vec3>,
    vertex_buffer: BufferId,
    overflowed: bool,
}

impl Default for DebugPrimitives {
    fn default() -> Self {
        Self {
            prims: Vec::new(),
            verts: Vec::new(),
            vertex_buffer: BufferId::NULL,
            overflowed: false,
        }
    }
}

impl DebugPrimitives {
    /// Creates the buffer and its stream vertex buffer.
    pub fn init(device: &mut dyn RenderDevice) -> Result<Self, ResourceError> {
        let vertex_buffer = device.create_buffer(
            BufferKind::Vertex,
            BufferUsage::Stream,
            MAX_MERGED_VERTS as u32 * DEBUG_VERT_SIZE,
            "debug_prims",
        )?;
        Ok(Self {
            prims: Vec::with_capacity(MAX_DEBUG_PRIMS),
            verts: Vec::with_capacity(MAX_DEBUG_VERTS),
            vertex_buffer,
            overflowed: false,
        })
    }

    /// Releases the vertex buffer.
    pub fn shutdown(&mut self, device: &mut dyn RenderDevice) {
        if !self.vertex_buffer.is_null() {
            if let Err(e) = device.destroy_buffer(self.vertex_buffer) {
                log::warn!("DebugPrimitives: failed to destroy vertex buffer: {e}");
            }
            self.vertex_buffer = BufferId::NULL;
        }
        self.prims.clear();
        self.verts.clear();
    }

    /// Live primitives, in reservation order.
    pub fn prims(&self) -> &[DebugPrim] {
        &self.prims
    }

    /// Number of live vertices.
    pub fn num_verts(&self) -> usize {
        self.verts.len()
    }

    /// Vertices of `prim`.
    pub fn verts_of(&self, prim: &DebugPrim) -> &[Vec3] {
        &self.verts[prim.first_vert..prim.first_vert + prim.num_verts]
    }

    /// Reserves a primitive of `count` vertices and returns them for the
    /// caller to fill.
    ///
    /// Returns `None` when the buffer is full; the first overflow after each
    /// [`DebugPrimitives::clear`] is logged.
    #[allow(clippy::too_many_arguments)]
    pub fn reserve(
        &mut self,
        topology: Topology,
        count: usize,
        color: Vec4,
        line_width: f32,
        two_sided: bool,
        depth_test: bool,
        life_time: f32,
    ) -> Option<&mut [Vec3]> {
        if count == 0 || count > MAX_MERGED_VERTS {
            return None;
        }
        if self.prims.len() >= MAX_DEBUG_PRIMS || self.verts.len() + count > MAX_DEBUG_VERTS {
            if !self.overflowed {
                log::warn!(
                    "Debug primitive buffer is full ({} prims, {} verts)",
                    self.prims.len(),
                    self.verts.len()
                );
                self.overflowed = true;
            }
            return None;
        }

        let first_vert = self.verts.len();
        self.prims.push(DebugPrim {
            topology,
            first_vert,
            num_verts: count,
            color,
            line_width,
            two_sided,
            depth_test,
            life_time,
        });
        self.verts.resize(first_vert + count, Vec3::ZERO);
        Some(&mut self.verts[first_vert..])
    }

    /// Drops expired primitives.
    ///
    /// With `time` zero everything goes. Otherwise primitives whose life time
    /// is beyond `time` stay, and their vertices are moved down to stay
    /// contiguous.
    pub fn clear(&mut self, time: f32) {
        self.overflowed = false;

        if time == 0.0 {
            self.prims.clear();
            self.verts.clear();
            return;
        }

        let mut write_vert = 0;
        let verts = &mut self.verts;
        self.prims.retain_mut(|prim| {
            if prim.life_time <= time {
                return false;
            }
            verts.copy_within(prim.first_vert..prim.first_vert + prim.num_verts, write_vert);
            prim.first_vert = write_vert;
            write_vert += prim.num_verts;
            true
        });
        self.verts.truncate(write_vert);
    }

    /// Groups consecutive mergeable primitives into draw ranges over
    /// [`DebugPrimitives::prims`].
    pub fn merged_ranges(&self) -> Vec<std::ops::Range<usize>> {
        let mut ranges = Vec::new();
        let mut start = 0;
        let mut group_verts = 0;

        for (i, prim) in self.prims.iter().enumerate() {
            let merges = i > start
                && self.prims[start].can_merge(prim)
                && group_verts + prim.num_verts <= MAX_MERGED_VERTS;
            if i > start && !merges {
                ranges.push(start..i);
                start = i;
                group_verts = 0;
            }
            group_verts += prim.num_verts;
        }
        if start < self.prims.len() {
            ranges.push(start..self.prims.len());
        }
        ranges
    }

    /// Draws every live primitive with the vertex color shader, one draw per
    /// merged range.
    pub fn draw(&self, ctx: &mut BackEndContext, device: &mut dyn RenderDevice) {
        if self.prims.is_empty() || self.vertex_buffer.is_null() {
            return;
        }

        let shader = &ctx.shaders.vertex_color;
        let mut upload: Vec<DebugVert> = Vec::new();

        for range in self.merged_ranges() {
            let group = &self.prims[range];
            let head = group[0];

            upload.clear();
            for prim in group {
                let color = pack_color(prim.color);
                upload.extend(self.verts_of(prim).iter().map(|v| DebugVert {
                    xyz: [v.x, v.y, v.z],
                    color,
                }));
            }

            device.write_buffer_discard(self.vertex_buffer, bytemuck::cast_slice(&upload));
            device.set_vertex_format(VertexFormat::plain(VertexLayout::XyzColor));
            device.set_stream_source(0, self.vertex_buffer, 0, DEBUG_VERT_SIZE);

            device.bind_shader(shader.id);
            device.set_constant(
                ConstantKey::Builtin(BuiltinConstant::ModelViewProjectionMatrix),
                ConstantValue::Mat4 {
                    value: ctx.camera.view_projection,
                    transpose: false,
                },
            );

            let mut state = StateBits::COLOR_WRITE;
            if head.depth_test {
                state |= StateBits::DF_LEQUAL;
            } else {
                state |= StateBits::DF_ALWAYS;
            }
            if head.is_translucent() {
                state |= StateBits::BS_SRC_ALPHA | StateBits::BD_ONE_MINUS_SRC_ALPHA;
            } else {
                state |= StateBits::DEPTH_WRITE;
            }
            device.set_state_bits(state);
            device.set_cull_face(if head.two_sided {
                CullType::None
            } else {
                CullType::Back
            });

            if head.is_line() {
                device.set_line_width(head.line_width);
            }
            device.draw_arrays(head.topology, 0, upload.len() as u32);
            if head.is_line() {
                device.set_line_width(1.0);
            }

            ctx.counter.draw_calls += 1;
            ctx.counter.draw_verts += upload.len() as u32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(prims: &mut DebugPrimitives, color: Vec4, width: f32, life_time: f32) {
        let verts = prims
            .reserve(Topology::LineList, 2, color, width, false, true, life_time)
            .expect("room for a line");
        verts[0] = Vec3::ZERO;
        verts[1] = Vec3::X * life_time;
    }

    #[test]
    fn debug_vert_is_sixteen_bytes() {
        assert_eq!(DEBUG_VERT_SIZE, 16);
    }

    #[test]
    fn pack_color_puts_red_in_the_low_byte() {
        assert_eq!(pack_color(Vec4::new(1.0, 0.0, 0.0, 1.0)), 0xff0000ff);
        assert_eq!(pack_color(Vec4::new(0.0, 0.0, 1.0, 0.0)), 0x00ff0000);
    }

    #[test]
    fn compatible_lines_merge_into_one_range() {
        let mut prims = DebugPrimitives::default();
        line(&mut prims, Vec4::ONE, 1.0, 1.0);
        line(&mut prims, Vec4::new(1.0, 0.0, 0.0, 1.0), 1.0, 1.0);
        line(&mut prims, Vec4::ONE, 1.0, 1.0);
        assert_eq!(prims.merged_ranges(), vec![0..3]);
    }

    #[test]
    fn width_alpha_and_topology_split_ranges() {
        let mut prims = DebugPrimitives::default();
        line(&mut prims, Vec4::ONE, 1.0, 1.0);
        line(&mut prims, Vec4::ONE, 2.0, 1.0);
        line(&mut prims, Vec4::new(1.0, 1.0, 1.0, 0.5), 2.0, 1.0);
        prims
            .reserve(Topology::TriangleList, 3, Vec4::ONE, 1.0, false, true, 1.0)
            .expect("room for a triangle");
        prims
            .reserve(Topology::LineStrip, 3, Vec4::ONE, 1.0, false, true, 1.0)
            .expect("room for a strip");
        prims
            .reserve(Topology::LineStrip, 3, Vec4::ONE, 1.0, false, true, 1.0)
            .expect("room for a strip");
        assert_eq!(prims.merged_ranges(), vec![0..1, 1..2, 2..3, 3..4, 4..5, 5..6]);
    }

    #[test]
    fn reserve_fails_past_vertex_capacity() {
        let mut prims = DebugPrimitives::default();
        assert!(prims
            .reserve(Topology::PointList, MAX_MERGED_VERTS, Vec4::ONE, 1.0, false, true, 0.0)
            .is_some());
        assert!(prims
            .reserve(Topology::PointList, MAX_MERGED_VERTS, Vec4::ONE, 1.0, false, true, 0.0)
            .is_some());
        assert!(prims
            .reserve(Topology::PointList, 1, Vec4::ONE, 1.0, false, true, 0.0)
            .is_none());
        assert_eq!(prims.num_verts(), MAX_DEBUG_VERTS);
    }

    #[test]
    fn reserve_fails_past_prim_capacity() {
        let mut prims = DebugPrimitives::default();
        for _ in 0..MAX_DEBUG_PRIMS {
            assert!(prims
                .reserve(Topology::PointList, 1, Vec4::ONE, 1.0, false, true, 0.0)
                .is_some());
        }
        assert!(prims
            .reserve(Topology::PointList, 1, Vec4::ONE, 1.0, false, true, 0.0)
            .is_none());
    }

    #[test]
    fn clear_with_time_keeps_live_prims_and_compacts() {
        let mut prims = DebugPrimitives::default();
        line(&mut prims, Vec4::ONE, 1.0, 1.0);
        line(&mut prims, Vec4::ONE, 1.0, 5.0);
        line(&mut prims, Vec4::ONE, 1.0, 2.0);
        line(&mut prims, Vec4::ONE, 1.0, 9.0);

        prims.clear(2.0);

        assert_eq!(prims.prims().len(), 2);
        assert_eq!(prims.num_verts(), 4);
        let first = prims.prims()[0];
        let second = prims.prims()[1];
        assert_eq!(first.first_vert, 0);
        assert_eq!(second.first_vert, 2);
        assert_eq!(prims.verts_of(&first)[1], Vec3::X * 5.0);
        assert_eq!(prims.verts_of(&second)[1], Vec3::X * 9.0);
    }

    #[test]
    fn clear_with_zero_drops_everything() {
        let mut prims = DebugPrimitives::default();
        line(&mut prims, Vec4::ONE, 1.0, 100.0);
        prims.clear(0.0);
        assert!(prims.prims().is_empty());
        assert_eq!(prims.num_verts(), 0);
    }
}
