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

use crate::math::Vec4;
use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use std::fmt::Debug;

/// The hardware abstraction the back end draws through.
///
/// Resource creation and uploads may fail and report a [`ResourceError`].
/// Everything else is an infallible, fire-and-forget command: a backend that
/// hits an error while executing one reports it through its own diagnostics.
pub trait RenderDevice: Debug {
    /// Creates a new GPU buffer.
    /// ## Arguments
    /// * `kind` - What the buffer will be bound as.
    /// * `usage` - How often its contents change.
    /// * `size` - Size in bytes.
    /// * `label` - A debug label.
    /// ## Returns
    /// A `Result` containing the ID of the created buffer or an error if the creation fails.
    fn create_buffer(
        &mut self,
        kind: BufferKind,
        usage: BufferUsage,
        size: u32,
        label: &str,
    ) -> Result<BufferId, ResourceError>;

    /// Destroys a GPU buffer.
    /// ## Arguments
    /// * `id` - The ID of the buffer to be destroyed.
    /// ## Returns
    /// A `Result` indicating success or failure of the operation.
    fn destroy_buffer(&mut self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes data to a GPU buffer.
    /// ## Arguments
    /// * `id` - The ID of the buffer to write to.
    /// * `offset` - The offset in the buffer where the data will be written.
    /// * `data` - A slice of bytes containing the data to be written.
    /// ## Returns
    /// A `Result` indicating success or failure of the operation.
    fn write_buffer(&mut self, id: BufferId, offset: u32, data: &[u8]) -> Result<(), ResourceError>;

    /// Replaces the whole content of `id` with `data`, orphaning the storage
    /// the GPU may still be reading.
    fn write_buffer_discard(&mut self, id: BufferId, data: &[u8]);

    /// Binds a buffer to its kind's binding point.
    fn bind_buffer(&mut self, kind: BufferKind, id: BufferId);

    /// Binds a range of a buffer to an indexed binding point.
    fn bind_buffer_range(&mut self, kind: BufferKind, binding: u32, id: BufferId, offset: u32, size: u32);

    /// Selects the vertex input layout.
    fn set_vertex_format(&mut self, format: VertexFormat);

    /// Feeds vertex stream `stream` from `buffer`, starting at byte `offset`.
    fn set_stream_source(&mut self, stream: u32, buffer: BufferId, offset: u32, stride: u32);

    /// Sets the fixed-function state.
    fn set_state_bits(&mut self, bits: StateBits);

    /// Sets face culling.
    fn set_cull_face(&mut self, cull: CullType);

    /// Sets the polygon offset. `(0, 0)` disables it.
    fn set_depth_bias(&mut self, factor: f32, units: f32);

    /// Maps normalized depth into `[near, far]`.
    fn set_depth_range(&mut self, near: f32, far: f32);

    /// Clamps depth instead of clipping against the near and far planes.
    fn set_depth_clamp(&mut self, enable: bool);

    /// Sets the rasterized line width.
    fn set_line_width(&mut self, width: f32);

    /// Sets the viewport.
    fn set_viewport(&mut self, rect: Rect);

    /// Sets the scissor rectangle. An empty rectangle disables scissoring.
    fn set_scissor(&mut self, rect: Rect);

    /// Clears the selected planes of the current target.
    fn clear(&mut self, flags: ClearFlags, color: Vec4, depth: f32);

    /// `true` if color writes are converted from linear to sRGB.
    fn is_srgb_write_enabled(&self) -> bool;

    /// Redirects drawing into `target`. `layer` selects the cube face or
    /// array slice for layered targets.
    fn begin_render_target(&mut self, target: RenderTargetId, layer: u32);

    /// Restores drawing into the previous target.
    fn end_render_target(&mut self);

    /// Makes `shader` the current program.
    fn bind_shader(&mut self, shader: ShaderId);

    /// Sets a constant of the current program.
    fn set_constant(&mut self, key: ConstantKey<'_>, value: ConstantValue<'_>);

    /// Binds a texture to a sampler of the current program.
    fn set_texture(&mut self, key: SamplerKey<'_>, texture: TextureId);

    /// Draws `count` indices of the bound index buffer starting at `start_index`.
    fn draw_elements(&mut self, topology: Topology, start_index: u32, count: u32);

    /// Draws `instance_count` instances of an indexed range.
    fn draw_elements_instanced(
        &mut self,
        topology: Topology,
        start_index: u32,
        count: u32,
        instance_count: u32,
    );

    /// Draws `draw_count` commands read from the bound indirect buffer.
    fn multi_draw_elements_indirect(
        &mut self,
        topology: Topology,
        offset: u32,
        draw_count: u32,
        stride: u32,
    );

    /// Draws `count` vertices of the bound vertex buffer starting at `first`.
    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32);
}
