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

//! A render device that keeps buffers in memory and logs what it is asked to do.

use ember_core::math::Vec4;
use ember_core::renderer::api::{
    BufferId, BufferKind, BufferUsage, ClearFlags, ConstantKey, ConstantValue, CullType,
    RenderTargetId, SamplerKey, ShaderId, StateBits, TextureId, Topology, VertexFormat,
};
use ember_core::renderer::{Rect, RenderDevice, ResourceError};
use std::collections::HashMap;

/// Calls the device saw since the last [`LoggingDevice::take_stats`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceStats {
    pub draws: u32,
    pub indirect_commands: u32,
    pub state_changes: u32,
    pub target_switches: u32,
    pub clears: u32,
    pub uploaded_bytes: usize,
}

/// Headless device: buffers live in host memory, draws are only logged.
#[derive(Debug, Default)]
pub struct LoggingDevice {
    buffers: HashMap<BufferId, (BufferKind, Vec<u8>)>,
    next_id: usize,
    target: Option<(RenderTargetId, u32)>,
    stats: DeviceStats,
}

impl LoggingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stats gathered so far and starts over.
    pub fn take_stats(&mut self) -> DeviceStats {
        std::mem::take(&mut self.stats)
    }

    /// Number of buffers still alive.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    fn buffer_mut(&mut self, id: BufferId) -> Result<&mut Vec<u8>, ResourceError> {
        self.buffers
            .get_mut(&id)
            .map(|(_, data)| data)
            .ok_or(ResourceError::InvalidHandle(id))
    }

    fn target_name(&self) -> String {
        match self.target {
            Some((id, layer)) => format!("target {} layer {}", id.0, layer),
            None => "back buffer".to_string(),
        }
    }
}

impl RenderDevice for LoggingDevice {
    fn create_buffer(
        &mut self,
        kind: BufferKind,
        usage: BufferUsage,
        size: u32,
        label: &str,
    ) -> Result<BufferId, ResourceError> {
        self.next_id += 1;
        let id = BufferId(self.next_id);
        self.buffers.insert(id, (kind, vec![0; size as usize]));
        log::debug!("Created {kind:?} buffer '{label}' ({size} bytes, {usage:?}) as {id:?}");
        Ok(id)
    }

    fn destroy_buffer(&mut self, id: BufferId) -> Result<(), ResourceError> {
        let (kind, _) = self
            .buffers
            .remove(&id)
            .ok_or(ResourceError::InvalidHandle(id))?;
        log::debug!("Destroyed {kind:?} buffer {id:?}");
        Ok(())
    }

    fn write_buffer(&mut self, id: BufferId, offset: u32, data: &[u8]) -> Result<(), ResourceError> {
        let buffer = self.buffer_mut(id)?;
        let end = offset as usize + data.len();
        if end > buffer.len() {
            return Err(ResourceError::BackendError(format!(
                "write of {} bytes at {} overflows {:?} ({} bytes)",
                data.len(),
                offset,
                id,
                buffer.len()
            )));
        }
        buffer[offset as usize..end].copy_from_slice(data);
        self.stats.uploaded_bytes += data.len();
        Ok(())
    }

    fn write_buffer_discard(&mut self, id: BufferId, data: &[u8]) {
        match self.buffer_mut(id) {
            Ok(buffer) => {
                buffer.clear();
                buffer.extend_from_slice(data);
            }
            Err(e) => {
                log::warn!("Discarding write: {e}");
                return;
            }
        }
        self.stats.uploaded_bytes += data.len();
    }

    fn bind_buffer(&mut self, _kind: BufferKind, _id: BufferId) {}

    fn bind_buffer_range(&mut self, _kind: BufferKind, _binding: u32, _id: BufferId, _offset: u32, _size: u32) {}

    fn set_vertex_format(&mut self, _format: VertexFormat) {}

    fn set_stream_source(&mut self, _stream: u32, _buffer: BufferId, _offset: u32, _stride: u32) {}

    fn set_state_bits(&mut self, _bits: StateBits) {
        self.stats.state_changes += 1;
    }

    fn set_cull_face(&mut self, _cull: CullType) {}

    fn set_depth_bias(&mut self, _factor: f32, _units: f32) {}

    fn set_depth_range(&mut self, _near: f32, _far: f32) {}

    fn set_depth_clamp(&mut self, _enable: bool) {}

    fn set_line_width(&mut self, _width: f32) {}

    fn set_viewport(&mut self, _rect: Rect) {}

    fn set_scissor(&mut self, _rect: Rect) {}

    fn clear(&mut self, flags: ClearFlags, _color: Vec4, _depth: f32) {
        self.stats.clears += 1;
        log::trace!("Clear {:?} of {}", flags, self.target_name());
    }

    fn is_srgb_write_enabled(&self) -> bool {
        false
    }

    fn begin_render_target(&mut self, target: RenderTargetId, layer: u32) {
        self.target = Some((target, layer));
        self.stats.target_switches += 1;
    }

    fn end_render_target(&mut self) {
        self.target = None;
    }

    fn bind_shader(&mut self, _shader: ShaderId) {}

    fn set_constant(&mut self, _key: ConstantKey<'_>, _value: ConstantValue<'_>) {}

    fn set_texture(&mut self, _key: SamplerKey<'_>, _texture: TextureId) {}

    fn draw_elements(&mut self, topology: Topology, start_index: u32, count: u32) {
        self.stats.draws += 1;
        log::trace!("{topology:?}: {count} indexes from {start_index} into {}", self.target_name());
    }

    fn draw_elements_instanced(
        &mut self,
        topology: Topology,
        start_index: u32,
        count: u32,
        instance_count: u32,
    ) {
        self.stats.draws += 1;
        log::trace!(
            "{topology:?}: {count} indexes from {start_index}, {instance_count} instances into {}",
            self.target_name()
        );
    }

    fn multi_draw_elements_indirect(
        &mut self,
        topology: Topology,
        _offset: u32,
        draw_count: u32,
        _stride: u32,
    ) {
        self.stats.draws += 1;
        self.stats.indirect_commands += draw_count;
        log::trace!("{topology:?}: {draw_count} indirect commands into {}", self.target_name());
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        self.stats.draws += 1;
        log::trace!("{topology:?}: {count} vertices from {first} into {}", self.target_name());
    }
}
