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

//! The surface batch: merges consecutive draw surfaces into one GPU draw.
//!
//! A pass driver declares where the next surfaces come from with
//! [`Batch::begin`], feeds geometry with [`Batch::draw_sub_mesh`] and
//! [`Batch::add_instance`], and [`Batch::flush`] issues the accumulated work
//! as exactly one draw call. Merging is decided by identity and contiguity:
//!
//! - static geometry merges only with itself (same cached buffers),
//! - dynamic geometry merges when its indices directly follow the
//!   accumulated range in the same buffers,
//! - instanced surfaces merge into indirect commands or a uniform window of
//!   instance rows, bounded by the maximum instancing count.
//!
//! Running out of room is never an error: the batch flushes and starts over.

mod constants;
mod flush;
mod routines;
mod shader_select;

pub use self::flush::FlushKind;

use super::context::BackEndContext;
use ember_core::renderer::api::{
    BufferId, BufferKind, BufferUsage, DrawElementsIndirectCommand, DrawSurf, InstancingMethod,
    Material, MaterialFlags, RenderSettings, SubMesh, VisibleLight, VisibleObject,
};
use ember_core::renderer::{RenderDevice, ResourceError};
use std::sync::Arc;

/// Size in bytes of one indirect draw record.
pub const INDIRECT_COMMAND_SIZE: u32 = std::mem::size_of::<DrawElementsIndirectCommand>() as u32;

/// The accumulator shared by every pass driver.
#[derive(Debug)]
pub struct Batch {
    kind: FlushKind,
    material: Option<Arc<Material>>,
    material_registers: Option<Arc<[f32]>>,
    object: Option<Arc<VisibleObject>>,
    light: Option<Arc<VisibleLight>>,
    sub_mesh: Option<Arc<SubMesh>>,

    vertex_buffer: BufferId,
    index_buffer: BufferId,
    vertex_offset: u32,
    start_index: Option<u32>,
    num_verts: u32,
    num_indexes: u32,

    instancing_method: InstancingMethod,
    max_instancing_count: u32,
    num_instances: u32,
    instance_window: Option<(u32, u32)>,
    instance_locals: Vec<i32>,
    indirect_commands: Vec<DrawElementsIndirectCommand>,
    indirect_buffer: BufferId,
}

/// The accumulated state of a non-empty batch, handed to the flush routines.
pub(crate) struct BatchDraw<'a> {
    pub batch: &'a Batch,
    pub material: &'a Arc<Material>,
    pub object: &'a Arc<VisibleObject>,
    pub sub_mesh: &'a Arc<SubMesh>,
    pub light: Option<&'a Arc<VisibleLight>>,
}

impl Batch {
    /// Creates the batch and the side buffers of the configured instancing
    /// method.
    ///
    /// # Arguments
    ///
    /// * `device`: The device the indirect command buffer is created on.
    /// * `settings`: Selects the instancing method and its capacity.
    ///
    /// # Errors
    ///
    /// Returns the device error if the indirect command buffer cannot be created.
    pub fn init(
        device: &mut dyn RenderDevice,
        settings: &RenderSettings,
    ) -> Result<Self, ResourceError> {
        let instancing_method = settings.instancing_method;
        let max_instancing_count = settings.effective_max_instancing_count();

        let indirect_buffer = if instancing_method == InstancingMethod::InstancedArrays {
            device.create_buffer(
                BufferKind::DrawIndirect,
                BufferUsage::Stream,
                max_instancing_count.max(1) * INDIRECT_COMMAND_SIZE,
                "Batch Indirect Commands",
            )?
        } else {
            BufferId::NULL
        };

        log::info!(
            "Batch initialized: {:?} instancing, up to {} instances per draw",
            instancing_method,
            max_instancing_count
        );

        Ok(Self {
            kind: FlushKind::Base,
            material: None,
            material_registers: None,
            object: None,
            light: None,
            sub_mesh: None,
            vertex_buffer: BufferId::NULL,
            index_buffer: BufferId::NULL,
            vertex_offset: 0,
            start_index: None,
            num_verts: 0,
            num_indexes: 0,
            instancing_method,
            max_instancing_count,
            num_instances: 0,
            instance_window: None,
            instance_locals: Vec::with_capacity(max_instancing_count as usize),
            indirect_commands: Vec::with_capacity(max_instancing_count as usize),
            indirect_buffer,
        })
    }

    /// Releases the side buffers.
    pub fn shutdown(&mut self, device: &mut dyn RenderDevice) {
        if !self.indirect_buffer.is_null() {
            if let Err(e) = device.destroy_buffer(self.indirect_buffer) {
                log::warn!("Batch: failed to destroy indirect buffer: {e}");
            }
            self.indirect_buffer = BufferId::NULL;
        }
        self.indirect_commands.clear();
        self.instance_locals.clear();
        log::info!("Batch shut down");
    }

    /// Declares the source of the next surfaces.
    ///
    /// Touches no GPU state. Anything accumulated for another source must
    /// have been flushed by the caller, except instanced runs that continue
    /// across objects.
    ///
    /// # Arguments
    ///
    /// * `kind`: The flush routine used when the batch is drawn.
    /// * `material`: The material of the surfaces.
    /// * `material_registers`: Per-surface material parameters.
    /// * `object`: The object the surfaces belong to.
    pub fn begin(
        &mut self,
        kind: FlushKind,
        material: &Arc<Material>,
        material_registers: Option<&Arc<[f32]>>,
        object: &Arc<VisibleObject>,
    ) {
        self.kind = kind;
        self.material = Some(material.clone());
        self.material_registers = material_registers.cloned();
        self.object = Some(object.clone());
    }

    /// Sets the light lit or shadow-mapped by the following flushes.
    pub fn set_current_light(&mut self, light: Option<&Arc<VisibleLight>>) {
        self.light = light.cloned();
    }

    /// `true` if surfaces may be merged through GPU instancing.
    #[inline]
    pub fn instancing_enabled(&self) -> bool {
        self.instancing_method != InstancingMethod::NoInstancing && self.max_instancing_count > 0
    }

    /// Adds the instance row of `surf`'s object to the batch.
    ///
    /// Flushes first when the instance would overflow the current indirect
    /// command or uniform window.
    pub fn add_instance(
        &mut self,
        ctx: &mut BackEndContext,
        device: &mut dyn RenderDevice,
        surf: &DrawSurf,
    ) {
        let index = surf.object.instance_index;
        match self.instancing_method {
            InstancingMethod::InstancedArrays => {
                self.add_indirect_instance(ctx, device, &surf.sub_mesh, index)
            }
            InstancingMethod::UniformBuffer => self.add_uniform_instance(ctx, device, index),
            InstancingMethod::NoInstancing => {
                debug_assert!(false, "add_instance called with instancing disabled");
            }
        }
    }

    fn add_indirect_instance(
        &mut self,
        ctx: &mut BackEndContext,
        device: &mut dyn RenderDevice,
        sub_mesh: &SubMesh,
        index: u32,
    ) {
        let max = self.max_instancing_count;
        let last = self
            .indirect_commands
            .last()
            .map(|cmd| (cmd.base_instance + cmd.instance_count == index, cmd.instance_count < max));

        match last {
            Some((true, true)) => {
                if let Some(cmd) = self.indirect_commands.last_mut() {
                    cmd.instance_count += 1;
                }
                self.num_instances += 1;
                return;
            }
            Some((true, false)) => self.flush(ctx, device),
            Some((false, _)) if self.indirect_commands.len() as u32 >= max => {
                self.flush(ctx, device)
            }
            _ => {}
        }

        self.indirect_commands.push(DrawElementsIndirectCommand {
            count: sub_mesh.num_indexes,
            instance_count: 1,
            first_index: sub_mesh.index_cache.first_index(),
            base_vertex: 0,
            base_instance: index,
        });
        self.num_instances += 1;
    }

    fn add_uniform_instance(
        &mut self,
        ctx: &mut BackEndContext,
        device: &mut dyn RenderDevice,
        index: u32,
    ) {
        let (start, end) = match self.instance_window {
            Some((start, end)) if index >= start && index - start < self.max_instancing_count => {
                (start, end.max(index))
            }
            Some(_) => {
                self.flush(ctx, device);
                (index, index)
            }
            None => (index, index),
        };

        self.instance_window = Some((start, end));
        self.instance_locals.push((index - start) as i32);
        self.num_instances += 1;
    }

    /// Appends the geometry of `sub_mesh` to the batch.
    ///
    /// Static geometry already covered by the batch is a no-op. Dynamic
    /// geometry is appended when its indices directly follow the accumulated
    /// range, otherwise the batch is flushed and a new range starts.
    pub fn draw_sub_mesh(
        &mut self,
        ctx: &mut BackEndContext,
        device: &mut dyn RenderDevice,
        sub_mesh: &Arc<SubMesh>,
    ) {
        let valid = sub_mesh.vertex_cache.is_valid_for(ctx.frame)
            && sub_mesh.index_cache.is_valid_for(ctx.frame);
        debug_assert!(
            valid,
            "sub-mesh {} drawn with buffer caches of another frame",
            sub_mesh.ref_id
        );
        if !valid {
            log::warn!(
                "Batch: skipping sub-mesh {} with stale buffer caches at frame {}",
                sub_mesh.ref_id,
                ctx.frame
            );
            return;
        }

        if sub_mesh.is_dynamic() {
            self.draw_dynamic_sub_mesh(ctx, device, sub_mesh);
        } else {
            self.draw_static_sub_mesh(ctx, device, sub_mesh);
        }
    }

    fn draw_static_sub_mesh(
        &mut self,
        ctx: &mut BackEndContext,
        device: &mut dyn RenderDevice,
        sub_mesh: &Arc<SubMesh>,
    ) {
        match self.sub_mesh.as_ref().map(|current| current.is_shared(sub_mesh)) {
            Some(true) => return,
            Some(false) => self.flush(ctx, device),
            None => {}
        }

        self.sub_mesh = Some(sub_mesh.clone());
        self.vertex_buffer = sub_mesh.vertex_cache.buffer;
        self.index_buffer = sub_mesh.index_cache.buffer;
        self.vertex_offset = sub_mesh.vertex_cache.offset;
        self.start_index = Some(sub_mesh.index_cache.first_index());
        self.num_verts = sub_mesh.num_verts;
        self.num_indexes = sub_mesh.num_indexes;
    }

    fn draw_dynamic_sub_mesh(
        &mut self,
        ctx: &mut BackEndContext,
        device: &mut dyn RenderDevice,
        sub_mesh: &Arc<SubMesh>,
    ) {
        let first_index = sub_mesh.index_cache.first_index();

        if let Some(start) = self.start_index {
            let contiguous = start + self.num_indexes == first_index
                && self.vertex_buffer == sub_mesh.vertex_cache.buffer
                && self.index_buffer == sub_mesh.index_cache.buffer;
            if !contiguous {
                self.flush(ctx, device);
                self.start_index = Some(first_index);
            }
        } else {
            self.start_index = Some(first_index);
        }

        self.vertex_buffer = sub_mesh.vertex_cache.buffer;
        self.index_buffer = sub_mesh.index_cache.buffer;
        self.vertex_offset = 0;
        self.num_verts += sub_mesh.num_verts;
        self.num_indexes += sub_mesh.num_indexes;
        self.sub_mesh = Some(sub_mesh.clone());
    }

    /// Draws everything accumulated since the last flush with one draw call.
    ///
    /// Does nothing when no index has been accumulated.
    pub fn flush(&mut self, ctx: &mut BackEndContext, device: &mut dyn RenderDevice) {
        if self.num_indexes == 0 {
            return;
        }

        let (Some(material), Some(object), Some(sub_mesh)) = (
            self.material.clone(),
            self.object.clone(),
            self.sub_mesh.clone(),
        ) else {
            debug_assert!(false, "Batch::flush without a preceding begin");
            self.reset();
            return;
        };

        let entry = self.kind.entry();
        log::trace!(
            "Batch: flushing {} ({} indexes, {} instances, {} indirect commands)",
            entry.name,
            self.num_indexes,
            self.num_instances,
            self.indirect_commands.len()
        );

        let polygon_offset =
            entry.polygon_offset && material.flags.contains(MaterialFlags::POLYGON_OFFSET);
        if polygon_offset {
            device.set_depth_bias(ctx.settings.offset_factor, ctx.settings.offset_units);
        }

        let draw = BatchDraw {
            batch: self,
            material: &material,
            object: &object,
            sub_mesh: &sub_mesh,
            light: self.light.as_ref(),
        };
        (entry.routine)(&draw, ctx, device);

        if polygon_offset {
            device.set_depth_bias(0.0, 0.0);
        }

        self.reset();
    }

    fn reset(&mut self) {
        self.start_index = None;
        self.sub_mesh = None;
        self.num_verts = 0;
        self.num_indexes = 0;
        self.num_instances = 0;
        self.instance_window = None;
        self.instance_locals.clear();
        self.indirect_commands.clear();
    }

    /// `true` if nothing is waiting to be drawn.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_indexes == 0
    }

    /// The flush routine selected by the last [`Batch::begin`].
    #[inline]
    pub fn kind(&self) -> FlushKind {
        self.kind
    }

    /// Accumulated vertex count.
    #[inline]
    pub fn num_verts(&self) -> u32 {
        self.num_verts
    }

    /// Accumulated index count.
    #[inline]
    pub fn num_indexes(&self) -> u32 {
        self.num_indexes
    }

    /// First index of the accumulated range.
    #[inline]
    pub fn start_index(&self) -> Option<u32> {
        self.start_index
    }

    /// Accumulated instance count.
    #[inline]
    pub fn num_instances(&self) -> u32 {
        self.num_instances
    }

    /// Pending indirect draw records.
    #[inline]
    pub fn indirect_commands(&self) -> &[DrawElementsIndirectCommand] {
        &self.indirect_commands
    }

    /// The `(first, last)` instance rows of the uniform window.
    #[inline]
    pub fn instance_window(&self) -> Option<(u32, u32)> {
        self.instance_window
    }

    /// Window-relative instance rows, in submission order.
    #[inline]
    pub fn instance_locals(&self) -> &[i32] {
        &self.instance_locals
    }

    /// Maximum number of instances merged into one draw.
    #[inline]
    pub fn max_instancing_count(&self) -> u32 {
        self.max_instancing_count
    }

    /// The buffer indirect records are uploaded to.
    #[inline]
    pub fn indirect_buffer(&self) -> BufferId {
        self.indirect_buffer
    }
}
