//! Shared fixtures: a device that records every call, and builders for the
//! scene records the back end consumes.

#![allow(dead_code)]

use ember_core::math::{Aabb, Frustum, Mat3, Mat4, Vec3, Vec4};
use ember_core::renderer::api::*;
use ember_core::renderer::{Rect, RenderDevice, ResourceError};
use ember_lanes::render_lane::passes;
use ember_lanes::render_lane::{
    BackEndContext, Batch, BuiltinShaders, BuiltinTextures, DebugPrimitives, RenderTargets,
    ShadowScheduler,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateBuffer { id: BufferId, kind: BufferKind, size: u32 },
    DestroyBuffer(BufferId),
    WriteBuffer { id: BufferId, offset: u32, len: usize },
    WriteBufferDiscard { id: BufferId, len: usize },
    BindBuffer(BufferKind, BufferId),
    BindBufferRange { kind: BufferKind, binding: u32, id: BufferId, offset: u32, size: u32 },
    SetVertexFormat(VertexFormat),
    SetStreamSource { stream: u32, buffer: BufferId, offset: u32, stride: u32 },
    SetStateBits(StateBits),
    SetCullFace(CullType),
    SetDepthBias(f32, f32),
    SetDepthRange(f32, f32),
    SetDepthClamp(bool),
    SetLineWidth(f32),
    SetViewport(Rect),
    SetScissor(Rect),
    Clear(ClearFlags),
    BeginRenderTarget(RenderTargetId, u32),
    EndRenderTarget,
    BindShader(ShaderId),
    SetConstant(String),
    SetTexture(String, TextureId),
    DrawElements { start_index: u32, count: u32 },
    DrawElementsInstanced { start_index: u32, count: u32, instance_count: u32 },
    MultiDrawElementsIndirect { draw_count: u32, commands: Vec<DrawElementsIndirectCommand> },
    DrawArrays { topology: Topology, first: u32, count: u32 },
}

impl DeviceCall {
    /// `true` for calls that rasterize something.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            DeviceCall::DrawElements { .. }
                | DeviceCall::DrawElementsInstanced { .. }
                | DeviceCall::MultiDrawElementsIndirect { .. }
                | DeviceCall::DrawArrays { .. }
        )
    }
}

static NEXT_BUFFER_ID: AtomicUsize = AtomicUsize::new(1);

/// A device that does nothing but remember what it was asked.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    pub calls: Vec<DeviceCall>,
    pub fail_buffer_creation: bool,
    buffers: HashMap<BufferId, Vec<u8>>,
    bound_indirect: BufferId,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draws(&self) -> Vec<&DeviceCall> {
        self.calls.iter().filter(|c| c.is_draw()).collect()
    }

    pub fn draw_count(&self) -> usize {
        self.calls.iter().filter(|c| c.is_draw()).count()
    }

    pub fn count(&self, pred: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn constant_name(key: ConstantKey<'_>) -> String {
        match key {
            ConstantKey::Builtin(c) => format!("{c:?}"),
            ConstantKey::Named(n) => n.to_string(),
        }
    }
}

impl RenderDevice for RecordingDevice {
    fn create_buffer(
        &mut self,
        kind: BufferKind,
        _usage: BufferUsage,
        size: u32,
        label: &str,
    ) -> Result<BufferId, ResourceError> {
        if self.fail_buffer_creation {
            return Err(ResourceError::BufferCreation {
                kind,
                label: label.to_string(),
                reason: "refused by the recording device".to_string(),
            });
        }
        let id = BufferId(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed));
        self.buffers.insert(id, vec![0; size as usize]);
        self.calls.push(DeviceCall::CreateBuffer { id, kind, size });
        Ok(id)
    }

    fn destroy_buffer(&mut self, id: BufferId) -> Result<(), ResourceError> {
        self.buffers
            .remove(&id)
            .ok_or(ResourceError::InvalidHandle(id))?;
        self.calls.push(DeviceCall::DestroyBuffer(id));
        Ok(())
    }

    fn write_buffer(&mut self, id: BufferId, offset: u32, data: &[u8]) -> Result<(), ResourceError> {
        let buffer = self
            .buffers
            .get_mut(&id)
            .ok_or(ResourceError::InvalidHandle(id))?;
        let end = offset as usize + data.len();
        if buffer.len() < end {
            buffer.resize(end, 0);
        }
        buffer[offset as usize..end].copy_from_slice(data);
        self.calls.push(DeviceCall::WriteBuffer { id, offset, len: data.len() });
        Ok(())
    }

    fn write_buffer_discard(&mut self, id: BufferId, data: &[u8]) {
        self.buffers.insert(id, data.to_vec());
        self.calls.push(DeviceCall::WriteBufferDiscard { id, len: data.len() });
    }

    fn bind_buffer(&mut self, kind: BufferKind, id: BufferId) {
        if kind == BufferKind::DrawIndirect {
            self.bound_indirect = id;
        }
        self.calls.push(DeviceCall::BindBuffer(kind, id));
    }

    fn bind_buffer_range(&mut self, kind: BufferKind, binding: u32, id: BufferId, offset: u32, size: u32) {
        self.calls.push(DeviceCall::BindBufferRange { kind, binding, id, offset, size });
    }

    fn set_vertex_format(&mut self, format: VertexFormat) {
        self.calls.push(DeviceCall::SetVertexFormat(format));
    }

    fn set_stream_source(&mut self, stream: u32, buffer: BufferId, offset: u32, stride: u32) {
        self.calls.push(DeviceCall::SetStreamSource { stream, buffer, offset, stride });
    }

    fn set_state_bits(&mut self, bits: StateBits) {
        self.calls.push(DeviceCall::SetStateBits(bits));
    }

    fn set_cull_face(&mut self, cull: CullType) {
        self.calls.push(DeviceCall::SetCullFace(cull));
    }

    fn set_depth_bias(&mut self, factor: f32, units: f32) {
        self.calls.push(DeviceCall::SetDepthBias(factor, units));
    }

    fn set_depth_range(&mut self, near: f32, far: f32) {
        self.calls.push(DeviceCall::SetDepthRange(near, far));
    }

    fn set_depth_clamp(&mut self, enable: bool) {
        self.calls.push(DeviceCall::SetDepthClamp(enable));
    }

    fn set_line_width(&mut self, width: f32) {
        self.calls.push(DeviceCall::SetLineWidth(width));
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.calls.push(DeviceCall::SetViewport(rect));
    }

    fn set_scissor(&mut self, rect: Rect) {
        self.calls.push(DeviceCall::SetScissor(rect));
    }

    fn clear(&mut self, flags: ClearFlags, _color: Vec4, _depth: f32) {
        self.calls.push(DeviceCall::Clear(flags));
    }

    fn is_srgb_write_enabled(&self) -> bool {
        false
    }

    fn begin_render_target(&mut self, target: RenderTargetId, layer: u32) {
        self.calls.push(DeviceCall::BeginRenderTarget(target, layer));
    }

    fn end_render_target(&mut self) {
        self.calls.push(DeviceCall::EndRenderTarget);
    }

    fn bind_shader(&mut self, shader: ShaderId) {
        self.calls.push(DeviceCall::BindShader(shader));
    }

    fn set_constant(&mut self, key: ConstantKey<'_>, _value: ConstantValue<'_>) {
        self.calls.push(DeviceCall::SetConstant(Self::constant_name(key)));
    }

    fn set_texture(&mut self, key: SamplerKey<'_>, texture: TextureId) {
        let name = match key {
            SamplerKey::Builtin(s) => format!("{s:?}"),
            SamplerKey::Named(n) => n.to_string(),
        };
        self.calls.push(DeviceCall::SetTexture(name, texture));
    }

    fn draw_elements(&mut self, _topology: Topology, start_index: u32, count: u32) {
        self.calls.push(DeviceCall::DrawElements { start_index, count });
    }

    fn draw_elements_instanced(
        &mut self,
        _topology: Topology,
        start_index: u32,
        count: u32,
        instance_count: u32,
    ) {
        self.calls.push(DeviceCall::DrawElementsInstanced { start_index, count, instance_count });
    }

    fn multi_draw_elements_indirect(
        &mut self,
        _topology: Topology,
        offset: u32,
        draw_count: u32,
        stride: u32,
    ) {
        let commands = self
            .buffers
            .get(&self.bound_indirect)
            .map(|bytes| {
                (0..draw_count as usize)
                    .filter_map(|i| {
                        let start = offset as usize + i * stride as usize;
                        let end = start + std::mem::size_of::<DrawElementsIndirectCommand>();
                        bytes
                            .get(start..end)
                            .map(bytemuck::pod_read_unaligned::<DrawElementsIndirectCommand>)
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.calls.push(DeviceCall::MultiDrawElementsIndirect { draw_count, commands });
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        self.calls.push(DeviceCall::DrawArrays { topology, first, count });
    }
}

// Scene fixtures

pub const SCREEN: Rect = Rect::new(0, 0, 1280, 720);

pub fn shader(id: usize, name: &str, flags: ShaderFlags) -> Arc<Shader> {
    Arc::new(
        Shader::new(ShaderId(id), name)
            .with_flags(flags)
            .with_constants([
                BuiltinConstant::ModelViewProjectionMatrix,
                BuiltinConstant::ConstantColor,
            ]),
    )
}

pub fn builtin_shaders() -> BuiltinShaders {
    let mut next = 100;
    BuiltinShaders::with_loader(|name| {
        next += 1;
        shader(next, name, ShaderFlags::empty())
    })
}

pub fn builtin_textures() -> BuiltinTextures {
    BuiltinTextures {
        white: TextureId(1),
        fog: TextureId(2),
        fog_enter: TextureId(3),
        prefiltered_dfg: TextureId(4),
        cubic_normal_cube: TextureId(5),
        indirection_cube: TextureId(6),
        screen_depth: TextureId(7),
    }
}

pub fn target(id: usize, width: u32, height: u32) -> RenderTarget {
    RenderTarget {
        id: RenderTargetId(id),
        depth_texture: TextureId(100 + id),
        width,
        height,
    }
}

pub const SHADOW_MAP: RenderTargetId = RenderTargetId(1);
pub const VSCM: RenderTargetId = RenderTargetId(2);
pub const SELECTION: RenderTargetId = RenderTargetId(3);
pub const VELOCITY: RenderTargetId = RenderTargetId(4);

pub fn render_targets() -> RenderTargets {
    RenderTargets {
        shadow_map: target(SHADOW_MAP.0, 1024, 1024),
        vscm: target(VSCM.0, 1536, 1024),
        selection: target(SELECTION.0, 1280, 720),
        velocity: target(VELOCITY.0, 1280, 720),
    }
}

/// A camera at the origin looking down +X.
pub fn camera() -> ViewDefinition {
    let frustum = Frustum::from_fov(Vec3::ZERO, Mat3::IDENTITY, 90.0, 60.0, 0.1, 200.0);
    let mut view = ViewDefinition::perspective(frustum, 90.0, 60.0, SCREEN);
    view.flags = ViewFlags::SHADOWS | ViewFlags::TEXTURED_MODE;
    view
}

pub fn context(settings: RenderSettings) -> BackEndContext {
    let mut ctx = BackEndContext::new(
        settings,
        builtin_shaders(),
        builtin_textures(),
        render_targets(),
        camera(),
    );
    ctx.begin_frame(1, 1.0 / 60.0);
    ctx
}

pub fn settings(method: InstancingMethod) -> RenderSettings {
    RenderSettings {
        instancing_method: method,
        max_instancing_count: 64,
        ..RenderSettings::default()
    }
}

pub const GEOMETRY_BUFFER: BufferId = BufferId(9000);
pub const INDEX_BUFFER: BufferId = BufferId(9001);

/// A static unit cube of `num_indexes` indices stored at `ref_id * 4096`.
pub fn static_mesh(ref_id: u32, num_indexes: u32) -> Arc<SubMesh> {
    let base = ref_id * 4096;
    Arc::new(SubMesh {
        kind: MeshKind::Static,
        ref_id,
        vertex_cache: BufferCache::new_static(GEOMETRY_BUFFER, base * 32, 24 * 32),
        index_cache: BufferCache::new_static(INDEX_BUFFER, base * TRI_INDEX_SIZE, num_indexes * TRI_INDEX_SIZE),
        num_verts: 24,
        num_indexes,
        gpu_skinning_tier: None,
        aabb: Aabb::from_min_max(Vec3::splat(-0.5), Vec3::splat(0.5)),
    })
}

/// A dynamic mesh whose indices start at index `first_index` of the frame ring.
pub fn dynamic_mesh(ref_id: u32, first_index: u32, num_indexes: u32, frame: u32) -> Arc<SubMesh> {
    Arc::new(SubMesh {
        kind: MeshKind::Dynamic,
        ref_id,
        vertex_cache: BufferCache::new_dynamic(GEOMETRY_BUFFER, 0, 1024, frame),
        index_cache: BufferCache::new_dynamic(
            INDEX_BUFFER,
            first_index * TRI_INDEX_SIZE,
            num_indexes * TRI_INDEX_SIZE,
            frame,
        ),
        num_verts: num_indexes,
        num_indexes,
        gpu_skinning_tier: None,
        aabb: Aabb::from_min_max(Vec3::splat(-0.5), Vec3::splat(0.5)),
    })
}

pub fn object_at(index: u32, instance_index: u32, position: Vec3) -> Arc<VisibleObject> {
    let mut object = VisibleObject::new(
        index,
        Mat4::from_translation(position),
        Aabb::from_min_max(Vec3::splat(-0.5), Vec3::splat(0.5)),
    );
    object.instance_index = instance_index;
    Arc::new(object)
}

pub fn object(index: u32, instance_index: u32) -> Arc<VisibleObject> {
    object_at(index, instance_index, Vec3::new(10.0, 0.0, 0.0))
}

pub fn lit_material(name: &str) -> Arc<Material> {
    let pass = MaterialPass {
        shader: Some(shader(1, "standard", ShaderFlags::LIT_SURFACE)),
        ..MaterialPass::default()
    };
    Arc::new(Material::new(name, MaterialKind::Surface, MaterialSort::Opaque, pass))
}

pub fn unlit_material(name: &str) -> Arc<Material> {
    Arc::new(Material::new(
        name,
        MaterialKind::Surface,
        MaterialSort::Opaque,
        MaterialPass::default(),
    ))
}

pub fn light_material() -> Arc<Material> {
    Arc::new(Material::new(
        "light",
        MaterialKind::Light,
        MaterialSort::Opaque,
        MaterialPass::default(),
    ))
}

pub fn surf(sub_mesh: &Arc<SubMesh>, material: &Arc<Material>, object: &Arc<VisibleObject>) -> DrawSurf {
    DrawSurf::new(sub_mesh.clone(), material.clone(), object.clone())
}

pub fn instanced_surf(
    sub_mesh: &Arc<SubMesh>,
    material: &Arc<Material>,
    object: &Arc<VisibleObject>,
) -> DrawSurf {
    surf(sub_mesh, material, object).with_flags(
        DrawSurfFlags::AMBIENT_VISIBLE | DrawSurfFlags::SHADOW_VISIBLE | DrawSurfFlags::USE_INSTANCING,
    )
}

pub fn instance_cache() -> BufferCache {
    BufferCache::new_dynamic(BufferId(9002), 0, 256 * 64, 1)
}

/// A frame through the fixture camera with `flags` replacing its view flags.
pub fn frame_with(surfs: Vec<DrawSurf>, flags: ViewFlags) -> RenderFrame {
    let mut view = camera();
    view.flags = flags;
    let mut frame = RenderFrame::new(view);
    frame.draw_surfs = surfs;
    frame.instance_cache = Some(instance_cache());
    frame
}

// Pass harness

/// Everything `draw_view` needs, with the device recording.
pub struct Harness {
    pub device: RecordingDevice,
    pub ctx: BackEndContext,
    pub batch: Batch,
    pub shadows: ShadowScheduler,
    pub debug_prims: DebugPrimitives,
}

impl Harness {
    pub fn new(settings: RenderSettings) -> Result<Self, ResourceError> {
        let mut device = RecordingDevice::new();
        let batch = Batch::init(&mut device, &settings)?;
        let ctx = context(settings);
        device.clear_calls();
        Ok(Self {
            device,
            ctx,
            batch,
            shadows: ShadowScheduler::new(),
            debug_prims: DebugPrimitives::default(),
        })
    }

    pub fn draw_view(&mut self, frame: &RenderFrame) {
        passes::draw_view(
            &mut self.ctx,
            &mut self.device,
            &mut self.batch,
            &mut self.shadows,
            &self.debug_prims,
            frame,
        );
    }
}

