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

//! The explicit back-end context threaded through every pass driver.
//!
//! Everything a draw needs besides the surface itself lives here: runtime
//! settings, the built-in shaders and textures, off-screen targets, the
//! current camera and object matrices, the shadow projection state of the
//! light being drawn and the frame counters.

use ember_core::math::{Mat4, Vec2};
use ember_core::renderer::api::{
    BufferCache, RenderCounter, RenderSettings, RenderTarget, TextureId, ViewDefinition,
};
use ember_core::renderer::{Rect, RenderDevice, Shader};
use std::sync::Arc;

/// Maximum number of cascades of a directional light.
pub const MAX_CASCADES: usize = 4;

/// The shaders the back end falls back to when a material has none.
#[derive(Debug, Clone)]
pub struct BuiltinShaders {
    /// Flat color, used by wireframes.
    pub constant_color: Arc<Shader>,
    /// Writes the object id, used by the selection buffer.
    pub selection_id: Arc<Shader>,
    /// Depth only, used by the pre-pass, occluders and shadow maps.
    pub depth: Arc<Shader>,
    /// Screen-space velocity.
    pub object_motion_blur: Arc<Shader>,
    /// Default lit surface, ambient term only.
    pub standard_default: Arc<Shader>,
    /// Default lit surface, ambient plus one light.
    pub standard_default_direct_lit: Arc<Shader>,
    /// Default lit surface, environment probes.
    pub standard_default_indirect_lit: Arc<Shader>,
    /// Default lit surface, environment probes plus one light.
    pub standard_default_indirect_lit_direct_lit: Arc<Shader>,
    /// Fog volume.
    pub fog_light: Arc<Shader>,
    /// Blend light.
    pub blend_light: Arc<Shader>,
    /// Unlit textured, used by the GUI.
    pub unlit: Arc<Shader>,
    /// Per-vertex color, used by debug primitives.
    pub vertex_color: Arc<Shader>,
}

impl BuiltinShaders {
    /// Names requested from the loader, in field order.
    pub const NAMES: [&'static str; 12] = [
        "constant_color",
        "selection_id",
        "depth",
        "object_motion_blur",
        "standard_default",
        "standard_default_direct_lit",
        "standard_default_indirect_lit",
        "standard_default_indirect_lit_direct_lit",
        "fog_light",
        "blend_light",
        "unlit",
        "vertex_color",
    ];

    /// Builds the set by asking `load` for every name of [`BuiltinShaders::NAMES`].
    pub fn with_loader(mut load: impl FnMut(&'static str) -> Arc<Shader>) -> Self {
        let [constant_color, selection_id, depth, object_motion_blur, standard_default, standard_default_direct_lit, standard_default_indirect_lit, standard_default_indirect_lit_direct_lit, fog_light, blend_light, unlit, vertex_color] =
            Self::NAMES.map(&mut load);
        Self {
            constant_color,
            selection_id,
            depth,
            object_motion_blur,
            standard_default,
            standard_default_direct_lit,
            standard_default_indirect_lit,
            standard_default_indirect_lit_direct_lit,
            fog_light,
            blend_light,
            unlit,
            vertex_color,
        }
    }
}

/// Textures the back end binds on its own.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinTextures {
    /// 1x1 white.
    pub white: TextureId,
    /// Fog density seen from outside the volume.
    pub fog: TextureId,
    /// Fog density seen from inside the volume.
    pub fog_enter: TextureId,
    /// Pre-integrated split-sum BRDF.
    pub prefiltered_dfg: TextureId,
    /// Cube map of normalized directions.
    pub cubic_normal_cube: TextureId,
    /// Maps a direction to its face in the virtual shadow cube map.
    pub indirection_cube: TextureId,
    /// Depth of the current view.
    pub screen_depth: TextureId,
}

/// Off-screen targets the back end draws into.
#[derive(Debug, Clone, Copy)]
pub struct RenderTargets {
    /// Layered shadow map, one layer per cascade.
    pub shadow_map: RenderTarget,
    /// Virtual shadow cube map: six faces in a 3x2 atlas.
    pub vscm: RenderTarget,
    /// Object id buffer.
    pub selection: RenderTarget,
    /// Screen-space velocity buffer.
    pub velocity: RenderTarget,
}

/// Projection state of the shadow map being rendered or sampled.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowState {
    /// Light projection of the current shadow map.
    pub projection: Mat4,
    /// World to shadow texture transform, per cascade.
    pub view_proj_scale_bias: [Mat4; MAX_CASCADES],
    /// PCF filter size in texels, per cascade.
    pub filter_size: [f32; MAX_CASCADES],
    /// Slope scaled depth bias.
    pub offset_factor: f32,
    /// Constant depth bias.
    pub offset_units: f32,
    /// Camera distances of the cascade splits.
    pub csm_distances: Vec<f32>,
    /// Normalized device depth of each cascade end.
    pub csm_far: [f32; MAX_CASCADES],
    /// Depth reconstruction factors of the cube map projection.
    pub projection_depth: Vec2,
}

impl Default for ShadowState {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view_proj_scale_bias: [Mat4::ZERO; MAX_CASCADES],
            filter_size: [1.0; MAX_CASCADES],
            offset_factor: 0.0,
            offset_units: 0.0,
            csm_distances: Vec::new(),
            csm_far: [1.0; MAX_CASCADES],
            projection_depth: Vec2::ZERO,
        }
    }
}

/// Everything the back end reads or writes while drawing a view.
#[derive(Debug)]
pub struct BackEndContext {
    /// Runtime tunables.
    pub settings: RenderSettings,
    /// Fallback shaders.
    pub shaders: BuiltinShaders,
    /// Fallback textures.
    pub textures: BuiltinTextures,
    /// Off-screen targets.
    pub targets: RenderTargets,
    /// Statistics of the current frame.
    pub counter: RenderCounter,
    /// Current back-end frame, matched against dynamic buffer caches.
    pub frame: u32,
    /// Duration of the previous frame in seconds.
    pub frame_time: f32,
    /// The camera being drawn.
    pub camera: ViewDefinition,
    /// View matrix of the current pass.
    pub view_matrix: Mat4,
    /// Projection matrix of the current pass.
    pub projection_matrix: Mat4,
    /// View-projection matrix of the current pass.
    pub view_projection_matrix: Mat4,
    /// Model-view matrix of the current object.
    pub model_view_matrix: Mat4,
    /// Model-view-projection matrix of the current object.
    pub model_view_projection_matrix: Mat4,
    /// Per-instance data of the frame.
    pub instance_cache: Option<BufferCache>,
    /// Shadow projection of the light being drawn.
    pub shadow: ShadowState,
    scissor: Rect,
}

impl BackEndContext {
    /// Creates a context looking through `camera`.
    pub fn new(
        settings: RenderSettings,
        shaders: BuiltinShaders,
        textures: BuiltinTextures,
        targets: RenderTargets,
        camera: ViewDefinition,
    ) -> Self {
        Self {
            settings,
            shaders,
            textures,
            targets,
            counter: RenderCounter::default(),
            frame: 0,
            frame_time: 1.0 / 60.0,
            view_matrix: camera.view,
            projection_matrix: camera.projection,
            view_projection_matrix: camera.view_projection,
            camera,
            model_view_matrix: Mat4::IDENTITY,
            model_view_projection_matrix: Mat4::IDENTITY,
            instance_cache: None,
            shadow: ShadowState::default(),
            scissor: Rect::EMPTY,
        }
    }

    /// Starts a new frame: counters are reset and dynamic caches of older
    /// frames stop being valid.
    pub fn begin_frame(&mut self, frame: u32, frame_time: f32) {
        self.frame = frame;
        if frame_time > 0.0 {
            self.frame_time = frame_time;
        }
        self.counter.reset();
    }

    /// Makes `view` the current camera and loads its matrices.
    pub fn set_camera(&mut self, view: &ViewDefinition) {
        self.camera = view.clone();
        self.view_matrix = view.view;
        self.projection_matrix = view.projection;
        self.view_projection_matrix = view.view_projection;
    }

    /// Number of cascades actually rendered.
    #[inline]
    pub fn cascade_count(&self) -> usize {
        self.settings.csm_count.clamp(1, MAX_CASCADES)
    }

    /// The scissor rectangle last set through [`BackEndContext::set_scissor`].
    #[inline]
    pub fn scissor(&self) -> Rect {
        self.scissor
    }

    /// Sets the device scissor and remembers it so passes can restore it.
    pub fn set_scissor(&mut self, device: &mut dyn RenderDevice, rect: Rect) {
        self.scissor = rect;
        device.set_scissor(rect);
    }

    /// Sets viewport and scissor to the camera's render rectangle.
    pub fn restore_view_rect(&mut self, device: &mut dyn RenderDevice) {
        let rect = self.camera.render_rect;
        device.set_viewport(rect);
        self.set_scissor(device, rect);
    }
}
