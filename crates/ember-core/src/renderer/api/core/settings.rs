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

//! Runtime tunables read by the back end every frame.
//!
//! The settings are owned by the embedding application (a console variable
//! system, a config file, a debug UI). The back end only ever reads them.

use serde::{Deserialize, Serialize};

/// How instanced surfaces are submitted to the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstancingMethod {
    /// Every surface is drawn with its own draw call.
    NoInstancing,
    /// Per-instance data lives in a uniform buffer window indexed by a local
    /// instance index array.
    UniformBuffer,
    /// Per-instance data is streamed as a vertex attribute and contiguous
    /// instances are merged into indirect draw commands.
    InstancedArrays,
}

/// Where vertex skinning happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkinningMethod {
    /// Vertices are skinned on the CPU before upload.
    Cpu,
    /// Joint matrices are uploaded as a uniform array.
    VertexShader,
    /// Joint matrices are fetched from a texture in the vertex shader.
    VertexTextureFetch,
}

/// Wireframe overlay modes, also used per object.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireframeMode {
    /// No wireframe.
    #[default]
    None,
    /// Only visible front faces, depth tested.
    VisibleFront,
    /// Every front face, no depth test.
    AllFront,
    /// Every face, no depth test and no culling.
    AllFrontAndBack,
}

/// A collection of settings that drive the render back end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// How instanced surfaces are submitted.
    pub instancing_method: InstancingMethod,
    /// Upper bound on instances merged into one batch.
    pub max_instancing_count: u32,
    /// Device limit on the size of one uniform block in bytes.
    pub max_uniform_block_size: u32,
    /// Stride in bytes between two instances in the instance buffer.
    pub instance_buffer_offset_alignment: u32,
    /// Where vertex skinning happens.
    pub skinning_method: SkinningMethod,
    /// If `true`, opaque surfaces are laid down in a depth-only pass first.
    pub use_depth_pre_pass: bool,
    /// Enables environment-probe lighting for objects that have a probe.
    pub indirect_lit: bool,
    /// Enables parallax correction of environment probes with a proxy box.
    pub probe_box_projection: bool,
    /// Blends the two closest environment probes.
    pub probe_blending: bool,
    /// Master switch for shadow maps.
    pub shadows: bool,
    /// Resolution of one shadow map layer.
    pub shadow_map_size: u32,
    /// Base PCF filter size in texels.
    pub shadow_map_filter_size: f32,
    /// Near plane of the point light cube map projection.
    pub shadow_cube_map_z_near: f32,
    /// Field of view in degrees used for each virtual cube map face.
    pub vscm_biased_fov: f32,
    /// Scale applied to cube map lookups to hide face seams.
    pub vscm_biased_scale: f32,
    /// Snaps sphere-fitted cascades to whole texels to avoid shimmering.
    pub shadow_map_crop_align: bool,
    /// 0 disables projection tightening, 1 fits to the view, 2 fits to casters too.
    pub optimized_shadow_projection: u32,
    /// Number of cascades for the primary directional light.
    pub csm_count: usize,
    /// Camera distance covered by the cascades.
    pub csm_max_distance: f32,
    /// Blend between uniform (0) and logarithmic (1) split distribution.
    pub csm_split_lambda: f32,
    /// Fraction of frames a cascade is re-rendered before distance falloff.
    pub csm_update_ratio: f32,
    /// Cascades ending before this distance are rendered every frame.
    pub csm_non_cached_distance: f32,
    /// Extends each cascade backwards over the previous one for blending.
    pub csm_blend: bool,
    /// 0 selects the cascade by split depth, anything else by map bounds.
    pub csm_selection_method: u32,
    /// Slope-scaled depth bias per cascade.
    pub csm_offset_factors: [f32; 4],
    /// Constant depth bias per cascade.
    pub csm_offset_units: [f32; 4],
    /// Slope-scaled bias for materials with polygon offset.
    pub offset_factor: f32,
    /// Constant bias for materials with polygon offset.
    pub offset_units: f32,
    /// Global multiplier on light colors.
    pub light_scale: f32,
    /// Multiplier on the ambient term of the base pass.
    pub ambient_scale: f32,
    /// Debug: draw only the first triangle of every batch.
    pub single_triangle: bool,
    /// Debug: force a wireframe overlay on every object.
    pub show_wireframe: WireframeMode,
    /// Renders the velocity buffer used by motion blur.
    pub motion_blur: bool,
    /// Shutter speed in seconds used for the velocity buffer.
    pub motion_blur_shutter_speed: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            instancing_method: InstancingMethod::InstancedArrays,
            max_instancing_count: 1024,
            max_uniform_block_size: 65536,
            instance_buffer_offset_alignment: 256,
            skinning_method: SkinningMethod::VertexTextureFetch,
            use_depth_pre_pass: true,
            indirect_lit: true,
            probe_box_projection: true,
            probe_blending: true,
            shadows: true,
            shadow_map_size: 1024,
            shadow_map_filter_size: 1.0,
            shadow_cube_map_z_near: 0.04,
            vscm_biased_fov: 90.0,
            vscm_biased_scale: 1.0,
            shadow_map_crop_align: true,
            optimized_shadow_projection: 2,
            csm_count: 4,
            csm_max_distance: 150.0,
            csm_split_lambda: 0.9,
            csm_update_ratio: 1.0,
            csm_non_cached_distance: 50.0,
            csm_blend: true,
            csm_selection_method: 0,
            csm_offset_factors: [5.0, 4.0, 3.0, 2.0],
            csm_offset_units: [1000.0, 500.0, 250.0, 125.0],
            offset_factor: 1.0,
            offset_units: 2.0,
            light_scale: 1.0,
            ambient_scale: 1.0,
            single_triangle: false,
            show_wireframe: WireframeMode::None,
            motion_blur: true,
            motion_blur_shutter_speed: 0.5,
        }
    }
}

impl RenderSettings {
    /// The number of instances one batch may carry for the configured method.
    ///
    /// Uniform-buffer instancing is further bounded by how many aligned
    /// instance records fit into one uniform block.
    pub fn effective_max_instancing_count(&self) -> u32 {
        match self.instancing_method {
            InstancingMethod::NoInstancing => 0,
            InstancingMethod::InstancedArrays => self.max_instancing_count,
            InstancingMethod::UniformBuffer => {
                let per_block = self.max_uniform_block_size
                    / self.instance_buffer_offset_alignment.max(1);
                self.max_instancing_count.min(per_block)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_max_instancing_count() {
        let mut settings = RenderSettings::default();
        assert_eq!(settings.effective_max_instancing_count(), 1024);

        settings.instancing_method = InstancingMethod::UniformBuffer;
        assert_eq!(settings.effective_max_instancing_count(), 256);

        settings.max_instancing_count = 100;
        assert_eq!(settings.effective_max_instancing_count(), 100);

        settings.instancing_method = InstancingMethod::NoInstancing;
        assert_eq!(settings.effective_max_instancing_count(), 0);
    }
}
