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

//! Shader constant upload for the render routines.
//!
//! [`ShaderBinder`] wraps the device together with the shader being drawn.
//! Built-in constants and samplers are only forwarded when the program
//! declares them, named uniforms always are: the device ignores names the
//! program does not have.

use super::shader_select::gpu_skinning_tier;
use super::BatchDraw;
use crate::render_lane::context::BackEndContext;
use ember_core::math::color::{srgb_to_linear_rgb, srgb_to_linear_rgba};
use ember_core::math::{Mat4, Vec2, Vec4};
use ember_core::renderer::api::{
    BufferKind, BuiltinConstant, BuiltinSampler, ConstantKey, ConstantValue, EnvProbeBinding,
    LightKind, MaterialPass, PropertyKind, PropertyValue, SamplerKey, Shader, SkinningMethod,
    TextureId, VertexColorMode, VisibleLight, VisibleObject,
};
use ember_core::renderer::RenderDevice;
use std::sync::Arc;

/// The device, bound to one shader for the duration of a render routine.
pub(super) struct ShaderBinder<'a> {
    device: &'a mut dyn RenderDevice,
    shader: Arc<Shader>,
}

impl<'a> ShaderBinder<'a> {
    /// Makes `shader` the current program.
    pub fn bind(device: &'a mut dyn RenderDevice, shader: Arc<Shader>) -> Self {
        device.bind_shader(shader.id);
        Self { device, shader }
    }

    pub fn is_srgb_write_enabled(&self) -> bool {
        self.device.is_srgb_write_enabled()
    }

    pub fn set(&mut self, constant: BuiltinConstant, value: ConstantValue<'_>) {
        if self.shader.uses_constant(constant) {
            self.device.set_constant(ConstantKey::Builtin(constant), value);
        }
    }

    pub fn set_mat4(&mut self, constant: BuiltinConstant, value: Mat4, transpose: bool) {
        self.set(constant, ConstantValue::Mat4 { value, transpose });
    }

    pub fn texture(&mut self, sampler: BuiltinSampler, texture: TextureId) {
        if self.shader.uses_sampler(sampler) {
            self.device.set_texture(SamplerKey::Builtin(sampler), texture);
        }
    }

    pub fn set_named(&mut self, name: &str, value: ConstantValue<'_>) {
        self.device.set_constant(ConstantKey::Named(name), value);
    }

    pub fn named_texture(&mut self, name: &str, texture: TextureId) {
        self.device.set_texture(SamplerKey::Named(name), texture);
    }

    /// Camera and object matrices of the current pass.
    pub fn matrices(&mut self, ctx: &BackEndContext) {
        use BuiltinConstant::*;

        let pairs = [
            (ModelViewMatrix, ModelViewMatrixTranspose, ctx.model_view_matrix),
            (ViewMatrix, ViewMatrixTranspose, ctx.view_matrix),
            (ProjectionMatrix, ProjectionMatrixTranspose, ctx.projection_matrix),
            (ViewProjectionMatrix, ViewProjectionMatrixTranspose, ctx.view_projection_matrix),
            (
                ModelViewProjectionMatrix,
                ModelViewProjectionMatrixTranspose,
                ctx.model_view_projection_matrix,
            ),
        ];
        for (constant, transposed, value) in pairs {
            self.set_mat4(constant, value, true);
            self.set_mat4(transposed, value, false);
        }
    }

    pub fn vertex_color(&mut self, mode: VertexColorMode) {
        let (scale, add) = match mode {
            VertexColorMode::Modulate => (1.0, 0.0),
            VertexColorMode::InverseModulate => (-1.0, 1.0),
            VertexColorMode::Ignore => (0.0, 1.0),
        };
        self.set(BuiltinConstant::VertexColorScale, ConstantValue::Vec4(Vec4::ONE * scale));
        self.set(BuiltinConstant::VertexColorAdd, ConstantValue::Vec4(Vec4::ONE * add));
    }

    pub fn texture_matrix(&mut self, pass: &MaterialPass) {
        let (scale, translation) = (pass.tc_scale, pass.tc_translation);
        self.set(
            BuiltinConstant::TextureMatrixS,
            ConstantValue::Vec4(Vec4::new(scale.x, 0.0, 0.0, translation.x)),
        );
        self.set(
            BuiltinConstant::TextureMatrixT,
            ConstantValue::Vec4(Vec4::new(0.0, scale.y, 0.0, translation.y)),
        );
    }

    /// Texture transform, alpha cutoff and vertex color of a material pass,
    /// plus the per-surface registers.
    pub fn material(&mut self, pass: &MaterialPass, registers: Option<&[f32]>) {
        self.texture_matrix(pass);
        self.set(BuiltinConstant::PerforatedAlpha, ConstantValue::Float(pass.cutoff_alpha));
        self.vertex_color(pass.vertex_color_mode);
        if let Some(registers) = registers {
            self.set_named("materialRegisters", ConstantValue::FloatArray(registers));
        }
    }

    /// Joint data of a GPU skinned object.
    pub fn skinning(&mut self, ctx: &BackEndContext, object: &VisibleObject, num_instances: u32) {
        let Some(joints) = object.joints.as_deref() else {
            return;
        };

        match ctx.settings.skinning_method {
            SkinningMethod::VertexShader => {
                self.set(BuiltinConstant::Joints, ConstantValue::Vec4Array(&joints.joints));
            }
            SkinningMethod::VertexTextureFetch => {
                if let Some(map) = joints.joints_map {
                    self.texture(BuiltinSampler::JointsMap, map);
                }
                let inv_size = 1.0 / joints.joints_map_size.max(1) as f32;
                self.set(
                    BuiltinConstant::InvJointsMapSize,
                    ConstantValue::Vec2(Vec2::new(inv_size, inv_size)),
                );
                // Instanced draws read the base coordinate from the instance rows.
                if num_instances == 0 {
                    self.set(BuiltinConstant::SkinningBaseTc, ConstantValue::Vec2(joints.tc_base));
                }
                if ctx.settings.motion_blur {
                    self.set(
                        BuiltinConstant::JointIndexOffset,
                        ConstantValue::Int2(joints.joint_index_offset),
                    );
                }
            }
            SkinningMethod::Cpu => {}
        }
    }

    /// Per-object data: joints, instance rows or the object transform.
    pub fn entity(&mut self, draw: &BatchDraw<'_>, ctx: &BackEndContext) {
        let batch = draw.batch;
        let object = draw.object;

        if gpu_skinning_tier(ctx, draw.sub_mesh).is_some() {
            self.skinning(ctx, object, batch.num_instances);
        }

        if !batch.indirect_commands.is_empty() {
            self.device.bind_buffer(BufferKind::DrawIndirect, batch.indirect_buffer);
            self.device.write_buffer_discard(
                batch.indirect_buffer,
                bytemuck::cast_slice(&batch.indirect_commands),
            );
            return;
        }

        if let (Some((start, end)), Some(cache)) = (batch.instance_window, ctx.instance_cache) {
            let align = ctx.settings.instance_buffer_offset_alignment;
            self.device.bind_buffer_range(
                BufferKind::Uniform,
                0,
                cache.buffer,
                cache.offset + start * align,
                (end - start + 1) * align,
            );
            self.set(BuiltinConstant::InstanceDataBuffer, ConstantValue::Buffer(0));
            self.set(
                BuiltinConstant::InstanceIndexes,
                ConstantValue::IntArray(&batch.instance_locals),
            );
            return;
        }

        self.set_mat4(BuiltinConstant::LocalToWorldMatrix, object.world, true);
        self.set_mat4(BuiltinConstant::WorldToLocalMatrix, object.world_inverse, true);
        self.set(
            BuiltinConstant::ConstantColor,
            ConstantValue::Vec4(draw.material.pass().color_for(object.owner_color)),
        );
    }

    /// Environment probes of an object.
    pub fn probes(&mut self, ctx: &BackEndContext, object: &VisibleObject) {
        let [probe0, probe1] = &object.env_probes;
        let Some(probe0) = probe0 else {
            return;
        };

        self.probe(ctx, probe0, ProbeSlot::FIRST);

        if ctx.settings.probe_blending {
            match probe1 {
                Some(probe1) => {
                    self.set(BuiltinConstant::ProbeLerp, ConstantValue::Float(probe0.weight));
                    self.probe(ctx, probe1, ProbeSlot::SECOND);
                }
                None => self.set(BuiltinConstant::ProbeLerp, ConstantValue::Float(1.0)),
            }
        }
    }

    fn probe(&mut self, ctx: &BackEndContext, probe: &EnvProbeBinding, slot: ProbeSlot) {
        self.texture(slot.diffuse, probe.diffuse);
        self.texture(slot.specular, probe.specular);
        self.set(slot.max_mip, ConstantValue::Float(probe.specular_max_mip));

        if ctx.settings.probe_box_projection {
            let box_projection = if probe.box_projection { 1.0 } else { 0.0 };
            self.set(
                slot.position,
                ConstantValue::Vec4(Vec4::from_vec3(probe.origin, box_projection)),
            );
            self.set(
                slot.mins,
                ConstantValue::Vec4(Vec4::from_vec3(probe.proxy_aabb.min, 0.0)),
            );
            self.set(
                slot.maxs,
                ConstantValue::Vec4(Vec4::from_vec3(probe.proxy_aabb.max, 0.0)),
            );
        }
    }

    /// Material properties declared by the shader.
    pub fn shader_properties(&mut self, pass: &MaterialPass) {
        let srgb = self.device.is_srgb_write_enabled();
        let shader = self.shader.clone();

        for info in shader.properties.iter().filter(|info| !info.is_define) {
            let Some(value) = pass.properties.get(&info.name) else {
                continue;
            };
            let name = info.name.as_str();

            match (info.kind, *value) {
                (PropertyKind::Bool, PropertyValue::Bool(b)) => {
                    self.set_named(name, ConstantValue::Int(b as i32))
                }
                (PropertyKind::Int, PropertyValue::Int(i)) => {
                    self.set_named(name, ConstantValue::Int(i))
                }
                (PropertyKind::Float, PropertyValue::Float(f)) => {
                    self.set_named(name, ConstantValue::Float(f))
                }
                (PropertyKind::Vec2, PropertyValue::Vec2(v)) => {
                    self.set_named(name, ConstantValue::Vec2(v))
                }
                (PropertyKind::Vec3, PropertyValue::Vec3(v)) => {
                    self.set_named(name, ConstantValue::Vec3(v))
                }
                (PropertyKind::Vec4, PropertyValue::Vec4(v)) => {
                    self.set_named(name, ConstantValue::Vec4(v))
                }
                (PropertyKind::Color3, PropertyValue::Vec3(c)) => {
                    let c = if srgb { srgb_to_linear_rgb(c) } else { c };
                    self.set_named(name, ConstantValue::Vec3(c));
                }
                (PropertyKind::Color4, PropertyValue::Vec4(c)) => {
                    let c = if srgb { srgb_to_linear_rgba(c) } else { c };
                    self.set_named(name, ConstantValue::Vec4(c));
                }
                (
                    PropertyKind::Texture2D | PropertyKind::Texture3D | PropertyKind::TextureCube,
                    PropertyValue::Texture(texture),
                ) => self.named_texture(name, texture),
                (kind, value) => {
                    log::trace!(
                        "shader {}: property '{}' declared {:?} but set to {:?}",
                        shader.name,
                        name,
                        kind,
                        value
                    );
                }
            }
        }
    }

    /// Light parameters, plus the shadow map when `use_shadow_map` is set.
    pub fn lighting(
        &mut self,
        ctx: &BackEndContext,
        light: &VisibleLight,
        use_shadow_map: bool,
    ) {
        let light_vec = match light.kind {
            LightKind::Directional => Vec4::from_vec3(-light.axis.forward(), 0.0),
            LightKind::Point | LightKind::Spot => Vec4::from_vec3(light.origin, 1.0),
        };
        self.set(BuiltinConstant::LightVec, ConstantValue::Vec4(light_vec));
        self.set_mat4(BuiltinConstant::LightTextureMatrix, light.view_proj_scale_bias, true);
        self.set_mat4(BuiltinConstant::LightFallOffMatrix, light.fall_off_matrix, true);
        self.set(
            BuiltinConstant::LightFallOffExponent,
            ConstantValue::Float(light.fall_off_exponent),
        );
        self.set(BuiltinConstant::ViewOrigin, ConstantValue::Vec3(ctx.camera.origin));

        if use_shadow_map {
            self.shadow_map(ctx, light);
        }

        let projection = light.material.pass().texture.unwrap_or(ctx.textures.white);
        self.texture(BuiltinSampler::LightProjectionMap, projection);

        let color =
            Vec4::from_vec3(light.color, 1.0) * (light.intensity * ctx.settings.light_scale);
        self.set(BuiltinConstant::LightColor, ConstantValue::Vec4(color));
    }

    fn shadow_map(&mut self, ctx: &BackEndContext, light: &VisibleLight) {
        let shadow = &ctx.shadow;

        let target = match light.kind {
            LightKind::Point => {
                let target = ctx.targets.vscm;
                self.set_named(
                    "shadowProjectionDepth",
                    ConstantValue::Vec2(shadow.projection_depth),
                );
                self.set_named(
                    "vscmBiasedScale",
                    ConstantValue::Float(ctx.settings.vscm_biased_scale),
                );
                self.texture(BuiltinSampler::CubicNormalCubeMap, ctx.textures.cubic_normal_cube);
                self.texture(BuiltinSampler::IndirectionCubeMap, ctx.textures.indirection_cube);
                self.texture(BuiltinSampler::ShadowMap, target.depth_texture);
                target
            }
            LightKind::Spot => {
                let target = ctx.targets.shadow_map;
                self.set_mat4(
                    BuiltinConstant::ShadowProjMatrix,
                    shadow.view_proj_scale_bias[0],
                    true,
                );
                self.texture(BuiltinSampler::ShadowArrayMap, target.depth_texture);
                target
            }
            LightKind::Directional => {
                let target = ctx.targets.shadow_map;
                let count = if light.is_primary() && ctx.cascade_count() > 1 {
                    ctx.cascade_count()
                } else {
                    1
                };
                self.set(
                    BuiltinConstant::ShadowCascadeProjMatrix,
                    ConstantValue::Mat4Array {
                        values: &shadow.view_proj_scale_bias[..count],
                        transpose: true,
                    },
                );
                if ctx.settings.csm_selection_method == 0 {
                    let [a, b, c, d] = shadow.csm_far;
                    self.set(
                        BuiltinConstant::ShadowSplitFar,
                        ConstantValue::Vec4(Vec4::new(a, b, c, d)),
                    );
                }
                self.set_named(
                    "shadowMapFilterSize",
                    ConstantValue::FloatArray(&shadow.filter_size[..count]),
                );
                self.texture(BuiltinSampler::ShadowArrayMap, target.depth_texture);
                target
            }
        };

        let texel_size = Vec2::new(
            1.0 / target.width.max(1) as f32,
            1.0 / target.height.max(1) as f32,
        );
        self.set_named("shadowMapTexelSize", ConstantValue::Vec2(texel_size));
    }
}

/// The built-in slots of one environment probe.
#[derive(Clone, Copy)]
struct ProbeSlot {
    diffuse: BuiltinSampler,
    specular: BuiltinSampler,
    max_mip: BuiltinConstant,
    position: BuiltinConstant,
    mins: BuiltinConstant,
    maxs: BuiltinConstant,
}

impl ProbeSlot {
    const FIRST: Self = Self {
        diffuse: BuiltinSampler::Probe0DiffuseCubeMap,
        specular: BuiltinSampler::Probe0SpecularCubeMap,
        max_mip: BuiltinConstant::Probe0SpecularCubeMapMaxMipLevel,
        position: BuiltinConstant::Probe0Position,
        mins: BuiltinConstant::Probe0Mins,
        maxs: BuiltinConstant::Probe0Maxs,
    };

    const SECOND: Self = Self {
        diffuse: BuiltinSampler::Probe1DiffuseCubeMap,
        specular: BuiltinSampler::Probe1SpecularCubeMap,
        max_mip: BuiltinConstant::Probe1SpecularCubeMapMaxMipLevel,
        position: BuiltinConstant::Probe1Position,
        mins: BuiltinConstant::Probe1Mins,
        maxs: BuiltinConstant::Probe1Maxs,
    };
}
