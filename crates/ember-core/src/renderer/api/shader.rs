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

//! Shader programs as seen by the back end.
//!
//! A [`Shader`] is a compiled program plus everything the back end needs to
//! feed it: which built-in constants and samplers it reads, the material
//! properties it exposes, and links to the specialised variants compiled from
//! the same source (perforated, GPU skinned, GPU instanced, lit and shadowed).
//! Variants are full shaders themselves, so variant lookups chain.

use crate::math::{Mat4, Vec2, Vec3, Vec4};
use crate::renderer::api::scene::LightKind;
use crate::renderer::api::texture::TextureId;
use ahash::AHashSet;
use bitflags::bitflags;
use std::sync::Arc;

/// An opaque handle representing a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub usize);

bitflags! {
    /// Capabilities declared by a shader.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderFlags: u32 {
        /// The shader samples a shadow map.
        const SHADOWING = 1 << 0;
        /// The surface reacts to lights and is drawn in the lit pass.
        const LIT_SURFACE = 1 << 1;
        /// The surface is a sky and is excluded from most passes.
        const SKY_SURFACE = 1 << 2;
    }
}

/// Constants with a fixed meaning that the back end binds itself.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinConstant {
    ModelViewMatrix,
    ModelViewMatrixTranspose,
    ViewMatrix,
    ViewMatrixTranspose,
    ProjectionMatrix,
    ProjectionMatrixTranspose,
    ViewProjectionMatrix,
    ViewProjectionMatrixTranspose,
    ModelViewProjectionMatrix,
    ModelViewProjectionMatrixTranspose,
    PrevModelViewProjectionMatrix,
    InstanceDataBuffer,
    InstanceIndexes,
    LocalToWorldMatrix,
    WorldToLocalMatrix,
    TextureMatrixS,
    TextureMatrixT,
    ConstantColor,
    Intensity,
    VertexColorScale,
    VertexColorAdd,
    PerforatedAlpha,
    ViewOrigin,
    LightVec,
    LightTextureMatrix,
    LightColor,
    LightFallOffMatrix,
    LightFallOffExponent,
    Joints,
    InvJointsMapSize,
    SkinningBaseTc,
    JointIndexOffset,
    ShadowProjMatrix,
    ShadowCascadeProjMatrix,
    ShadowSplitFar,
    Probe0SpecularCubeMapMaxMipLevel,
    Probe0Position,
    Probe0Mins,
    Probe0Maxs,
    Probe1SpecularCubeMapMaxMipLevel,
    Probe1Position,
    Probe1Mins,
    Probe1Maxs,
    ProbeLerp,
}

/// Samplers with a fixed meaning that the back end binds itself.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinSampler {
    CubicNormalCubeMap,
    IndirectionCubeMap,
    AlbedoMap,
    NormalMap,
    JointsMap,
    LightProjectionMap,
    LightCubeMap,
    ShadowMap,
    ShadowArrayMap,
    PrefilteredDfgMap,
    Probe0DiffuseCubeMap,
    Probe0SpecularCubeMap,
    Probe1DiffuseCubeMap,
    Probe1SpecularCubeMap,
}

/// Where a constant is written: a built-in slot or a uniform looked up by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstantKey<'a> {
    /// A built-in slot.
    Builtin(BuiltinConstant),
    /// A uniform looked up by name. Unknown names are ignored by the device.
    Named(&'a str),
}

/// Where a texture is bound: a built-in unit or a sampler looked up by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKey<'a> {
    /// A built-in unit.
    Builtin(BuiltinSampler),
    /// A sampler looked up by name. Unknown names are ignored by the device.
    Named(&'a str),
}

/// A value written into a shader constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstantValue<'a> {
    /// `int`
    Int(i32),
    /// `ivec2`
    Int2([i32; 2]),
    /// `ivec4`
    Int4([i32; 4]),
    /// `float`
    Float(f32),
    /// `vec2`
    Vec2(Vec2),
    /// `vec3`
    Vec3(Vec3),
    /// `vec4`
    Vec4(Vec4),
    /// `mat4`, optionally transposed on upload.
    Mat4 {
        /// The matrix.
        value: Mat4,
        /// Transposes the matrix on upload.
        transpose: bool,
    },
    /// `int[]`
    IntArray(&'a [i32]),
    /// `float[]`
    FloatArray(&'a [f32]),
    /// `vec4[]`
    Vec4Array(&'a [Vec4]),
    /// `mat4[]`, optionally transposed on upload.
    Mat4Array {
        /// The matrices.
        values: &'a [Mat4],
        /// Transposes every matrix on upload.
        transpose: bool,
    },
    /// A uniform block bound to the given binding index.
    Buffer(u32),
}

/// Type of a material-facing shader property.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Bool,
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Color3,
    Color4,
    Texture2D,
    Texture3D,
    TextureCube,
}

/// The value of a material property.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Texture(TextureId),
}

/// Declaration of one property exposed by a shader.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderPropertyInfo {
    /// Uniform or sampler name.
    pub name: String,
    /// Declared type.
    pub kind: PropertyKind,
    /// Properties compiled in as preprocessor defines are never uploaded.
    pub is_define: bool,
}

impl ShaderPropertyInfo {
    /// Declares an uploaded property.
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_define: false,
        }
    }

    /// Declares a property baked in as a define.
    pub fn define(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_define: true,
        }
    }
}

/// Links to the variants compiled from the same source.
#[derive(Debug, Clone, Default)]
pub struct ShaderVariants {
    /// Alpha-tested variant.
    pub perforated: Option<Arc<Shader>>,
    /// GPU skinned variants, one per skinning tier (1, 4, 8 weights).
    pub gpu_skinning: [Option<Arc<Shader>>; 3],
    /// Variant reading per-instance data.
    pub gpu_instancing: Option<Arc<Shader>>,
    /// Ambient plus one direct light.
    pub direct_lit: Option<Arc<Shader>>,
    /// Environment probe lighting.
    pub indirect_lit: Option<Arc<Shader>>,
    /// Environment probe lighting plus one direct light.
    pub indirect_lit_direct_lit: Option<Arc<Shader>>,
    /// Shadowed lighting for point lights.
    pub point_shadow: Option<Arc<Shader>>,
    /// Shadowed lighting for spot lights.
    pub spot_shadow: Option<Arc<Shader>>,
    /// Shadowed lighting for directional lights.
    pub parallel_shadow: Option<Arc<Shader>>,
}

/// A shader program with its reflection data and variants.
#[derive(Debug, Clone)]
pub struct Shader {
    /// Device handle of the program.
    pub id: ShaderId,
    /// Debug name.
    pub name: String,
    /// Declared capabilities.
    pub flags: ShaderFlags,
    /// Material-facing properties in declaration order.
    pub properties: Vec<ShaderPropertyInfo>,
    /// Linked variants.
    pub variants: ShaderVariants,
    constants: AHashSet<BuiltinConstant>,
    samplers: AHashSet<BuiltinSampler>,
}

impl Shader {
    /// Creates a shader that reads no built-in and has no variant.
    pub fn new(id: ShaderId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            flags: ShaderFlags::empty(),
            properties: Vec::new(),
            variants: ShaderVariants::default(),
            constants: AHashSet::new(),
            samplers: AHashSet::new(),
        }
    }

    /// Sets the capability flags.
    pub fn with_flags(mut self, flags: ShaderFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Declares the built-in constants the program reads.
    pub fn with_constants(mut self, constants: impl IntoIterator<Item = BuiltinConstant>) -> Self {
        self.constants.extend(constants);
        self
    }

    /// Declares the built-in samplers the program reads.
    pub fn with_samplers(mut self, samplers: impl IntoIterator<Item = BuiltinSampler>) -> Self {
        self.samplers.extend(samplers);
        self
    }

    /// Declares the material-facing properties.
    pub fn with_properties(mut self, properties: Vec<ShaderPropertyInfo>) -> Self {
        self.properties = properties;
        self
    }

    /// Links the variants.
    pub fn with_variants(mut self, variants: ShaderVariants) -> Self {
        self.variants = variants;
        self
    }

    /// `true` if the program reads `constant`.
    #[inline]
    pub fn uses_constant(&self, constant: BuiltinConstant) -> bool {
        self.constants.contains(&constant)
    }

    /// `true` if the program samples `sampler`.
    #[inline]
    pub fn uses_sampler(&self, sampler: BuiltinSampler) -> bool {
        self.samplers.contains(&sampler)
    }

    /// `true` for surfaces drawn in the lit pass.
    #[inline]
    pub fn is_lit_surface(&self) -> bool {
        self.flags.contains(ShaderFlags::LIT_SURFACE)
    }

    /// The alpha-tested variant.
    pub fn perforated_version(&self) -> Option<&Arc<Shader>> {
        self.variants.perforated.as_ref()
    }

    /// The GPU skinned variant for `tier`.
    pub fn gpu_skinning_version(&self, tier: u8) -> Option<&Arc<Shader>> {
        self.variants
            .gpu_skinning
            .get(tier as usize)
            .and_then(Option::as_ref)
    }

    /// The GPU instanced variant.
    pub fn gpu_instancing_version(&self) -> Option<&Arc<Shader>> {
        self.variants.gpu_instancing.as_ref()
    }

    /// The ambient plus direct light variant.
    pub fn direct_lit_version(&self) -> Option<&Arc<Shader>> {
        self.variants.direct_lit.as_ref()
    }

    /// The environment probe variant.
    pub fn indirect_lit_version(&self) -> Option<&Arc<Shader>> {
        self.variants.indirect_lit.as_ref()
    }

    /// The environment probe plus direct light variant.
    pub fn indirect_lit_direct_lit_version(&self) -> Option<&Arc<Shader>> {
        self.variants.indirect_lit_direct_lit.as_ref()
    }

    /// The shadowed variant for a light of type `kind`.
    pub fn shadow_version(&self, kind: LightKind) -> Option<&Arc<Shader>> {
        match kind {
            LightKind::Point => self.variants.point_shadow.as_ref(),
            LightKind::Spot => self.variants.spot_shadow.as_ref(),
            LightKind::Directional => self.variants.parallel_shadow.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let shader = Shader::new(ShaderId(1), "depth")
            .with_constants([BuiltinConstant::ModelViewProjectionMatrix])
            .with_samplers([BuiltinSampler::AlbedoMap]);
        assert!(shader.uses_constant(BuiltinConstant::ModelViewProjectionMatrix));
        assert!(!shader.uses_constant(BuiltinConstant::ViewMatrix));
        assert!(shader.uses_sampler(BuiltinSampler::AlbedoMap));
    }

    #[test]
    fn test_variant_lookup_falls_back_to_none() {
        let skinned = Arc::new(Shader::new(ShaderId(2), "depth_skin4"));
        let shader = Shader::new(ShaderId(1), "depth").with_variants(ShaderVariants {
            gpu_skinning: [None, Some(skinned.clone()), None],
            ..Default::default()
        });
        assert_eq!(shader.gpu_skinning_version(1).map(|s| s.id), Some(ShaderId(2)));
        assert!(shader.gpu_skinning_version(0).is_none());
        assert!(shader.gpu_skinning_version(7).is_none());
        assert!(shader.perforated_version().is_none());
        assert!(shader.shadow_version(LightKind::Spot).is_none());
    }
}
