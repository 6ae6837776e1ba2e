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

//! Materials: how a surface is shaded and which fixed-function state it needs.

use crate::math::{Vec2, Vec4};
use crate::renderer::api::shader::{PropertyValue, Shader};
use crate::renderer::api::state::{CullType, StateBits};
use crate::renderer::api::texture::TextureId;
use ahash::AHashMap;
use bitflags::bitflags;
use std::sync::Arc;

/// Name of the property holding the albedo texture of shader-driven materials.
pub const ALBEDO_MAP_PROPERTY: &str = "albedoMap";

/// Drawing order bucket of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MaterialSort {
    /// Invalid material.
    Bad = 0,
    /// Rendered into another view first (mirrors, portals).
    SubView = 1,
    /// Fully opaque.
    Opaque = 2,
    /// Opaque with alpha-tested holes.
    AlphaTest = 3,
    /// Sky box, drawn behind everything else.
    Sky = 4,
    /// Alpha blended.
    Translucent = 10,
    /// Drawn over translucent surfaces.
    Overlay = 11,
    /// Drawn last, nearest to the eye.
    Nearest = 15,
}

bitflags! {
    /// Per-material switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFlags: u32 {
        /// Pushes the surface towards the eye to avoid z-fighting with coplanar geometry.
        const POLYGON_OFFSET = 1 << 0;
        /// Never casts a shadow.
        const NO_SHADOW = 1 << 1;
        /// Casts a shadow even if its sort would exclude it.
        const FORCE_SHADOW = 1 << 2;
        /// Reads the current render texture; drawn in the final pass.
        const REFRACTION = 1 << 3;
    }
}

/// What a material is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    /// Regular geometry.
    Surface,
    /// A projected decal.
    Decal,
    /// A light shape.
    Light,
    /// A light that blends its color over the lit geometry.
    BlendLight,
    /// A fog volume.
    FogLight,
}

/// How the alpha channel of a pass is interpreted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderingMode {
    /// Alpha is ignored.
    #[default]
    Opaque,
    /// Fragments with alpha below the cutoff are discarded.
    AlphaCutoff,
    /// Fragments are alpha blended.
    AlphaBlend,
}

/// How per-vertex colors combine with the material color.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexColorMode {
    /// Vertex colors are ignored.
    #[default]
    Ignore,
    /// Vertex colors multiply the material color.
    Modulate,
    /// One minus the vertex color multiplies the material color.
    InverseModulate,
}

/// One shading pass of a material.
#[derive(Debug, Clone)]
pub struct MaterialPass {
    /// Custom shader. `None` falls back to the built-in default shader.
    pub shader: Option<Arc<Shader>>,
    /// Values for the shader's properties, keyed by property name.
    pub properties: AHashMap<String, PropertyValue>,
    /// Texture used by the built-in shaders when there is no custom shader.
    pub texture: Option<TextureId>,
    /// Fixed-function state requested by the pass.
    pub state_bits: StateBits,
    /// Face culling.
    pub cull: CullType,
    /// Alpha interpretation.
    pub rendering_mode: RenderingMode,
    /// Alpha threshold for [`RenderingMode::AlphaCutoff`].
    pub cutoff_alpha: f32,
    /// Vertex color combination.
    pub vertex_color_mode: VertexColorMode,
    /// Texture coordinate scale.
    pub tc_scale: Vec2,
    /// Texture coordinate translation.
    pub tc_translation: Vec2,
    /// Color used when the owner color is not requested.
    pub constant_color: Vec4,
    /// Uses the drawing object's color instead of `constant_color`.
    pub use_owner_color: bool,
}

impl Default for MaterialPass {
    fn default() -> Self {
        Self {
            shader: None,
            properties: AHashMap::new(),
            texture: None,
            state_bits: StateBits::COLOR_WRITE | StateBits::ALPHA_WRITE | StateBits::DEPTH_WRITE,
            cull: CullType::Back,
            rendering_mode: RenderingMode::Opaque,
            cutoff_alpha: 0.5,
            vertex_color_mode: VertexColorMode::Ignore,
            tc_scale: Vec2::ONE,
            tc_translation: Vec2::ZERO,
            constant_color: Vec4::ONE,
            use_owner_color: false,
        }
    }
}

impl MaterialPass {
    /// `true` if fragments are alpha tested.
    #[inline]
    pub fn is_alpha_cutoff(&self) -> bool {
        self.rendering_mode == RenderingMode::AlphaCutoff
    }

    /// The albedo texture: the `albedoMap` property for shader-driven
    /// passes, the pass texture otherwise.
    pub fn albedo_texture(&self) -> Option<TextureId> {
        if self.shader.is_some() {
            match self.properties.get(ALBEDO_MAP_PROPERTY) {
                Some(PropertyValue::Texture(id)) => Some(*id),
                _ => None,
            }
        } else {
            self.texture
        }
    }

    /// The color the pass is tinted with when drawn for an object of color `owner`.
    #[inline]
    pub fn color_for(&self, owner: Vec4) -> Vec4 {
        if self.use_owner_color {
            owner
        } else {
            self.constant_color
        }
    }
}

/// A material: one or more passes plus sorting information.
#[derive(Debug, Clone)]
pub struct Material {
    /// Debug name.
    pub name: String,
    /// What the material is applied to.
    pub kind: MaterialKind,
    /// Drawing order bucket.
    pub sort: MaterialSort,
    /// Per-material switches.
    pub flags: MaterialFlags,
    passes: Vec<MaterialPass>,
}

impl Material {
    /// Creates a material with a single pass.
    pub fn new(name: impl Into<String>, kind: MaterialKind, sort: MaterialSort, pass: MaterialPass) -> Self {
        Self {
            name: name.into(),
            kind,
            sort,
            flags: MaterialFlags::empty(),
            passes: vec![pass],
        }
    }

    /// Sets the material flags.
    pub fn with_flags(mut self, flags: MaterialFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Appends a pass.
    pub fn with_pass(mut self, pass: MaterialPass) -> Self {
        self.passes.push(pass);
        self
    }

    /// The first pass. Every material has at least one.
    #[inline]
    pub fn pass(&self) -> &MaterialPass {
        &self.passes[0]
    }

    /// Every pass in order.
    #[inline]
    pub fn passes(&self) -> &[MaterialPass] {
        &self.passes
    }

    /// `true` if the first pass is shaded by a lit surface shader.
    pub fn is_lit_surface(&self) -> bool {
        self.pass().shader.as_ref().is_some_and(|s| s.is_lit_surface())
    }

    /// `true` if the first pass is shaded by a sky shader.
    pub fn is_sky_surface(&self) -> bool {
        self.pass().shader.as_ref().is_some_and(|s| {
            s.flags
                .contains(crate::renderer::api::shader::ShaderFlags::SKY_SURFACE)
        })
    }

    /// The cull mode of the first pass.
    #[inline]
    pub fn cull(&self) -> CullType {
        self.pass().cull
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::shader::{ShaderFlags, ShaderId};

    #[test]
    fn test_albedo_texture_source() {
        let mut pass = MaterialPass {
            texture: Some(TextureId(3)),
            ..Default::default()
        };
        assert_eq!(pass.albedo_texture(), Some(TextureId(3)));

        pass.shader = Some(Arc::new(Shader::new(ShaderId(1), "standard")));
        assert_eq!(pass.albedo_texture(), None);

        pass.properties
            .insert(ALBEDO_MAP_PROPERTY.to_string(), PropertyValue::Texture(TextureId(9)));
        assert_eq!(pass.albedo_texture(), Some(TextureId(9)));
    }

    #[test]
    fn test_lit_and_sky_flags() {
        let lit = Arc::new(
            Shader::new(ShaderId(1), "standard").with_flags(ShaderFlags::LIT_SURFACE),
        );
        let material = Material::new(
            "wall",
            MaterialKind::Surface,
            MaterialSort::Opaque,
            MaterialPass {
                shader: Some(lit),
                ..Default::default()
            },
        );
        assert!(material.is_lit_surface());
        assert!(!material.is_sky_surface());
        assert!(MaterialSort::Translucent > MaterialSort::Sky);
    }
}
