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

//! Fixed-function render state and draw descriptors.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Packed fixed-function state applied before a draw.
    ///
    /// Depth functions and blend factors are mutually exclusive within their
    /// group; use [`StateBits::with_depth_func`] to switch the depth function.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct StateBits: u32 {
        /// Writes to the red, green and blue channels.
        const COLOR_WRITE = 1 << 0;
        /// Writes to the alpha channel.
        const ALPHA_WRITE = 1 << 1;
        /// Writes to the depth buffer.
        const DEPTH_WRITE = 1 << 2;

        /// Depth test always passes.
        const DF_ALWAYS = 1 << 3;
        /// Depth test passes on less.
        const DF_LESS = 1 << 4;
        /// Depth test passes on less or equal.
        const DF_LEQUAL = 1 << 5;
        /// Depth test passes on equal.
        const DF_EQUAL = 1 << 6;
        /// Depth test passes on greater or equal.
        const DF_GEQUAL = 1 << 7;

        /// Source blend factor 0.
        const BS_ZERO = 1 << 8;
        /// Source blend factor 1.
        const BS_ONE = 1 << 9;
        /// Source blend factor `src.a`.
        const BS_SRC_ALPHA = 1 << 10;
        /// Source blend factor `1 - src.a`.
        const BS_ONE_MINUS_SRC_ALPHA = 1 << 11;
        /// Source blend factor `dst.rgb`.
        const BS_DST_COLOR = 1 << 12;

        /// Destination blend factor 0.
        const BD_ZERO = 1 << 13;
        /// Destination blend factor 1.
        const BD_ONE = 1 << 14;
        /// Destination blend factor `src.a`.
        const BD_SRC_ALPHA = 1 << 15;
        /// Destination blend factor `1 - src.a`.
        const BD_ONE_MINUS_SRC_ALPHA = 1 << 16;
        /// Destination blend factor `src.rgb`.
        const BD_SRC_COLOR = 1 << 17;

        /// Rasterizes polygon edges only.
        const PM_WIREFRAME = 1 << 18;

        /// Every depth function bit.
        const MASK_DEPTH_FUNC = Self::DF_ALWAYS.bits()
            | Self::DF_LESS.bits()
            | Self::DF_LEQUAL.bits()
            | Self::DF_EQUAL.bits()
            | Self::DF_GEQUAL.bits();
        /// Every source blend bit.
        const MASK_BLEND_SRC = Self::BS_ZERO.bits()
            | Self::BS_ONE.bits()
            | Self::BS_SRC_ALPHA.bits()
            | Self::BS_ONE_MINUS_SRC_ALPHA.bits()
            | Self::BS_DST_COLOR.bits();
        /// Every destination blend bit.
        const MASK_BLEND_DST = Self::BD_ZERO.bits()
            | Self::BD_ONE.bits()
            | Self::BD_SRC_ALPHA.bits()
            | Self::BD_ONE_MINUS_SRC_ALPHA.bits()
            | Self::BD_SRC_COLOR.bits();
        /// Every blend bit.
        const MASK_BLEND = Self::MASK_BLEND_SRC.bits() | Self::MASK_BLEND_DST.bits();
    }
}

impl StateBits {
    /// Returns a copy whose depth function is replaced by `func`.
    #[inline]
    pub fn with_depth_func(self, func: StateBits) -> Self {
        (self - Self::MASK_DEPTH_FUNC) | (func & Self::MASK_DEPTH_FUNC)
    }

    /// Returns a copy without any blend factor.
    #[inline]
    pub fn without_blend(self) -> Self {
        self - Self::MASK_BLEND
    }

    /// `true` if any blend factor is set.
    #[inline]
    pub fn has_blend(&self) -> bool {
        self.intersects(Self::MASK_BLEND)
    }
}

/// Which faces are discarded before rasterization.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CullType {
    /// Both faces are drawn.
    None,
    /// Back faces are discarded.
    #[default]
    Back,
    /// Front faces are discarded.
    Front,
}

/// Primitive assembly mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    /// Isolated points.
    PointList,
    /// Pairs of vertices.
    LineList,
    /// A connected line.
    LineStrip,
    /// A closed connected line.
    LineLoop,
    /// Triplets of vertices.
    TriangleList,
    /// A triangle strip.
    TriangleStrip,
    /// A triangle fan.
    TriangleFan,
}

/// An integer rectangle in framebuffer pixels.
///
/// An empty scissor rectangle disables scissor testing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Width.
    pub w: i32,
    /// Height.
    pub h: i32,
}

impl Rect {
    /// The empty rectangle.
    pub const EMPTY: Self = Self {
        x: 0,
        y: 0,
        w: 0,
        h: 0,
    };

    /// Creates a new rectangle.
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// `true` if the rectangle covers no pixel.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }
}

bitflags! {
    /// Buffers cleared by [`RenderDevice::clear`].
    ///
    /// [`RenderDevice::clear`]: crate::renderer::traits::RenderDevice::clear
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        /// The color attachment.
        const COLOR = 1 << 0;
        /// The depth attachment.
        const DEPTH = 1 << 1;
        /// The stencil attachment.
        const STENCIL = 1 << 2;
    }
}

/// Attribute layout of a vertex stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    /// Position only.
    Xyz,
    /// Position and texture coordinate.
    XyzSt,
    /// Position, texture coordinate and color.
    XyzStColor,
    /// Position and normal.
    XyzNormal,
    /// Position, texture coordinate, normal and tangent.
    XyzStNT,
    /// Position, texture coordinate, color, normal and tangent.
    XyzStColorNT,
    /// Position and color.
    XyzColor,
}

/// A complete vertex input declaration.
///
/// Each layout comes in eight flavours: plain, one of three GPU skinning
/// tiers, and the same four with a per-instance stream appended. The flavours
/// are laid out contiguously so that [`VertexFormat::index`] of a skinned or
/// instanced format is a fixed offset from the plain one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexFormat {
    /// Base attribute layout.
    pub layout: VertexLayout,
    /// GPU skinning tier (0, 1 or 2 for 1, 4 or 8 weights), if any.
    pub skinning_tier: Option<u8>,
    /// `true` if a per-instance stream follows the vertex streams.
    pub instanced: bool,
}

impl VertexFormat {
    /// Offset between a plain format and its instanced flavour.
    pub const INSTANCED_OFFSET: usize = 4;

    const FLAVOURS: usize = 8;
    const LAYOUTS: [VertexLayout; 7] = [
        VertexLayout::Xyz,
        VertexLayout::XyzSt,
        VertexLayout::XyzStColor,
        VertexLayout::XyzNormal,
        VertexLayout::XyzStNT,
        VertexLayout::XyzStColorNT,
        VertexLayout::XyzColor,
    ];

    /// The plain format of `layout`.
    pub const fn plain(layout: VertexLayout) -> Self {
        Self {
            layout,
            skinning_tier: None,
            instanced: false,
        }
    }

    /// A flat index into the table of every format.
    pub fn index(&self) -> usize {
        let base = self.layout as usize * Self::FLAVOURS;
        let instanced = if self.instanced {
            Self::INSTANCED_OFFSET
        } else {
            0
        };
        let skinning = self.skinning_tier.map_or(0, |t| t as usize + 1);
        base + instanced + skinning
    }

    /// The inverse of [`VertexFormat::index`].
    pub fn from_index(index: usize) -> Option<Self> {
        let layout = *Self::LAYOUTS.get(index / Self::FLAVOURS)?;
        let flavour = index % Self::FLAVOURS;
        let skinning = flavour % Self::INSTANCED_OFFSET;
        Some(Self {
            layout,
            skinning_tier: (skinning > 0).then(|| (skinning - 1) as u8),
            instanced: flavour >= Self::INSTANCED_OFFSET,
        })
    }
}

/// One record of a multi-draw-indirect call, laid out as the GPU reads it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct DrawElementsIndirectCommand {
    /// Number of indices per instance.
    pub count: u32,
    /// Number of instances.
    pub instance_count: u32,
    /// First index inside the bound index buffer.
    pub first_index: u32,
    /// Value added to every index.
    pub base_vertex: i32,
    /// Instance index of the first instance.
    pub base_instance: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_func_is_exclusive() {
        let bits = StateBits::DEPTH_WRITE | StateBits::DF_LEQUAL;
        let bits = bits.with_depth_func(StateBits::DF_EQUAL);
        assert!(bits.contains(StateBits::DF_EQUAL));
        assert!(!bits.contains(StateBits::DF_LEQUAL));
        assert!(bits.contains(StateBits::DEPTH_WRITE));
    }

    #[test]
    fn test_blend_mask() {
        let bits = StateBits::COLOR_WRITE | StateBits::BS_ONE | StateBits::BD_ONE;
        assert!(bits.has_blend());
        assert_eq!(bits.without_blend(), StateBits::COLOR_WRITE);
    }

    #[test]
    fn test_vertex_format_offsets() {
        let plain = VertexFormat::plain(VertexLayout::XyzStNT);
        let skinned = VertexFormat {
            skinning_tier: Some(1),
            ..plain
        };
        let instanced = VertexFormat {
            instanced: true,
            ..skinned
        };
        assert_eq!(skinned.index(), plain.index() + 2);
        assert_eq!(
            instanced.index(),
            plain.index() + VertexFormat::INSTANCED_OFFSET + 2
        );
        assert_eq!(VertexFormat::from_index(instanced.index()), Some(instanced));
        assert_eq!(VertexFormat::from_index(1000), None);
    }

    #[test]
    fn test_indirect_command_layout() {
        assert_eq!(std::mem::size_of::<DrawElementsIndirectCommand>(), 20);
    }
}
