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

//! Defines data structures related to GPU buffer resources.

/// The element type of every index buffer the back end draws from.
pub type TriIndex = u32;

/// Size in bytes of one [`TriIndex`].
pub const TRI_INDEX_SIZE: u32 = std::mem::size_of::<TriIndex>() as u32;

/// An opaque handle to a GPU buffer resource.
///
/// This ID is returned by [`RenderDevice::create_buffer`] and is used to
/// reference the buffer in all subsequent operations.
///
/// [`RenderDevice::create_buffer`]: crate::renderer::traits::RenderDevice::create_buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

impl BufferId {
    /// The null buffer. Binding it unbinds the target.
    pub const NULL: Self = Self(0);

    /// Returns `true` if this is the null buffer.
    #[inline]
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl Default for BufferId {
    fn default() -> Self {
        Self::NULL
    }
}

/// The binding target of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Vertex attributes.
    Vertex,
    /// Triangle indices.
    Index,
    /// Uniform (constant) data.
    Uniform,
    /// Indirect draw command records.
    DrawIndirect,
    /// Texel data read through a buffer texture.
    Texel,
}

/// How often the content of a buffer is expected to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Written once.
    Static,
    /// Rewritten occasionally.
    Dynamic,
    /// Rewritten every time it is used.
    Stream,
}

/// Frame tag of allocations that never expire.
pub const STATIC_FRAME: u32 = u32::MAX;

/// A region of a GPU buffer holding one allocation of geometry or constants.
///
/// Dynamic regions come from a per-frame ring and are only valid during the
/// frame they were written in. Static regions carry [`STATIC_FRAME`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferCache {
    /// The buffer holding the region.
    pub buffer: BufferId,
    /// Byte offset of the region inside `buffer`.
    pub offset: u32,
    /// Byte size of the region.
    pub size: u32,
    /// The frame the region was written in, or [`STATIC_FRAME`].
    pub frame: u32,
}

impl BufferCache {
    /// Creates a permanent region.
    pub fn new_static(buffer: BufferId, offset: u32, size: u32) -> Self {
        Self {
            buffer,
            offset,
            size,
            frame: STATIC_FRAME,
        }
    }

    /// Creates a region valid only during `frame`.
    pub fn new_dynamic(buffer: BufferId, offset: u32, size: u32, frame: u32) -> Self {
        Self {
            buffer,
            offset,
            size,
            frame,
        }
    }

    /// Returns `true` for permanent regions.
    #[inline]
    pub fn is_static(&self) -> bool {
        self.frame == STATIC_FRAME
    }

    /// Returns `true` if the region may be read while drawing `frame`.
    #[inline]
    pub fn is_valid_for(&self, frame: u32) -> bool {
        self.is_static() || self.frame == frame
    }

    /// Index of the first [`TriIndex`] of the region inside its buffer.
    #[inline]
    pub fn first_index(&self) -> u32 {
        self.offset / TRI_INDEX_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_validity() {
        let permanent = BufferCache::new_static(BufferId(1), 0, 64);
        assert!(permanent.is_valid_for(0));
        assert!(permanent.is_valid_for(12345));

        let transient = BufferCache::new_dynamic(BufferId(2), 128, 64, 7);
        assert!(transient.is_valid_for(7));
        assert!(!transient.is_valid_for(8));
        assert_eq!(transient.first_index(), 32);
    }
}
