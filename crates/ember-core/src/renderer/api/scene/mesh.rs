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

//! Geometry as the back end sees it: buffer regions and counts.

use crate::math::Aabb;
use crate::renderer::api::buffer::BufferCache;

/// Size in bytes of the vertex layout used by dynamic geometry.
pub const GENERIC_VERTEX_SIZE: u32 = 32;
/// Size in bytes of the vertex layout used by static geometry.
pub const GENERIC_LIT_VERTEX_SIZE: u32 = 48;

/// Lifecycle class of a sub-mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshKind {
    /// A logical copy sharing the cached buffers of another mesh.
    Reference,
    /// Cached once, never rewritten.
    Static,
    /// Rewritten into the per-frame ring every frame.
    Dynamic,
    /// Cached once, deformed by joints at draw time.
    Skinned,
}

/// One drawable piece of a mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct SubMesh {
    /// Lifecycle class.
    pub kind: MeshKind,
    /// Identity of the cached geometry. Sub-meshes with the same `ref_id`
    /// draw the same vertices and indices.
    pub ref_id: u32,
    /// Vertex region. For GPU skinned meshes, the weight stream follows the
    /// vertices in the same buffer.
    pub vertex_cache: BufferCache,
    /// Index region.
    pub index_cache: BufferCache,
    /// Number of vertices.
    pub num_verts: u32,
    /// Number of indices.
    pub num_indexes: u32,
    /// GPU skinning tier (0, 1 or 2 for 1, 4 or 8 weights), `None` if the
    /// mesh is not skinned on the GPU.
    pub gpu_skinning_tier: Option<u8>,
    /// Local-space bounds.
    pub aabb: Aabb,
}

impl SubMesh {
    /// `true` if both sub-meshes draw the same cached geometry.
    #[inline]
    pub fn is_shared(&self, other: &SubMesh) -> bool {
        self.ref_id == other.ref_id
    }

    /// `true` for meshes rewritten every frame.
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.kind == MeshKind::Dynamic
    }

    /// `true` if the mesh is deformed in the vertex shader.
    #[inline]
    pub fn uses_gpu_skinning(&self) -> bool {
        self.gpu_skinning_tier.is_some()
    }

    /// Stride of the vertex stream.
    #[inline]
    pub fn vertex_size(&self) -> u32 {
        if self.is_dynamic() {
            GENERIC_VERTEX_SIZE
        } else {
            GENERIC_LIT_VERTEX_SIZE
        }
    }

    /// Stride of the weight stream.
    pub fn vertex_weight_size(&self) -> u32 {
        match self.gpu_skinning_tier {
            Some(0) => 4,
            Some(1) => 8,
            Some(_) => 16,
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::buffer::{BufferCache, BufferId};

    fn sub_mesh(kind: MeshKind, ref_id: u32) -> SubMesh {
        SubMesh {
            kind,
            ref_id,
            vertex_cache: BufferCache::new_static(BufferId(1), 0, 480),
            index_cache: BufferCache::new_static(BufferId(2), 0, 120),
            num_verts: 10,
            num_indexes: 30,
            gpu_skinning_tier: None,
            aabb: Aabb::INVALID,
        }
    }

    #[test]
    fn test_sharing_is_by_reference_id() {
        let a = sub_mesh(MeshKind::Static, 4);
        let b = sub_mesh(MeshKind::Reference, 4);
        let c = sub_mesh(MeshKind::Static, 5);
        assert!(a.is_shared(&b));
        assert!(!a.is_shared(&c));
    }

    #[test]
    fn test_vertex_sizes() {
        let mut m = sub_mesh(MeshKind::Dynamic, 1);
        assert_eq!(m.vertex_size(), GENERIC_VERTEX_SIZE);
        m.kind = MeshKind::Skinned;
        m.gpu_skinning_tier = Some(1);
        assert_eq!(m.vertex_size(), GENERIC_LIT_VERTEX_SIZE);
        assert_eq!(m.vertex_weight_size(), 8);
    }
}
