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

//! The draw surface: one sub-mesh, drawn with one material, for one object.

use super::material::Material;
use super::mesh::SubMesh;
use super::object::VisibleObject;
use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    /// Which passes a surface takes part in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DrawSurfFlags: u32 {
        /// Visible to the camera.
        const AMBIENT_VISIBLE = 1 << 0;
        /// Visible to at least one shadowing light.
        const SHADOW_VISIBLE = 1 << 1;
        /// Can be merged with neighbours through GPU instancing.
        const USE_INSTANCING = 1 << 2;
        /// Drawn in the wireframe pass.
        const SHOW_WIRES = 1 << 3;
        /// Not drawn into the selection buffer.
        const SKIP_SELECTION = 1 << 4;
    }
}

/// One frame-local draw record.
#[derive(Debug, Clone)]
pub struct DrawSurf {
    /// Geometry.
    pub sub_mesh: Arc<SubMesh>,
    /// Shading.
    pub material: Arc<Material>,
    /// Per-surface material parameter overrides.
    pub material_registers: Option<Arc<[f32]>>,
    /// Placement.
    pub object: Arc<VisibleObject>,
    /// Ordering key. Surfaces that may merge are adjacent once sorted.
    pub sort_key: u64,
    /// Pass membership.
    pub flags: DrawSurfFlags,
}

impl DrawSurf {
    /// Creates a camera visible surface.
    pub fn new(sub_mesh: Arc<SubMesh>, material: Arc<Material>, object: Arc<VisibleObject>) -> Self {
        Self {
            sub_mesh,
            material,
            material_registers: None,
            object,
            sort_key: 0,
            flags: DrawSurfFlags::AMBIENT_VISIBLE,
        }
    }

    /// Sets the pass membership flags.
    pub fn with_flags(mut self, flags: DrawSurfFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the ordering key.
    pub fn with_sort_key(mut self, sort_key: u64) -> Self {
        self.sort_key = sort_key;
        self
    }

    /// `true` if the surface may merge with neighbours through instancing.
    #[inline]
    pub fn use_instancing(&self) -> bool {
        self.flags.contains(DrawSurfFlags::USE_INSTANCING)
    }

    /// `true` if the surface is visible to the camera.
    #[inline]
    pub fn is_ambient_visible(&self) -> bool {
        self.flags.contains(DrawSurfFlags::AMBIENT_VISIBLE)
    }

    /// `true` if the surface is visible to a shadowing light.
    #[inline]
    pub fn is_shadow_visible(&self) -> bool {
        self.flags.contains(DrawSurfFlags::SHADOW_VISIBLE)
    }
}
