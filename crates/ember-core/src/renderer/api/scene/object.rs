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

//! Per-frame records of the renderable instances that survived culling.

use crate::math::{Aabb, Mat4, Obb, Vec2, Vec3, Vec4};
use crate::renderer::api::core::settings::WireframeMode;
use crate::renderer::api::texture::TextureId;
use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    /// Per-object switches set by the front end.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ObjectFlags: u32 {
        /// The object casts shadows.
        const CAST_SHADOWS = 1 << 0;
        /// The object receives shadows.
        const RECEIVE_SHADOWS = 1 << 1;
        /// The object is drawn with a compressed depth range (view models).
        const DEPTH_HACK = 1 << 2;
        /// The object is not drawn into the selection buffer.
        const SKIP_SELECTION = 1 << 3;
        /// The object is drawn into the occlusion buffer.
        const OCCLUDER = 1 << 4;
    }
}

/// Joint data of a skinned object, produced by the animation system.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinningJointCache {
    /// Three rows per joint, used by the vertex shader skinning method.
    pub joints: Vec<Vec4>,
    /// Texture holding the joint rows, used by the texture fetch method.
    pub joints_map: Option<TextureId>,
    /// Size in texels of `joints_map`.
    pub joints_map_size: u32,
    /// Texture coordinate of this object's first joint in `joints_map`.
    pub tc_base: Vec2,
    /// First joint row of the current and previous frame in `joints_map`.
    pub joint_index_offset: [i32; 2],
}

/// An environment probe blended into an object's indirect lighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvProbeBinding {
    /// Irradiance cube map.
    pub diffuse: TextureId,
    /// Pre-filtered radiance cube map.
    pub specular: TextureId,
    /// Mip level of the roughest radiance.
    pub specular_max_mip: f32,
    /// Capture position.
    pub origin: Vec3,
    /// Parallax corrected lookups inside `proxy_aabb`.
    pub box_projection: bool,
    /// World-space influence box.
    pub proxy_aabb: Aabb,
    /// Blend weight of this probe.
    pub weight: f32,
}

/// A renderable instance placed in the world for this frame.
#[derive(Debug, Clone)]
pub struct VisibleObject {
    /// Index in the frame's object list.
    pub index: u32,
    /// Row of this object in the instance buffer.
    pub instance_index: u32,
    /// Local to world transform.
    pub world: Mat4,
    /// World to local transform.
    pub world_inverse: Mat4,
    /// `world` of the previous frame, for motion vectors.
    pub prev_world: Mat4,
    /// Camera view times `world`.
    pub model_view: Mat4,
    /// Camera view-projection times `world`.
    pub model_view_projection: Mat4,
    /// Per-object switches.
    pub flags: ObjectFlags,
    /// Layer index. Objects on different layers never share a batch.
    pub layer: u32,
    /// Wireframe request of the object.
    pub wireframe_mode: WireframeMode,
    /// Wireframe color.
    pub wireframe_color: Vec4,
    /// Color used by materials that ask for the owner color.
    pub owner_color: Vec4,
    /// Joint data for skinned objects.
    pub joints: Option<Arc<SkinningJointCache>>,
    /// Up to two environment probes.
    pub env_probes: [Option<EnvProbeBinding>; 2],
    /// Local-space bounds.
    pub aabb: Aabb,
    /// World-space bounds.
    pub world_obb: Obb,
}

impl VisibleObject {
    /// Creates an object at `world` with default attributes.
    pub fn new(index: u32, world: Mat4, aabb: Aabb) -> Self {
        Self {
            index,
            instance_index: index,
            world,
            world_inverse: world.affine_inverse().unwrap_or(Mat4::IDENTITY),
            prev_world: world,
            model_view: world,
            model_view_projection: world,
            flags: ObjectFlags::CAST_SHADOWS | ObjectFlags::RECEIVE_SHADOWS,
            layer: 0,
            wireframe_mode: WireframeMode::None,
            wireframe_color: Vec4::ONE,
            owner_color: Vec4::ONE,
            joints: None,
            env_probes: [None, None],
            aabb,
            world_obb: Obb::from_aabb_transform(&aabb, &world),
        }
    }

    /// Computes `model_view` and `model_view_projection` for a camera.
    pub fn update_view(&mut self, view: &Mat4, view_projection: &Mat4) {
        self.model_view = *view * self.world;
        self.model_view_projection = *view_projection * self.world;
    }

    /// `true` if the object is deformed by joints.
    #[inline]
    pub fn is_skinned(&self) -> bool {
        self.joints.is_some()
    }

    /// `true` if the object moved since the previous frame.
    #[inline]
    pub fn has_moved(&self) -> bool {
        self.world != self.prev_world
    }

    /// `true` if the object casts shadows.
    #[inline]
    pub fn casts_shadows(&self) -> bool {
        self.flags.contains(ObjectFlags::CAST_SHADOWS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_object_is_still() {
        let world = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let mut obj = VisibleObject::new(4, world, Aabb::from_min_max(Vec3::ZERO, Vec3::ONE));
        assert_eq!(obj.instance_index, 4);
        assert!(!obj.has_moved());
        assert!(obj.casts_shadows());
        assert_eq!(
            obj.world_inverse.transform_point(Vec3::new(1.0, 2.0, 3.0)),
            Vec3::ZERO
        );

        obj.prev_world = Mat4::IDENTITY;
        assert!(obj.has_moved());
    }
}
