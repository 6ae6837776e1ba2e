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

//! Per-frame records of the lights that survived culling.

use super::material::Material;
use crate::math::{Aabb, Frustum, Mat3, Mat4, Obb, Vec3};
use crate::renderer::api::state::Rect;
use bitflags::bitflags;
use std::sync::Arc;

/// The shape of a light, which decides its shadow projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    /// Omnidirectional, shadowed through a cube map.
    Point,
    /// Cone shaped, shadowed through one perspective projection.
    Spot,
    /// Parallel rays, shadowed through orthographic projections.
    Directional,
}

bitflags! {
    /// Per-light switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LightFlags: u32 {
        /// The main light of the scene, lit in the base pass.
        const PRIMARY_LIGHT = 1 << 0;
        /// The light renders shadow maps.
        const CAST_SHADOWS = 1 << 1;
    }
}

/// A light affecting the view this frame.
#[derive(Debug, Clone)]
pub struct VisibleLight {
    /// Index in the frame's light list.
    pub index: u32,
    /// Light shape.
    pub kind: LightKind,
    /// Per-light switches.
    pub flags: LightFlags,
    /// World position. Directional lights use the center of their volume.
    pub origin: Vec3,
    /// Orientation: forward, left and up.
    pub axis: Mat3,
    /// Influence radius along each local axis.
    pub radius: Vec3,
    /// World-space light volume.
    pub world_obb: Obb,
    /// Light frustum, meaningful for spot lights.
    pub world_frustum: Frustum,
    /// World to light view transform.
    pub view_matrix: Mat4,
    /// World to light texture space transform.
    pub view_proj_scale_bias: Mat4,
    /// World to falloff texture space transform.
    pub fall_off_matrix: Mat4,
    /// Exponent of the falloff curve.
    pub fall_off_exponent: f32,
    /// Linear color.
    pub color: Vec3,
    /// Scalar intensity.
    pub intensity: f32,
    /// Light material: projection texture and light shader.
    pub material: Arc<Material>,
    /// Slope scaled depth bias for shadow rendering.
    pub shadow_offset_factor: f32,
    /// Constant depth bias for shadow rendering.
    pub shadow_offset_units: f32,
    /// Indices into the frame's draw surfaces of the shadow casters.
    pub shadow_caster_surfs: Vec<u32>,
    /// Indices into the frame's draw surfaces lit by this light.
    pub lit_surfs: Vec<u32>,
    /// Bounds of the lit surfaces.
    pub lit_aabb: Aabb,
    /// Bounds of the shadow casters.
    pub shadow_caster_aabb: Aabb,
    /// Screen rectangle touched by the light.
    pub scissor_rect: Rect,
    /// Result of the occlusion query.
    pub occlusion_visible: bool,
}

impl VisibleLight {
    /// Creates a light with an identity view and no surfaces.
    pub fn new(index: u32, kind: LightKind, origin: Vec3, axis: Mat3, radius: Vec3, material: Arc<Material>) -> Self {
        let world_obb = Obb::new(origin, radius, axis);
        let view_matrix = Mat4::light_view(origin, &axis);
        Self {
            index,
            kind,
            flags: LightFlags::CAST_SHADOWS,
            origin,
            axis,
            radius,
            world_obb,
            world_frustum: Frustum::from_fov(origin, axis, 90.0, 90.0, 0.1, radius.x.max(0.2)),
            view_matrix,
            view_proj_scale_bias: Mat4::IDENTITY,
            fall_off_matrix: Mat4::IDENTITY,
            fall_off_exponent: 1.0,
            color: Vec3::ONE,
            intensity: 1.0,
            material,
            shadow_offset_factor: 1.0,
            shadow_offset_units: 2.0,
            shadow_caster_surfs: Vec::new(),
            lit_surfs: Vec::new(),
            lit_aabb: Aabb::INVALID,
            shadow_caster_aabb: Aabb::INVALID,
            scissor_rect: Rect::EMPTY,
            occlusion_visible: true,
        }
    }

    /// `true` for the scene's main light.
    #[inline]
    pub fn is_primary(&self) -> bool {
        self.flags.contains(LightFlags::PRIMARY_LIGHT)
    }

    /// `true` if the light renders shadow maps.
    #[inline]
    pub fn casts_shadows(&self) -> bool {
        self.flags.contains(LightFlags::CAST_SHADOWS)
    }

    /// Largest influence radius.
    #[inline]
    pub fn max_radius(&self) -> f32 {
        self.radius.x.max(self.radius.y).max(self.radius.z)
    }
}
