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

//! The camera and the full set of records the back end consumes for one view.

use super::draw_surf::DrawSurf;
use super::light::VisibleLight;
use crate::math::{Frustum, Mat4, Vec3};
use crate::renderer::api::buffer::BufferCache;
use crate::renderer::api::core::settings::WireframeMode;
use crate::renderer::api::state::Rect;
use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    /// Per-view switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ViewFlags: u32 {
        /// Renders the selection buffer before the main view.
        const SELECTION = 1 << 0;
        /// Allows shadow rendering.
        const SHADOWS = 1 << 1;
        /// Orthographic camera.
        const ORTHO = 1 << 2;
        /// Draws debug primitives.
        const DEBUG_PRIMS = 1 << 3;
        /// Draws the textured background in wireframe mode.
        const TEXTURED_MODE = 1 << 4;
        /// Draws only wireframes.
        const WIREFRAME_MODE = 1 << 5;
    }
}

/// Camera parameters of a view.
#[derive(Debug, Clone)]
pub struct ViewDefinition {
    /// World position of the eye.
    pub origin: Vec3,
    /// Camera volume.
    pub frustum: Frustum,
    /// World to view transform.
    pub view: Mat4,
    /// View to clip transform.
    pub projection: Mat4,
    /// World to clip transform.
    pub view_projection: Mat4,
    /// Pixel rectangle the view draws into.
    pub render_rect: Rect,
    /// Per-view switches.
    pub flags: ViewFlags,
    /// Wireframe overlay requested by the view.
    pub wireframe_mode: WireframeMode,
}

impl ViewDefinition {
    /// Creates a perspective view looking through `frustum`.
    pub fn perspective(frustum: Frustum, fov_x: f32, fov_y: f32, render_rect: Rect) -> Self {
        let view = Mat4::light_view(frustum.origin, &frustum.axis);
        let projection = Mat4::perspective_fov(fov_x, fov_y, frustum.near, frustum.far);
        Self {
            origin: frustum.origin,
            frustum,
            view,
            projection,
            view_projection: projection * view,
            render_rect,
            flags: ViewFlags::SHADOWS,
            wireframe_mode: WireframeMode::None,
        }
    }

    /// `true` if the view uses an orthographic projection.
    #[inline]
    pub fn is_ortho(&self) -> bool {
        self.flags.contains(ViewFlags::ORTHO)
    }
}

/// Everything the front end hands over for one view.
///
/// `draw_surfs` is sorted so that surfaces able to merge are adjacent.
/// Lights reference surfaces by index into `draw_surfs`.
#[derive(Debug, Clone)]
pub struct RenderFrame {
    /// Camera.
    pub view: ViewDefinition,
    /// Sorted surfaces.
    pub draw_surfs: Vec<DrawSurf>,
    /// Visible lights.
    pub lights: Vec<Arc<VisibleLight>>,
    /// Per-instance data of the instanced objects, one aligned row per
    /// `VisibleObject::instance_index`.
    pub instance_cache: Option<BufferCache>,
}

impl RenderFrame {
    /// Creates an empty frame for `view`.
    pub fn new(view: ViewDefinition) -> Self {
        Self {
            view,
            draw_surfs: Vec::new(),
            lights: Vec::new(),
            instance_cache: None,
        }
    }

    /// The primary light, if any.
    pub fn primary_light(&self) -> Option<&Arc<VisibleLight>> {
        self.lights.iter().find(|l| l.is_primary())
    }

    /// Resolves surface indices, skipping indices out of range.
    pub fn surfs_at<'a>(&'a self, indices: &'a [u32]) -> impl Iterator<Item = &'a DrawSurf> + 'a {
        indices
            .iter()
            .filter_map(move |&i| self.draw_surfs.get(i as usize))
    }
}
