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

//! Draw statistics gathered by the back end during a frame.

/// Counters accumulated by every draw the back end issues.
///
/// Shadow pass draws are counted twice: once in the general counters and
/// once in the `shadow_*` counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderCounter {
    /// Number of GPU draw calls.
    pub draw_calls: u32,
    /// Number of indices submitted, multiplied by the instance count.
    pub draw_indexes: u32,
    /// Number of vertices submitted, multiplied by the instance count.
    pub draw_verts: u32,
    /// Draw calls issued by shadow map passes.
    pub shadow_draw_calls: u32,
    /// Indices submitted by shadow map passes.
    pub shadow_draw_indexes: u32,
    /// Vertices submitted by shadow map passes.
    pub shadow_draw_verts: u32,
    /// Number of shadow maps rendered this frame.
    pub shadow_map_draws: u32,
}

impl Default for RenderCounter {
    fn default() -> Self {
        Self {
            draw_calls: 0,
            draw_indexes: 0,
            draw_verts: 0,
            shadow_draw_calls: 0,
            shadow_draw_indexes: 0,
            shadow_draw_verts: 0,
            shadow_map_draws: 0,
        }
    }
}

impl RenderCounter {
    /// Resets every counter, called at the start of a frame.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
