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

//! The render back end: batching, pass drivers and shadow scheduling.
//!
//! [`BackEnd`] owns everything that lives across frames and sequences the
//! passes of a view. The pieces are usable on their own: a [`Batch`] driven
//! by [`passes::walk_surfaces`] with an explicit [`BackEndContext`] is enough
//! to submit any surface list.

pub mod batch;
pub mod config;
pub mod context;
pub mod debug_prims;
pub mod passes;
pub mod shadow;

pub use self::batch::{Batch, FlushKind};
pub use self::config::{load_settings, parse_settings, LaneError};
pub use self::context::{
    BackEndContext, BuiltinShaders, BuiltinTextures, RenderTargets, ShadowState, MAX_CASCADES,
};
pub use self::debug_prims::{DebugPrim, DebugPrimitives};
pub use self::shadow::{CascadeThrottle, ShadowScheduler};

use ember_core::renderer::api::{
    DrawSurf, RenderCounter, RenderFrame, RenderSettings, RenderTarget, ViewDefinition,
};
use ember_core::renderer::{Rect, RenderDevice, ResourceError};

/// The back end of one renderer.
#[derive(Debug)]
pub struct BackEnd {
    ctx: BackEndContext,
    batch: Batch,
    shadows: ShadowScheduler,
    debug_prims: DebugPrimitives,
}

impl BackEnd {
    /// Allocates the device resources of the back end.
    pub fn init(
        device: &mut dyn RenderDevice,
        settings: RenderSettings,
        shaders: BuiltinShaders,
        textures: BuiltinTextures,
        targets: RenderTargets,
        camera: ViewDefinition,
    ) -> Result<Self, ResourceError> {
        let mut batch = Batch::init(device, &settings)?;
        let debug_prims = match DebugPrimitives::init(device) {
            Ok(debug_prims) => debug_prims,
            Err(e) => {
                batch.shutdown(device);
                return Err(e);
            }
        };

        log::debug!(
            "Render back end ready: {}x{} shadow maps, {} cascades",
            targets.shadow_map.width,
            targets.shadow_map.height,
            settings.csm_count
        );

        Ok(Self {
            ctx: BackEndContext::new(settings, shaders, textures, targets, camera),
            batch,
            shadows: ShadowScheduler::new(),
            debug_prims,
        })
    }

    /// Releases the device resources.
    pub fn shutdown(&mut self, device: &mut dyn RenderDevice) {
        self.batch.shutdown(device);
        self.debug_prims.shutdown(device);
        log::info!("Render back end shut down");
    }

    /// The context passed to every pass.
    pub fn context(&self) -> &BackEndContext {
        &self.ctx
    }

    /// Mutable access to the context, to change settings between frames.
    pub fn context_mut(&mut self) -> &mut BackEndContext {
        &mut self.ctx
    }

    /// Statistics of the current frame.
    pub fn counter(&self) -> &RenderCounter {
        &self.ctx.counter
    }

    /// The shadow scheduler and its cross-frame state.
    pub fn shadows(&self) -> &ShadowScheduler {
        &self.shadows
    }

    /// The debug primitive buffer.
    pub fn debug_prims(&self) -> &DebugPrimitives {
        &self.debug_prims
    }

    /// The debug primitive buffer, to add or clear primitives.
    pub fn debug_prims_mut(&mut self) -> &mut DebugPrimitives {
        &mut self.debug_prims
    }

    /// Starts back-end frame `frame`, resetting the counters.
    pub fn begin_frame(&mut self, frame: u32, frame_time: f32) {
        self.ctx.begin_frame(frame, frame_time);
    }

    /// Draws a 3D view.
    pub fn draw_view(&mut self, device: &mut dyn RenderDevice, frame: &RenderFrame) {
        passes::draw_view(
            &mut self.ctx,
            device,
            &mut self.batch,
            &mut self.shadows,
            &self.debug_prims,
            frame,
        );
    }

    /// Draws 2D interface surfaces over `screen_rect`.
    pub fn draw_2d_view(
        &mut self,
        device: &mut dyn RenderDevice,
        surfs: &[DrawSurf],
        screen_rect: Rect,
    ) {
        passes::draw_2d_view(&mut self.ctx, device, &mut self.batch, surfs, screen_rect);
    }

    /// Renders the occluders of `frame` into `target`. Returns `true` if any
    /// occluder was drawn.
    pub fn draw_occlusion_map(
        &mut self,
        device: &mut dyn RenderDevice,
        frame: &RenderFrame,
        target: RenderTarget,
    ) -> bool {
        passes::draw_occlusion_map(&mut self.ctx, device, &mut self.batch, frame, target)
    }
}
