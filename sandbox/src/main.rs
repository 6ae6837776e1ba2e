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

// Ember sandbox
// Draws a small scene headlessly for a few frames and reports what the back
// end submitted.

mod device;
mod scene;

use anyhow::{Context, Result};
use device::LoggingDevice;
use ember_core::math::Vec3;
use ember_core::renderer::api::{RenderSettings, Topology};
use ember_lanes::render_lane::load_settings;
use ember_lanes::BackEnd;
use scene::Scene;

const FRAME_COUNT: u32 = 8;
const FRAME_TIME: f32 = 1.0 / 60.0;
const GIZMO_LIFE_TIME: f32 = 4.0 * FRAME_TIME;

fn settings() -> Result<RenderSettings> {
    match std::env::args().nth(1) {
        Some(path) => load_settings(&path).with_context(|| format!("loading settings from {path}")),
        None => Ok(RenderSettings::default()),
    }
}

fn add_gizmo(back_end: &mut BackEnd, origin: Vec3, life_time: f32) {
    for (from, to, color) in scene::axis_lines(origin, 1.0) {
        let Some(verts) = back_end
            .debug_prims_mut()
            .reserve(Topology::LineList, 2, color, 2.0, false, true, life_time)
        else {
            return;
        };
        verts.copy_from_slice(&[from, to]);
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let settings = settings()?;
    let row_size = settings.instance_buffer_offset_alignment;
    let mut device = LoggingDevice::new();
    let mut scene = Scene::build(&mut device)?;

    let eye = Vec3::new(-12.0, -10.0, 8.0);
    let view = scene::camera(eye, Vec3::new(2.0, 0.0, 0.0));
    let mut back_end = BackEnd::init(
        &mut device,
        settings,
        scene.shaders().clone(),
        scene::builtin_textures(),
        scene::render_targets(),
        view.clone(),
    )?;

    for frame in 1..=FRAME_COUNT {
        let time = frame as f32 * FRAME_TIME;
        back_end.begin_frame(frame, FRAME_TIME);
        device.take_stats();

        // A short-lived gizmo every other frame, a permanent one at the origin.
        if frame == 1 {
            add_gizmo(&mut back_end, Vec3::ZERO, f32::MAX);
        }
        if frame % 2 == 1 {
            add_gizmo(&mut back_end, Vec3::new(2.0, 0.0, 3.0), time + GIZMO_LIFE_TIME);
        }

        let render_frame = scene.frame(&mut device, frame, time, &view, row_size)?;
        let occluded = back_end.draw_occlusion_map(&mut device, &render_frame, scene::occlusion_target());
        back_end.draw_view(&mut device, &render_frame);
        back_end.draw_2d_view(&mut device, scene.hud(), scene::SCREEN);

        let counter = *back_end.counter();
        let stats = device.take_stats();
        log::info!(
            "Frame {frame}: {} draws ({} indexes), {} shadow draws into {} maps, {} debug prims, occluders: {occluded}",
            counter.draw_calls,
            counter.draw_indexes,
            counter.shadow_draw_calls,
            counter.shadow_map_draws,
            back_end.debug_prims().prims().len(),
        );
        log::info!(
            "Frame {frame}: device saw {} draws, {} indirect commands, {} state changes, {} target switches, {} clears, {} bytes uploaded",
            stats.draws,
            stats.indirect_commands,
            stats.state_changes,
            stats.target_switches,
            stats.clears,
            stats.uploaded_bytes,
        );

        back_end.debug_prims_mut().clear(time);
    }

    back_end.shutdown(&mut device);
    scene.destroy(&mut device)?;
    if device.live_buffers() > 0 {
        log::warn!("{} buffers leaked", device.live_buffers());
    }
    Ok(())
}
