mod common;

use anyhow::Result;
use approx::assert_relative_eq;
use common::*;
use ember_core::math::{Aabb, Mat3, Mat4, Vec3};
use ember_core::renderer::api::{
    ClearFlags, DrawSurf, InstancingMethod, LightFlags, LightKind, RenderFrame, RenderSettings,
    ViewFlags, VisibleLight,
};
use std::sync::Arc;

const SHADOWED_VIEW: ViewFlags = ViewFlags::TEXTURED_MODE.union(ViewFlags::SHADOWS);

fn light(kind: LightKind, origin: Vec3, radius: f32) -> VisibleLight {
    let mut light = VisibleLight::new(
        0,
        kind,
        origin,
        Mat3::IDENTITY,
        Vec3::splat(radius),
        light_material(),
    );
    light.lit_surfs = vec![0];
    light
}

/// A shadow casting unit cube at `position`, lit and cast by every light.
fn caster_frame(position: Vec3, light: VisibleLight) -> RenderFrame {
    let cube = object_at(0, 0, position);
    let surfs: Vec<DrawSurf> = vec![instanced_surf(&static_mesh(1, 36), &lit_material("cube"), &cube)];
    let mut light = light;
    light.shadow_caster_surfs = vec![0];
    light.shadow_caster_aabb = Aabb::from_min_max(position - Vec3::splat(0.5), position + Vec3::splat(0.5));
    light.lit_aabb = light.shadow_caster_aabb;
    let mut frame = frame_with(surfs, SHADOWED_VIEW);
    frame.lights = vec![Arc::new(light)];
    frame
}

fn shadow_map_begins(device: &RecordingDevice) -> usize {
    device.count(|c| matches!(c, DeviceCall::BeginRenderTarget(id, _) if *id == SHADOW_MAP))
}

fn cube_clears(device: &RecordingDevice) -> usize {
    let mut in_cube = false;
    let mut clears = 0;
    for call in &device.calls {
        match call {
            DeviceCall::BeginRenderTarget(id, _) => in_cube = *id == VSCM,
            DeviceCall::EndRenderTarget => in_cube = false,
            DeviceCall::Clear(flags) if in_cube && *flags == ClearFlags::DEPTH => clears += 1,
            _ => {}
        }
    }
    clears
}

#[test]
fn spot_light_renders_its_casters_before_its_interaction() -> Result<()> {
    let mut h = Harness::new(settings(InstancingMethod::NoInstancing))?;
    let frame = caster_frame(Vec3::new(10.0, 0.0, 0.0), light(LightKind::Spot, Vec3::ZERO, 20.0));

    h.draw_view(&frame);

    assert_eq!(shadow_map_begins(&h.device), 1);
    assert_eq!(h.ctx.counter.shadow_map_draws, 1);
    assert_eq!(h.ctx.counter.shadow_draw_calls, 1);
    assert_ne!(h.ctx.shadow.view_proj_scale_bias[0], Mat4::ZERO);

    let shadow_end = h
        .device
        .calls
        .iter()
        .position(|c| *c == DeviceCall::EndRenderTarget)
        .expect("shadow map finished");
    let draws_after = h.device.calls[shadow_end..].iter().filter(|c| c.is_draw()).count();
    // Depth pre-pass and base come first; the light interaction follows its shadow map.
    assert_eq!(draws_after, 1);
    assert_eq!(h.device.draw_count(), 4);
    Ok(())
}

#[test]
fn spot_light_without_casters_leaves_the_shadow_map_alone() -> Result<()> {
    let mut h = Harness::new(settings(InstancingMethod::NoInstancing))?;
    let mut frame = frame_with(
        vec![surf(&static_mesh(1, 36), &lit_material("floor"), &object(0, 0))],
        SHADOWED_VIEW,
    );
    frame.lights = vec![Arc::new(light(LightKind::Spot, Vec3::ZERO, 20.0))];

    h.draw_view(&frame);

    assert_eq!(shadow_map_begins(&h.device), 0);
    assert_eq!(h.device.count(|c| *c == DeviceCall::Clear(ClearFlags::DEPTH)), 0);
    assert_eq!(h.ctx.counter.shadow_map_draws, 0);
    assert_eq!(h.ctx.shadow.view_proj_scale_bias[0], Mat4::ZERO);
    // The light is still applied, unshadowed.
    assert_eq!(h.device.draw_count(), 3);
    Ok(())
}

#[test]
fn orthographic_light_rejects_a_missing_caster_range() -> Result<()> {
    let mut h = Harness::new(settings(InstancingMethod::NoInstancing))?;
    let mut frame = frame_with(
        vec![surf(&static_mesh(1, 36), &lit_material("floor"), &object(0, 0))],
        SHADOWED_VIEW,
    );
    let mut sun = light(LightKind::Directional, Vec3::new(0.0, 0.0, 50.0), 100.0);
    sun.axis = Mat3::from_forward_up(-Vec3::Z, Vec3::X);
    frame.lights = vec![Arc::new(sun)];

    h.draw_view(&frame);

    assert_eq!(shadow_map_begins(&h.device), 0);
    assert_eq!(h.ctx.counter.shadow_draw_calls, 0);
    Ok(())
}

#[test]
fn shadows_can_be_switched_off() -> Result<()> {
    let mut h = Harness::new(RenderSettings {
        shadows: false,
        ..settings(InstancingMethod::NoInstancing)
    })?;
    let frame = caster_frame(Vec3::new(10.0, 0.0, 0.0), light(LightKind::Spot, Vec3::ZERO, 20.0));

    h.draw_view(&frame);

    assert_eq!(shadow_map_begins(&h.device), 0);
    assert_eq!(h.ctx.counter.shadow_map_draws, 0);
    Ok(())
}

#[test]
fn lights_without_the_cast_flag_skip_shadows() -> Result<()> {
    let mut h = Harness::new(settings(InstancingMethod::NoInstancing))?;
    let mut spot = light(LightKind::Spot, Vec3::ZERO, 20.0);
    spot.flags = LightFlags::empty();
    let frame = caster_frame(Vec3::new(10.0, 0.0, 0.0), spot);

    h.draw_view(&frame);

    assert_eq!(shadow_map_begins(&h.device), 0);
    Ok(())
}

#[test]
fn empty_cube_faces_are_cleared_once() -> Result<()> {
    let mut h = Harness::new(settings(InstancingMethod::NoInstancing))?;
    let mut frame = frame_with(
        vec![surf(&static_mesh(1, 36), &lit_material("floor"), &object(0, 0))],
        SHADOWED_VIEW,
    );
    frame.lights = vec![Arc::new(light(LightKind::Point, Vec3::new(5.0, 0.0, 0.0), 10.0))];

    h.draw_view(&frame);
    let first = cube_clears(&h.device);
    assert!(first > 0 && first <= 6, "cleared {first} faces");

    h.device.clear_calls();
    h.ctx.begin_frame(2, 1.0 / 60.0);
    h.draw_view(&frame);
    assert_eq!(cube_clears(&h.device), 0);

    h.shadows.invalidate();
    h.device.clear_calls();
    h.ctx.begin_frame(3, 1.0 / 60.0);
    h.draw_view(&frame);
    assert_eq!(cube_clears(&h.device), first);
    Ok(())
}

#[test]
fn point_light_draws_casters_into_the_facing_cube_side() -> Result<()> {
    let mut h = Harness::new(settings(InstancingMethod::NoInstancing))?;
    let frame = caster_frame(
        Vec3::new(8.0, 0.0, 0.0),
        light(LightKind::Point, Vec3::new(5.0, 0.0, 0.0), 10.0),
    );

    h.draw_view(&frame);

    assert!(h.ctx.counter.shadow_map_draws >= 1);
    assert!(h.ctx.counter.shadow_draw_calls >= 1);
    assert!(h.device.count(|c| *c == DeviceCall::BeginRenderTarget(VSCM, 0)) >= 1);
    assert_relative_eq!(h.ctx.shadow.projection_depth.y, 10.0 / (10.0 - 0.04));
    Ok(())
}

#[test]
fn distant_cascades_are_refreshed_at_a_throttled_rate() -> Result<()> {
    let mut h = Harness::new(RenderSettings {
        csm_update_ratio: 0.5,
        csm_non_cached_distance: 0.0,
        ..settings(InstancingMethod::NoInstancing)
    })?;
    let mut sun = light(LightKind::Directional, Vec3::new(0.0, 0.0, 50.0), 100.0);
    sun.flags |= LightFlags::PRIMARY_LIGHT;
    sun.axis = Mat3::from_forward_up(-Vec3::Z, Vec3::X);
    let frame = caster_frame(Vec3::new(10.0, 0.0, 0.0), sun);

    h.draw_view(&frame);

    // No accumulator reached one yet.
    assert_eq!(shadow_map_begins(&h.device), 0);
    let throttle = h.shadows.throttle();
    assert_relative_eq!(throttle.accumulator(0), 0.5);
    assert_relative_eq!(throttle.accumulator(1), 0.375);
    assert_relative_eq!(throttle.accumulator(2), 0.25);
    assert_relative_eq!(throttle.accumulator(3), 0.125);

    let distances = &h.ctx.shadow.csm_distances;
    assert_eq!(distances.len(), 5);
    assert_relative_eq!(distances[0], 0.1);
    assert_relative_eq!(distances[4], 150.0, epsilon = 1e-3);

    h.ctx.begin_frame(2, 1.0 / 60.0);
    h.draw_view(&frame);
    let throttle = h.shadows.throttle();
    assert_relative_eq!(throttle.accumulator(0), 0.0);
    assert_relative_eq!(throttle.accumulator(1), 0.75);
    Ok(())
}

#[test]
fn near_cascades_render_every_frame() -> Result<()> {
    let mut h = Harness::new(RenderSettings {
        csm_update_ratio: 0.2,
        csm_non_cached_distance: 1000.0,
        ..settings(InstancingMethod::NoInstancing)
    })?;
    let mut sun = light(LightKind::Directional, Vec3::new(0.0, 0.0, 50.0), 100.0);
    sun.flags |= LightFlags::PRIMARY_LIGHT;
    sun.axis = Mat3::from_forward_up(-Vec3::Z, Vec3::X);
    let frame = caster_frame(Vec3::new(10.0, 0.0, 0.0), sun);

    for frame_index in 1..=3 {
        h.ctx.begin_frame(frame_index, 1.0 / 60.0);
        h.draw_view(&frame);
        for cascade in 0..4 {
            assert_relative_eq!(h.shadows.throttle().accumulator(cascade), 0.0);
        }
    }
    Ok(())
}
