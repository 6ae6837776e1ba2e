mod common;

use anyhow::Result;
use common::*;
use ember_core::math::{Vec3, Vec4};
use ember_core::renderer::api::{InstancingMethod, RenderCounter, Topology, ViewFlags};
use ember_core::renderer::ResourceError;
use ember_lanes::render_lane::{load_settings, LaneError};
use ember_lanes::BackEnd;
use std::io::Write;

fn back_end(device: &mut RecordingDevice, method: InstancingMethod) -> Result<BackEnd, ResourceError> {
    BackEnd::init(
        device,
        settings(method),
        builtin_shaders(),
        builtin_textures(),
        render_targets(),
        camera(),
    )
}

fn add_line(back_end: &mut BackEnd, from: Vec3, to: Vec3) {
    let verts = back_end
        .debug_prims_mut()
        .reserve(Topology::LineList, 2, Vec4::ONE, 1.0, false, true, 0.0)
        .expect("room for a line");
    verts.copy_from_slice(&[from, to]);
}

#[test]
fn init_and_shutdown_release_every_buffer() -> Result<()> {
    let mut device = RecordingDevice::new();
    let mut back_end = back_end(&mut device, InstancingMethod::InstancedArrays)?;

    let created = device.count(|c| matches!(c, DeviceCall::CreateBuffer { .. }));
    assert_eq!(created, 2);

    back_end.shutdown(&mut device);
    let destroyed = device.count(|c| matches!(c, DeviceCall::DestroyBuffer(_)));
    assert_eq!(destroyed, created);
    Ok(())
}

#[test]
fn failed_init_releases_what_was_created() {
    let mut device = RecordingDevice::new();
    device.fail_buffer_creation = true;

    let err = back_end(&mut device, InstancingMethod::NoInstancing).unwrap_err();
    assert!(matches!(err, ResourceError::BufferCreation { ref label, .. } if label == "debug_prims"));
    assert_eq!(device.count(|c| matches!(c, DeviceCall::CreateBuffer { .. })), 0);
}

#[test]
fn begin_frame_resets_the_counters() -> Result<()> {
    let mut device = RecordingDevice::new();
    let mut back_end = back_end(&mut device, InstancingMethod::NoInstancing)?;
    let frame = frame_with(
        vec![surf(&static_mesh(1, 36), &unlit_material("crate"), &object(0, 0))],
        ViewFlags::TEXTURED_MODE,
    );

    back_end.begin_frame(1, 1.0 / 60.0);
    back_end.draw_view(&mut device, &frame);
    assert_eq!(back_end.counter().draw_calls, 1);
    assert_eq!(back_end.counter().draw_indexes, 36);

    back_end.begin_frame(2, 1.0 / 60.0);
    assert_eq!(*back_end.counter(), RenderCounter::default());
    assert_eq!(back_end.context().frame, 2);
    Ok(())
}

#[test]
fn debug_lines_merge_into_one_draw() -> Result<()> {
    let mut device = RecordingDevice::new();
    let mut back_end = back_end(&mut device, InstancingMethod::NoInstancing)?;
    add_line(&mut back_end, Vec3::ZERO, Vec3::X);
    add_line(&mut back_end, Vec3::ZERO, Vec3::Y);
    let verts = back_end
        .debug_prims_mut()
        .reserve(Topology::TriangleList, 3, Vec4::ONE, 1.0, true, true, 0.0)
        .expect("room for a triangle");
    verts.copy_from_slice(&[Vec3::ZERO, Vec3::X, Vec3::Y]);

    back_end.begin_frame(1, 1.0 / 60.0);
    device.clear_calls();
    back_end.draw_view(&mut device, &frame_with(Vec::new(), ViewFlags::DEBUG_PRIMS));

    assert_eq!(
        device.draws(),
        vec![
            &DeviceCall::DrawArrays { topology: Topology::LineList, first: 0, count: 4 },
            &DeviceCall::DrawArrays { topology: Topology::TriangleList, first: 0, count: 3 },
        ]
    );
    assert_eq!(back_end.counter().draw_calls, 2);
    assert_eq!(back_end.counter().draw_verts, 7);
    Ok(())
}

#[test]
fn debug_prims_need_the_view_flag() -> Result<()> {
    let mut device = RecordingDevice::new();
    let mut back_end = back_end(&mut device, InstancingMethod::NoInstancing)?;
    add_line(&mut back_end, Vec3::ZERO, Vec3::Z);

    device.clear_calls();
    back_end.draw_view(&mut device, &frame_with(Vec::new(), ViewFlags::empty()));
    assert_eq!(device.draw_count(), 0);

    back_end.debug_prims_mut().clear(0.0);
    back_end.draw_view(&mut device, &frame_with(Vec::new(), ViewFlags::DEBUG_PRIMS));
    assert_eq!(device.draw_count(), 0);
    Ok(())
}

#[test]
fn settings_load_from_a_ron_file() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "(instancing_method: NoInstancing, csm_count: 3, motion_blur: true)")?;

    let settings = load_settings(file.path())?;
    assert_eq!(settings.instancing_method, InstancingMethod::NoInstancing);
    assert_eq!(settings.csm_count, 3);
    assert!(settings.motion_blur);

    let mut bad = tempfile::NamedTempFile::new()?;
    writeln!(bad, "(max_instancing_count: 0)")?;
    assert!(matches!(
        load_settings(bad.path()),
        Err(LaneError::InvalidValue { name: "max_instancing_count", .. })
    ));
    Ok(())
}
