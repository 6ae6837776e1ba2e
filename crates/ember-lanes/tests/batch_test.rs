mod common;

use anyhow::Result;
use common::*;
use ember_core::renderer::api::{DrawElementsIndirectCommand, InstancingMethod};
use ember_lanes::render_lane::{Batch, FlushKind};

fn setup(method: InstancingMethod) -> Result<(RecordingDevice, ember_lanes::BackEndContext, Batch)> {
    let mut device = RecordingDevice::new();
    let settings = settings(method);
    let batch = Batch::init(&mut device, &settings)?;
    let ctx = context(settings);
    device.clear_calls();
    Ok((device, ctx, batch))
}

#[test]
fn shared_static_meshes_draw_once_with_the_first_counts() -> Result<()> {
    let (mut device, mut ctx, mut batch) = setup(InstancingMethod::NoInstancing)?;
    let material = unlit_material("crate");
    let obj = object(0, 0);
    let first = static_mesh(7, 36);

    batch.begin(FlushKind::Unlit, &material, None, &obj);
    batch.draw_sub_mesh(&mut ctx, &mut device, &first);
    for _ in 0..4 {
        batch.draw_sub_mesh(&mut ctx, &mut device, &static_mesh(7, 36));
    }
    assert_eq!(batch.num_indexes(), 36);
    assert_eq!(device.draw_count(), 0);

    batch.flush(&mut ctx, &mut device);

    assert_eq!(device.draws(), vec![&DeviceCall::DrawElements { start_index: 7 * 4096, count: 36 }]);
    assert_eq!(ctx.counter.draw_calls, 1);
    assert_eq!(ctx.counter.draw_indexes, 36);
    Ok(())
}

#[test]
fn contiguous_dynamic_meshes_extend_the_range() -> Result<()> {
    let (mut device, mut ctx, mut batch) = setup(InstancingMethod::NoInstancing)?;
    let material = unlit_material("debris");
    let obj = object(0, 0);

    let frame = ctx.frame;

    batch.begin(FlushKind::Unlit, &material, None, &obj);
    batch.draw_sub_mesh(&mut ctx, &mut device, &dynamic_mesh(1, 300, 60, frame));
    batch.draw_sub_mesh(&mut ctx, &mut device, &dynamic_mesh(2, 360, 90, frame));

    assert_eq!(device.draw_count(), 0);
    assert_eq!(batch.start_index(), Some(300));
    assert_eq!(batch.num_indexes(), 150);

    batch.flush(&mut ctx, &mut device);
    assert_eq!(device.draws(), vec![&DeviceCall::DrawElements { start_index: 300, count: 150 }]);
    Ok(())
}

#[test]
fn gap_between_dynamic_meshes_flushes_first() -> Result<()> {
    let (mut device, mut ctx, mut batch) = setup(InstancingMethod::NoInstancing)?;
    let material = unlit_material("debris");
    let obj = object(0, 0);

    let frame = ctx.frame;

    batch.begin(FlushKind::Unlit, &material, None, &obj);
    batch.draw_sub_mesh(&mut ctx, &mut device, &dynamic_mesh(1, 300, 60, frame));
    batch.draw_sub_mesh(&mut ctx, &mut device, &dynamic_mesh(2, 400, 90, frame));

    assert_eq!(device.draws(), vec![&DeviceCall::DrawElements { start_index: 300, count: 60 }]);
    assert_eq!(batch.start_index(), Some(400));
    assert_eq!(batch.num_indexes(), 90);

    batch.flush(&mut ctx, &mut device);
    assert_eq!(device.draw_count(), 2);
    Ok(())
}

#[test]
fn consecutive_instances_share_one_indirect_command() -> Result<()> {
    let (mut device, mut ctx, mut batch) = setup(InstancingMethod::InstancedArrays)?;
    ctx.instance_cache = Some(instance_cache());
    let material = lit_material("rock");
    let mesh = static_mesh(3, 120);

    for i in 0..5 {
        let obj = object(i, 10 + i);
        let surf = instanced_surf(&mesh, &material, &obj);
        batch.begin(FlushKind::Base, &material, None, &obj);
        batch.add_instance(&mut ctx, &mut device, &surf);
        batch.draw_sub_mesh(&mut ctx, &mut device, &mesh);
    }
    assert_eq!(batch.indirect_commands().len(), 1);
    assert_eq!(batch.num_instances(), 5);

    batch.flush(&mut ctx, &mut device);

    let expected = DrawElementsIndirectCommand {
        count: 120,
        instance_count: 5,
        first_index: 3 * 4096,
        base_vertex: 0,
        base_instance: 10,
    };
    assert_eq!(
        device.draws(),
        vec![&DeviceCall::MultiDrawElementsIndirect { draw_count: 1, commands: vec![expected] }]
    );
    Ok(())
}

#[test]
fn indirect_overflow_flushes_and_restarts_at_one() -> Result<()> {
    let (mut device, mut ctx, mut batch) = setup(InstancingMethod::InstancedArrays)?;
    ctx.instance_cache = Some(instance_cache());
    let material = lit_material("grass");
    let mesh = static_mesh(4, 6);
    let max = batch.max_instancing_count();

    for i in 0..=max {
        let obj = object(i, i);
        batch.begin(FlushKind::Base, &material, None, &obj);
        batch.add_instance(&mut ctx, &mut device, &instanced_surf(&mesh, &material, &obj));
        batch.draw_sub_mesh(&mut ctx, &mut device, &mesh);
    }

    assert_eq!(device.draw_count(), 1);
    match device.draws()[0] {
        DeviceCall::MultiDrawElementsIndirect { commands, .. } => {
            assert_eq!(commands[0].instance_count, max);
        }
        other => panic!("unexpected draw {other:?}"),
    }
    assert_eq!(batch.num_instances(), 1);
    assert_eq!(batch.indirect_commands()[0].base_instance, max);
    Ok(())
}

#[test]
fn uniform_window_overflow_flushes() -> Result<()> {
    let (mut device, mut ctx, mut batch) = setup(InstancingMethod::UniformBuffer)?;
    ctx.instance_cache = Some(instance_cache());
    let material = lit_material("tree");
    let mesh = static_mesh(5, 30);
    let max = batch.max_instancing_count();

    let near = object(0, 2);
    let far = object(1, 2 + max);

    batch.begin(FlushKind::Base, &material, None, &near);
    batch.add_instance(&mut ctx, &mut device, &instanced_surf(&mesh, &material, &near));
    batch.draw_sub_mesh(&mut ctx, &mut device, &mesh);
    assert_eq!(batch.instance_window(), Some((2, 2)));

    batch.begin(FlushKind::Base, &material, None, &far);
    batch.add_instance(&mut ctx, &mut device, &instanced_surf(&mesh, &material, &far));

    assert_eq!(
        device.draws(),
        vec![&DeviceCall::DrawElementsInstanced { start_index: 5 * 4096, count: 30, instance_count: 1 }]
    );
    assert_eq!(batch.instance_window(), Some((2 + max, 2 + max)));
    assert_eq!(batch.instance_locals(), &[0]);
    assert_eq!(batch.num_instances(), 1);
    Ok(())
}

#[test]
fn uniform_window_fills_up_to_the_limit() -> Result<()> {
    let (mut device, mut ctx, mut batch) = setup(InstancingMethod::UniformBuffer)?;
    ctx.instance_cache = Some(instance_cache());
    let material = lit_material("fence");
    let mesh = static_mesh(6, 12);
    let max = batch.max_instancing_count();

    for i in 0..max {
        let obj = object(i, 7 + i);
        batch.begin(FlushKind::Base, &material, None, &obj);
        batch.add_instance(&mut ctx, &mut device, &instanced_surf(&mesh, &material, &obj));
        batch.draw_sub_mesh(&mut ctx, &mut device, &mesh);
    }

    assert_eq!(device.draw_count(), 0);
    assert_eq!(batch.instance_window(), Some((7, 6 + max)));
    assert_eq!(batch.num_instances(), max);
    assert_eq!(batch.instance_locals().last(), Some(&(max as i32 - 1)));

    batch.flush(&mut ctx, &mut device);
    assert_eq!(
        device.draws(),
        vec![&DeviceCall::DrawElementsInstanced { start_index: 6 * 4096, count: 12, instance_count: max }]
    );
    Ok(())
}

#[test]
fn instance_below_the_window_start_flushes() -> Result<()> {
    let (mut device, mut ctx, mut batch) = setup(InstancingMethod::UniformBuffer)?;
    ctx.instance_cache = Some(instance_cache());
    let material = lit_material("lamp");
    let mesh = static_mesh(8, 24);

    let upper = object(0, 5);
    let lower = object(1, 4);

    batch.begin(FlushKind::Base, &material, None, &upper);
    batch.add_instance(&mut ctx, &mut device, &instanced_surf(&mesh, &material, &upper));
    batch.draw_sub_mesh(&mut ctx, &mut device, &mesh);

    batch.begin(FlushKind::Base, &material, None, &lower);
    batch.add_instance(&mut ctx, &mut device, &instanced_surf(&mesh, &material, &lower));

    assert_eq!(
        device.draws(),
        vec![&DeviceCall::DrawElementsInstanced { start_index: 8 * 4096, count: 24, instance_count: 1 }]
    );
    assert_eq!(batch.instance_window(), Some((4, 4)));
    assert_eq!(batch.instance_locals(), &[0]);
    assert_eq!(batch.num_instances(), 1);
    Ok(())
}

#[test]
fn flush_without_geometry_is_a_no_op()-> Result<()> {
    let (mut device, mut ctx, mut batch) = setup(InstancingMethod::InstancedArrays)?;
    let material = unlit_material("nothing");
    let obj = object(0, 0);

    batch.flush(&mut ctx, &mut device);
    batch.begin(FlushKind::Unlit, &material, None, &obj);
    batch.flush(&mut ctx, &mut device);
    batch.flush(&mut ctx, &mut device);

    assert!(device.calls.is_empty());
    assert!(batch.is_empty());
    assert_eq!(batch.num_verts(), 0);
    assert_eq!(batch.num_instances(), 0);
    assert_eq!(batch.start_index(), None);
    assert_eq!(ctx.counter.draw_calls, 0);
    Ok(())
}

#[test]
fn shutdown_releases_the_indirect_buffer() -> Result<()> {
    let mut device = RecordingDevice::new();
    let mut batch = Batch::init(&mut device, &settings(InstancingMethod::InstancedArrays))?;
    let buffer = batch.indirect_buffer();
    assert!(!buffer.is_null());

    batch.shutdown(&mut device);
    assert!(device.calls.contains(&DeviceCall::DestroyBuffer(buffer)));
    assert!(batch.indirect_buffer().is_null());
    Ok(())
}

#[test]
fn init_reports_buffer_failures() {
    let mut device = RecordingDevice::new();
    device.fail_buffer_creation = true;
    assert!(Batch::init(&mut device, &settings(InstancingMethod::InstancedArrays)).is_err());
    assert!(Batch::init(&mut device, &settings(InstancingMethod::NoInstancing)).is_ok());
}
