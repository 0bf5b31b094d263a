//! A changed object or material must reach every frame slot, one slot per
//! frame, without touching slots the GPU may still be reading.

mod common;

use glam::Mat4;
use rstest::rstest;

use common::rig;
use dynamic_cubemap::backend::TimelineMode;
use dynamic_cubemap::pipeline::constants::{MaterialData, ObjectConstants};
use dynamic_cubemap::scene::demo::{orbiter_world, GLOBE, ORBITER};

#[rstest]
fn test_world_change_reaches_every_slot(#[values(1, 2, 3, 4)] frames_in_flight: usize) {
    let mut rig = rig(frames_in_flight, TimelineMode::Immediate);
    for _ in 0..frames_in_flight {
        rig.tick().unwrap();
    }

    let id = rig.scene.catalog.find(ORBITER).unwrap();
    let stale = |rig: &common::TestRig| {
        let generation = rig.scene.catalog.get(id).unwrap().generation();
        rig.engine
            .frame_ring()
            .unwrap()
            .stale_object_slots(id.0, generation)
    };
    assert_eq!(stale(&rig), 0, "initial constants are in every slot");

    let world = orbiter_world(1.5);
    rig.scene.catalog.set_world(id, world);
    assert_eq!(stale(&rig), frames_in_flight);

    for k in 1..=frames_in_flight {
        rig.tick().unwrap();
        assert_eq!(stale(&rig), frames_in_flight - k);
    }

    let ring = rig.engine.frame_ring().unwrap();
    for frame in ring.frames() {
        let constants = frame.object_constants.get(id.0).unwrap();
        assert_eq!(constants.world, world.transpose());

        let offset = id.0 as u64 * frame.object_constants.stride();
        let bytes = rig
            .backend()
            .read_buffer(
                frame.object_constants.buffer(),
                offset,
                std::mem::size_of::<ObjectConstants>(),
            )
            .unwrap();
        assert_eq!(bytes, bytemuck::bytes_of(constants));
    }

    // Items nobody touched were never reported stale.
    let globe = rig.scene.catalog.find(GLOBE).unwrap();
    let generation = rig.scene.catalog.get(globe).unwrap().generation();
    assert_eq!(ring.stale_object_slots(globe.0, generation), 0);
}

#[rstest]
#[case(2)]
#[case(3)]
fn test_change_during_propagation_restarts_count(#[case] frames_in_flight: usize) {
    let mut rig = rig(frames_in_flight, TimelineMode::Immediate);
    for _ in 0..frames_in_flight {
        rig.tick().unwrap();
    }
    let id = rig.scene.catalog.find(ORBITER).unwrap();

    rig.scene.catalog.set_world(id, orbiter_world(1.0));
    rig.tick().unwrap();

    let latest = orbiter_world(2.0);
    rig.scene.catalog.set_world(id, latest);
    let generation = rig.scene.catalog.get(id).unwrap().generation();
    assert_eq!(
        rig.engine
            .frame_ring()
            .unwrap()
            .stale_object_slots(id.0, generation),
        frames_in_flight
    );

    for _ in 0..frames_in_flight {
        rig.tick().unwrap();
    }
    for frame in rig.engine.frame_ring().unwrap().frames() {
        assert_eq!(
            frame.object_constants.get(id.0).unwrap().world,
            latest.transpose()
        );
    }
}

#[rstest]
fn test_material_change_reaches_every_slot(#[values(1, 3)] frames_in_flight: usize) {
    let mut rig = rig(frames_in_flight, TimelineMode::Immediate);
    rig.tick().unwrap();

    let materials = rig.scene.registry.materials_mut();
    let id = materials.id("bricks0").unwrap();
    materials.modify(id, |m| {
        m.roughness = 0.9;
        m.transform = Mat4::from_scale(glam::Vec3::new(2.0, 2.0, 1.0));
    });
    let index = materials.cb_index(id);
    let generation = materials.generation(id);
    let expected = materials.get(id).unwrap().gpu_data();

    for _ in 0..frames_in_flight {
        rig.tick().unwrap();
    }

    let ring = rig.engine.frame_ring().unwrap();
    assert_eq!(ring.stale_material_slots(index, generation), 0);
    for frame in ring.frames() {
        let data: &MaterialData = frame.materials.get(index).unwrap();
        assert_eq!(*data, expected);
        assert_eq!(data.roughness, 0.9);

        let bytes = rig
            .backend()
            .read_buffer(
                frame.materials.buffer(),
                index as u64 * frame.materials.stride(),
                std::mem::size_of::<MaterialData>(),
            )
            .unwrap();
        assert_eq!(bytes, bytemuck::bytes_of(data));
    }
}

/// Slots still owned by the GPU keep their old copy until the ring hands
/// them out again.
#[test]
fn test_in_flight_slot_keeps_old_constants() {
    let mut rig = rig(3, TimelineMode::Manual);
    for _ in 0..3 {
        rig.tick().unwrap();
    }
    let id = rig.scene.catalog.find(ORBITER).unwrap();
    let before = orbiter_world(0.0).transpose();

    rig.scene.catalog.set_world(id, orbiter_world(4.0));
    rig.timeline.complete_next();
    rig.tick().unwrap();

    let frames = rig.engine.frame_ring().unwrap().frames();
    assert_eq!(
        frames[0].object_constants.get(id.0).unwrap().world,
        orbiter_world(4.0).transpose()
    );
    assert_eq!(frames[1].object_constants.get(id.0).unwrap().world, before);
    assert_eq!(frames[2].object_constants.get(id.0).unwrap().world, before);
}
