//! Command stream structure of a frame: six face captures, then the main pass
//! sampling the fresh cube.

mod common;

use glam::{Vec2, Vec3};
use rstest::rstest;

use common::{last_position, position, rig, TestRig, CUBE_SIZE, HEIGHT, WIDTH};
use dynamic_cubemap::backend::{
    QueueEvent, RecordedCommand, ResourceState, TimelineMode, Viewport,
};
use dynamic_cubemap::pipeline::constants::{cube_face_pass_index, MAIN_PASS_INDEX};
use dynamic_cubemap::pipeline::{CUBE_FAR, CUBE_NEAR};
use dynamic_cubemap::resources::CAPTURE_OPAQUE_PIPELINE;
use dynamic_cubemap::scene::demo::CAPTURE_CENTER;
use dynamic_cubemap::scene::{CubeFace, RenderLayer};
use dynamic_cubemap::{EngineError, GraphicsBackend};

const OPAQUE_ITEMS: usize = 23;

fn ticked(frames: usize) -> TestRig {
    let mut rig = rig(2, TimelineMode::Immediate);
    for _ in 0..frames {
        rig.tick().unwrap();
    }
    rig
}

#[test]
fn test_each_face_draws_opaque_then_sky() {
    let rig = ticked(1);
    let stream = rig.last_stream();
    let cube = rig.engine.cube_target().unwrap();
    let pipelines = rig.engine.pipelines();

    for face in CubeFace::ALL {
        let rtv = cube.rtv(face);
        let draws: Vec<_> = stream
            .draws()
            .filter(|(_, state)| state.render_target == Some(rtv))
            .map(|(_, state)| *state)
            .collect();

        assert_eq!(draws.len(), OPAQUE_ITEMS + 1, "{face:?}");
        let (sky, opaque) = draws.split_last().unwrap();
        assert!(opaque
            .iter()
            .all(|d| d.pipeline == Some(pipelines.capture_opaque)));
        assert_eq!(sky.pipeline, Some(pipelines.sky));
    }
    assert_eq!(
        rig.backend().pipeline_label(pipelines.capture_opaque),
        Some(CAPTURE_OPAQUE_PIPELINE)
    );

    // The reflector never appears in its own capture.
    let reflector_draws = stream
        .draws()
        .filter(|(_, state)| state.cube_map == Some(cube.descriptors().srv))
        .count();
    assert_eq!(reflector_draws, 1);
}

#[test]
fn test_faces_are_captured_in_layer_order() {
    let rig = ticked(1);
    let stream = rig.last_stream();
    let cube = rig.engine.cube_target().unwrap();

    let clears: Vec<_> = stream
        .commands
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::ClearRenderTarget { rtv, .. } => Some(*rtv),
            _ => None,
        })
        .collect();
    let mut expected: Vec<_> = CubeFace::ALL.iter().map(|&f| cube.rtv(f)).collect();
    expected.push(rig.engine.descriptors().swapchain_rtv(0).unwrap());
    assert_eq!(clears, expected);

    let depth_clears = stream
        .commands
        .iter()
        .filter(|c| {
            matches!(c, RecordedCommand::ClearDepthStencil { dsv, depth, .. }
                if *dsv == cube.descriptors().dsv && *depth == 1.0)
        })
        .count();
    assert_eq!(depth_clears, CubeFace::COUNT);
}

#[test]
fn test_cube_transitions_bracket_the_capture() {
    let rig = ticked(1);
    let stream = rig.last_stream();
    let cube = rig.engine.cube_target().unwrap();
    let srv = cube.descriptors().srv;
    let face_rtvs = cube.descriptors().rtvs;

    let barriers = stream.barriers_for(cube.color_texture());
    assert_eq!(barriers.len(), 2);
    let (to_target, before, after) = barriers[0];
    assert_eq!(
        (before, after),
        (ResourceState::PixelShaderResource, ResourceState::RenderTarget)
    );
    let (to_shader, before, after) = barriers[1];
    assert_eq!(
        (before, after),
        (ResourceState::RenderTarget, ResourceState::PixelShaderResource)
    );

    let first_face_clear = position(stream, |c| {
        matches!(c, RecordedCommand::ClearRenderTarget { rtv, .. } if face_rtvs.contains(rtv))
    })
    .unwrap();
    let last_face_draw = last_position(stream, |c| {
        matches!(c, RecordedCommand::DrawIndexed { state, .. }
            if state.render_target.map_or(false, |rt| face_rtvs.contains(&rt)))
    })
    .unwrap();
    let first_cube_sample = position(stream, |c| {
        matches!(c, RecordedCommand::DrawIndexed { state, .. } if state.cube_map == Some(srv))
    })
    .unwrap();

    assert!(to_target < first_face_clear);
    assert!(last_face_draw < to_shader);
    assert!(to_shader < first_cube_sample);
    assert_eq!(
        rig.backend().texture_state(cube.color_texture()),
        Some(ResourceState::PixelShaderResource)
    );
}

#[test]
fn test_back_buffer_is_presentable_after_each_frame() {
    let rig = ticked(3);
    let buffer_count = rig.backend().swapchain().buffer_count;
    for (i, stream) in rig.backend().submissions().iter().enumerate() {
        let back_buffer = rig.backend().back_buffer(i as u32 % buffer_count).unwrap();
        let barriers = stream.barriers_for(back_buffer);
        let states: Vec<_> = barriers.iter().map(|&(_, b, a)| (b, a)).collect();
        assert_eq!(
            states,
            vec![
                (ResourceState::Present, ResourceState::RenderTarget),
                (ResourceState::RenderTarget, ResourceState::Present),
            ],
            "frame {i}"
        );
    }
}

#[test]
fn test_face_passes_use_their_own_constants() {
    let rig = ticked(1);
    let stream = rig.last_stream();
    let cube = rig.engine.cube_target().unwrap();
    let frame = rig.engine.frame_ring().unwrap().current();

    for face in CubeFace::ALL {
        let pass = cube_face_pass_index(face.index());
        let rtv = cube.rtv(face);
        assert!(stream
            .draws()
            .filter(|(_, s)| s.render_target == Some(rtv))
            .all(|(_, s)| s.pass_constants == Some(frame.pass_constants.address_of(pass))));

        let constants = frame.pass_constants.get(pass).unwrap();
        assert_eq!(constants.eye_pos, CAPTURE_CENTER);
        assert_eq!(constants.render_target_size, Vec2::splat(CUBE_SIZE as f32));
        assert_eq!(constants.near_z, CUBE_NEAR);
        assert_eq!(constants.far_z, CUBE_FAR);
        assert_eq!(
            constants.view,
            cube.cameras()[face.index()].view_matrix().transpose()
        );
    }

    let main_rtv = rig.engine.descriptors().swapchain_rtv(0).unwrap();
    let main_address = frame.pass_constants.address_of(MAIN_PASS_INDEX);
    assert!(stream
        .draws()
        .filter(|(_, s)| s.render_target == Some(main_rtv))
        .all(|(_, s)| s.pass_constants == Some(main_address)));

    let main = frame.pass_constants.get(MAIN_PASS_INDEX).unwrap();
    assert_eq!(
        main.render_target_size,
        Vec2::new(WIDTH as f32, HEIGHT as f32)
    );
    let face = frame.pass_constants.get(cube_face_pass_index(0)).unwrap();
    assert_eq!(face.total_time, main.total_time);
    assert_eq!(face.ambient_light, main.ambient_light);
}

#[test]
fn test_face_cameras_look_along_axes() {
    let rig = ticked(0);
    let cameras = rig.engine.cube_target().unwrap().cameras();
    let expected = [
        (Vec3::X, Vec3::Y),
        (Vec3::NEG_X, Vec3::Y),
        (Vec3::Y, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::Z),
        (Vec3::Z, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y),
    ];
    for (camera, (forward, up)) in cameras.iter().zip(expected) {
        assert_eq!(camera.position, CAPTURE_CENTER);
        assert!((camera.forward() - forward).length() < 1e-6);
        assert_eq!(camera.up, up);
        assert_eq!(camera.projection.fov_y, std::f32::consts::FRAC_PI_2);
        assert_eq!(camera.projection.aspect, 1.0);
    }
}

/// A point a little to the right of a face's look direction, in cube map
/// addressing, must land on the right half of that face's image.
#[rstest]
#[case::positive_x(CubeFace::PositiveX, Vec3::new(1.0, 0.0, -0.5))]
#[case::positive_y(CubeFace::PositiveY, Vec3::new(0.5, 1.0, 0.0))]
#[case::positive_z(CubeFace::PositiveZ, Vec3::new(0.5, 0.0, 1.0))]
#[case::negative_x(CubeFace::NegativeX, Vec3::new(-1.0, 0.0, 0.5))]
fn test_face_images_match_cube_addressing(#[case] face: CubeFace, #[case] offset: Vec3) {
    let rig = ticked(1);
    let camera = &rig.engine.cube_target().unwrap().cameras()[face.index()];
    let ndc = camera
        .view_projection_matrix()
        .project_point3(CAPTURE_CENTER + offset);
    assert!(ndc.x > 0.0, "{face:?}: {ndc:?}");

    // The pass constants the face draws with carry the same orientation.
    let frame = rig.engine.frame_ring().unwrap().current();
    let constants = frame
        .pass_constants
        .get(cube_face_pass_index(face.index()))
        .unwrap();
    let clip = constants.view_proj.transpose() * (CAPTURE_CENTER + offset).extend(1.0);
    assert!(clip.x / clip.w > 0.0, "{face:?}: {clip:?}");
}

#[test]
fn test_main_pass_binds_cubes_per_layer() {
    let rig = ticked(1);
    let stream = rig.last_stream();
    let main_rtv = rig.engine.descriptors().swapchain_rtv(0).unwrap();
    let dynamic = rig.engine.cube_target().unwrap().descriptors().srv;
    let sky = rig.engine.descriptors().sky_cube();
    let pipelines = rig.engine.pipelines();

    let draws: Vec<_> = stream
        .draws()
        .filter(|(_, s)| s.render_target == Some(main_rtv))
        .map(|(_, s)| *s)
        .collect();
    assert_eq!(draws.len(), rig.scene.catalog.len());

    let reflectors = rig.scene.catalog.layer(RenderLayer::DynamicReflector).len();
    assert!(draws[..reflectors].iter().all(|d| d.cube_map == Some(dynamic)));
    assert!(draws[reflectors..].iter().all(|d| d.cube_map == Some(sky)));
    let (sky_draw, lit) = draws.split_last().unwrap();
    assert!(lit.iter().all(|d| d.pipeline == Some(pipelines.opaque)));
    assert_eq!(sky_draw.pipeline, Some(pipelines.sky));
}

#[test]
fn test_material_buffer_bound_once_per_frame() {
    let rig = ticked(2);
    for stream in rig.backend().submissions() {
        let binds = stream
            .commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::SetMaterialBuffer(_)))
            .count();
        assert_eq!(binds, 1);
    }
}

#[rstest]
#[case(1)]
#[case(4)]
fn test_queue_order_per_frame(#[case] frames: usize) {
    let rig = ticked(frames);
    let events = rig.backend().queue_events();
    assert_eq!(events.len(), frames * 3);
    for (k, chunk) in events.chunks(3).enumerate() {
        assert!(matches!(chunk[0], QueueEvent::Execute { stream } if stream == k));
        assert!(matches!(chunk[1], QueueEvent::Present { .. }));
        assert_eq!(chunk[2], QueueEvent::Signal(k as u64 + 1));
    }
    assert_eq!(rig.backend().frames_presented(), frames);
}

#[test]
fn test_draw_requires_update() {
    let mut rig = ticked(0);
    assert!(matches!(
        rig.engine.draw(&rig.scene),
        Err(EngineError::SynchronizationViolation(_))
    ));

    rig.tick().unwrap();
    assert!(matches!(
        rig.engine.draw(&rig.scene),
        Err(EngineError::SynchronizationViolation(_))
    ));
    assert_eq!(rig.backend().submissions().len(), 1);
}

#[test]
fn test_resize_keeps_cube_size() {
    let mut rig = ticked(2);
    rig.engine.on_resize(640, 480).unwrap();
    rig.tick().unwrap();

    let cube = rig.engine.cube_target().unwrap();
    assert_eq!(cube.size(), CUBE_SIZE);

    let viewports: Vec<_> = rig
        .last_stream()
        .commands
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::SetViewport(v) => Some(*v),
            _ => None,
        })
        .collect();
    assert_eq!(
        viewports,
        vec![
            Viewport::from_size(CUBE_SIZE, CUBE_SIZE),
            Viewport::from_size(640, 480)
        ]
    );
    assert_eq!(rig.engine.camera().projection.aspect, 640.0 / 480.0);
}

#[test]
fn test_shutdown_releases_frame_resources() {
    let mut rig = ticked(3);
    rig.engine.shutdown().unwrap();

    assert!(rig.engine.frame_ring().is_none());
    assert!(rig.engine.cube_target().is_none());
    assert!(rig.engine.update(&common::frame_time(3), &rig.scene).is_err());
    // Idempotent
    rig.engine.shutdown().unwrap();
}
