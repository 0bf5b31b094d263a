//! Per-frame constant uploads into the current frame slot.
//!
//! Order within a frame: objects and materials first, then the main pass,
//! then the six cube face passes. All of it must finish before the slot's
//! command stream is recorded.

use glam::{Mat4, Vec2};

use crate::backend::GraphicsBackend;
use crate::error::EngineResult;
use crate::pipeline::constants::{cube_face_pass_index, PassConstants, MAIN_PASS_INDEX};
use crate::resources::MaterialLibrary;
use crate::scene::{Camera, RenderItemCatalog, SceneLighting};

use super::frame_resource::FrameResource;
use super::FrameTime;

/// Upload every object whose generation differs from the slot's copy.
///
/// Returns the number of objects written.
pub fn update_object_constants(
    backend: &mut dyn GraphicsBackend,
    frame: &mut FrameResource,
    catalog: &RenderItemCatalog,
    materials: &MaterialLibrary,
) -> EngineResult<usize> {
    let mut uploaded = 0;
    for (id, item) in catalog.iter() {
        let generation = item.generation();
        if frame.object_generation(id.0) == generation {
            continue;
        }
        frame
            .object_constants
            .copy_data(backend, id.0, &item.constants(materials))?;
        frame.set_object_generation(id.0, generation);
        uploaded += 1;
    }
    if uploaded > 0 {
        log::debug!("Uploaded {uploaded} object constants");
    }
    Ok(uploaded)
}

/// Upload every material whose generation differs from the slot's copy.
pub fn update_material_buffer(
    backend: &mut dyn GraphicsBackend,
    frame: &mut FrameResource,
    materials: &MaterialLibrary,
) -> EngineResult<usize> {
    let mut uploaded = 0;
    for (id, material, generation) in materials.iter() {
        let index = materials.cb_index(id);
        if frame.material_generation(index) == generation {
            continue;
        }
        frame
            .materials
            .copy_data(backend, index, &material.gpu_data())?;
        frame.set_material_generation(index, generation);
        uploaded += 1;
    }
    if uploaded > 0 {
        log::debug!("Uploaded {uploaded} materials");
    }
    Ok(uploaded)
}

/// Build the constants for one view.
pub fn pass_constants(
    camera: &Camera,
    render_target_size: (u32, u32),
    time: &FrameTime,
    lighting: &SceneLighting,
) -> PassConstants {
    let view = camera.view_matrix();
    let proj = camera.projection_matrix();
    let view_proj = proj * view;
    let size = Vec2::new(render_target_size.0 as f32, render_target_size.1 as f32);

    PassConstants {
        view: view.transpose(),
        inv_view: view.inverse().transpose(),
        proj: proj.transpose(),
        inv_proj: proj.inverse().transpose(),
        view_proj: view_proj.transpose(),
        inv_view_proj: view_proj.inverse().transpose(),
        eye_pos: camera.position,
        _padding0: 0.0,
        render_target_size: size,
        inv_render_target_size: Vec2::ONE / size.max(Vec2::ONE),
        near_z: camera.near(),
        far_z: camera.far(),
        total_time: time.total,
        delta_time: time.delta,
        ambient_light: lighting.ambient,
        lights: lighting.gpu_lights(),
    }
}

/// Write the main camera's constants at pass index 0.
pub fn update_main_pass(
    backend: &mut dyn GraphicsBackend,
    frame: &mut FrameResource,
    camera: &Camera,
    back_buffer_size: (u32, u32),
    time: &FrameTime,
    lighting: &SceneLighting,
) -> EngineResult<PassConstants> {
    let constants = pass_constants(camera, back_buffer_size, time, lighting);
    frame
        .pass_constants
        .copy_data(backend, MAIN_PASS_INDEX, &constants)?;
    Ok(constants)
}

/// Write the six face passes at indices 1..=6.
///
/// Timing and lighting come from `main`; matrices, eye position and target
/// size come from the face cameras.
pub fn update_cube_face_passes(
    backend: &mut dyn GraphicsBackend,
    frame: &mut FrameResource,
    face_cameras: &[Camera; 6],
    cube_size: u32,
    main: &PassConstants,
) -> EngineResult<()> {
    for (face, camera) in face_cameras.iter().enumerate() {
        let view = camera.view_matrix();
        let proj = camera.projection_matrix();
        let view_proj: Mat4 = proj * view;
        let size = Vec2::splat(cube_size as f32);

        let constants = PassConstants {
            view: view.transpose(),
            inv_view: view.inverse().transpose(),
            proj: proj.transpose(),
            inv_proj: proj.inverse().transpose(),
            view_proj: view_proj.transpose(),
            inv_view_proj: view_proj.inverse().transpose(),
            eye_pos: camera.position,
            render_target_size: size,
            inv_render_target_size: Vec2::ONE / size,
            near_z: camera.near(),
            far_z: camera.far(),
            ..*main
        };
        frame
            .pass_constants
            .copy_data(backend, cube_face_pass_index(face), &constants)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::resources::{Material, MaterialId, SubmeshGeometry};
    use crate::scene::{cube_face_cameras, RenderItem, RenderLayer};
    use glam::Vec3;

    fn setup() -> (DummyBackend, FrameResource, RenderItemCatalog, MaterialLibrary) {
        let mut backend = DummyBackend::default();
        let frame = FrameResource::new(&mut backend, 0, 2, 1).unwrap();
        let mut materials = MaterialLibrary::new();
        materials.add(Material::new("m")).unwrap();
        let mut catalog = RenderItemCatalog::new();
        for name in ["a", "b"] {
            catalog.add(RenderItem::new(
                name,
                RenderLayer::Opaque,
                "shapes",
                SubmeshGeometry::default(),
                MaterialId(0),
            ));
        }
        (backend, frame, catalog, materials)
    }

    #[test]
    fn test_only_changed_objects_upload() {
        let (mut backend, mut frame, mut catalog, materials) = setup();
        assert_eq!(
            update_object_constants(&mut backend, &mut frame, &catalog, &materials).unwrap(),
            2
        );
        assert_eq!(
            update_object_constants(&mut backend, &mut frame, &catalog, &materials).unwrap(),
            0
        );

        let b = catalog.find("b").unwrap();
        let world = Mat4::from_translation(Vec3::X);
        catalog.set_world(b, world);
        assert_eq!(
            update_object_constants(&mut backend, &mut frame, &catalog, &materials).unwrap(),
            1
        );
        assert_eq!(frame.object_constants.get(1).unwrap().world, world.transpose());
    }

    #[test]
    fn test_material_upload() {
        let (mut backend, mut frame, _, mut materials) = setup();
        assert_eq!(
            update_material_buffer(&mut backend, &mut frame, &materials).unwrap(),
            1
        );
        materials.modify(MaterialId(0), |m| m.roughness = 0.9);
        update_material_buffer(&mut backend, &mut frame, &materials).unwrap();
        assert_eq!(frame.materials.get(0).unwrap().roughness, 0.9);
    }

    #[test]
    fn test_face_passes_follow_main_pass_timing() {
        let (mut backend, mut frame, _, _) = setup();
        let camera = Camera::default();
        let time = FrameTime {
            delta: 0.016,
            total: 3.5,
        };
        let lighting = SceneLighting::default();
        let main =
            update_main_pass(&mut backend, &mut frame, &camera, (800, 600), &time, &lighting).unwrap();
        assert_eq!(main.render_target_size, Vec2::new(800.0, 600.0));

        let faces = cube_face_cameras(Vec3::new(0.0, 2.0, 0.0), 0.1, 1000.0);
        update_cube_face_passes(&mut backend, &mut frame, &faces, 256, &main).unwrap();

        for face in 0..6 {
            let constants = frame.pass_constants.get(cube_face_pass_index(face)).unwrap();
            assert_eq!(constants.total_time, 3.5);
            assert_eq!(constants.render_target_size, Vec2::splat(256.0));
            assert_eq!(constants.view, faces[face].view_matrix().transpose());
            assert_eq!(constants.eye_pos, Vec3::new(0.0, 2.0, 0.0));
        }
        assert_eq!(frame.pass_constants.get(0).unwrap().eye_pos, camera.position);
    }
}
