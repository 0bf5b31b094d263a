//! Dynamic cube map pipeline
//!
//! Each frame records one command stream with two passes:
//! 1. Cube capture pass - renders opaque items and the sky into the six
//!    faces of the cube target, then returns the target to shader-readable
//! 2. Main scene pass - renders the reflector sampling the fresh cube, then
//!    the opaque items and the sky into the back buffer
//!
//! The capture pass hands back a [`CubeCaptureOutput`] that the main pass
//! takes by value, so the main pass cannot be recorded without a capture
//! earlier in the same frame.

pub mod constants;
mod cube_capture_pass;
mod cube_target;
mod main_pass;

pub use cube_capture_pass::{CubeCaptureOutput, CubeCapturePass};
pub use cube_target::{CubeRenderTarget, CUBE_FAR, CUBE_NEAR};
pub use main_pass::{MainPassTarget, MainScenePass};

use crate::backend::{GraphicsBackend, PipelineHandle};
use crate::descriptors::SceneDescriptors;
use crate::error::EngineResult;
use crate::frame::FrameResource;
use crate::resources::ResourceRegistry;
use crate::scene::{ItemId, RenderItemCatalog};

/// Backend pipelines built from the registry's descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineHandles {
    /// Main pass opaque items and reflector
    pub opaque: PipelineHandle,
    /// Opaque items seen by the cube face cameras
    pub capture_opaque: PipelineHandle,
    pub sky: PipelineHandle,
}

/// Read-only inputs shared by both passes for one frame
#[derive(Clone, Copy)]
pub struct PassContext<'a> {
    pub registry: &'a ResourceRegistry,
    pub catalog: &'a RenderItemCatalog,
    pub frame: &'a FrameResource,
    pub descriptors: &'a SceneDescriptors,
    pub pipelines: PipelineHandles,
    pub clear_color: [f32; 4],
}

/// Bindings that stay the same for the whole command stream
pub fn bind_frame_resources(backend: &mut dyn GraphicsBackend, ctx: &PassContext<'_>) {
    backend.set_descriptor_heap(ctx.descriptors.shader_heap());
    // Bound once; shaders index it with the material index in the object constants.
    backend.set_material_buffer(ctx.frame.materials.base_address());
    backend.set_texture_table(ctx.descriptors.diffuse_table());
    backend.set_cube_map_table(ctx.descriptors.sky_cube());
}

/// Draw a list of render items with the currently bound pipeline and pass.
///
/// Vertex and index buffers are rebound only when the geometry changes.
pub fn draw_render_items(
    backend: &mut dyn GraphicsBackend,
    ctx: &PassContext<'_>,
    items: &[ItemId],
) -> EngineResult<()> {
    let mut bound_geometry: Option<&str> = None;

    for &id in items {
        let Some(item) = ctx.catalog.get(id) else {
            log::warn!("Skipping unknown render item {id:?}");
            continue;
        };

        if bound_geometry != Some(item.geometry.as_str()) {
            let geometry = ctx.registry.mesh(&item.geometry)?;
            backend.set_vertex_buffer(geometry.vertex_view());
            backend.set_index_buffer(geometry.index_view());
            bound_geometry = Some(item.geometry.as_str());
        }

        backend.set_object_constants(ctx.frame.object_constants.address_of(id.0));
        backend.draw_indexed(
            item.submesh.index_count,
            item.submesh.start_index,
            item.submesh.base_vertex,
        );
    }
    Ok(())
}
