//! Renders the scene into the six faces of the cube target

use crate::backend::{DescriptorSlot, GraphicsBackend, ResourceState};
use crate::error::EngineResult;
use crate::scene::{CubeFace, RenderLayer};

use super::constants::cube_face_pass_index;
use super::cube_target::CubeRenderTarget;
use super::{draw_render_items, PassContext};

/// Proof that the cube target was captured and is shader-readable again.
///
/// Only [`CubeCapturePass::record`] creates one; [`MainScenePass`](super::MainScenePass)
/// consumes it.
#[derive(Debug)]
#[must_use = "the capture output must be handed to the main pass"]
pub struct CubeCaptureOutput {
    srv: DescriptorSlot,
}

impl CubeCaptureOutput {
    /// Shader resource view of the captured cube
    pub fn srv(&self) -> DescriptorSlot {
        self.srv
    }
}

/// Six-face capture of opaque items and sky
pub struct CubeCapturePass;

impl CubeCapturePass {
    pub const NAME: &'static str = "Cube Capture Pass";

    /// Record the capture into the open command stream.
    ///
    /// Per face: clear, bind the face target, bind the face's pass constants,
    /// draw opaque items with the front-culling capture pipeline, then draw
    /// the sky with the sky pipeline.
    pub fn record(
        backend: &mut dyn GraphicsBackend,
        ctx: &PassContext<'_>,
        target: &mut CubeRenderTarget,
    ) -> EngineResult<CubeCaptureOutput> {
        log::trace!("Recording {}", Self::NAME);

        backend.set_viewport(target.viewport());
        backend.set_scissor_rect(target.scissor_rect());

        target.transition(backend, ResourceState::RenderTarget);

        let dsv = target.descriptors().dsv;
        let opaque = ctx.catalog.layer(RenderLayer::Opaque);
        let sky = ctx.catalog.layer(RenderLayer::Sky);

        for face in CubeFace::ALL {
            let rtv = target.rtv(face);
            backend.clear_render_target(rtv, ctx.clear_color);
            backend.clear_depth_stencil(dsv, 1.0, 0);
            backend.set_render_targets(rtv, dsv);

            let pass = ctx
                .frame
                .pass_constants
                .address_of(cube_face_pass_index(face.index()));
            backend.set_pass_constants(pass);

            backend.set_pipeline(ctx.pipelines.capture_opaque);
            draw_render_items(backend, ctx, opaque)?;

            backend.set_pipeline(ctx.pipelines.sky);
            draw_render_items(backend, ctx, sky)?;
        }

        target.transition(backend, ResourceState::PixelShaderResource);

        Ok(CubeCaptureOutput {
            srv: target.descriptors().srv,
        })
    }
}
