//! Main camera pass into the back buffer

use crate::backend::{
    DescriptorSlot, GraphicsBackend, ResourceState, ScissorRect, TextureHandle, Viewport,
};
use crate::error::EngineResult;
use crate::scene::RenderLayer;

use super::constants::MAIN_PASS_INDEX;
use super::cube_capture_pass::CubeCaptureOutput;
use super::{draw_render_items, PassContext};

/// Back buffer the main pass renders into
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MainPassTarget {
    pub back_buffer: TextureHandle,
    pub rtv: DescriptorSlot,
    pub dsv: DescriptorSlot,
    pub viewport: Viewport,
    pub scissor: ScissorRect,
}

/// Reflector, opaque items and sky from the main camera
pub struct MainScenePass;

impl MainScenePass {
    pub const NAME: &'static str = "Main Scene Pass";

    /// Record the main pass. Leaves the back buffer presentable.
    pub fn record(
        backend: &mut dyn GraphicsBackend,
        ctx: &PassContext<'_>,
        target: &MainPassTarget,
        cube: CubeCaptureOutput,
    ) -> EngineResult<()> {
        log::trace!("Recording {}", Self::NAME);

        backend.set_viewport(target.viewport);
        backend.set_scissor_rect(target.scissor);

        backend.resource_barrier(
            target.back_buffer,
            ResourceState::Present,
            ResourceState::RenderTarget,
        );
        backend.clear_render_target(target.rtv, ctx.clear_color);
        backend.clear_depth_stencil(target.dsv, 1.0, 0);
        backend.set_render_targets(target.rtv, target.dsv);

        backend.set_pass_constants(ctx.frame.pass_constants.address_of(MAIN_PASS_INDEX));
        backend.set_pipeline(ctx.pipelines.opaque);

        // The reflector samples this frame's capture.
        backend.set_cube_map_table(cube.srv());
        draw_render_items(backend, ctx, ctx.catalog.layer(RenderLayer::DynamicReflector))?;

        // Everything else reflects the static sky.
        backend.set_cube_map_table(ctx.descriptors.sky_cube());
        draw_render_items(backend, ctx, ctx.catalog.layer(RenderLayer::Opaque))?;

        backend.set_pipeline(ctx.pipelines.sky);
        draw_render_items(backend, ctx, ctx.catalog.layer(RenderLayer::Sky))?;

        backend.resource_barrier(
            target.back_buffer,
            ResourceState::RenderTarget,
            ResourceState::Present,
        );
        Ok(())
    }
}
