//! Main engine orchestrator
//!
//! Drives the Update/Draw cycle:
//!
//! ```text
//! update: advance ring (fence wait) -> objects -> materials -> main pass -> face passes
//! draw:   reset allocator -> cube capture -> main pass -> close
//!         -> execute -> present -> fence value -> signal
//! ```

use std::time::Duration;

use crate::backend::{
    GraphicsBackend, ResourceState, ScissorRect, TextureDescriptor, TextureHandle, TextureUsage,
    Viewport,
};
use crate::descriptors::{SceneDescriptors, ShaderResourceLayout};
use crate::error::{AssetKind, EngineError, EngineResult};
use crate::frame::update::{
    update_cube_face_passes, update_main_pass, update_material_buffer, update_object_constants,
};
use crate::frame::FrameResourceRing;
use crate::pipeline::{
    bind_frame_resources, CubeCapturePass, CubeRenderTarget, MainPassTarget, MainScenePass,
    PassContext, PipelineHandles,
};
use crate::resources::{CAPTURE_OPAQUE_PIPELINE, OPAQUE_PIPELINE, SKY_PIPELINE};
use crate::scene::{Camera, Scene};
use crate::EngineConfig;

pub use crate::frame::FrameTime;

/// Frame rate statistics, reported once per second of host time
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    frames_since_report: u32,
    time_since_report: f32,
    fps: f32,
    frame_time_ms: f32,
    total_frames: u64,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one frame. Returns true when a new report was produced.
    pub fn tick(&mut self, time: &FrameTime) -> bool {
        self.frames_since_report += 1;
        self.total_frames += 1;
        self.time_since_report += time.delta;

        if self.time_since_report < 1.0 {
            return false;
        }

        self.fps = self.frames_since_report as f32 / self.time_since_report;
        self.frame_time_ms = 1000.0 / self.fps;
        log::info!("fps: {:.1}   mspf: {:.3}", self.fps, self.frame_time_ms);

        self.frames_since_report = 0;
        self.time_since_report = 0.0;
        true
    }

    /// Frames per second over the last report window
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Mean milliseconds per frame over the last report window
    pub fn frame_time_ms(&self) -> f32 {
        self.frame_time_ms
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

/// The dynamic cube map renderer
pub struct Engine<B: GraphicsBackend> {
    backend: B,
    config: EngineConfig,
    ring: Option<FrameResourceRing>,
    descriptors: SceneDescriptors,
    cube_target: Option<CubeRenderTarget>,
    pipelines: PipelineHandles,
    depth_buffer: TextureHandle,
    camera: Camera,
    stats: FrameStats,
    /// Set by `update`, cleared by `draw`
    frame_open: bool,
    object_capacity: usize,
    material_capacity: usize,
}

impl<B: GraphicsBackend> Engine<B> {
    /// Build every GPU-side object the frame loop needs.
    ///
    /// The scene's item and material counts size the per-frame buffers; the
    /// scene's capture center fixes the cube face cameras.
    pub fn new(mut backend: B, config: EngineConfig, scene: &Scene) -> EngineResult<Self> {
        config.validate()?;
        validate_render_items(scene)?;
        log::info!(
            "Initializing '{}' on {} backend ({} frames in flight, {}px cube)",
            config.title,
            backend.name(),
            config.frames_in_flight,
            config.cube_map_size
        );

        let swapchain = backend.swapchain();
        if swapchain.format != config.back_buffer_format {
            return Err(EngineError::InvalidConfig(format!(
                "swap chain format {:?} does not match back_buffer_format {:?}",
                swapchain.format, config.back_buffer_format
            )));
        }
        if swapchain.width != config.width || swapchain.height != config.height {
            backend.resize_swapchain(config.width, config.height)?;
        }

        let pipelines = PipelineHandles {
            opaque: backend.create_pipeline(scene.registry.pipeline(OPAQUE_PIPELINE)?)?,
            capture_opaque: backend
                .create_pipeline(scene.registry.pipeline(CAPTURE_OPAQUE_PIPELINE)?)?,
            sky: backend.create_pipeline(scene.registry.pipeline(SKY_PIPELINE)?)?,
        };

        let layout = ShaderResourceLayout::new(scene.diffuse_textures.len() as u32);
        let buffer_count = backend.swapchain().buffer_count;
        let descriptors = SceneDescriptors::new(&mut backend, layout, buffer_count)?;
        let diffuse = scene
            .diffuse_textures
            .iter()
            .map(|name| scene.registry.texture(name))
            .collect::<EngineResult<Vec<_>>>()?;
        descriptors.write_scene_textures(
            &mut backend,
            &diffuse,
            scene.registry.texture(&scene.sky_cube)?,
        )?;
        descriptors.write_swapchain_views(&mut backend)?;

        let depth_buffer = create_depth_buffer(&mut backend, &config)?;
        descriptors.write_primary_depth(&mut backend, depth_buffer, config.depth_format)?;

        let cube_target = CubeRenderTarget::new(
            &mut backend,
            config.cube_map_size,
            config.cube_color_format,
            config.depth_format,
            scene.capture_center,
            descriptors.cube(),
        )?;

        let object_capacity = scene.catalog.len();
        let material_capacity = scene.registry.materials().len();
        let ring = FrameResourceRing::new(
            &mut backend,
            config.frames_in_flight,
            object_capacity,
            material_capacity,
        )?;

        let mut camera = Camera::default();
        camera.set_lens(
            0.25 * std::f32::consts::PI,
            config.width as f32 / config.height as f32,
            1.0,
            1000.0,
        );

        Ok(Self {
            backend,
            config,
            ring: Some(ring),
            descriptors,
            cube_target: Some(cube_target),
            pipelines,
            depth_buffer,
            camera,
            stats: FrameStats::new(),
            frame_open: false,
            object_capacity,
            material_capacity,
        })
    }

    /// Claim the next frame slot and upload this frame's constants.
    ///
    /// Blocks while the GPU still executes the frame that last used the slot.
    pub fn update(&mut self, time: &FrameTime, scene: &Scene) -> EngineResult<()> {
        self.check_capacity(scene)?;
        let claimed = !self.frame_open;
        if claimed {
            let Some(ring) = self.ring.as_mut() else {
                return Err(shut_down());
            };
            ring.advance(&self.backend)?;
        } else {
            log::warn!("update called twice without draw; rewriting the current slot");
        }
        self.upload_frame(time, scene, claimed)
    }

    /// Like [`update`](Self::update), but gives up when the frame slot is
    /// still busy after `timeout`. Returns `false` if nothing was updated.
    pub fn try_update(
        &mut self,
        time: &FrameTime,
        scene: &Scene,
        timeout: Duration,
    ) -> EngineResult<bool> {
        self.check_capacity(scene)?;
        let claimed = !self.frame_open;
        if claimed {
            let Some(ring) = self.ring.as_mut() else {
                return Err(shut_down());
            };
            if !ring.advance_timeout(&self.backend, timeout)? {
                return Ok(false);
            }
        }
        self.upload_frame(time, scene, claimed)?;
        Ok(true)
    }

    fn check_capacity(&self, scene: &Scene) -> EngineResult<()> {
        if scene.catalog.len() > self.object_capacity
            || scene.registry.materials().len() > self.material_capacity
        {
            return Err(EngineError::InvalidConfig(format!(
                "scene grew past the frame buffers ({} items / {} materials, capacity {} / {})",
                scene.catalog.len(),
                scene.registry.materials().len(),
                self.object_capacity,
                self.material_capacity
            )));
        }
        Ok(())
    }

    /// Write objects, materials, then pass constants into the current slot.
    ///
    /// Frame statistics count a frame only when `claimed_slot` says this
    /// upload opened it.
    fn upload_frame(
        &mut self,
        time: &FrameTime,
        scene: &Scene,
        claimed_slot: bool,
    ) -> EngineResult<()> {
        let (Some(ring), Some(cube_target)) = (self.ring.as_mut(), self.cube_target.as_ref())
        else {
            return Err(shut_down());
        };

        let frame = ring.current_mut();
        update_object_constants(
            &mut self.backend,
            frame,
            &scene.catalog,
            scene.registry.materials(),
        )?;
        update_material_buffer(&mut self.backend, frame, scene.registry.materials())?;

        let swapchain = self.backend.swapchain();
        let main = update_main_pass(
            &mut self.backend,
            frame,
            &self.camera,
            (swapchain.width, swapchain.height),
            time,
            &scene.lighting,
        )?;
        update_cube_face_passes(
            &mut self.backend,
            frame,
            cube_target.cameras(),
            cube_target.size(),
            &main,
        )?;

        self.frame_open = true;
        if claimed_slot {
            self.stats.tick(time);
        }
        Ok(())
    }

    /// Record and submit the frame prepared by [`update`](Self::update).
    pub fn draw(&mut self, scene: &Scene) -> EngineResult<()> {
        if !self.frame_open {
            return Err(EngineError::SynchronizationViolation(
                "draw called without a preceding update".into(),
            ));
        }
        self.frame_open = false;

        let (ring, cube_target) = match (self.ring.as_mut(), self.cube_target.as_mut()) {
            (Some(ring), Some(cube_target)) => (ring, cube_target),
            _ => return Err(shut_down()),
        };
        let frame = ring.current();

        self.backend.reset_command_allocator(frame.allocator)?;

        let ctx = PassContext {
            registry: &scene.registry,
            catalog: &scene.catalog,
            frame,
            descriptors: &self.descriptors,
            pipelines: self.pipelines,
            clear_color: self.config.clear_color,
        };
        let cube_state = cube_target.state();
        if let Err(err) = record_frame(&mut self.backend, &ctx, cube_target) {
            // Nothing reached the queue; the next frame starts from clean state.
            self.backend.abort_commands();
            cube_target.restore_state(cube_state);
            log::error!("Frame {} dropped: {err}", ring.frame_count());
            return Err(err);
        }

        self.backend.present()?;
        ring.mark_submitted(&mut self.backend)?;
        Ok(())
    }

    /// Handle a back buffer resize.
    ///
    /// Waits for the GPU, resizes the swap chain and primary depth buffer and
    /// updates the main camera's aspect ratio. The cube target keeps its size.
    pub fn on_resize(&mut self, width: u32, height: u32) -> EngineResult<()> {
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {width}x{height}");
            return Ok(());
        }
        self.flush()?;

        self.backend.resize_swapchain(width, height)?;
        self.config.width = width;
        self.config.height = height;
        self.descriptors.write_swapchain_views(&mut self.backend)?;

        self.backend.destroy_texture(self.depth_buffer);
        self.depth_buffer = create_depth_buffer(&mut self.backend, &self.config)?;
        self.descriptors.write_primary_depth(
            &mut self.backend,
            self.depth_buffer,
            self.config.depth_format,
        )?;

        self.camera.set_aspect(width as f32, height as f32);
        log::info!("Resized to {width}x{height}");
        Ok(())
    }

    /// Block until every submitted frame has completed
    pub fn flush(&self) -> EngineResult<()> {
        match &self.ring {
            Some(ring) => ring.flush(&self.backend),
            None => Ok(()),
        }
    }

    /// Wait for the GPU, then release every frame and cube resource.
    ///
    /// Later `update`/`draw` calls fail. Called automatically on drop.
    pub fn shutdown(&mut self) -> EngineResult<()> {
        if self.ring.is_none() {
            return Ok(());
        }
        let flushed = self.flush();
        if let Err(err) = &flushed {
            // Nothing can be safely released while the GPU may still read it.
            log::error!("Shutdown flush failed, leaking GPU resources: {err}");
            self.ring = None;
            self.cube_target = None;
            return flushed;
        }

        if let Some(ring) = self.ring.take() {
            ring.destroy(&mut self.backend);
        }
        if let Some(cube_target) = self.cube_target.take() {
            cube_target.destroy(&mut self.backend);
        }
        self.backend.destroy_texture(self.depth_buffer);
        log::info!(
            "Engine shut down after {} frames",
            self.stats.total_frames()
        );
        Ok(())
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn frame_stats(&self) -> &FrameStats {
        &self.stats
    }

    /// The frame ring, until shutdown
    pub fn frame_ring(&self) -> Option<&FrameResourceRing> {
        self.ring.as_ref()
    }

    /// The cube target, until shutdown
    pub fn cube_target(&self) -> Option<&CubeRenderTarget> {
        self.cube_target.as_ref()
    }

    pub fn descriptors(&self) -> &SceneDescriptors {
        &self.descriptors
    }

    pub fn pipelines(&self) -> PipelineHandles {
        self.pipelines
    }
}

impl<B: GraphicsBackend> Drop for Engine<B> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("Engine dropped with GPU work outstanding: {err}");
        }
    }
}

fn shut_down() -> EngineError {
    EngineError::InvalidConfig("engine has been shut down".into())
}

/// Record both passes into one command stream and hand it to the queue
fn record_frame(
    backend: &mut dyn GraphicsBackend,
    ctx: &PassContext<'_>,
    cube_target: &mut CubeRenderTarget,
) -> EngineResult<()> {
    backend.begin_commands(ctx.frame.allocator, ctx.pipelines.opaque)?;
    bind_frame_resources(backend, ctx);

    let cube = CubeCapturePass::record(backend, ctx, cube_target)?;

    let swapchain = backend.swapchain();
    let back_buffer = backend.back_buffer(swapchain.current_index)?;
    let rtv = ctx
        .descriptors
        .swapchain_rtv(swapchain.current_index)
        .ok_or_else(|| {
            EngineError::SynchronizationViolation(format!(
                "no render target view for back buffer {}",
                swapchain.current_index
            ))
        })?;
    let target = MainPassTarget {
        back_buffer,
        rtv,
        dsv: ctx.descriptors.primary_dsv(),
        viewport: Viewport::from_size(swapchain.width, swapchain.height),
        scissor: ScissorRect::from_size(swapchain.width, swapchain.height),
    };
    MainScenePass::record(backend, ctx, &target, cube)?;

    backend.end_commands()?;
    backend.execute_commands()?;
    Ok(())
}

/// Every render item must name a registered geometry and a range inside it.
fn validate_render_items(scene: &Scene) -> EngineResult<()> {
    for (_, item) in scene.catalog.iter() {
        let geometry = scene.registry.mesh(&item.geometry)?;
        if !geometry.contains(&item.submesh) {
            return Err(EngineError::asset(
                AssetKind::Geometry,
                format!("{}/{}", item.geometry, item.name),
                format!(
                    "submesh {:?} is outside the geometry ({} vertices, {} indices)",
                    item.submesh, geometry.vertex_count, geometry.index_count
                ),
            ));
        }
    }
    Ok(())
}

fn create_depth_buffer(
    backend: &mut dyn GraphicsBackend,
    config: &EngineConfig,
) -> EngineResult<TextureHandle> {
    Ok(backend.create_texture(&TextureDescriptor {
        label: Some("Depth Buffer".into()),
        width: config.width,
        height: config.height,
        format: config.depth_format,
        usage: TextureUsage::DEPTH_STENCIL,
        initial_state: ResourceState::DepthWrite,
        ..Default::default()
    })?)
}
