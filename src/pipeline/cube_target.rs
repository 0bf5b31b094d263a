//! Off-screen six-face render target sampled as a cube map

use glam::Vec3;

use crate::backend::{
    GraphicsBackend, ResourceState, ScissorRect, TextureDescriptor, TextureDimension,
    TextureFormat, TextureHandle, TextureUsage, ViewDescriptor, Viewport,
};
use crate::descriptors::CubeDescriptors;
use crate::error::EngineResult;
use crate::scene::{cube_face_cameras, Camera, CubeFace};

/// Near plane of the face cameras
pub const CUBE_NEAR: f32 = 0.1;
/// Far plane of the face cameras
pub const CUBE_FAR: f32 = 1000.0;

/// Six color faces plus one shared depth buffer.
///
/// The color texture is either a render target (during capture) or a shader
/// resource (everywhere else); the target tracks which so that every barrier
/// it records names the state the texture is actually in.
#[derive(Debug)]
pub struct CubeRenderTarget {
    size: u32,
    color_format: TextureFormat,
    depth_format: TextureFormat,
    color: TextureHandle,
    depth: TextureHandle,
    descriptors: CubeDescriptors,
    cameras: [Camera; CubeFace::COUNT],
    center: Vec3,
    state: ResourceState,
}

impl CubeRenderTarget {
    /// Create the textures, write their views and build the face cameras.
    ///
    /// The face cameras are fixed at `center` for the target's lifetime.
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        size: u32,
        color_format: TextureFormat,
        depth_format: TextureFormat,
        center: Vec3,
        descriptors: CubeDescriptors,
    ) -> EngineResult<Self> {
        let color = backend.create_texture(&TextureDescriptor {
            label: Some("Dynamic Cube Map".into()),
            width: size,
            height: size,
            array_layers: CubeFace::COUNT as u32,
            mip_levels: 1,
            format: color_format,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::RENDER_ATTACHMENT,
            dimension: TextureDimension::Cube,
            initial_state: ResourceState::PixelShaderResource,
        })?;
        let depth = backend.create_texture(&TextureDescriptor {
            label: Some("Dynamic Cube Depth".into()),
            width: size,
            height: size,
            format: depth_format,
            usage: TextureUsage::DEPTH_STENCIL,
            initial_state: ResourceState::DepthWrite,
            ..Default::default()
        })?;

        let target = Self {
            size,
            color_format,
            depth_format,
            color,
            depth,
            descriptors,
            cameras: cube_face_cameras(center, CUBE_NEAR, CUBE_FAR),
            center,
            state: ResourceState::PixelShaderResource,
        };
        target.build_descriptors(backend)?;

        log::info!("Created {size}x{size} dynamic cube map at {center}");
        Ok(target)
    }

    /// Write the cube SRV, the six face RTVs and the depth view.
    pub fn build_descriptors(&self, backend: &mut dyn GraphicsBackend) -> EngineResult<()> {
        backend.write_descriptor(
            self.descriptors.srv,
            &ViewDescriptor::TextureCube {
                texture: self.color,
                format: self.color_format,
                mip_levels: 1,
            },
        )?;
        for face in CubeFace::ALL {
            backend.write_descriptor(
                self.descriptors.rtvs[face.index()],
                &ViewDescriptor::RenderTarget {
                    texture: self.color,
                    format: self.color_format,
                    array_layer: face.index() as u32,
                },
            )?;
        }
        backend.write_descriptor(
            self.descriptors.dsv,
            &ViewDescriptor::DepthStencil {
                texture: self.depth,
                format: self.depth_format,
            },
        )?;
        Ok(())
    }

    /// Record a barrier to `after` unless the texture is already there.
    pub(crate) fn transition(&mut self, backend: &mut dyn GraphicsBackend, after: ResourceState) {
        if self.state == after {
            return;
        }
        backend.resource_barrier(self.color, self.state, after);
        self.state = after;
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::from_size(self.size, self.size)
    }

    pub fn scissor_rect(&self) -> ScissorRect {
        ScissorRect::from_size(self.size, self.size)
    }

    pub fn color_texture(&self) -> TextureHandle {
        self.color
    }

    pub fn depth_texture(&self) -> TextureHandle {
        self.depth
    }

    pub fn color_format(&self) -> TextureFormat {
        self.color_format
    }

    pub fn descriptors(&self) -> CubeDescriptors {
        self.descriptors
    }

    pub fn rtv(&self, face: CubeFace) -> crate::backend::DescriptorSlot {
        self.descriptors.rtvs[face.index()]
    }

    /// Face cameras in [`CubeFace::ALL`] order
    pub fn cameras(&self) -> &[Camera; CubeFace::COUNT] {
        &self.cameras
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// State the color texture is in at the end of the recorded commands
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Forget transitions recorded into a command stream that was aborted
    pub(crate) fn restore_state(&mut self, state: ResourceState) {
        self.state = state;
    }

    pub fn destroy(self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_texture(self.color);
        backend.destroy_texture(self.depth);
    }
}
