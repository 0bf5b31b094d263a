//! Common types shared between backends

use std::sync::Arc;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use super::traits::{BufferHandle, DescriptorHeapHandle, TextureHandle};

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
    Depth24PlusStencil8,
    R32Float,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float | TextureFormat::Depth24PlusStencil8
        )
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24PlusStencil8
            | TextureFormat::R32Float => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }
}

bitflags! {
    /// Texture usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const TEXTURE_BINDING = 1 << 2;
        const RENDER_ATTACHMENT = 1 << 3;
        const DEPTH_STENCIL = 1 << 4;
    }
}

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const COPY_DST = 1 << 0;
        const INDEX = 1 << 1;
        const VERTEX = 1 << 2;
        const UNIFORM = 1 << 3;
        const STORAGE = 1 << 4;
        /// CPU-writable memory that stays mapped for the buffer's lifetime.
        const UPLOAD = 1 << 5;
    }
}

/// Shape of a texture resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D2,
    /// Six-layer array addressed as a cube by shader views.
    Cube,
}

/// Texture descriptor
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub array_layers: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub dimension: TextureDimension,
    /// State the resource is created in.
    pub initial_state: ResourceState,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            array_layers: 1,
            mip_levels: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            dimension: TextureDimension::D2,
            initial_state: ResourceState::PixelShaderResource,
        }
    }
}

/// Buffer descriptor
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
}

/// Resource state a texture must be in for a given kind of access.
///
/// Transitions between states are explicit barriers recorded into the
/// command stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    #[default]
    Common,
    Present,
    RenderTarget,
    DepthWrite,
    PixelShaderResource,
    CopyDest,
}

/// Viewport rectangle in render target pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Scissor rectangle in render target pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ScissorRect {
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Kind of descriptor heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    /// Shader-visible texture views.
    ShaderResource,
    RenderTarget,
    DepthStencil,
}

/// A slot inside a descriptor heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorSlot {
    pub heap: DescriptorHeapHandle,
    pub index: u32,
}

/// View written into a descriptor slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewDescriptor {
    /// Sampled 2D texture.
    Texture2d {
        texture: TextureHandle,
        format: TextureFormat,
        mip_levels: u32,
    },
    /// All six layers of an array texture sampled as one cube.
    TextureCube {
        texture: TextureHandle,
        format: TextureFormat,
        mip_levels: u32,
    },
    /// One array layer of a texture as a color target.
    RenderTarget {
        texture: TextureHandle,
        format: TextureFormat,
        array_layer: u32,
    },
    DepthStencil {
        texture: TextureHandle,
        format: TextureFormat,
    },
}

impl ViewDescriptor {
    pub fn texture(&self) -> TextureHandle {
        match self {
            ViewDescriptor::Texture2d { texture, .. }
            | ViewDescriptor::TextureCube { texture, .. }
            | ViewDescriptor::RenderTarget { texture, .. }
            | ViewDescriptor::DepthStencil { texture, .. } => *texture,
        }
    }
}

/// Index format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

impl IndexFormat {
    pub fn size(&self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// Vertex buffer binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferView {
    pub buffer: BufferHandle,
    pub size: u64,
    pub stride: u32,
}

/// Index buffer binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBufferView {
    pub buffer: BufferHandle,
    pub size: u64,
    pub format: IndexFormat,
}

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
}

/// Vertex attribute description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttribute {
    pub semantic: &'static str,
    pub format: VertexFormat,
    pub offset: u32,
}

/// Standard vertex with position, normal and texture coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    pub fn layout() -> Vec<VertexAttribute> {
        vec![
            VertexAttribute {
                semantic: "POSITION",
                format: VertexFormat::Float32x3,
                offset: 0,
            },
            VertexAttribute {
                semantic: "NORMAL",
                format: VertexFormat::Float32x3,
                offset: 12,
            },
            VertexAttribute {
                semantic: "TEXCOORD",
                format: VertexFormat::Float32x2,
                offset: 24,
            },
        ]
    }
}

/// Opaque compiled shader blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBytecode {
    pub entry_point: String,
    pub target: String,
    pub bytes: Arc<[u8]>,
}

/// Cull mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Compare function for depth/stencil
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    Always,
}

/// Filter mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
    Anisotropic,
}

/// Address mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
}

/// Sampler baked into a pipeline's binding layout
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor {
    pub label: Option<String>,
    pub register: u32,
    pub filter: FilterMode,
    pub address_mode: AddressMode,
    pub max_anisotropy: u32,
    pub mip_lod_bias: f32,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            register: 0,
            filter: FilterMode::Linear,
            address_mode: AddressMode::ClampToEdge,
            max_anisotropy: 1,
            mip_lod_bias: 0.0,
        }
    }
}

/// Graphics pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineDescriptor {
    pub label: Option<String>,
    pub vertex_shader: ShaderBytecode,
    pub pixel_shader: ShaderBytecode,
    pub vertex_layout: Vec<VertexAttribute>,
    pub cull_mode: CullMode,
    pub depth_compare: CompareFunction,
    pub depth_write_enabled: bool,
    pub color_format: TextureFormat,
    pub depth_format: TextureFormat,
    pub static_samplers: Vec<SamplerDescriptor>,
}
