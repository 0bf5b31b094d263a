//! Core backend abstraction traits
//!
//! These traits define the interface a GPU backend must implement to drive
//! the frame pipeline. Device and swap chain creation happen on the backend
//! side; the engine only sees handles.

use std::time::Duration;

use thiserror::Error;

use crate::backend::types::*;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("Descriptor heap exhausted: {0}")]
    DescriptorHeapExhausted(String),
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a descriptor heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorHeapHandle(pub(crate) u64);

/// Handle to a graphics pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineHandle(pub(crate) u64);

/// Handle to a command allocator (the memory backing one recorded command stream)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandAllocatorHandle(pub(crate) u64);

/// Swap chain state exposed by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainInfo {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub buffer_count: u32,
    /// Index of the back buffer the next frame renders into.
    pub current_index: u32,
}

/// Main graphics backend trait
///
/// Recording is immediate-mode: between [`begin_commands`](Self::begin_commands)
/// and [`end_commands`](Self::end_commands) every call appends to one command
/// stream, which [`execute_commands`](Self::execute_commands) hands to the GPU
/// queue.
pub trait GraphicsBackend {
    /// Get the backend name
    fn name(&self) -> &'static str;

    // Swap chain

    /// Current swap chain description
    fn swapchain(&self) -> SwapchainInfo;

    /// Back buffer texture for the given swap chain index
    fn back_buffer(&self, index: u32) -> BackendResult<TextureHandle>;

    /// Resize the swap chain buffers. The GPU must be idle.
    fn resize_swapchain(&mut self, width: u32, height: u32) -> BackendResult<()>;

    // Resource creation

    /// Create a buffer
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;

    /// Create a buffer with initial data
    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle>;

    /// Write data into a CPU-visible buffer
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8])
        -> BackendResult<()>;

    /// GPU virtual address of the start of a buffer
    fn buffer_address(&self, buffer: BufferHandle) -> BackendResult<u64>;

    /// Create a texture
    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    /// Upload pixel data into one array layer of a texture
    fn write_texture(&mut self, texture: TextureHandle, layer: u32, data: &[u8])
        -> BackendResult<()>;

    /// Create a descriptor heap with a fixed number of slots
    fn create_descriptor_heap(
        &mut self,
        kind: DescriptorHeapKind,
        capacity: u32,
    ) -> BackendResult<DescriptorHeapHandle>;

    /// Write a view into a descriptor slot
    fn write_descriptor(&mut self, slot: DescriptorSlot, view: &ViewDescriptor)
        -> BackendResult<()>;

    /// Create a graphics pipeline
    fn create_pipeline(&mut self, desc: &PipelineDescriptor) -> BackendResult<PipelineHandle>;

    /// Create a command allocator
    fn create_command_allocator(&mut self) -> BackendResult<CommandAllocatorHandle>;

    // Resource cleanup

    /// Destroy a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Destroy a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    // Command recording

    /// Reclaim an allocator's memory. The GPU must have finished every
    /// command stream recorded with it.
    fn reset_command_allocator(&mut self, allocator: CommandAllocatorHandle)
        -> BackendResult<()>;

    /// Start recording a command stream into `allocator`
    fn begin_commands(
        &mut self,
        allocator: CommandAllocatorHandle,
        pipeline: PipelineHandle,
    ) -> BackendResult<()>;

    /// Transition a texture between resource states
    fn resource_barrier(&mut self, texture: TextureHandle, before: ResourceState, after: ResourceState);

    /// Set viewport
    fn set_viewport(&mut self, viewport: Viewport);

    /// Set scissor rect
    fn set_scissor_rect(&mut self, rect: ScissorRect);

    /// Clear a color target
    fn clear_render_target(&mut self, rtv: DescriptorSlot, color: [f32; 4]);

    /// Clear a depth/stencil target
    fn clear_depth_stencil(&mut self, dsv: DescriptorSlot, depth: f32, stencil: u8);

    /// Bind the output merger targets
    fn set_render_targets(&mut self, rtv: DescriptorSlot, dsv: DescriptorSlot);

    /// Set the graphics pipeline
    fn set_pipeline(&mut self, pipeline: PipelineHandle);

    /// Bind the shader-visible descriptor heap
    fn set_descriptor_heap(&mut self, heap: DescriptorHeapHandle);

    /// Bind per-object constants at a GPU address
    fn set_object_constants(&mut self, address: u64);

    /// Bind per-pass constants at a GPU address
    fn set_pass_constants(&mut self, address: u64);

    /// Bind the structured material buffer at a GPU address
    fn set_material_buffer(&mut self, address: u64);

    /// Bind the cube map descriptor table
    fn set_cube_map_table(&mut self, srv: DescriptorSlot);

    /// Bind the diffuse texture descriptor table
    fn set_texture_table(&mut self, srv: DescriptorSlot);

    /// Set vertex buffer
    fn set_vertex_buffer(&mut self, view: VertexBufferView);

    /// Set index buffer
    fn set_index_buffer(&mut self, view: IndexBufferView);

    /// Draw indexed primitives
    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32);

    /// Close the command stream
    fn end_commands(&mut self) -> BackendResult<()>;

    /// Drop the open or closed command stream without submitting it.
    ///
    /// Resource states return to what they were before the stream's barriers.
    /// Does nothing when no stream is pending.
    fn abort_commands(&mut self);

    // Queue

    /// Submit the closed command stream to the GPU queue
    fn execute_commands(&mut self) -> BackendResult<()>;

    /// Present the current back buffer and advance the swap chain index
    fn present(&mut self) -> BackendResult<()>;

    // GPU timeline

    /// Queue a command that sets the fence to `value` once the GPU reaches it
    fn signal_fence(&mut self, value: u64) -> BackendResult<()>;

    /// Latest fence value the GPU has completed
    fn completed_fence_value(&self) -> BackendResult<u64>;

    /// Block until the GPU has completed `value`
    fn wait_for_fence_value(&self, value: u64) -> BackendResult<()>;

    /// Block until the GPU has completed `value` or `timeout` elapses.
    ///
    /// Returns `Ok(false)` on timeout.
    fn wait_for_fence_value_timeout(&self, value: u64, timeout: Duration) -> BackendResult<bool>;
}
