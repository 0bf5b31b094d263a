//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't rasterize anything but provides a complete
//! implementation of [`GraphicsBackend`] for exercising the frame pipeline
//! without GPU hardware:
//!
//! - every command of every submitted stream is recorded for inspection
//! - buffer contents are kept in memory so uploads can be read back
//! - texture resource states are tracked and barriers are validated
//! - the GPU timeline is a [`DummyTimeline`] that completes fence values
//!   either immediately or under test control
//!
//! Validation failures found while recording are reported as
//! [`BackendError::Validation`] from [`end_commands`](GraphicsBackend::end_commands).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::traits::*;
use super::types::*;

/// How the simulated GPU completes signaled fence values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimelineMode {
    /// Every signal completes as soon as it is queued.
    #[default]
    Immediate,
    /// Signals stay pending until [`DummyTimeline::complete_next`] or
    /// [`DummyTimeline::complete_through`] is called.
    Manual,
}

#[derive(Debug)]
struct TimelineState {
    mode: TimelineMode,
    completed: u64,
    last_signaled: u64,
    pending: VecDeque<u64>,
    device_lost: bool,
}

/// Simulated GPU timeline shared between the backend and test code.
///
/// Cloning yields another handle to the same timeline, so a test thread can
/// play the role of the GPU while the render thread blocks on a fence.
#[derive(Debug, Clone)]
pub struct DummyTimeline {
    shared: Arc<(Mutex<TimelineState>, Condvar)>,
}

impl DummyTimeline {
    fn new(mode: TimelineMode) -> Self {
        Self {
            shared: Arc::new((
                Mutex::new(TimelineState {
                    mode,
                    completed: 0,
                    last_signaled: 0,
                    pending: VecDeque::new(),
                    device_lost: false,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Latest completed fence value
    pub fn completed_value(&self) -> u64 {
        self.shared.0.lock().completed
    }

    /// Latest fence value queued for signaling
    pub fn last_signaled(&self) -> u64 {
        self.shared.0.lock().last_signaled
    }

    /// Fence values queued but not yet completed, oldest first
    pub fn pending(&self) -> Vec<u64> {
        self.shared.0.lock().pending.iter().copied().collect()
    }

    /// Complete the oldest pending signal
    pub fn complete_next(&self) -> Option<u64> {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock();
        let value = state.pending.pop_front()?;
        state.completed = value;
        cvar.notify_all();
        Some(value)
    }

    /// Complete every pending signal up to and including `value`
    pub fn complete_through(&self, value: u64) {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock();
        while let Some(&next) = state.pending.front() {
            if next > value {
                break;
            }
            state.pending.pop_front();
            state.completed = next;
        }
        cvar.notify_all();
    }

    /// Complete everything queued so far
    pub fn complete_all(&self) {
        let last = self.last_signaled();
        self.complete_through(last);
    }

    /// Simulate a driver reset; every pending and future wait fails.
    pub fn lose_device(&self) {
        let (lock, cvar) = &*self.shared;
        lock.lock().device_lost = true;
        cvar.notify_all();
    }

    pub fn is_device_lost(&self) -> bool {
        self.shared.0.lock().device_lost
    }

    fn signal(&self, value: u64) -> BackendResult<()> {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock();
        if state.device_lost {
            return Err(BackendError::DeviceLost);
        }
        if value <= state.last_signaled {
            return Err(BackendError::Validation(format!(
                "fence value {value} is not greater than last signaled value {}",
                state.last_signaled
            )));
        }
        state.last_signaled = value;
        match state.mode {
            TimelineMode::Immediate => state.completed = value,
            TimelineMode::Manual => state.pending.push_back(value),
        }
        cvar.notify_all();
        Ok(())
    }

    fn completed(&self) -> BackendResult<u64> {
        let state = self.shared.0.lock();
        if state.device_lost {
            return Err(BackendError::DeviceLost);
        }
        Ok(state.completed)
    }

    fn wait(&self, value: u64, timeout: Option<Duration>) -> BackendResult<bool> {
        let (lock, cvar) = &*self.shared;
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = lock.lock();

        if value > state.last_signaled && !state.device_lost {
            return Err(BackendError::Validation(format!(
                "waiting on fence value {value} that was never signaled (last {})",
                state.last_signaled
            )));
        }

        loop {
            if state.device_lost {
                return Err(BackendError::DeviceLost);
            }
            if state.completed >= value {
                return Ok(true);
            }
            match deadline {
                None => cvar.wait(&mut state),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    cvar.wait_for(&mut state, deadline - now);
                }
            }
        }
    }
}

/// Bound state captured with every draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawState {
    pub pipeline: Option<PipelineHandle>,
    pub render_target: Option<DescriptorSlot>,
    pub pass_constants: Option<u64>,
    pub object_constants: Option<u64>,
    pub cube_map: Option<DescriptorSlot>,
}

/// One recorded command
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    Barrier {
        texture: TextureHandle,
        before: ResourceState,
        after: ResourceState,
    },
    SetViewport(Viewport),
    SetScissorRect(ScissorRect),
    ClearRenderTarget {
        rtv: DescriptorSlot,
        color: [f32; 4],
    },
    ClearDepthStencil {
        dsv: DescriptorSlot,
        depth: f32,
        stencil: u8,
    },
    SetRenderTargets {
        rtv: DescriptorSlot,
        dsv: DescriptorSlot,
    },
    SetPipeline(PipelineHandle),
    SetDescriptorHeap(DescriptorHeapHandle),
    SetObjectConstants(u64),
    SetPassConstants(u64),
    SetMaterialBuffer(u64),
    SetCubeMapTable(DescriptorSlot),
    SetTextureTable(DescriptorSlot),
    SetVertexBuffer(VertexBufferView),
    SetIndexBuffer(IndexBufferView),
    DrawIndexed {
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
        state: DrawState,
    },
}

/// A closed command stream handed to the queue
#[derive(Debug, Clone)]
pub struct CommandStream {
    pub allocator: CommandAllocatorHandle,
    pub commands: Vec<RecordedCommand>,
}

impl CommandStream {
    /// All draws in recording order
    pub fn draws(&self) -> impl Iterator<Item = (&u32, &DrawState)> {
        self.commands.iter().filter_map(|c| match c {
            RecordedCommand::DrawIndexed {
                index_count, state, ..
            } => Some((index_count, state)),
            _ => None,
        })
    }

    /// Barriers recorded for one texture, in order
    pub fn barriers_for(&self, texture: TextureHandle) -> Vec<(usize, ResourceState, ResourceState)> {
        self.commands
            .iter()
            .enumerate()
            .filter_map(|(i, c)| match c {
                RecordedCommand::Barrier {
                    texture: t,
                    before,
                    after,
                } if *t == texture => Some((i, *before, *after)),
                _ => None,
            })
            .collect()
    }
}

/// Queue-level event, in submission order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEvent {
    Execute { stream: usize },
    Present { back_buffer: u32 },
    Signal(u64),
}

#[derive(Debug)]
struct DummyBuffer {
    desc: BufferDescriptor,
    data: Vec<u8>,
    address: u64,
}

#[derive(Debug)]
struct DummyTexture {
    desc: TextureDescriptor,
    state: ResourceState,
    uploaded_layers: HashSet<u32>,
}

#[derive(Debug)]
struct DummyHeap {
    kind: DescriptorHeapKind,
    slots: Vec<Option<ViewDescriptor>>,
}

#[derive(Debug)]
struct Recording {
    allocator: CommandAllocatorHandle,
    commands: Vec<RecordedCommand>,
    state: DrawState,
    violations: Vec<String>,
    /// State each barrier found its texture in, in recording order
    undo: Vec<(TextureHandle, ResourceState)>,
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    timeline: DummyTimeline,
    next_id: u64,
    next_address: u64,
    buffers: HashMap<BufferHandle, DummyBuffer>,
    textures: HashMap<TextureHandle, DummyTexture>,
    heaps: HashMap<DescriptorHeapHandle, DummyHeap>,
    pipelines: HashMap<PipelineHandle, PipelineDescriptor>,
    allocators: HashSet<CommandAllocatorHandle>,
    allocator_fences: HashMap<CommandAllocatorHandle, u64>,
    unsignaled_allocators: Vec<CommandAllocatorHandle>,
    recording: Option<Recording>,
    closed: Option<CommandStream>,
    submissions: Vec<CommandStream>,
    queue_events: Vec<QueueEvent>,
    back_buffers: Vec<TextureHandle>,
    swapchain: SwapchainInfo,
}

impl DummyBackend {
    /// Number of swap chain buffers the dummy backend creates.
    pub const SWAPCHAIN_BUFFER_COUNT: u32 = 2;

    /// Create a new dummy backend whose fences complete immediately.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_timeline(width, height, TimelineMode::Immediate)
    }

    /// Create a new dummy backend with the given timeline behavior.
    pub fn with_timeline(width: u32, height: u32, mode: TimelineMode) -> Self {
        let mut backend = Self {
            timeline: DummyTimeline::new(mode),
            next_id: 1,
            next_address: 0x1_0000,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            heaps: HashMap::new(),
            pipelines: HashMap::new(),
            allocators: HashSet::new(),
            allocator_fences: HashMap::new(),
            unsignaled_allocators: Vec::new(),
            recording: None,
            closed: None,
            submissions: Vec::new(),
            queue_events: Vec::new(),
            back_buffers: Vec::new(),
            swapchain: SwapchainInfo {
                width: width.max(1),
                height: height.max(1),
                format: TextureFormat::Rgba8Unorm,
                buffer_count: Self::SWAPCHAIN_BUFFER_COUNT,
                current_index: 0,
            },
        };
        backend.create_back_buffers();
        log::trace!(
            "DummyBackend: created {}x{} swap chain ({:?} timeline)",
            backend.swapchain.width,
            backend.swapchain.height,
            mode
        );
        backend
    }

    /// Handle to the simulated GPU timeline
    pub fn timeline(&self) -> DummyTimeline {
        self.timeline.clone()
    }

    /// Every command stream submitted so far
    pub fn submissions(&self) -> &[CommandStream] {
        &self.submissions
    }

    /// The most recently submitted command stream
    pub fn last_submission(&self) -> Option<&CommandStream> {
        self.submissions.last()
    }

    /// Queue events in the order they happened
    pub fn queue_events(&self) -> &[QueueEvent] {
        &self.queue_events
    }

    /// Read back bytes previously written to a buffer
    pub fn read_buffer(&self, buffer: BufferHandle, offset: u64, len: usize) -> Option<&[u8]> {
        let buffer = self.buffers.get(&buffer)?;
        let start = offset as usize;
        buffer.data.get(start..start + len)
    }

    /// Currently tracked state of a texture
    pub fn texture_state(&self, texture: TextureHandle) -> Option<ResourceState> {
        self.textures.get(&texture).map(|t| t.state)
    }

    /// Whether a layer of a texture has received pixel data
    pub fn texture_layer_uploaded(&self, texture: TextureHandle, layer: u32) -> bool {
        self.textures
            .get(&texture)
            .is_some_and(|t| t.uploaded_layers.contains(&layer))
    }

    /// Descriptor of a texture
    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture).map(|t| &t.desc)
    }

    /// View stored in a descriptor slot
    pub fn descriptor(&self, slot: DescriptorSlot) -> Option<ViewDescriptor> {
        self.heaps
            .get(&slot.heap)
            .and_then(|h| h.slots.get(slot.index as usize).copied().flatten())
    }

    /// Debug label of a pipeline
    pub fn pipeline_label(&self, pipeline: PipelineHandle) -> Option<&str> {
        self.pipelines
            .get(&pipeline)
            .and_then(|p| p.label.as_deref())
    }

    /// Number of live buffers
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of live textures, back buffers included
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Number of presents issued
    pub fn frames_presented(&self) -> usize {
        self.queue_events
            .iter()
            .filter(|e| matches!(e, QueueEvent::Present { .. }))
            .count()
    }

    fn next_handle(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn create_back_buffers(&mut self) {
        for i in 0..self.swapchain.buffer_count {
            let id = self.next_handle();
            let handle = TextureHandle(id);
            self.textures.insert(
                handle,
                DummyTexture {
                    desc: TextureDescriptor {
                        label: Some(format!("Back Buffer {i}")),
                        width: self.swapchain.width,
                        height: self.swapchain.height,
                        format: self.swapchain.format,
                        usage: TextureUsage::RENDER_ATTACHMENT,
                        initial_state: ResourceState::Present,
                        ..Default::default()
                    },
                    state: ResourceState::Present,
                    uploaded_layers: HashSet::new(),
                },
            );
            self.back_buffers.push(handle);
        }
        self.swapchain.current_index = 0;
    }

    fn view_texture(&self, slot: DescriptorSlot) -> Option<TextureHandle> {
        self.descriptor(slot).map(|v| v.texture())
    }

    fn expect_state(&mut self, slot: DescriptorSlot, expected: ResourceState, what: &str) {
        let Some(texture) = self.view_texture(slot) else {
            self.violation(format!("{what}: descriptor slot {slot:?} is empty"));
            return;
        };
        let actual = self.texture_state(texture);
        if actual != Some(expected) {
            self.violation(format!(
                "{what}: texture {texture:?} is in state {actual:?}, expected {expected:?}"
            ));
        }
    }

    fn violation(&mut self, message: String) {
        log::trace!("DummyBackend: validation failure: {message}");
        match self.recording.as_mut() {
            Some(recording) => recording.violations.push(message),
            None => {
                log::error!("DummyBackend: command recorded outside a command stream: {message}");
            }
        }
    }

    fn record(&mut self, command: RecordedCommand) {
        match self.recording.as_mut() {
            Some(recording) => recording.commands.push(command),
            None => log::error!("DummyBackend: dropped {command:?}, no command stream is open"),
        }
    }

    fn restore_states(&mut self, undo: &[(TextureHandle, ResourceState)]) {
        for (texture, state) in undo.iter().rev() {
            if let Some(entry) = self.textures.get_mut(texture) {
                entry.state = *state;
            }
        }
    }

    fn draw_state_mut(&mut self) -> Option<&mut DrawState> {
        self.recording.as_mut().map(|r| &mut r.state)
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl GraphicsBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn swapchain(&self) -> SwapchainInfo {
        self.swapchain
    }

    fn back_buffer(&self, index: u32) -> BackendResult<TextureHandle> {
        self.back_buffers
            .get(index as usize)
            .copied()
            .ok_or_else(|| BackendError::InvalidHandle(format!("back buffer {index}")))
    }

    fn resize_swapchain(&mut self, width: u32, height: u32) -> BackendResult<()> {
        if !self.timeline.pending().is_empty() {
            return Err(BackendError::Validation(
                "swap chain resized while GPU work is in flight".into(),
            ));
        }
        for handle in std::mem::take(&mut self.back_buffers) {
            self.textures.remove(&handle);
        }
        self.swapchain.width = width.max(1);
        self.swapchain.height = height.max(1);
        self.create_back_buffers();
        log::trace!("DummyBackend: swap chain resized to {width}x{height}");
        Ok(())
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        self.create_buffer_init(desc, &[])
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        if desc.size == 0 {
            return Err(BackendError::BufferCreationFailed(format!(
                "{:?}: zero-sized buffer",
                desc.label
            )));
        }
        if data.len() as u64 > desc.size {
            return Err(BackendError::BufferCreationFailed(format!(
                "{:?}: {} bytes of initial data exceed size {}",
                desc.label,
                data.len(),
                desc.size
            )));
        }
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );
        let handle = BufferHandle(self.next_handle());
        let mut contents = vec![0u8; desc.size as usize];
        contents[..data.len()].copy_from_slice(data);
        let address = self.next_address;
        // 64 KiB placement alignment, like a real heap.
        self.next_address += desc.size.div_ceil(0x1_0000) * 0x1_0000;
        self.buffers.insert(
            handle,
            DummyBuffer {
                desc: desc.clone(),
                data: contents,
                address,
            },
        );
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> BackendResult<()> {
        let entry = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| BackendError::InvalidHandle(format!("{buffer:?}")))?;
        if !entry.desc.usage.contains(BufferUsage::UPLOAD) {
            return Err(BackendError::Validation(format!(
                "{:?} is not CPU-writable",
                entry.desc.label
            )));
        }
        let start = offset as usize;
        let end = start + data.len();
        if end > entry.data.len() {
            return Err(BackendError::Validation(format!(
                "write of {} bytes at {offset} overflows {:?} ({} bytes)",
                data.len(),
                entry.desc.label,
                entry.data.len()
            )));
        }
        entry.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn buffer_address(&self, buffer: BufferHandle) -> BackendResult<u64> {
        self.buffers
            .get(&buffer)
            .map(|b| b.address)
            .ok_or_else(|| BackendError::InvalidHandle(format!("{buffer:?}")))
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 || desc.array_layers == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?}: empty extent {}x{}x{}",
                desc.label, desc.width, desc.height, desc.array_layers
            )));
        }
        if desc.dimension == TextureDimension::Cube && desc.array_layers != 6 {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?}: cube textures need 6 layers, got {}",
                desc.label, desc.array_layers
            )));
        }
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{})",
            desc.label,
            desc.width,
            desc.height,
            desc.array_layers
        );
        let handle = TextureHandle(self.next_handle());
        self.textures.insert(
            handle,
            DummyTexture {
                desc: desc.clone(),
                state: desc.initial_state,
                uploaded_layers: HashSet::new(),
            },
        );
        Ok(handle)
    }

    fn write_texture(&mut self, texture: TextureHandle, layer: u32, data: &[u8]) -> BackendResult<()> {
        let entry = self
            .textures
            .get_mut(&texture)
            .ok_or_else(|| BackendError::InvalidHandle(format!("{texture:?}")))?;
        let desc = &entry.desc;
        if layer >= desc.array_layers {
            return Err(BackendError::Validation(format!(
                "{:?}: layer {layer} out of range ({} layers)",
                desc.label, desc.array_layers
            )));
        }
        let expected = desc.width as usize * desc.height as usize * desc.format.bytes_per_pixel() as usize;
        if data.len() != expected {
            return Err(BackendError::Validation(format!(
                "{:?}: expected {expected} bytes for layer {layer}, got {}",
                desc.label,
                data.len()
            )));
        }
        entry.uploaded_layers.insert(layer);
        Ok(())
    }

    fn create_descriptor_heap(
        &mut self,
        kind: DescriptorHeapKind,
        capacity: u32,
    ) -> BackendResult<DescriptorHeapHandle> {
        let handle = DescriptorHeapHandle(self.next_handle());
        self.heaps.insert(
            handle,
            DummyHeap {
                kind,
                slots: vec![None; capacity as usize],
            },
        );
        log::trace!("DummyBackend: creating {kind:?} heap with {capacity} slots");
        Ok(handle)
    }

    fn write_descriptor(&mut self, slot: DescriptorSlot, view: &ViewDescriptor) -> BackendResult<()> {
        if !self.textures.contains_key(&view.texture()) {
            return Err(BackendError::InvalidHandle(format!("{:?}", view.texture())));
        }
        let heap = self
            .heaps
            .get_mut(&slot.heap)
            .ok_or_else(|| BackendError::InvalidHandle(format!("{:?}", slot.heap)))?;
        let compatible = matches!(
            (heap.kind, view),
            (DescriptorHeapKind::ShaderResource, ViewDescriptor::Texture2d { .. })
                | (DescriptorHeapKind::ShaderResource, ViewDescriptor::TextureCube { .. })
                | (DescriptorHeapKind::RenderTarget, ViewDescriptor::RenderTarget { .. })
                | (DescriptorHeapKind::DepthStencil, ViewDescriptor::DepthStencil { .. })
        );
        if !compatible {
            return Err(BackendError::Validation(format!(
                "{view:?} cannot live in a {:?} heap",
                heap.kind
            )));
        }
        let entry = heap.slots.get_mut(slot.index as usize).ok_or_else(|| {
            BackendError::DescriptorHeapExhausted(format!("slot {} of {:?}", slot.index, slot.heap))
        })?;
        *entry = Some(*view);
        Ok(())
    }

    fn create_pipeline(&mut self, desc: &PipelineDescriptor) -> BackendResult<PipelineHandle> {
        if desc.vertex_shader.bytes.is_empty() || desc.pixel_shader.bytes.is_empty() {
            return Err(BackendError::PipelineCreationFailed(format!(
                "{:?}: empty shader bytecode",
                desc.label
            )));
        }
        let handle = PipelineHandle(self.next_handle());
        log::trace!("DummyBackend: creating pipeline {:?}", desc.label);
        self.pipelines.insert(handle, desc.clone());
        Ok(handle)
    }

    fn create_command_allocator(&mut self) -> BackendResult<CommandAllocatorHandle> {
        let handle = CommandAllocatorHandle(self.next_handle());
        self.allocators.insert(handle);
        Ok(handle)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }

    fn reset_command_allocator(&mut self, allocator: CommandAllocatorHandle) -> BackendResult<()> {
        if !self.allocators.contains(&allocator) {
            return Err(BackendError::InvalidHandle(format!("{allocator:?}")));
        }
        if self.unsignaled_allocators.contains(&allocator) {
            return Err(BackendError::Validation(format!(
                "{allocator:?} reset after submission without a fence signal"
            )));
        }
        if let Some(&fence) = self.allocator_fences.get(&allocator) {
            let completed = self.timeline.completed()?;
            if completed < fence {
                return Err(BackendError::Validation(format!(
                    "{allocator:?} reset while the GPU is still executing fence {fence} \
                     (completed {completed})"
                )));
            }
        }
        Ok(())
    }

    fn begin_commands(
        &mut self,
        allocator: CommandAllocatorHandle,
        pipeline: PipelineHandle,
    ) -> BackendResult<()> {
        if self.recording.is_some() {
            return Err(BackendError::Validation(
                "begin_commands while a command stream is already open".into(),
            ));
        }
        if !self.allocators.contains(&allocator) {
            return Err(BackendError::InvalidHandle(format!("{allocator:?}")));
        }
        self.recording = Some(Recording {
            allocator,
            commands: Vec::new(),
            state: DrawState {
                pipeline: Some(pipeline),
                ..Default::default()
            },
            violations: Vec::new(),
            undo: Vec::new(),
        });
        Ok(())
    }

    fn resource_barrier(&mut self, texture: TextureHandle, before: ResourceState, after: ResourceState) {
        match self.texture_state(texture) {
            Some(actual) => {
                if actual != before {
                    self.violation(format!(
                        "barrier on {texture:?} expects {before:?} but resource is in {actual:?}"
                    ));
                }
                if let Some(entry) = self.textures.get_mut(&texture) {
                    entry.state = after;
                }
                if let Some(recording) = self.recording.as_mut() {
                    recording.undo.push((texture, actual));
                }
            }
            None => self.violation(format!("barrier on unknown texture {texture:?}")),
        }
        self.record(RecordedCommand::Barrier {
            texture,
            before,
            after,
        });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(RecordedCommand::SetViewport(viewport));
    }

    fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.record(RecordedCommand::SetScissorRect(rect));
    }

    fn clear_render_target(&mut self, rtv: DescriptorSlot, color: [f32; 4]) {
        self.expect_state(rtv, ResourceState::RenderTarget, "clear_render_target");
        self.record(RecordedCommand::ClearRenderTarget { rtv, color });
    }

    fn clear_depth_stencil(&mut self, dsv: DescriptorSlot, depth: f32, stencil: u8) {
        self.expect_state(dsv, ResourceState::DepthWrite, "clear_depth_stencil");
        self.record(RecordedCommand::ClearDepthStencil {
            dsv,
            depth,
            stencil,
        });
    }

    fn set_render_targets(&mut self, rtv: DescriptorSlot, dsv: DescriptorSlot) {
        self.expect_state(rtv, ResourceState::RenderTarget, "set_render_targets");
        self.expect_state(dsv, ResourceState::DepthWrite, "set_render_targets");
        if let Some(state) = self.draw_state_mut() {
            state.render_target = Some(rtv);
        }
        self.record(RecordedCommand::SetRenderTargets { rtv, dsv });
    }

    fn set_pipeline(&mut self, pipeline: PipelineHandle) {
        if !self.pipelines.contains_key(&pipeline) {
            self.violation(format!("unknown pipeline {pipeline:?}"));
        }
        if let Some(state) = self.draw_state_mut() {
            state.pipeline = Some(pipeline);
        }
        self.record(RecordedCommand::SetPipeline(pipeline));
    }

    fn set_descriptor_heap(&mut self, heap: DescriptorHeapHandle) {
        self.record(RecordedCommand::SetDescriptorHeap(heap));
    }

    fn set_object_constants(&mut self, address: u64) {
        if let Some(state) = self.draw_state_mut() {
            state.object_constants = Some(address);
        }
        self.record(RecordedCommand::SetObjectConstants(address));
    }

    fn set_pass_constants(&mut self, address: u64) {
        if let Some(state) = self.draw_state_mut() {
            state.pass_constants = Some(address);
        }
        self.record(RecordedCommand::SetPassConstants(address));
    }

    fn set_material_buffer(&mut self, address: u64) {
        self.record(RecordedCommand::SetMaterialBuffer(address));
    }

    fn set_cube_map_table(&mut self, srv: DescriptorSlot) {
        if let Some(state) = self.draw_state_mut() {
            state.cube_map = Some(srv);
        }
        self.record(RecordedCommand::SetCubeMapTable(srv));
    }

    fn set_texture_table(&mut self, srv: DescriptorSlot) {
        self.record(RecordedCommand::SetTextureTable(srv));
    }

    fn set_vertex_buffer(&mut self, view: VertexBufferView) {
        self.record(RecordedCommand::SetVertexBuffer(view));
    }

    fn set_index_buffer(&mut self, view: IndexBufferView) {
        self.record(RecordedCommand::SetIndexBuffer(view));
    }

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        let Some(state) = self.recording.as_ref().map(|r| r.state) else {
            log::error!("DummyBackend: draw_indexed outside a command stream");
            return;
        };
        if let Some(rtv) = state.render_target {
            self.expect_state(rtv, ResourceState::RenderTarget, "draw_indexed target");
        } else {
            self.violation("draw_indexed without bound render targets".into());
        }
        if let Some(cube) = state.cube_map {
            self.expect_state(cube, ResourceState::PixelShaderResource, "draw_indexed cube map");
        }
        self.record(RecordedCommand::DrawIndexed {
            index_count,
            start_index,
            base_vertex,
            state,
        });
    }

    fn end_commands(&mut self) -> BackendResult<()> {
        let recording = self.recording.take().ok_or_else(|| {
            BackendError::Validation("end_commands without an open command stream".into())
        })?;
        if let Some(first) = recording.violations.first() {
            let err = BackendError::Validation(format!(
                "{first} ({} validation failures in stream)",
                recording.violations.len()
            ));
            self.restore_states(&recording.undo);
            return Err(err);
        }
        self.closed = Some(CommandStream {
            allocator: recording.allocator,
            commands: recording.commands,
        });
        Ok(())
    }

    fn abort_commands(&mut self) {
        if let Some(recording) = self.recording.take() {
            log::debug!(
                "DummyBackend: aborting open stream with {} commands",
                recording.commands.len()
            );
            self.restore_states(&recording.undo);
        }
        if let Some(stream) = self.closed.take() {
            log::debug!(
                "DummyBackend: dropping closed stream with {} commands",
                stream.commands.len()
            );
            // A closed stream passed validation, so every barrier's `before`
            // is the state it found.
            let undo: Vec<_> = stream
                .commands
                .iter()
                .filter_map(|c| match c {
                    RecordedCommand::Barrier { texture, before, .. } => Some((*texture, *before)),
                    _ => None,
                })
                .collect();
            self.restore_states(&undo);
        }
    }

    fn execute_commands(&mut self) -> BackendResult<()> {
        if self.timeline.is_device_lost() {
            return Err(BackendError::DeviceLost);
        }
        let stream = self
            .closed
            .take()
            .ok_or_else(|| BackendError::Validation("execute_commands without a closed stream".into()))?;
        log::trace!(
            "DummyBackend: executing stream with {} commands",
            stream.commands.len()
        );
        self.unsignaled_allocators.push(stream.allocator);
        self.queue_events.push(QueueEvent::Execute {
            stream: self.submissions.len(),
        });
        self.submissions.push(stream);
        Ok(())
    }

    fn present(&mut self) -> BackendResult<()> {
        if self.timeline.is_device_lost() {
            return Err(BackendError::DeviceLost);
        }
        let index = self.swapchain.current_index;
        let back_buffer = self.back_buffer(index)?;
        if self.texture_state(back_buffer) != Some(ResourceState::Present) {
            return Err(BackendError::Validation(format!(
                "presenting back buffer {index} in state {:?}",
                self.texture_state(back_buffer)
            )));
        }
        self.queue_events.push(QueueEvent::Present { back_buffer: index });
        self.swapchain.current_index = (index + 1) % self.swapchain.buffer_count;
        Ok(())
    }

    fn signal_fence(&mut self, value: u64) -> BackendResult<()> {
        self.timeline.signal(value)?;
        for allocator in self.unsignaled_allocators.drain(..) {
            self.allocator_fences.insert(allocator, value);
        }
        self.queue_events.push(QueueEvent::Signal(value));
        Ok(())
    }

    fn completed_fence_value(&self) -> BackendResult<u64> {
        self.timeline.completed()
    }

    fn wait_for_fence_value(&self, value: u64) -> BackendResult<()> {
        self.timeline.wait(value, None).map(|_| ())
    }

    fn wait_for_fence_value_timeout(&self, value: u64, timeout: Duration) -> BackendResult<bool> {
        self.timeline.wait(value, Some(timeout))
    }
}

static_assertions::assert_impl_all!(DummyBackend: Send);
static_assertions::assert_impl_all!(DummyTimeline: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_desc(size: u64) -> BufferDescriptor {
        BufferDescriptor {
            label: Some("test".into()),
            size,
            usage: BufferUsage::UPLOAD | BufferUsage::UNIFORM,
        }
    }

    #[test]
    fn test_write_and_read_buffer() {
        let mut backend = DummyBackend::default();
        let buffer = backend.create_buffer(&upload_desc(16)).unwrap();
        backend.write_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(backend.read_buffer(buffer, 4, 4), Some(&[1u8, 2, 3, 4][..]));
    }

    #[test]
    fn test_write_buffer_overflow_rejected() {
        let mut backend = DummyBackend::default();
        let buffer = backend.create_buffer(&upload_desc(4)).unwrap();
        let result = backend.write_buffer(buffer, 2, &[0; 4]);
        assert!(matches!(result, Err(BackendError::Validation(_))));
    }

    #[test]
    fn test_buffer_addresses_do_not_overlap() {
        let mut backend = DummyBackend::default();
        let a = backend.create_buffer(&upload_desc(100)).unwrap();
        let b = backend.create_buffer(&upload_desc(100)).unwrap();
        let addr_a = backend.buffer_address(a).unwrap();
        let addr_b = backend.buffer_address(b).unwrap();
        assert!(addr_b >= addr_a + 100);
    }

    #[test]
    fn test_immediate_timeline_completes_on_signal() {
        let mut backend = DummyBackend::default();
        backend.signal_fence(1).unwrap();
        assert_eq!(backend.completed_fence_value().unwrap(), 1);
        backend.wait_for_fence_value(1).unwrap();
    }

    #[test]
    fn test_manual_timeline_waits_until_completed() {
        let mut backend = DummyBackend::with_timeline(64, 64, TimelineMode::Manual);
        backend.signal_fence(1).unwrap();
        assert_eq!(backend.completed_fence_value().unwrap(), 0);

        let ready = backend
            .wait_for_fence_value_timeout(1, Duration::from_millis(5))
            .unwrap();
        assert!(!ready);

        let timeline = backend.timeline();
        let gpu = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            timeline.complete_next();
        });
        backend.wait_for_fence_value(1).unwrap();
        gpu.join().unwrap();
        assert_eq!(backend.completed_fence_value().unwrap(), 1);
    }

    #[test]
    fn test_signal_must_increase() {
        let mut backend = DummyBackend::default();
        backend.signal_fence(2).unwrap();
        assert!(matches!(
            backend.signal_fence(2),
            Err(BackendError::Validation(_))
        ));
    }

    #[test]
    fn test_wait_on_unsignaled_value_is_rejected() {
        let backend = DummyBackend::default();
        assert!(matches!(
            backend.wait_for_fence_value(3),
            Err(BackendError::Validation(_))
        ));
    }

    #[test]
    fn test_device_lost_aborts_waits() {
        let mut backend = DummyBackend::with_timeline(64, 64, TimelineMode::Manual);
        backend.signal_fence(1).unwrap();
        let timeline = backend.timeline();
        let gpu = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            timeline.lose_device();
        });
        assert_eq!(backend.wait_for_fence_value(1), Err(BackendError::DeviceLost));
        gpu.join().unwrap();
        assert_eq!(backend.completed_fence_value(), Err(BackendError::DeviceLost));
    }

    fn test_pipeline(backend: &mut DummyBackend) -> PipelineHandle {
        backend
            .create_pipeline(&PipelineDescriptor {
                label: Some("p".into()),
                vertex_shader: ShaderBytecode {
                    entry_point: "VS".into(),
                    target: "vs_5_1".into(),
                    bytes: Arc::from(&b"vs"[..]),
                },
                pixel_shader: ShaderBytecode {
                    entry_point: "PS".into(),
                    target: "ps_5_1".into(),
                    bytes: Arc::from(&b"ps"[..]),
                },
                vertex_layout: Vertex::layout(),
                cull_mode: CullMode::Back,
                depth_compare: CompareFunction::Less,
                depth_write_enabled: true,
                color_format: TextureFormat::Rgba8Unorm,
                depth_format: TextureFormat::Depth24PlusStencil8,
                static_samplers: Vec::new(),
            })
            .unwrap()
    }

    fn shader_texture(backend: &mut DummyBackend) -> TextureHandle {
        backend
            .create_texture(&TextureDescriptor {
                initial_state: ResourceState::PixelShaderResource,
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn test_mismatched_barrier_fails_stream() {
        let mut backend = DummyBackend::default();
        let texture = shader_texture(&mut backend);
        let allocator = backend.create_command_allocator().unwrap();
        let pipeline = test_pipeline(&mut backend);

        backend.begin_commands(allocator, pipeline).unwrap();
        backend.resource_barrier(
            texture,
            ResourceState::RenderTarget,
            ResourceState::PixelShaderResource,
        );
        backend.resource_barrier(
            texture,
            ResourceState::PixelShaderResource,
            ResourceState::RenderTarget,
        );
        assert!(matches!(
            backend.end_commands(),
            Err(BackendError::Validation(_))
        ));
        // The rejected stream leaves no state behind.
        assert_eq!(
            backend.texture_state(texture),
            Some(ResourceState::PixelShaderResource)
        );
        backend.begin_commands(allocator, pipeline).unwrap();
        backend.end_commands().unwrap();
    }

    #[test]
    fn test_abort_discards_stream_and_its_barriers() {
        let mut backend = DummyBackend::default();
        let texture = shader_texture(&mut backend);
        let allocator = backend.create_command_allocator().unwrap();
        let pipeline = test_pipeline(&mut backend);

        // Open stream
        backend.begin_commands(allocator, pipeline).unwrap();
        backend.resource_barrier(
            texture,
            ResourceState::PixelShaderResource,
            ResourceState::RenderTarget,
        );
        backend.abort_commands();
        assert_eq!(
            backend.texture_state(texture),
            Some(ResourceState::PixelShaderResource)
        );

        // Closed but never executed
        backend.begin_commands(allocator, pipeline).unwrap();
        backend.resource_barrier(
            texture,
            ResourceState::PixelShaderResource,
            ResourceState::CopyDest,
        );
        backend.end_commands().unwrap();
        backend.abort_commands();
        assert_eq!(
            backend.texture_state(texture),
            Some(ResourceState::PixelShaderResource)
        );
        assert!(matches!(
            backend.execute_commands(),
            Err(BackendError::Validation(_))
        ));
        assert!(backend.submissions().is_empty());

        // Nothing pending
        backend.abort_commands();
    }

    #[test]
    fn test_allocator_reset_requires_completion() {
        let mut backend = DummyBackend::with_timeline(64, 64, TimelineMode::Manual);
        let allocator = backend.create_command_allocator().unwrap();
        backend.closed = Some(CommandStream {
            allocator,
            commands: Vec::new(),
        });
        backend.execute_commands().unwrap();

        // Submitted but no fence yet: progress unknown.
        assert!(backend.reset_command_allocator(allocator).is_err());

        backend.signal_fence(1).unwrap();
        assert!(backend.reset_command_allocator(allocator).is_err());

        backend.timeline().complete_through(1);
        backend.reset_command_allocator(allocator).unwrap();
    }

    #[test]
    fn test_present_advances_back_buffer() {
        let mut backend = DummyBackend::default();
        assert_eq!(backend.swapchain().current_index, 0);
        backend.present().unwrap();
        assert_eq!(backend.swapchain().current_index, 1);
        backend.present().unwrap();
        assert_eq!(backend.swapchain().current_index, 0);
        assert_eq!(backend.frames_presented(), 2);
    }
}
