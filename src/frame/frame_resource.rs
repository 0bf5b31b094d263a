//! Per-frame GPU data owned by one ring slot.

use crate::backend::{CommandAllocatorHandle, GraphicsBackend};
use crate::error::EngineResult;
use crate::pipeline::constants::{MaterialData, ObjectConstants, PassConstants, PASS_COUNT};

use super::upload_buffer::{UploadBuffer, UploadLayout};

/// Everything the CPU writes for one frame and the GPU reads while executing it.
///
/// Slots are only ever touched by the frame currently being built; the ring
/// waits on [`fence`](Self::fence) before handing a slot out again.
#[derive(Debug)]
pub struct FrameResource {
    /// Memory backing this slot's command stream.
    pub allocator: CommandAllocatorHandle,
    /// Index 0 is the main camera, 1..=6 the cube faces.
    pub pass_constants: UploadBuffer<PassConstants>,
    /// One element per render item, addressed by the item's constant slot.
    pub object_constants: UploadBuffer<ObjectConstants>,
    /// Structured buffer of all materials, bound once per pass.
    pub materials: UploadBuffer<MaterialData>,
    /// Fence value marking the last submission that used this slot. 0 = never submitted.
    pub fence: u64,
    object_generations: Vec<u64>,
    material_generations: Vec<u64>,
}

impl FrameResource {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        slot: usize,
        object_count: usize,
        material_count: usize,
    ) -> EngineResult<Self> {
        let allocator = backend.create_command_allocator()?;
        let pass_constants = UploadBuffer::new(
            backend,
            &format!("Frame {slot} Pass Constants"),
            PASS_COUNT,
            UploadLayout::Constant,
        )?;
        let object_constants = UploadBuffer::new(
            backend,
            &format!("Frame {slot} Object Constants"),
            object_count,
            UploadLayout::Constant,
        )?;
        let materials = UploadBuffer::new(
            backend,
            &format!("Frame {slot} Materials"),
            material_count,
            UploadLayout::Structured,
        )?;

        Ok(Self {
            allocator,
            pass_constants,
            object_constants,
            materials,
            fence: 0,
            object_generations: vec![0; object_count],
            material_generations: vec![0; material_count],
        })
    }

    /// Generation of an object's constants last written into this slot (0 = never)
    pub fn object_generation(&self, index: usize) -> u64 {
        self.object_generations.get(index).copied().unwrap_or(0)
    }

    /// Generation of a material's data last written into this slot (0 = never)
    pub fn material_generation(&self, index: usize) -> u64 {
        self.material_generations.get(index).copied().unwrap_or(0)
    }

    pub(crate) fn set_object_generation(&mut self, index: usize, generation: u64) {
        self.object_generations[index] = generation;
    }

    pub(crate) fn set_material_generation(&mut self, index: usize, generation: u64) {
        self.material_generations[index] = generation;
    }

    /// Release this slot's buffers. The GPU must be done with the slot.
    pub fn destroy(self, backend: &mut dyn GraphicsBackend) {
        self.pass_constants.destroy(backend);
        self.object_constants.destroy(backend);
        self.materials.destroy(backend);
    }
}
