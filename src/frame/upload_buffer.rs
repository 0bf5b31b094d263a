//! Typed CPU-writable GPU arrays.
//!
//! An [`UploadBuffer`] stays mapped for its whole lifetime: writes land in
//! GPU-visible memory immediately, so a buffer must never be written while
//! the GPU may still be reading the frame that last used it. The frame ring
//! enforces that; this type only handles layout.
//!
//! Constant buffer elements are padded to [`CONSTANT_BUFFER_ALIGNMENT`] so
//! each element can be bound on its own by address. Structured buffers use
//! the tight element size and are bound once as a whole.

use bytemuck::Pod;

use crate::backend::{BufferDescriptor, BufferHandle, BufferUsage, GraphicsBackend};
use crate::error::EngineResult;

/// Alignment of individually bound constant buffer elements (256 bytes).
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Align a value up to the given alignment (must be a power of 2).
#[inline]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// How elements are laid out in an [`UploadBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadLayout {
    /// Each element padded to 256 bytes.
    Constant,
    /// Elements packed at their natural size.
    Structured,
}

/// A mapped array of `T` with a CPU mirror of what was last written.
#[derive(Debug)]
pub struct UploadBuffer<T: Pod> {
    buffer: BufferHandle,
    base_address: u64,
    stride: u64,
    mirror: Vec<T>,
}

impl<T: Pod> UploadBuffer<T> {
    /// Create a buffer holding `len` elements, all zeroed.
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        label: &str,
        len: usize,
        layout: UploadLayout,
    ) -> EngineResult<Self> {
        let element_size = std::mem::size_of::<T>() as u64;
        let stride = match layout {
            UploadLayout::Constant => align_up(element_size, CONSTANT_BUFFER_ALIGNMENT),
            UploadLayout::Structured => element_size,
        };
        let usage = match layout {
            UploadLayout::Constant => BufferUsage::UPLOAD | BufferUsage::UNIFORM,
            UploadLayout::Structured => BufferUsage::UPLOAD | BufferUsage::STORAGE,
        };
        // Zero-length arrays still get one element so every slot owns a bindable address.
        let size = stride * len.max(1) as u64;
        let buffer = backend.create_buffer(&BufferDescriptor {
            label: Some(label.to_string()),
            size,
            usage,
        })?;
        let base_address = backend.buffer_address(buffer)?;

        log::trace!("UploadBuffer {label}: {len} elements, stride {stride}");

        Ok(Self {
            buffer,
            base_address,
            stride,
            mirror: vec![T::zeroed(); len],
        })
    }

    /// Write one element.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn copy_data(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        index: usize,
        value: &T,
    ) -> EngineResult<()> {
        assert!(
            index < self.mirror.len(),
            "upload index {index} out of range (len {})",
            self.mirror.len()
        );
        backend.write_buffer(self.buffer, index as u64 * self.stride, bytemuck::bytes_of(value))?;
        self.mirror[index] = *value;
        Ok(())
    }

    /// Last value written at `index`
    pub fn get(&self, index: usize) -> Option<&T> {
        self.mirror.get(index)
    }

    /// GPU address of element `index`: base + index * stride.
    pub fn address_of(&self, index: usize) -> u64 {
        self.base_address + index as u64 * self.stride
    }

    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// Distance in bytes between consecutive elements
    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn len(&self) -> usize {
        self.mirror.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirror.is_empty()
    }

    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    /// Release the GPU buffer. The GPU must be done with it.
    pub fn destroy(self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_buffer(self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::pipeline::constants::{MaterialData, ObjectConstants};

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(144, 256), 256);
        assert_eq!(align_up(1216, 256), 1280);
    }

    #[test]
    fn test_constant_layout_stride() {
        let mut backend = DummyBackend::default();
        let buffer =
            UploadBuffer::<ObjectConstants>::new(&mut backend, "objects", 4, UploadLayout::Constant)
                .unwrap();
        assert_eq!(buffer.stride(), 256);
        assert_eq!(buffer.address_of(3), buffer.base_address() + 768);
    }

    #[test]
    fn test_structured_layout_stride() {
        let mut backend = DummyBackend::default();
        let buffer =
            UploadBuffer::<MaterialData>::new(&mut backend, "materials", 4, UploadLayout::Structured)
                .unwrap();
        assert_eq!(buffer.stride(), std::mem::size_of::<MaterialData>() as u64);
    }

    #[test]
    fn test_copy_data_reaches_gpu_memory() {
        let mut backend = DummyBackend::default();
        let mut buffer =
            UploadBuffer::<ObjectConstants>::new(&mut backend, "objects", 2, UploadLayout::Constant)
                .unwrap();
        let value = ObjectConstants {
            material_index: 7,
            ..Default::default()
        };
        buffer.copy_data(&mut backend, 1, &value).unwrap();

        assert_eq!(buffer.get(1), Some(&value));
        let bytes = backend
            .read_buffer(buffer.buffer(), 256, std::mem::size_of::<ObjectConstants>())
            .unwrap();
        assert_eq!(bytes, bytemuck::bytes_of(&value));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_copy_data_out_of_range() {
        let mut backend = DummyBackend::default();
        let mut buffer =
            UploadBuffer::<ObjectConstants>::new(&mut backend, "objects", 1, UploadLayout::Constant)
                .unwrap();
        let _ = buffer.copy_data(&mut backend, 1, &ObjectConstants::default());
    }
}
