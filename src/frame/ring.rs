//! Ring of frame resources gated by GPU fence values.
//!
//! With N slots the CPU may build frame k+N-1 while the GPU still executes
//! frame k. Before a slot is handed out again, [`FrameResourceRing::advance`]
//! blocks until the GPU has completed the fence value recorded the last time
//! that slot was submitted:
//!
//! ```text
//! frames_in_flight = 3
//!
//! Slot 0: [Frame 1] ──► [wait F1] [Frame 4] ──► [wait F4] [Frame 7] ──►
//! Slot 1: [Frame 2] ──► [wait F2] [Frame 5] ──►
//! Slot 2: [Frame 3] ──► [wait F3] [Frame 6] ──►
//! ```
//!
//! Fence values increase by one per submitted frame; 0 means the slot was
//! never submitted and needs no wait. The wait is the only point where the
//! CPU blocks on the GPU.
//!
//! # Shutdown
//!
//! Call [`flush`](FrameResourceRing::flush) before destroying anything the
//! GPU may still read.

use std::time::Duration;

use crate::backend::GraphicsBackend;
use crate::error::EngineResult;

use super::frame_resource::FrameResource;

/// N rotating [`FrameResource`] slots plus the fence counter that orders them.
///
/// Not thread-safe; owned by the render thread.
#[derive(Debug)]
pub struct FrameResourceRing {
    frames: Vec<FrameResource>,
    current: usize,
    /// Last fence value handed to the GPU.
    fence_counter: u64,
    /// Total frames started.
    frame_count: u64,
}

impl FrameResourceRing {
    /// Create `frames_in_flight` slots sized for the given item and material counts.
    ///
    /// The cursor starts on the last slot so the first [`advance`](Self::advance)
    /// lands on slot 0.
    ///
    /// # Panics
    ///
    /// Panics if `frames_in_flight` is 0.
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        frames_in_flight: usize,
        object_count: usize,
        material_count: usize,
    ) -> EngineResult<Self> {
        assert!(frames_in_flight > 0, "frames_in_flight must be at least 1");

        let frames = (0..frames_in_flight)
            .map(|slot| FrameResource::new(backend, slot, object_count, material_count))
            .collect::<EngineResult<Vec<_>>>()?;

        log::debug!(
            "Created {frames_in_flight} frame resources ({object_count} objects, {material_count} materials)"
        );

        Ok(Self {
            frames,
            current: frames_in_flight - 1,
            fence_counter: 0,
            frame_count: 0,
        })
    }

    /// Move to the next slot, blocking until the GPU is done with it.
    ///
    /// Returns the new slot index. A lost device aborts the wait with
    /// [`EngineError::DeviceLost`](crate::EngineError::DeviceLost).
    pub fn advance(&mut self, backend: &dyn GraphicsBackend) -> EngineResult<usize> {
        let next = (self.current + 1) % self.frames.len();
        let fence = self.frames[next].fence;

        if fence != 0 && backend.completed_fence_value()? < fence {
            log::debug!("Waiting for GPU to release slot {next} (fence {fence})");
            backend.wait_for_fence_value(fence)?;
        }

        self.begin_slot(next);
        Ok(next)
    }

    /// Like [`advance`](Self::advance), but gives up after `timeout`.
    ///
    /// Returns `false` if the slot is still in use; the cursor is left where
    /// it was so the call can be retried.
    pub fn advance_timeout(
        &mut self,
        backend: &dyn GraphicsBackend,
        timeout: Duration,
    ) -> EngineResult<bool> {
        let next = (self.current + 1) % self.frames.len();
        let fence = self.frames[next].fence;

        if fence != 0
            && backend.completed_fence_value()? < fence
            && !backend.wait_for_fence_value_timeout(fence, timeout)?
        {
            log::debug!("Slot {next} still busy after {timeout:?} (fence {fence})");
            return Ok(false);
        }

        self.begin_slot(next);
        Ok(true)
    }

    fn begin_slot(&mut self, slot: usize) {
        self.current = slot;
        self.frame_count += 1;
        log::trace!("Begin frame {} (slot {})", self.frame_count, slot);
    }

    /// Record a new fence value for the current slot and queue its signal.
    ///
    /// Call once per frame, after the frame's commands were executed and presented.
    pub fn mark_submitted(&mut self, backend: &mut dyn GraphicsBackend) -> EngineResult<u64> {
        self.fence_counter += 1;
        let fence = self.fence_counter;
        self.frames[self.current].fence = fence;
        backend.signal_fence(fence)?;

        log::trace!(
            "End frame {} (slot {}, fence {fence})",
            self.frame_count,
            self.current
        );
        Ok(fence)
    }

    /// Block until every submitted frame has completed.
    pub fn flush(&self, backend: &dyn GraphicsBackend) -> EngineResult<()> {
        if self.fence_counter == 0 {
            return Ok(());
        }
        log::trace!("Flushing GPU queue (fence {})", self.fence_counter);
        backend.wait_for_fence_value(self.fence_counter)?;
        Ok(())
    }

    /// Check if a slot can be reused without blocking
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of range.
    pub fn is_slot_ready(&self, backend: &dyn GraphicsBackend, slot: usize) -> EngineResult<bool> {
        assert!(slot < self.frames.len(), "Invalid slot index {slot}");
        let fence = self.frames[slot].fence;
        Ok(fence == 0 || backend.completed_fence_value()? >= fence)
    }

    /// Check if every submitted frame has completed
    pub fn is_idle(&self, backend: &dyn GraphicsBackend) -> EngineResult<bool> {
        Ok(backend.completed_fence_value()? >= self.fence_counter)
    }

    /// Number of slots whose copy of an object is older than `generation`.
    ///
    /// This is the object's remaining dirty count: it reaches 0 once the
    /// current generation has been written into every slot.
    pub fn stale_object_slots(&self, index: usize, generation: u64) -> usize {
        self.frames
            .iter()
            .filter(|f| f.object_generation(index) != generation)
            .count()
    }

    /// Number of slots whose copy of a material is older than `generation`
    pub fn stale_material_slots(&self, index: usize, generation: u64) -> usize {
        self.frames
            .iter()
            .filter(|f| f.material_generation(index) != generation)
            .count()
    }

    pub fn current(&self) -> &FrameResource {
        &self.frames[self.current]
    }

    pub fn current_mut(&mut self) -> &mut FrameResource {
        &mut self.frames[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn frames(&self) -> &[FrameResource] {
        &self.frames
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    /// Last fence value handed to the GPU (0 before the first submission)
    pub fn last_fence(&self) -> u64 {
        self.fence_counter
    }

    /// Total frames started
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Release every slot. Call [`flush`](Self::flush) first.
    pub fn destroy(self, backend: &mut dyn GraphicsBackend) {
        for frame in self.frames {
            frame.destroy(backend);
        }
    }
}
