//! Fixed-layout descriptor tables.
//!
//! Three heaps are created once at startup:
//!
//! ```text
//! shader resources: [diffuse 0 .. diffuse n-1][sky cube][dynamic cube]
//! render targets:   [back buffer 0 .. back buffer m-1][cube +X -X +Y -Y +Z -Z]
//! depth stencil:    [primary][cube capture]
//! ```
//!
//! The dynamic cube always sits in the slot right after the sky cube, so a
//! shader can index either one from the same table base.

use crate::backend::{
    DescriptorHeapHandle, DescriptorHeapKind, DescriptorSlot, GraphicsBackend, TextureFormat,
    TextureHandle, ViewDescriptor,
};
use crate::error::{EngineError, EngineResult};
use crate::resources::{TextureAsset, TextureKind};
use crate::scene::CubeFace;

/// Fixed-capacity slot allocator over one backend descriptor heap
#[derive(Debug)]
pub struct DescriptorTable {
    heap: DescriptorHeapHandle,
    kind: DescriptorHeapKind,
    capacity: u32,
    next: u32,
}

impl DescriptorTable {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        kind: DescriptorHeapKind,
        capacity: u32,
    ) -> EngineResult<Self> {
        let heap = backend.create_descriptor_heap(kind, capacity)?;
        log::debug!("Created {kind:?} descriptor table with {capacity} slots");
        Ok(Self {
            heap,
            kind,
            capacity,
            next: 0,
        })
    }

    /// Reserve `count` consecutive slots and return the first one
    pub fn allocate_range(&mut self, count: u32) -> EngineResult<DescriptorSlot> {
        if self.next + count > self.capacity {
            return Err(EngineError::InvalidConfig(format!(
                "{:?} descriptor table exhausted: {} of {} slots used, {count} requested",
                self.kind, self.next, self.capacity
            )));
        }
        let slot = DescriptorSlot {
            heap: self.heap,
            index: self.next,
        };
        self.next += count;
        Ok(slot)
    }

    pub fn allocate(&mut self) -> EngineResult<DescriptorSlot> {
        self.allocate_range(1)
    }

    /// Slot at an absolute index
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside the table.
    pub fn slot(&self, index: u32) -> DescriptorSlot {
        assert!(
            index < self.capacity,
            "descriptor index {index} out of range for {:?} table of {}",
            self.kind,
            self.capacity
        );
        DescriptorSlot {
            heap: self.heap,
            index,
        }
    }

    pub fn heap(&self) -> DescriptorHeapHandle {
        self.heap
    }

    pub fn kind(&self) -> DescriptorHeapKind {
        self.kind
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Slots handed out so far
    pub fn len(&self) -> u32 {
        self.next
    }

    pub fn is_empty(&self) -> bool {
        self.next == 0
    }
}

/// Slot positions inside the shader resource table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderResourceLayout {
    pub diffuse_count: u32,
}

impl Default for ShaderResourceLayout {
    fn default() -> Self {
        Self { diffuse_count: 3 }
    }
}

impl ShaderResourceLayout {
    pub fn new(diffuse_count: u32) -> Self {
        Self { diffuse_count }
    }

    pub fn sky_cube(&self) -> u32 {
        self.diffuse_count
    }

    pub fn dynamic_cube(&self) -> u32 {
        self.diffuse_count + 1
    }

    /// Total slots in the table
    pub fn len(&self) -> u32 {
        self.diffuse_count + 2
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Slots the cube render target writes its views into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubeDescriptors {
    /// Whole cube as one sampled texture
    pub srv: DescriptorSlot,
    /// One color target per face, in [`CubeFace::ALL`] order
    pub rtvs: [DescriptorSlot; CubeFace::COUNT],
    pub dsv: DescriptorSlot,
}

/// The three scene tables and the fixed slot assignments inside them
#[derive(Debug)]
pub struct SceneDescriptors {
    layout: ShaderResourceLayout,
    srv: DescriptorTable,
    rtv: DescriptorTable,
    dsv: DescriptorTable,
    diffuse_start: DescriptorSlot,
    sky_cube: DescriptorSlot,
    swapchain_rtvs: Vec<DescriptorSlot>,
    primary_dsv: DescriptorSlot,
    cube: CubeDescriptors,
}

impl SceneDescriptors {
    /// Create the heaps and assign every slot. No views are written yet.
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        layout: ShaderResourceLayout,
        swapchain_buffers: u32,
    ) -> EngineResult<Self> {
        let face_count = CubeFace::COUNT as u32;

        let mut srv = DescriptorTable::new(backend, DescriptorHeapKind::ShaderResource, layout.len())?;
        let mut rtv = DescriptorTable::new(
            backend,
            DescriptorHeapKind::RenderTarget,
            swapchain_buffers + face_count,
        )?;
        let mut dsv = DescriptorTable::new(backend, DescriptorHeapKind::DepthStencil, 2)?;

        let diffuse_start = srv.allocate_range(layout.diffuse_count)?;
        let sky_cube = srv.allocate()?;
        let dynamic_cube = srv.allocate()?;

        let swapchain_start = rtv.allocate_range(swapchain_buffers)?;
        let swapchain_rtvs = (0..swapchain_buffers)
            .map(|i| rtv.slot(swapchain_start.index + i))
            .collect();
        let face_start = rtv.allocate_range(face_count)?;
        let rtvs = std::array::from_fn(|face| rtv.slot(face_start.index + face as u32));

        let primary_dsv = dsv.allocate()?;
        let cube_dsv = dsv.allocate()?;

        Ok(Self {
            layout,
            srv,
            rtv,
            dsv,
            diffuse_start,
            sky_cube,
            swapchain_rtvs,
            primary_dsv,
            cube: CubeDescriptors {
                srv: dynamic_cube,
                rtvs,
                dsv: cube_dsv,
            },
        })
    }

    /// Write the diffuse table and the sky cube.
    ///
    /// `diffuse` must match the layout's count and be 2D; `sky` must be a cube.
    pub fn write_scene_textures(
        &self,
        backend: &mut dyn GraphicsBackend,
        diffuse: &[&TextureAsset],
        sky: &TextureAsset,
    ) -> EngineResult<()> {
        if diffuse.len() != self.layout.diffuse_count as usize {
            return Err(EngineError::InvalidConfig(format!(
                "expected {} diffuse textures, got {}",
                self.layout.diffuse_count,
                diffuse.len()
            )));
        }
        for (i, texture) in diffuse.iter().enumerate() {
            if texture.kind != TextureKind::Texture2d {
                return Err(EngineError::InvalidConfig(format!(
                    "diffuse texture '{}' is not 2D",
                    texture.name
                )));
            }
            backend.write_descriptor(self.srv.slot(self.diffuse_start.index + i as u32), &texture.view())?;
        }
        if sky.kind != TextureKind::Cube {
            return Err(EngineError::InvalidConfig(format!(
                "sky texture '{}' is not a cube",
                sky.name
            )));
        }
        backend.write_descriptor(self.sky_cube, &sky.view())?;
        Ok(())
    }

    /// (Re)write the back buffer render target views. Called at startup and after a resize.
    pub fn write_swapchain_views(&self, backend: &mut dyn GraphicsBackend) -> EngineResult<()> {
        let swapchain = backend.swapchain();
        for (i, slot) in self.swapchain_rtvs.iter().enumerate() {
            let texture = backend.back_buffer(i as u32)?;
            backend.write_descriptor(
                *slot,
                &ViewDescriptor::RenderTarget {
                    texture,
                    format: swapchain.format,
                    array_layer: 0,
                },
            )?;
        }
        Ok(())
    }

    pub fn write_primary_depth(
        &self,
        backend: &mut dyn GraphicsBackend,
        texture: TextureHandle,
        format: TextureFormat,
    ) -> EngineResult<()> {
        backend.write_descriptor(self.primary_dsv, &ViewDescriptor::DepthStencil { texture, format })?;
        Ok(())
    }

    pub fn layout(&self) -> ShaderResourceLayout {
        self.layout
    }

    /// Heap bound for the whole frame
    pub fn shader_heap(&self) -> DescriptorHeapHandle {
        self.srv.heap()
    }

    /// Base of the diffuse texture table
    pub fn diffuse_table(&self) -> DescriptorSlot {
        self.diffuse_start
    }

    pub fn sky_cube(&self) -> DescriptorSlot {
        self.sky_cube
    }

    pub fn swapchain_rtv(&self, index: u32) -> Option<DescriptorSlot> {
        self.swapchain_rtvs.get(index as usize).copied()
    }

    pub fn primary_dsv(&self) -> DescriptorSlot {
        self.primary_dsv
    }

    pub fn cube(&self) -> CubeDescriptors {
        self.cube
    }

    pub fn render_target_table(&self) -> &DescriptorTable {
        &self.rtv
    }

    pub fn depth_table(&self) -> &DescriptorTable {
        &self.dsv
    }
}
