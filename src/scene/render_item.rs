//! Render items and their layered catalog

use glam::Mat4;

use crate::pipeline::constants::ObjectConstants;
use crate::resources::{MaterialId, MaterialLibrary, SubmeshGeometry};

/// Draw group a render item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderLayer {
    Opaque,
    /// Samples the dynamic cube map; skipped by the cube capture pass.
    DynamicReflector,
    Sky,
}

impl RenderLayer {
    pub const ALL: [RenderLayer; 3] = [
        RenderLayer::Opaque,
        RenderLayer::DynamicReflector,
        RenderLayer::Sky,
    ];

    fn index(self) -> usize {
        match self {
            RenderLayer::Opaque => 0,
            RenderLayer::DynamicReflector => 1,
            RenderLayer::Sky => 2,
        }
    }
}

/// Stable index of a render item; also its slot in the object constant array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub usize);

/// One drawable instance
#[derive(Debug, Clone)]
pub struct RenderItem {
    pub name: String,
    pub layer: RenderLayer,
    pub world: Mat4,
    pub tex_transform: Mat4,
    pub material: MaterialId,
    /// Name of the shared geometry in the resource registry
    pub geometry: String,
    pub submesh: SubmeshGeometry,
    generation: u64,
}

impl RenderItem {
    pub fn new(
        name: &str,
        layer: RenderLayer,
        geometry: &str,
        submesh: SubmeshGeometry,
        material: MaterialId,
    ) -> Self {
        Self {
            name: name.to_string(),
            layer,
            world: Mat4::IDENTITY,
            tex_transform: Mat4::IDENTITY,
            material,
            geometry: geometry.to_string(),
            submesh,
            generation: 1,
        }
    }

    pub fn with_world(mut self, world: Mat4) -> Self {
        self.world = world;
        self
    }

    pub fn with_tex_transform(mut self, tex_transform: Mat4) -> Self {
        self.tex_transform = tex_transform;
        self
    }

    /// Generation of this item's constants; bumped on every change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Constants as uploaded to the object buffer
    pub fn constants(&self, materials: &MaterialLibrary) -> ObjectConstants {
        ObjectConstants::new(
            self.world,
            self.tex_transform,
            materials.cb_index(self.material) as u32,
        )
    }
}

/// Flat arena of render items with per-layer id lists.
///
/// Items are never removed, so an [`ItemId`] stays valid and keeps its
/// constant buffer slot for the catalog's lifetime.
#[derive(Debug, Clone, Default)]
pub struct RenderItemCatalog {
    items: Vec<RenderItem>,
    layers: [Vec<ItemId>; 3],
}

impl RenderItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: RenderItem) -> ItemId {
        let id = ItemId(self.items.len());
        self.layers[item.layer.index()].push(id);
        self.items.push(item);
        id
    }

    pub fn get(&self, id: ItemId) -> Option<&RenderItem> {
        self.items.get(id.0)
    }

    /// Find an item by name
    pub fn find(&self, name: &str) -> Option<ItemId> {
        self.items.iter().position(|i| i.name == name).map(ItemId)
    }

    /// Items of one layer in insertion order
    pub fn layer(&self, layer: RenderLayer) -> &[ItemId] {
        &self.layers[layer.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &RenderItem)> {
        self.items.iter().enumerate().map(|(i, item)| (ItemId(i), item))
    }

    /// Move an item; the new transform propagates to every frame slot.
    pub fn set_world(&mut self, id: ItemId, world: Mat4) {
        if let Some(item) = self.items.get_mut(id.0) {
            item.world = world;
            item.generation += 1;
        }
    }

    pub fn set_tex_transform(&mut self, id: ItemId, tex_transform: Mat4) {
        if let Some(item) = self.items.get_mut(id.0) {
            item.tex_transform = tex_transform;
            item.generation += 1;
        }
    }

    /// Force a re-upload of an item's constants into every frame slot
    pub fn mark_dirty(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(id.0) {
            item.generation += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
