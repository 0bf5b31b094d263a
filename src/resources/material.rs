//! Material definitions and the material library

use std::collections::HashMap;

use glam::{Mat4, Vec3, Vec4};

use crate::error::{AssetKind, EngineError, EngineResult};
use crate::pipeline::constants::MaterialData;

/// Surface parameters of a material
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub diffuse_albedo: Vec4,
    /// Reflectance at normal incidence
    pub fresnel_r0: Vec3,
    pub roughness: f32,
    /// Index into the diffuse texture table
    pub diffuse_map_index: u32,
    pub transform: Mat4,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            diffuse_albedo: Vec4::ONE,
            fresnel_r0: Vec3::splat(0.01),
            roughness: 0.5,
            diffuse_map_index: 0,
            transform: Mat4::IDENTITY,
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_albedo(mut self, albedo: Vec4) -> Self {
        self.diffuse_albedo = albedo;
        self
    }

    pub fn with_fresnel(mut self, fresnel_r0: Vec3) -> Self {
        self.fresnel_r0 = fresnel_r0;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    pub fn with_diffuse_map(mut self, index: u32) -> Self {
        self.diffuse_map_index = index;
        self
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// Pack for the structured material buffer
    pub fn gpu_data(&self) -> MaterialData {
        MaterialData {
            diffuse_albedo: self.diffuse_albedo,
            fresnel_r0: self.fresnel_r0,
            roughness: self.roughness,
            mat_transform: self.transform.transpose(),
            diffuse_map_index: self.diffuse_map_index,
            _padding: [0; 3],
        }
    }

    // Preset materials

    /// Polished mirror-like surface
    pub fn mirror() -> Self {
        Self::new("mirror")
            .with_albedo(Vec4::new(0.0, 0.0, 0.1, 1.0))
            .with_fresnel(Vec3::splat(0.98))
            .with_roughness(0.1)
    }

    pub fn sky() -> Self {
        Self::new("sky")
            .with_fresnel(Vec3::splat(0.1))
            .with_roughness(1.0)
    }
}

/// Stable handle to a material in a [`MaterialLibrary`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub usize);

#[derive(Debug, Clone)]
struct MaterialEntry {
    material: Material,
    generation: u64,
}

/// Name-keyed material table.
///
/// Each material keeps the slot it was added at (`cb_index`) for the
/// lifetime of the library, and a generation that increases on every change.
#[derive(Debug, Clone, Default)]
pub struct MaterialLibrary {
    entries: Vec<MaterialEntry>,
    by_name: HashMap<String, MaterialId>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a material. Names must be unique.
    pub fn add(&mut self, material: Material) -> EngineResult<MaterialId> {
        if self.by_name.contains_key(&material.name) {
            return Err(EngineError::asset(
                AssetKind::Material,
                material.name,
                "duplicate material name",
            ));
        }
        let id = MaterialId(self.entries.len());
        self.by_name.insert(material.name.clone(), id);
        self.entries.push(MaterialEntry {
            material,
            generation: 1,
        });
        Ok(id)
    }

    pub fn id(&self, name: &str) -> EngineResult<MaterialId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::asset(AssetKind::Material, name, "unknown material"))
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.entries.get(id.0).map(|e| &e.material)
    }

    /// Mutate a material; its new data propagates to every frame slot.
    pub fn modify(&mut self, id: MaterialId, f: impl FnOnce(&mut Material)) {
        if let Some(entry) = self.entries.get_mut(id.0) {
            f(&mut entry.material);
            entry.generation += 1;
        }
    }

    /// Index into the per-frame material buffer
    pub fn cb_index(&self, id: MaterialId) -> usize {
        id.0
    }

    pub fn generation(&self, id: MaterialId) -> u64 {
        self.entries.get(id.0).map_or(0, |e| e.generation)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &Material, u64)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (MaterialId(i), &e.material, e.generation))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
