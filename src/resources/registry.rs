//! Name-keyed tables of scene resources.
//!
//! Built by the scene-setup stage and handed to the engine by reference.

use std::collections::HashMap;

use crate::backend::{GraphicsBackend, PipelineDescriptor, ShaderBytecode};
use crate::error::{AssetKind, EngineError, EngineResult};

use super::material::MaterialLibrary;
use super::mesh::MeshGeometry;
use super::shader::{ShaderKey, ShaderProvider};
use super::texture::{TextureAsset, TextureKind, TextureProvider};

/// Geometry, materials, textures, shaders and pipeline configurations by name
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    meshes: HashMap<String, MeshGeometry>,
    materials: MaterialLibrary,
    textures: HashMap<String, TextureAsset>,
    shaders: HashMap<String, ShaderBytecode>,
    pipelines: HashMap<String, PipelineDescriptor>,
}

fn missing(kind: AssetKind, name: &str) -> EngineError {
    EngineError::asset(kind, name, "not registered")
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Geometry

    pub fn add_mesh(&mut self, geometry: MeshGeometry) {
        self.meshes.insert(geometry.name.clone(), geometry);
    }

    pub fn mesh(&self, name: &str) -> EngineResult<&MeshGeometry> {
        self.meshes
            .get(name)
            .ok_or_else(|| missing(AssetKind::Geometry, name))
    }

    // Materials

    pub fn materials(&self) -> &MaterialLibrary {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut MaterialLibrary {
        &mut self.materials
    }

    // Textures

    pub fn add_texture(&mut self, texture: TextureAsset) {
        self.textures.insert(texture.name.clone(), texture);
    }

    /// Load through a provider and upload
    pub fn load_texture(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        provider: &dyn TextureProvider,
        name: &str,
        kind: TextureKind,
    ) -> EngineResult<&TextureAsset> {
        let data = provider.load(name, kind)?;
        let asset = TextureAsset::upload(backend, &data)?;
        log::debug!(
            "Texture '{name}': {}x{} {:?}",
            asset.width,
            asset.height,
            asset.kind
        );
        self.textures.insert(name.to_string(), asset);
        self.texture(name)
    }

    pub fn texture(&self, name: &str) -> EngineResult<&TextureAsset> {
        self.textures
            .get(name)
            .ok_or_else(|| missing(AssetKind::Texture, name))
    }

    // Shaders

    pub fn add_shader(&mut self, name: &str, bytecode: ShaderBytecode) {
        self.shaders.insert(name.to_string(), bytecode);
    }

    pub fn load_shader(
        &mut self,
        provider: &dyn ShaderProvider,
        name: &str,
        key: &ShaderKey,
    ) -> EngineResult<()> {
        let bytecode = provider.load(key)?;
        self.add_shader(name, bytecode);
        Ok(())
    }

    pub fn shader(&self, name: &str) -> EngineResult<&ShaderBytecode> {
        self.shaders
            .get(name)
            .ok_or_else(|| missing(AssetKind::Shader, name))
    }

    // Pipelines

    pub fn add_pipeline(&mut self, name: &str, desc: PipelineDescriptor) {
        self.pipelines.insert(name.to_string(), desc);
    }

    pub fn pipeline(&self, name: &str) -> EngineResult<&PipelineDescriptor> {
        self.pipelines
            .get(name)
            .ok_or_else(|| missing(AssetKind::Pipeline, name))
    }

    /// Release GPU buffers and textures. The GPU must be idle.
    pub fn destroy(&mut self, backend: &mut dyn GraphicsBackend) {
        for (_, mesh) in self.meshes.drain() {
            mesh.destroy(backend);
        }
        for (_, texture) in self.textures.drain() {
            backend.destroy_texture(texture.handle);
        }
    }
}
