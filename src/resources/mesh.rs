//! Mesh data structures and the shared-buffer geometry builder

use std::collections::HashMap;

use crate::backend::types::Vertex;
use crate::backend::{
    BufferDescriptor, BufferHandle, BufferUsage, GraphicsBackend, IndexBufferView, IndexFormat,
    VertexBufferView,
};
use crate::error::{AssetKind, EngineError, EngineResult};

/// CPU-side mesh with vertex and index data
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Calculate vertex count
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Calculate index count
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Calculate triangle count
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Source of named meshes in the uniform vertex/index form
pub trait GeometryProvider {
    /// Produce every mesh this provider knows about
    fn meshes(&self) -> EngineResult<Vec<MeshData>>;
}

/// Range of one logical shape inside a shared vertex/index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubmeshGeometry {
    pub index_count: u32,
    pub start_index: u32,
    pub base_vertex: i32,
}

/// GPU vertex and index buffers shared by several submeshes
#[derive(Debug, Clone)]
pub struct MeshGeometry {
    pub name: String,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub vertex_count: u32,
    pub index_count: u32,
    submeshes: HashMap<String, SubmeshGeometry>,
}

impl MeshGeometry {
    pub fn vertex_view(&self) -> VertexBufferView {
        let stride = std::mem::size_of::<Vertex>() as u32;
        VertexBufferView {
            buffer: self.vertex_buffer,
            size: self.vertex_count as u64 * stride as u64,
            stride,
        }
    }

    pub fn index_view(&self) -> IndexBufferView {
        IndexBufferView {
            buffer: self.index_buffer,
            size: self.index_count as u64 * IndexFormat::Uint32.size() as u64,
            format: IndexFormat::Uint32,
        }
    }

    pub fn submesh(&self, name: &str) -> EngineResult<SubmeshGeometry> {
        self.submeshes.get(name).copied().ok_or_else(|| {
            EngineError::asset(
                AssetKind::Geometry,
                format!("{}/{name}", self.name),
                "unknown submesh",
            )
        })
    }

    /// Whether `submesh` lies inside this geometry's buffers
    pub fn contains(&self, submesh: &SubmeshGeometry) -> bool {
        let end = submesh.start_index as u64 + submesh.index_count as u64;
        end <= self.index_count as u64
            && submesh.base_vertex >= 0
            && (submesh.base_vertex as u32) < self.vertex_count
    }

    pub fn submesh_names(&self) -> impl Iterator<Item = &str> {
        self.submeshes.keys().map(String::as_str)
    }

    /// Release the GPU buffers
    pub fn destroy(&self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_buffer(self.vertex_buffer);
        backend.destroy_buffer(self.index_buffer);
    }
}

/// Concatenates meshes into one vertex and one index buffer.
///
/// Indices stay relative to each mesh; the submesh's `base_vertex` offsets them.
#[derive(Debug, Clone)]
pub struct MeshGeometryBuilder {
    name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    submeshes: HashMap<String, SubmeshGeometry>,
}

impl MeshGeometryBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vertices: Vec::new(),
            indices: Vec::new(),
            submeshes: HashMap::new(),
        }
    }

    /// Append one mesh and return its range
    pub fn add(&mut self, mesh: MeshData) -> EngineResult<SubmeshGeometry> {
        if self.submeshes.contains_key(&mesh.name) {
            return Err(EngineError::asset(
                AssetKind::Geometry,
                mesh.name,
                "duplicate submesh name",
            ));
        }
        if mesh.indices.is_empty() || mesh.vertices.is_empty() {
            return Err(EngineError::asset(AssetKind::Geometry, mesh.name, "mesh is empty"));
        }
        if let Some(bad) = mesh.indices.iter().find(|&&i| i as usize >= mesh.vertices.len()) {
            return Err(EngineError::asset(
                AssetKind::Geometry,
                mesh.name,
                format!("index {bad} out of range ({} vertices)", mesh.vertices.len()),
            ));
        }

        let submesh = SubmeshGeometry {
            index_count: mesh.indices.len() as u32,
            start_index: self.indices.len() as u32,
            base_vertex: self.vertices.len() as i32,
        };
        self.vertices.extend_from_slice(&mesh.vertices);
        self.indices.extend_from_slice(&mesh.indices);
        self.submeshes.insert(mesh.name, submesh);
        Ok(submesh)
    }

    /// Append every mesh of a provider
    pub fn add_from(&mut self, provider: &dyn GeometryProvider) -> EngineResult<()> {
        for mesh in provider.meshes()? {
            self.add(mesh)?;
        }
        Ok(())
    }

    /// Upload the concatenated buffers
    pub fn build(self, backend: &mut dyn GraphicsBackend) -> EngineResult<MeshGeometry> {
        if self.submeshes.is_empty() {
            return Err(EngineError::asset(
                AssetKind::Geometry,
                self.name,
                "no meshes added",
            ));
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&self.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&self.indices);

        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} Vertices", self.name)),
                size: vertex_bytes.len() as u64,
                usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            },
            vertex_bytes,
        )?;
        let index_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} Indices", self.name)),
                size: index_bytes.len() as u64,
                usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
            },
            index_bytes,
        )?;

        log::debug!(
            "Built geometry '{}': {} submeshes, {} vertices, {} indices",
            self.name,
            self.submeshes.len(),
            self.vertices.len(),
            self.indices.len()
        );

        Ok(MeshGeometry {
            name: self.name,
            vertex_buffer,
            index_buffer,
            vertex_count: self.vertices.len() as u32,
            index_count: self.indices.len() as u32,
            submeshes: self.submeshes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use glam::{Vec2, Vec3};

    fn triangle(name: &str) -> MeshData {
        MeshData {
            name: name.to_string(),
            vertices: vec![
                Vertex::new(Vec3::ZERO, Vec3::Z, Vec2::ZERO),
                Vertex::new(Vec3::X, Vec3::Z, Vec2::X),
                Vertex::new(Vec3::Y, Vec3::Z, Vec2::Y),
            ],
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn test_submesh_ranges_are_concatenated() {
        let mut builder = MeshGeometryBuilder::new("shapes");
        let a = builder.add(triangle("a")).unwrap();
        let b = builder.add(triangle("b")).unwrap();
        assert_eq!(a, SubmeshGeometry { index_count: 3, start_index: 0, base_vertex: 0 });
        assert_eq!(b, SubmeshGeometry { index_count: 3, start_index: 3, base_vertex: 3 });
    }

    #[test]
    fn test_build_uploads_buffers() {
        let mut backend = DummyBackend::default();
        let mut builder = MeshGeometryBuilder::new("shapes");
        builder.add(triangle("a")).unwrap();
        let geometry = builder.build(&mut backend).unwrap();

        assert_eq!(geometry.vertex_view().stride, 32);
        assert_eq!(geometry.vertex_view().size, 96);
        assert_eq!(geometry.index_view().size, 12);
        assert_eq!(geometry.submesh("a").unwrap().index_count, 3);
        assert!(geometry.submesh("b").is_err());

        let indices = backend.read_buffer(geometry.index_buffer, 0, 12).unwrap();
        assert_eq!(indices, bytemuck::cast_slice::<u32, u8>(&[0, 1, 2]));
    }

    #[test]
    fn test_contains_checks_index_and_vertex_range() {
        let mut backend = DummyBackend::default();
        let mut builder = MeshGeometryBuilder::new("shapes");
        let a = builder.add(triangle("a")).unwrap();
        let b = builder.add(triangle("b")).unwrap();
        let geometry = builder.build(&mut backend).unwrap();

        assert!(geometry.contains(&a));
        assert!(geometry.contains(&b));
        assert!(!geometry.contains(&SubmeshGeometry { index_count: 4, ..b }));
        assert!(!geometry.contains(&SubmeshGeometry { start_index: u32::MAX, ..a }));
        assert!(!geometry.contains(&SubmeshGeometry { base_vertex: 6, ..a }));
        assert!(!geometry.contains(&SubmeshGeometry { base_vertex: -1, ..a }));
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let mut mesh = triangle("bad");
        mesh.indices[2] = 3;
        let mut builder = MeshGeometryBuilder::new("shapes");
        assert!(matches!(
            builder.add(mesh),
            Err(EngineError::AssetLoad { kind: AssetKind::Geometry, .. })
        ));
    }

    #[test]
    fn test_empty_builder_rejected() {
        let mut backend = DummyBackend::default();
        assert!(MeshGeometryBuilder::new("empty").build(&mut backend).is_err());
    }
}
