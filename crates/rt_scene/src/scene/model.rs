//! Model representation
//!
//! A [`Model`] is the immutable, GPU-resident form of one mesh. It is created
//! once per distinct source name by the [`ModelRegistry`](super::ModelRegistry)
//! and shared by every instance that renders it.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{SceneError, SceneResult};
use crate::gpu::{BufferHandle, MaterialData, Vertex};

/// Stable handle of a registered model
///
/// Handles are assigned in registration order starting at 0 and are never
/// reused for the lifetime of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelHandle(u32);

impl ModelHandle {
    /// Wrap a raw index
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Raw index into the registry
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

/// Host-side mesh as produced by the mesh ingestion collaborator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertex data
    pub vertices: Vec<Vertex>,
    /// Triangle list indices
    pub indices: Vec<u32>,
    /// Materials referenced by `material_indices`
    pub materials: Vec<MaterialData>,
    /// One material index per triangle
    pub material_indices: Vec<i32>,
}

impl MeshData {
    /// Mesh with a single default material shared by every triangle
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        let triangle_count = indices.len() / 3;
        Self {
            vertices,
            indices,
            materials: vec![MaterialData::default()],
            material_indices: vec![0; triangle_count],
        }
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check that the mesh describes a valid indexed triangle list
    pub fn validate(&self, name: &str) -> SceneResult<()> {
        let invalid = |reason: String| SceneError::InvalidMesh {
            name: name.to_string(),
            reason,
        };

        if self.vertices.is_empty() {
            return Err(invalid("mesh has no vertices".to_string()));
        }
        if self.indices.is_empty() || self.indices.len() % 3 != 0 {
            return Err(invalid(format!(
                "index count {} is not a non-empty multiple of 3",
                self.indices.len()
            )));
        }
        let vertex_count = self.vertices.len() as u32;
        if let Some(bad) = self.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(invalid(format!(
                "index {bad} out of range for {vertex_count} vertices"
            )));
        }
        let material_count = self.materials.len() as i32;
        if let Some(bad) = self
            .material_indices
            .iter()
            .find(|&&m| m < 0 || m >= material_count)
        {
            return Err(invalid(format!(
                "material index {bad} out of range for {material_count} materials"
            )));
        }
        Ok(())
    }

    /// Content hash used to detect a name being reused for other geometry
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        bytemuck::cast_slice::<Vertex, u8>(&self.vertices).hash(&mut hasher);
        self.indices.hash(&mut hasher);
        bytemuck::cast_slice::<MaterialData, u8>(&self.materials).hash(&mut hasher);
        self.material_indices.hash(&mut hasher);
        hasher.finish()
    }
}

/// GPU buffers backing one model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelBuffers {
    /// Device buffer of all vertices
    pub vertices: BufferHandle,
    /// Device buffer of the triangle indices
    pub indices: BufferHandle,
    /// Device buffer of the materials
    pub materials: BufferHandle,
    /// Device buffer of the per-triangle material indices
    pub material_indices: BufferHandle,
}

/// Immutable, GPU-resident mesh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    /// Registry name
    pub name: String,
    /// Number of vertices
    pub vertex_count: u32,
    /// Number of indices
    pub index_count: u32,
    /// Device buffers
    pub buffers: ModelBuffers,
    pub(crate) fingerprint: u64,
}

impl Model {
    /// True when `mesh` is the geometry this model was built from
    ///
    /// Vertex and index counts are compared before the content hash.
    pub fn matches(&self, mesh: &MeshData) -> bool {
        self.vertex_count as usize == mesh.vertices.len()
            && self.index_count as usize == mesh.indices.len()
            && self.fingerprint == mesh.fingerprint()
    }
}

impl Model {
    /// Number of triangles
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }
}
