//! Model registry
//!
//! Deduplicates meshes by name and hands out stable [`ModelHandle`]s. The
//! first `load` of a name uploads the mesh through the buffer allocator;
//! every later `load` of the same name is a map lookup with no GPU work.
//!
//! # Conflicts
//!
//! Loading a registered name with *different* geometry fails with
//! [`SceneError::DuplicateNameConflict`]. The caller either picks a new name
//! or accepts the cached model through [`ModelRegistry::handle_of`].

use std::collections::HashMap;
use std::path::Path;

use crate::error::{SceneError, SceneResult};
use crate::gpu::{BufferAllocator, BufferHandle, BufferUsage};

use super::model::{MeshData, Model, ModelBuffers, ModelHandle};

/// Counters for registry activity
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Calls to `load`
    pub load_requests: u64,
    /// `load` calls answered from the name map
    pub cache_hits: u64,
    /// Buffers uploaded
    pub buffers_uploaded: u64,
}

/// Name-keyed store of immutable models
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: Vec<Model>,
    names: HashMap<String, ModelHandle>,
    stats: RegistryStats,
}

impl ModelRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `mesh` under `name`, or return the handle already bound to it
    ///
    /// A registered name is first checked against the cached vertex and
    /// index counts; only when those match is the incoming mesh hashed to
    /// confirm it is the same geometry, which costs a pass over its data.
    pub fn load(
        &mut self,
        name: &str,
        mesh: &MeshData,
        allocator: &mut dyn BufferAllocator,
    ) -> SceneResult<ModelHandle> {
        self.stats.load_requests += 1;

        if let Some(&existing) = self.names.get(name) {
            if !self.get(existing)?.matches(mesh) {
                log::warn!("Model name '{}' reused with different geometry", name);
                return Err(SceneError::DuplicateNameConflict {
                    name: name.to_string(),
                    existing,
                });
            }
            self.stats.cache_hits += 1;
            log::trace!("Model '{}' already registered as {}", name, existing);
            return Ok(existing);
        }

        mesh.validate(name)?;

        let buffers = self.upload_buffers(name, mesh, allocator)?;
        let handle = ModelHandle::new(self.models.len() as u32);

        self.models.push(Model {
            name: name.to_string(),
            vertex_count: mesh.vertices.len() as u32,
            index_count: mesh.indices.len() as u32,
            buffers,
            fingerprint: mesh.fingerprint(),
        });
        self.names.insert(name.to_string(), handle);

        log::debug!(
            "Registered model '{}' as {} ({} vertices, {} triangles)",
            name,
            handle,
            mesh.vertices.len(),
            mesh.triangle_count()
        );
        Ok(handle)
    }

    /// Register a mesh keyed by the stem of its source path
    pub fn load_named_by_path(
        &mut self,
        path: &str,
        mesh: &MeshData,
        allocator: &mut dyn BufferAllocator,
    ) -> SceneResult<ModelHandle> {
        let name = name_from_path(path);
        self.load(&name, mesh, allocator)
    }

    /// Load an OBJ file registered under its file stem
    ///
    /// A stem that is already registered returns its handle without reading
    /// the file.
    #[cfg(feature = "obj")]
    pub fn load_path(
        &mut self,
        path: &str,
        allocator: &mut dyn BufferAllocator,
    ) -> SceneResult<ModelHandle> {
        let name = name_from_path(path);
        if let Some(existing) = self.handle_of(&name) {
            self.stats.load_requests += 1;
            self.stats.cache_hits += 1;
            return Ok(existing);
        }
        let mesh = super::obj::load_obj(path)?;
        self.load(&name, &mesh, allocator)
    }

    fn upload_buffers(
        &mut self,
        name: &str,
        mesh: &MeshData,
        allocator: &mut dyn BufferAllocator,
    ) -> SceneResult<ModelBuffers> {
        let requests: [(String, &[u8], BufferUsage); 4] = [
            (
                format!("Vertex buffer ({name})"),
                bytemuck::cast_slice(&mesh.vertices),
                BufferUsage::geometry(BufferUsage::VERTEX),
            ),
            (
                format!("Index buffer ({name})"),
                bytemuck::cast_slice(&mesh.indices),
                BufferUsage::geometry(BufferUsage::INDEX),
            ),
            (
                format!("Material buffer ({name})"),
                bytemuck::cast_slice(&mesh.materials),
                BufferUsage::STORAGE | BufferUsage::SHADER_DEVICE_ADDRESS,
            ),
            (
                format!("Material index buffer ({name})"),
                bytemuck::cast_slice(&mesh.material_indices),
                BufferUsage::STORAGE | BufferUsage::SHADER_DEVICE_ADDRESS,
            ),
        ];

        let mut uploaded: Vec<BufferHandle> = Vec::with_capacity(requests.len());
        for (label, bytes, usage) in &requests {
            match allocator.upload(label, bytes, *usage) {
                Ok(handle) => uploaded.push(handle),
                Err(err) => {
                    for handle in uploaded {
                        allocator.release(handle);
                    }
                    return Err(err);
                }
            }
        }
        self.stats.buffers_uploaded += uploaded.len() as u64;

        Ok(ModelBuffers {
            vertices: uploaded[0],
            indices: uploaded[1],
            materials: uploaded[2],
            material_indices: uploaded[3],
        })
    }

    /// Handle bound to `name`, if any
    pub fn handle_of(&self, name: &str) -> Option<ModelHandle> {
        self.names.get(name).copied()
    }

    /// Model behind `handle`
    pub fn get(&self, handle: ModelHandle) -> SceneResult<&Model> {
        self.models
            .get(handle.index() as usize)
            .ok_or(SceneError::UnknownModel(handle))
    }

    /// True when `handle` was issued by this registry
    pub fn contains(&self, handle: ModelHandle) -> bool {
        (handle.index() as usize) < self.models.len()
    }

    /// Number of registered models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Models in handle order
    pub fn iter(&self) -> impl Iterator<Item = (ModelHandle, &Model)> {
        self.models
            .iter()
            .enumerate()
            .map(|(index, model)| (ModelHandle::new(index as u32), model))
    }

    /// Registry counters
    pub fn stats(&self) -> RegistryStats {
        self.stats
    }

    /// Release every model buffer; the registry is consumed
    pub fn teardown(self, allocator: &mut dyn BufferAllocator) {
        log::info!("Tearing down model registry ({} models)", self.models.len());
        for model in self.models {
            let buffers = model.buffers;
            for buffer in [
                buffers.vertices,
                buffers.indices,
                buffers.materials,
                buffers.material_indices,
            ] {
                allocator.release(buffer);
            }
        }
    }
}

/// Registry name for a mesh file: its file stem
///
/// `"assets/models/cube.obj"` becomes `"cube"`. Paths without a stem are
/// used verbatim.
pub fn name_from_path(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map_or_else(|| path.to_string(), str::to_string)
}
