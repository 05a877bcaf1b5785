//! Bottom-level acceleration structures
//!
//! [`BlasBuilder::build`] turns a model's GPU buffers into one triangle
//! geometry descriptor. [`BlasCache`] remembers which models already have a
//! BLAS so the build cost is paid once per model, however many instances
//! reference it.

use std::collections::HashMap;

use crate::error::{SceneError, SceneResult};
use crate::gpu::{AccelerationStructureBackend, Blas, BuildFlags, Vertex};

use super::instance_store::InstanceStore;
use super::model::{Model, ModelHandle};
use super::model_registry::ModelRegistry;

/// Triangle geometry of one model, ready for a BLAS build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlasInput {
    /// Model the geometry belongs to
    pub model: ModelHandle,
    /// Device address of the vertex buffer; positions come first in each vertex
    pub vertex_address: u64,
    /// Bytes between consecutive vertices
    pub vertex_stride: u64,
    /// Highest vertex index referenced
    pub max_vertex: u32,
    /// Device address of the `u32` index buffer
    pub index_address: u64,
    /// Number of triangles
    pub primitive_count: u32,
    /// Geometry is opaque (any-hit shaders are skipped)
    pub opaque: bool,
}

/// Maps models to BLAS build inputs
pub struct BlasBuilder;

impl BlasBuilder {
    /// Geometry descriptor for `model`
    ///
    /// Pure; calling it twice for the same model yields equal inputs.
    pub fn build(handle: ModelHandle, model: &Model) -> BlasInput {
        BlasInput {
            model: handle,
            vertex_address: model.buffers.vertices.device_address,
            vertex_stride: Vertex::STRIDE,
            max_vertex: model.vertex_count.saturating_sub(1),
            index_address: model.buffers.indices.device_address,
            primitive_count: model.triangle_count(),
            opaque: true,
        }
    }
}

/// Counters for BLAS activity
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlasStats {
    /// BLAS built over the cache's lifetime
    pub built: u64,
    /// Backend calls issued
    pub batches: u64,
}

/// Built BLAS keyed by model
#[derive(Debug, Default)]
pub struct BlasCache {
    built: HashMap<ModelHandle, Blas>,
    stats: BlasStats,
}

impl BlasCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// BLAS of `model`, if built
    pub fn get(&self, model: ModelHandle) -> Option<&Blas> {
        self.built.get(&model)
    }

    /// True when `model` has a BLAS
    pub fn contains(&self, model: ModelHandle) -> bool {
        self.built.contains_key(&model)
    }

    /// Number of built BLAS
    pub fn len(&self) -> usize {
        self.built.len()
    }

    /// True when nothing is built
    pub fn is_empty(&self) -> bool {
        self.built.is_empty()
    }

    /// Build the BLAS of every listed model that does not have one yet
    ///
    /// All missing models go to the backend in one batch, in list order.
    /// Returns the number of BLAS built.
    pub fn build_models(
        &mut self,
        models: &[ModelHandle],
        registry: &ModelRegistry,
        backend: &mut dyn AccelerationStructureBackend,
        flags: BuildFlags,
    ) -> SceneResult<usize> {
        let mut inputs: Vec<BlasInput> = Vec::new();
        for &handle in models {
            if self.contains(handle) || inputs.iter().any(|input| input.model == handle) {
                continue;
            }
            let model = registry.get(handle)?;
            inputs.push(BlasBuilder::build(handle, model));
        }

        if inputs.is_empty() {
            return Ok(0);
        }

        let built = backend.build_blas(&inputs, flags)?;
        if built.len() != inputs.len() {
            return Err(SceneError::Backend(format!(
                "backend returned {} BLAS for {} inputs",
                built.len(),
                inputs.len()
            )));
        }

        for (input, blas) in inputs.iter().zip(built) {
            self.built.insert(input.model, blas);
        }
        self.stats.built += inputs.len() as u64;
        self.stats.batches += 1;

        log::debug!("Built {} BLAS ({} cached)", inputs.len(), self.built.len());
        Ok(inputs.len())
    }

    /// Build the BLAS of every registered model
    pub fn build_all(
        &mut self,
        registry: &ModelRegistry,
        backend: &mut dyn AccelerationStructureBackend,
        flags: BuildFlags,
    ) -> SceneResult<usize> {
        let models: Vec<ModelHandle> = registry.iter().map(|(handle, _)| handle).collect();
        self.build_models(&models, registry, backend, flags)
    }

    /// Build the BLAS of every model referenced by a live instance
    pub fn build_referenced(
        &mut self,
        store: &InstanceStore,
        registry: &ModelRegistry,
        backend: &mut dyn AccelerationStructureBackend,
        flags: BuildFlags,
    ) -> SceneResult<usize> {
        let mut missing: Vec<ModelHandle> = Vec::new();
        store.for_each(|_, instance| {
            if !self.contains(instance.model) && !missing.contains(&instance.model) {
                missing.push(instance.model);
            }
        });
        self.build_models(&missing, registry, backend, flags)
    }

    /// Cache counters
    pub fn stats(&self) -> BlasStats {
        self.stats
    }

    /// Forget every BLAS
    pub fn clear(&mut self) {
        self.built.clear();
    }
}
