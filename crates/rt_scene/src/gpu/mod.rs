//! GPU collaborator interfaces
//!
//! The pipeline never talks to a device directly. Buffer uploads go through a
//! [`BufferAllocator`] and acceleration-structure builds through an
//! [`AccelerationStructureBackend`]; both are implemented by the renderer
//! (see [`vulkan`] for the record conversions a Vulkan implementation needs)
//! or by the in-memory [`recording`] doubles used in tests and headless runs.
//!
//! # Frame boundary
//!
//! Every buffer handed out here is written by the pipeline and read by the
//! renderer within the same frame. The caller fences before the pipeline
//! overwrites a buffer the renderer may still be reading.

use bitflags::bitflags;

use crate::error::SceneResult;
use crate::scene::{BlasInput, TlasInstanceList};

pub mod records;
pub mod recording;
pub mod vulkan;

pub use records::{InstanceTransform, MaterialData, ObjDesc, Vertex};
pub use recording::{RecordingAllocator, RecordingBackend};

bitflags! {
    /// Intended usage of an uploaded buffer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Bound as a vertex buffer for rasterization
        const VERTEX = 1 << 0;
        /// Bound as an index buffer for rasterization
        const INDEX = 1 << 1;
        /// Read from shaders as a storage buffer
        const STORAGE = 1 << 2;
        /// Read from shaders as a uniform buffer
        const UNIFORM = 1 << 3;
        /// Needs a device address
        const SHADER_DEVICE_ADDRESS = 1 << 4;
        /// Consumed by an acceleration-structure build
        const ACCELERATION_STRUCTURE_BUILD_INPUT = 1 << 5;
    }
}

impl BufferUsage {
    /// Usage of vertex and index buffers that also feed BLAS builds
    pub fn geometry(base: Self) -> Self {
        base | Self::STORAGE | Self::SHADER_DEVICE_ADDRESS | Self::ACCELERATION_STRUCTURE_BUILD_INPUT
    }
}

bitflags! {
    /// Build preferences forwarded to the backend
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BuildFlags: u32 {
        /// Favor trace performance over build time
        const PREFER_FAST_TRACE = 1 << 0;
        /// Favor build time over trace performance
        const PREFER_FAST_BUILD = 1 << 1;
        /// The structure may later be refit in place
        const ALLOW_UPDATE = 1 << 2;
    }
}

/// Device buffer handed out by a [`BufferAllocator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    /// Allocator-assigned identifier
    pub id: u64,
    /// Device address, 0 if the buffer was not created with
    /// [`BufferUsage::SHADER_DEVICE_ADDRESS`]
    pub device_address: u64,
    /// Size in bytes
    pub size: u64,
}

/// Built bottom-level acceleration structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Blas {
    /// Backend identifier
    pub id: u64,
    /// Device address referenced by TLAS instance records
    pub device_address: u64,
}

/// How the backend produced a TLAS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlasBuildMode {
    /// Built from scratch
    Build,
    /// Refit from the previous TLAS
    Update,
}

/// Built top-level acceleration structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlas {
    /// Backend identifier
    pub id: u64,
    /// Number of instance records it was built from
    pub instance_count: u32,
    /// Whether it was built or refit
    pub mode: TlasBuildMode,
}

/// GPU buffer allocation collaborator
pub trait BufferAllocator {
    /// Upload `bytes` into a new device buffer
    fn upload(&mut self, label: &str, bytes: &[u8], usage: BufferUsage) -> SceneResult<BufferHandle>;

    /// Release a buffer previously returned by [`upload`](Self::upload)
    fn release(&mut self, buffer: BufferHandle);
}

/// Acceleration-structure collaborator
pub trait AccelerationStructureBackend {
    /// Build one BLAS per input, in input order
    fn build_blas(&mut self, inputs: &[BlasInput], flags: BuildFlags) -> SceneResult<Vec<Blas>>;

    /// Build a TLAS from `instances`, or refit `previous` when the backend
    /// decides that is valid
    fn build_or_update_tlas(
        &mut self,
        instances: &TlasInstanceList,
        previous: Option<&Tlas>,
    ) -> SceneResult<Tlas>;
}
