//! In-memory collaborators
//!
//! [`RecordingAllocator`] and [`RecordingBackend`] implement the GPU
//! interfaces without a device. They hand out synthetic handles and device
//! addresses and record every call, which makes them suitable for tests and
//! for running the pipeline headless.

use std::collections::HashMap;

use crate::error::{SceneError, SceneResult};
use crate::scene::{BlasInput, TlasInstanceList};

use super::{
    AccelerationStructureBackend, Blas, BufferAllocator, BufferHandle, BufferUsage, BuildFlags,
    Tlas, TlasBuildMode,
};

/// Base of the synthetic device address space
const ADDRESS_BASE: u64 = 0x1000_0000;

/// Spacing between synthetic addresses, large enough for test buffers
const ADDRESS_STRIDE: u64 = 0x10_0000;

/// One recorded upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    /// Buffer label
    pub label: String,
    /// Size in bytes
    pub size: u64,
    /// Requested usage
    pub usage: BufferUsage,
}

/// Allocator that keeps uploads on the host
#[derive(Debug, Default)]
pub struct RecordingAllocator {
    uploads: Vec<UploadRecord>,
    live: HashMap<u64, BufferHandle>,
    next_id: u64,
    fail_next: Option<String>,
}

impl RecordingAllocator {
    /// Create an empty allocator
    pub fn new() -> Self {
        Self::default()
    }

    /// Every upload so far, in call order
    pub fn uploads(&self) -> &[UploadRecord] {
        &self.uploads
    }

    /// Number of upload calls so far
    pub fn upload_count(&self) -> usize {
        self.uploads.len()
    }

    /// Number of buffers not yet released
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Make the next upload fail with `reason`
    pub fn fail_next_upload(&mut self, reason: impl Into<String>) {
        self.fail_next = Some(reason.into());
    }
}

impl BufferAllocator for RecordingAllocator {
    fn upload(&mut self, label: &str, bytes: &[u8], usage: BufferUsage) -> SceneResult<BufferHandle> {
        if let Some(reason) = self.fail_next.take() {
            return Err(SceneError::Upload {
                label: label.to_string(),
                reason,
            });
        }

        let id = self.next_id;
        self.next_id += 1;

        let device_address = if usage.contains(BufferUsage::SHADER_DEVICE_ADDRESS) {
            ADDRESS_BASE + id * ADDRESS_STRIDE
        } else {
            0
        };
        let handle = BufferHandle {
            id,
            device_address,
            size: bytes.len() as u64,
        };

        self.uploads.push(UploadRecord {
            label: label.to_string(),
            size: handle.size,
            usage,
        });
        self.live.insert(id, handle);

        log::trace!("Uploaded buffer '{}' ({} bytes, {:?})", label, handle.size, usage);
        Ok(handle)
    }

    fn release(&mut self, buffer: BufferHandle) {
        if self.live.remove(&buffer.id).is_none() {
            log::warn!("Release of unknown buffer {:?}", buffer);
        }
    }
}

/// Backend that records builds instead of performing them
///
/// A TLAS is refit when a previous TLAS exists, the instance count is
/// unchanged and the list allows updates; otherwise it is rebuilt.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    blas_batches: Vec<usize>,
    tlas_builds: usize,
    tlas_updates: usize,
    last_instances: Option<TlasInstanceList>,
    next_id: u64,
    fail_tlas: Option<String>,
}

impl RecordingBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes of every `build_blas` batch, in call order
    pub fn blas_batches(&self) -> &[usize] {
        &self.blas_batches
    }

    /// Total number of BLAS built
    pub fn blas_built(&self) -> usize {
        self.blas_batches.iter().sum()
    }

    /// Number of full TLAS builds
    pub fn tlas_builds(&self) -> usize {
        self.tlas_builds
    }

    /// Number of TLAS refits
    pub fn tlas_updates(&self) -> usize {
        self.tlas_updates
    }

    /// Instance list of the most recent TLAS call
    pub fn last_instances(&self) -> Option<&TlasInstanceList> {
        self.last_instances.as_ref()
    }

    /// Make the next TLAS call fail with `reason`
    pub fn fail_next_tlas(&mut self, reason: impl Into<String>) {
        self.fail_tlas = Some(reason.into());
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl AccelerationStructureBackend for RecordingBackend {
    fn build_blas(&mut self, inputs: &[BlasInput], flags: BuildFlags) -> SceneResult<Vec<Blas>> {
        self.blas_batches.push(inputs.len());
        log::debug!("Building {} BLAS ({:?})", inputs.len(), flags);

        Ok(inputs
            .iter()
            .map(|_| {
                let id = self.next_id();
                Blas {
                    id,
                    device_address: ADDRESS_BASE / 2 + id * ADDRESS_STRIDE,
                }
            })
            .collect())
    }

    fn build_or_update_tlas(
        &mut self,
        instances: &TlasInstanceList,
        previous: Option<&Tlas>,
    ) -> SceneResult<Tlas> {
        if let Some(reason) = self.fail_tlas.take() {
            return Err(SceneError::Backend(reason));
        }

        let count = instances.len() as u32;
        let allow_update = instances.build_flags().contains(BuildFlags::ALLOW_UPDATE);

        let tlas = match previous {
            Some(previous) if allow_update && previous.instance_count == count => {
                self.tlas_updates += 1;
                Tlas {
                    id: previous.id,
                    instance_count: count,
                    mode: TlasBuildMode::Update,
                }
            }
            _ => {
                self.tlas_builds += 1;
                Tlas {
                    id: self.next_id(),
                    instance_count: count,
                    mode: TlasBuildMode::Build,
                }
            }
        };

        self.last_instances = Some(instances.clone());
        Ok(tlas)
    }
}
