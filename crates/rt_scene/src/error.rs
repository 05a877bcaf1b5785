//! Error types for the scene pipeline
//!
//! Data-integrity failures (stale handles, missing BLAS, unknown models) are
//! always surfaced to the caller. `DegenerateDirection` is the one numeric
//! case that callers are expected to recover from locally.

use crate::config::ConfigError;
use crate::scene::{InstanceHandle, ModelHandle};

/// Errors produced by the registry, the instance store, the builders and the
/// external collaborators they drive.
#[derive(thiserror::Error, Debug)]
pub enum SceneError {
    /// A registered name was supplied again with different geometry
    #[error("model name '{name}' is already registered as {existing} with different geometry")]
    DuplicateNameConflict {
        /// The conflicting name
        name: String,
        /// Handle already bound to that name
        existing: ModelHandle,
    },

    /// The handle refers to an instance that was removed
    #[error("stale instance handle {handle:?}")]
    StaleHandle {
        /// The stale handle
        handle: InstanceHandle,
    },

    /// A TLAS rebuild reached an instance whose model has no BLAS yet
    #[error("no BLAS built for {model} (referenced by instance {instance:?})")]
    MissingBlas {
        /// Model without a BLAS
        model: ModelHandle,
        /// First instance that referenced it
        instance: InstanceHandle,
    },

    /// The live instance set exceeds what a 24-bit instance index can address
    #[error("{count} instances exceed the TLAS instance index limit of {max}")]
    TooManyInstances {
        /// Live instances at rebuild time
        count: usize,
        /// Largest addressable instance count
        max: usize,
    },

    /// A particle direction had zero length at normalization time
    #[error("particle direction is degenerate (zero length)")]
    DegenerateDirection,

    /// An instance was created against a model the registry does not know
    #[error("unknown model {0}")]
    UnknownModel(ModelHandle),

    /// Mesh data cannot produce a valid triangle geometry
    #[error("invalid mesh '{name}': {reason}")]
    InvalidMesh {
        /// Name the mesh was registered under
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// Spawn parameters contain non-finite values
    #[error("invalid spawn parameters: {0}")]
    InvalidSpawn(String),

    /// The buffer allocator rejected an upload
    #[error("buffer upload '{label}' failed: {reason}")]
    Upload {
        /// Debug label of the buffer
        label: String,
        /// Allocator message
        reason: String,
    },

    /// The acceleration-structure backend failed
    #[error("acceleration structure backend error: {0}")]
    Backend(String),

    /// Configuration could not be loaded or validated
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SceneError {
    /// True for errors the pipeline recovers from without caller action
    pub fn is_recoverable_locally(&self) -> bool {
        matches!(self, Self::DegenerateDirection)
    }
}

/// Result alias used throughout the crate
pub type SceneResult<T> = Result<T, SceneError>;
