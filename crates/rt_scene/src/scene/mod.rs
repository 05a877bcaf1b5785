//! Scene acceleration-structure pipeline
//!
//! ## Architecture
//!
//! ```text
//! ModelRegistry ──> BlasBuilder / BlasCache
//!       │                      │
//! InstanceStore ──> InstanceBehavior (Simulation)
//!       │                      │
//!       └──────> TlasBuilder <─┘ ──> AccelerationStructureBackend
//! ```
//!
//! Models are registered once per name and turned into one BLAS each.
//! Instances reference models by handle; every frame their transforms are
//! advanced, flattened into a TLAS instance list and handed to the backend.
//! [`Scene`] runs the whole sequence.

mod behavior;
mod blas;
mod commands;
mod emitter;
mod instance;
mod instance_store;
mod model;
mod model_registry;
#[cfg(feature = "obj")]
mod obj;
mod pipeline;
mod primitives;
mod simulation;
mod tlas;

pub use behavior::{InstanceBehavior, ParticleState};
pub use blas::{BlasBuilder, BlasCache, BlasInput, BlasStats};
pub use commands::{ApplyReport, CommandQueue, PendingCommand};
pub use emitter::ParticleEmitter;
pub use instance::Instance;
pub use instance_store::{InstanceHandle, InstanceStore, StoreStats};
pub use model::{MeshData, Model, ModelBuffers, ModelHandle};
pub use model_registry::{name_from_path, ModelRegistry, RegistryStats};
#[cfg(feature = "obj")]
pub use obj::load_obj;
pub use pipeline::{FrameReport, Scene};
pub use simulation::{Simulation, SimulationStats, StepReport};
pub use tlas::{TlasBuilder, TlasInstance, TlasInstanceList, TlasStats, MAX_TLAS_INSTANCES};
