//! # RT Scene
//!
//! Scene acceleration-structure pipeline for hybrid raster/ray-traced scenes
//! made of static meshes and simulated particles.
//!
//! ## Features
//!
//! - **Model registry**: meshes deduplicated by name, uploaded once
//! - **Instance store**: generation-checked handles, insertion-order iteration
//! - **Particle behavior**: gravity-bias and drag rule with injectable constants
//! - **BLAS/TLAS builders**: one BLAS per model, compact per-frame instance lists
//! - **Vulkan records**: `ash` conversions for `VK_KHR_acceleration_structure`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rt_scene::prelude::*;
//!
//! fn main() -> Result<(), SceneError> {
//!     let mut allocator = RecordingAllocator::new();
//!     let mut backend = RecordingBackend::new();
//!
//!     let mut scene = Scene::new(&SceneConfig::default())?;
//!     let cube = scene.load_model("cube", &MeshData::cube(0.5), &mut allocator)?;
//!     scene.add_static(cube, Mat4::identity())?;
//!     scene.spawn_particle(cube, &Mat4::identity(), Vec3::new(0.0, 1.0, 0.0), 0.1)?;
//!
//!     let report = scene.frame(1.0 / 60.0, &mut allocator, &mut backend)?;
//!     assert_eq!(report.instance_count, 2);
//!
//!     scene.teardown(&mut allocator);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod error;
pub mod foundation;
pub mod gpu;
pub mod scene;

pub use error::{SceneError, SceneResult};

/// Common imports for pipeline users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, EmitterConfig, SceneConfig, SimulationConfig, TlasConfig},
        error::{SceneError, SceneResult},
        foundation::math::{Mat4, Mat4Ext, Transform, Vec3, Vec4},
        gpu::{
            AccelerationStructureBackend, Blas, BufferAllocator, BufferHandle, BufferUsage,
            BuildFlags, RecordingAllocator, RecordingBackend, Tlas, TlasBuildMode,
        },
        scene::{
            FrameReport, Instance, InstanceBehavior, InstanceHandle, MeshData, ModelHandle,
            ModelRegistry, Scene,
        },
    };
}
