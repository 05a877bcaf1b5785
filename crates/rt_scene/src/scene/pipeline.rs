//! Scene facade
//!
//! [`Scene`] owns the registry, the instance store, the BLAS cache, the TLAS
//! builder, the simulation and the deferred command queue, and runs them in
//! a fixed order once per frame:
//!
//! ```text
//! simulate -> apply queued spawns/removals -> build missing BLAS
//!          -> rebuild instance list -> build or refit TLAS
//!          -> upload instance transforms
//!          -> upload instance descriptions (when the instance set changed)
//! ```
//!
//! A failing frame returns its error and leaves the scene ready for the next
//! one; the caller logs it and moves on.

use rand::Rng;

use crate::config::SceneConfig;
use crate::error::{SceneError, SceneResult};
use crate::foundation::math::{Mat4, Vec3};
use crate::gpu::{
    AccelerationStructureBackend, BufferAllocator, BufferHandle, BufferUsage, BuildFlags,
    InstanceTransform, ObjDesc, Tlas,
};

use super::blas::BlasCache;
use super::commands::CommandQueue;
use super::emitter::ParticleEmitter;
use super::instance::Instance;
use super::instance_store::{InstanceHandle, InstanceStore};
use super::model::{MeshData, ModelHandle};
use super::model_registry::ModelRegistry;
use super::simulation::{Simulation, StepReport};
use super::tlas::{TlasBuilder, TlasInstanceList};

/// Summary of one successful frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Frame number, starting at 0
    pub frame: u64,
    /// Simulation outcome
    pub step: StepReport,
    /// Instances added from the queue
    pub spawned: usize,
    /// Instances removed from the queue
    pub removed: usize,
    /// Queued commands that were rejected
    pub rejected: usize,
    /// BLAS built this frame
    pub blas_built: usize,
    /// Records in the TLAS instance list
    pub instance_count: usize,
    /// TLAS produced by the backend
    pub tlas: Tlas,
    /// True when the description buffer was re-uploaded
    pub descriptions_uploaded: bool,
}

const TRANSFORMS_LABEL: &str = "Instance transforms";
const DESCRIPTIONS_LABEL: &str = "Object descriptions";

/// Acceleration-structure pipeline for one scene
#[derive(Debug)]
pub struct Scene {
    registry: ModelRegistry,
    store: InstanceStore,
    blas: BlasCache,
    tlas: TlasBuilder,
    simulation: Simulation,
    commands: CommandQueue,
    emitter: ParticleEmitter,
    instance_list: TlasInstanceList,
    descriptions: Option<BufferHandle>,
    transforms: Option<BufferHandle>,
    instances_changed: bool,
    frame: u64,
}

impl Scene {
    /// Create an empty scene
    pub fn new(config: &SceneConfig) -> SceneResult<Self> {
        config.validate()?;
        let emitter = ParticleEmitter::new(config.emitter)?;

        log::info!(
            "Creating scene (gravity {}, resistance {})",
            config.simulation.gravity,
            config.simulation.resistance
        );

        Ok(Self {
            registry: ModelRegistry::new(),
            store: InstanceStore::new(),
            blas: BlasCache::new(),
            tlas: TlasBuilder::new(config.tlas),
            simulation: Simulation::new(config.simulation),
            commands: CommandQueue::new(),
            emitter,
            instance_list: TlasInstanceList::default(),
            descriptions: None,
            transforms: None,
            instances_changed: true,
            frame: 0,
        })
    }

    /// Model registry
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Instance store
    pub fn store(&self) -> &InstanceStore {
        &self.store
    }

    /// BLAS cache
    pub fn blas_cache(&self) -> &BlasCache {
        &self.blas
    }

    /// TLAS builder
    pub fn tlas_builder(&self) -> &TlasBuilder {
        &self.tlas
    }

    /// Simulation driver
    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Instance list of the last successful frame
    pub fn instance_list(&self) -> &TlasInstanceList {
        &self.instance_list
    }

    /// Description buffer of the last successful frame, if any
    pub fn descriptions_buffer(&self) -> Option<BufferHandle> {
        self.descriptions
    }

    /// Transform buffer of the last successful frame, if any
    pub fn transforms_buffer(&self) -> Option<BufferHandle> {
        self.transforms
    }

    /// Number of commands waiting for the next frame
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Register a mesh, see [`ModelRegistry::load`]
    pub fn load_model(
        &mut self,
        name: &str,
        mesh: &MeshData,
        allocator: &mut dyn BufferAllocator,
    ) -> SceneResult<ModelHandle> {
        self.registry.load(name, mesh, allocator)
    }

    /// Place a static instance
    pub fn add_static(&mut self, model: ModelHandle, transform: Mat4) -> SceneResult<InstanceHandle> {
        self.insert(Instance::new_static(model, transform))
    }

    /// Spawn one particle of `model` at `origin` immediately
    ///
    /// Only valid between frames; spawns raised while a frame runs go
    /// through [`queue_spawn`](Self::queue_spawn).
    pub fn spawn_particle(
        &mut self,
        model: ModelHandle,
        origin: &Mat4,
        direction: Vec3,
        speed: f32,
    ) -> SceneResult<InstanceHandle> {
        self.insert(Instance::new_particle(model, *origin, direction, speed))
    }

    fn insert(&mut self, instance: Instance) -> SceneResult<InstanceHandle> {
        if !self.registry.contains(instance.model) {
            return Err(SceneError::UnknownModel(instance.model));
        }
        instance.validate()?;

        self.instances_changed = true;
        Ok(self.store.add(instance))
    }

    /// Queue an instance to be added after the next simulation pass
    pub fn queue_spawn(&mut self, instance: Instance) {
        self.commands.spawn(instance);
    }

    /// Queue `count` particles of `model` with sampled directions and speeds
    pub fn queue_particle_burst<R: Rng + ?Sized>(
        &mut self,
        model: ModelHandle,
        origin: &Mat4,
        count: usize,
        rng: &mut R,
    ) -> SceneResult<()> {
        if !self.registry.contains(model) {
            return Err(SceneError::UnknownModel(model));
        }
        for instance in self.emitter.burst(model, origin, count, rng) {
            self.commands.spawn(instance);
        }
        log::debug!("Queued burst of {} particles of {}", count, model);
        Ok(())
    }

    /// Remove an instance immediately
    pub fn remove(&mut self, handle: InstanceHandle) -> SceneResult<Instance> {
        let instance = self.store.remove(handle)?;
        self.instances_changed = true;
        Ok(instance)
    }

    /// Queue an instance for removal after the next simulation pass
    pub fn queue_remove(&mut self, handle: InstanceHandle) {
        self.commands.remove(handle);
    }

    /// Instance behind `handle`
    pub fn instance(&self, handle: InstanceHandle) -> SceneResult<&Instance> {
        self.store.get(handle)
    }

    /// Run one frame
    pub fn frame(
        &mut self,
        dt: f32,
        allocator: &mut dyn BufferAllocator,
        backend: &mut dyn AccelerationStructureBackend,
    ) -> SceneResult<FrameReport> {
        let step = self.simulation.step(&mut self.store, &mut self.commands, dt);

        let applied = self.commands.apply(&mut self.store, &self.registry);
        if applied.changed() {
            self.instances_changed = true;
        }

        let blas_built = self.blas.build_referenced(
            &self.store,
            &self.registry,
            backend,
            BuildFlags::PREFER_FAST_TRACE,
        )?;

        let list = self.tlas.rebuild(&self.store, &self.blas)?;
        let tlas = self.tlas.submit(&list, backend)?;

        self.upload_transforms(&list, allocator)?;

        let descriptions_uploaded = self.instances_changed;
        if descriptions_uploaded {
            self.upload_descriptions(&list, allocator)?;
            self.instances_changed = false;
        }

        let report = FrameReport {
            frame: self.frame,
            step,
            spawned: applied.spawned.len(),
            removed: applied.removed,
            rejected: applied.rejected.len(),
            blas_built,
            instance_count: list.len(),
            tlas,
            descriptions_uploaded,
        };

        self.instance_list = list;
        self.frame += 1;
        log::trace!("Frame {} complete: {:?}", report.frame, report);
        Ok(report)
    }

    /// World matrices in instance-index order, for the raster path
    pub fn instance_transforms(list: &TlasInstanceList) -> Vec<InstanceTransform> {
        list.iter().map(|record| InstanceTransform::from(&record.transform)).collect()
    }

    fn upload_transforms(
        &mut self,
        list: &TlasInstanceList,
        allocator: &mut dyn BufferAllocator,
    ) -> SceneResult<()> {
        let transforms = Self::instance_transforms(list);
        let uploaded = if transforms.is_empty() {
            None
        } else {
            Some(allocator.upload(
                TRANSFORMS_LABEL,
                bytemuck::cast_slice(&transforms),
                BufferUsage::STORAGE | BufferUsage::VERTEX,
            )?)
        };

        if let Some(old) = std::mem::replace(&mut self.transforms, uploaded) {
            allocator.release(old);
        }
        Ok(())
    }

    /// Per-instance descriptions in instance-index order
    pub fn instance_descriptions(&self, list: &TlasInstanceList) -> SceneResult<Vec<ObjDesc>> {
        list.iter()
            .map(|record| {
                let model = self.registry.get(record.model)?;
                Ok(ObjDesc {
                    vertex_address: model.buffers.vertices.device_address,
                    index_address: model.buffers.indices.device_address,
                    material_address: model.buffers.materials.device_address,
                    material_index_address: model.buffers.material_indices.device_address,
                    texture_offset: 0,
                    _padding: 0,
                })
            })
            .collect()
    }

    fn upload_descriptions(
        &mut self,
        list: &TlasInstanceList,
        allocator: &mut dyn BufferAllocator,
    ) -> SceneResult<()> {
        let descriptions = self.instance_descriptions(list)?;

        let uploaded = if descriptions.is_empty() {
            None
        } else {
            Some(allocator.upload(
                DESCRIPTIONS_LABEL,
                bytemuck::cast_slice(&descriptions),
                BufferUsage::STORAGE | BufferUsage::SHADER_DEVICE_ADDRESS,
            )?)
        };

        if let Some(old) = std::mem::replace(&mut self.descriptions, uploaded) {
            allocator.release(old);
        }
        log::debug!("Uploaded {} instance descriptions", descriptions.len());
        Ok(())
    }

    /// Release every GPU buffer owned by the scene
    pub fn teardown(mut self, allocator: &mut dyn BufferAllocator) {
        log::info!(
            "Tearing down scene after {} frames ({} instances, {} models)",
            self.frame,
            self.store.len(),
            self.registry.len()
        );
        for buffer in [self.descriptions.take(), self.transforms.take()].into_iter().flatten() {
            allocator.release(buffer);
        }
        self.commands.clear();
        self.store.clear();
        self.blas.clear();
        self.tlas.reset();
        self.registry.teardown(allocator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;
    use crate::gpu::{RecordingAllocator, RecordingBackend, TlasBuildMode};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scene_with_cube() -> (Scene, RecordingAllocator, ModelHandle) {
        let mut allocator = RecordingAllocator::new();
        let mut scene = Scene::new(&SceneConfig::default()).expect("Default config is valid");
        let cube = scene
            .load_model("cube", &MeshData::cube(0.5), &mut allocator)
            .expect("Should load");
        (scene, allocator, cube)
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = SceneConfig::default();
        config.simulation.resistance = 2.0;
        assert!(matches!(Scene::new(&config), Err(SceneError::Config(_))));
    }

    #[test]
    fn test_spawn_requires_registered_model() {
        let (mut scene, _, _) = scene_with_cube();
        let result = scene.spawn_particle(ModelHandle::new(9), &Mat4::identity(), Vec3::y(), 1.0);
        assert!(matches!(result, Err(SceneError::UnknownModel(_))));
    }

    #[test]
    fn test_spawn_rejects_non_finite_speed() {
        let (mut scene, _, cube) = scene_with_cube();
        let result = scene.spawn_particle(cube, &Mat4::identity(), Vec3::y(), f32::NAN);
        assert!(matches!(result, Err(SceneError::InvalidSpawn(_))));
        assert!(scene.store().is_empty());
    }

    #[test]
    fn test_frame_builds_and_refits() {
        let (mut scene, mut allocator, cube) = scene_with_cube();
        let mut backend = RecordingBackend::new();
        scene.add_static(cube, Mat4::identity()).expect("Should add");
        let particle = scene
            .spawn_particle(cube, &Mat4::identity(), Vec3::y(), 1.0)
            .expect("Should spawn");

        let first = scene.frame(0.016, &mut allocator, &mut backend).expect("Should run");
        let second = scene.frame(0.016, &mut allocator, &mut backend).expect("Should run");

        assert_eq!(first.tlas.mode, TlasBuildMode::Build);
        assert_eq!(second.tlas.mode, TlasBuildMode::Update);
        assert_eq!(first.blas_built, 1);
        assert_eq!(second.blas_built, 0);
        assert!(first.descriptions_uploaded);
        assert!(!second.descriptions_uploaded);
        assert_eq!(second.instance_count, 2);

        let y = scene.instance(particle).expect("Should get").transform.translation_part().y;
        assert!(y > 1.0);
    }

    #[test]
    fn test_queued_burst_appears_after_frame() {
        let (mut scene, mut allocator, cube) = scene_with_cube();
        let mut backend = RecordingBackend::new();
        let mut rng = StdRng::seed_from_u64(3);

        scene
            .queue_particle_burst(cube, &Mat4::identity(), 3, &mut rng)
            .expect("Should queue");
        assert!(scene.store().is_empty());
        assert_eq!(scene.pending_commands(), 3);

        let report = scene.frame(0.016, &mut allocator, &mut backend).expect("Should run");
        assert_eq!(report.spawned, 3);
        assert_eq!(report.instance_count, 3);
        assert_eq!(scene.instance_list().len(), 3);
    }

    #[test]
    fn test_descriptions_follow_tlas_order() {
        let mut allocator = RecordingAllocator::new();
        let mut backend = RecordingBackend::new();
        let mut scene = Scene::new(&SceneConfig::default()).expect("Should create");
        let cube = scene.load_model("cube", &MeshData::cube(1.0), &mut allocator).expect("Should load");
        let plane = scene.load_model("plane", &MeshData::plane(1.0), &mut allocator).expect("Should load");
        scene.add_static(plane, Mat4::identity()).expect("Should add");
        scene.add_static(cube, Mat4::identity()).expect("Should add");

        scene.frame(0.016, &mut allocator, &mut backend).expect("Should run");
        let descriptions = scene
            .instance_descriptions(scene.instance_list())
            .expect("Should describe");

        let plane_vertices = scene.registry().get(plane).expect("Should get").buffers.vertices;
        let cube_vertices = scene.registry().get(cube).expect("Should get").buffers.vertices;
        assert_eq!(descriptions[0].vertex_address, plane_vertices.device_address);
        assert_eq!(descriptions[1].vertex_address, cube_vertices.device_address);

        let upload = allocator
            .uploads()
            .iter()
            .rfind(|u| u.label == DESCRIPTIONS_LABEL)
            .expect("Should upload descriptions");
        assert_eq!(upload.size, 2 * std::mem::size_of::<ObjDesc>() as u64);
    }

    #[test]
    fn test_transforms_follow_tlas_order_every_frame() {
        let (mut scene, mut allocator, cube) = scene_with_cube();
        let mut backend = RecordingBackend::new();
        scene
            .add_static(cube, Mat4::translation(&Vec3::new(3.0, 0.0, 0.0)))
            .expect("Should add");
        let particle = scene
            .spawn_particle(cube, &Mat4::identity(), Vec3::y(), 1.0)
            .expect("Should spawn");

        scene.frame(0.016, &mut allocator, &mut backend).expect("Should run");
        let first = scene.transforms_buffer().expect("Should upload transforms");
        scene.frame(0.016, &mut allocator, &mut backend).expect("Should run");
        let second = scene.transforms_buffer().expect("Should upload transforms");

        assert_ne!(first.id, second.id);
        assert_eq!(second.size, 2 * std::mem::size_of::<InstanceTransform>() as u64);
        let transform_uploads = allocator
            .uploads()
            .iter()
            .filter(|u| u.label == TRANSFORMS_LABEL)
            .count();
        assert_eq!(transform_uploads, 2);

        let transforms = Scene::instance_transforms(scene.instance_list());
        assert_eq!(&transforms[0].matrix[12..15], &[3.0, 0.0, 0.0]);
        let moved = scene.instance(particle).expect("Should get").transform;
        assert_eq!(transforms[1], InstanceTransform::from(&moved));
    }

    #[test]
    fn test_empty_scene_uploads_no_transforms() {
        let (mut scene, mut allocator, cube) = scene_with_cube();
        let mut backend = RecordingBackend::new();
        let only = scene.add_static(cube, Mat4::identity()).expect("Should add");
        scene.frame(0.016, &mut allocator, &mut backend).expect("Should run");
        let live = allocator.live_count();

        scene.remove(only).expect("Should remove");
        scene.frame(0.016, &mut allocator, &mut backend).expect("Should run");

        assert!(scene.transforms_buffer().is_none());
        assert!(scene.descriptions_buffer().is_none());
        assert_eq!(allocator.live_count(), live - 2);
    }

    #[test]
    fn test_backend_failure_skips_frame_and_recovers() {
        let (mut scene, mut allocator, cube) = scene_with_cube();
        let mut backend = RecordingBackend::new();
        scene.add_static(cube, Mat4::identity()).expect("Should add");

        backend.fail_next_tlas("device lost");
        assert!(scene.frame(0.016, &mut allocator, &mut backend).is_err());

        let report = scene.frame(0.016, &mut allocator, &mut backend).expect("Should recover");
        assert_eq!(report.frame, 0);
        assert!(report.descriptions_uploaded);
    }

    #[test]
    fn test_teardown_releases_all_buffers() {
        let (mut scene, mut allocator, cube) = scene_with_cube();
        let mut backend = RecordingBackend::new();
        scene.add_static(cube, Mat4::identity()).expect("Should add");
        scene.frame(0.016, &mut allocator, &mut backend).expect("Should run");
        scene.add_static(cube, Mat4::identity()).expect("Should add");
        scene.frame(0.016, &mut allocator, &mut backend).expect("Should run");

        scene.teardown(&mut allocator);
        assert_eq!(allocator.live_count(), 0);
    }
}
