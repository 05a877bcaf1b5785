//! Top-level acceleration structure
//!
//! Every frame the live instance set is flattened into a [`TlasInstanceList`]:
//! one record per instance, in store iteration order, each carrying the
//! instance's world transform and the BLAS of its model. The position of a
//! record in the list is its instance index, which shaders use to look up the
//! per-instance description buffer, so indices are always `0..len` with no
//! gaps.
//!
//! Whether the backend refits the previous TLAS or builds a new one is its
//! own decision; [`TlasBuilder::submit`] only hands it the previous result.

use crate::config::TlasConfig;
use crate::error::{SceneError, SceneResult};
use crate::foundation::math::{Mat4, Mat4Ext};
use crate::gpu::{AccelerationStructureBackend, Blas, BuildFlags, Tlas, TlasBuildMode};

use super::blas::BlasCache;
use super::instance_store::{InstanceHandle, InstanceStore};
use super::model::ModelHandle;

/// One record of the TLAS instance buffer
#[derive(Debug, Clone, PartialEq)]
pub struct TlasInstance {
    /// World transform
    pub transform: Mat4,
    /// BLAS of the instance's model
    pub blas: Blas,
    /// Position in the emitted list, written as the custom index (24 bits)
    pub instance_index: u32,
    /// Model rendered by the instance
    pub model: ModelHandle,
    /// Store handle of the instance the record was built from
    pub source: InstanceHandle,
    /// Visibility mask
    pub mask: u8,
    /// Shader binding table hit group offset (24 bits)
    pub hit_group_offset: u32,
    /// Disable facing culling
    pub cull_disable: bool,
}

impl TlasInstance {
    /// Transform as the row-major 3x4 block of `VkTransformMatrixKHR`
    pub fn row_major_transform(&self) -> [f32; 12] {
        self.transform.to_row_major_3x4()
    }
}

/// Instance records for one TLAS build
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TlasInstanceList {
    instances: Vec<TlasInstance>,
    flags: BuildFlags,
}

impl TlasInstanceList {
    /// Number of records
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True when the list has no records
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Records in instance-index order
    pub fn iter(&self) -> std::slice::Iter<'_, TlasInstance> {
        self.instances.iter()
    }

    /// Records as a slice
    pub fn as_slice(&self) -> &[TlasInstance] {
        &self.instances
    }

    /// Record at `index`
    pub fn get(&self, index: usize) -> Option<&TlasInstance> {
        self.instances.get(index)
    }

    /// Build preferences for the backend
    pub fn build_flags(&self) -> BuildFlags {
        self.flags
    }
}

impl<'a> IntoIterator for &'a TlasInstanceList {
    type Item = &'a TlasInstance;
    type IntoIter = std::slice::Iter<'a, TlasInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.instances.iter()
    }
}

/// Largest instance count whose indices fit the 24-bit custom index field
pub const MAX_TLAS_INSTANCES: usize = 0x00FF_FFFF;

fn check_instance_count(count: usize) -> SceneResult<()> {
    if count > MAX_TLAS_INSTANCES {
        return Err(SceneError::TooManyInstances {
            count,
            max: MAX_TLAS_INSTANCES,
        });
    }
    Ok(())
}

/// Counters for TLAS activity
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TlasStats {
    /// Instance lists produced
    pub rebuilds: u64,
    /// Full builds reported by the backend
    pub builds: u64,
    /// Refits reported by the backend
    pub updates: u64,
}

/// Produces instance lists and tracks the current TLAS
#[derive(Debug, Default)]
pub struct TlasBuilder {
    config: TlasConfig,
    current: Option<Tlas>,
    stats: TlasStats,
}

impl TlasBuilder {
    /// Create a builder writing `config` into every record
    pub fn new(config: TlasConfig) -> Self {
        Self {
            config,
            current: None,
            stats: TlasStats::default(),
        }
    }

    /// Build preferences derived from the configuration
    pub fn build_flags(&self) -> BuildFlags {
        let mut flags = BuildFlags::empty();
        if self.config.prefer_fast_trace {
            flags |= BuildFlags::PREFER_FAST_TRACE;
        }
        if self.config.allow_update {
            flags |= BuildFlags::ALLOW_UPDATE;
        }
        flags
    }

    /// Flatten the live instance set into instance records
    ///
    /// Fails with [`SceneError::MissingBlas`] at the first instance whose
    /// model has no BLAS, and with [`SceneError::TooManyInstances`] when the
    /// store holds more than [`MAX_TLAS_INSTANCES`]; no partial list is
    /// returned.
    pub fn rebuild(&mut self, store: &InstanceStore, cache: &BlasCache) -> SceneResult<TlasInstanceList> {
        check_instance_count(store.len())?;
        let mut instances = Vec::with_capacity(store.len());

        for (handle, instance) in store.iter() {
            let blas = cache.get(instance.model).ok_or(SceneError::MissingBlas {
                model: instance.model,
                instance: handle,
            })?;

            instances.push(TlasInstance {
                transform: instance.transform,
                blas: *blas,
                instance_index: instances.len() as u32,
                model: instance.model,
                source: handle,
                mask: self.config.instance_mask,
                hit_group_offset: self.config.hit_group_offset,
                cull_disable: self.config.cull_disable,
            });
        }

        self.stats.rebuilds += 1;
        log::trace!("Rebuilt TLAS instance list ({} records)", instances.len());

        Ok(TlasInstanceList {
            instances,
            flags: self.build_flags(),
        })
    }

    /// Hand `list` to the backend together with the previous TLAS
    pub fn submit(
        &mut self,
        list: &TlasInstanceList,
        backend: &mut dyn AccelerationStructureBackend,
    ) -> SceneResult<Tlas> {
        let tlas = backend.build_or_update_tlas(list, self.current.as_ref())?;
        match tlas.mode {
            TlasBuildMode::Build => self.stats.builds += 1,
            TlasBuildMode::Update => self.stats.updates += 1,
        }
        self.current = Some(tlas);
        Ok(tlas)
    }

    /// Most recent TLAS
    pub fn current(&self) -> Option<&Tlas> {
        self.current.as_ref()
    }

    /// Builder counters
    pub fn stats(&self) -> TlasStats {
        self.stats
    }

    /// Record configuration
    pub fn config(&self) -> &TlasConfig {
        &self.config
    }

    /// Forget the current TLAS so the next submit builds from scratch
    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::gpu::{RecordingAllocator, RecordingBackend};
    use crate::scene::{Instance, MeshData, ModelRegistry};

    struct Fixture {
        registry: ModelRegistry,
        store: InstanceStore,
        cache: BlasCache,
        backend: RecordingBackend,
        cube: ModelHandle,
    }

    fn fixture() -> Fixture {
        let mut registry = ModelRegistry::new();
        let mut allocator = RecordingAllocator::new();
        let cube = registry.load("cube", &MeshData::cube(1.0), &mut allocator).expect("Should load");
        Fixture {
            registry,
            store: InstanceStore::new(),
            cache: BlasCache::new(),
            backend: RecordingBackend::new(),
            cube,
        }
    }

    #[test]
    fn test_instance_count_limit_matches_24_bit_index() {
        assert!(check_instance_count(0).is_ok());
        assert!(check_instance_count(MAX_TLAS_INSTANCES).is_ok());
        assert!(matches!(
            check_instance_count(MAX_TLAS_INSTANCES + 1),
            Err(SceneError::TooManyInstances { count, max }) if count == max + 1
        ));

        let last_index = (MAX_TLAS_INSTANCES - 1) as u32;
        assert_eq!(ash::vk::Packed24_8::new(last_index, 0xFF).low_24(), last_index);
    }

    #[test]
    fn test_one_record_per_live_instance_with_compact_indices() {
        let mut f = fixture();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                f.store.add(Instance::new_static(
                    f.cube,
                    Mat4::translation(&Vec3::new(i as f32, 0.0, 0.0)),
                ))
            })
            .collect();
        f.store.remove(handles[1]).expect("Should remove");
        f.cache
            .build_referenced(&f.store, &f.registry, &mut f.backend, BuildFlags::empty())
            .expect("Should build");

        let mut builder = TlasBuilder::new(TlasConfig::default());
        let list = builder.rebuild(&f.store, &f.cache).expect("Should rebuild");

        assert_eq!(list.len(), f.store.len());
        let indices: Vec<u32> = list.iter().map(|r| r.instance_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        let sources: Vec<_> = list.iter().map(|r| r.source).collect();
        assert_eq!(sources, vec![handles[0], handles[2], handles[3]]);
        assert_eq!(list.get(1).map(|r| r.transform.translation_part().x), Some(2.0));
    }

    #[test]
    fn test_records_use_configured_defaults() {
        let mut f = fixture();
        f.store.add(Instance::new_static(f.cube, Mat4::identity()));
        f.cache
            .build_referenced(&f.store, &f.registry, &mut f.backend, BuildFlags::empty())
            .expect("Should build");

        let config = TlasConfig {
            instance_mask: 0x0F,
            hit_group_offset: 2,
            cull_disable: false,
            prefer_fast_trace: false,
            allow_update: false,
        };
        let mut builder = TlasBuilder::new(config);
        let list = builder.rebuild(&f.store, &f.cache).expect("Should rebuild");
        let record = list.get(0).expect("Should have a record");

        assert_eq!(record.mask, 0x0F);
        assert_eq!(record.hit_group_offset, 2);
        assert!(!record.cull_disable);
        assert_eq!(Some(&record.blas), f.cache.get(f.cube));
        assert!(list.build_flags().is_empty());
    }

    #[test]
    fn test_missing_blas_fails_the_rebuild() {
        let mut f = fixture();
        let handle = f.store.add(Instance::new_static(f.cube, Mat4::identity()));

        let mut builder = TlasBuilder::new(TlasConfig::default());
        match builder.rebuild(&f.store, &f.cache) {
            Err(SceneError::MissingBlas { model, instance }) => {
                assert_eq!(model, f.cube);
                assert_eq!(instance, handle);
            }
            other => panic!("Expected MissingBlas, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_store_gives_empty_list() {
        let f = fixture();
        let mut builder = TlasBuilder::new(TlasConfig::default());
        let list = builder.rebuild(&f.store, &f.cache).expect("Should rebuild");
        assert!(list.is_empty());
    }

    #[test]
    fn test_submit_refits_when_count_is_unchanged() {
        let mut f = fixture();
        f.store.add(Instance::new_static(f.cube, Mat4::identity()));
        f.cache
            .build_referenced(&f.store, &f.registry, &mut f.backend, BuildFlags::empty())
            .expect("Should build");
        let mut builder = TlasBuilder::new(TlasConfig::default());

        let list = builder.rebuild(&f.store, &f.cache).expect("Should rebuild");
        let first = builder.submit(&list, &mut f.backend).expect("Should build");
        let list = builder.rebuild(&f.store, &f.cache).expect("Should rebuild");
        let second = builder.submit(&list, &mut f.backend).expect("Should refit");

        assert_eq!(first.mode, TlasBuildMode::Build);
        assert_eq!(second.mode, TlasBuildMode::Update);
        assert_eq!(second.id, first.id);

        f.store.add(Instance::new_static(f.cube, Mat4::identity()));
        let list = builder.rebuild(&f.store, &f.cache).expect("Should rebuild");
        let third = builder.submit(&list, &mut f.backend).expect("Should build");

        assert_eq!(third.mode, TlasBuildMode::Build);
        assert_eq!(builder.stats().builds, 2);
        assert_eq!(builder.stats().updates, 1);
        assert_eq!(builder.current(), Some(&third));
    }
}
