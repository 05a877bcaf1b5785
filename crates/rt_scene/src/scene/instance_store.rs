//! Instance storage
//!
//! Instances live in a [`SlotMap`]; an [`InstanceHandle`] carries the slot
//! index and its generation, so a handle to a removed instance is detected
//! even after the slot is reused. A separate order list keeps iteration in
//! insertion order, which the TLAS instance indices depend on.

use slotmap::{new_key_type, SlotMap};

use crate::error::{SceneError, SceneResult};

use super::instance::Instance;

new_key_type! {
    /// Generation-checked handle of a live instance
    pub struct InstanceHandle;
}

/// Counters for store activity
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Instances added over the store's lifetime
    pub added: u64,
    /// Instances removed over the store's lifetime
    pub removed: u64,
    /// Highest simultaneous live count
    pub peak_live: usize,
}

/// Owner of every scene instance
#[derive(Debug, Default)]
pub struct InstanceStore {
    instances: SlotMap<InstanceHandle, Instance>,
    order: Vec<InstanceHandle>,
    stats: StoreStats,
}

impl InstanceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an instance at the end of the iteration order
    pub fn add(&mut self, instance: Instance) -> InstanceHandle {
        let handle = self.instances.insert(instance);
        self.order.push(handle);

        self.stats.added += 1;
        self.stats.peak_live = self.stats.peak_live.max(self.instances.len());
        log::trace!("Added instance {:?}", handle);
        handle
    }

    /// Remove an instance, returning it
    pub fn remove(&mut self, handle: InstanceHandle) -> SceneResult<Instance> {
        let instance = self
            .instances
            .remove(handle)
            .ok_or(SceneError::StaleHandle { handle })?;
        if let Some(position) = self.order.iter().position(|&h| h == handle) {
            self.order.remove(position);
        }

        self.stats.removed += 1;
        log::trace!("Removed instance {:?}", handle);
        Ok(instance)
    }

    /// Instance behind `handle`
    pub fn get(&self, handle: InstanceHandle) -> SceneResult<&Instance> {
        self.instances
            .get(handle)
            .ok_or(SceneError::StaleHandle { handle })
    }

    /// Mutable instance behind `handle`
    pub fn get_mut(&mut self, handle: InstanceHandle) -> SceneResult<&mut Instance> {
        self.instances
            .get_mut(handle)
            .ok_or(SceneError::StaleHandle { handle })
    }

    /// True while `handle` refers to a live instance
    pub fn contains(&self, handle: InstanceHandle) -> bool {
        self.instances.contains_key(handle)
    }

    /// Visit every live instance in insertion order
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(InstanceHandle, &Instance),
    {
        for (handle, instance) in self.iter() {
            visitor(handle, instance);
        }
    }

    /// Visit every live instance mutably in insertion order
    ///
    /// The visitor cannot add or remove instances; requests raised during the
    /// pass go through the scene's command queue.
    pub fn for_each_mut<F>(&mut self, mut visitor: F)
    where
        F: FnMut(InstanceHandle, &mut Instance),
    {
        for &handle in &self.order {
            if let Some(instance) = self.instances.get_mut(handle) {
                visitor(handle, instance);
            }
        }
    }

    /// Live instances in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (InstanceHandle, &Instance)> {
        self.order
            .iter()
            .filter_map(|&handle| self.instances.get(handle).map(|instance| (handle, instance)))
    }

    /// Handles in insertion order
    pub fn handles(&self) -> &[InstanceHandle] {
        &self.order
    }

    /// Number of live instances
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True when no instance is live
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Remove every instance; all outstanding handles become stale
    pub fn clear(&mut self) {
        let count = self.instances.len();
        self.instances.clear();
        self.order.clear();
        self.stats.removed += count as u64;
        log::debug!("Cleared {} instances", count);
    }

    /// Store counters
    pub fn stats(&self) -> StoreStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
    use crate::scene::ModelHandle;

    fn at(x: f32) -> Instance {
        Instance::new_static(ModelHandle::new(0), Mat4::translation(&Vec3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn test_add_and_get() {
        let mut store = InstanceStore::new();
        let handle = store.add(at(1.0));

        let instance = store.get(handle).expect("Should get instance");
        assert_eq!(instance.transform.translation_part().x, 1.0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_after_remove_is_stale() {
        let mut store = InstanceStore::new();
        let handle = store.add(at(1.0));
        store.remove(handle).expect("Should remove");

        assert!(matches!(store.get(handle), Err(SceneError::StaleHandle { .. })));
        assert!(matches!(store.get_mut(handle), Err(SceneError::StaleHandle { .. })));
        assert!(matches!(store.remove(handle), Err(SceneError::StaleHandle { .. })));
    }

    #[test]
    fn test_reused_slot_does_not_revive_old_handle() {
        let mut store = InstanceStore::new();
        let old = store.add(at(1.0));
        store.remove(old).expect("Should remove");
        let new = store.add(at(2.0));

        assert_ne!(old, new);
        assert!(store.get(old).is_err());
        assert_eq!(store.get(new).expect("Should get").transform.translation_part().x, 2.0);
    }

    #[test]
    fn test_iteration_follows_insertion_order() {
        let mut store = InstanceStore::new();
        let a = store.add(at(1.0));
        let b = store.add(at(2.0));
        let c = store.add(at(3.0));
        store.remove(b).expect("Should remove");
        let d = store.add(at(4.0));

        let mut visited = Vec::new();
        store.for_each(|handle, _| visited.push(handle));
        assert_eq!(visited, vec![a, c, d]);
        assert_eq!(store.handles(), &[a, c, d]);
    }

    #[test]
    fn test_for_each_mut_updates_in_place() {
        let mut store = InstanceStore::new();
        let a = store.add(at(0.0));
        let b = store.add(at(0.0));

        store.for_each_mut(|_, instance| {
            instance.transform *= Mat4::translation(&Vec3::new(1.0, 0.0, 0.0));
        });

        for handle in [a, b] {
            let x = store.get(handle).expect("Should get").transform.translation_part().x;
            assert_eq!(x, 1.0);
        }
    }

    #[test]
    fn test_clear_invalidates_everything() {
        let mut store = InstanceStore::new();
        let handles: Vec<_> = (0..4).map(|i| store.add(at(i as f32))).collect();
        store.clear();

        assert!(store.is_empty());
        assert!(handles.iter().all(|&h| !store.contains(h)));
        assert_eq!(store.stats().peak_live, 4);
        assert_eq!(store.stats().removed, 4);
    }
}
