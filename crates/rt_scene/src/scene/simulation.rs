//! Simulation pass
//!
//! Runs every instance's behavior once per frame. A failure in one instance
//! is contained: the instance, transform and particle state alike, is left as
//! it was before the tick and the pass moves on. Expired particles are queued for removal, not removed, since the
//! store is borrowed for the whole pass.

use crate::config::SimulationConfig;
use crate::error::SceneError;

use super::commands::CommandQueue;
use super::instance_store::InstanceStore;

/// Outcome of one pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    /// Particles whose transform was advanced
    pub updated: usize,
    /// Particles whose direction was degenerate; they did not move
    pub degenerate: usize,
    /// Instances whose update failed and was rolled back
    pub skipped: usize,
    /// Particles queued for removal after outliving their lifetime
    pub expired: usize,
}

/// Counters accumulated over every pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimulationStats {
    /// Passes run
    pub ticks: u64,
    /// Particle updates applied
    pub particle_updates: u64,
    /// Degenerate-direction ticks
    pub degenerate_ticks: u64,
    /// Rolled-back updates
    pub skipped_updates: u64,
}

/// Per-frame behavior driver
#[derive(Debug, Default)]
pub struct Simulation {
    config: SimulationConfig,
    stats: SimulationStats,
}

impl Simulation {
    /// Create a simulation with the given constants
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            stats: SimulationStats::default(),
        }
    }

    /// Simulation constants
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replace the simulation constants
    pub fn set_config(&mut self, config: SimulationConfig) {
        self.config = config;
    }

    /// Accumulated counters
    pub fn stats(&self) -> SimulationStats {
        self.stats
    }

    /// Advance every instance by one tick, in store order
    pub fn step(&mut self, store: &mut InstanceStore, queue: &mut CommandQueue, dt: f32) -> StepReport {
        let config = self.config;
        let mut report = StepReport::default();

        store.for_each_mut(|handle, instance| {
            if !instance.is_particle() {
                return;
            }

            let previous = instance.clone();
            match instance.update(&config, dt) {
                Ok(_) if instance.transform.iter().all(|c| c.is_finite()) => {
                    report.updated += 1;
                }
                Ok(_) => {
                    log::warn!("Instance {:?} produced a non-finite transform; skipped", handle);
                    *instance = previous;
                    report.skipped += 1;
                }
                Err(SceneError::DegenerateDirection) => {
                    log::trace!("Instance {:?} has a degenerate direction; not moved", handle);
                    report.degenerate += 1;
                }
                Err(err) => {
                    log::warn!("Instance {:?} update failed: {}", handle, err);
                    *instance = previous;
                    report.skipped += 1;
                }
            }

            if instance.is_expired() {
                queue.remove(handle);
                report.expired += 1;
            }
        });

        self.stats.ticks += 1;
        self.stats.particle_updates += report.updated as u64;
        self.stats.degenerate_ticks += report.degenerate as u64;
        self.stats.skipped_updates += report.skipped as u64;

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
    use crate::scene::{Instance, ModelHandle};
    use approx::assert_relative_eq;

    const MODEL: ModelHandle = ModelHandle::new(0);

    #[test]
    fn test_static_instances_are_untouched() {
        let mut store = InstanceStore::new();
        let mut queue = CommandQueue::new();
        let fixed = store.add(Instance::new_static(MODEL, Mat4::translation(&Vec3::new(1.0, 2.0, 3.0))));
        let mut simulation = Simulation::default();

        let report = simulation.step(&mut store, &mut queue, 0.016);

        assert_eq!(report, StepReport::default());
        assert_relative_eq!(
            store.get(fixed).expect("Should get").transform.translation_part(),
            Vec3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn test_particles_advance() {
        let mut store = InstanceStore::new();
        let mut queue = CommandQueue::new();
        let particle = store.add(Instance::new_particle(MODEL, Mat4::identity(), Vec3::y(), 1.0));
        let mut simulation = Simulation::new(SimulationConfig::default());

        let report = simulation.step(&mut store, &mut queue, 0.016);

        assert_eq!(report.updated, 1);
        assert_relative_eq!(
            store.get(particle).expect("Should get").transform.translation_part(),
            Vec3::new(0.0, 0.9, 0.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_degenerate_particle_does_not_disturb_others() {
        let config = SimulationConfig::default();
        let mut store = InstanceStore::new();
        let mut queue = CommandQueue::new();
        let stuck = store.add(Instance::new_particle(
            MODEL,
            Mat4::identity(),
            Vec3::new(0.0, config.gravity, 0.0),
            1.0,
        ));
        let moving = store.add(Instance::new_particle(MODEL, Mat4::identity(), Vec3::x(), 1.0));
        let mut simulation = Simulation::new(config);

        let report = simulation.step(&mut store, &mut queue, 0.016);

        assert_eq!(report.degenerate, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(store.get(stuck).expect("Should get").transform, Mat4::identity());
        assert!(store.get(moving).expect("Should get").transform.translation_part().x > 0.0);
        assert_eq!(simulation.stats().degenerate_ticks, 1);
    }

    #[test]
    fn test_overflowing_particle_is_rolled_back() {
        let mut store = InstanceStore::new();
        let mut queue = CommandQueue::new();
        let start = Mat4::translation(&Vec3::new(f32::MAX, 0.0, 0.0));
        let runaway = store.add(Instance::new_particle(MODEL, start, Vec3::x(), f32::MAX));
        let mut simulation = Simulation::default();

        let report = simulation.step(&mut store, &mut queue, 0.016);

        assert_eq!(report.skipped, 1);
        assert_eq!(store.get(runaway).expect("Should get").transform, start);
    }

    #[test]
    fn test_rollback_restores_particle_state() {
        let mut store = InstanceStore::new();
        let mut queue = CommandQueue::new();
        let start = Mat4::translation(&Vec3::new(f32::MAX, 0.0, 0.0));
        let spawned = Instance::new_particle(MODEL, start, Vec3::x(), f32::MAX);
        let runaway = store.add(spawned.clone());
        let mut simulation = Simulation::default();

        simulation.step(&mut store, &mut queue, 0.016);

        let instance = store.get(runaway).expect("Should get");
        let state = instance.behavior.particle().expect("Should be a particle");
        assert_eq!(state.position, instance.transform.origin());
        assert_eq!(state.direction, Vec3::x());
        assert_eq!(state.age, 0);
        assert_eq!(*instance, spawned);
    }

    #[test]
    fn test_expired_particles_are_queued_not_removed() {
        let mut store = InstanceStore::new();
        let mut queue = CommandQueue::new();
        let short = store.add(
            Instance::new_particle(MODEL, Mat4::identity(), Vec3::y(), 0.1).with_lifetime(1),
        );
        let mut simulation = Simulation::default();

        let report = simulation.step(&mut store, &mut queue, 0.016);

        assert_eq!(report.expired, 1);
        assert!(store.contains(short));
        assert_eq!(queue.len(), 1);
    }
}
