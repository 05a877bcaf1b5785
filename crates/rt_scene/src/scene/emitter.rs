//! Particle bursts
//!
//! Spawns a batch of particles of one template model, each with a direction
//! and speed drawn uniformly from the configured ranges.

use rand::Rng;

use crate::config::{ConfigError, EmitterConfig};
use crate::foundation::math::{Mat4, Vec3};

use super::instance::Instance;
use super::model::ModelHandle;

/// Samples particle parameters from an [`EmitterConfig`]
#[derive(Debug, Clone)]
pub struct ParticleEmitter {
    config: EmitterConfig,
}

impl ParticleEmitter {
    /// Create an emitter; the ranges must be ordered and finite
    pub fn new(config: EmitterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Sampling ranges
    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// Draw one direction and speed
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> (Vec3, f32) {
        let c = &self.config;
        let direction = Vec3::new(
            rng.gen_range(c.direction_min[0]..=c.direction_max[0]),
            rng.gen_range(c.direction_min[1]..=c.direction_max[1]),
            rng.gen_range(c.direction_min[2]..=c.direction_max[2]),
        );
        let speed = rng.gen_range(c.speed_min..=c.speed_max);
        (direction, speed)
    }

    /// `count` particles of `model` starting at `origin`
    pub fn burst<R: Rng + ?Sized>(
        &self,
        model: ModelHandle,
        origin: &Mat4,
        count: usize,
        rng: &mut R,
    ) -> Vec<Instance> {
        (0..count)
            .map(|_| {
                let (direction, speed) = self.sample(rng);
                Instance::new_particle(model, *origin, direction, speed)
                    .with_lifetime(self.config.lifetime_ticks)
            })
            .collect()
    }
}
