//! Per-instance transform update rules
//!
//! An instance is either static or a particle, fixed at creation. Particles
//! follow the gravity-bias and drag rule each tick:
//!
//! 1. `direction = normalize(direction - (0, gravity, 0))`
//! 2. `direction *= 1 - resistance`
//! 3. `transform = transform * translation(direction * speed)`
//!
//! Gravity only biases the direction before re-normalization, and resistance
//! shrinks the stored direction after it, so every step covers
//! `(1 - resistance) * speed` along the biased direction.
//! The update is a per-tick rule; the frame delta is accepted but not used to
//! scale the step.

use crate::config::SimulationConfig;
use crate::error::{SceneError, SceneResult};
use crate::foundation::math::{Mat4, Mat4Ext, Vec3, Vec4};

/// Motion state of a particle instance
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleState {
    /// Current direction; its magnitude carries the drag decay
    pub direction: Vec3,
    /// Scalar speed multiplier
    pub speed: f32,
    /// Homogeneous position, the transform applied to the local origin
    pub position: Vec4,
    /// Ticks before the particle expires, 0 for no expiry
    pub lifetime_ticks: u32,
    /// Ticks simulated so far
    pub age: u32,
}

impl ParticleState {
    /// State for a particle starting at `transform`
    pub fn new(transform: &Mat4, direction: Vec3, speed: f32) -> Self {
        Self {
            direction,
            speed,
            position: transform.origin(),
            lifetime_ticks: 0,
            age: 0,
        }
    }

    /// True once the particle has lived its full lifetime
    pub fn is_expired(&self) -> bool {
        self.lifetime_ticks > 0 && self.age >= self.lifetime_ticks
    }

    /// Advance one tick, concatenating the step onto `transform`
    ///
    /// Returns the applied translation. A zero-length biased direction
    /// leaves the transform untouched and reports
    /// [`SceneError::DegenerateDirection`].
    pub fn step(&mut self, transform: &mut Mat4, config: &SimulationConfig) -> SceneResult<Vec3> {
        self.age = self.age.saturating_add(1);

        let biased = self.direction - Vec3::new(0.0, config.gravity, 0.0);
        let Some(unit) = biased.try_normalize(f32::EPSILON) else {
            self.direction = biased;
            self.position = transform.origin();
            return Err(SceneError::DegenerateDirection);
        };

        self.direction = unit * (1.0 - config.resistance);

        let translation = self.direction * self.speed;
        *transform *= Mat4::translation(&translation);
        self.position = transform.origin();

        Ok(translation)
    }
}

/// Closed set of instance update rules
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InstanceBehavior {
    /// Transform is set once and never updated
    #[default]
    Static,
    /// Gravity and drag integration every tick
    Particle(ParticleState),
}

impl InstanceBehavior {
    /// Apply this behavior's rule to `transform`
    ///
    /// Returns the translation applied this tick, zero for static instances.
    pub fn update(
        &mut self,
        transform: &mut Mat4,
        config: &SimulationConfig,
        _dt: f32,
    ) -> SceneResult<Vec3> {
        match self {
            Self::Static => Ok(Vec3::zeros()),
            Self::Particle(state) => state.step(transform, config),
        }
    }

    /// True for particles
    pub fn is_particle(&self) -> bool {
        matches!(self, Self::Particle(_))
    }

    /// Particle state, if any
    pub fn particle(&self) -> Option<&ParticleState> {
        match self {
            Self::Particle(state) => Some(state),
            Self::Static => None,
        }
    }

    /// True when a particle has outlived its lifetime
    pub fn is_expired(&self) -> bool {
        self.particle().is_some_and(ParticleState::is_expired)
    }
}
