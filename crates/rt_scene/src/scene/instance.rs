//! Scene instances

use crate::config::SimulationConfig;
use crate::error::{SceneError, SceneResult};
use crate::foundation::math::{is_finite_vec3, Mat4, Vec3};

use super::behavior::{InstanceBehavior, ParticleState};
use super::model::ModelHandle;

/// A model placed in world space
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// World transform
    pub transform: Mat4,
    /// Model rendered by this instance
    pub model: ModelHandle,
    /// Update rule, fixed at creation
    pub behavior: InstanceBehavior,
}

impl Instance {
    /// Instance whose transform never changes
    pub fn new_static(model: ModelHandle, transform: Mat4) -> Self {
        Self {
            transform,
            model,
            behavior: InstanceBehavior::Static,
        }
    }

    /// Particle starting at `transform`
    pub fn new_particle(model: ModelHandle, transform: Mat4, direction: Vec3, speed: f32) -> Self {
        let state = ParticleState::new(&transform, direction, speed);
        Self {
            transform,
            model,
            behavior: InstanceBehavior::Particle(state),
        }
    }

    /// Particle that expires after `ticks` simulation ticks, 0 for never
    pub fn with_lifetime(mut self, ticks: u32) -> Self {
        if let InstanceBehavior::Particle(state) = &mut self.behavior {
            state.lifetime_ticks = ticks;
        }
        self
    }

    /// Reject particles whose parameters would poison the transform
    pub fn validate(&self) -> SceneResult<()> {
        if !self.transform.iter().all(|c| c.is_finite()) {
            return Err(SceneError::InvalidSpawn(
                "transform has non-finite components".to_string(),
            ));
        }
        if let Some(state) = self.behavior.particle() {
            if !is_finite_vec3(&state.direction) {
                return Err(SceneError::InvalidSpawn(format!(
                    "direction {:?} is not finite",
                    state.direction
                )));
            }
            if !state.speed.is_finite() {
                return Err(SceneError::InvalidSpawn(format!(
                    "speed {} is not finite",
                    state.speed
                )));
            }
        }
        Ok(())
    }

    /// Advance this instance by one tick
    pub fn update(&mut self, config: &SimulationConfig, dt: f32) -> SceneResult<Vec3> {
        self.behavior.update(&mut self.transform, config, dt)
    }

    /// True for particles
    pub fn is_particle(&self) -> bool {
        self.behavior.is_particle()
    }

    /// True when a particle has outlived its lifetime
    pub fn is_expired(&self) -> bool {
        self.behavior.is_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4Ext, Vec4};
    use approx::assert_relative_eq;

    #[test]
    fn test_particle_position_starts_at_transform_origin() {
        let transform = Mat4::translation(&Vec3::new(0.0, 10.0, 0.0));
        let instance = Instance::new_particle(ModelHandle::new(0), transform, Vec3::y(), 0.1);

        let state = instance.behavior.particle().expect("Should be a particle");
        assert_relative_eq!(state.position, Vec4::new(0.0, 10.0, 0.0, 1.0));
    }

    #[test]
    fn test_update_moves_only_particles() {
        let config = SimulationConfig::default();
        let mut fixed = Instance::new_static(ModelHandle::new(0), Mat4::identity());
        let mut moving = Instance::new_particle(ModelHandle::new(0), Mat4::identity(), Vec3::y(), 1.0);

        fixed.update(&config, 0.016).expect("Should update");
        moving.update(&config, 0.016).expect("Should update");

        assert_eq!(fixed.transform, Mat4::identity());
        assert_relative_eq!(moving.transform.translation_part(), Vec3::new(0.0, 0.9, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_lifetime_only_applies_to_particles() {
        let fixed = Instance::new_static(ModelHandle::new(0), Mat4::identity()).with_lifetime(3);
        assert_eq!(fixed.behavior, InstanceBehavior::Static);

        let particle = Instance::new_particle(ModelHandle::new(0), Mat4::identity(), Vec3::y(), 1.0)
            .with_lifetime(3);
        assert_eq!(particle.behavior.particle().map(|s| s.lifetime_ticks), Some(3));
    }

    #[test]
    fn test_validate_rejects_non_finite_parameters() {
        let model = ModelHandle::new(0);
        let nan_dir = Instance::new_particle(model, Mat4::identity(), Vec3::new(f32::NAN, 0.0, 0.0), 1.0);
        let inf_speed = Instance::new_particle(model, Mat4::identity(), Vec3::y(), f32::INFINITY);
        let ok = Instance::new_particle(model, Mat4::identity(), Vec3::zeros(), 0.0);

        assert!(matches!(nan_dir.validate(), Err(SceneError::InvalidSpawn(_))));
        assert!(matches!(inf_speed.validate(), Err(SceneError::InvalidSpawn(_))));
        assert!(ok.validate().is_ok());
    }
}
