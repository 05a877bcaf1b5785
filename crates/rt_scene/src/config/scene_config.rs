//! Pipeline configuration structures
//!
//! - **Simulation**: particle gravity bias and resistance
//! - **TLAS**: instance record defaults and build preferences
//! - **Emitter**: ranges for burst-spawned particle directions and speeds
//! - **Scene**: the aggregate loaded by applications

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};

/// Default downward bias subtracted from a particle direction every tick
pub const DEFAULT_GRAVITY: f32 = 0.005;

/// Default fraction of direction magnitude removed every tick
pub const DEFAULT_RESISTANCE: f32 = 0.1;

/// # Simulation Configuration
///
/// Constants of the per-tick particle rule. `gravity` is subtracted from the
/// Y component of the direction before re-normalization, `resistance`
/// shrinks the normalized direction by `(1 - resistance)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Gravity bias coefficient
    pub gravity: f32,
    /// Resistance coefficient in `[0, 1]`
    pub resistance: f32,
}

impl SimulationConfig {
    /// Create a configuration with explicit coefficients
    pub const fn new(gravity: f32, resistance: f32) -> Self {
        Self { gravity, resistance }
    }

    /// Validate the coefficients
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gravity.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "gravity must be finite, got {}",
                self.gravity
            )));
        }
        if !(0.0..=1.0).contains(&self.resistance) {
            return Err(ConfigError::Invalid(format!(
                "resistance must be within [0, 1], got {}",
                self.resistance
            )));
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new(DEFAULT_GRAVITY, DEFAULT_RESISTANCE)
    }
}

/// # TLAS Configuration
///
/// Defaults written into every top-level instance record and the build
/// preferences handed to the acceleration-structure backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlasConfig {
    /// Visibility mask written into every instance (8 bits)
    pub instance_mask: u8,
    /// Hit group offset into the shader binding table (24 bits)
    pub hit_group_offset: u32,
    /// Disable triangle facing culling for every instance
    pub cull_disable: bool,
    /// Ask the backend to favor trace speed over build speed
    pub prefer_fast_trace: bool,
    /// Allow refitting the previous TLAS when the instance count is unchanged
    pub allow_update: bool,
}

impl TlasConfig {
    /// Validate ranges that do not fit the packed record fields
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hit_group_offset > 0x00FF_FFFF {
            return Err(ConfigError::Invalid(format!(
                "hit_group_offset {} does not fit in 24 bits",
                self.hit_group_offset
            )));
        }
        Ok(())
    }
}

impl Default for TlasConfig {
    fn default() -> Self {
        Self {
            instance_mask: 0xFF,
            hit_group_offset: 0,
            cull_disable: true,
            prefer_fast_trace: true,
            allow_update: true,
        }
    }
}

/// # Emitter Configuration
///
/// Uniform ranges sampled when spawning particle bursts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Lower corner of the direction sampling box
    pub direction_min: [f32; 3],
    /// Upper corner of the direction sampling box
    pub direction_max: [f32; 3],
    /// Minimum initial speed
    pub speed_min: f32,
    /// Maximum initial speed
    pub speed_max: f32,
    /// Ticks before a burst particle expires (0 = never)
    pub lifetime_ticks: u32,
}

impl EmitterConfig {
    /// Validate that every range is ordered and finite
    pub fn validate(&self) -> Result<(), ConfigError> {
        for axis in 0..3 {
            let (lo, hi) = (self.direction_min[axis], self.direction_max[axis]);
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(ConfigError::Invalid(format!(
                    "direction range on axis {axis} is invalid: [{lo}, {hi}]"
                )));
            }
        }
        if !self.speed_min.is_finite() || !self.speed_max.is_finite() || self.speed_min > self.speed_max {
            return Err(ConfigError::Invalid(format!(
                "speed range is invalid: [{}, {}]",
                self.speed_min, self.speed_max
            )));
        }
        Ok(())
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            direction_min: [-1.0, 0.5, -1.0],
            direction_max: [1.0, 1.0, 1.0],
            speed_min: 0.05,
            speed_max: 0.2,
            lifetime_ticks: 0,
        }
    }
}

/// # Scene Configuration
///
/// Aggregate configuration for a scene and its driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Default log filter for `env_logger`
    pub log_level: String,
    /// Particle simulation constants
    pub simulation: SimulationConfig,
    /// TLAS record defaults
    pub tlas: TlasConfig,
    /// Burst emitter ranges
    pub emitter: EmitterConfig,
}

impl SceneConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        self.tlas.validate()?;
        self.emitter.validate()
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            simulation: SimulationConfig::default(),
            tlas: TlasConfig::default(),
            emitter: EmitterConfig::default(),
        }
    }
}

impl Config for SceneConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.gravity, 0.005);
        assert_eq!(config.resistance, 0.1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resistance_out_of_range_rejected() {
        let config = SimulationConfig::new(0.005, 1.5);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_hit_group_offset_must_fit_24_bits() {
        let config = TlasConfig {
            hit_group_offset: 0x0100_0000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SceneConfig = toml::from_str(
            r#"
            log_level = "debug"

            [simulation]
            gravity = 0.01
            "#,
        )
        .expect("Should parse partial config");

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.simulation.gravity, 0.01);
        assert_eq!(config.simulation.resistance, DEFAULT_RESISTANCE);
        assert_eq!(config.tlas, TlasConfig::default());
    }

    #[test]
    fn test_ron_config_parses() {
        let config: SceneConfig = ron::from_str(
            "(log_level: \"warn\", simulation: (gravity: 0.0, resistance: 0.0))",
        )
        .expect("Should parse RON config");

        assert_eq!(config.simulation, SimulationConfig::new(0.0, 0.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!("rt_scene_config_{}.toml", std::process::id()));

        let mut config = SceneConfig::default();
        config.simulation.gravity = 0.02;
        config.save_to_file(&path).expect("Should save config");

        let loaded = SceneConfig::load_from_file(&path).expect("Should load config");
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unsupported_extension() {
        let path = std::env::temp_dir().join(format!("rt_scene_config_{}.json", std::process::id()));
        std::fs::write(&path, "{}").expect("Should write temp file");

        let result = SceneConfig::load_from_file(&path);
        let _ = std::fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
