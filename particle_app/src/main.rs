//! Particle demo driver
//!
//! Runs the acceleration-structure pipeline headless: a ground plane and a
//! few static cubes, plus bursts of cube particles falling under the
//! gravity/drag rule. Each frame is built against the in-memory collaborators
//! and summarized in the log.
//!
//! Usage: `particle_demo [config.toml|config.ron]`

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rt_scene::config::{Config, ConfigError, SceneConfig};
use rt_scene::foundation::logging;
use rt_scene::foundation::math::{Mat4, Mat4Ext, Transform, Vec3};
use rt_scene::gpu::{vulkan, RecordingAllocator, RecordingBackend};
use rt_scene::scene::{MeshData, ModelHandle, Scene};
use rt_scene::SceneError;

/// Demo configuration: the scene plus how the driver exercises it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct DemoConfig {
    /// Pipeline configuration
    scene: SceneConfig,
    /// Frames to run
    frames: u32,
    /// Frames between particle bursts
    burst_interval: u32,
    /// Particles per burst
    burst_size: usize,
    /// Height the bursts are emitted from
    emitter_height: f32,
    /// Seed for burst sampling
    seed: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            scene: SceneConfig::default(),
            frames: 240,
            burst_interval: 30,
            burst_size: 3,
            emitter_height: 2.0,
            seed: 0x5eed,
        }
    }
}

impl Config for DemoConfig {}

/// Errors that stop the demo
#[derive(Error, Debug)]
enum AppError {
    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline setup failed
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
}

struct ParticleApp {
    config: DemoConfig,
    scene: Scene,
    allocator: RecordingAllocator,
    backend: RecordingBackend,
    rng: StdRng,
    particle_model: ModelHandle,
    skipped_frames: u32,
}

impl ParticleApp {
    fn new(config: DemoConfig) -> Result<Self, AppError> {
        let mut allocator = RecordingAllocator::new();
        let mut scene = Scene::new(&config.scene)?;

        let ground = scene.load_model("plane", &MeshData::plane(20.0), &mut allocator)?;
        let cube = scene.load_model("cube", &MeshData::cube(0.5), &mut allocator)?;
        let particle_model = scene.load_model("particle", &MeshData::cube(0.05), &mut allocator)?;

        scene.add_static(ground, Mat4::identity())?;
        for x in [-4.0, 0.0, 4.0] {
            let placement = Transform::from_position(Vec3::new(x, 0.5, -3.0)).with_uniform_scale(0.75);
            scene.add_static(cube, placement.to_matrix())?;
        }

        log::info!(
            "Scene ready: {} models, {} static instances",
            scene.registry().len(),
            scene.store().len()
        );

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            scene,
            allocator,
            backend: RecordingBackend::new(),
            particle_model,
            skipped_frames: 0,
        })
    }

    fn run(&mut self) {
        let dt = 1.0 / 60.0;
        let origin = Mat4::translation(&Vec3::new(0.0, self.config.emitter_height, 0.0));

        for frame in 0..self.config.frames {
            if self.config.burst_interval > 0 && frame % self.config.burst_interval == 0 {
                if let Err(e) = self.scene.queue_particle_burst(
                    self.particle_model,
                    &origin,
                    self.config.burst_size,
                    &mut self.rng,
                ) {
                    log::error!("Burst rejected: {}", e);
                }
            }

            match self.scene.frame(dt, &mut self.allocator, &mut self.backend) {
                Ok(report) => {
                    if report.spawned > 0 || report.removed > 0 || report.step.degenerate > 0 {
                        let records = vulkan::tlas_instance_records(self.scene.instance_list());
                        log::info!(
                            "Frame {}: {} instances (+{} -{}), {:?} TLAS, {} bytes of instance records",
                            report.frame,
                            report.instance_count,
                            report.spawned,
                            report.removed,
                            report.tlas.mode,
                            std::mem::size_of_val(records.as_slice())
                        );
                    } else {
                        log::debug!("Frame {}: {:?}", report.frame, report);
                    }
                }
                Err(e) => {
                    self.skipped_frames += 1;
                    log::error!("Frame skipped: {}", e);
                }
            }
        }
    }

    fn shutdown(mut self) {
        let stats = self.scene.simulation().stats();
        let tlas = self.scene.tlas_builder().stats();
        log::info!(
            "Ran {} ticks: {} particle updates, {} degenerate, {} rolled back, {} frames skipped",
            stats.ticks,
            stats.particle_updates,
            stats.degenerate_ticks,
            stats.skipped_updates,
            self.skipped_frames
        );
        log::info!(
            "BLAS built: {}, TLAS builds: {}, TLAS refits: {}, peak instances: {}",
            self.backend.blas_built(),
            tlas.builds,
            tlas.updates,
            self.scene.store().stats().peak_live
        );

        self.scene.teardown(&mut self.allocator);
        if self.allocator.live_count() != 0 {
            log::warn!("{} buffers still live after teardown", self.allocator.live_count());
        }
    }
}

fn load_config() -> Result<DemoConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => DemoConfig::load_from_file(&path),
        None => Ok(DemoConfig::default()),
    }
}

fn main() -> Result<(), AppError> {
    let config = load_config()?;
    logging::init_with_level(&config.scene.log_level);

    log::info!("Starting particle demo ({} frames)", config.frames);

    let mut app = ParticleApp::new(config)?;
    app.run();
    app.shutdown();

    log::info!("Particle demo finished");
    Ok(())
}
