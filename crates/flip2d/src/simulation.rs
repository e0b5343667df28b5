//! Frame driver for the 2D FLIP solver.
//!
//! Algorithm, one full barrier between steps:
//! 1. Clear grid, classify walls and the obstacle
//! 2. Integrate particles (gravity, advection, obstacle response)
//! 3. Build per-cell particle lists
//! 4. Splat particle velocities to the grid (P2G)
//! 5. Normalise, snapshot the FLIP baseline, apply walls, estimate density
//! 6. Separate particles
//! 7. Pressure projection (red/black SOR)
//! 8. Gather grid velocities back to particles (G2P)
//!
//! Input from the application (obstacle drags, config edits, resets,
//! emission) is buffered and applied at the start of the next frame, so a
//! frame always sees one consistent snapshot.

use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::calibration::measure_rest_density;
use crate::config::{ConfigError, GridResolution, InteractionMode, SimulationConfig};
use crate::constants::DIAGNOSTIC_INTERVAL;
use crate::diagnostics::FrameStats;
use crate::grid::{Grid, GridCell};
use crate::interaction;
use crate::neighbor;
use crate::particle::{Particle, ParticlePool};
use crate::pressure::{self, PressureParams};
use crate::scenario::{Scenario, ScenarioSource};
use crate::transfer;

#[derive(Clone, Copy, Debug)]
struct PointerInput {
    position: Vec2,
    dragging: bool,
}

/// Input collected between frames.
#[derive(Default)]
struct PendingInput {
    config: Option<SimulationConfig>,
    pointer: Option<PointerInput>,
    shake: bool,
    reset: Option<Box<dyn ScenarioSource>>,
    emits: Vec<Vec2>,
}

/// 2D PIC/FLIP liquid simulation
pub struct FlipSimulation {
    pub grid: Grid,
    pub particles: ParticlePool,
    config: SimulationConfig,
    scenario: Box<dyn ScenarioSource>,
    rng: ChaCha8Rng,
    /// Measured rest density, 0 until calibration has run
    calibrated_density: f32,
    frame: u64,
    frames_since_reset: u32,
    /// Last pointer position while dragging
    drag_anchor: Option<Vec2>,
    pending: PendingInput,
    /// Dedicated worker pool; `None` runs on the global rayon pool
    workers: Option<ThreadPool>,
    stats: FrameStats,
}

impl FlipSimulation {
    /// Simulation with a `capacity`-particle pool, filled with the default
    /// scenario.
    pub fn new(config: SimulationConfig, capacity: usize) -> Result<Self, ConfigError> {
        Self::with_scenario(config, capacity, Scenario::default())
    }

    pub fn with_scenario(
        config: SimulationConfig,
        capacity: usize,
        scenario: impl ScenarioSource + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate(capacity)?;

        let mut sim = Self {
            grid: Grid::from_config(&config),
            particles: ParticlePool::with_capacity(capacity),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            scenario: Box::new(scenario),
            calibrated_density: 0.0,
            frame: 0,
            frames_since_reset: 0,
            drag_anchor: None,
            pending: PendingInput::default(),
            workers: None,
            stats: FrameStats::default(),
        };
        sim.reset_now();
        Ok(sim)
    }

    /// Run frames on a dedicated pool of `threads` workers (0 = global
    /// pool). With one worker every frame is bit-for-bit reproducible.
    pub fn with_worker_threads(mut self, threads: usize) -> Result<Self, ConfigError> {
        self.workers = if threads == 0 {
            None
        } else {
            Some(ThreadPoolBuilder::new().num_threads(threads).build()?)
        };
        Ok(self)
    }

    // ------------------------------------------------------------------------
    // Input (applied at the next frame boundary)
    // ------------------------------------------------------------------------

    /// Queue a new parameter snapshot. Rejected snapshots leave the queue
    /// untouched. A changed grid resolution or cell size re-provisions the
    /// grid and re-runs the current scenario.
    ///
    /// The obstacle position keeps following `set_obstacle`.
    pub fn set_config(&mut self, config: SimulationConfig) -> Result<(), ConfigError> {
        if let Err(err) = config.validate(self.particles.capacity()) {
            log::warn!("Rejected config snapshot: {}", err);
            return Err(err);
        }
        self.pending.config = Some(config);
        Ok(())
    }

    /// Change the grid resolution, keeping every other parameter.
    pub fn resize(&mut self, resolution: GridResolution) -> Result<(), ConfigError> {
        let mut config = self.pending.config.clone().unwrap_or_else(|| self.config.clone());
        config.resolution = resolution;
        self.set_config(config)
    }

    /// Move the obstacle. While `dragging`, its velocity is the distance
    /// moved since the previous call divided by `dt`.
    pub fn set_obstacle(&mut self, x: f32, y: f32, dragging: bool) {
        self.pending.pointer = Some(PointerInput {
            position: Vec2::new(x, y),
            dragging,
        });
    }

    pub fn apply_shake_impulse(&mut self) {
        self.pending.shake = true;
    }

    pub fn reset_scenario(&mut self, scenario: impl ScenarioSource + 'static) {
        self.pending.reset = Some(Box::new(scenario));
    }

    /// Queue `emit_count` particles at (x, y). Only honoured in EMIT mode.
    pub fn emit_at(&mut self, x: f32, y: f32) {
        self.pending.emits.push(Vec2::new(x, y));
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Active particles, ready for upload.
    pub fn particle_data(&self) -> &[Particle] {
        self.particles.active_particles()
    }

    /// Snapshot the grid into `out`.
    pub fn export_cells(&self, out: &mut Vec<GridCell>) {
        self.grid.export_cells(out);
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn frames_since_reset(&self) -> u32 {
        self.frames_since_reset
    }

    /// Rest density used for drift compensation: the configured value when
    /// positive, otherwise the calibrated one (0 until measured).
    pub fn rest_density(&self) -> f32 {
        if self.config.rest_density > 0.0 {
            self.config.rest_density
        } else {
            self.calibrated_density
        }
    }

    // ------------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------------

    /// Advance one frame of `config.dt`.
    pub fn step(&mut self) {
        match self.workers.take() {
            Some(pool) => {
                pool.install(|| self.run_frame());
                self.workers = Some(pool);
            }
            None => self.run_frame(),
        }
    }

    fn run_frame(&mut self) {
        self.apply_pending_input();

        // 1. Reset grid, walls and obstacle cells
        self.grid.clear(&self.config.obstacle);

        // 2. Gravity, advection, obstacle response
        let mut repaired = self.particles.integrate(&self.config);

        // 3. Per-cell particle lists
        neighbor::build(&self.grid, self.particles.active_particles_mut());

        // 4. P2G
        transfer::splat(&self.grid, self.particles.active_particles());

        // 5. Normalise + walls, then density
        transfer::finalize(&mut self.grid, &self.config.obstacle);
        transfer::estimate_density(&mut self.grid, self.particles.active_particles());
        self.calibrate();

        // 6. Separation and cohesion
        if self.config.separate_particles {
            interaction::separate(
                &self.grid,
                self.particles.active_particles_mut(),
                &self.config,
            );
        }

        // 7. Pressure projection
        let params = PressureParams::from_config(&self.config, self.rest_density());
        pressure::solve(&self.grid, &params);

        // 8. G2P
        repaired += transfer::gather(
            &self.grid,
            self.particles.active_particles_mut(),
            self.config.flip_ratio,
        );

        self.frame += 1;
        self.frames_since_reset += 1;

        if repaired > 0 {
            log::warn!(
                "Frame {}: replaced {} non-finite particle values",
                self.frame,
                repaired
            );
        }

        self.stats = FrameStats {
            frame: self.frame,
            rest_density: self.rest_density(),
            repaired,
            ..FrameStats::measure(&self.grid, self.particles.active_particles())
        };

        if self.frame % DIAGNOSTIC_INTERVAL as u64 == 0 {
            log::debug!(
                "Frame {}: {}/{} particles in domain, max speed {:.3}, KE {:.3}, div {:.4}",
                self.frame,
                self.stats.in_domain,
                self.stats.active_particles,
                self.stats.max_speed,
                self.stats.kinetic_energy,
                self.stats.divergence
            );
        }
    }

    fn apply_pending_input(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        let mut needs_reset = false;

        if let Some(mut config) = pending.config {
            let regrid = config.resolution != self.config.resolution
                || config.cell_size != self.config.cell_size;
            config.obstacle.position = self.config.obstacle.position;
            config.obstacle.velocity = self.config.obstacle.velocity;
            self.config = config;

            if regrid {
                self.grid = Grid::from_config(&self.config);
                log::info!(
                    "Grid re-provisioned at {}x{} cells (h = {})",
                    self.grid.width,
                    self.grid.height,
                    self.grid.cell_size
                );
                needs_reset = true;
            }
        }

        if let Some(scenario) = pending.reset {
            self.scenario = scenario;
            needs_reset = true;
        }
        if needs_reset {
            self.reset_now();
        }

        match pending.pointer {
            Some(input) => {
                let velocity = match (input.dragging, self.drag_anchor) {
                    (true, Some(previous)) => (input.position - previous) / self.config.dt,
                    _ => Vec2::ZERO,
                };
                self.config.obstacle.position = input.position;
                self.config.obstacle.velocity = if velocity.is_finite() {
                    velocity
                } else {
                    Vec2::ZERO
                };
                self.drag_anchor = input.dragging.then_some(input.position);
            }
            None => self.config.obstacle.velocity = Vec2::ZERO,
        }

        if pending.shake {
            self.particles
                .shake(self.config.shake_strength, &mut self.rng);
        }

        if self.config.obstacle.mode == InteractionMode::Emit {
            for position in pending.emits {
                self.particles
                    .emit(position, self.config.emit_count, &self.config, &mut self.rng);
            }
        } else if !pending.emits.is_empty() {
            log::debug!(
                "Ignoring {} emit requests outside EMIT mode",
                pending.emits.len()
            );
        }
    }

    fn reset_now(&mut self) {
        let spawned =
            self.particles
                .reset_to_scenario(self.scenario.as_ref(), &self.config, &mut self.rng);
        self.calibrated_density = 0.0;
        self.frames_since_reset = 0;
        log::info!("Reset to {}: {} particles", self.scenario.name(), spawned);
    }

    /// Measure rest density once per reset, at `calibration_frame` or the
    /// first later frame that has fluid.
    fn calibrate(&mut self) {
        if self.config.rest_density > 0.0
            || self.calibrated_density > 0.0
            || self.frames_since_reset < self.config.calibration_frame
        {
            return;
        }
        match measure_rest_density(&self.grid) {
            Some(rest) => {
                self.calibrated_density = rest;
                log::info!(
                    "Calibrated rest density {:.3} at frame {}",
                    rest,
                    self.frames_since_reset
                );
            }
            None => log::debug!(
                "No fluid cells at frame {}, calibration deferred",
                self.frames_since_reset
            ),
        }
    }
}
