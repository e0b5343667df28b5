//! Simulation parameters.
//!
//! The application shell owns a [`SimulationConfig`] and hands a snapshot to
//! the solver; the solver never mutates it mid-frame. Configs can be stored
//! as JSON or YAML.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    CALIBRATION_FRAME, GRAVITY, PRESSURE_PASSES, SEPARATION_ITERATIONS,
};
use crate::serde_utils::{deserialize_vec2, serialize_vec2};

/// Errors raised at the configuration boundary. The stepping core itself
/// never fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

/// How the obstacle acts on nearby particles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionMode {
    /// Solid disc that scoops fluid along with it
    #[default]
    Push,
    /// Swirls particles around the obstacle
    Vortex,
    /// Radial blast plus throw along the drag direction
    Force,
    /// Injects new particles at the obstacle (driven by `emit_at`)
    Emit,
}

/// The user-movable circular obstacle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Obstacle {
    #[serde(serialize_with = "serialize_vec2", deserialize_with = "deserialize_vec2")]
    pub position: Vec2,
    #[serde(serialize_with = "serialize_vec2", deserialize_with = "deserialize_vec2")]
    pub velocity: Vec2,
    pub radius: f32,
    pub mode: InteractionMode,
    /// Scales the VORTEX and FORCE impulses
    pub strength: f32,
}

impl Default for Obstacle {
    fn default() -> Self {
        Self {
            position: Vec2::new(1.4, 0.6),
            velocity: Vec2::ZERO,
            radius: 0.15,
            mode: InteractionMode::Push,
            strength: 1.0,
        }
    }
}

/// Inter-particle attraction models used by the separation pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cohesion {
    /// Macro-scale attraction coefficient (0 disables)
    pub surface_tension: f32,
    /// Short-range "snap" bonds that crystallise the packing
    pub hydrogen_bonding: bool,
    pub hydrogen_strength: f32,
}

impl Default for Cohesion {
    fn default() -> Self {
        Self {
            surface_tension: 0.0,
            hydrogen_bonding: false,
            hydrogen_strength: 0.5,
        }
    }
}

/// Grid size in cells, including the solid boundary ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridResolution {
    pub width: usize,
    pub height: usize,
}

impl GridResolution {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Resolution for a viewport of the given aspect ratio (width / height),
    /// a target cell spacing and a fixed domain height.
    pub fn from_viewport(aspect: f32, target_cell_size: f32, domain_height: f32) -> Self {
        let height = (domain_height / target_cell_size).floor().max(3.0) as usize;
        let width = (domain_height * aspect / target_cell_size).floor().max(3.0) as usize;
        Self { width, height }
    }
}

impl Default for GridResolution {
    fn default() -> Self {
        Self::new(100, 50)
    }
}

/// Per-frame parameter snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Time step (s)
    pub dt: f32,
    #[serde(serialize_with = "serialize_vec2", deserialize_with = "deserialize_vec2")]
    pub gravity: Vec2,
    /// Cell spacing h
    pub cell_size: f32,
    pub resolution: GridResolution,
    pub particle_radius: f32,
    /// Particles placed by a scenario reset
    pub particle_count: usize,
    /// Target rest density; 0 means auto-calibrate after each reset
    pub rest_density: f32,
    /// 0 = pure PIC, 1 = pure FLIP
    pub flip_ratio: f32,
    pub compensate_drift: bool,
    pub separate_particles: bool,
    pub separation_iterations: usize,
    /// Red/black passes per frame; each pass is two colour sweeps
    pub pressure_passes: usize,
    /// Frames after a reset before rest density is measured
    pub calibration_frame: u32,
    pub obstacle: Obstacle,
    pub cohesion: Cohesion,
    /// Fraction of the pair-average colour blended in per overlap
    pub color_diffusion: f32,
    /// Particles injected per `emit_at` event
    pub emit_count: usize,
    /// Peak speed of a shake impulse (units/s)
    pub shake_strength: f32,
    /// Seed for emission jitter, random scenarios and shake impulses
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let cell_size = 0.02;
        Self {
            dt: 1.0 / 60.0,
            gravity: Vec2::new(0.0, GRAVITY),
            cell_size,
            resolution: GridResolution::default(),
            particle_radius: 0.3 * cell_size,
            particle_count: 6000,
            rest_density: 0.0,
            flip_ratio: 0.9,
            compensate_drift: true,
            separate_particles: true,
            separation_iterations: SEPARATION_ITERATIONS,
            pressure_passes: PRESSURE_PASSES,
            calibration_frame: CALIBRATION_FRAME,
            obstacle: Obstacle::default(),
            cohesion: Cohesion::default(),
            color_diffusion: 0.001,
            emit_count: 8,
            shake_strength: 2.0,
            seed: 0x5eed,
        }
    }
}

impl SimulationConfig {
    /// Config for a grid of `width × height` cells of size `cell_size`,
    /// everything else default. Particle radius follows the cell size.
    pub fn with_grid(width: usize, height: usize, cell_size: f32) -> Self {
        Self {
            cell_size,
            resolution: GridResolution::new(width, height),
            particle_radius: 0.3 * cell_size,
            ..Self::default()
        }
    }

    /// World-space extent of the grid.
    pub fn domain_size(&self) -> Vec2 {
        Vec2::new(
            self.resolution.width as f32 * self.cell_size,
            self.resolution.height as f32 * self.cell_size,
        )
    }

    /// Box particles are clamped into: one boundary cell plus one radius
    /// from every wall.
    pub fn particle_bounds(&self) -> (Vec2, Vec2) {
        let pad = self.cell_size + self.particle_radius;
        (Vec2::splat(pad), self.domain_size() - Vec2::splat(pad))
    }

    /// Check the snapshot is usable with a pool of `capacity` particles.
    pub fn validate(&self, capacity: usize) -> Result<(), ConfigError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(invalid("dt", format!("must be positive, got {}", self.dt)));
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(invalid(
                "cell_size",
                format!("must be positive, got {}", self.cell_size),
            ));
        }
        if self.resolution.width < 3 || self.resolution.height < 3 {
            return Err(invalid(
                "resolution",
                format!(
                    "need at least 3x3 cells, got {}x{}",
                    self.resolution.width, self.resolution.height
                ),
            ));
        }
        if !(self.particle_radius.is_finite() && self.particle_radius > 0.0) {
            return Err(invalid(
                "particle_radius",
                format!("must be positive, got {}", self.particle_radius),
            ));
        }
        if self.particle_radius >= self.cell_size {
            return Err(invalid(
                "particle_radius",
                "must be smaller than the cell size",
            ));
        }
        let (lo, hi) = self.particle_bounds();
        if lo.cmpgt(hi).any() {
            return Err(invalid(
                "particle_radius",
                format!(
                    "leaves no room for particles inside the walls of a {}x{} grid",
                    self.resolution.width, self.resolution.height
                ),
            ));
        }
        if !self.gravity.is_finite() {
            return Err(invalid("gravity", "must be finite"));
        }
        if !(0.0..=1.0).contains(&self.flip_ratio) {
            return Err(invalid(
                "flip_ratio",
                format!("must be in [0, 1], got {}", self.flip_ratio),
            ));
        }
        if self.particle_count > capacity {
            return Err(invalid(
                "particle_count",
                format!("{} exceeds pool capacity {}", self.particle_count, capacity),
            ));
        }
        if !(self.rest_density >= 0.0) {
            return Err(invalid("rest_density", "must be non-negative"));
        }
        if !(self.obstacle.radius >= 0.0) || !self.obstacle.position.is_finite() {
            return Err(invalid("obstacle", "radius must be non-negative and position finite"));
        }
        if !(self.obstacle.strength >= 0.0) {
            return Err(invalid("obstacle.strength", "must be non-negative"));
        }
        if !(self.cohesion.surface_tension >= 0.0) || !(self.cohesion.hydrogen_strength >= 0.0) {
            return Err(invalid("cohesion", "coefficients must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.color_diffusion) {
            return Err(invalid("color_diffusion", "must be in [0, 1]"));
        }
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_json(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save configuration to a JSON file
    pub fn save_json(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a YAML file
    pub fn load_yaml(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&yaml)?)
    }

    /// Save configuration to a YAML file
    pub fn save_yaml(&self, path: &Path) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }
}
