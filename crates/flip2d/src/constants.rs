//! Numeric constants for the 2D solver.
//!
//! ## Stability envelopes
//!
//! The integrator is explicit and runs at large time steps, so every force
//! path is clamped instead of being allowed to diverge:
//!
//! - particle speed after integration: [`MAX_PARTICLE_SPEED`]
//! - particle speed after obstacle impulses: [`MAX_INTERACTION_SPEED`]
//! - per-particle separation displacement: [`MAX_SEPARATION_CELLS`] · h
//! - hydrogen-bond displacement: [`MAX_BOND_RADII`] · r
//! - pressure correction per cell: ±[`MAX_PRESSURE`]

/// Default gravity (units/s²), negative Y
pub const GRAVITY: f32 = -9.81;

/// Speed ceiling applied in `integrate` before advancing positions (units/s)
pub const MAX_PARTICLE_SPEED: f32 = 3.0;

/// Speed ceiling after obstacle impulses (units/s)
pub const MAX_INTERACTION_SPEED: f32 = 50.0;

/// Separation correction ceiling, in cell sizes
pub const MAX_SEPARATION_CELLS: f32 = 0.5;

/// Hydrogen-bond displacement ceiling, in particle radii
pub const MAX_BOND_RADII: f32 = 0.6;

/// Pressure correction clamp
pub const MAX_PRESSURE: f32 = 1000.0;

// =============================================================================
// EPSILONS
// =============================================================================

/// Grid node weights at or below this normalise to zero velocity
pub const WEIGHT_EPSILON: f32 = 1e-8;

/// Guard for pairwise distance division
pub const DISTANCE_EPSILON: f32 = 1e-6;

/// Cells whose neighbour solid-fraction sum is below this are skipped
pub const SOLID_SUM_EPSILON: f32 = 1e-4;

// =============================================================================
// SOLVER COEFFICIENTS
// =============================================================================

/// Fixed over-relaxation factor of the red/black sweep
pub const OVER_RELAXATION: f32 = 1.1;

/// Drift compensation stiffness
pub const DRIFT_STIFFNESS: f32 = 1.9 / 60.0;

/// Rest density floor; a lower calibrated mean causes runaway compression
pub const MIN_REST_DENSITY: f32 = 4.0;

/// Default red/black passes per frame (two colour sweeps each)
pub const PRESSURE_PASSES: usize = 40;

/// Default separation relaxation iterations per frame
pub const SEPARATION_ITERATIONS: usize = 3;

/// Frame index (since reset) at which rest density is measured
pub const CALIBRATION_FRAME: u32 = 10;

/// Frames between health-check log lines
pub const DIAGNOSTIC_INTERVAL: u32 = 120;

/// Reference frame rate the per-frame tuning constants were chosen at
pub const REFERENCE_FPS: f32 = 60.0;

/// Where reserve particles are parked; far outside any domain
pub const PARKED_POSITION: f32 = -1.0e5;

/// Default water colour (RGBA)
pub const WATER_COLOR: [u8; 4] = [40, 110, 220, 255];
