//! Pressure projection for 2D incompressible flow.
//!
//! Red/black successive over-relaxation directly on the face velocities:
//! each fluid cell computes its divergence and pushes a correction onto its
//! four faces, weighted by the neighbours' solid fractions. Cells of one
//! colour share no faces, so a colour sweep is a single parallel pass.
//!
//! For ω in (0, 2) and zero velocity on solid faces, every cell update
//! lowers Σu² + Σv² by div²·ω(2 − ω)/s, so the sweep never adds energy.

use rayon::prelude::*;

use crate::config::SimulationConfig;
use crate::constants::{DRIFT_STIFFNESS, MAX_PRESSURE, OVER_RELAXATION, SOLID_SUM_EPSILON};
use crate::grid::{CellType, Grid};

/// Per-frame solver settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PressureParams {
    /// Red/black passes (two colour sweeps each)
    pub passes: usize,
    pub over_relaxation: f32,
    /// 0 disables drift compensation
    pub rest_density: f32,
    pub compensate_drift: bool,
}

impl PressureParams {
    pub fn from_config(config: &SimulationConfig, rest_density: f32) -> Self {
        Self {
            passes: config.pressure_passes,
            over_relaxation: OVER_RELAXATION,
            rest_density,
            compensate_drift: config.compensate_drift,
        }
    }
}

impl Default for PressureParams {
    fn default() -> Self {
        Self {
            passes: crate::constants::PRESSURE_PASSES,
            over_relaxation: OVER_RELAXATION,
            rest_density: 0.0,
            compensate_drift: false,
        }
    }
}

/// One colour sweep over the interior fluid cells with `(i + j) % 2 == color`.
pub fn relax(grid: &Grid, params: &PressureParams, color: usize) {
    let w = grid.width;
    let h = grid.height;
    let s = &grid.solid_fraction;
    let density = &grid.density;
    let drift = params.compensate_drift && params.rest_density > 0.0;

    (1..h - 1).into_par_iter().for_each(|j| {
        let first = 1 + (j + 1 + color) % 2;
        for i in (first..w - 1).step_by(2) {
            let idx = j * w + i;
            if grid.cell_type(idx) != CellType::Fluid {
                continue;
            }

            let s_left = s[idx - 1];
            let s_right = s[idx + 1];
            let s_bottom = s[idx - w];
            let s_top = s[idx + w];
            let s_sum = s_left + s_right + s_bottom + s_top;
            if s_sum < SOLID_SUM_EPSILON {
                continue;
            }

            let mut div = grid.u(idx + 1) - grid.u(idx) + grid.v(idx + w) - grid.v(idx);
            if drift {
                let compression = density[idx] - params.rest_density;
                if compression > 0.0 {
                    div -= DRIFT_STIFFNESS * compression;
                }
            }

            let p = (-div / s_sum * params.over_relaxation).clamp(-MAX_PRESSURE, MAX_PRESSURE);

            grid.u[idx].fetch_add(-s_left * p);
            grid.u[idx + 1].fetch_add(s_right * p);
            grid.v[idx].fetch_add(-s_bottom * p);
            grid.v[idx + w].fetch_add(s_top * p);
        }
    });
}

/// Step 7: Run `params.passes` red/black passes.
pub fn solve(grid: &Grid, params: &PressureParams) {
    for _ in 0..params.passes {
        relax(grid, params, 0);
        relax(grid, params, 1);
    }
}
