//! Per-frame health numbers.

use glam::Vec2;

use crate::grid::Grid;
use crate::particle::Particle;

/// Snapshot of solver health after a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// Frames stepped since construction
    pub frame: u64,
    pub active_particles: usize,
    /// Active particles inside the domain box
    pub in_domain: usize,
    pub fluid_cells: usize,
    /// Σ ½|v|² over active particles (unit mass)
    pub kinetic_energy: f32,
    pub max_speed: f32,
    /// Σ |div| over fluid cells after the pressure solve
    pub divergence: f32,
    /// Rest density in effect (0 = not yet calibrated)
    pub rest_density: f32,
    /// Non-finite values replaced during the frame
    pub repaired: usize,
}

impl FrameStats {
    /// Gather particle and grid measurements. `frame`, `rest_density` and
    /// `repaired` are left for the caller.
    pub fn measure(grid: &Grid, particles: &[Particle]) -> Self {
        let domain = Vec2::new(grid.world_width(), grid.world_height());
        let mut stats = Self {
            active_particles: particles.len(),
            fluid_cells: grid.fluid_cell_count(),
            divergence: grid.total_divergence(),
            ..Default::default()
        };
        for p in particles {
            if p.position.cmpge(Vec2::ZERO).all() && p.position.cmple(domain).all() {
                stats.in_domain += 1;
            }
            let speed_sq = p.velocity.length_squared();
            stats.kinetic_energy += 0.5 * speed_sq;
            stats.max_speed = stats.max_speed.max(speed_sq.sqrt());
        }
        stats
    }
}
