//! Particle-Grid transfer functions for 2D PIC/FLIP.
//!
//! Splat: scatter particle velocity onto the four nearest u and v nodes.
//! Finalize: normalise by weight, snapshot the FLIP baseline, apply walls.
//! Gather: blend the new grid velocity (PIC) with the particle's own
//! velocity plus the grid change (FLIP).

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::Vec2;
use rayon::prelude::*;

use crate::config::Obstacle;
use crate::constants::WEIGHT_EPSILON;
use crate::grid::{CellType, Grid};
use crate::neighbor::NeighborIndex;
use crate::particle::Particle;

/// Step 4: Scatter particle velocities to the grid (P2G).
///
/// Each component goes to the four nodes of its own staggered lattice,
/// accumulating `velocity · weight` and `weight`. The particle's own cell
/// becomes FLUID unless it is SOLID.
pub fn splat(grid: &Grid, particles: &[Particle]) {
    particles.par_iter().for_each(|p| {
        let (i, j) = grid.world_to_cell(p.position);
        if !grid.cell_in_bounds(i, j) {
            return;
        }

        let su = grid.u_stencil(p.position);
        for k in 0..4 {
            let w = su.weights[k];
            grid.u[su.nodes[k]].fetch_add(p.velocity.x * w);
            grid.weight_u[su.nodes[k]].fetch_add(w);
        }

        let sv = grid.v_stencil(p.position);
        for k in 0..4 {
            let w = sv.weights[k];
            grid.v[sv.nodes[k]].fetch_add(p.velocity.y * w);
            grid.weight_v[sv.nodes[k]].fetch_add(w);
        }

        grid.mark_fluid(grid.cell_index(i as usize, j as usize));
    });
}

/// Step 5a: Turn accumulated momentum into velocity.
///
/// Nodes with weight ≤ 1e-8 get zero velocity. The normalised field is
/// copied to `prev_u`/`prev_v`, then every face touching a SOLID cell is
/// overwritten: with the obstacle velocity when that cell is an interior
/// solid, with zero when it belongs to the boundary ring.
pub fn finalize(grid: &mut Grid, obstacle: &Obstacle) {
    let w = grid.width;
    let h = grid.height;
    let u = &grid.u;
    let v = &grid.v;
    let weight_u = &grid.weight_u;
    let weight_v = &grid.weight_v;
    let cell_type = &grid.cell_type;

    let solid_velocity = |idx: usize| -> Option<Vec2> {
        if cell_type[idx].load(Ordering::Relaxed) != CellType::Solid as u8 {
            return None;
        }
        let (i, j) = (idx % w, idx / w);
        let boundary = i == 0 || j == 0 || i + 1 == w || j + 1 == h;
        Some(if boundary { Vec2::ZERO } else { obstacle.velocity })
    };

    grid.prev_u
        .par_iter_mut()
        .zip(grid.prev_v.par_iter_mut())
        .enumerate()
        .for_each(|(idx, (prev_u, prev_v))| {
            let i = idx % w;
            let j = idx / w;

            let wu = weight_u[idx].load();
            let mut vel_u = if wu > WEIGHT_EPSILON { u[idx].load() / wu } else { 0.0 };
            let wv = weight_v[idx].load();
            let mut vel_v = if wv > WEIGHT_EPSILON { v[idx].load() / wv } else { 0.0 };

            *prev_u = vel_u;
            *prev_v = vel_v;

            // u sits between (i-1, j) and (i, j); v between (i, j-1) and (i, j)
            let own = solid_velocity(idx);
            let left = if i > 0 { solid_velocity(idx - 1) } else { Some(Vec2::ZERO) };
            let below = if j > 0 { solid_velocity(idx - w) } else { Some(Vec2::ZERO) };

            if let Some(s) = pick_solid(own, left) {
                vel_u = s.x;
            }
            if let Some(s) = pick_solid(own, below) {
                vel_v = s.y;
            }

            u[idx].store(vel_u);
            v[idx].store(vel_v);
        });
}

/// Velocity imposed on a face by its two cells. A moving obstacle wins
/// over a static wall.
#[inline]
fn pick_solid(a: Option<Vec2>, b: Option<Vec2>) -> Option<Vec2> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if x != Vec2::ZERO { x } else { y }),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Step 5b: Smoothed particle count around each non-solid cell centre.
///
/// Tent kernel `max(0, 1 − |dx|/h) · max(0, 1 − |dy|/h)` over the particles
/// in the surrounding 3×3 cells. Requires built cell lists.
pub fn estimate_density(grid: &mut Grid, particles: &[Particle]) {
    let w = grid.width;
    let cell_size = grid.cell_size;
    let inv_h = 1.0 / cell_size;
    let cell_type = &grid.cell_type;
    let index = NeighborIndex::from_parts(
        &grid.first_particle,
        grid.width,
        grid.height,
        cell_size,
        particles,
    );

    grid.density
        .par_iter_mut()
        .enumerate()
        .for_each(|(idx, density)| {
            if cell_type[idx].load(Ordering::Relaxed) == CellType::Solid as u8 {
                *density = 0.0;
                return;
            }
            let center = Vec2::new(
                ((idx % w) as f32 + 0.5) * cell_size,
                ((idx / w) as f32 + 0.5) * cell_size,
            );
            *density = index
                .around(center)
                .map(|k| {
                    let d = (particles[k].position - center).abs() * inv_h;
                    (1.0 - d.x).max(0.0) * (1.0 - d.y).max(0.0)
                })
                .sum();
        });
}

/// Step 8: Transfer grid velocities back to particles (G2P).
///
/// `flip_ratio` blends PIC (0) and FLIP (1). A non-finite blend falls back
/// to the PIC sample, a non-finite PIC sample to zero. Returns the number
/// of fallbacks taken.
pub fn gather(grid: &Grid, particles: &mut [Particle], flip_ratio: f32) -> usize {
    let fallbacks = AtomicUsize::new(0);

    particles.par_iter_mut().for_each(|p| {
        let pic = grid.sample_velocity(p.position);
        let prev = grid.sample_prev_velocity(p.position);
        let flip = p.velocity + (pic - prev);
        let blended = pic.lerp(flip, flip_ratio);

        p.velocity = if blended.is_finite() {
            blended
        } else {
            fallbacks.fetch_add(1, Ordering::Relaxed);
            if pic.is_finite() {
                pic
            } else {
                Vec2::ZERO
            }
        };
    });

    fallbacks.into_inner()
}
