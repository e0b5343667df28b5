//! Particle-level forces that bypass the grid.
//!
//! - obstacle response, applied per particle during integration
//! - separation of overlapping particles, with optional cohesion models
//!   (surface tension, hydrogen bonding) and colour diffusion

use glam::{Vec2, Vec4};
use rayon::prelude::*;

use crate::config::{InteractionMode, Obstacle, SimulationConfig};
use crate::constants::{DISTANCE_EPSILON, MAX_BOND_RADII, MAX_SEPARATION_CELLS, REFERENCE_FPS};
use crate::grid::Grid;
use crate::neighbor::{self, NeighborIndex};
use crate::particle::{pack_color, unpack_color, Particle};

/// Apply the obstacle's influence to one particle.
///
/// Acts within `radius + h/2` of the obstacle centre. VORTEX and FORCE
/// impulses fade with `(1 − d²/R²)²`.
pub fn apply_obstacle(
    position: &mut Vec2,
    velocity: &mut Vec2,
    obstacle: &Obstacle,
    cell_size: f32,
    dt: f32,
) {
    if obstacle.radius <= 0.0 {
        return;
    }
    let reach = obstacle.radius + 0.5 * cell_size;
    let offset = *position - obstacle.position;
    let dist_sq = offset.length_squared();
    if dist_sq >= reach * reach {
        return;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > DISTANCE_EPSILON { offset / dist } else { Vec2::Y };
    let tangent = normal.perp();
    let falloff = {
        let f = 1.0 - dist_sq / (reach * reach);
        f * f
    };
    let obstacle_speed = obstacle.velocity.length();
    let strength = obstacle.strength;

    match obstacle.mode {
        InteractionMode::Push => {
            *position = obstacle.position + normal * reach;
            *velocity = *velocity * 0.6 + obstacle.velocity * 0.4;
        }
        InteractionMode::Vortex => {
            let swirl = strength * 15.0 * (1.0 + 5.0 * obstacle_speed) * falloff * dt;
            *velocity += tangent * swirl;
            // small inward stabiliser
            *velocity -= normal * (strength * 2.0 * falloff * dt);
        }
        InteractionMode::Force => {
            let speed_boost = 1.0 + 5.0 * obstacle_speed;
            *velocity += normal * (strength * 60.0 * speed_boost * falloff * dt);
            *velocity += obstacle.velocity * (strength * falloff * 30.0 * dt);
            if obstacle_speed > 1e-3 {
                // particles curl around the side they are on
                let side = obstacle.velocity.perp_dot(offset).signum();
                *velocity += tangent * (side * strength * 10.0 * obstacle_speed * falloff * dt);
            }
        }
        InteractionMode::Emit => {}
    }
}

/// Step 6: Relax particle spacing toward `2r`.
///
/// Each iteration computes every particle's correction from the current
/// positions, then applies them all at once. Corrections are clamped to
/// half a cell and positions are re-confined to the particle box. The cell
/// lists are rebuilt between iterations.
pub fn separate(grid: &Grid, particles: &mut [Particle], config: &SimulationConfig) {
    let r = config.particle_radius;
    let min_dist = 2.0 * r;
    let tension_range = 2.5 * min_dist;
    let bond_range = 1.6 * min_dist;
    let bond_target = 0.96 * min_dist;
    let time_scale = config.dt * REFERENCE_FPS;
    let dt = config.dt;
    let max_correction = MAX_SEPARATION_CELLS * config.cell_size;
    let max_bond = MAX_BOND_RADII * r;
    let tension = config.cohesion.surface_tension;
    let bonding = config.cohesion.hydrogen_bonding;
    let bond_strength = config.cohesion.hydrogen_strength;
    let diffusion = config.color_diffusion;
    let (lo, hi) = config.particle_bounds();

    let mut updates = vec![(Vec2::ZERO, 0u32); particles.len()];

    for iteration in 0..config.separation_iterations {
        if iteration > 0 {
            grid.reset_cell_lists();
            neighbor::build(grid, particles);
        }

        let current: &[Particle] = particles;
        let index = NeighborIndex::new(grid, current);
        updates.par_iter_mut().enumerate().for_each(|(i, out)| {
            let pi = current[i].position;
            let vi = current[i].velocity;
            let own_color = color_vec(current[i].color);
            let mut color = own_color;
            let mut correction = Vec2::ZERO;

            for j in index.around(pi) {
                if j == i {
                    continue;
                }
                let diff = pi - current[j].position;
                let d = diff.length();
                let dir = diff / (d + DISTANCE_EPSILON);

                if d < min_dist {
                    correction += diff * ((min_dist - d) / (d + DISTANCE_EPSILON) * 0.2 * time_scale);
                    if diffusion > 0.0 {
                        let average = (own_color + color_vec(current[j].color)) * 0.5;
                        color += (average - own_color) * diffusion;
                    }
                } else if tension > 0.0 && d < tension_range {
                    let pull = 1.0 - d / tension_range;
                    correction -= diff * (tension * 0.15 * pull * pull * time_scale);
                } else if bonding && d < bond_range {
                    let stretch = d - bond_target;
                    let mut k = bond_strength * 0.25;
                    if stretch.abs() < 0.2 * r {
                        k *= 1.5;
                    }
                    let closing = (vi - current[j].velocity).dot(dir);
                    let bond = -dir * (stretch * k * 0.5) - dir * (closing * dt * k * 0.5);
                    correction += bond.clamp_length_max(max_bond);
                }
            }

            *out = (correction.clamp_length_max(max_correction), pack_color_vec(color));
        });

        particles
            .par_iter_mut()
            .zip(updates.par_iter())
            .for_each(|(p, &(correction, color))| {
                p.position = (p.position + correction).clamp(lo, hi);
                p.color = color;
            });
    }
}

#[inline]
fn color_vec(packed: u32) -> Vec4 {
    let [r, g, b, a] = unpack_color(packed);
    Vec4::new(r as f32, g as f32, b as f32, a as f32)
}

#[inline]
fn pack_color_vec(color: Vec4) -> u32 {
    let c = color.round().clamp(Vec4::ZERO, Vec4::splat(255.0));
    pack_color([c.x as u8, c.y as u8, c.z as u8, c.w as u8])
}
