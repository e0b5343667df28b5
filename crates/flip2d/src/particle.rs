//! Particle storage for the 2D FLIP solver.
//!
//! The pool is a fixed-capacity arena: the first `active` slots are live,
//! the rest are reserve particles parked far outside the domain. Particles
//! are never removed individually; emission activates reserve slots and a
//! scenario reset rewrites the whole arena.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::config::SimulationConfig;
use crate::constants::{MAX_INTERACTION_SPEED, MAX_PARTICLE_SPEED, PARKED_POSITION, WATER_COLOR};
use crate::interaction::apply_obstacle;
use crate::scenario::ScenarioSource;

/// Pack RGBA bytes as `r | g << 8 | b << 16 | a << 24`.
#[inline]
pub fn pack_color(rgba: [u8; 4]) -> u32 {
    u32::from_le_bytes(rgba)
}

#[inline]
pub fn unpack_color(packed: u32) -> [u8; 4] {
    packed.to_le_bytes()
}

/// A single particle, laid out for direct upload to a renderer.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Display colour, see [`pack_color`]
    pub color: u32,
    /// Next particle in the same cell (-1 = end of list)
    pub next_in_cell: i32,
}

impl Particle {
    pub fn new(position: Vec2, velocity: Vec2) -> Self {
        Self {
            position,
            velocity,
            color: pack_color(WATER_COLOR),
            next_in_cell: -1,
        }
    }

    /// A reserve particle parked outside any domain.
    pub fn parked() -> Self {
        Self::new(Vec2::splat(PARKED_POSITION), Vec2::ZERO)
    }
}

impl Default for Particle {
    fn default() -> Self {
        Self::parked()
    }
}

/// Clamp `position` into `[lo, hi]`, zeroing the velocity component along
/// any axis that was clamped.
#[inline]
pub fn confine(position: &mut Vec2, velocity: &mut Vec2, lo: Vec2, hi: Vec2) {
    if position.x < lo.x {
        position.x = lo.x;
        velocity.x = 0.0;
    } else if position.x > hi.x {
        position.x = hi.x;
        velocity.x = 0.0;
    }
    if position.y < lo.y {
        position.y = lo.y;
        velocity.y = 0.0;
    } else if position.y > hi.y {
        position.y = hi.y;
        velocity.y = 0.0;
    }
}

#[inline]
pub(crate) fn clamp_speed(velocity: Vec2, max_speed: f32) -> Vec2 {
    velocity.clamp_length_max(max_speed)
}

/// Fixed-capacity particle arena.
pub struct ParticlePool {
    particles: Vec<Particle>,
    active: usize,
}

impl ParticlePool {
    /// Pool of `capacity` parked particles.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            particles: vec![Particle::parked(); capacity],
            active: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.particles.len()
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn active_particles(&self) -> &[Particle] {
        &self.particles[..self.active]
    }

    pub fn active_particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles[..self.active]
    }

    /// The whole arena, reserve slots included.
    pub fn buffer(&self) -> &[Particle] {
        &self.particles
    }

    /// Step 2: Apply gravity, advance and confine every active particle,
    /// then respond to the obstacle.
    ///
    /// Returns how many particles had a non-finite position replaced.
    pub fn integrate(&mut self, config: &SimulationConfig) -> usize {
        let dt = config.dt;
        let gravity = config.gravity;
        let (lo, hi) = config.particle_bounds();
        let center = (lo + hi) * 0.5;
        let obstacle = config.obstacle;
        let cell_size = config.cell_size;

        self.particles[..self.active]
            .par_iter_mut()
            .map(|p| {
                let mut repaired = 0;

                p.velocity += gravity * dt;
                p.velocity = clamp_speed(p.velocity, MAX_PARTICLE_SPEED);

                let previous = p.position;
                p.position += p.velocity * dt;
                if !p.position.is_finite() || !p.velocity.is_finite() {
                    p.position = if previous.is_finite() { previous } else { center };
                    p.velocity = Vec2::ZERO;
                    repaired = 1;
                }
                confine(&mut p.position, &mut p.velocity, lo, hi);

                apply_obstacle(&mut p.position, &mut p.velocity, &obstacle, cell_size, dt);
                p.velocity = clamp_speed(p.velocity, MAX_INTERACTION_SPEED);
                // Projection out of the obstacle may leave the box
                confine(&mut p.position, &mut p.velocity, lo, hi);

                p.next_in_cell = -1;
                repaired
            })
            .sum()
    }

    /// Activate `count` reserve particles around `position` with a little
    /// jitter. Returns false (and changes nothing) when the pool would
    /// overflow.
    pub fn emit(
        &mut self,
        position: Vec2,
        count: usize,
        config: &SimulationConfig,
        rng: &mut ChaCha8Rng,
    ) -> bool {
        if self.active + count > self.capacity() {
            log::debug!(
                "emit dropped: {} active + {} requested exceeds capacity {}",
                self.active,
                count,
                self.capacity()
            );
            return false;
        }

        let (lo, hi) = config.particle_bounds();
        let spread = config.cell_size;
        for slot in &mut self.particles[self.active..self.active + count] {
            let offset = Vec2::new(rng.gen_range(-spread..=spread), rng.gen_range(-spread..=spread));
            let velocity = Vec2::new(rng.gen_range(-0.05..=0.05), rng.gen_range(-0.05..=0.05));
            *slot = Particle::new((position + offset).clamp(lo, hi), velocity);
        }
        self.active += count;
        true
    }

    /// Replace every particle with the positions produced by `source`.
    /// Positions beyond capacity are dropped; unused slots are parked.
    /// Returns the number of active particles.
    pub fn reset_to_scenario(
        &mut self,
        source: &dyn ScenarioSource,
        config: &SimulationConfig,
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let mut positions = source.positions(config, rng);
        positions.truncate(self.capacity());

        let (lo, hi) = config.particle_bounds();
        for (slot, position) in self.particles.iter_mut().zip(&positions) {
            *slot = Particle::new(position.clamp(lo, hi), Vec2::ZERO);
        }
        for slot in &mut self.particles[positions.len()..] {
            *slot = Particle::parked();
        }
        self.active = positions.len();
        self.active
    }

    /// Kick every active particle with a seeded random impulse.
    pub fn shake(&mut self, strength: f32, rng: &mut ChaCha8Rng) {
        for p in &mut self.particles[..self.active] {
            let kick = Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(0.0..=1.0));
            p.velocity = clamp_speed(p.velocity + kick * strength, MAX_INTERACTION_SPEED);
        }
    }
}
