//! Initial particle layouts.
//!
//! A scenario only produces positions; the pool owns activation, parking
//! and colouring. Anything implementing [`ScenarioSource`] can be handed to
//! a reset, including a plain `Vec<Vec2>` of explicit positions.

use glam::Vec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;

/// Produces initial particle positions for a reset.
pub trait ScenarioSource: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `config.particle_count` positions inside `config.particle_bounds()`.
    fn positions(&self, config: &SimulationConfig, rng: &mut ChaCha8Rng) -> Vec<Vec2>;
}

/// Built-in layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scenario {
    /// Hexagonally packed pool resting on the floor
    #[default]
    HexagonalPool,
    /// Tall column against the left wall
    DamBreak,
    /// Column suspended above the middle of the tank
    CenterDrop,
    /// Uniformly scattered particles
    UniformRandom,
}

impl ScenarioSource for Scenario {
    fn name(&self) -> &str {
        match self {
            Scenario::HexagonalPool => "hexagonal pool",
            Scenario::DamBreak => "dam break",
            Scenario::CenterDrop => "center drop",
            Scenario::UniformRandom => "uniform random",
        }
    }

    fn positions(&self, config: &SimulationConfig, rng: &mut ChaCha8Rng) -> Vec<Vec2> {
        let (lo, hi) = config.particle_bounds();
        let extent = hi - lo;
        let r = config.particle_radius;
        let count = config.particle_count;

        match self {
            Scenario::HexagonalPool => hex_fill(lo, hi, r, count),
            Scenario::DamBreak => {
                let column_hi = Vec2::new(lo.x + extent.x * 0.4, lo.y + extent.y * 0.8);
                hex_fill(lo, column_hi, r, count)
            }
            Scenario::CenterDrop => {
                let column_lo = Vec2::new(lo.x + extent.x * 0.35, lo.y + extent.y * 0.3);
                let column_hi = Vec2::new(lo.x + extent.x * 0.65, lo.y + extent.y * 0.95);
                hex_fill(column_lo, column_hi, r, count)
            }
            Scenario::UniformRandom if lo.cmpgt(hi).any() => Vec::new(),
            Scenario::UniformRandom => (0..count)
                .map(|_| Vec2::new(rng.gen_range(lo.x..=hi.x), rng.gen_range(lo.y..=hi.y)))
                .collect(),
        }
    }
}

impl ScenarioSource for Vec<Vec2> {
    fn name(&self) -> &str {
        "explicit positions"
    }

    fn positions(&self, config: &SimulationConfig, _rng: &mut ChaCha8Rng) -> Vec<Vec2> {
        self.iter().take(config.particle_count).copied().collect()
    }
}

/// Hexagonal packing of radius-`r` discs, bottom row first, until `limit`
/// positions are placed or the region is full.
///
/// Horizontal spacing 2r, row spacing √3·r, odd rows shifted by r.
pub fn hex_fill(lo: Vec2, hi: Vec2, r: f32, limit: usize) -> Vec<Vec2> {
    let dx = 2.0 * r;
    let dy = 3.0_f32.sqrt() * r;
    let mut out = Vec::with_capacity(limit);
    if r <= 0.0 || hi.x < lo.x || hi.y < lo.y {
        return out;
    }

    let mut row = 0usize;
    loop {
        let y = lo.y + row as f32 * dy;
        if y > hi.y {
            break;
        }
        let offset = if row % 2 == 1 { r } else { 0.0 };
        let mut x = lo.x + offset;
        while x <= hi.x {
            if out.len() == limit {
                return out;
            }
            out.push(Vec2::new(x, y));
            x += dx;
        }
        row += 1;
    }
    out
}
