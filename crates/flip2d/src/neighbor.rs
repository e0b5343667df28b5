//! Per-cell intrusive particle lists.
//!
//! Each grid cell stores the index of its first particle; each particle
//! stores the index of the next particle in the same cell. Building the
//! lists is one parallel pass with an atomic exchange per particle, so the
//! order inside a cell is unspecified.

use std::sync::atomic::{AtomicI32, Ordering};

use glam::Vec2;
use rayon::prelude::*;

use crate::grid::Grid;
use crate::particle::Particle;

/// Step 3: Thread every particle into the list of the cell containing it.
///
/// The grid heads must already be -1 (see `Grid::clear`) and each
/// particle's `next_in_cell` is overwritten. Particles outside the grid are
/// left unlinked.
pub fn build(grid: &Grid, particles: &mut [Particle]) {
    particles.par_iter_mut().enumerate().for_each(|(index, p)| {
        let (i, j) = grid.world_to_cell(p.position);
        if !grid.cell_in_bounds(i, j) {
            p.next_in_cell = -1;
            return;
        }
        let cell = grid.cell_index(i as usize, j as usize);
        p.next_in_cell = grid.swap_head(cell, index as i32);
    });
}

/// Read-only view over built cell lists.
#[derive(Clone, Copy)]
pub struct NeighborIndex<'a> {
    heads: &'a [AtomicI32],
    particles: &'a [Particle],
    width: usize,
    height: usize,
    cell_size: f32,
}

impl<'a> NeighborIndex<'a> {
    pub fn new(grid: &'a Grid, particles: &'a [Particle]) -> Self {
        Self::from_parts(
            &grid.first_particle,
            grid.width,
            grid.height,
            grid.cell_size,
            particles,
        )
    }

    /// View built from individual grid fields, so callers can keep mutable
    /// access to the rest of the grid.
    pub(crate) fn from_parts(
        heads: &'a [AtomicI32],
        width: usize,
        height: usize,
        cell_size: f32,
        particles: &'a [Particle],
    ) -> Self {
        Self {
            heads,
            particles,
            width,
            height,
            cell_size,
        }
    }

    /// Indices of the particles listed in cell (i, j).
    pub fn cell(&self, i: usize, j: usize) -> impl Iterator<Item = usize> + 'a {
        let head = self.heads[j * self.width + i].load(Ordering::Relaxed);
        let particles = self.particles;
        std::iter::successors((head >= 0).then_some(head as usize), move |&k| {
            let next = particles[k].next_in_cell;
            (next >= 0).then_some(next as usize)
        })
    }

    /// Indices of the particles in the 3×3 block of cells around `pos`.
    pub fn around(&self, pos: Vec2) -> impl Iterator<Item = usize> + 'a {
        let ci = (pos.x / self.cell_size).floor() as i32;
        let cj = (pos.y / self.cell_size).floor() as i32;
        let this = *self;
        (-1..=1)
            .flat_map(move |dj| (-1..=1).map(move |di| (ci + di, cj + dj)))
            .filter(move |&(i, j)| {
                i >= 0 && j >= 0 && (i as usize) < this.width && (j as usize) < this.height
            })
            .flat_map(move |(i, j)| this.cell(i as usize, j as usize))
    }
}
