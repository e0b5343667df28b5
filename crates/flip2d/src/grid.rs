//! MAC (Marker-and-Cell) grid for the 2D FLIP solver.
//!
//! Staggered layout, one record per cell:
//! - u (horizontal velocity) on the cell's left edge, node at (i·h, (j+½)·h)
//! - v (vertical velocity) on the cell's bottom edge, node at ((i+½)·h, j·h)
//! - density, type and solid fraction at the cell centre
//!
//! The outermost ring of cells is always solid, so the right/top faces of
//! the last column/row never carry flow and need no storage of their own.
//!
//! Fields written by concurrent scatter passes (velocity and weight
//! accumulators, cell type, list heads) are atomics. Fields that only ever
//! have one writer per cell (`prev_u`, `prev_v`, `density`,
//! `solid_fraction`) are plain vectors.

use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rayon::prelude::*;

use crate::atomic::{atomic_vec, AtomicF32};
use crate::config::{InteractionMode, Obstacle, SimulationConfig};

/// Cell classification for boundary handling
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CellType {
    /// Contains fluid particles
    Fluid = 0,
    /// Empty
    Air = 1,
    /// Wall or obstacle - blocks flow
    Solid = 2,
}

impl CellType {
    #[inline]
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => CellType::Fluid,
            2 => CellType::Solid,
            _ => CellType::Air,
        }
    }
}

/// Plain-data copy of one cell, laid out for upload to a renderer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GridCell {
    pub u: f32,
    pub v: f32,
    pub weight_u: f32,
    pub weight_v: f32,
    pub prev_u: f32,
    pub prev_v: f32,
    pub density: f32,
    pub solid_fraction: f32,
    /// `CellType` discriminant
    pub cell_type: u32,
    pub first_particle: i32,
}

/// Four node indices and bilinear weights around a sample point.
#[derive(Clone, Copy, Debug)]
pub struct Stencil {
    pub nodes: [usize; 4],
    pub weights: [f32; 4],
}

/// Staggered MAC grid
pub struct Grid {
    pub width: usize,
    pub height: usize,
    pub cell_size: f32,

    pub(crate) u: Vec<AtomicF32>,
    pub(crate) v: Vec<AtomicF32>,
    pub(crate) weight_u: Vec<AtomicF32>,
    pub(crate) weight_v: Vec<AtomicF32>,

    /// Finalized pre-pressure velocities (FLIP baseline)
    pub prev_u: Vec<f32>,
    pub prev_v: Vec<f32>,

    /// Smoothed particle count around each cell centre
    pub density: Vec<f32>,
    /// 0 for solid cells, 1 otherwise
    pub solid_fraction: Vec<f32>,

    pub(crate) cell_type: Vec<AtomicU8>,
    /// Head of each cell's particle list (-1 = empty)
    pub(crate) first_particle: Vec<AtomicI32>,
}

impl Grid {
    pub fn new(width: usize, height: usize, cell_size: f32) -> Self {
        let cell_count = width * height;
        Self {
            width,
            height,
            cell_size,
            u: atomic_vec(cell_count, 0.0),
            v: atomic_vec(cell_count, 0.0),
            weight_u: atomic_vec(cell_count, 0.0),
            weight_v: atomic_vec(cell_count, 0.0),
            prev_u: vec![0.0; cell_count],
            prev_v: vec![0.0; cell_count],
            density: vec![0.0; cell_count],
            solid_fraction: vec![1.0; cell_count],
            cell_type: (0..cell_count)
                .map(|_| AtomicU8::new(CellType::Air as u8))
                .collect(),
            first_particle: (0..cell_count).map(|_| AtomicI32::new(-1)).collect(),
        }
    }

    /// Zero-initialised grid sized by the config's resolution.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            config.resolution.width,
            config.resolution.height,
            config.cell_size,
        )
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    pub fn world_width(&self) -> f32 {
        self.width as f32 * self.cell_size
    }

    pub fn world_height(&self) -> f32 {
        self.height as f32 * self.cell_size
    }

    #[inline]
    pub fn cell_index(&self, i: usize, j: usize) -> usize {
        j * self.width + i
    }

    /// Cell containing `pos` (may be out of bounds)
    #[inline]
    pub fn world_to_cell(&self, pos: Vec2) -> (i32, i32) {
        let inv = 1.0 / self.cell_size;
        ((pos.x * inv).floor() as i32, (pos.y * inv).floor() as i32)
    }

    #[inline]
    pub fn cell_in_bounds(&self, i: i32, j: i32) -> bool {
        i >= 0 && j >= 0 && (i as usize) < self.width && (j as usize) < self.height
    }

    #[inline]
    pub fn is_boundary(&self, i: usize, j: usize) -> bool {
        i == 0 || j == 0 || i + 1 == self.width || j + 1 == self.height
    }

    pub fn cell_center(&self, i: usize, j: usize) -> Vec2 {
        Vec2::new((i as f32 + 0.5) * self.cell_size, (j as f32 + 0.5) * self.cell_size)
    }

    // ------------------------------------------------------------------------
    // Field access
    // ------------------------------------------------------------------------

    #[inline]
    pub fn u(&self, idx: usize) -> f32 {
        self.u[idx].load()
    }

    #[inline]
    pub fn v(&self, idx: usize) -> f32 {
        self.v[idx].load()
    }

    #[inline]
    pub fn set_u(&self, idx: usize, value: f32) {
        self.u[idx].store(value);
    }

    #[inline]
    pub fn set_v(&self, idx: usize, value: f32) {
        self.v[idx].store(value);
    }

    #[inline]
    pub fn weight_u(&self, idx: usize) -> f32 {
        self.weight_u[idx].load()
    }

    #[inline]
    pub fn weight_v(&self, idx: usize) -> f32 {
        self.weight_v[idx].load()
    }

    #[inline]
    pub fn cell_type(&self, idx: usize) -> CellType {
        CellType::from_u8(self.cell_type[idx].load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_cell_type(&self, idx: usize, cell_type: CellType) {
        self.cell_type[idx].store(cell_type as u8, Ordering::Relaxed);
    }

    /// AIR → FLUID; solid and already-fluid cells are left alone.
    #[inline]
    pub fn mark_fluid(&self, idx: usize) {
        let _ = self.cell_type[idx].compare_exchange(
            CellType::Air as u8,
            CellType::Fluid as u8,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }

    #[inline]
    pub fn first_particle(&self, idx: usize) -> i32 {
        self.first_particle[idx].load(Ordering::Relaxed)
    }

    /// Install `particle` as the head of cell `idx`, returning the old head.
    #[inline]
    pub(crate) fn swap_head(&self, idx: usize, particle: i32) -> i32 {
        self.first_particle[idx].swap(particle, Ordering::Relaxed)
    }

    /// Empty every cell list, leaving the rest of the grid untouched.
    pub fn reset_cell_lists(&self) {
        self.first_particle
            .par_iter()
            .for_each(|head| head.store(-1, Ordering::Relaxed));
    }

    pub fn fluid_cell_count(&self) -> usize {
        (0..self.cell_count())
            .filter(|&idx| self.cell_type(idx) == CellType::Fluid)
            .count()
    }

    // ------------------------------------------------------------------------
    // Per-frame reset
    // ------------------------------------------------------------------------

    /// Reset accumulators and reclassify cells for a new frame.
    ///
    /// Boundary ring → SOLID. In PUSH mode, cells whose centre lies inside
    /// the obstacle → SOLID. Everything else → AIR. Every accumulator starts
    /// at zero; `finalize` imposes the obstacle velocity after normalising.
    /// `prev_u`/`prev_v` survive.
    pub fn clear(&mut self, obstacle: &Obstacle) {
        let w = self.width;
        let h = self.height;
        let cell_size = self.cell_size;
        let push = obstacle.mode == InteractionMode::Push && obstacle.radius > 0.0;
        let radius_sq = obstacle.radius * obstacle.radius;

        let u = &self.u;
        let v = &self.v;
        let weight_u = &self.weight_u;
        let weight_v = &self.weight_v;
        let cell_type = &self.cell_type;
        let first_particle = &self.first_particle;

        self.solid_fraction
            .par_iter_mut()
            .zip(self.density.par_iter_mut())
            .enumerate()
            .for_each(|(idx, (s, density))| {
                let i = idx % w;
                let j = idx / w;

                u[idx].store(0.0);
                v[idx].store(0.0);
                weight_u[idx].store(0.0);
                weight_v[idx].store(0.0);
                *density = 0.0;
                first_particle[idx].store(-1, Ordering::Relaxed);

                let boundary = i == 0 || j == 0 || i + 1 == w || j + 1 == h;
                let in_obstacle = push && {
                    let center =
                        Vec2::new((i as f32 + 0.5) * cell_size, (j as f32 + 0.5) * cell_size);
                    (center - obstacle.position).length_squared() < radius_sq
                };

                let kind = if boundary {
                    CellType::Solid
                } else if in_obstacle {
                    CellType::Solid
                } else {
                    CellType::Air
                };
                *s = if kind == CellType::Solid { 0.0 } else { 1.0 };
                cell_type[idx].store(kind as u8, Ordering::Relaxed);
            });
    }

    // ------------------------------------------------------------------------
    // Bilinear stencils
    // ------------------------------------------------------------------------

    /// Stencil over u nodes (left faces, offset half a cell in y).
    #[inline]
    pub fn u_stencil(&self, pos: Vec2) -> Stencil {
        self.face_stencil(pos, Vec2::new(0.0, 0.5))
    }

    /// Stencil over v nodes (bottom faces, offset half a cell in x).
    #[inline]
    pub fn v_stencil(&self, pos: Vec2) -> Stencil {
        self.face_stencil(pos, Vec2::new(0.5, 0.0))
    }

    fn face_stencil(&self, pos: Vec2, offset: Vec2) -> Stencil {
        let h = self.cell_size;
        let x = pos.x.clamp(h, (self.width - 1) as f32 * h);
        let y = pos.y.clamp(h, (self.height - 1) as f32 * h);

        let fx = x / h - offset.x;
        let fy = y / h - offset.y;
        let i0 = (fx.floor() as i32).clamp(0, self.width as i32 - 2) as usize;
        let j0 = (fy.floor() as i32).clamp(0, self.height as i32 - 2) as usize;
        let tx = (fx - i0 as f32).clamp(0.0, 1.0);
        let ty = (fy - j0 as f32).clamp(0.0, 1.0);
        let sx = 1.0 - tx;
        let sy = 1.0 - ty;

        let n0 = self.cell_index(i0, j0);
        Stencil {
            nodes: [n0, n0 + 1, n0 + self.width, n0 + self.width + 1],
            weights: [sx * sy, tx * sy, sx * ty, tx * ty],
        }
    }

    /// Bilinear sample of u at `pos`.
    pub fn sample_u(&self, pos: Vec2) -> f32 {
        let s = self.u_stencil(pos);
        (0..4).map(|k| s.weights[k] * self.u(s.nodes[k])).sum()
    }

    /// Bilinear sample of v at `pos`.
    pub fn sample_v(&self, pos: Vec2) -> f32 {
        let s = self.v_stencil(pos);
        (0..4).map(|k| s.weights[k] * self.v(s.nodes[k])).sum()
    }

    /// Current grid velocity at `pos` (the PIC value).
    pub fn sample_velocity(&self, pos: Vec2) -> Vec2 {
        Vec2::new(self.sample_u(pos), self.sample_v(pos))
    }

    /// Pre-pressure grid velocity at `pos`.
    pub fn sample_prev_velocity(&self, pos: Vec2) -> Vec2 {
        let su = self.u_stencil(pos);
        let sv = self.v_stencil(pos);
        let mut out = Vec2::ZERO;
        for k in 0..4 {
            out.x += su.weights[k] * self.prev_u[su.nodes[k]];
            out.y += sv.weights[k] * self.prev_v[sv.nodes[k]];
        }
        out
    }

    // ------------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------------

    /// Net outflow of interior cell (i, j): u[right] - u + v[top] - v.
    #[inline]
    pub fn divergence(&self, i: usize, j: usize) -> f32 {
        let idx = self.cell_index(i, j);
        self.u(idx + 1) - self.u(idx) + self.v(idx + self.width) - self.v(idx)
    }

    /// Sum of |divergence| over interior fluid cells
    pub fn total_divergence(&self) -> f32 {
        let mut total = 0.0;
        for j in 1..self.height - 1 {
            for i in 1..self.width - 1 {
                if self.cell_type(self.cell_index(i, j)) == CellType::Fluid {
                    total += self.divergence(i, j).abs();
                }
            }
        }
        total
    }

    /// Sum of squared face velocities
    pub fn face_energy(&self) -> f32 {
        (0..self.cell_count())
            .map(|idx| {
                let u = self.u(idx);
                let v = self.v(idx);
                u * u + v * v
            })
            .sum()
    }

    /// Snapshot every cell into `out` (cleared first).
    pub fn export_cells(&self, out: &mut Vec<GridCell>) {
        out.clear();
        out.extend((0..self.cell_count()).map(|idx| GridCell {
            u: self.u(idx),
            v: self.v(idx),
            weight_u: self.weight_u(idx),
            weight_v: self.weight_v(idx),
            prev_u: self.prev_u[idx],
            prev_v: self.prev_v[idx],
            density: self.density[idx],
            solid_fraction: self.solid_fraction[idx],
            cell_type: self.cell_type(idx) as u32,
            first_particle: self.first_particle(idx),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_marks_boundary_ring_solid() {
        let mut grid = Grid::new(6, 5, 1.0);
        let obstacle = Obstacle {
            radius: 0.0,
            ..Default::default()
        };
        grid.clear(&obstacle);

        for j in 0..5 {
            for i in 0..6 {
                let idx = grid.cell_index(i, j);
                if grid.is_boundary(i, j) {
                    assert_eq!(grid.cell_type(idx), CellType::Solid);
                    assert_eq!(grid.solid_fraction[idx], 0.0);
                } else {
                    assert_eq!(grid.cell_type(idx), CellType::Air);
                    assert_eq!(grid.solid_fraction[idx], 1.0);
                }
                assert_eq!(grid.first_particle(idx), -1);
            }
        }
    }

    #[test]
    fn test_clear_push_obstacle_is_solid_with_empty_accumulators() {
        let mut grid = Grid::new(10, 10, 1.0);
        let obstacle = Obstacle {
            position: Vec2::new(5.0, 5.0),
            velocity: Vec2::new(2.0, -1.0),
            radius: 1.0,
            mode: InteractionMode::Push,
            strength: 1.0,
        };
        grid.clear(&obstacle);

        let idx = grid.cell_index(4, 4); // centre (4.5, 4.5), inside
        assert_eq!(grid.cell_type(idx), CellType::Solid);
        assert_eq!(grid.solid_fraction[idx], 0.0);
        assert_eq!(grid.u(idx), 0.0);
        assert_eq!(grid.v(idx), 0.0);

        let far = grid.cell_index(2, 2);
        assert_eq!(grid.cell_type(far), CellType::Air);
    }

    #[test]
    fn test_clear_other_modes_leave_obstacle_open() {
        let mut grid = Grid::new(10, 10, 1.0);
        let obstacle = Obstacle {
            position: Vec2::new(5.0, 5.0),
            velocity: Vec2::new(2.0, -1.0),
            radius: 1.0,
            mode: InteractionMode::Vortex,
            strength: 1.0,
        };
        grid.clear(&obstacle);

        let idx = grid.cell_index(4, 4);
        assert_eq!(grid.cell_type(idx), CellType::Air);
        assert_eq!(grid.u(idx), 0.0);
    }

    #[test]
    fn test_mark_fluid_respects_solid() {
        let grid = Grid::new(4, 4, 1.0);
        grid.set_cell_type(0, CellType::Solid);
        grid.mark_fluid(0);
        grid.mark_fluid(5);
        assert_eq!(grid.cell_type(0), CellType::Solid);
        assert_eq!(grid.cell_type(5), CellType::Fluid);
    }

    #[test]
    fn test_stencil_weights_sum_to_one() {
        let grid = Grid::new(8, 8, 0.5);
        for pos in [Vec2::new(1.3, 2.1), Vec2::new(0.0, 0.0), Vec2::new(3.99, 3.99)] {
            for s in [grid.u_stencil(pos), grid.v_stencil(pos)] {
                let sum: f32 = s.weights.iter().sum();
                assert!((sum - 1.0).abs() < 1e-5, "weights sum {}", sum);
            }
        }
    }

    #[test]
    fn test_sample_exact_at_node() {
        let grid = Grid::new(8, 8, 1.0);
        let idx = grid.cell_index(3, 2);
        grid.set_u(idx, 7.0);
        // u node (3, 2) sits at (3.0, 2.5)
        assert!((grid.sample_u(Vec2::new(3.0, 2.5)) - 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_divergence_of_outflow() {
        let grid = Grid::new(5, 5, 1.0);
        let idx = grid.cell_index(2, 2);
        grid.set_u(idx + 1, 1.0);
        assert_eq!(grid.divergence(2, 2), 1.0);
        assert_eq!(grid.divergence(3, 2), -1.0);
    }

    #[test]
    fn test_export_cells_matches_fields() {
        let grid = Grid::new(4, 3, 1.0);
        grid.set_u(5, 1.5);
        let mut cells = Vec::new();
        grid.export_cells(&mut cells);
        assert_eq!(cells.len(), 12);
        assert_eq!(cells[5].u, 1.5);
        assert_eq!(cells[5].cell_type, CellType::Air as u32);
        let bytes: &[u8] = bytemuck::cast_slice(&cells);
        assert_eq!(bytes.len(), 12 * std::mem::size_of::<GridCell>());
    }
}
