//! Rest density measurement.
//!
//! Drift compensation needs to know what "uncompressed" looks like for the
//! current particle spacing. Shortly after each reset, once the fluid has
//! settled into its initial packing, the mean density over FLUID cells is
//! taken as the rest density.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::atomic::AtomicF32;
use crate::constants::MIN_REST_DENSITY;
use crate::grid::{CellType, Grid};

/// Mean density over FLUID cells, floored at [`MIN_REST_DENSITY`].
///
/// Returns `None` when the grid has no FLUID cells, in which case the
/// caller should try again on a later frame.
pub fn measure_rest_density(grid: &Grid) -> Option<f32> {
    let sum = AtomicF32::new(0.0);
    let count = AtomicUsize::new(0);

    grid.density.par_iter().enumerate().for_each(|(idx, &density)| {
        if grid.cell_type(idx) == CellType::Fluid {
            sum.fetch_add(density);
            count.fetch_add(1, Ordering::Relaxed);
        }
    });

    let count = count.into_inner();
    if count == 0 {
        return None;
    }
    Some((sum.load() / count as f32).max(MIN_REST_DENSITY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_fluid_means_no_measurement() {
        let grid = Grid::new(5, 5, 1.0);
        assert_eq!(measure_rest_density(&grid), None);
    }

    #[test]
    fn test_mean_over_fluid_cells_only() {
        let mut grid = Grid::new(5, 5, 1.0);
        for (idx, density) in [(6, 6.0), (7, 10.0), (8, 100.0)] {
            grid.density[idx] = density;
        }
        grid.mark_fluid(6);
        grid.mark_fluid(7);
        assert_eq!(measure_rest_density(&grid), Some(8.0));
    }

    #[test]
    fn test_floor_applies() {
        let mut grid = Grid::new(5, 5, 1.0);
        grid.density[6] = 0.5;
        grid.mark_fluid(6);
        assert_eq!(measure_rest_density(&grid), Some(MIN_REST_DENSITY));
    }
}
