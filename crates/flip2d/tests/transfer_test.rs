//! Particle-grid transfer tests
//!
//! Splat/finalize normalisation and gather blending on a 16×16 grid.

use flip2d::grid::Grid;
use flip2d::{neighbor, transfer, CellType, InteractionMode, Obstacle, Particle, Vec2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn open_obstacle() -> Obstacle {
    Obstacle {
        radius: 0.0,
        ..Default::default()
    }
}

fn random_particles(rng: &mut ChaCha8Rng, count: usize, lo: f32, hi: f32, velocity: Vec2) -> Vec<Particle> {
    (0..count)
        .map(|_| {
            let pos = Vec2::new(rng.gen_range(lo..hi), rng.gen_range(lo..hi));
            Particle::new(pos, velocity)
        })
        .collect()
}

/// Uniform particle velocity normalises to exactly that velocity on every
/// weighted interior face
#[test]
fn test_weight_normalisation() {
    let mut grid = Grid::new(16, 16, 1.0);
    grid.clear(&open_obstacle());
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let velocity = Vec2::new(1.5, -0.5);
    let particles = random_particles(&mut rng, 400, 2.0, 14.0, velocity);

    transfer::splat(&grid, &particles);
    transfer::finalize(&mut grid, &open_obstacle());

    let mut checked = 0;
    for j in 1..15 {
        for i in 2..15 {
            let idx = grid.cell_index(i, j);
            if grid.weight_u(idx) > 1e-3 {
                assert!(
                    (grid.u(idx) - velocity.x).abs() < 1e-4,
                    "u at ({}, {}) = {}",
                    i,
                    j,
                    grid.u(idx)
                );
                checked += 1;
            }
        }
    }
    for j in 2..15 {
        for i in 1..15 {
            let idx = grid.cell_index(i, j);
            if grid.weight_v(idx) > 1e-3 {
                assert!(
                    (grid.v(idx) - velocity.y).abs() < 1e-4,
                    "v at ({}, {}) = {}",
                    i,
                    j,
                    grid.v(idx)
                );
                checked += 1;
            }
        }
    }
    assert!(checked > 100, "Only {} faces carried weight", checked);
}

/// Faces with no weight come out at rest
#[test]
fn test_unweighted_faces_are_zero() {
    let mut grid = Grid::new(16, 16, 1.0);
    grid.clear(&open_obstacle());
    let particles = vec![Particle::new(Vec2::new(4.5, 4.5), Vec2::new(2.0, 2.0))];

    transfer::splat(&grid, &particles);
    transfer::finalize(&mut grid, &open_obstacle());

    let far = grid.cell_index(12, 12);
    assert_eq!(grid.weight_u(far), 0.0);
    assert_eq!(grid.u(far), 0.0);
    assert_eq!(grid.v(far), 0.0);
}

/// Only cells holding particles become FLUID; walls stay SOLID
#[test]
fn test_cell_classification_after_splat() {
    let mut grid = Grid::new(8, 8, 1.0);
    grid.clear(&open_obstacle());
    let particles = vec![
        Particle::new(Vec2::new(1.2, 1.2), Vec2::ZERO),
        Particle::new(Vec2::new(5.5, 3.5), Vec2::ZERO),
    ];
    transfer::splat(&grid, &particles);

    assert_eq!(grid.cell_type(grid.cell_index(1, 1)), CellType::Fluid);
    assert_eq!(grid.cell_type(grid.cell_index(5, 3)), CellType::Fluid);
    assert_eq!(grid.cell_type(grid.cell_index(0, 0)), CellType::Solid);
    assert_eq!(grid.fluid_cell_count(), 2);
}

/// flip_ratio = 0 gives exactly the bilinear PIC sample
#[test]
fn test_pure_pic_gather_equals_sample() {
    let mut grid = Grid::new(16, 16, 1.0);
    grid.clear(&open_obstacle());
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let mut particles = random_particles(&mut rng, 200, 1.5, 14.5, Vec2::ZERO);
    for p in &mut particles {
        p.velocity = Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
    }

    transfer::splat(&grid, &particles);
    transfer::finalize(&mut grid, &open_obstacle());

    let expected: Vec<Vec2> = particles
        .iter()
        .map(|p| grid.sample_velocity(p.position))
        .collect();
    transfer::gather(&grid, &mut particles, 0.0);

    for (p, e) in particles.iter().zip(&expected) {
        assert!(
            (p.velocity - *e).length() < 1e-6,
            "PIC gather {:?} != sample {:?}",
            p.velocity,
            e
        );
    }
}

/// With an unchanged grid, pure FLIP keeps each particle's own velocity
#[test]
fn test_pure_flip_without_grid_change_keeps_velocity() {
    let mut grid = Grid::new(16, 16, 1.0);
    grid.clear(&open_obstacle());
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let mut particles = random_particles(&mut rng, 100, 5.0, 11.0, Vec2::ZERO);
    for p in &mut particles {
        p.velocity = Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
    }
    let before: Vec<Vec2> = particles.iter().map(|p| p.velocity).collect();

    transfer::splat(&grid, &particles);
    transfer::finalize(&mut grid, &open_obstacle());
    transfer::gather(&grid, &mut particles, 1.0);

    for (p, v) in particles.iter().zip(&before) {
        assert!((p.velocity - *v).length() < 1e-6);
    }
}

/// Density is highest where particles are packed
#[test]
fn test_density_tracks_packing() {
    let mut grid = Grid::new(12, 12, 1.0);
    grid.clear(&open_obstacle());
    let mut particles: Vec<Particle> = (0..16)
        .map(|k| Particle::new(Vec2::new(3.2 + (k % 4) as f32 * 0.2, 3.2 + (k / 4) as f32 * 0.2), Vec2::ZERO))
        .collect();
    particles.push(Particle::new(Vec2::new(9.5, 9.5), Vec2::ZERO));

    neighbor::build(&grid, &mut particles);
    transfer::splat(&grid, &particles);
    transfer::estimate_density(&mut grid, &particles);

    let packed = grid.density[grid.cell_index(3, 3)];
    let lone = grid.density[grid.cell_index(9, 9)];
    assert!(packed > 4.0, "packed density {}", packed);
    assert!((lone - 1.0).abs() < 1e-5, "lone density {}", lone);
}

/// A lightly weighted face of a moving PUSH obstacle keeps a zero FLIP
/// baseline, so a resting particle beside it picks up only the obstacle's
/// share of the grid change
#[test]
fn test_push_obstacle_baseline_ignores_obstacle_velocity() {
    let mut grid = Grid::new(10, 10, 1.0);
    let obstacle = Obstacle {
        position: Vec2::new(5.0, 5.0),
        velocity: Vec2::new(5.0, 0.0),
        radius: 0.8,
        mode: InteractionMode::Push,
        strength: 1.0,
    };
    grid.clear(&obstacle);
    let mut particles = vec![Particle::new(Vec2::new(3.1, 4.5), Vec2::ZERO)];

    transfer::splat(&grid, &particles);
    transfer::finalize(&mut grid, &obstacle);

    // left face of obstacle cell (4, 4)
    let face = grid.cell_index(4, 4);
    assert_eq!(grid.cell_type(face), CellType::Solid);
    assert!(
        (grid.weight_u(face) - 0.1).abs() < 1e-4,
        "weight {}",
        grid.weight_u(face)
    );
    assert!(grid.prev_u[face].abs() < 1e-6, "prev_u = {}", grid.prev_u[face]);
    assert_eq!(grid.u(face), 5.0);

    transfer::gather(&grid, &mut particles, 1.0);
    let velocity = particles[0].velocity;
    assert!(
        velocity.x >= 0.0 && velocity.x <= 0.5 + 1e-4,
        "resting particle kicked to {:?}",
        velocity
    );
    assert!(velocity.y.abs() < 1e-5);
}
