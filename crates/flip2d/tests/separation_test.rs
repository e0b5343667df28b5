//! Particle separation and cohesion tests

use flip2d::interaction::separate;
use flip2d::particle::pack_color;
use flip2d::{neighbor, Grid, Obstacle, Particle, SimulationConfig, Vec2};

const CELL: f32 = 0.1;

fn config() -> SimulationConfig {
    SimulationConfig {
        obstacle: Obstacle {
            radius: 0.0,
            ..Default::default()
        },
        color_diffusion: 0.0,
        ..SimulationConfig::with_grid(20, 20, CELL)
    }
}

/// Run one separation call the way a frame does: fresh cell lists first.
fn run(grid: &mut Grid, particles: &mut [Particle], config: &SimulationConfig) {
    grid.clear(&config.obstacle);
    neighbor::build(grid, particles);
    separate(grid, particles, config);
}

fn pair(distance: f32) -> Vec<Particle> {
    vec![
        Particle::new(Vec2::new(1.0 - distance * 0.5, 1.0), Vec2::ZERO),
        Particle::new(Vec2::new(1.0 + distance * 0.5, 1.0), Vec2::ZERO),
    ]
}

/// An overlapping pair is pushed apart to exactly the contact distance,
/// symmetrically about its midpoint
#[test]
fn test_overlapping_pair_converges_to_contact() {
    let config = config();
    let min_dist = 2.0 * config.particle_radius;
    let mut grid = Grid::from_config(&config);
    let mut particles = pair(0.2 * config.particle_radius);

    let mut previous = particles[0].position.distance(particles[1].position);
    for call in 0..20 {
        run(&mut grid, &mut particles, &config);
        let d = particles[0].position.distance(particles[1].position);
        assert!(
            d >= previous - 1e-7 && d <= min_dist + 1e-6,
            "Call {}: distance went from {} to {} (contact {})",
            call,
            previous,
            d,
            min_dist
        );
        previous = d;
    }
    assert!(
        (previous - min_dist).abs() < 1e-3 * config.particle_radius,
        "Pair settled at {} instead of {}",
        previous,
        min_dist
    );

    let midpoint = (particles[0].position + particles[1].position) * 0.5;
    assert!((midpoint - Vec2::new(1.0, 1.0)).length() < 1e-5);
}

/// Without cohesion, separated particles are left alone
#[test]
fn test_separated_pair_untouched() {
    let config = config();
    let mut grid = Grid::from_config(&config);
    let mut particles = pair(3.0 * config.particle_radius);
    let before = particles.clone();

    run(&mut grid, &mut particles, &config);

    assert_eq!(particles[0].position, before[0].position);
    assert_eq!(particles[1].position, before[1].position);
}

/// Surface tension draws a nearby pair together
#[test]
fn test_surface_tension_attracts() {
    let mut config = config();
    config.cohesion.surface_tension = 1.0;
    let min_dist = 2.0 * config.particle_radius;
    let mut grid = Grid::from_config(&config);
    let mut particles = pair(1.5 * min_dist);

    run(&mut grid, &mut particles, &config);

    let d = particles[0].position.distance(particles[1].position);
    assert!(d < 1.5 * min_dist, "distance {}", d);
    assert!(d > min_dist * 0.9);
}

/// One surface-tension iteration moves each particle of a pair by
/// σ·0.15·(1 − d/2.5·minDist)² of their separation
#[test]
fn test_surface_tension_step_scales_with_separation() {
    let mut config = config();
    config.cohesion.surface_tension = 1.0;
    config.separation_iterations = 1;
    let min_dist = 2.0 * config.particle_radius;
    let mut grid = Grid::from_config(&config);
    let start = 1.5 * min_dist;
    let mut particles = pair(start);

    run(&mut grid, &mut particles, &config);

    let pull = 1.0 - start / (2.5 * min_dist);
    let expected = start * (1.0 - 2.0 * 0.15 * pull * pull);
    let d = particles[0].position.distance(particles[1].position);
    assert!(
        (d - expected).abs() < 1e-5,
        "distance {} instead of {}",
        d,
        expected
    );
}

/// Hydrogen bonds pull a stretched pair toward its bond length
#[test]
fn test_hydrogen_bond_pulls_toward_target() {
    let mut config = config();
    config.cohesion.hydrogen_bonding = true;
    config.cohesion.hydrogen_strength = 1.0;
    let min_dist = 2.0 * config.particle_radius;
    let mut grid = Grid::from_config(&config);
    let mut particles = pair(1.4 * min_dist);

    run(&mut grid, &mut particles, &config);

    let d = particles[0].position.distance(particles[1].position);
    assert!(d < 1.4 * min_dist, "bond did not contract: {}", d);
    // bond steps are capped at 0.6r per iteration
    let max_step = 2.0 * 0.6 * config.particle_radius * config.separation_iterations as f32;
    assert!(1.4 * min_dist - d <= max_step + 1e-6);
}

/// Per-particle correction never exceeds half a cell per iteration
#[test]
fn test_correction_clamped() {
    let config = config();
    let mut grid = Grid::from_config(&config);
    let center = Vec2::new(1.0, 1.0);
    let mut particles: Vec<Particle> = (0..12)
        .map(|k| {
            let angle = k as f32 * std::f32::consts::TAU / 12.0;
            Particle::new(center + Vec2::from_angle(angle) * 1e-4, Vec2::ZERO)
        })
        .collect();
    let before: Vec<Vec2> = particles.iter().map(|p| p.position).collect();

    run(&mut grid, &mut particles, &config);

    let limit = 0.5 * CELL * config.separation_iterations as f32;
    for (p, b) in particles.iter().zip(&before) {
        assert!(p.position.distance(*b) <= limit + 1e-6);
    }
}

/// Overlapping particles blend colours when diffusion is on
#[test]
fn test_color_diffusion_blends_overlaps() {
    let mut config = config();
    config.color_diffusion = 1.0;
    let mut grid = Grid::from_config(&config);
    let mut particles = pair(0.2 * config.particle_radius);
    particles[0].color = pack_color([200, 0, 0, 255]);
    particles[1].color = pack_color([0, 0, 200, 255]);

    run(&mut grid, &mut particles, &config);

    assert_eq!(particles[0].color, pack_color([100, 0, 100, 255]));
    assert_eq!(particles[1].color, particles[0].color);
}
