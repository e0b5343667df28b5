//! Headless dam break with a dragged obstacle
//!
//! Run with: RUST_LOG=debug cargo run --release --example dam_break -p flip2d
//! Optional argument: path to a JSON or YAML config.

use std::path::Path;
use std::time::Instant;

use flip2d::{FlipSimulation, InteractionMode, Scenario, SimulationConfig};

fn main() -> Result<(), flip2d::ConfigError> {
    env_logger::init();

    const FRAMES: usize = 600; // 10 seconds at 60 FPS
    const CAPACITY: usize = 20_000;

    let config = match std::env::args().nth(1) {
        Some(path) if path.ends_with(".yaml") || path.ends_with(".yml") => {
            SimulationConfig::load_yaml(Path::new(&path))?
        }
        Some(path) => SimulationConfig::load_json(Path::new(&path))?,
        None => SimulationConfig::default(),
    };

    println!(
        "Setting up {}x{} grid, h = {}, {} particles",
        config.resolution.width, config.resolution.height, config.cell_size, config.particle_count
    );

    let mut sim = FlipSimulation::with_scenario(config, CAPACITY, Scenario::DamBreak)?;
    let domain = sim.config().domain_size();

    let start = Instant::now();
    for frame in 0..FRAMES {
        // Sweep the obstacle back and forth through the lower half
        let t = frame as f32 / 60.0;
        let x = domain.x * (0.5 + 0.3 * (t * 0.8).sin());
        sim.set_obstacle(x, domain.y * 0.3, true);

        if frame == 300 {
            sim.apply_shake_impulse();
        }
        if frame == 420 {
            let mut config = sim.config().clone();
            config.obstacle.mode = InteractionMode::Vortex;
            sim.set_config(config)?;
        }

        sim.step();

        if frame % 60 == 0 {
            let stats = sim.stats();
            println!(
                "  Frame {}: {}/{} in domain, max speed {:.2}, rest density {:.2}, div {:.3}",
                frame,
                stats.in_domain,
                stats.active_particles,
                stats.max_speed,
                stats.rest_density,
                stats.divergence
            );
        }
    }

    let elapsed = start.elapsed();
    let avg_ms = elapsed.as_secs_f64() * 1000.0 / FRAMES as f64;
    println!("\n=== Results ===");
    println!("Average frame time: {:.2} ms ({:.1} FPS)", avg_ms, 1000.0 / avg_ms);
    Ok(())
}
