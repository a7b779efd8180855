use std::time::Instant;

use crate::simulation::engine::Engine;
use crate::simulation::errors::ConfigError;
use crate::simulation::forces::DirectGravity;
use crate::simulation::params::Parameters;
use crate::simulation::states::{Bounds, NVec2};
use crate::simulation::universe::Simulation;

const HALF_WIDTH: f64 = 1000.0;

/// Helper to build a simulation holding `n` bodies
fn make_simulation(n: usize, engine: Engine) -> Result<Simulation, ConfigError> {
    let bounds = Bounds::from_center(NVec2::zeros(), HALF_WIDTH, HALF_WIDTH);
    let mut sim = Simulation::with_bounds(bounds, engine, make_params())?;

    for i in 0..n {
        let i_f = i as f64;
        // deterministic positions, no rand needed
        let x = NVec2::new((i_f * 0.37).sin() * 500.0, (i_f * 0.13).cos() * 500.0);
        if sim.register_star(x, 1.0, NVec2::zeros()).is_err() {
            log::warn!("benchmark body {i} could not be placed");
        }
    }
    Ok(sim)
}

fn make_params() -> Parameters {
    Parameters {
        t_end: 100.0,
        h0: 0.01,
        eps2: 1e-4,
        ..Default::default()
    }
}

fn engine(barnes_hut: bool) -> Engine {
    Engine {
        barnes_hut,
        ..Default::default()
    }
}

/// Time one force evaluation: all pairs, tree with every leaf opened, and
/// tree with the opening angle.
pub fn bench_forces() -> Result<(), ConfigError> {
    // Different system sizes to test
    let ns = [200, 400, 800, 1600, 3200, 6400];

    for n in ns {
        let sim = make_simulation(n, engine(true))?;
        let bodies = sim.live_bodies();
        let direct = DirectGravity { law: sim.law() };
        let delta = sim.engine().opening_angle();

        // Warm up
        let _ = direct.accelerations(&bodies);
        let _ = sim.accelerations(delta);

        // Time direct
        let t0 = Instant::now();
        let _ = direct.accelerations(&bodies);
        let dt_direct = t0.elapsed().as_secs_f64();

        // Time the tree, nothing accepted early
        let t1 = Instant::now();
        let _ = sim.accelerations(0.0);
        let dt_full = t1.elapsed().as_secs_f64();

        // Time barnes-hut
        let t2 = Instant::now();
        let _ = sim.accelerations(delta);
        let dt_bh = t2.elapsed().as_secs_f64();

        println!(
            "N = {n:5}, direct = {:8.6} s, tree (delta 0) = {:8.6} s, BH = {:8.6} s",
            dt_direct, dt_full, dt_bh
        );
    }
    Ok(())
}

/// Time full steps (forces, integration and tree maintenance) for a range of
/// n. Paste output directly into a spreadsheet to graph.
pub fn bench_step_curve() -> Result<(), ConfigError> {
    println!("N,exact_ms,bh_ms");

    // Steps of 200 to give smoother graph
    for n in (200..=12800).step_by(200) {
        // Small n: average over a few steps to smooth noise
        // Large n: only 1 step to avoid minutes of runtime
        let steps_exact = if n <= 800 { 5 } else { 1 };
        let steps_bh = if n <= 2000 { 3 } else { 1 };

        let mut sim_exact = make_simulation(n, engine(false))?;
        let t0 = Instant::now();
        for _ in 0..steps_exact {
            sim_exact.step();
        }
        let ms_exact = t0.elapsed().as_secs_f64() * 1000.0 / steps_exact as f64;

        let mut sim_bh = make_simulation(n, engine(true))?;
        let t1 = Instant::now();
        for _ in 0..steps_bh {
            sim_bh.step();
        }
        let ms_bh = t1.elapsed().as_secs_f64() * 1000.0 / steps_bh as f64;

        println!("{},{:.6},{:.6}", n, ms_exact, ms_bh);
    }
    Ok(())
}
