#![allow(non_snake_case)]

use bhquad::simulation::params::G_GALACTIC;
use bhquad::simulation::states::MASS_EPSILON;
use bhquad::{
    BodyHandle, Bounds, DirectGravity, Engine, GalaxySpec, NVec2, Parameters, Placement, Relocation, Scenario,
    ConfigError, ScenarioConfig, Simulation, TreeError, Viewport,
};

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default physics parameters for tests
pub fn test_params() -> Parameters {
    Parameters {
        t_end: 1.0,
        h0: 0.01,
        eps2: 0.0,
        G: G_GALACTIC,
        root_scale: 1.0,
        seed: 42,
    }
}

/// Empty simulation whose root is the square [-half, half]^2
pub fn square_sim(half: f64, params: Parameters) -> Simulation {
    let bounds = Bounds::from_center(NVec2::zeros(), half, half);
    Simulation::with_bounds(bounds, Engine::default(), params).unwrap()
}

/// Scatter `n` unit-ish masses over [-spread, spread]^2
pub fn cloud(sim: &mut Simulation, n: usize, spread: f64, seed: u64) -> Vec<BodyHandle> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let x = NVec2::new(rng.gen_range(-spread..spread), rng.gen_range(-spread..spread));
            let m = rng.gen_range(0.5..2.0);
            sim.register_star(x, m, NVec2::zeros()).unwrap()
        })
        .collect()
}

fn assert_consistent(sim: &Simulation) {
    let problems = sim.tree().validate(sim.table(), 1e-6);
    assert!(problems.is_empty(), "tree invariants broken: {problems:#?}");
}

// Mass-weighted mean over the live bodies, computed from scratch
fn fresh_aggregate(sim: &Simulation) -> (f64, NVec2) {
    let bodies = sim.live_bodies();
    let mass: f64 = bodies.iter().map(|b| b.m).sum();
    let moment = bodies.iter().fold(NVec2::zeros(), |acc, b| acc + b.x * b.m);
    (mass, moment / mass)
}

// ==================================================================================
// Registration and aggregates
// ==================================================================================

#[test]
fn root_aggregate_matches_registered_bodies() {
    let mut sim = square_sim(100.0, test_params());
    let placed = [(10.0, 20.0, 3.0), (-50.0, 5.0, 1.0), (70.0, -70.0, 6.0), (11.0, 21.0, 2.0)];
    for (x, y, m) in placed {
        sim.register_star(NVec2::new(x, y), m, NVec2::zeros()).unwrap();
    }

    let mass: f64 = placed.iter().map(|p| p.2).sum();
    let com = placed.iter().fold(NVec2::zeros(), |acc, p| acc + NVec2::new(p.0, p.1) * p.2) / mass;

    assert!((sim.total_mass() - mass).abs() < 1e-9);
    assert!((sim.center_of_mass() - com).norm() < 1e-9);
    assert_eq!(sim.live_count(), 4);
    assert_consistent(&sim);
}

#[test]
fn registration_rejects_massless_bodies() {
    let mut sim = square_sim(10.0, test_params());
    for m in [0.0, -1.0, MASS_EPSILON, f64::NAN] {
        let err = sim.register_star(NVec2::new(1.0, 1.0), m, NVec2::zeros()).unwrap_err();
        assert!(matches!(err, TreeError::NonPositiveMass(_)));
    }
    assert_eq!(sim.live_count(), 0);
    assert_eq!(sim.total_mass(), 0.0);
}

#[test]
fn registration_outside_root_fails_without_side_effects() {
    let mut sim = square_sim(10.0, test_params());
    sim.register_star(NVec2::new(1.0, 1.0), 2.0, NVec2::zeros()).unwrap();

    let err = sim.register_star(NVec2::new(50.0, 0.0), 1.0, NVec2::zeros()).unwrap_err();
    assert!(matches!(err, TreeError::InsertionFailure { .. }));
    assert_eq!(sim.total_mass(), 2.0);
    assert_eq!(sim.center_of_mass(), NVec2::new(1.0, 1.0));
    assert_eq!(sim.stats().insertion_failures, 1);
    assert_consistent(&sim);
}

#[test]
fn close_bodies_are_both_retained() {
    let mut sim = square_sim(1000.0, test_params());
    let a = sim.register_star(NVec2::new(12.345, -6.789), 1.0, NVec2::zeros()).unwrap();
    let b = sim.register_star(NVec2::new(12.346, -6.789), 1.0, NVec2::zeros()).unwrap();

    assert_ne!(a, b);
    assert_eq!(sim.live_count(), 2);
    assert_eq!(sim.body(a).unwrap().x, NVec2::new(12.345, -6.789));
    assert_eq!(sim.body(b).unwrap().x, NVec2::new(12.346, -6.789));

    let leaf_a = sim.table().lookup(a).unwrap();
    let leaf_b = sim.table().lookup(b).unwrap();
    assert_ne!(leaf_a, leaf_b);
    assert!(sim.tree().node(leaf_a).unwrap().depth() > 15);
    assert_consistent(&sim);
}

#[test]
fn only_bodies_are_leaves() {
    let mut sim = square_sim(100.0, test_params());
    cloud(&mut sim, 200, 90.0, 3);
    for _ in 0..20 {
        sim.step();
    }

    let mut leaves = 0;
    sim.traverse(|view, _| {
        assert_eq!(view.is_leaf(), view.handle().is_some());
        if view.is_leaf() {
            leaves += 1;
            assert!(view.node().children().all(|c| sim.tree().node(c).unwrap().mass() <= MASS_EPSILON));
        }
        true
    });
    assert_eq!(leaves, sim.live_count());
}

proptest! {
    #[test]
    fn root_aggregate_is_mass_weighted_mean(
        bodies in prop::collection::vec((-99.0f64..99.0, -99.0f64..99.0, 0.01f64..100.0), 1..60)
    ) {
        let mut sim = square_sim(100.0, test_params());
        let mut placed = Vec::new();
        for (x, y, m) in bodies {
            if sim.register_star(NVec2::new(x, y), m, NVec2::zeros()).is_ok() {
                placed.push((NVec2::new(x, y), m));
            }
        }

        let mass: f64 = placed.iter().map(|p| p.1).sum();
        let com = placed.iter().fold(NVec2::zeros(), |acc, p| acc + p.0 * p.1) / mass;

        prop_assert!((sim.total_mass() - mass).abs() <= 1e-6 * mass);
        prop_assert!((sim.center_of_mass() - com).norm() <= 1e-6 * 100.0);
    }
}

// ==================================================================================
// Forces
// ==================================================================================

#[test]
fn gravity_newton_third_law() {
    let mut sim = square_sim(10.0, test_params());
    let a = sim.register_star(NVec2::new(-0.5, 0.0), 2.0, NVec2::zeros()).unwrap();
    let b = sim.register_star(NVec2::new(0.5, 0.0), 3.0, NVec2::zeros()).unwrap();

    let acc = sim.accelerations(0.5);
    let of = |h: BodyHandle| acc.iter().find(|(k, _)| *k == h).unwrap().1;

    let net = of(a) * 2.0 + of(b) * 3.0;
    assert!(net.norm() < 1e-12, "Net momentum not zero: {:?}", net);
    assert!(of(a).x > 0.0, "Acceleration is not toward second body");
}

#[test]
fn zero_delta_matches_direct_summation() {
    let mut sim = square_sim(100.0, test_params());
    cloud(&mut sim, 300, 95.0, 11);

    let bodies = sim.live_bodies();
    let direct = DirectGravity { law: sim.law() }.accelerations(&bodies);
    let tree = sim.accelerations(0.0);

    for ((handle, a_tree), (body, a_direct)) in tree.iter().zip(bodies.iter().zip(direct.iter())) {
        assert_eq!(*handle, body.handle);
        assert!((a_tree - a_direct).norm() <= 1e-9 * a_direct.norm().max(1e-12));
    }
}

#[test]
fn opening_angle_sweep_degrades_gradually() {
    let mut sim = square_sim(100.0, test_params());
    cloud(&mut sim, 400, 95.0, 5);

    let exact = sim.accelerations(0.0);
    let norm2: f64 = exact.iter().map(|(_, a)| a.norm_squared()).sum();

    let rms_error = |delta: f64| {
        let approx = sim.accelerations(delta);
        let err2: f64 = approx.iter().zip(&exact).map(|((_, a), (_, e))| (a - e).norm_squared()).sum();
        (err2 / norm2).sqrt()
    };

    let errors: Vec<f64> = [0.0, 0.2, 0.5, 1.0].into_iter().map(rms_error).collect();
    assert!(errors[0] < 1e-12);
    assert!(errors[1] <= errors[3]);
    assert!(errors[2] < 0.05, "delta 0.5 error too large: {}", errors[2]);
    assert!(errors[3] < 0.5);

    // a huge delta still opens every cell that encloses the body itself
    let coarse = rms_error(1e9);
    assert!(coarse.is_finite());
    assert!(coarse > errors[2], "coarse error {coarse}");
}

#[test]
fn fast_angles_stay_close_to_exact() {
    for k in 0..63 {
        let theta = k as f64 * 0.1;
        let mut sim = square_sim(100.0, test_params());
        sim.register_star(NVec2::zeros(), 1.0e4, NVec2::zeros()).unwrap();
        let outer = sim
            .register_star(NVec2::new(50.0 * theta.cos(), 50.0 * theta.sin()), 1.0, NVec2::zeros())
            .unwrap();

        let pick = |sim: &Simulation| sim.accelerations(0.5).into_iter().find(|(h, _)| *h == outer).unwrap().1;
        let exact = pick(&sim);
        sim.engine_mut().angle = bhquad::AngleMode::Fast;
        let fast = pick(&sim);

        // same magnitude, direction off by about 1e-2 rad at most
        assert!((exact.norm() - fast.norm()).abs() <= 1e-12 * exact.norm());
        let cos = exact.dot(&fast) / (exact.norm() * fast.norm());
        assert!(cos.min(1.0).acos() < 1.5e-2, "angle {theta}: {exact:?} vs {fast:?}");
    }
}

// ==================================================================================
// Stepping and maintenance
// ==================================================================================

#[test]
fn two_body_orbit_closes_after_one_period() {
    let (M, r) = (1.0e6, 100.0);
    let v = (G_GALACTIC * M / r).sqrt();
    let period = 2.0 * std::f64::consts::PI * r / v;

    let params = Parameters {
        t_end: period,
        h0: period / 1000.0,
        ..test_params()
    };
    let mut sim = square_sim(200.0, params);
    sim.register_star(NVec2::zeros(), M, NVec2::zeros()).unwrap();
    let companion = sim.register_star(NVec2::new(r, 0.0), 1.0, NVec2::new(0.0, v)).unwrap();

    let mut max_radius_error: f64 = 0.0;
    for _ in 0..1000 {
        sim.step();
        let x = sim.body(companion).unwrap().x;
        max_radius_error = max_radius_error.max((x.norm() - r).abs());
    }

    let end = sim.body(companion).unwrap().x;
    assert!((end - NVec2::new(r, 0.0)).norm() < 0.01 * r, "companion ended at {:?}", end);
    assert!(max_radius_error < 0.01 * r);
    assert_eq!(sim.live_count(), 2);
    assert!(sim.stats().migrated > 0);
    assert_consistent(&sim);
}

#[test]
fn departing_body_returns_root_mass_to_zero() {
    let mut sim = square_sim(10.0, test_params());
    let h = sim.register_star(NVec2::new(9.0, 0.0), 5.0, NVec2::new(500.0, 0.0)).unwrap();

    sim.step();

    assert_eq!(sim.total_mass(), 0.0);
    assert_eq!(sim.live_count(), 0);
    assert!(sim.body(h).is_none());
    assert!(sim.table().lookup(h).is_none());
    assert_eq!(sim.stats().departed, 1);
    assert_eq!(sim.tree().node_count(), 1);
}

#[test]
fn moved_bodies_keep_handles() {
    let mut sim = square_sim(10.0, test_params());
    let a = sim.register_star(NVec2::new(-5.0, -5.0), 1.0, NVec2::zeros()).unwrap();
    let b = sim.register_star(NVec2::new(5.0, 5.0), 3.0, NVec2::zeros()).unwrap();

    // same quadrant
    assert_eq!(sim.move_body(a, NVec2::new(-4.0, -6.0)).unwrap(), Relocation::Shifted);
    // across the root midpoint
    assert!(matches!(sim.move_body(a, NVec2::new(4.0, 6.0)).unwrap(), Relocation::Migrated(_)));
    assert_eq!(sim.body(a).unwrap().x, NVec2::new(4.0, 6.0));
    assert_eq!(sim.body(b).unwrap().x, NVec2::new(5.0, 5.0));

    let com = (NVec2::new(4.0, 6.0) + NVec2::new(5.0, 5.0) * 3.0) / 4.0;
    assert!((sim.center_of_mass() - com).norm() < 1e-12);
    assert_consistent(&sim);

    assert_eq!(sim.move_body(b, NVec2::new(20.0, 0.0)).unwrap(), Relocation::Departed);
    assert_eq!(sim.move_body(b, NVec2::zeros()), Err(TreeError::UnknownHandle(b.index())));
    assert_eq!(sim.total_mass(), 1.0);
}

#[test]
fn remove_body_hands_back_its_state() {
    let mut sim = square_sim(10.0, test_params());
    let a = sim.register_star(NVec2::new(1.0, 2.0), 2.0, NVec2::new(0.5, 0.0)).unwrap();
    sim.register_star(NVec2::new(-3.0, 2.0), 1.0, NVec2::zeros()).unwrap();

    let removed = sim.remove_body(a).unwrap();
    assert_eq!(removed.x, NVec2::new(1.0, 2.0));
    assert_eq!(removed.v, NVec2::new(0.5, 0.0));
    assert_eq!(removed.m, 2.0);
    assert_eq!(sim.total_mass(), 1.0);
    assert_eq!(sim.remove_body(a), Err(TreeError::UnknownHandle(a.index())));
    assert_consistent(&sim);
}

#[test]
fn aggregates_track_live_bodies_over_many_steps() {
    let params = Parameters {
        h0: 0.5,
        eps2: 1.0,
        ..test_params()
    };
    let mut sim = square_sim(400.0, params);
    sim.register_galaxy(&GalaxySpec {
        center: NVec2::new(20.0, -10.0),
        count: 300,
        core_mass: 1e6,
        core_velocity: NVec2::new(1.0, 0.0),
        radius_range: (10.0, 150.0),
        mass_range: (1.0, 10.0),
        placement: Placement::Random,
    });
    assert_eq!(sim.live_count(), 301);

    for _ in 0..100 {
        sim.step();
    }

    let (mass, com) = fresh_aggregate(&sim);
    assert!((sim.total_mass() - mass).abs() <= 1e-9 * mass);
    assert!((sim.center_of_mass() - com).norm() <= 1e-6);
    assert!(sim.stats().migrated > 0);
    assert_eq!(sim.steps(), 100);
    assert!((sim.time() - 50.0).abs() < 1e-9);

    for (handle, leaf) in sim.table().live() {
        let node = sim.tree().node(leaf).unwrap();
        assert_eq!(node.body().unwrap().handle, handle);
        assert!(node.bounds().contains(&node.position()));
    }
    assert_consistent(&sim);
}

#[test]
fn migrations_do_not_accumulate_empty_nodes() {
    let params = Parameters {
        h0: 0.5,
        eps2: 1.0,
        ..test_params()
    };
    let mut sim = square_sim(400.0, params);
    sim.register_galaxy(&GalaxySpec {
        center: NVec2::zeros(),
        count: 300,
        core_mass: 1e6,
        core_velocity: NVec2::zeros(),
        radius_range: (10.0, 150.0),
        mass_range: (1.0, 10.0),
        placement: Placement::Random,
    });

    for _ in 0..200 {
        sim.step();
    }
    assert!(sim.stats().migrated > 300, "only {} migrations", sim.stats().migrated);

    let nodes = sim.tree().node_count();
    assert!(nodes <= 4 * sim.live_count(), "{nodes} nodes for {} bodies", sim.live_count());

    let mut with_mass = 0;
    sim.traverse(|_, _| {
        with_mass += 1;
        true
    });
    assert_eq!(with_mass, nodes);
    assert_consistent(&sim);
}

#[test]
fn reported_velocity_trails_position_by_one_step() {
    let mut sim = square_sim(200.0, test_params());
    sim.register_star(NVec2::zeros(), 1.0e6, NVec2::zeros()).unwrap();
    let v0 = NVec2::new(0.0, 3.0);
    let h = sim.register_star(NVec2::new(100.0, 0.0), 1.0, v0).unwrap();

    sim.step();
    let first = sim.body(h).unwrap();
    // the position used v0 and the new acceleration, the velocity has not been kicked yet
    assert_eq!(first.v, v0);
    assert!(first.x.x < 100.0);
    assert!(first.x.y > 0.0);

    sim.step();
    let second = sim.body(h).unwrap();
    assert!(second.v.x < 0.0);
    assert_ne!(second.v, v0);
}

// ==================================================================================
// Galaxies and scenarios
// ==================================================================================

#[test]
fn empty_galaxy_is_a_single_star() {
    let spec = GalaxySpec {
        center: NVec2::new(3.0, -4.0),
        count: 0,
        core_mass: 5e5,
        core_velocity: NVec2::new(0.5, 0.25),
        radius_range: (1.0, 2.0),
        mass_range: (1.0, 2.0),
        placement: Placement::Fibonacci,
    };

    let mut by_galaxy = square_sim(50.0, test_params());
    let handles = by_galaxy.register_galaxy(&spec);

    let mut by_star = square_sim(50.0, test_params());
    let h = by_star.register_star(spec.center, spec.core_mass, spec.core_velocity).unwrap();

    assert_eq!(handles, vec![h]);
    assert_eq!(by_galaxy.live_bodies(), by_star.live_bodies());
    assert_eq!(by_galaxy.total_mass(), by_star.total_mass());
    assert_eq!(by_galaxy.center_of_mass(), by_star.center_of_mass());
}

#[test]
fn scenario_registers_bodies_and_galaxies() {
    let yaml = r#"
engine:
  barnes_hut: true
  angle: "fast"
parameters:
  t_end: 1.0
  h0: 0.1
universe:
  view_width: 800
  view_height: 600
  true_width: 400.0
bodies:
  - x: [ 10.0, 10.0 ]
    m: 5.0
  - x: [ -20.0, 0.0 ]
    v: [ 1.0, 0.0 ]
    m: 0.0
galaxies:
  - center: [ 50.0, 0.0 ]
    count: 25
    core_mass: 1.0e4
    radius_range: [ 5.0, 40.0 ]
    mass_range: [ 1.0, 1.0 ]
"#;
    let cfg: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
    let scenario = Scenario::build_scenario(cfg).unwrap();
    let sim = &scenario.simulation;

    // the massless body is skipped
    assert_eq!(sim.live_count(), 1 + 26);
    assert!((sim.total_mass() - (5.0 + 1.0e4 + 25.0)).abs() < 1e-9);
    assert_eq!(sim.engine().angle, bhquad::AngleMode::Fast);
    assert_eq!(sim.engine().delta, 0.5);
    assert_eq!(sim.parameters().G, G_GALACTIC);

    // root is the visible world grown by the default root scale
    let bounds = sim.tree().bounds();
    assert!((bounds.width() - 600.0).abs() < 1e-9);
    assert!((bounds.height() - 450.0).abs() < 1e-9);
    assert_eq!(scenario.steps_per_frame, 1);
}

#[test]
fn bundled_scenarios_parse() {
    for yaml in [include_str!("../scenarios/galaxy.yaml"), include_str!("../scenarios/two_body.yaml")] {
        let cfg: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
        let scenario = Scenario::build_scenario(cfg).unwrap();
        assert!(scenario.simulation.live_count() >= 2);
    }
}

#[test]
fn run_stops_at_end_time() {
    let params = Parameters {
        t_end: 1.0,
        h0: 0.1,
        ..test_params()
    };
    let mut sim = Simulation::new(800.0, 600.0, 400.0, params).unwrap();
    cloud(&mut sim, 20, 100.0, 2);
    sim.run();
    assert_eq!(sim.steps(), 10);
    assert!((sim.time() - 1.0).abs() < 1e-9);
}

#[test]
fn invalid_parameters_are_rejected() {
    let cases = [
        Parameters { h0: 0.0, ..test_params() },
        Parameters { h0: -0.1, ..test_params() },
        Parameters { h0: f64::NAN, ..test_params() },
        Parameters { h0: f64::INFINITY, ..test_params() },
        Parameters { t_end: f64::INFINITY, ..test_params() },
        Parameters { t_end: f64::NAN, ..test_params() },
        Parameters { root_scale: 0.0, ..test_params() },
        Parameters { eps2: -1.0, ..test_params() },
    ];
    for params in cases {
        let described = format!("{params:?}");
        assert!(Simulation::new(800.0, 600.0, 400.0, params.clone()).is_err(), "{described}");
        let bounds = Bounds::from_center(NVec2::zeros(), 10.0, 10.0);
        assert!(Simulation::with_bounds(bounds, Engine::default(), params).is_err(), "{described}");
    }
}

#[test]
fn degenerate_viewports_are_rejected() {
    let cases = [
        (0.0, 600.0, 400.0),
        (800.0, -600.0, 400.0),
        (800.0, 0.0, 400.0),
        (800.0, 600.0, 0.0),
        (800.0, 600.0, f64::NAN),
        (800.0, 600.0, f64::INFINITY),
        (f64::NAN, 600.0, 400.0),
    ];
    for (width, height, true_width) in cases {
        let viewport = Viewport { width, height, true_width };
        let expected = ConfigError::InvalidViewport { width, height, true_width };
        match Simulation::with_settings(viewport, Engine::default(), test_params()) {
            Err(ConfigError::InvalidViewport { .. }) => {}
            Err(e) => panic!("{viewport:?}: expected {expected}, got {e}"),
            Ok(_) => panic!("{viewport:?} was accepted"),
        }
    }
}

#[test]
fn degenerate_root_bounds_are_rejected() {
    let flat = Bounds::new(NVec2::new(-1.0, 0.0), NVec2::new(1.0, 0.0));
    let unbounded = Bounds::from_center(NVec2::zeros(), f64::INFINITY, 1.0);
    for bounds in [flat, unbounded] {
        assert!(matches!(
            Simulation::with_bounds(bounds, Engine::default(), test_params()),
            Err(ConfigError::InvalidBounds)
        ));
    }
}

#[test]
fn scenario_with_zero_step_is_rejected() {
    let yaml = r#"
engine:
  barnes_hut: true
parameters:
  t_end: 1.0
  h0: 0.0
universe:
  view_width: 800
  view_height: 600
  true_width: 400.0
"#;
    let cfg: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
    assert!(matches!(Scenario::build_scenario(cfg), Err(ConfigError::InvalidStep(h)) if h == 0.0));
}
