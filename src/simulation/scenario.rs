//! Build fully-initialized simulations from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces the runtime bundle
//! `Scenario` containing:
//! - the `Simulation` with every configured body and galaxy registered
//! - the snapshot settings the viewer draws with
//!
//! With the `vis` feature the scenario is inserted into Bevy as a `Resource`
//! and consumed by the stepping and drawing systems

#[cfg(feature = "vis")]
use bevy::prelude::Resource;
use log::{info, warn};

use crate::configuration::config::{GalaxyConfig, ScenarioConfig};
use crate::simulation::engine::{Engine, DELTA};
use crate::simulation::errors::ConfigError;
use crate::simulation::galaxy::GalaxySpec;
use crate::simulation::params::Parameters;
use crate::simulation::states::NVec2;
use crate::simulation::universe::{Simulation, Viewport};
use crate::visualization::snapshot::SnapshotConfig;

/// Fully-initialized scenario: the simulation plus how to look at it
#[cfg_attr(feature = "vis", derive(Resource))]
pub struct Scenario {
    pub simulation: Simulation,
    pub snapshot: SnapshotConfig,
    pub steps_per_frame: u32,
}

impl Scenario {
    /// Fails when the configured parameters or viewport cannot drive a run.
    pub fn build_scenario(cfg: ScenarioConfig) -> Result<Self, ConfigError> {
        // Parameters (runtime) from ParametersConfig
        let defaults = Parameters::default();
        let p_cfg = cfg.parameters;
        let parameters = Parameters {
            t_end: p_cfg.t_end,
            h0: p_cfg.h0,
            eps2: p_cfg.eps2,
            G: p_cfg.G.unwrap_or(defaults.G),
            root_scale: p_cfg.root_scale.unwrap_or(defaults.root_scale),
            seed: p_cfg.seed.unwrap_or(defaults.seed),
        };

        // Engine (runtime) from EngineConfig
        let e_cfg = cfg.engine;
        let engine = Engine {
            barnes_hut: e_cfg.barnes_hut,
            delta: e_cfg.delta.unwrap_or(DELTA),
            angle: e_cfg.angle,
        };

        let viewport = Viewport {
            width: cfg.universe.view_width,
            height: cfg.universe.view_height,
            true_width: cfg.universe.true_width,
        };

        let mut simulation = Simulation::with_settings(viewport, engine, parameters)?;

        // Bodies: map `BodyConfig` -> registered stars
        for (i, bc) in cfg.bodies.iter().enumerate() {
            let x = NVec2::new(bc.x[0], bc.x[1]);
            let v = NVec2::new(bc.v[0], bc.v[1]);
            if let Err(e) = simulation.register_star(x, bc.m, v) {
                warn!("skipping configured body {i}: {e}");
            }
        }

        for gc in &cfg.galaxies {
            simulation.register_galaxy(&galaxy_spec(gc));
        }

        info!(
            "scenario ready: {} bodies, total mass {:.3e}, root {:?}",
            simulation.live_count(),
            simulation.total_mass(),
            simulation.tree().bounds()
        );

        let render = cfg.render;
        Ok(Self {
            simulation,
            snapshot: SnapshotConfig {
                debug: render.debug,
                depth: render.depth,
                show_quad: render.show_quad,
                same_depth_only: render.same_depth_only,
            },
            steps_per_frame: render.steps_per_frame.max(1),
        })
    }
}

fn galaxy_spec(gc: &GalaxyConfig) -> GalaxySpec {
    GalaxySpec {
        center: NVec2::new(gc.center[0], gc.center[1]),
        count: gc.count,
        core_mass: gc.core_mass,
        core_velocity: NVec2::new(gc.core_velocity[0], gc.core_velocity[1]),
        radius_range: (gc.radius_range[0], gc.radius_range[1]),
        mass_range: (gc.mass_range[0], gc.mass_range[1]),
        placement: gc.placement,
    }
}
