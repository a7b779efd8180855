//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! simulation scenario. A scenario consists of:
//!
//! - [`EngineConfig`]     – force evaluation options (tree walk, opening angle)
//! - [`ParametersConfig`] – numerical parameters and physical constants
//! - [`UniverseConfig`]   – visible window and the world width it spans
//! - [`BodyConfig`]       – initial state for each individually placed body
//! - [`GalaxyConfig`]     – procedurally generated disk galaxies
//! - [`RenderConfig`]     – what the viewer draws of the tree
//! - [`ScenarioConfig`]   – top-level wrapper used to load a scenario from YAML
//!
//! # YAML format
//! Units are parsec, solar mass and km/s. An example scenario:
//!
//! ```yaml
//! engine:
//!   barnes_hut: true
//!   delta: 0.5              # opening angle
//!   angle: "exact"          # or "fast"
//!
//! parameters:
//!   t_end: 500.0            # total simulation time
//!   h0: 0.05                # fixed step size
//!   eps2: 0.0               # softening epsilon^2
//!   root_scale: 1.5         # root region relative to the visible world
//!   seed: 42                # deterministic seed
//!
//! universe:
//!   view_width: 1280
//!   view_height: 720
//!   true_width: 2000.0
//!
//! bodies:
//!   - x: [ 600.0, 0.0 ]
//!     v: [ 0.0, -5.0 ]
//!     m: 1.0e5
//!
//! galaxies:
//!   - center: [ -300.0, 0.0 ]
//!     count: 400
//!     core_mass: 1.0e6
//!     core_velocity: [ 0.0, 1.0 ]
//!     radius_range: [ 20.0, 250.0 ]
//!     mass_range: [ 1.0, 10.0 ]
//!     placement: "fibonacci"
//!
//! render:
//!   show_quad: true
//!   depth: -1
//! ```
//!
//! The scenario builder maps this configuration into the runtime
//! `Engine` / `Parameters` / `Simulation` types.

#![allow(non_snake_case)]

use serde::Deserialize;

use crate::simulation::forces::AngleMode;
use crate::simulation::galaxy::Placement;

/// Force evaluation options
#[derive(Deserialize, Debug, Clone)]
pub struct EngineConfig {
    pub barnes_hut: bool, // `true` - opening-angle approximation, `false` - every leaf visited
    pub delta: Option<f64>, // accept a cell as one mass when width / distance < delta
    #[serde(default)]
    pub angle: AngleMode, // how force directions are computed
}

/// Global numerical and physical parameters for a scenario
#[derive(Deserialize, Debug, Clone)]
pub struct ParametersConfig {
    pub t_end: f64, // time end
    pub h0: f64, // time step size
    #[serde(default)]
    pub eps2: f64, // softening - prevent singular forces at very small separations
    pub G: Option<f64>, // gravitational constant, galactic units when missing
    pub root_scale: Option<f64>, // root region relative to the visible world
    pub seed: Option<u64>, // deterministic seed to make runs reproducible
}

/// Visible window and the world width it spans
#[derive(Deserialize, Debug, Clone)]
pub struct UniverseConfig {
    pub view_width: f64,
    pub view_height: f64,
    pub true_width: f64,
}

/// Configuration for a single body's initial state
#[derive(Deserialize, Debug, Clone)]
pub struct BodyConfig {
    pub x: [f64; 2], // Initial position
    #[serde(default)]
    pub v: [f64; 2], // Initial velocity, at rest when missing
    pub m: f64, // Mass of the body
}

/// A core plus satellites on circular orbits
#[derive(Deserialize, Debug, Clone)]
pub struct GalaxyConfig {
    pub center: [f64; 2],
    pub count: usize,
    pub core_mass: f64,
    #[serde(default)]
    pub core_velocity: [f64; 2],
    pub radius_range: [f64; 2],
    pub mass_range: [f64; 2],
    #[serde(default)]
    pub placement: Placement,
}

/// What the viewer draws of the tree
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    #[serde(default)]
    pub debug: bool, // also draw the COM of internal nodes
    #[serde(default = "all_depths")]
    pub depth: i32, // only this tree depth, -1 for all
    #[serde(default)]
    pub show_quad: bool, // outline the quadrants
    #[serde(default)]
    pub same_depth_only: bool, // restrict bodies to `depth` as well
    #[serde(default = "one_step")]
    pub steps_per_frame: u32,
}

fn all_depths() -> i32 {
    -1
}

fn one_step() -> u32 {
    1
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            debug: false,
            depth: all_depths(),
            show_quad: false,
            same_depth_only: false,
            steps_per_frame: one_step(),
        }
    }
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    pub engine: EngineConfig, // Force evaluation options
    pub parameters: ParametersConfig, // Global numerical and physical parameters
    pub universe: UniverseConfig, // Window and world size
    #[serde(default)]
    pub bodies: Vec<BodyConfig>, // Individually placed bodies
    #[serde(default)]
    pub galaxies: Vec<GalaxyConfig>, // Generated galaxies
    #[serde(default)]
    pub render: RenderConfig, // Viewer options
}
