pub mod simulation;
pub mod configuration;
pub mod visualization;
pub mod benchmark;

pub use simulation::states::{Body, BodyHandle, BodySnapshot, Bounds, NVec2};
pub use simulation::errors::{ConfigError, TreeError};
pub use simulation::engine::Engine;
pub use simulation::params::Parameters;
pub use simulation::forces::{AngleMode, DirectGravity, GravityLaw};
pub use simulation::barnes_hut::{NodeView, Relocation, SpatialTree};
pub use simulation::galaxy::{GalaxySpec, Placement};
pub use simulation::universe::{Simulation, StepStats, Viewport};
pub use simulation::scenario::Scenario;

pub use configuration::config::{EngineConfig, ParametersConfig, UniverseConfig, BodyConfig, GalaxyConfig, RenderConfig, ScenarioConfig};

pub use visualization::snapshot::{Renderer, Snapshot, SnapshotConfig, SnapshotNode};
#[cfg(feature = "vis")]
pub use visualization::quad_vis2d::run_2d;

pub use benchmark::benchmark::{bench_forces, bench_step_curve};
