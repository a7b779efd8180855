pub mod states;
pub mod params;
pub mod engine;
pub mod errors;
pub mod node;
pub mod body_table;
pub mod forces;
pub mod barnes_hut;
pub mod integrator;
pub mod galaxy;
pub mod universe;
pub mod scenario;
