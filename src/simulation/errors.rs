//! Error values reported by the quadtree and the simulation front-end.
//!
//! None of these abort a step: the offending body is dropped (or the lookup
//! answered with "nothing") and the rest of the simulation carries on.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    /// The body matched none of a node's children, either because it lies
    /// outside the root or because the subdivision limit was reached.
    #[error("body at ({x}, {y}) could not be placed below a node at depth {depth}")]
    InsertionFailure { x: f64, y: f64, depth: u32 },

    #[error("child index {0} is outside [0, 4)")]
    InvalidChildIndex(usize),

    #[error("mass {0} is too small to register a body")]
    NonPositiveMass(f64),

    #[error("no live body with handle {0}")]
    UnknownHandle(usize),
}

/// Settings a simulation cannot be built from.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("step size h0 = {0} must be positive and finite")]
    InvalidStep(f64),

    #[error("end time t_end = {0} must be finite")]
    InvalidEndTime(f64),

    #[error("parameter {name} = {value} is out of range")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("viewport {width} x {height} spanning {true_width} world units is degenerate")]
    InvalidViewport { width: f64, height: f64, true_width: f64 },

    #[error("root bounds must have a positive, finite extent")]
    InvalidBounds,
}
