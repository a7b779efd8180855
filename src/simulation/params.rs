//! Numerical and physical parameters for the simulation
//!
//! `Parameters` holds runtime settings:
//! - fixed step size and end time,
//! - softening and gravitational constant (`eps2`, `G`),
//! - how far the root region extends past the visible world,
//! - random seed used by the galaxy generator
//!
//! Units follow the galactic convention: parsec, solar mass, km/s.

#![allow(non_snake_case)]

use crate::simulation::errors::ConfigError;

/// Gravitational constant in pc / solar mass * (km/s)^2
pub const G_GALACTIC: f64 = 4.3009172706e-3;

#[derive(Debug, Clone)]
pub struct Parameters {
    pub t_end: f64, // time end
    pub h0: f64, // step size
    pub eps2: f64, // softening
    pub G: f64, // gravitational constant
    pub root_scale: f64, // root bounds relative to the visible world
    pub seed: u64, // deterministic seed
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            t_end: 100.0,
            h0: 0.01,
            eps2: 0.0,
            G: G_GALACTIC,
            root_scale: 1.5,
            seed: 42,
        }
    }
}

impl Parameters {
    /// Reject settings the step loop cannot make progress with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.h0 > 0.0 && self.h0.is_finite()) {
            return Err(ConfigError::InvalidStep(self.h0));
        }
        if !self.t_end.is_finite() {
            return Err(ConfigError::InvalidEndTime(self.t_end));
        }
        if !(self.eps2 >= 0.0 && self.eps2.is_finite()) {
            return Err(ConfigError::InvalidParameter { name: "eps2", value: self.eps2 });
        }
        if !self.G.is_finite() {
            return Err(ConfigError::InvalidParameter { name: "G", value: self.G });
        }
        if !(self.root_scale > 0.0 && self.root_scale.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                name: "root_scale",
                value: self.root_scale,
            });
        }
        Ok(())
    }
}
