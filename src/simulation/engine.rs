//! High-level runtime engine settings
//!
//! Selects between the tree walk and exact summation, the opening angle,
//! and how force directions are computed

use crate::simulation::forces::AngleMode;

/// Default opening angle
pub const DELTA: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct Engine {
    pub barnes_hut: bool, // false = every leaf visited (exact), true = opening-angle test
    pub delta: f64, // accept a cell as one mass when width / distance < delta
    pub angle: AngleMode, // exact or fast atan2
}

impl Engine {
    /// Opening angle actually used by the force walk.
    pub fn opening_angle(&self) -> f64 {
        if self.barnes_hut {
            self.delta
        } else {
            0.0
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            barnes_hut: true,
            delta: DELTA,
            angle: AngleMode::Exact,
        }
    }
}
