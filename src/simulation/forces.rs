//! Pairwise gravity for the 2D engine
//!
//! `GravityLaw` is the two-body force law applied by the tree walk, either
//! to a single body or to a whole cell collapsed to its center of mass.
//! `DirectGravity` sums the same law over every pair and is kept as the
//! exact O(N^2) reference for tests and benchmarks.

#![allow(non_snake_case)]

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use serde::Deserialize;

use crate::simulation::states::{BodySnapshot, NVec2};

/// How the direction of a pull is resolved
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AngleMode {
    #[default]
    #[serde(rename = "exact")] // std atan2
    Exact,

    #[serde(rename = "fast")] // polynomial atan2, max error around 1e-2 rad
    Fast,
}

/// Newtonian gravity with optional Plummer softening
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityLaw {
    pub G: f64, // gravitational constant
    pub eps2: f64, // softening
    pub angle: AngleMode,
}

impl GravityLaw {
    /// Acceleration felt at `target` due to `source_mass` sitting at `source`.
    ///
    /// F = G m_B m_N / (d^2 + eps2) along the angle from target to source,
    /// divided by m_B. A source at zero distance without softening pulls in no
    /// particular direction and contributes nothing.
    pub fn accel_toward(&self, target: NVec2, source: NVec2, source_mass: f64) -> NVec2 {
        let r = source - target;
        let d2 = r.dot(&r) + self.eps2;
        if d2 == 0.0 || !d2.is_finite() {
            return NVec2::zeros();
        }

        let a = self.G * source_mass / d2;
        let theta = match self.angle {
            AngleMode::Exact => r.y.atan2(r.x),
            AngleMode::Fast => fast_atan2(r.y, r.x),
        };
        NVec2::new(a * theta.cos(), a * theta.sin())
    }
}

/// Branch-light atan2 approximation.
pub fn fast_atan2(y: f64, x: f64) -> f64 {
    let abs_y = y.abs() + 1e-10; // keeps 0/0 away
    let r = (x - abs_y.copysign(x)) / (abs_y + x.abs());
    let mut angle = FRAC_PI_2 - FRAC_PI_4.copysign(x);
    angle += (0.1963 * r * r - 0.9817) * r;
    angle.copysign(y)
}

/// Exact all-pairs gravity
pub struct DirectGravity {
    pub law: GravityLaw,
}

impl DirectGravity {
    /// Acceleration on every body in `bodies`, in the same order
    pub fn accelerations(&self, bodies: &[BodySnapshot]) -> Vec<NVec2> {
        let n = bodies.len();
        let mut out = vec![NVec2::zeros(); n];

        for i in 0..n {
            let bi = &bodies[i];
            for j in (i + 1)..n {
                let bj = &bodies[j];

                // Each side pulls toward the other with the other's mass
                out[i] += self.law.accel_toward(bi.x, bj.x, bj.m);
                out[j] += self.law.accel_toward(bj.x, bi.x, bi.m);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn law() -> GravityLaw {
        GravityLaw {
            G: 1.0,
            eps2: 0.0,
            angle: AngleMode::Exact,
        }
    }

    #[test]
    fn pull_points_at_source() {
        let a = law().accel_toward(NVec2::new(0.0, 0.0), NVec2::new(0.0, 2.0), 4.0);
        assert!(a.x.abs() < 1e-12);
        assert!((a.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn coincident_source_contributes_nothing() {
        let a = law().accel_toward(NVec2::new(1.0, 1.0), NVec2::new(1.0, 1.0), 4.0);
        assert_eq!(a, NVec2::zeros());
    }

    #[test]
    fn fast_atan2_tracks_std() {
        for k in 0..64 {
            let t = -3.1 + k as f64 * 0.1;
            let (y, x) = (t.sin() * 3.0, t.cos() * 3.0);
            assert!((fast_atan2(y, x) - y.atan2(x)).abs() < 1.5e-2, "angle {t}");
        }
    }
}
