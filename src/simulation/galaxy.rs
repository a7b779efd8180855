//! Procedural disk galaxies
//!
//! Produces initial conditions only: a massive core plus satellites on a
//! disk, each on an instantaneous circular orbit around the core. The
//! simulation registers the result one star at a time through its public
//! registration call, nothing here touches the tree.

#![allow(non_snake_case)]

use std::f64::consts::{PI, TAU};

use rand::Rng;
use serde::Deserialize;

use crate::simulation::states::NVec2;

/// How satellites are spread over the disk
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    #[serde(rename = "random")] // uniform radius and angle
    Random,

    #[default]
    #[serde(rename = "fibonacci")] // golden-angle spiral, even density
    Fibonacci,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalaxySpec {
    pub center: NVec2,
    pub count: usize, // number of satellites, the core not included
    pub core_mass: f64,
    pub core_velocity: NVec2,
    pub radius_range: (f64, f64),
    pub mass_range: (f64, f64),
    pub placement: Placement,
}

/// Initial state of one star, ready for registration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StarSeed {
    pub x: NVec2,
    pub m: f64,
    pub v: NVec2,
}

/// Lay out the core followed by `spec.count` satellites.
pub fn plan<R: Rng + ?Sized>(spec: &GalaxySpec, G: f64, rng: &mut R) -> Vec<StarSeed> {
    let mut stars = Vec::with_capacity(spec.count + 1);
    stars.push(StarSeed {
        x: spec.center,
        m: spec.core_mass,
        v: spec.core_velocity,
    });

    let (r_min, r_max) = ordered(spec.radius_range);
    let r_min = r_min.max(0.0);
    let golden_angle = PI * (3.0 - 5f64.sqrt());

    for i in 0..spec.count {
        let (r, theta) = match spec.placement {
            Placement::Random => (sample(rng, r_min, r_max), sample(rng, 0.0, TAU)),
            Placement::Fibonacci => {
                let f = ((i as f64 + 0.5) / spec.count as f64).sqrt();
                (r_min + (r_max - r_min) * f, i as f64 * golden_angle)
            }
        };

        let (sin, cos) = theta.sin_cos();
        let offset = NVec2::new(r * cos, r * sin);

        // v = sqrt(G M / r), perpendicular to the radius (counter-clockwise)
        let speed = if r > 0.0 { (G * spec.core_mass / r).sqrt() } else { 0.0 };
        let tangent = NVec2::new(-sin, cos);

        let (m_min, m_max) = ordered(spec.mass_range);
        stars.push(StarSeed {
            x: spec.center + offset,
            m: sample(rng, m_min, m_max),
            v: spec.core_velocity + speed * tangent,
        });
    }

    stars
}

fn ordered((a, b): (f64, f64)) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

// gen_range panics on an empty range
fn sample<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn spec(count: usize, placement: Placement) -> GalaxySpec {
        GalaxySpec {
            center: NVec2::new(10.0, -5.0),
            count,
            core_mass: 1e6,
            core_velocity: NVec2::new(1.0, 2.0),
            radius_range: (20.0, 80.0),
            mass_range: (1.0, 3.0),
            placement,
        }
    }

    #[test]
    fn empty_galaxy_is_just_the_core() {
        let mut rng = StdRng::seed_from_u64(1);
        let stars = plan(&spec(0, Placement::Random), 1.0, &mut rng);
        assert_eq!(
            stars,
            vec![StarSeed {
                x: NVec2::new(10.0, -5.0),
                m: 1e6,
                v: NVec2::new(1.0, 2.0),
            }]
        );
    }

    #[test]
    fn satellites_orbit_the_core() {
        let G = 4.3e-3;
        let s = spec(200, Placement::Random);
        let mut rng = StdRng::seed_from_u64(7);
        for star in plan(&s, G, &mut rng).iter().skip(1) {
            let offset = star.x - s.center;
            let r = offset.norm();
            assert!((20.0..=80.0).contains(&r));
            assert!((1.0..=3.0).contains(&star.m));

            let rel = star.v - s.core_velocity;
            assert!(rel.dot(&offset).abs() < 1e-9 * r * rel.norm());
            assert!((rel.norm() - (G * s.core_mass / r).sqrt()).abs() < 1e-9);
        }
    }

    #[test]
    fn fibonacci_disk_is_deterministic_and_spread() {
        let s = spec(100, Placement::Fibonacci);
        let a = plan(&s, 1.0, &mut StdRng::seed_from_u64(1));
        let b = plan(&s, 1.0, &mut StdRng::seed_from_u64(2));
        let positions = |v: &[StarSeed]| v.iter().map(|s| s.x).collect::<Vec<_>>();
        assert_eq!(positions(&a), positions(&b));

        let radii: Vec<f64> = a.iter().skip(1).map(|st| (st.x - s.center).norm()).collect();
        assert!(radii.windows(2).all(|w| w[0] < w[1]));
        assert!(radii[0] > 20.0 && radii[99] < 80.0);
    }
}
