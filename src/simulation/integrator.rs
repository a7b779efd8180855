//! Fixed-step time integration for a single body
//!
//! Velocity–Verlet driven by the split `past` / `future` accelerations kept
//! on each leaf, so each step needs exactly one force evaluation:
//! - the force pass fills `future` with a_n at the current positions
//! - the integrator closes the previous velocity update with (a_n-1 + a_n)/2
//! - then drifts the position a full step with a_n
//! - and rotates `future` into `past`

use crate::simulation::states::{HalfStepAccel, NVec2};

/// Position, velocity and accelerations of one body across a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub x: NVec2, // position
    pub v: NVec2, // velocity
    pub accel: HalfStepAccel,
    pub primed: bool, // a previous step already stored `past`
}

/// Advance one body by `dt`. Requires `accel.future` to hold every force of
/// the current configuration.
pub fn leapfrog_step(k: &Kinematics, dt: f64) -> Kinematics {
    let a_past = k.accel.past;
    let a_now = k.accel.future;

    // v_n = v_n-1 + (dt/2) (a_n-1 + a_n). A fresh body already has v_n
    let v = if k.primed {
        k.v + 0.5 * dt * (a_past + a_now)
    } else {
        k.v
    };

    // x_n+1 = x_n + dt v_n + (dt^2/2) a_n
    let x = k.x + dt * v + 0.5 * dt * dt * a_now;

    Kinematics {
        x,
        v,
        accel: HalfStepAccel {
            past: a_now,
            future: NVec2::zeros(),
        },
        primed: true,
    }
}
