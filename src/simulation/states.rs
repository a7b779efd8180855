//! Core state types for the 2D Barnes–Hut simulation.
//!
//! Defines the geometry primitives and per-body state carried by tree leaves:
//! - `NVec2`  nalgebra 2d vector used for positions, velocities, accelerations
//! - `Bounds` axis-aligned rectangle with inclusive containment and quadrant split
//! - `HalfStepAccel` / `Resident` the dynamic state a leaf holds for its body

use nalgebra::Vector2;
pub type NVec2 = Vector2<f64>;

/// Masses at or below this are treated as empty.
pub const MASS_EPSILON: f64 = 1e-6;

/// Stable per-body handle, an index into the body table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub usize);

impl BodyHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Axis-aligned rectangle given by its lower-left and upper-right corners.
///
/// Children of a node are laid out as
/// ```text
/// +-------+-------+
/// |   2   |   3   |  (upper-left, upper-right)
/// +-------+-------+
/// |   0   |   1   |  (lower-left, lower-right)
/// +-------+-------+
/// ```
/// so quadrant `i` sits at column `i % 2` and row `i / 2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub ll: NVec2, // lower-left corner
    pub ur: NVec2, // upper-right corner
}

impl Bounds {
    /// Build bounds from two corners, swapping coordinates so that `ll <= ur`.
    pub fn new(a: NVec2, b: NVec2) -> Self {
        Self {
            ll: NVec2::new(a.x.min(b.x), a.y.min(b.y)),
            ur: NVec2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn from_center(center: NVec2, half_width: f64, half_height: f64) -> Self {
        let half = NVec2::new(half_width.abs(), half_height.abs());
        Self {
            ll: center - half,
            ur: center + half,
        }
    }

    /// Inclusive on all four sides. Non-finite points are never contained.
    pub fn contains(&self, p: &NVec2) -> bool {
        p.x >= self.ll.x && p.y >= self.ll.y && p.x <= self.ur.x && p.y <= self.ur.y
    }

    pub fn width(&self) -> f64 {
        self.ur.x - self.ll.x
    }

    pub fn height(&self) -> f64 {
        self.ur.y - self.ll.y
    }

    /// Larger of the two side lengths, the `s` of the opening-angle test.
    pub fn size(&self) -> f64 {
        self.width().max(self.height())
    }

    pub fn center(&self) -> NVec2 {
        NVec2::new(
            self.ll.x + 0.5 * (self.ur.x - self.ll.x),
            self.ll.y + 0.5 * (self.ur.y - self.ll.y),
        )
    }

    /// Bounds of quadrant `index` (0..4).
    ///
    /// Neighbouring quadrants reuse the exact same split coordinate, so the
    /// four children tile the parent without gaps even under rounding.
    pub fn quadrant(&self, index: usize) -> Bounds {
        let mid = self.center();
        let (min_x, max_x) = if index % 2 == 0 { (self.ll.x, mid.x) } else { (mid.x, self.ur.x) };
        let (min_y, max_y) = if index / 2 == 0 { (self.ll.y, mid.y) } else { (mid.y, self.ur.y) };
        Bounds {
            ll: NVec2::new(min_x, min_y),
            ur: NVec2::new(max_x, max_y),
        }
    }

    /// Grow (or shrink) the bounds around their center by `factor`.
    pub fn scaled(&self, factor: f64) -> Bounds {
        Bounds::from_center(self.center(), 0.5 * self.width() * factor, 0.5 * self.height() * factor)
    }
}

/// Split acceleration of a body: `past` is the acceleration used for the
/// previous step, `future` accumulates forces for the current configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfStepAccel {
    pub past: NVec2,
    pub future: NVec2,
}

impl Default for HalfStepAccel {
    fn default() -> Self {
        Self {
            past: NVec2::zeros(),
            future: NVec2::zeros(),
        }
    }
}

/// Dynamic state of the single live body a leaf node represents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resident {
    pub handle: BodyHandle,
    pub velocity: NVec2,
    pub accel: HalfStepAccel,
    pub primed: bool, // false until the body has finished its first step
}

impl Resident {
    pub fn new(handle: BodyHandle, velocity: NVec2) -> Self {
        Self {
            handle,
            velocity,
            accel: HalfStepAccel::default(),
            primed: false,
        }
    }
}

/// A body in transit: everything needed to (re)insert it into the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub x: NVec2, // position
    pub m: f64, // mass
    pub resident: Resident,
}

/// Read-only copy of a live body handed out to callers.
///
/// Between steps `x` is already x_n+1 but `v` is still v_n: the velocity
/// update needs a_n+1, which only the next force pass provides. Before the
/// first step both belong to the initial state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySnapshot {
    pub handle: BodyHandle,
    pub x: NVec2, // position
    pub v: NVec2, // velocity, one step behind `x`
    pub m: f64, // mass
    pub accel: HalfStepAccel,
}
